//! Section-aware line editor for `setup.cfg` style build manifests.
//!
//! The editor never round-trips the file through a config parser. It keeps
//! every line verbatim and only decides *where* to splice in a new
//! `install_requires` entry, so comments, ordering and formatting of
//! unrelated content survive untouched.

mod dependency;

pub use dependency::{normalize_name, Dependency};

use std::fmt;

/// Section that carries build options.
pub const OPTIONS_SECTION: &str = "options";

/// Key holding the dependency list inside [`OPTIONS_SECTION`].
pub const REQUIRES_KEY: &str = "install_requires";

/// Indentation used for continuation lines written by the editor.
pub const ENTRY_INDENT: &str = "    ";

/// Errors for manifest editing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error("malformed section header on line {line}: {text}")]
    MalformedHeader { line: usize, text: String },

    #[error("invalid dependency entry: {0}")]
    InvalidEntry(String),

    #[error("dependency '{name}' already declared as '{existing}'")]
    Conflict { name: String, existing: String },

    #[error("could not insert dependency")]
    CouldNotInsert,
}

/// Where a dependency ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// Appended to an existing `install_requires` list
    ExistingList,
    /// A new `install_requires` key was added to an existing `[options]`
    NewKey,
    /// A new `[options]` section was appended to the file
    NewSection,
    /// The identical entry was already declared; nothing was written
    AlreadyPresent,
}

/// Insertion points discovered by a single scan of the file
#[derive(Debug, Default)]
struct Layout {
    /// Index of the first `[options]` header
    options_header: Option<usize>,
    /// Index of the `install_requires` key line inside it
    key_line: Option<usize>,
    /// Index of the line terminating the list (None = list runs to EOF)
    list_end: Option<usize>,
    /// Entries currently declared in the list
    entries: Vec<String>,
}

/// An editable manifest, held as its original lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupCfg {
    lines: Vec<String>,
    newline: &'static str,
}

impl SetupCfg {
    /// Split `text` into lines, validating section headers.
    pub fn parse(text: &str) -> Result<Self, PatchError> {
        let newline = if text.contains("\r\n") { "\r\n" } else { "\n" };
        let lines: Vec<String> = text.split_inclusive('\n').map(str::to_string).collect();
        let cfg = Self { lines, newline };
        cfg.scan()?;
        Ok(cfg)
    }

    /// Dependency entries currently listed under `[options] install_requires`.
    pub fn dependencies(&self) -> Vec<String> {
        self.scan().map(|layout| layout.entries).unwrap_or_default()
    }

    /// Merge `dep` into the `install_requires` list.
    ///
    /// Insertion points, in priority order: the end of an existing list, a
    /// new key directly under `[options]`, or a new `[options]` section at
    /// the end of the file. The edit is verified afterwards; an edit that
    /// did not land is reported as [`PatchError::CouldNotInsert`].
    pub fn add_dependency(&mut self, dep: &Dependency) -> Result<Insertion, PatchError> {
        let layout = self.scan()?;
        let entry = dep.entry();

        for existing in &layout.entries {
            if *existing == entry {
                return Ok(Insertion::AlreadyPresent);
            }
            if Dependency::name_of(existing).map(normalize_name) == Some(normalize_name(dep.name())) {
                return Err(PatchError::Conflict {
                    name: dep.name().to_string(),
                    existing: existing.clone(),
                });
            }
        }

        let line = format!("{ENTRY_INDENT}{entry}{}", self.newline);
        let insertion = match (layout.options_header, layout.key_line) {
            (_, Some(_)) => {
                let at = match layout.list_end {
                    Some(at) => at,
                    None => {
                        self.terminate_last_line();
                        self.lines.len()
                    }
                };
                self.lines.insert(at, line);
                Insertion::ExistingList
            }
            (Some(header), None) => {
                self.lines
                    .insert(header + 1, format!("{REQUIRES_KEY} ={}", self.newline));
                self.lines.insert(header + 2, line);
                Insertion::NewKey
            }
            (None, None) => {
                self.terminate_last_line();
                if !self.lines.is_empty() {
                    self.lines.push(self.newline.to_string());
                }
                self.lines.push(format!("[{OPTIONS_SECTION}]{}", self.newline));
                self.lines.push(format!("{REQUIRES_KEY} ={}", self.newline));
                self.lines.push(line);
                Insertion::NewSection
            }
        };

        if !self.dependencies().contains(&entry) {
            return Err(PatchError::CouldNotInsert);
        }
        Ok(insertion)
    }

    fn terminate_last_line(&mut self) {
        if let Some(last) = self.lines.last_mut() {
            if !last.ends_with('\n') {
                last.push_str(self.newline);
            }
        }
    }

    fn scan(&self) -> Result<Layout, PatchError> {
        let mut layout = Layout::default();
        let mut in_options = false;
        let mut in_list = false;

        for (idx, raw) in self.lines.iter().enumerate() {
            let trimmed = raw.trim();

            if let Some(section) = section_name(idx, trimmed)? {
                if in_list {
                    layout.list_end = Some(idx);
                    in_list = false;
                }
                in_options = section == OPTIONS_SECTION && layout.options_header.is_none();
                if in_options {
                    layout.options_header = Some(idx);
                }
                continue;
            }

            if in_list {
                if is_comment(trimmed) {
                    continue;
                }
                // Blank lines and unindented keys both close a continuation list.
                if trimmed.is_empty() || !raw.starts_with([' ', '\t']) {
                    layout.list_end = Some(idx);
                    in_list = false;
                } else {
                    layout.entries.push(trimmed.to_string());
                }
                continue;
            }

            if in_options && layout.key_line.is_none() {
                if let Some((key, value)) = trimmed.split_once(['=', ':']) {
                    if key.trim() == REQUIRES_KEY {
                        layout.key_line = Some(idx);
                        in_list = true;
                        let value = value.trim();
                        if !value.is_empty() {
                            layout.entries.push(value.to_string());
                        }
                    }
                }
            }
        }

        Ok(layout)
    }
}

impl fmt::Display for SetupCfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            f.write_str(line)?;
        }
        Ok(())
    }
}

/// Parse `text` and add `dep`, returning the rewritten manifest.
pub fn add_dependency(text: &str, dep: &Dependency) -> Result<(String, Insertion), PatchError> {
    let mut cfg = SetupCfg::parse(text)?;
    let insertion = cfg.add_dependency(dep)?;
    Ok((cfg.to_string(), insertion))
}

fn section_name(idx: usize, trimmed: &str) -> Result<Option<&str>, PatchError> {
    let Some(rest) = trimmed.strip_prefix('[') else {
        return Ok(None);
    };
    match rest.strip_suffix(']') {
        Some(name) => Ok(Some(name.trim())),
        None => Err(PatchError::MalformedHeader {
            line: idx + 1,
            text: trimmed.to_string(),
        }),
    }
}

fn is_comment(trimmed: &str) -> bool {
    trimmed.starts_with('#') || trimmed.starts_with(';')
}
