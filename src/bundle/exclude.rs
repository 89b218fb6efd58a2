//! Exclusion policy for package archives
//!
//! Directory names, directory suffixes and file extensions, plus optional
//! glob patterns. Rules are checked against every segment of a path, so a
//! disallowed directory anywhere in the ancestry excludes its descendants.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::path::{Component, Path};

/// Directory names excluded by default
pub const DEFAULT_DIR_NAMES: &[&str] = &["__pycache__", "build", "dist"];

/// Directory suffixes excluded by default
pub const DEFAULT_DIR_SUFFIXES: &[&str] = &[".egg-info"];

/// File extensions excluded by default
pub const DEFAULT_FILE_EXTENSIONS: &[&str] = &[".pyc", ".pyo"];

/// Errors for exclusion rules
#[derive(Debug, thiserror::Error)]
pub enum ExcludeError {
    #[error("empty {kind} in exclusion policy")]
    EmptyRule { kind: &'static str },

    #[error("Glob pattern error: {0}")]
    GlobError(#[from] globset::Error),
}

/// Exclusion policy for filtering archive entries
#[derive(Debug, Clone)]
pub struct ExclusionPolicy {
    dir_names: BTreeSet<String>,
    dir_suffixes: Vec<String>,
    file_extensions: BTreeSet<String>,
    patterns: Vec<String>,
    glob_set: GlobSet,
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self {
            dir_names: DEFAULT_DIR_NAMES.iter().map(|s| s.to_string()).collect(),
            dir_suffixes: DEFAULT_DIR_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            file_extensions: DEFAULT_FILE_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            patterns: Vec::new(),
            glob_set: GlobSet::empty(),
        }
    }
}

impl ExclusionPolicy {
    /// Build a policy from explicit rule sets.
    ///
    /// Extensions may be given with or without the leading dot.
    pub fn new<S: AsRef<str>>(
        dir_names: &[S],
        dir_suffixes: &[S],
        file_extensions: &[S],
    ) -> Result<Self, ExcludeError> {
        let mut names = BTreeSet::new();
        for name in dir_names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                return Err(ExcludeError::EmptyRule { kind: "directory name" });
            }
            names.insert(name.to_string());
        }

        let mut suffixes = Vec::new();
        for suffix in dir_suffixes {
            let suffix = suffix.as_ref().trim();
            if suffix.is_empty() {
                return Err(ExcludeError::EmptyRule { kind: "directory suffix" });
            }
            suffixes.push(suffix.to_string());
        }

        let mut extensions = BTreeSet::new();
        for ext in file_extensions {
            let ext = ext.as_ref().trim().trim_start_matches('.');
            if ext.is_empty() {
                return Err(ExcludeError::EmptyRule { kind: "file extension" });
            }
            extensions.insert(format!(".{ext}"));
        }

        Ok(Self {
            dir_names: names,
            dir_suffixes: suffixes,
            file_extensions: extensions,
            patterns: Vec::new(),
            glob_set: GlobSet::empty(),
        })
    }

    /// Add glob patterns matched against the `/`-separated path below the package root
    pub fn with_patterns<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self, ExcludeError> {
        let mut builder = GlobSetBuilder::new();

        for pattern in self.patterns.iter().map(String::as_str).chain(patterns.iter().map(AsRef::as_ref)) {
            if !pattern.is_empty() {
                builder.add(Glob::new(pattern)?);
            }
        }
        self.patterns.extend(
            patterns
                .iter()
                .map(|p| p.as_ref().to_string())
                .filter(|p| !p.is_empty()),
        );
        self.glob_set = builder.build()?;
        Ok(self)
    }

    /// Check if a relative path should be excluded
    pub fn is_excluded(&self, path: &Path) -> bool {
        for component in path.components() {
            let Component::Normal(segment) = component else {
                continue;
            };
            let segment = segment.to_string_lossy();
            if self.dir_names.contains(segment.as_ref()) {
                return true;
            }
            if self.dir_suffixes.iter().any(|s| segment.ends_with(s.as_str())) {
                return true;
            }
        }

        if let Some(ext) = path.extension() {
            if self
                .file_extensions
                .contains(&format!(".{}", ext.to_string_lossy()))
            {
                return true;
            }
        }

        if !self.patterns.is_empty() {
            let joined = path
                .components()
                .filter_map(|c| match c {
                    Component::Normal(s) => Some(s.to_string_lossy()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("/");
            return self.glob_set.is_match(joined.as_str());
        }

        false
    }

    pub fn dir_names(&self) -> impl Iterator<Item = &str> {
        self.dir_names.iter().map(String::as_str)
    }

    pub fn dir_suffixes(&self) -> impl Iterator<Item = &str> {
        self.dir_suffixes.iter().map(String::as_str)
    }

    pub fn file_extensions(&self) -> impl Iterator<Item = &str> {
        self.file_extensions.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_excludes_cache_dirs() {
        let policy = ExclusionPolicy::default();

        assert!(policy.is_excluded(Path::new("pkg/__pycache__")));
        assert!(policy.is_excluded(Path::new("pkg/pkg/__pycache__/mod.cpython-311.pyc")));
        assert!(policy.is_excluded(Path::new("pkg/build/lib/pkg/__init__.py")));
        assert!(policy.is_excluded(Path::new("pkg/dist/pkg-0.1.tar.gz")));
    }

    #[test]
    fn test_default_excludes_egg_info() {
        let policy = ExclusionPolicy::default();

        assert!(policy.is_excluded(Path::new("pkg/pkg.egg-info")));
        assert!(policy.is_excluded(Path::new("pkg/pkg.egg-info/PKG-INFO")));
    }

    #[test]
    fn test_default_excludes_bytecode() {
        let policy = ExclusionPolicy::default();

        assert!(policy.is_excluded(Path::new("pkg/mod.pyc")));
        assert!(policy.is_excluded(Path::new("pkg/mod.pyo")));
        assert!(!policy.is_excluded(Path::new("pkg/mod.py")));
    }

    #[test]
    fn test_nested_disallowed_dir_excludes_descendants() {
        let policy = ExclusionPolicy::default();
        assert!(policy.is_excluded(Path::new("pkg/pkg/resources/build/deep/file.txt")));
    }

    #[test]
    fn test_normal_files_not_excluded() {
        let policy = ExclusionPolicy::default();

        assert!(!policy.is_excluded(Path::new("pkg/setup.cfg")));
        assert!(!policy.is_excluded(Path::new("pkg/pkg/resources/assets/hello.txt")));
        assert!(!policy.is_excluded(Path::new("pkg/builder/file.txt")));
        assert!(!policy.is_excluded(Path::new("pkg/distribution.md")));
    }

    #[test]
    fn test_custom_policy() {
        let policy = ExclusionPolicy::new(&["target"], &[".tmp"], &["o", ".a"]).unwrap();

        assert!(policy.is_excluded(Path::new("crate/target/debug")));
        assert!(policy.is_excluded(Path::new("crate/x.tmp/y")));
        assert!(policy.is_excluded(Path::new("crate/lib.o")));
        assert!(policy.is_excluded(Path::new("crate/lib.a")));
        assert!(!policy.is_excluded(Path::new("crate/build/x.pyc")));
    }

    #[test]
    fn test_empty_rules_rejected() {
        let empty: &[&str] = &[];
        assert!(matches!(
            ExclusionPolicy::new(empty, &[""], empty),
            Err(ExcludeError::EmptyRule { .. })
        ));
        assert!(matches!(
            ExclusionPolicy::new(empty, empty, &["."]),
            Err(ExcludeError::EmptyRule { .. })
        ));
    }

    #[test]
    fn test_glob_patterns() {
        let policy = ExclusionPolicy::default()
            .with_patterns(&["**/*.log", "*/secrets/**"])
            .unwrap();

        assert!(policy.is_excluded(Path::new("pkg/logs/debug.log")));
        assert!(policy.is_excluded(Path::new("pkg/secrets/key.pem")));
        // Defaults still apply
        assert!(policy.is_excluded(Path::new("pkg/__pycache__")));
        assert!(!policy.is_excluded(Path::new("pkg/readme.md")));
    }
}
