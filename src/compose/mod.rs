//! Vendoring composition
//!
//! Merges N independently built packages into one freshly scaffolded output
//! package:
//! - Resolve every input and reject slot name collisions
//! - Bootstrap the output package in a staging directory
//! - Per input: archive, extract into its vendor slot, patch the manifest
//!   when the slot is itself an installable package
//! - Append provenance to the entry point, optionally generate the asset
//!   mapping, then move the finished package into place
//! - Optionally install it
//!
//! Inputs are processed strictly in the order given. Nothing is retried; the
//! first failure aborts the run and leaves the staging directory on disk for
//! inspection. The target directory only ever appears complete.

mod result;

pub use result::{CompositionResult, InputOutcome, InputStatus, Stage};

use chrono::Utc;
use log::{debug, info, warn};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use crate::bundle::{extract_archive, ArchiveError, Archiver, ExtractError};
use crate::install::{ExternalToolError, Installer, PipInstaller};
use crate::manifest::{self, ManifestError, MANIFEST_FILE};
use crate::mapping::{AssetMapper, MappingError, PythonAssetMapping};
use crate::resolve::{ProjectRoot, ResolveError, Resolver, DEFAULT_MANIFEST_FILES};
use crate::scaffold::{validate_package_name, ScaffoldError, Scaffolder, TemplateScaffolder};

/// Vendor root, relative to the output package root
pub const VENDOR_DIR: &str = "resources/assets/vendors";

/// Where things live inside the output package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeLayout {
    pub vendor_dir: String,
    /// File receiving provenance lines and the mapping import
    pub entry_point: String,
    pub mapping_file: String,
    /// Resource tree scanned by the asset mapping generator
    pub resource_dir: String,
    /// Output manifest patched for installable inputs
    pub manifest_file: String,
    /// Files marking an extracted slot as an installable package
    pub metadata_files: Vec<String>,
}

impl Default for ComposeLayout {
    fn default() -> Self {
        Self {
            vendor_dir: VENDOR_DIR.to_string(),
            entry_point: "__init__.py".to_string(),
            mapping_file: "assets.py".to_string(),
            resource_dir: "resources/assets".to_string(),
            manifest_file: MANIFEST_FILE.to_string(),
            metadata_files: DEFAULT_MANIFEST_FILES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ComposeLayout {
    /// Slot path relative to the output root, `/`-separated
    pub fn slot_rel(&self, name: &str) -> String {
        format!("{}/{}", self.vendor_dir.trim_end_matches('/'), name)
    }

    pub fn provenance_line(&self, name: &str) -> String {
        format!("# vendored: {} -> {}/", name, self.slot_rel(name))
    }
}

/// Optional composition steps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComposeOptions {
    /// Generate the asset mapping file after vendoring
    pub gen_mapping: bool,
    /// Install the finished package
    pub install: bool,
}

/// Failure while processing a single input
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("archive failed: {0}")]
    Archive(#[from] ArchiveError),

    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("manifest patch failed: {0}")]
    Manifest(#[from] ManifestError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Composition errors
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("output directory already exists: {0}")]
    TargetExists(PathBuf),

    #[error("cannot bootstrap output package: {0}")]
    Bootstrap(#[from] ScaffoldError),

    #[error("failed to vendor '{reference}': {source}")]
    Input {
        reference: String,
        /// Staging directory left behind, if one was created
        staging: Option<PathBuf>,
        #[source]
        source: InputError,
    },

    #[error("inputs '{first}' and '{second}' both resolve to package name '{name}'")]
    SlotCollision {
        name: String,
        first: String,
        second: String,
    },

    #[error("asset mapping failed (partial output left at {}): {source}", .staging.display())]
    Mapping {
        staging: PathBuf,
        #[source]
        source: MappingError,
    },

    #[error("cannot finalize output (partial output left at {}): {source}", .staging.display())]
    Finalize {
        staging: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("install failed for {}: {source}", .result.root.display())]
    Install {
        #[source]
        source: ExternalToolError,
        /// The composed tree stays on disk
        result: Box<CompositionResult>,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ComposeError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        1
    }

    /// Partial output left on disk by a failed run
    pub fn leftover(&self) -> Option<&Path> {
        match self {
            ComposeError::Input { staging, .. } => staging.as_deref(),
            ComposeError::Mapping { staging, .. } | ComposeError::Finalize { staging, .. } => {
                Some(staging)
            }
            ComposeError::Install { result, .. } => Some(&result.root),
            _ => None,
        }
    }
}

/// Orchestrates a composition
pub struct Composer {
    resolver: Resolver,
    archiver: Archiver,
    layout: ComposeLayout,
    scaffolder: Box<dyn Scaffolder>,
    mapper: Box<dyn AssetMapper>,
    installer: Box<dyn Installer>,
}

impl Composer {
    /// Create a composer with the built-in collaborators
    pub fn new(resolver: Resolver, archiver: Archiver) -> Self {
        Self {
            resolver,
            archiver,
            layout: ComposeLayout::default(),
            scaffolder: Box::new(TemplateScaffolder),
            mapper: Box::new(PythonAssetMapping),
            installer: Box::new(PipInstaller::default()),
        }
    }

    pub fn with_layout(mut self, layout: ComposeLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_scaffolder(mut self, scaffolder: Box<dyn Scaffolder>) -> Self {
        self.scaffolder = scaffolder;
        self
    }

    pub fn with_mapper(mut self, mapper: Box<dyn AssetMapper>) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn with_installer(mut self, installer: Box<dyn Installer>) -> Self {
        self.installer = installer;
        self
    }

    pub fn layout(&self) -> &ComposeLayout {
        &self.layout
    }

    /// Compose `inputs` into `<output_dir>/<output_name>`.
    pub fn compose(
        &self,
        inputs: &[String],
        output_name: &str,
        output_dir: &Path,
        options: ComposeOptions,
    ) -> Result<CompositionResult, ComposeError> {
        validate_package_name(output_name)?;
        let target = output_dir.join(output_name);
        if fs::symlink_metadata(&target).is_ok() {
            return Err(ComposeError::TargetExists(target));
        }
        let mut result = CompositionResult::new(output_name, target.clone());
        info!("combining {} package(s) into {}", inputs.len(), target.display());

        let roots = self.resolve_inputs(inputs)?;
        result.stage = Stage::Resolved;

        let staging = output_dir.join(format!(".{output_name}.staging"));
        if staging.exists() {
            warn!("removing stale staging directory {}", staging.display());
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        let staged_root = self.scaffolder.bootstrap(output_name, &staging)?;
        result.stage = Stage::Bootstrapped;
        info!("bootstrapped output package at {}", staged_root.display());

        let vendor_root = staged_root.join(&self.layout.vendor_dir);
        fs::create_dir_all(&vendor_root).map_err(|e| ComposeError::Finalize {
            staging: staging.clone(),
            source: e,
        })?;

        let mut provenance = Vec::with_capacity(roots.len());
        for (reference, root) in inputs.iter().zip(&roots) {
            let outcome = self
                .vendor_one(reference, root, &staged_root, &vendor_root, &mut result.stage)
                .map_err(|source| ComposeError::Input {
                    reference: reference.clone(),
                    staging: Some(staging.clone()),
                    source,
                })?;
            info!("+ added {} ({:?})", outcome.name, outcome.status);
            provenance.push(self.layout.provenance_line(&outcome.name));
            result.inputs.push(outcome);
        }

        let finalize_err = |source| ComposeError::Finalize {
            staging: staging.clone(),
            source,
        };
        let entry_point = staged_root.join(&self.layout.entry_point);
        if !provenance.is_empty() {
            append_lines(&entry_point, &provenance).map_err(finalize_err)?;
        }
        result.stage = Stage::Finalized;

        if options.gen_mapping {
            let resources = staged_root.join(&self.layout.resource_dir);
            if resources.is_dir() {
                let mapping_file = staged_root.join(&self.layout.mapping_file);
                let count = self
                    .mapper
                    .generate(&staged_root, &self.layout.resource_dir, &mapping_file)
                    .map_err(|source| ComposeError::Mapping {
                        staging: staging.clone(),
                        source,
                    })?;
                append_lines(&entry_point, &[mapping_import(&self.layout.mapping_file)])
                    .map_err(finalize_err)?;
                result.mapping_file = Some(target.join(&self.layout.mapping_file));
                result.mapped_assets = Some(count);
                result.stage = Stage::Mapped;
            } else {
                warn!(
                    "skipping asset mapping: no {} directory found",
                    self.layout.resource_dir
                );
            }
        }

        // A concurrent run may have claimed the target; rename refuses to
        // replace a non-empty directory.
        if fs::symlink_metadata(&target).is_ok() {
            return Err(ComposeError::TargetExists(target));
        }
        fs::rename(&staged_root, &target).map_err(finalize_err)?;
        fs::remove_dir(&staging).map_err(finalize_err)?;
        debug!("moved {} into place", target.display());

        if options.install {
            if let Err(source) = self.installer.install(&target) {
                result.finished_at = Some(Utc::now());
                return Err(ComposeError::Install {
                    source,
                    result: Box::new(result),
                });
            }
            result.installed = true;
            result.stage = Stage::Installed;
        }

        result.stage = Stage::Done;
        result.finished_at = Some(Utc::now());
        info!("combined package created at {}", target.display());
        Ok(result)
    }

    /// Resolve every input up front so collisions are caught before any
    /// output is written.
    fn resolve_inputs(&self, inputs: &[String]) -> Result<Vec<ProjectRoot>, ComposeError> {
        let mut roots: Vec<ProjectRoot> = Vec::with_capacity(inputs.len());
        for reference in inputs {
            let root = self
                .resolver
                .resolve(reference)
                .map_err(|e| ComposeError::Input {
                    reference: reference.clone(),
                    staging: None,
                    source: e.into(),
                })?;
            debug!("{} resolved to {} ({:?})", reference, root.path.display(), root.source);

            if let Some(pos) = roots.iter().position(|r| r.name == root.name) {
                return Err(ComposeError::SlotCollision {
                    name: root.name,
                    first: inputs[pos].clone(),
                    second: reference.clone(),
                });
            }
            if validate_package_name(&root.name).is_err() {
                return Err(ComposeError::Input {
                    reference: reference.clone(),
                    staging: None,
                    source: InputError::Io(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("'{}' is not a usable package name", root.name),
                    )),
                });
            }
            roots.push(root);
        }
        Ok(roots)
    }

    /// Archive, extract and (when installable) declare one input.
    fn vendor_one(
        &self,
        reference: &str,
        root: &ProjectRoot,
        output_root: &Path,
        vendor_root: &Path,
        stage: &mut Stage,
    ) -> Result<InputOutcome, InputError> {
        let name = root.name.as_str();

        // Scratch archive lives inside the vendor root it populates.
        let scratch = vendor_root.join(format!(".{name}.tar.gz"));
        let listing = self.archiver.archive(&root.path, &scratch)?;
        *stage = Stage::Archived;

        let slot = vendor_root.join(name);
        fs::create_dir(&slot)?;
        let extracted = extract_archive(&scratch, &slot)?;
        fs::remove_file(&scratch)?;
        *stage = Stage::Extracted;

        let status = match manifest::find_build_metadata(&slot, name, &self.layout.metadata_files) {
            Some(found) => {
                debug!("{name}: build metadata at {}", found.display());
                let package_dir = found.parent().unwrap_or(slot.as_path());
                let locator = relative_locator(output_root, package_dir).ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("{} is outside the output package", package_dir.display()),
                    )
                })?;
                manifest::add_dependency(
                    &output_root.join(&self.layout.manifest_file),
                    name,
                    &locator,
                )?;
                *stage = Stage::Patched;
                InputStatus::Patched {
                    entry: format!("{name} @ file://{locator}"),
                }
            }
            None => {
                info!("skipping dependency declaration for asset-only package: {name}");
                InputStatus::VendoredOnly
            }
        };

        Ok(InputOutcome {
            reference: reference.to_string(),
            name: name.to_string(),
            source_root: root.path.clone(),
            slot: self.layout.slot_rel(name),
            files: extracted.len(),
            archive_sha256: listing.archive_sha256,
            status,
        })
    }
}

/// `./`-prefixed, `/`-separated path of `dir` relative to `output_root`
fn relative_locator(output_root: &Path, dir: &Path) -> Option<String> {
    let rel = dir.strip_prefix(output_root).ok()?;
    let parts: Vec<_> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect();
    Some(format!("./{}", parts.join("/")))
}

/// Import line wiring the generated mapping into the entry point
fn mapping_import(mapping_file: &str) -> String {
    let module = mapping_file.strip_suffix(".py").unwrap_or(mapping_file);
    format!("from .{module} import assets")
}

/// Append a block of lines, preceded by a blank line
fn append_lines(path: &Path, lines: &[String]) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    write!(file, "\n{}\n", lines.join("\n"))?;
    file.flush()
}
