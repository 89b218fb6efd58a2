//! Package reference resolution
//!
//! A reference may name the outer package root, the nested payload
//! directory, a plain asset directory, or an installed package found in one
//! of the known install locations. Resolution is an explicit probe sequence
//! and the result records which probe matched.

use log::debug;
use std::env;
use std::path::{Path, PathBuf};

/// Files whose presence marks a package root by default
pub const DEFAULT_MANIFEST_FILES: &[&str] = &["setup.cfg", "pyproject.toml"];

/// Errors for reference resolution
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("could not locate package or path: {reference}")]
    NotFound { reference: String },

    #[error("IO error resolving {reference}: {source}")]
    Io {
        reference: String,
        #[source]
        source: std::io::Error,
    },
}

/// Which probe produced the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootSource {
    /// The reference itself carries manifest metadata
    Direct,
    /// The reference was the payload directory; its parent is the root
    Parent,
    /// The reference is an existing directory without manifest metadata
    PlainDirectory,
    /// Found by bare name under a known install location
    Installed { location: PathBuf },
}

/// A resolved package root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRoot {
    /// Canonical absolute path of the root
    pub path: PathBuf,
    /// Logical name (root directory's base name)
    pub name: String,
    pub source: RootSource,
}

/// Resolves package references to project roots
#[derive(Debug, Clone)]
pub struct Resolver {
    manifest_files: Vec<String>,
    search_paths: Vec<PathBuf>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self {
            manifest_files: DEFAULT_MANIFEST_FILES.iter().map(|s| s.to_string()).collect(),
            search_paths: Vec::new(),
        }
    }
}

impl Resolver {
    /// Create a resolver. `search_paths` are probed in order; the first match wins.
    pub fn new(manifest_files: Vec<String>, search_paths: Vec<PathBuf>) -> Self {
        Self {
            manifest_files,
            search_paths,
        }
    }

    /// Append the entries of `PYTHONPATH` after the configured search paths.
    pub fn with_env_search_paths(mut self) -> Self {
        if let Some(value) = env::var_os("PYTHONPATH") {
            self.search_paths
                .extend(env::split_paths(&value).filter(|p| !p.as_os_str().is_empty()));
        }
        self
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// True if `dir` directly contains any recognised manifest file
    pub fn has_manifest(&self, dir: &Path) -> bool {
        self.manifest_files.iter().any(|f| dir.join(f).is_file())
    }

    /// Resolve `reference` to a project root.
    pub fn resolve(&self, reference: &str) -> Result<ProjectRoot, ResolveError> {
        let candidate = Path::new(reference);

        if candidate.is_dir() {
            let path = canonical(reference, candidate)?;

            if self.has_manifest(&path) {
                debug!("{reference}: manifest found at {}", path.display());
                return Ok(root(path, RootSource::Direct));
            }
            if let Some(parent) = path.parent().filter(|p| self.has_manifest(p)) {
                debug!("{reference}: payload directory, root is {}", parent.display());
                return Ok(root(parent.to_path_buf(), RootSource::Parent));
            }
            debug!("{reference}: plain directory without manifest metadata");
            return Ok(root(path, RootSource::PlainDirectory));
        }

        for location in &self.search_paths {
            let installed = location.join(reference);
            if installed.is_dir() {
                debug!("{reference}: found under {}", location.display());
                let path = canonical(reference, &installed)?;
                return Ok(root(
                    path,
                    RootSource::Installed {
                        location: location.clone(),
                    },
                ));
            }
        }

        Err(ResolveError::NotFound {
            reference: reference.to_string(),
        })
    }
}

fn canonical(reference: &str, path: &Path) -> Result<PathBuf, ResolveError> {
    path.canonicalize().map_err(|source| ResolveError::Io {
        reference: reference.to_string(),
        source,
    })
}

fn root(path: PathBuf, source: RootSource) -> ProjectRoot {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    ProjectRoot { path, name, source }
}
