//! Build manifest patching
//!
//! File-level wrapper around the `assetkit-setupcfg` line editor, plus
//! detection of build metadata inside extracted vendor slots.

use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub use assetkit_setupcfg::{Dependency, Insertion, PatchError, SetupCfg};

/// Manifest file patched in the output package root
pub const MANIFEST_FILE: &str = "setup.cfg";

/// Errors for manifest patching
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("cannot access manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot patch manifest {path}: {source}")]
    Patch {
        path: PathBuf,
        #[source]
        source: PatchError,
    },
}

/// Declare `name` as a local dependency located at `locator` in `manifest_path`.
///
/// The file is rewritten through a sibling temporary file and a rename, so a
/// failed write never leaves a truncated manifest behind.
pub fn add_dependency(
    manifest_path: &Path,
    name: &str,
    locator: &str,
) -> Result<Insertion, ManifestError> {
    let io_err = |source| ManifestError::Io {
        path: manifest_path.to_path_buf(),
        source,
    };
    let patch_err = |source| ManifestError::Patch {
        path: manifest_path.to_path_buf(),
        source,
    };

    let text = fs::read_to_string(manifest_path).map_err(io_err)?;
    let dependency = Dependency::new(name, locator).map_err(patch_err)?;
    let mut cfg = SetupCfg::parse(&text).map_err(patch_err)?;
    let insertion = cfg.add_dependency(&dependency).map_err(patch_err)?;

    if insertion != Insertion::AlreadyPresent {
        let tmp = manifest_path.with_extension("cfg.tmp");
        fs::write(&tmp, cfg.to_string()).map_err(io_err)?;
        fs::rename(&tmp, manifest_path).map_err(io_err)?;
    }

    debug!(
        "{}: {} -> {:?}",
        manifest_path.display(),
        dependency.entry(),
        insertion
    );
    Ok(insertion)
}

/// Locate build metadata in an extracted vendor slot.
///
/// Archives reproduce `<package-name>/...`, so metadata normally sits one
/// level down in `<slot>/<name>/`; the slot root itself is checked first.
pub fn find_build_metadata<S: AsRef<str>>(
    slot: &Path,
    name: &str,
    metadata_files: &[S],
) -> Option<PathBuf> {
    [slot.to_path_buf(), slot.join(name)]
        .into_iter()
        .flat_map(|dir| {
            metadata_files
                .iter()
                .map(move |f| dir.join(f.as_ref()))
                .collect::<Vec<_>>()
        })
        .find(|p| p.is_file())
}
