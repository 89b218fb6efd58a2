//! Archive extraction into vendor slots
//!
//! Extracts `.tar.gz` package archives with path traversal protection.

use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal { path: String },
}

/// Extract the archive at `archive_path` into `dest_dir`.
///
/// Every entry path is validated before anything is written for it, and
/// entries go through `unpack_in`, which also refuses to write through
/// symlinked parents. Directory modes are applied after all entries are
/// written, so a read-only directory still receives its children.
/// Returns the archive-relative paths of the non-directory entries.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    fs::create_dir_all(dest_dir)?;
    let dest_root = dest_dir.canonicalize()?;
    let file = File::open(archive_path)?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(true);
    let mut extracted = Vec::new();
    let mut dir_modes = Vec::new();

    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        let entry_path = entry.path()?.into_owned();

        validate_entry_path(&entry_path)?;

        if entry.header().entry_type().is_dir() {
            let target = dest_dir.join(&entry_path);
            if !existing_ancestor_within(&target, &dest_root) {
                return Err(ExtractError::PathTraversal {
                    path: entry_path.display().to_string(),
                });
            }
            fs::create_dir_all(&target)?;
            dir_modes.push((entry_path, entry.header().mode()?));
            continue;
        }

        if !entry.unpack_in(dest_dir)? {
            return Err(ExtractError::PathTraversal {
                path: entry_path.display().to_string(),
            });
        }
        extracted.push(entry_path);
    }

    // Deepest first, so tightening a parent never blocks its children.
    dir_modes.sort();
    for (path, mode) in dir_modes.iter().rev() {
        set_dir_mode(&dest_dir.join(path), *mode)?;
    }

    Ok(extracted)
}

/// True if the deepest existing ancestor of `path` resolves inside `root`
fn existing_ancestor_within(path: &Path, root: &Path) -> bool {
    path.ancestors()
        .find(|a| a.exists())
        .and_then(|a| a.canonicalize().ok())
        .is_some_and(|a| a.starts_with(root))
}

#[cfg(unix)]
fn set_dir_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
fn set_dir_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

/// Validate that a tar entry path does not escape the destination
/// directory via `..` components or absolute paths.
pub fn validate_entry_path(path: &Path) -> Result<(), ExtractError> {
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(ExtractError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}
