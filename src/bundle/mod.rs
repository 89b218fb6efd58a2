//! Package archiving
//!
//! Walks a package root, prunes excluded subtrees before descending, and
//! writes a gzip-compressed tar whose entries are rooted one level above the
//! package root (`<package-name>/...`). Paths are computed explicitly from
//! the root's parent; the process working directory is never changed.

mod exclude;
mod extract;
mod listing;

pub use exclude::{
    ExcludeError, ExclusionPolicy, DEFAULT_DIR_NAMES, DEFAULT_DIR_SUFFIXES,
    DEFAULT_FILE_EXTENSIONS,
};
pub use extract::{extract_archive, validate_entry_path, ExtractError};
pub use listing::{ArchiveListing, EntryType, ListingEntry, SCHEMA_ID};

use chrono::Utc;
use flate2::{Compression, GzBuilder};
use log::debug;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use tar::{Builder, Header};
use walkdir::WalkDir;

/// Errors for archive creation
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("package root does not exist: {0}")]
    RootMissing(PathBuf),

    #[error("cannot create archive at {path}: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Walk error: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("Symlink escapes package root: {path}")]
    SymlinkEscapesRoot { path: PathBuf },

    #[error("Path is not within package root: {0}")]
    PathNotInRoot(PathBuf),
}

/// Package archiver
#[derive(Debug, Clone, Default)]
pub struct Archiver {
    policy: ExclusionPolicy,
}

/// Information about a collected entry
struct EntryInfo {
    full_path: PathBuf,
    entry_type: EntryType,
    symlink_target: Option<PathBuf>,
}

impl Archiver {
    pub fn new(policy: ExclusionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ExclusionPolicy {
        &self.policy
    }

    /// Collect every entry to archive, keyed by archive-relative path.
    ///
    /// Excluded directories are pruned before the walk descends into them,
    /// so no excluded descendant is ever visited.
    fn collect_entries(
        &self,
        root: &Path,
        skip: Option<&Path>,
    ) -> Result<BTreeMap<PathBuf, EntryInfo>, ArchiveError> {
        let base = root.parent().unwrap_or(root);
        let mut entries = BTreeMap::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                match entry.path().strip_prefix(root) {
                    Ok(rel) if self.policy.is_excluded(rel) => {
                        debug!("pruning excluded directory {}", rel.display());
                        false
                    }
                    _ => true,
                }
            });

        for entry in walker {
            let entry = entry?;
            let path = entry.path();
            let rel_path = path
                .strip_prefix(base)
                .map_err(|_| ArchiveError::PathNotInRoot(path.to_path_buf()))?;

            // Rules apply below the root, never to the package's own name.
            let in_root = path.strip_prefix(root).unwrap_or(rel_path);
            if rel_path.as_os_str().is_empty()
                || (!in_root.as_os_str().is_empty() && self.policy.is_excluded(in_root))
            {
                continue;
            }
            // The archive being written may live inside the tree it packs.
            if skip == Some(path) {
                continue;
            }

            let file_type = entry.file_type();
            let info = if file_type.is_symlink() {
                let target = fs::read_link(path)?;
                let resolved = if target.is_absolute() {
                    target.clone()
                } else {
                    path.parent().unwrap_or(path).join(&target)
                };
                let canonical = resolved
                    .canonicalize()
                    .unwrap_or_else(|_| normalize_lexically(&resolved));
                if !canonical.starts_with(root) {
                    return Err(ArchiveError::SymlinkEscapesRoot {
                        path: path.to_path_buf(),
                    });
                }
                EntryInfo {
                    full_path: path.to_path_buf(),
                    entry_type: EntryType::Symlink,
                    symlink_target: Some(target),
                }
            } else if file_type.is_dir() {
                EntryInfo {
                    full_path: path.to_path_buf(),
                    entry_type: EntryType::Directory,
                    symlink_target: None,
                }
            } else {
                EntryInfo {
                    full_path: path.to_path_buf(),
                    entry_type: EntryType::File,
                    symlink_target: None,
                }
            };

            entries.insert(rel_path.to_path_buf(), info);
        }

        Ok(entries)
    }

    /// Archive `root` into a `.tar.gz` at `destination`.
    ///
    /// Never mutates `root`. On failure the partially written destination is
    /// removed, so either exactly one complete archive exists or none does.
    pub fn archive(&self, root: &Path, destination: &Path) -> Result<ArchiveListing, ArchiveError> {
        if !root.is_dir() {
            return Err(ArchiveError::RootMissing(root.to_path_buf()));
        }
        let root = root.canonicalize()?;

        let file = File::create(destination).map_err(|source| ArchiveError::Destination {
            path: destination.to_path_buf(),
            source,
        })?;

        let skip = destination.canonicalize().ok();
        let written = self.write_archive(&root, skip.as_deref(), BufWriter::new(file));
        let entries = match written {
            Ok(entries) => entries,
            Err(e) => {
                let _ = fs::remove_file(destination);
                return Err(e);
            }
        };

        let (archive_sha256, archive_size) = hash_file(destination)?;
        let package = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!(
            "archived {} ({} entries) to {}",
            package,
            entries.len(),
            destination.display()
        );

        Ok(ArchiveListing {
            schema_id: SCHEMA_ID.to_string(),
            package,
            archive_path: destination.to_path_buf(),
            archive_sha256,
            archive_size,
            created_at: Utc::now(),
            entries,
        })
    }

    fn write_archive<W: Write>(
        &self,
        root: &Path,
        skip: Option<&Path>,
        writer: W,
    ) -> Result<Vec<ListingEntry>, ArchiveError> {
        let entries = self.collect_entries(root, skip)?;
        let encoder = GzBuilder::new()
            .mtime(0)
            .write(writer, Compression::default());
        let mut builder = Builder::new(encoder);
        let mut listing = Vec::with_capacity(entries.len());

        for (rel_path, info) in &entries {
            let archive_path = to_archive_path(rel_path);
            let metadata = fs::symlink_metadata(&info.full_path)?;

            let mut header = Header::new_gnu();
            header.set_uid(0);
            header.set_gid(0);
            header.set_mtime(mtime_of(&metadata));

            match info.entry_type {
                EntryType::File => {
                    let mut contents = Vec::new();
                    File::open(&info.full_path)?.read_to_end(&mut contents)?;

                    header.set_entry_type(tar::EntryType::Regular);
                    header.set_size(contents.len() as u64);
                    header.set_mode(file_mode(&metadata, 0o644));
                    builder.append_data(&mut header, &archive_path, contents.as_slice())?;

                    listing.push(ListingEntry {
                        path: archive_path,
                        size: contents.len() as u64,
                        sha256: hex::encode(Sha256::digest(&contents)),
                        entry_type: EntryType::File,
                        symlink_target: None,
                    });
                }
                EntryType::Directory => {
                    header.set_entry_type(tar::EntryType::Directory);
                    header.set_size(0);
                    header.set_mode(file_mode(&metadata, 0o755));
                    builder.append_data(&mut header, format!("{archive_path}/"), io::empty())?;

                    listing.push(ListingEntry {
                        path: archive_path,
                        size: 0,
                        sha256: String::new(),
                        entry_type: EntryType::Directory,
                        symlink_target: None,
                    });
                }
                EntryType::Symlink => {
                    let Some(target) = info.symlink_target.as_ref() else {
                        continue;
                    };
                    header.set_entry_type(tar::EntryType::Symlink);
                    header.set_size(0);
                    header.set_mode(0o777);
                    builder.append_link(&mut header, &archive_path, target)?;

                    listing.push(ListingEntry {
                        path: archive_path,
                        size: 0,
                        sha256: String::new(),
                        entry_type: EntryType::Symlink,
                        symlink_target: Some(target.to_string_lossy().into_owned()),
                    });
                }
            }
        }

        let encoder = builder.into_inner()?;
        let mut writer = encoder.finish()?;
        writer.flush()?;

        Ok(listing)
    }
}

/// `/`-joined archive path for a relative filesystem path
fn to_archive_path(rel_path: &Path) -> String {
    rel_path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Resolve `.` and `..` without touching the filesystem
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn mtime_of(metadata: &fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata, _fallback: u32) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata, fallback: u32) -> u32 {
    fallback
}

/// SHA-256 and size of a file on disk
fn hash_file(path: &Path) -> io::Result<(String, u64)> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    let mut size = 0u64;
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        size += read as u64;
        hasher.update(&buffer[..read]);
    }
    Ok((hex::encode(hasher.finalize()), size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use tempfile::TempDir;

    /// `<tmp>/demo/{setup.cfg, demo/__init__.py, demo/resources/assets/hello.txt}`
    /// plus build artifacts that must never be archived.
    fn create_package(tmp: &TempDir) -> PathBuf {
        let root = tmp.path().join("demo");
        let payload = root.join("demo");
        fs::create_dir_all(payload.join("resources/assets")).unwrap();
        fs::write(root.join("setup.cfg"), "[metadata]\nname = demo\n").unwrap();
        fs::write(payload.join("__init__.py"), "").unwrap();
        fs::write(payload.join("resources/assets/hello.txt"), "hello").unwrap();

        fs::create_dir_all(payload.join("__pycache__")).unwrap();
        fs::write(payload.join("__pycache__/mod.cpython-311.pyc"), "x").unwrap();
        fs::create_dir_all(root.join("build/lib")).unwrap();
        fs::write(root.join("build/lib/file.py"), "x").unwrap();
        fs::create_dir_all(root.join("demo.egg-info")).unwrap();
        fs::write(root.join("demo.egg-info/PKG-INFO"), "x").unwrap();
        fs::write(payload.join("stale.pyc"), "x").unwrap();
        root
    }

    fn archive_names(path: &Path) -> Vec<String> {
        let mut archive = tar::Archive::new(GzDecoder::new(File::open(path).unwrap()));
        archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_archive_paths_rooted_at_parent() {
        let tmp = TempDir::new().unwrap();
        let root = create_package(&tmp);
        let dest = tmp.path().join("demo.tar.gz");

        let listing = Archiver::default().archive(&root, &dest).unwrap();
        let names = archive_names(&dest);

        assert!(names.contains(&"demo/setup.cfg".to_string()));
        assert!(names.contains(&"demo/demo/resources/assets/hello.txt".to_string()));
        assert!(names.iter().all(|n| n.starts_with("demo/")));
        assert_eq!(listing.package, "demo");
        assert_eq!(listing.archive_sha256.len(), 64);
    }

    #[test]
    fn test_excluded_subtrees_absent() {
        let tmp = TempDir::new().unwrap();
        let root = create_package(&tmp);
        let dest = tmp.path().join("demo.tar.gz");

        let listing = Archiver::default().archive(&root, &dest).unwrap();
        let names = archive_names(&dest);

        for name in &names {
            assert!(!name.contains("__pycache__"), "{name}");
            assert!(!name.contains("/build"), "{name}");
            assert!(!name.contains(".egg-info"), "{name}");
            assert!(!name.ends_with(".pyc"), "{name}");
        }
        assert!(!listing.contains_under("demo/build"));
    }

    #[test]
    fn test_root_is_not_mutated() {
        let tmp = TempDir::new().unwrap();
        let root = create_package(&tmp);
        let before: Vec<_> = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .map(|e| e.unwrap().path().to_path_buf())
            .collect();

        Archiver::default()
            .archive(&root, &tmp.path().join("out.tar.gz"))
            .unwrap();

        let after: Vec<_> = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .map(|e| e.unwrap().path().to_path_buf())
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_repeated_archives_identical() {
        let tmp = TempDir::new().unwrap();
        let root = create_package(&tmp);

        let first = Archiver::default()
            .archive(&root, &tmp.path().join("a.tar.gz"))
            .unwrap();
        let second = Archiver::default()
            .archive(&root, &tmp.path().join("b.tar.gz"))
            .unwrap();

        assert_eq!(first.archive_sha256, second.archive_sha256);
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/a/b/../../c/./d")),
            PathBuf::from("/c/d")
        );
    }

    #[test]
    fn test_missing_root_rejected() {
        let tmp = TempDir::new().unwrap();
        let err = Archiver::default()
            .archive(&tmp.path().join("nope"), &tmp.path().join("x.tar.gz"))
            .unwrap_err();

        assert!(matches!(err, ArchiveError::RootMissing(_)));
        assert!(!tmp.path().join("x.tar.gz").exists());
    }

    #[test]
    fn test_uncreatable_destination_rejected() {
        let tmp = TempDir::new().unwrap();
        let root = create_package(&tmp);
        let err = Archiver::default()
            .archive(&root, &tmp.path().join("missing/dir/x.tar.gz"))
            .unwrap_err();

        assert!(matches!(err, ArchiveError::Destination { .. }));
    }

    #[test]
    fn test_destination_inside_root_skipped() {
        let tmp = TempDir::new().unwrap();
        let root = create_package(&tmp);

        let listing = Archiver::default()
            .archive(&root, &root.join("demo.tar.gz"))
            .unwrap();

        assert!(listing.find_entry("demo/demo.tar.gz").is_none());
    }

    #[test]
    fn test_custom_policy_applies() {
        let tmp = TempDir::new().unwrap();
        let root = create_package(&tmp);
        fs::write(root.join("demo/resources/assets/notes.log"), "x").unwrap();

        let policy = ExclusionPolicy::default().with_patterns(&["**/*.log"]).unwrap();
        let listing = Archiver::new(policy)
            .archive(&root, &tmp.path().join("x.tar.gz"))
            .unwrap();

        assert!(listing.find_entry("demo/demo/resources/assets/notes.log").is_none());
        assert!(listing.find_entry("demo/demo/resources/assets/hello.txt").is_some());
    }

    #[cfg(unix)]
    mod symlink_tests {
        use super::*;
        use std::os::unix::fs::symlink;

        #[test]
        fn test_symlink_escape_rejected() {
            let tmp = TempDir::new().unwrap();
            let root = create_package(&tmp);
            symlink("../../../etc/passwd", root.join("escape")).unwrap();

            let dest = tmp.path().join("x.tar.gz");
            let err = Archiver::default().archive(&root, &dest).unwrap_err();

            assert!(matches!(err, ArchiveError::SymlinkEscapesRoot { .. }));
            assert!(!dest.exists());
        }

        #[test]
        fn test_internal_symlink_preserved() {
            let tmp = TempDir::new().unwrap();
            let root = create_package(&tmp);
            symlink("setup.cfg", root.join("link.cfg")).unwrap();

            let listing = Archiver::default()
                .archive(&root, &tmp.path().join("x.tar.gz"))
                .unwrap();
            let entry = listing.find_entry("demo/link.cfg").unwrap();

            assert_eq!(entry.entry_type, EntryType::Symlink);
            assert_eq!(entry.symlink_target.as_deref(), Some("setup.cfg"));
        }
    }
}
