//! Listing of the entries written into a package archive
//!
//! Produced alongside every archive so callers can report what was packed
//! (and verify exclusions) without re-reading the tarball.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Schema identifier for serialized listings
pub const SCHEMA_ID: &str = "assetkit/archive_listing@1";

/// Entry type in the listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Directory,
    Symlink,
}

/// A single archive entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingEntry {
    /// Archive-relative path (`<package>/...`, `/`-separated)
    pub path: String,

    /// Size in bytes (0 for directories and symlinks)
    pub size: u64,

    /// SHA-256 of file contents (empty for directories and symlinks)
    pub sha256: String,

    #[serde(rename = "type")]
    pub entry_type: EntryType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub symlink_target: Option<String>,
}

/// Everything written by one archive run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveListing {
    pub schema_id: String,

    /// Package name (base name of the archived root)
    pub package: String,

    /// Where the archive was written
    pub archive_path: PathBuf,

    /// SHA-256 of the compressed archive bytes
    pub archive_sha256: String,

    /// Compressed archive size in bytes
    pub archive_size: u64,

    pub created_at: DateTime<Utc>,

    /// Entries in write order (sorted by path)
    pub entries: Vec<ListingEntry>,
}

impl ArchiveListing {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Total uncompressed size of file entries
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }

    /// Number of regular files packed
    pub fn file_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.entry_type == EntryType::File)
            .count()
    }

    pub fn find_entry(&self, path: &str) -> Option<&ListingEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// True if any entry lives under `prefix` (a `/`-separated path)
    pub fn contains_under(&self, prefix: &str) -> bool {
        let prefix = prefix.trim_end_matches('/');
        self.entries
            .iter()
            .any(|e| e.path == prefix || e.path.starts_with(&format!("{prefix}/")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_listing() -> ArchiveListing {
        ArchiveListing {
            schema_id: SCHEMA_ID.to_string(),
            package: "pkg".to_string(),
            archive_path: PathBuf::from("pkg.tar.gz"),
            archive_sha256: "abc123".to_string(),
            archive_size: 42,
            created_at: Utc::now(),
            entries: vec![
                ListingEntry {
                    path: "pkg/setup.cfg".to_string(),
                    size: 100,
                    sha256: "hash1".to_string(),
                    entry_type: EntryType::File,
                    symlink_target: None,
                },
                ListingEntry {
                    path: "pkg/pkg".to_string(),
                    size: 0,
                    sha256: String::new(),
                    entry_type: EntryType::Directory,
                    symlink_target: None,
                },
            ],
        }
    }

    #[test]
    fn test_serialization() {
        let json = sample_listing().to_json().unwrap();

        assert!(json.contains("\"package\": \"pkg\""));
        assert!(json.contains("\"type\": \"directory\""));
        assert!(!json.contains("symlink_target"));
    }

    #[test]
    fn test_counts() {
        let listing = sample_listing();
        assert_eq!(listing.total_size(), 100);
        assert_eq!(listing.file_count(), 1);
    }

    #[test]
    fn test_contains_under() {
        let listing = sample_listing();
        assert!(listing.contains_under("pkg/pkg"));
        assert!(listing.contains_under("pkg/"));
        assert!(!listing.contains_under("pkg/pk"));
        assert!(listing.find_entry("pkg/setup.cfg").is_some());
    }
}
