//! Composition results
//!
//! Ordered per-input outcomes for one composition run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Stages of a composition, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    Resolved,
    Bootstrapped,
    Archived,
    Extracted,
    Patched,
    Finalized,
    Mapped,
    Installed,
    Done,
}

/// What happened to one input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum InputStatus {
    /// Declared as a local dependency in the output manifest
    Patched {
        /// Manifest entry written (or already present)
        entry: String,
    },
    /// Plain asset bundle; copied into its slot without a manifest entry
    VendoredOnly,
}

/// Outcome for one input package
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputOutcome {
    /// Reference as supplied by the caller
    pub reference: String,
    /// Logical name; also the vendor slot name
    pub name: String,
    /// Resolved package root
    pub source_root: PathBuf,
    /// Slot path relative to the output root
    pub slot: String,
    /// Non-directory entries unpacked into the slot
    pub files: usize,
    /// SHA-256 of the transient archive
    pub archive_sha256: String,
    pub status: InputStatus,
}

/// The finished output package and how it was built
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionResult {
    pub output_name: String,
    /// Final output root
    pub root: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Last stage reached
    pub stage: Stage,
    /// Per-input outcomes in input order
    pub inputs: Vec<InputOutcome>,
    /// Generated asset mapping file, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped_assets: Option<usize>,
    pub installed: bool,
}

impl CompositionResult {
    pub(crate) fn new(output_name: &str, root: PathBuf) -> Self {
        Self {
            output_name: output_name.to_string(),
            root,
            started_at: Utc::now(),
            finished_at: None,
            stage: Stage::Init,
            inputs: Vec::new(),
            mapping_file: None,
            mapped_assets: None,
            installed: false,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Number of inputs declared in the output manifest
    pub fn patched_count(&self) -> usize {
        self.inputs
            .iter()
            .filter(|i| matches!(i.status, InputStatus::Patched { .. }))
            .count()
    }

    pub fn find_input(&self, name: &str) -> Option<&InputOutcome> {
        self.inputs.iter().find(|i| i.name == name)
    }

    /// Human-readable summary
    pub fn to_human(&self) -> String {
        let mut out = format!(
            "Combined package created at: {}\n",
            self.root.display()
        );
        for input in &self.inputs {
            let note = match &input.status {
                InputStatus::Patched { .. } => "installable dependency",
                InputStatus::VendoredOnly => "assets only",
            };
            out.push_str(&format!(
                "  + {} -> {} ({} files, {})\n",
                input.name, input.slot, input.files, note
            ));
        }
        if let Some(mapping) = &self.mapping_file {
            out.push_str(&format!(
                "  asset mapping: {} ({} assets)\n",
                mapping.display(),
                self.mapped_assets.unwrap_or(0)
            ));
        }
        if self.installed {
            out.push_str("  installed\n");
        }
        out
    }
}
