//! Effective configuration with provenance
//!
//! Records which files contributed to the merged settings, with a SHA-256
//! digest of each, so `--verbose` runs can report exactly what was applied.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::defaults::Settings;
use super::merge::merge_layers;

/// Project-level config file name, looked up in the working directory
pub const PROJECT_CONFIG_FILE: &str = "assetkit.toml";

/// Origin of a configuration source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    User,
    Project,
    Cli,
}

/// A contributing config source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// SHA-256 of the raw file bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl ConfigSource {
    /// `origin path (sha256 digest)`, with `-` for absent parts
    pub fn describe(&self) -> String {
        let origin = match self.origin {
            ConfigOrigin::Builtin => "builtin",
            ConfigOrigin::User => "user",
            ConfigOrigin::Project => "project",
            ConfigOrigin::Cli => "cli",
        };
        let path = self
            .path
            .as_ref()
            .map_or_else(|| "-".to_string(), |p| p.display().to_string());
        format!("{origin} {path} (sha256 {})", self.digest.as_deref().unwrap_or("-"))
    }
}

/// Merged settings plus where they came from
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub settings: Settings,
    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// `$XDG_CONFIG_HOME/assetkit/config.toml`, falling back to `~/.config`
pub fn user_config_path() -> Option<PathBuf> {
    let base = env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join("assetkit").join("config.toml"))
}

impl EffectiveConfig {
    /// Build from layers. Missing files are skipped; unreadable or invalid
    /// ones are errors.
    pub fn build(
        user_config: Option<&Path>,
        project_config: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = vec![Settings::default().to_value()];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        for (origin, path) in [
            (ConfigOrigin::User, user_config),
            (ConfigOrigin::Project, project_config),
        ] {
            let Some(path) = path.filter(|p| p.exists()) else {
                continue;
            };
            let (value, digest) = load_toml_file(path)?;
            layers.push(value);
            sources.push(ConfigSource {
                origin,
                path: Some(path.to_path_buf()),
                digest: Some(digest),
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers);
        let settings: Settings = serde_json::from_value(merged)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        settings
            .exclusion_policy()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if settings.resolve.manifest_files.is_empty() {
            return Err(ConfigError::Invalid(
                "resolve.manifest_files must name at least one file".to_string(),
            ));
        }

        Ok(Self { settings, sources })
    }
}

/// Parse a TOML file into a JSON value, returning it with its digest
fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
    let bytes = fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let digest = hex::encode(Sha256::digest(&bytes));

    let parse_err = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };
    let text = String::from_utf8(bytes).map_err(|e| parse_err(format!("invalid UTF-8: {e}")))?;
    let table: toml::Table = toml::from_str(&text).map_err(|e| parse_err(e.to_string()))?;
    let value = serde_json::to_value(table).map_err(|e| parse_err(e.to_string()))?;

    Ok((value, digest))
}
