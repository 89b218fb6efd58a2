//! Built-in defaults (layer 1) and the typed settings they populate

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::bundle::{
    ExcludeError, ExclusionPolicy, DEFAULT_DIR_NAMES, DEFAULT_DIR_SUFFIXES, DEFAULT_FILE_EXTENSIONS,
};
use crate::compose::ComposeLayout;
use crate::install::PipInstaller;
use crate::resolve::{Resolver, DEFAULT_MANIFEST_FILES};

/// Archive exclusion rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcludeSettings {
    pub dir_names: Vec<String>,
    pub dir_suffixes: Vec<String>,
    pub file_extensions: Vec<String>,
    /// Extra glob patterns
    pub patterns: Vec<String>,
}

impl Default for ExcludeSettings {
    fn default() -> Self {
        Self {
            dir_names: owned(DEFAULT_DIR_NAMES),
            dir_suffixes: owned(DEFAULT_DIR_SUFFIXES),
            file_extensions: owned(DEFAULT_FILE_EXTENSIONS),
            patterns: Vec::new(),
        }
    }
}

/// Package reference resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveSettings {
    /// Files whose presence marks a package root
    pub manifest_files: Vec<String>,
    /// Known install locations, highest precedence first
    pub search_paths: Vec<PathBuf>,
    /// Append `PYTHONPATH` entries after `search_paths`
    pub use_pythonpath: bool,
}

impl Default for ResolveSettings {
    fn default() -> Self {
        Self {
            manifest_files: owned(DEFAULT_MANIFEST_FILES),
            search_paths: Vec::new(),
            use_pythonpath: true,
        }
    }
}

/// Output package layout for compositions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeSettings {
    pub entry_point: String,
    pub mapping_file: String,
    pub resource_dir: String,
}

impl Default for ComposeSettings {
    fn default() -> Self {
        let layout = ComposeLayout::default();
        Self {
            entry_point: layout.entry_point,
            mapping_file: layout.mapping_file,
            resource_dir: layout.resource_dir,
        }
    }
}

/// Installer invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallSettings {
    pub python: String,
}

impl Default for InstallSettings {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
        }
    }
}

/// Fully merged settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub exclude: ExcludeSettings,
    pub resolve: ResolveSettings,
    pub compose: ComposeSettings,
    pub install: InstallSettings,
}

impl Settings {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn exclusion_policy(&self) -> Result<ExclusionPolicy, ExcludeError> {
        ExclusionPolicy::new(
            &self.exclude.dir_names,
            &self.exclude.dir_suffixes,
            &self.exclude.file_extensions,
        )?
        .with_patterns(&self.exclude.patterns)
    }

    pub fn resolver(&self) -> Resolver {
        let resolver = Resolver::new(
            self.resolve.manifest_files.clone(),
            self.resolve.search_paths.clone(),
        );
        if self.resolve.use_pythonpath {
            resolver.with_env_search_paths()
        } else {
            resolver
        }
    }

    pub fn layout(&self) -> ComposeLayout {
        ComposeLayout {
            entry_point: self.compose.entry_point.clone(),
            mapping_file: self.compose.mapping_file.clone(),
            resource_dir: self.compose.resource_dir.clone(),
            metadata_files: self.resolve.manifest_files.clone(),
            ..ComposeLayout::default()
        }
    }

    pub fn installer(&self) -> PipInstaller {
        PipInstaller::new(self.install.python.clone())
    }
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.exclude.dir_names, vec!["__pycache__", "build", "dist"]);
        assert_eq!(settings.exclude.dir_suffixes, vec![".egg-info"]);
        assert_eq!(settings.resolve.manifest_files, vec!["setup.cfg", "pyproject.toml"]);
        assert_eq!(settings.compose.entry_point, "__init__.py");
        assert_eq!(settings.install.python, "python3");
    }

    #[test]
    fn test_to_value() {
        let value = Settings::default().to_value();

        assert_eq!(value["exclude"]["file_extensions"][0], ".pyc");
        assert_eq!(value["compose"]["mapping_file"], "assets.py");
        assert_eq!(value["resolve"]["use_pythonpath"], true);
    }

    #[test]
    fn test_policy_from_settings() {
        let mut settings = Settings::default();
        settings.exclude.patterns = vec!["**/*.log".to_string()];
        let policy = settings.exclusion_policy().unwrap();

        assert!(policy.is_excluded(Path::new("pkg/build")));
        assert!(policy.is_excluded(Path::new("pkg/x.log")));
    }

    #[test]
    fn test_layout_uses_manifest_files() {
        let mut settings = Settings::default();
        settings.resolve.manifest_files = vec!["setup.cfg".to_string()];

        assert_eq!(settings.layout().metadata_files, vec!["setup.cfg"]);
    }
}
