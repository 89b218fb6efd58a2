//! Package scaffolding
//!
//! Creates a fresh asset package: build manifest and packaging metadata at
//! the root, and a same-named payload directory holding the resource tree.

use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Placeholder replaced with the package name in every template file
pub const NAME_PLACEHOLDER: &str = "{{PROJECT_NAME}}";

/// Files written at the package root, `(relative path, template)`
const ROOT_TEMPLATES: &[(&str, &str)] = &[
    (
        "setup.cfg",
        "[metadata]\n\
         name = {{PROJECT_NAME}}\n\
         version = 0.1.0\n\
         description = Asset package {{PROJECT_NAME}}\n\
         \n\
         [options]\n\
         packages = find:\n\
         include_package_data = True\n\
         \n\
         [options.package_data]\n\
         * = resources/**/*\n",
    ),
    (
        "pyproject.toml",
        "[build-system]\n\
         requires = [\"setuptools>=61\", \"wheel\"]\n\
         build-backend = \"setuptools.build_meta\"\n",
    ),
    (
        "MANIFEST.in",
        "recursive-include {{PROJECT_NAME}}/resources *\n\
         recursive-include resources *\n",
    ),
    ("assetkit.yaml", "name: {{PROJECT_NAME}}\nresource_dir: resources/assets\n"),
    ("__init__.py", "# {{PROJECT_NAME}} asset package\n"),
];

/// Files written inside the payload directory
const PAYLOAD_TEMPLATES: &[(&str, &str)] = &[("__init__.py", "# {{PROJECT_NAME}}\n")];

/// Resource subtree created inside the payload directory
pub const PAYLOAD_RESOURCE_DIR: &str = "resources/assets";

/// Errors for scaffolding
#[derive(Debug, thiserror::Error)]
pub enum ScaffoldError {
    #[error("invalid package name '{0}'")]
    InvalidName(String),

    #[error("target already exists: {0}")]
    TargetExists(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Creates new package roots
pub trait Scaffolder {
    /// Create `<target_dir>/<name>` and return its path.
    fn bootstrap(&self, name: &str, target_dir: &Path) -> Result<PathBuf, ScaffoldError>;
}

/// Built-in template scaffolder
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateScaffolder;

impl Scaffolder for TemplateScaffolder {
    fn bootstrap(&self, name: &str, target_dir: &Path) -> Result<PathBuf, ScaffoldError> {
        validate_package_name(name)?;
        let root = target_dir.join(name);
        if root.exists() {
            return Err(ScaffoldError::TargetExists(root));
        }

        let payload = root.join(name);
        fs::create_dir_all(payload.join(PAYLOAD_RESOURCE_DIR))?;

        for (file, template) in ROOT_TEMPLATES {
            fs::write(root.join(file), render(template, name))?;
        }
        for (file, template) in PAYLOAD_TEMPLATES {
            fs::write(payload.join(file), render(template, name))?;
        }

        debug!("scaffolded {} at {}", name, root.display());
        Ok(root)
    }
}

fn render(template: &str, name: &str) -> String {
    template.replace(NAME_PLACEHOLDER, name)
}

/// Package names become directory names and manifest entries.
pub fn validate_package_name(name: &str) -> Result<(), ScaffoldError> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(ScaffoldError::InvalidName(name.to_string()))
    }
}
