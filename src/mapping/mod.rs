//! Typed asset mapping generation
//!
//! Writes a Python module exposing one accessor property per file under a
//! package's resource directory, so assets can be reached as attributes.

use log::debug;
use regex_lite::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path};
use walkdir::WalkDir;

/// Errors for mapping generation
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("resource directory not found: {0}")]
    MissingResources(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Python keywords; an accessor with one of these names would not parse
const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

/// Generates an asset accessor file for a package
pub trait AssetMapper {
    /// Generate `output_file` for the resources under `package_root/resource_rel_dir`.
    ///
    /// Returns the number of assets mapped.
    fn generate(
        &self,
        package_root: &Path,
        resource_rel_dir: &str,
        output_file: &Path,
    ) -> Result<usize, MappingError>;
}

/// Emits `assets.py` with an `AssetsProxy` class
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonAssetMapping;

impl AssetMapper for PythonAssetMapping {
    fn generate(
        &self,
        package_root: &Path,
        resource_rel_dir: &str,
        output_file: &Path,
    ) -> Result<usize, MappingError> {
        let resource_root = package_root.join(resource_rel_dir);
        if !resource_root.is_dir() {
            return Err(MappingError::MissingResources(
                resource_root.display().to_string(),
            ));
        }

        let keys = collect_asset_keys(&resource_root)?;
        let package = package_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let source = render_module(&package, resource_rel_dir, &attribute_names(&keys));

        fs::write(output_file, source)?;
        debug!("mapped {} assets into {}", keys.len(), output_file.display());
        Ok(keys.len())
    }
}

/// Sorted `/`-separated keys of every file under `resource_root`
pub fn collect_asset_keys(resource_root: &Path) -> Result<Vec<String>, MappingError> {
    let mut keys = Vec::new();
    for entry in WalkDir::new(resource_root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(resource_root) else {
            continue;
        };
        let key = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");
        keys.push(key);
    }
    keys.sort();
    Ok(keys)
}

/// Turn `config/model.yaml` into `config_model_yaml`.
pub fn sanitize_key(key: &str) -> String {
    let invalid = Regex::new(r"[^0-9A-Za-z_]").expect("static pattern");
    let joined = key
        .split('/')
        .map(|part| invalid.replace_all(part, "_").into_owned())
        .collect::<Vec<_>>()
        .join("_");
    let trimmed = joined.trim_matches('_');
    if trimmed.is_empty() || trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{trimmed}")
    } else if PYTHON_KEYWORDS.contains(&trimmed) {
        format!("{trimmed}_")
    } else {
        trimmed.to_string()
    }
}

/// Attribute name for each key; clashes get a numeric suffix.
fn attribute_names(keys: &[String]) -> BTreeMap<String, String> {
    let mut attrs = BTreeMap::new();
    for key in keys {
        let base = sanitize_key(key);
        let mut attr = base.clone();
        let mut n = 2;
        while attrs.contains_key(&attr) {
            attr = format!("{base}_{n}");
            n += 1;
        }
        attrs.insert(attr, key.clone());
    }
    attrs
}

fn render_module(package: &str, resource_dir: &str, attrs: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    out.push_str("from assetkit import AssetManager\n\n");
    out.push_str(&format!(
        "_assets = AssetManager(package_root={}, resource_dir={})\n\n",
        py_str(package),
        py_str(resource_dir)
    ));
    out.push_str("class AssetsProxy:\n");
    out.push_str("    def __init__(self, manager):\n");
    out.push_str("        self._manager = manager\n\n");
    for (attr, key) in attrs {
        out.push_str("    @property\n");
        out.push_str(&format!("    def {attr}(self):\n"));
        out.push_str(&format!("        \"\"\"Access asset: {}\"\"\"\n", key.replace('"', "'")));
        out.push_str(&format!("        return self._manager[{}]\n\n", py_str(key)));
    }
    out.push_str("assets = AssetsProxy(_assets)\n");
    out
}

/// Single-quoted Python string literal
fn py_str(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}
