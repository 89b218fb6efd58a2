//! Local dependency declarations (`<name> @ file://<path>`)

use crate::PatchError;

/// A dependency on a package vendored at a relative path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    name: String,
    locator: String,
}

impl Dependency {
    /// Create a dependency, rejecting values that would break the line format.
    pub fn new(name: &str, locator: &str) -> Result<Self, PatchError> {
        if name.is_empty() || name.contains(|c: char| c.is_whitespace() || c == '@') {
            return Err(PatchError::InvalidEntry(format!("bad package name '{name}'")));
        }
        if locator.is_empty() || locator.contains(['\n', '\r']) {
            return Err(PatchError::InvalidEntry(format!("bad locator '{locator}'")));
        }
        Ok(Self {
            name: name.to_string(),
            locator: locator.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// The entry as written in the list, without indentation.
    pub fn entry(&self) -> String {
        format!("{} @ file://{}", self.name, self.locator)
    }

    /// Requirement name of an arbitrary list entry.
    pub(crate) fn name_of(entry: &str) -> Option<&str> {
        let end = entry
            .find(|c: char| c.is_whitespace() || "@<>=!~;[(".contains(c))
            .unwrap_or(entry.len());
        let name = &entry[..end];
        (!name.is_empty()).then_some(name)
    }
}

/// Normalize a requirement name so `Foo_Bar`, `foo-bar` and `foo.bar` compare equal.
pub fn normalize_name(name: &str) -> String {
    name.to_ascii_lowercase().replace(['_', '.'], "-")
}
