//! External installer invocation
//!
//! Installs a composed package with `python -m pip install .`. The call
//! blocks until the tool exits; there is no timeout.

use log::{debug, info};
use std::io;
use std::path::Path;
use std::process::Command;

/// Errors from external tools
#[derive(Debug, thiserror::Error)]
pub enum ExternalToolError {
    #[error("{program} not found on this system")]
    NotFound { program: String },

    #[error("{program} exited with {status}:\n{stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Installs a package root into the current environment
pub trait Installer {
    fn install(&self, package_root: &Path) -> Result<(), ExternalToolError>;
}

/// `pip` driven through a Python interpreter
#[derive(Debug, Clone)]
pub struct PipInstaller {
    python: String,
}

impl Default for PipInstaller {
    fn default() -> Self {
        Self::new("python3")
    }
}

impl PipInstaller {
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
        }
    }

    pub fn python(&self) -> &str {
        &self.python
    }
}

impl Installer for PipInstaller {
    fn install(&self, package_root: &Path) -> Result<(), ExternalToolError> {
        info!("installing {} with pip", package_root.display());
        run_tool(&self.python, &["-m", "pip", "install", "."], package_root)
    }
}

/// Run `program args...` in `cwd`, surfacing stderr verbatim on failure.
pub fn run_tool(program: &str, args: &[&str], cwd: &Path) -> Result<(), ExternalToolError> {
    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .output()
        .map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ExternalToolError::NotFound {
                program: program.to_string(),
            },
            _ => ExternalToolError::Io {
                program: program.to_string(),
                source,
            },
        })?;

    debug!("{program} stdout:\n{}", String::from_utf8_lossy(&output.stdout));

    if !output.status.success() {
        return Err(ExternalToolError::Failed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_program() {
        let tmp = TempDir::new().unwrap();
        let err = run_tool("assetkit-definitely-missing-tool", &[], tmp.path()).unwrap_err();
        assert!(matches!(err, ExternalToolError::NotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_carries_stderr() {
        let tmp = TempDir::new().unwrap();
        let err = run_tool("sh", &["-c", "echo broken >&2; exit 3"], tmp.path()).unwrap_err();

        match err {
            ExternalToolError::Failed { stderr, .. } => assert_eq!(stderr.trim(), "broken"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_success() {
        let tmp = TempDir::new().unwrap();
        assert!(run_tool("sh", &["-c", "true"], tmp.path()).is_ok());
    }

    #[test]
    fn test_default_interpreter() {
        assert_eq!(PipInstaller::default().python(), "python3");
    }
}
