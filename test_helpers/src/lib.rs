//! Test helpers for the powerspec workspace
//!
//! Locates the workspace root, hands out paths in a shared `test_output/`
//! directory for spectra dumped by integration tests, and installs a
//! test-friendly logger.

use once_cell::sync::Lazy;
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable that relocates the artifact directory
pub const OUTPUT_DIR_VAR: &str = "POWERSPEC_TEST_OUTPUT";

/// Error type for test helper operations
#[derive(thiserror::Error, Debug)]
pub enum TestHelperError {
    #[error("Failed to find workspace root: {0}")]
    WorkspaceRootNotFound(String),
}

/// Returns the workspace root, the first ancestor of the current directory
/// whose Cargo.toml declares `[workspace]`.
pub fn find_workspace_root() -> Result<PathBuf, TestHelperError> {
    let mut current_dir = env::current_dir().map_err(|e| {
        TestHelperError::WorkspaceRootNotFound(format!("Failed to get current directory: {e}"))
    })?;

    loop {
        let cargo_toml = current_dir.join("Cargo.toml");
        if cargo_toml.exists() {
            let content = std::fs::read_to_string(&cargo_toml).map_err(|e| {
                TestHelperError::WorkspaceRootNotFound(format!("Failed to read Cargo.toml: {e}"))
            })?;
            if content.contains("[workspace]") {
                return Ok(current_dir);
            }
        }

        if !current_dir.pop() {
            break;
        }
    }

    Err(TestHelperError::WorkspaceRootNotFound(
        "no Cargo.toml with [workspace] above the current directory".to_string(),
    ))
}

static WORKSPACE_ROOT: Lazy<PathBuf> =
    Lazy::new(|| find_workspace_root().expect("Failed to find workspace root directory"));

/// Directory for test artifacts, created on first use.
///
/// `$POWERSPEC_TEST_OUTPUT` when set, `<workspace>/test_output` otherwise.
pub fn get_output_dir() -> PathBuf {
    let output_dir = match env::var_os(OUTPUT_DIR_VAR) {
        Some(dir) => PathBuf::from(dir),
        None => WORKSPACE_ROOT.join("test_output"),
    };
    if !output_dir.exists() {
        std::fs::create_dir_all(&output_dir).expect("Failed to create output directory");
    }
    output_dir
}

/// `path` inside the artifact directory.
pub fn output_path<P: AsRef<Path>>(path: P) -> PathBuf {
    get_output_dir().join(path)
}

/// Route `log` output through the test harness; safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_has_members() {
        let root = find_workspace_root().expect("Failed to find workspace root");
        assert!(root.join("Cargo.toml").exists());
        assert!(root.join("powerspec").is_dir());
    }

    #[test]
    fn test_output_path() {
        let path = output_path("pk.txt");
        assert_eq!(path, get_output_dir().join("pk.txt"));
        assert!(get_output_dir().is_dir());
    }
}
