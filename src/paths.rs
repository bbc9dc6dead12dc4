//! Project path resolution for sitesync
//!
//! A project is a directory holding `sitesync.toml` (or `sitesync.json`).
//! Engine state lives under `<project>/.sitesync/`.
//!
//! # Project Root Resolution
//!
//! 1. `-C/--project` flag (also read from `SITESYNC_PROJECT_DIR`)
//! 2. Nearest ancestor of the current directory holding a config file
//! 3. The current directory

use crate::config::find_config_file;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for project directory override
pub const ENV_PROJECT_DIR: &str = "SITESYNC_PROJECT_DIR";

/// Resolve the project root
pub fn project_root(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        let path = expand(dir);
        log::debug!("Using project dir from flag/env: {}", path.display());
        return Ok(path);
    }

    let cwd = std::env::current_dir().context("Could not determine current directory")?;
    match find_project_root(&cwd) {
        Some(root) => {
            log::debug!("Found project root: {}", root.display());
            Ok(root)
        }
        None => {
            log::debug!("No config found above {}, using it as root", cwd.display());
            Ok(cwd)
        }
    }
}

/// Walk up from `start` to the first directory holding a config file
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| find_config_file(dir).is_some())
        .map(Path::to_path_buf)
}

/// Resolve a configured path against the project root
///
/// `~` and `$VARS` are expanded first; relative results are taken from the
/// project root, not the current directory.
pub fn resolve(root: &Path, path: &str) -> PathBuf {
    let expanded = expand(path);
    if expanded.is_absolute() {
        expanded
    } else {
        root.join(expanded)
    }
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    /// Run with a temporary env var
    ///
    /// # Safety
    /// Uses env::set_var/remove_var; only call from tests that do not read
    /// the same variable concurrently.
    fn with_env_var<F, R>(key: &str, value: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: the variable is unique to the calling test
        unsafe { env::set_var(key, value) };
        let result = f();
        match original {
            // SAFETY: as above
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        result
    }

    #[test]
    fn test_explicit_root_wins() {
        let root = project_root(Some("/custom/site")).unwrap();
        assert_eq!(root, PathBuf::from("/custom/site"));
    }

    #[test]
    fn test_explicit_root_with_tilde() {
        let home = dirs::home_dir().unwrap();
        let root = project_root(Some("~/sites/blog")).unwrap();
        assert_eq!(root, home.join("sites").join("blog"));
    }

    #[test]
    fn test_find_project_root_walks_up() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("sitesync.toml"), "").unwrap();
        let nested = dir.path().join("content").join("pages");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_project_root(&nested).unwrap(), dir.path());
    }

    #[test]
    fn test_find_project_root_json() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("sitesync.json"), "{}").unwrap();
        assert_eq!(find_project_root(dir.path()).unwrap(), dir.path());
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let root = Path::new("/srv/site");
        assert_eq!(resolve(root, "manifest.json"), root.join("manifest.json"));
        assert_eq!(
            resolve(root, "/etc/manifest.json"),
            PathBuf::from("/etc/manifest.json")
        );
    }

    #[test]
    fn test_expand_with_env_var() {
        with_env_var("SITESYNC_TEST_VAR", "blog", || {
            let result = expand("/sites/$SITESYNC_TEST_VAR/manifest.json");
            assert_eq!(result, PathBuf::from("/sites/blog/manifest.json"));
        });
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        let result = expand("/path/$NONEXISTENT_VAR_12345/file");
        assert_eq!(result, PathBuf::from("/path/$NONEXISTENT_VAR_12345/file"));
    }

    #[test]
    fn test_env_var_constant() {
        assert_eq!(ENV_PROJECT_DIR, "SITESYNC_PROJECT_DIR");
    }
}
