//! Centralized path utilities
//!
//! All application paths in one place for consistency

use std::path::{Path, PathBuf};

use crate::constants::app;

/// Get the manimate config directory (~/.manimate)
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(app::CONFIG_DIR_NAME)
}

/// Get the logs directory (~/.manimate/logs)
pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}

/// Get the credentials file (~/.manimate/tokens/credentials.json)
pub fn credentials_path() -> PathBuf {
    config_dir().join("tokens").join("credentials.json")
}

/// Directory the application lives in.
///
/// `MANIMATE_HOME` wins; otherwise the directory of the running executable,
/// falling back to the current directory.
pub fn app_dir() -> PathBuf {
    if let Ok(home) = std::env::var("MANIMATE_HOME") {
        if !home.is_empty() {
            return PathBuf::from(home);
        }
    }

    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Resolve `path` against `base` unless it is already absolute
pub fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Create a directory (and parents) if missing. Succeeds if it already exists.
pub fn ensure_dir(path: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(path)?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_dir_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("output");

        ensure_dir(&out).unwrap();
        assert!(out.is_dir());
        ensure_dir(&out).unwrap();
        assert!(out.is_dir());
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let base = Path::new("/opt/manimate");
        assert_eq!(
            resolve(base, Path::new("output")),
            PathBuf::from("/opt/manimate/output")
        );
        assert_eq!(resolve(base, Path::new("/tmp/out")), PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_user_paths_nest_under_config_dir() {
        assert!(logs_dir().starts_with(config_dir()));
        assert!(credentials_path().starts_with(config_dir()));
    }
}
