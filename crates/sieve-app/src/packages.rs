//! Installed-package list input.

use std::io::Read;
use std::path::{Path, PathBuf};

use sieve_core::{parse_package_list, AppInfo};
use thiserror::Error;

/// Errors that can occur while loading a package list.
#[derive(Debug, Error)]
pub enum PackagesError {
    /// The list could not be read.
    #[error("failed to read package list {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The list looked like JSON but was not the expected shape.
    #[error("invalid package list {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Reads a package list from `path`, or from stdin when `path` is `-`.
pub fn load_packages(path: &Path) -> Result<Vec<AppInfo>, PackagesError> {
    let read_error = |source: std::io::Error| PackagesError::Read {
        path: path.to_path_buf(),
        source,
    };

    let content = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(read_error)?;
        buffer
    } else {
        std::fs::read_to_string(path).map_err(read_error)?
    };

    parse_package_list(&content).map_err(|source| PackagesError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_text_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("packages.txt");
        std::fs::write(&path, "com.tencent.mm\norg.telegram.messenger\n").unwrap();

        let apps = load_packages(&path).unwrap();
        assert_eq!(apps.len(), 2);
        assert_eq!(apps[1].package_name, "org.telegram.messenger");
    }

    #[test]
    fn test_load_json_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("packages.json");
        std::fs::write(&path, r#"[{"name": "WeChat", "package": "com.tencent.mm"}]"#).unwrap();

        let apps = load_packages(&path).unwrap();
        assert_eq!(apps[0].app_name, "WeChat");
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = load_packages(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, PackagesError::Read { .. }));
    }

    #[test]
    fn test_bad_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("packages.json");
        std::fs::write(&path, "[{").unwrap();

        assert!(matches!(
            load_packages(&path).unwrap_err(),
            PackagesError::Parse { .. }
        ));
    }
}
