//! Installed application records.
//!
//! App lists are produced by whatever scanned the device and are never
//! persisted. Two input shapes are accepted: a JSON array of
//! `{"name": ..., "package": ...}` objects, or plain text with one package
//! name per line.

use serde::{Deserialize, Serialize};

/// An installed application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppInfo {
    pub app_name: String,
    pub icon: i32,
    pub package_name: String,
    pub is_user_app: bool,
}

impl AppInfo {
    /// Creates a user app record with no icon.
    pub fn new(app_name: impl Into<String>, package_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            icon: 0,
            package_name: package_name.into(),
            is_user_app: true,
        }
    }

    /// Creates a record from just a package name.
    pub fn from_package(package_name: impl Into<String>) -> Self {
        let package_name = package_name.into();
        Self::new(package_name.clone(), package_name)
    }
}

/// One entry of a JSON package dump.
#[derive(Debug, Clone, Deserialize)]
struct PackageListItem {
    name: String,
    #[serde(rename = "package")]
    package_name: String,
}

/// Parses a package list in either accepted shape.
///
/// Input whose first non-blank character is `[` must be the JSON shape;
/// anything else is read as text. Blank entries are skipped either way.
pub fn parse_package_list(input: &str) -> Result<Vec<AppInfo>, serde_json::Error> {
    if input.trim_start().starts_with('[') {
        let items: Vec<PackageListItem> = serde_json::from_str(input)?;
        return Ok(items
            .into_iter()
            .filter(|item| !item.package_name.trim().is_empty())
            .map(|item| AppInfo::new(item.name, item.package_name.trim()))
            .collect());
    }

    Ok(input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(AppInfo::from_package)
        .collect())
}
