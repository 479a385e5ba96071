//! Third-party client export formats.
//!
//! | Format | Shape |
//! |---|---|
//! | Surfboard | `{"mode": "allowed"\|"disallowed", "package_name": [...]}` |
//! | NekoBoxAndroid | `true`/`false` line, then one package per line |
//! | ClashMetaForAndroid | one package per line |
//! | FlClash | `{"mode", "acceptList", "rejectList", "sort", "isFilterSystemApp"}` |

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::RuleMode;

/// Supported export targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Surfboard,
    NekoBoxAndroid,
    ClashMetaForAndroid,
    FlClash,
}

impl ExportFormat {
    /// All formats, in display order.
    pub const ALL: [ExportFormat; 4] = [
        ExportFormat::Surfboard,
        ExportFormat::NekoBoxAndroid,
        ExportFormat::ClashMetaForAndroid,
        ExportFormat::FlClash,
    ];

    /// Returns the command-line spelling of this format.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Surfboard => "surfboard",
            ExportFormat::NekoBoxAndroid => "nekobox",
            ExportFormat::ClashMetaForAndroid => "clash-meta",
            ExportFormat::FlClash => "flclash",
        }
    }

    /// Parses the command-line spelling of a format.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "surfboard" => Some(ExportFormat::Surfboard),
            "nekobox" | "nekoboxandroid" => Some(ExportFormat::NekoBoxAndroid),
            "clash-meta" | "clashmetaforandroid" => Some(ExportFormat::ClashMetaForAndroid),
            "flclash" => Some(ExportFormat::FlClash),
            _ => None,
        }
    }

    /// Returns the client's display name.
    pub fn client_name(&self) -> &'static str {
        match self {
            ExportFormat::Surfboard => "Surfboard",
            ExportFormat::NekoBoxAndroid => "NekoBox for Android",
            ExportFormat::ClashMetaForAndroid => "Clash Meta for Android",
            ExportFormat::FlClash => "FlClash",
        }
    }

    /// Returns the Android package of the client that imports this format.
    pub fn client_package(&self) -> &'static str {
        match self {
            ExportFormat::Surfboard => "com.getsurfboard",
            ExportFormat::NekoBoxAndroid => "moe.nb4a",
            ExportFormat::ClashMetaForAndroid => "com.github.metacubex.clash.meta",
            ExportFormat::FlClash => "com.follow.clash",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize)]
struct SurfboardList<'a> {
    mode: &'static str,
    package_name: &'a [&'a str],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FlClashList<'a> {
    mode: &'static str,
    accept_list: &'a [&'a str],
    reject_list: &'a [&'a str],
    sort: &'static str,
    is_filter_system_app: bool,
}

/// Renders an already-filtered package list in `format`.
pub fn render(packages: &[&str], mode: RuleMode, format: ExportFormat) -> Result<String> {
    let rendered = match format {
        ExportFormat::Surfboard => {
            let list = SurfboardList {
                mode: match mode {
                    RuleMode::Proxy => "allowed",
                    RuleMode::ByPass => "disallowed",
                },
                package_name: packages,
            };
            serde_json::to_string(&list)?
        }
        ExportFormat::NekoBoxAndroid => {
            let flag = match mode {
                RuleMode::Proxy => "false",
                RuleMode::ByPass => "true",
            };
            format!("{}\n{}", flag, packages.join("\n"))
        }
        ExportFormat::ClashMetaForAndroid => packages.join("\n"),
        ExportFormat::FlClash => {
            let (mode_name, accept_list, reject_list): (_, &[&str], &[&str]) = match mode {
                RuleMode::Proxy => ("rejectSelected", &[], packages),
                RuleMode::ByPass => ("acceptSelected", packages, &[]),
            };
            let list = FlClashList {
                mode: mode_name,
                accept_list,
                reject_list,
                sort: "none",
                is_filter_system_app: true,
            };
            serde_json::to_string(&list)?
        }
    };

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_surfboard() {
        let out = render(&["com.a"], RuleMode::ByPass, ExportFormat::Surfboard).unwrap();
        assert_eq!(out, r#"{"mode":"disallowed","package_name":["com.a"]}"#);

        let out = render(&["com.a", "com.b"], RuleMode::Proxy, ExportFormat::Surfboard).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value, json!({"mode": "allowed", "package_name": ["com.a", "com.b"]}));
    }

    #[test]
    fn test_nekobox() {
        let out = render(&["com.a"], RuleMode::ByPass, ExportFormat::NekoBoxAndroid).unwrap();
        assert_eq!(out, "true\ncom.a");

        let out = render(&["com.a", "com.b"], RuleMode::Proxy, ExportFormat::NekoBoxAndroid).unwrap();
        assert_eq!(out, "false\ncom.a\ncom.b");
    }

    #[test]
    fn test_clash_meta_uses_package_names() {
        let out = render(&["com.a", "com.b"], RuleMode::Proxy, ExportFormat::ClashMetaForAndroid)
            .unwrap();
        assert_eq!(out, "com.a\ncom.b");
    }

    #[test]
    fn test_flclash_routes_by_mode() {
        let out = render(&["com.a"], RuleMode::ByPass, ExportFormat::FlClash).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(
            value,
            json!({
                "mode": "acceptSelected",
                "acceptList": ["com.a"],
                "rejectList": [],
                "sort": "none",
                "isFilterSystemApp": true
            })
        );

        let out = render(&["com.a"], RuleMode::Proxy, ExportFormat::FlClash).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["mode"], "rejectSelected");
        assert_eq!(value["acceptList"], json!([]));
        assert_eq!(value["rejectList"], json!(["com.a"]));
    }

    #[test]
    fn test_empty_lists() {
        assert_eq!(render(&[], RuleMode::ByPass, ExportFormat::NekoBoxAndroid).unwrap(), "true\n");
        assert_eq!(render(&[], RuleMode::Proxy, ExportFormat::ClashMetaForAndroid).unwrap(), "");
    }

    #[test]
    fn test_format_names_round_trip() {
        for format in ExportFormat::ALL {
            assert_eq!(ExportFormat::parse(format.as_str()), Some(format));
        }
        assert_eq!(ExportFormat::parse("NekoBoxAndroid"), Some(ExportFormat::NekoBoxAndroid));
        assert_eq!(ExportFormat::parse("v2ray"), None);
    }
}
