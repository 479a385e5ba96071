//! Rule patterns: one line of a subscription config as a predicate.
//!
//! A subscription config is a small line-oriented format:
//!
//! ```text
//! [config]
//! mode=bypass
//! url=https://example.com/example.conf
//! [rule]
//! REGEX,com\.example\..*
//! EXTRA,com.example.app
//! ```
//!
//! Every line maps to exactly one [`RulePattern`] variant. Only [`RulePattern::Extra`]
//! and [`RulePattern::Regex`] ever match a package name; the other variants carry
//! config metadata or are kept around so nothing is lost when a line is not
//! understood.

use regex::Regex;
use tracing::debug;

use crate::models::Rule;

/// Storage tag for `[config]` and `url=` lines.
pub const KEY_CONFIG: &str = "[config]";
/// Storage tag for the `[rule]` section marker.
pub const KEY_RULE: &str = "[rule]";
/// Storage tag for `mode=` lines.
pub const KEY_MODE: &str = "mode=";
/// Storage tag for exact package names.
pub const KEY_EXTRA: &str = "EXTRA";
/// Storage tag for regex fragments.
pub const KEY_REGEX: &str = "REGEX";
/// Storage tag for anything else.
pub const KEY_UNKNOWN: &str = "UNKNOWN";

/// All recognized storage tags.
pub const KEYS: [&str; 6] = [
    KEY_MODE, KEY_CONFIG, KEY_RULE, KEY_EXTRA, KEY_REGEX, KEY_UNKNOWN,
];

/// A regex rule with its compiled matcher.
///
/// Compilation happens once, when the pattern is built. A source that does not
/// compile is kept for round-tripping but never matches.
#[derive(Debug, Clone)]
pub struct RegexRule {
    source: String,
    compiled: Option<Regex>,
}

impl RegexRule {
    /// Compiles a regex rule from its source.
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let compiled = match Regex::new(&source) {
            Ok(re) => Some(re),
            Err(e) => {
                debug!(pattern = %source, error = %e, "Regex rule does not compile");
                None
            }
        };
        Self { source, compiled }
    }

    /// Returns the regex source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns true if the source compiled.
    pub fn is_valid(&self) -> bool {
        self.compiled.is_some()
    }

    /// Unanchored search: the regex may match anywhere in the package name.
    pub fn is_match(&self, package_name: &str) -> bool {
        self.compiled
            .as_ref()
            .is_some_and(|re| re.is_match(package_name))
    }
}

impl PartialEq for RegexRule {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for RegexRule {}

/// One parsed config line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RulePattern {
    /// `mode=<value>`; the raw value, validated by the parser.
    Mode(String),
    /// `[config]` marker or the value of a `url=` line.
    Config(String),
    /// `[rule]` section marker.
    Rule(String),
    /// `EXTRA,<package>`: exact package name.
    Extra(String),
    /// `REGEX,<fragment>`: substring regex search.
    Regex(RegexRule),
    /// Anything that was not understood.
    Unknown(String),
}

impl RulePattern {
    /// Parses one config line. Never fails: unrecognized input becomes
    /// [`RulePattern::Unknown`].
    pub fn from_line(line: &str) -> Self {
        let line = line.trim();

        if line.starts_with(KEY_CONFIG) {
            RulePattern::Config(line.to_string())
        } else if line.starts_with(KEY_RULE) {
            RulePattern::Rule(line.to_string())
        } else if let Some(mode) = line.strip_prefix(KEY_MODE) {
            RulePattern::Mode(mode.to_string())
        } else if let Some(url) = line.strip_prefix("url=") {
            RulePattern::Config(url.to_string())
        } else if line.starts_with("EXTRA,") || line.starts_with("REGEX,") {
            Self::from_keyed_line(line)
        } else {
            RulePattern::Unknown(line.to_string())
        }
    }

    /// Splits `KEY,value` on the first comma. Without a comma the whole line is
    /// the value of an unknown pattern.
    fn from_keyed_line(line: &str) -> Self {
        let (key, value) = line.split_once(',').unwrap_or((KEY_UNKNOWN, line));
        match key {
            KEY_EXTRA => RulePattern::Extra(value.to_string()),
            KEY_REGEX => RulePattern::Regex(RegexRule::new(value)),
            _ => RulePattern::Unknown(line.to_string()),
        }
    }

    /// Rebuilds a pattern from its storage record.
    pub fn from_rule(rule: &Rule) -> Self {
        let value = rule.rule_value.clone();
        match rule.rule_type.as_str() {
            KEY_CONFIG => RulePattern::Config(value),
            KEY_RULE => RulePattern::Rule(value),
            KEY_MODE => RulePattern::Mode(value),
            KEY_EXTRA => RulePattern::Extra(value),
            KEY_REGEX => RulePattern::Regex(RegexRule::new(value)),
            _ => RulePattern::Unknown(value),
        }
    }

    /// Converts this pattern into an unsaved storage record.
    pub fn to_rule(&self) -> Rule {
        Rule::new(self.key(), self.value())
    }

    /// Returns the storage tag of this variant.
    pub fn key(&self) -> &'static str {
        match self {
            RulePattern::Mode(_) => KEY_MODE,
            RulePattern::Config(_) => KEY_CONFIG,
            RulePattern::Rule(_) => KEY_RULE,
            RulePattern::Extra(_) => KEY_EXTRA,
            RulePattern::Regex(_) => KEY_REGEX,
            RulePattern::Unknown(_) => KEY_UNKNOWN,
        }
    }

    /// Returns the value carried by this variant.
    pub fn value(&self) -> &str {
        match self {
            RulePattern::Mode(v)
            | RulePattern::Config(v)
            | RulePattern::Rule(v)
            | RulePattern::Extra(v)
            | RulePattern::Unknown(v) => v,
            RulePattern::Regex(re) => re.source(),
        }
    }

    /// Returns true if this variant is persisted as a rule.
    pub fn is_package_rule(&self) -> bool {
        matches!(self, RulePattern::Extra(_) | RulePattern::Regex(_))
    }

    /// Tests a package name against this pattern.
    pub fn matches(&self, package_name: &str) -> bool {
        match self {
            RulePattern::Extra(name) => package_name == name,
            RulePattern::Regex(re) => re.is_match(package_name),
            RulePattern::Mode(_)
            | RulePattern::Config(_)
            | RulePattern::Rule(_)
            | RulePattern::Unknown(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_line_variants() {
        assert_eq!(
            RulePattern::from_line("[config]"),
            RulePattern::Config("[config]".to_string())
        );
        assert_eq!(
            RulePattern::from_line("[rule]"),
            RulePattern::Rule("[rule]".to_string())
        );
        assert_eq!(
            RulePattern::from_line("mode=bypass"),
            RulePattern::Mode("bypass".to_string())
        );
        assert_eq!(
            RulePattern::from_line("url=https://example.com/a.conf?x=1"),
            RulePattern::Config("https://example.com/a.conf?x=1".to_string())
        );
        assert_eq!(
            RulePattern::from_line("EXTRA,com.example.app"),
            RulePattern::Extra("com.example.app".to_string())
        );
        assert_eq!(
            RulePattern::from_line("REGEX,com.tencent.*"),
            RulePattern::Regex(RegexRule::new("com.tencent.*"))
        );
        assert_eq!(
            RulePattern::from_line("DOMAIN,example.com"),
            RulePattern::Unknown("DOMAIN,example.com".to_string())
        );
    }

    #[test]
    fn test_from_line_is_total() {
        let inputs = [
            "",
            ",",
            ",,,",
            "EXTRA",
            "EXTRA,",
            "REGEX,",
            "REGEX,(unclosed",
            "EXTRA,a,b,c",
            "mode=",
            "url=",
            "no comma here",
            "   ",
            "\u{feff}[config]",
        ];

        for input in inputs {
            let pattern = RulePattern::from_line(input);
            assert!(KEYS.contains(&pattern.key()), "bad key for {input:?}");
        }
    }

    #[test]
    fn test_split_on_first_comma() {
        let pattern = RulePattern::from_line("REGEX,com\\.x{1,3}");
        assert_eq!(pattern.key(), KEY_REGEX);
        assert_eq!(pattern.value(), "com\\.x{1,3}");

        let pattern = RulePattern::from_line("EXTRA,a,b");
        assert_eq!(pattern.value(), "a,b");
    }

    #[test]
    fn test_trailing_carriage_return_is_trimmed() {
        assert_eq!(
            RulePattern::from_line("EXTRA,com.example.app\r"),
            RulePattern::Extra("com.example.app".to_string())
        );
    }

    #[test]
    fn test_rule_round_trip() {
        let rules = [
            Rule::new(KEY_MODE, "proxy"),
            Rule::new(KEY_CONFIG, "https://example.com/a.conf"),
            Rule::new(KEY_RULE, "[rule]"),
            Rule::new(KEY_EXTRA, "com.example.app"),
            Rule::new(KEY_REGEX, "com\\.example\\..*"),
            Rule::new(KEY_UNKNOWN, "whatever,else"),
        ];

        for rule in rules {
            let back = RulePattern::from_rule(&rule).to_rule();
            assert_eq!(back.rule_type, rule.rule_type);
            assert_eq!(back.rule_value, rule.rule_value);
        }
    }

    #[test]
    fn test_extra_is_exact() {
        let pattern = RulePattern::Extra("com.example.app".to_string());
        assert!(pattern.matches("com.example.app"));
        assert!(!pattern.matches("com.example.app2"));
        assert!(!pattern.matches("xcom.example.app"));
    }

    #[test]
    fn test_regex_is_substring_search() {
        let pattern = RulePattern::Regex(RegexRule::new("com\\.example\\..*"));
        assert!(pattern.matches("xcom.example.appy"));
        assert!(pattern.matches("com.example.app"));
        assert!(!pattern.matches("com.sample.app"));
    }

    #[test]
    fn test_invalid_regex_never_matches() {
        let rule = RegexRule::new("com.(broken");
        assert!(!rule.is_valid());
        assert!(!RulePattern::Regex(rule).matches("com.(broken"));
    }

    #[test]
    fn test_markers_never_match() {
        for line in ["[config]", "[rule]", "mode=proxy", "url=x", "junk"] {
            let pattern = RulePattern::from_line(line);
            assert!(!pattern.matches(line));
            assert!(!pattern.is_package_rule());
        }
    }

    #[test]
    fn test_sample_rule_list_matches_known_packages() {
        let patterns: Vec<RulePattern> = [
            "REGEX,com.alibaba.*",
            "REGEX,com.tencent.*",
            "REGEX,tv.danmaku.*",
            "EXTRA,com.tongcheng.android",
            "REGEX,com.sina",
            "EXTRA,com.flomo.app",
        ]
        .iter()
        .map(|line| RulePattern::from_line(line))
        .collect();

        let packages = [
            "com.tencent.mm",
            "tv.danmaku.bili",
            "com.sina.weibo",
            "com.flomo.app",
            "org.mozilla.firefox",
            "com.tongcheng.android.lite",
        ];

        let matched: Vec<&str> = packages
            .iter()
            .copied()
            .filter(|p| patterns.iter().any(|pattern| pattern.matches(p)))
            .collect();

        assert_eq!(
            matched,
            vec!["com.tencent.mm", "tv.danmaku.bili", "com.sina.weibo", "com.flomo.app"]
        );
    }
}
