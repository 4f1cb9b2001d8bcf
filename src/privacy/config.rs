//! Privacy policy configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Applications blocked unless the user says otherwise: password managers,
/// financial apps and secure messengers.
pub const DEFAULT_BLOCKED_APPLICATIONS: &[&str] = &[
    "keepass",
    "bitwarden",
    "1password",
    "lastpass",
    "banking",
    "paypal",
    "venmo",
    "signal",
    "telegram",
    "whatsapp",
];

/// How much input content is retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyLevel {
    /// Content passes unchanged
    Full,
    /// Sensitive patterns are redacted
    #[default]
    Filtered,
    /// Content is redacted, then replaced by a salted hash
    Anonymous,
    /// Metadata only, no content
    StatsOnly,
    /// Every event is dropped
    Disabled,
}

impl PrivacyLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            PrivacyLevel::Full => "full",
            PrivacyLevel::Filtered => "filtered",
            PrivacyLevel::Anonymous => "anonymous",
            PrivacyLevel::StatsOnly => "stats_only",
            PrivacyLevel::Disabled => "disabled",
        }
    }

    /// True if any content survives filtering at this level.
    pub fn allows_content(self) -> bool {
        !matches!(self, PrivacyLevel::StatsOnly | PrivacyLevel::Disabled)
    }
}

impl fmt::Display for PrivacyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrivacyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "full" | "full_logging" => Ok(PrivacyLevel::Full),
            "filtered" => Ok(PrivacyLevel::Filtered),
            "anonymous" => Ok(PrivacyLevel::Anonymous),
            "stats_only" | "statistics_only" | "stats" => Ok(PrivacyLevel::StatsOnly),
            "disabled" | "off" => Ok(PrivacyLevel::Disabled),
            other => Err(format!("unknown privacy level: {other}")),
        }
    }
}

/// Process-wide privacy policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    pub level: PrivacyLevel,
    pub filter_passwords: bool,
    pub filter_emails: bool,
    pub filter_urls: bool,
    /// Credit card, SSN and phone numbers
    pub filter_numbers: bool,
    /// Extra regexes, each replaced by `[FILTERED]`
    pub custom_patterns: Vec<String>,
    /// Case-insensitive substrings of application names never captured
    pub blocked_applications: BTreeSet<String>,
    /// If non-empty, only matching applications are captured
    pub allowed_applications: BTreeSet<String>,
    /// Age after which patterns are pruned
    pub retention_days: u32,
    /// Mask alphanumeric runs with `*`
    pub replace_with_placeholders: bool,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            level: PrivacyLevel::Filtered,
            filter_passwords: true,
            filter_emails: false,
            filter_urls: false,
            filter_numbers: false,
            custom_patterns: Vec::new(),
            blocked_applications: DEFAULT_BLOCKED_APPLICATIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allowed_applications: BTreeSet::new(),
            retention_days: 7,
            replace_with_placeholders: true,
        }
    }
}

impl PrivacyConfig {
    /// A config at `level` with every other setting at its default.
    pub fn with_level(level: PrivacyLevel) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    /// Whether `application` may be captured under this policy.
    pub fn allows_application(&self, application: &str) -> bool {
        let app = application.to_lowercase();
        if self
            .blocked_applications
            .iter()
            .any(|blocked| app.contains(&blocked.to_lowercase()))
        {
            return false;
        }
        if self.allowed_applications.is_empty() {
            return true;
        }
        self.allowed_applications
            .iter()
            .any(|allowed| app.contains(&allowed.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_serde_names() {
        let json = serde_json::to_string(&PrivacyLevel::StatsOnly).unwrap();
        assert_eq!(json, "\"stats_only\"");
        let level: PrivacyLevel = serde_json::from_str("\"anonymous\"").unwrap();
        assert_eq!(level, PrivacyLevel::Anonymous);
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!("stats-only".parse::<PrivacyLevel>(), Ok(PrivacyLevel::StatsOnly));
        assert_eq!("FULL".parse::<PrivacyLevel>(), Ok(PrivacyLevel::Full));
        assert!("loud".parse::<PrivacyLevel>().is_err());
    }

    #[test]
    fn test_default_blocks_password_managers() {
        let config = PrivacyConfig::default();
        assert!(!config.allows_application("1Password 8"));
        assert!(!config.allows_application("KeePassXC"));
        assert!(config.allows_application("Terminal"));
    }

    #[test]
    fn test_allow_list_restricts() {
        let mut config = PrivacyConfig::default();
        config.allowed_applications.insert("code".to_string());
        assert!(config.allows_application("Visual Studio Code"));
        assert!(!config.allows_application("Safari"));
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: PrivacyConfig = serde_json::from_str(r#"{"level":"full"}"#).unwrap();
        assert_eq!(config.level, PrivacyLevel::Full);
        assert!(config.filter_passwords);
        assert_eq!(config.retention_days, 7);
    }
}
