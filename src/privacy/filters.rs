//! Content filter chain: redaction, anonymization, placeholder masking.
//!
//! Anonymization uses blake3 keyed with a per-engine salt, so the same
//! content maps to the same token for the lifetime of one engine and to
//! unrelated tokens across engines.

use crate::privacy::config::{PrivacyConfig, PrivacyLevel};
use crate::privacy::PrivacyError;
use regex::Regex;

pub const PASSWORD_PLACEHOLDER: &str = "[PASSWORD]";
pub const EMAIL_PLACEHOLDER: &str = "[EMAIL]";
pub const URL_PLACEHOLDER: &str = "[URL]";
pub const CREDIT_CARD_PLACEHOLDER: &str = "[CREDIT_CARD]";
pub const SSN_PLACEHOLDER: &str = "[SSN]";
pub const PHONE_PLACEHOLDER: &str = "[PHONE]";
pub const CUSTOM_PLACEHOLDER: &str = "[FILTERED]";

const PASSWORD_PATTERN: &str = r"(?i)(password|passwd|pwd|pin|secret|key|token)[:=\s]*[^\s]{3,}";
const EMAIL_PATTERN: &str = r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b";
const URL_PATTERN: &str =
    r"https?://(?:[-\w.])+(?::\d+)?(?:/(?:[\w/_.])*(?:\?(?:[\w&=%.])*)?(?:#(?:[\w.])*)?)?";
const CREDIT_CARD_PATTERN: &str = r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b";
const SSN_PATTERN: &str = r"\b\d{3}-\d{2}-\d{4}\b";
const PHONE_PATTERN: &str = r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b";

/// Tokens produced by earlier stages; masking leaves them intact.
const PLACEHOLDER_TOKEN: &str = r"\[(?:[A-Z_]+|HASH:[0-9a-f]+)\]";

#[derive(Debug, Clone)]
struct Redaction {
    name: String,
    regex: Regex,
    placeholder: &'static str,
}

/// Compiled filter chain for one privacy config.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    level: PrivacyLevel,
    redactions: Vec<Redaction>,
    salt: [u8; 32],
    mask: bool,
    token: Regex,
}

fn compile(pattern: &str) -> Result<Regex, PrivacyError> {
    Regex::new(pattern).map_err(|e| PrivacyError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

impl ContentFilter {
    /// Compile the chain. Fails on the first invalid custom pattern.
    pub fn compile(config: &PrivacyConfig, salt: [u8; 32]) -> Result<Self, PrivacyError> {
        let mut builtin: Vec<(&str, &str, &'static str)> = Vec::new();
        if config.filter_passwords {
            builtin.push(("password", PASSWORD_PATTERN, PASSWORD_PLACEHOLDER));
        }
        if config.filter_emails {
            builtin.push(("email", EMAIL_PATTERN, EMAIL_PLACEHOLDER));
        }
        if config.filter_urls {
            builtin.push(("url", URL_PATTERN, URL_PLACEHOLDER));
        }
        if config.filter_numbers {
            // Card numbers before the shorter digit groups they contain
            builtin.push(("credit_card", CREDIT_CARD_PATTERN, CREDIT_CARD_PLACEHOLDER));
            builtin.push(("ssn", SSN_PATTERN, SSN_PLACEHOLDER));
            builtin.push(("phone", PHONE_PATTERN, PHONE_PLACEHOLDER));
        }

        let mut redactions = Vec::with_capacity(builtin.len() + config.custom_patterns.len());
        for (name, pattern, placeholder) in builtin {
            redactions.push(Redaction {
                name: name.to_string(),
                regex: compile(pattern)?,
                placeholder,
            });
        }
        for (i, pattern) in config.custom_patterns.iter().enumerate() {
            redactions.push(Redaction {
                name: format!("custom_{i}"),
                regex: compile(pattern)?,
                placeholder: CUSTOM_PLACEHOLDER,
            });
        }

        Ok(Self {
            level: config.level,
            redactions,
            salt,
            mask: config.replace_with_placeholders,
            token: compile(PLACEHOLDER_TOKEN)?,
        })
    }

    /// Number of active redaction patterns.
    pub fn pattern_count(&self) -> usize {
        self.redactions.len()
    }

    pub fn pattern_names(&self) -> Vec<String> {
        self.redactions.iter().map(|r| r.name.clone()).collect()
    }

    /// Run `content` through the chain for the configured level.
    pub fn apply(&self, content: &str) -> String {
        if content.is_empty() || !self.level.allows_content() {
            return String::new();
        }
        if self.level == PrivacyLevel::Full {
            return content.to_string();
        }

        let mut filtered = self.redact(content);
        if self.level == PrivacyLevel::Anonymous {
            filtered = self.anonymize(&filtered);
        }
        if self.mask {
            filtered = self.mask_content(&filtered);
        }
        filtered
    }

    fn redact(&self, content: &str) -> String {
        let mut filtered = content.to_string();
        for redaction in &self.redactions {
            if redaction.regex.is_match(&filtered) {
                filtered = redaction
                    .regex
                    .replace_all(&filtered, redaction.placeholder)
                    .into_owned();
            }
        }
        filtered
    }

    /// Replace content with a salted hash token. Content that is already a
    /// single placeholder is kept so redactions stay recognizable.
    fn anonymize(&self, content: &str) -> String {
        if content.is_empty() || self.is_placeholder(content) {
            return content.to_string();
        }
        let hash = blake3::keyed_hash(&self.salt, content.as_bytes());
        format!("[HASH:{}]", &hash.to_hex()[..8])
    }

    fn is_placeholder(&self, content: &str) -> bool {
        self.token
            .find(content)
            .is_some_and(|m| m.start() == 0 && m.end() == content.len())
    }

    /// Replace alphanumerics with `*`, keeping placeholder tokens.
    fn mask_content(&self, content: &str) -> String {
        let mut out = String::with_capacity(content.len());
        let mut last = 0;
        for token in self.token.find_iter(content) {
            out.extend(mask_chars(&content[last..token.start()]));
            out.push_str(token.as_str());
            last = token.end();
        }
        out.extend(mask_chars(&content[last..]));
        out
    }
}

fn mask_chars(segment: &str) -> impl Iterator<Item = char> + '_ {
    segment
        .chars()
        .map(|c| if c.is_alphanumeric() { '*' } else { c })
}

/// Derive a 32-byte salt from arbitrary seed material.
pub fn derive_salt(seed: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(seed);
    hasher.update(b"input-insight-privacy-salt");
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(config: &PrivacyConfig) -> ContentFilter {
        ContentFilter::compile(config, derive_salt(b"test")).unwrap()
    }

    #[test]
    fn test_password_redaction() {
        let config = PrivacyConfig {
            replace_with_placeholders: false,
            ..PrivacyConfig::default()
        };
        let out = filter(&config).apply("password: hunter2");
        assert!(out.contains(PASSWORD_PLACEHOLDER));
        assert!(!out.contains("hunter2"));
    }

    #[test]
    fn test_masking_keeps_placeholders() {
        let out = filter(&PrivacyConfig::default()).apply("login password=swordfish now");
        assert_eq!(out, "***** [PASSWORD] ***");
    }

    #[test]
    fn test_numbers_ordering() {
        let config = PrivacyConfig {
            filter_numbers: true,
            replace_with_placeholders: false,
            ..PrivacyConfig::default()
        };
        let f = filter(&config);
        assert_eq!(f.apply("4111 1111 1111 1111"), CREDIT_CARD_PLACEHOLDER);
        assert_eq!(f.apply("123-45-6789"), SSN_PLACEHOLDER);
        assert_eq!(f.apply("555-123-4567"), PHONE_PLACEHOLDER);
    }

    #[test]
    fn test_email_and_url() {
        let config = PrivacyConfig {
            filter_emails: true,
            filter_urls: true,
            replace_with_placeholders: false,
            ..PrivacyConfig::default()
        };
        let f = filter(&config);
        assert_eq!(f.apply("mail me@example.com"), "mail [EMAIL]");
        assert_eq!(f.apply("see https://example.com/a/b"), "see [URL]");
    }

    #[test]
    fn test_anonymous_is_stable_per_salt() {
        let config = PrivacyConfig {
            level: PrivacyLevel::Anonymous,
            replace_with_placeholders: true,
            ..PrivacyConfig::default()
        };
        let a = filter(&config);
        let first = a.apply("hello");
        assert!(first.starts_with("[HASH:"));
        assert_eq!(first.len(), "[HASH:]".len() + 8);
        assert_eq!(first, a.apply("hello"));

        let b = ContentFilter::compile(&config, derive_salt(b"other")).unwrap();
        assert_ne!(first, b.apply("hello"));
    }

    #[test]
    fn test_anonymous_keeps_redaction_token() {
        let config = PrivacyConfig::with_level(PrivacyLevel::Anonymous);
        assert_eq!(filter(&config).apply("pwd: abcdef"), PASSWORD_PLACEHOLDER);
    }

    #[test]
    fn test_no_content_levels() {
        for level in [PrivacyLevel::StatsOnly, PrivacyLevel::Disabled] {
            assert!(filter(&PrivacyConfig::with_level(level)).apply("abc").is_empty());
        }
        assert_eq!(
            filter(&PrivacyConfig::with_level(PrivacyLevel::Full)).apply("password: x1234"),
            "password: x1234"
        );
    }

    #[test]
    fn test_invalid_custom_pattern() {
        let config = PrivacyConfig {
            custom_patterns: vec!["(unclosed".to_string()],
            ..PrivacyConfig::default()
        };
        let err = ContentFilter::compile(&config, [0; 32]).unwrap_err();
        assert!(matches!(err, PrivacyError::InvalidPattern { .. }));
    }

    #[test]
    fn test_custom_pattern_placeholder() {
        let config = PrivacyConfig {
            custom_patterns: vec![r"project-\d+".to_string()],
            replace_with_placeholders: false,
            ..PrivacyConfig::default()
        };
        assert_eq!(filter(&config).apply("on project-42"), "on [FILTERED]");
    }
}
