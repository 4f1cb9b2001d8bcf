//! Privacy policy: levels, application blocking, and content filtering.

pub mod config;
pub mod engine;
pub mod filters;

pub use config::{PrivacyConfig, PrivacyLevel, DEFAULT_BLOCKED_APPLICATIONS};
pub use engine::{PrivacyEngine, PrivacySummary};
pub use filters::ContentFilter;

/// Errors from privacy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivacyError {
    /// A custom filter regex failed to compile
    InvalidPattern { pattern: String, reason: String },
    Io(String),
    Parse(String),
}

impl std::fmt::Display for PrivacyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrivacyError::InvalidPattern { pattern, reason } => {
                write!(f, "Invalid filter pattern '{pattern}': {reason}")
            }
            PrivacyError::Io(e) => write!(f, "IO error: {e}"),
            PrivacyError::Parse(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for PrivacyError {}
