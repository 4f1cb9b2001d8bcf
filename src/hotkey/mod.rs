//! Hotkey registration and matching.

pub mod action;
pub mod keys;
pub mod matcher;

pub use action::{ActionMap, HotkeyAction, HotkeyTrigger, SharedAction};
pub use keys::{normalize_token, parse_sequence, KeyCombo, KeyToken};
pub use matcher::{
    HotkeyInfo, HotkeyKind, HotkeyMatcher, HotkeyRecord, HotkeySpec, HotkeyStatistics,
    HotkeyUsage, DEFAULT_SEQUENCE_TIMEOUT, GLOBAL_CONTEXT, HELD_KEY_TIMEOUT, SHOW_HELP,
    TOGGLE_CONTEXT,
};

/// Errors from hotkey registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotkeyError {
    /// An enabled binding with the same keys exists in an overlapping context
    Conflict {
        name: String,
        existing: String,
        keys: String,
    },
    DuplicateName(String),
    InvalidKeys { keys: String, reason: String },
    UnknownBinding(String),
}

impl std::fmt::Display for HotkeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HotkeyError::Conflict {
                name,
                existing,
                keys,
            } => write!(f, "Hotkey '{name}' conflicts with '{existing}' on {keys}"),
            HotkeyError::DuplicateName(name) => write!(f, "Hotkey '{name}' is already registered"),
            HotkeyError::InvalidKeys { keys, reason } => {
                write!(f, "Invalid key spec '{keys}': {reason}")
            }
            HotkeyError::UnknownBinding(name) => write!(f, "No hotkey named '{name}'"),
        }
    }
}

impl std::error::Error for HotkeyError {}
