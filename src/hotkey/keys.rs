//! Key specification parsing.
//!
//! A combination is tokens joined by `+` (`"ctrl+shift+k"`); a sequence is
//! combinations separated by `,` (`"ctrl+k, ctrl+c"`). Tokens are trimmed
//! and lowercased, modifier aliases collapse to one canonical name, and a
//! few key aliases are folded (`return` is `enter`).

use crate::collector::types::{KeyEvent, Modifier};
use crate::hotkey::HotkeyError;
use std::collections::BTreeSet;
use std::fmt;

/// One normalized token of a key spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyToken {
    Modifier(Modifier),
    Key(String),
}

/// Normalize a single key name.
pub fn normalize_token(token: &str) -> Option<KeyToken> {
    let token = token.trim().to_lowercase();
    if token.is_empty() {
        return None;
    }
    if let Some(modifier) = Modifier::from_key_name(&token) {
        return Some(KeyToken::Modifier(modifier));
    }
    let key = match token.as_str() {
        "return" => "enter".to_string(),
        "esc" => "escape".to_string(),
        "del" => "delete".to_string(),
        "spacebar" => "space".to_string(),
        _ => token,
    };
    Some(KeyToken::Key(key))
}

/// An order-independent key combination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyCombo {
    modifiers: BTreeSet<Modifier>,
    keys: BTreeSet<String>,
}

impl KeyCombo {
    /// Parse a single combination such as `"Ctrl+Shift+K"`.
    pub fn parse(spec: &str) -> Result<Self, HotkeyError> {
        let mut combo = KeyCombo::default();
        for raw in spec.split('+') {
            match normalize_token(raw) {
                Some(token) => combo.insert(token),
                None => {
                    return Err(HotkeyError::InvalidKeys {
                        keys: spec.to_string(),
                        reason: "empty key token".to_string(),
                    })
                }
            }
        }
        Ok(combo)
    }

    /// The combination a key press forms: held modifiers plus the key,
    /// unless the key is itself a modifier.
    pub fn from_press(event: &KeyEvent) -> Self {
        let mut combo = KeyCombo {
            modifiers: event.modifiers.clone(),
            keys: BTreeSet::new(),
        };
        if let Some(token) = normalize_token(&event.key) {
            combo.insert(token);
        }
        combo
    }

    pub fn insert(&mut self, token: KeyToken) {
        match token {
            KeyToken::Modifier(m) => {
                self.modifiers.insert(m);
            }
            KeyToken::Key(k) => {
                self.keys.insert(k);
            }
        }
    }

    pub fn modifiers(&self) -> &BTreeSet<Modifier> {
        &self.modifiers
    }

    pub fn keys(&self) -> &BTreeSet<String> {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty() && self.keys.is_empty()
    }

    /// True if the combination has no non-modifier key.
    pub fn is_modifier_only(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, token: &KeyToken) -> bool {
        match token {
            KeyToken::Modifier(m) => self.modifiers.contains(m),
            KeyToken::Key(k) => self.keys.contains(k),
        }
    }

    pub fn is_subset_of(&self, other: &KeyCombo) -> bool {
        self.modifiers.is_subset(&other.modifiers) && self.keys.is_subset(&other.keys)
    }
}

impl fmt::Display for KeyCombo {
    /// Canonical form: modifiers in ctrl, alt, shift, meta order, then keys.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self
            .modifiers
            .iter()
            .map(|m| m.as_str())
            .chain(self.keys.iter().map(String::as_str))
            .collect();
        f.write_str(&parts.join("+"))
    }
}

/// Parse a comma-separated sequence of combinations.
pub fn parse_sequence(spec: &str) -> Result<Vec<KeyCombo>, HotkeyError> {
    let steps = spec
        .split(',')
        .map(KeyCombo::parse)
        .collect::<Result<Vec<_>, _>>()?;
    if steps.len() < 2 {
        return Err(HotkeyError::InvalidKeys {
            keys: spec.to_string(),
            reason: "a sequence needs at least two steps".to_string(),
        });
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::KeyEventKind;

    #[test]
    fn test_parse_is_order_independent() {
        let a = KeyCombo::parse("ctrl+shift+k").unwrap();
        let b = KeyCombo::parse(" K + Shift_R + control ").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "ctrl+shift+k");
    }

    #[test]
    fn test_modifier_aliases() {
        let combo = KeyCombo::parse("cmd+option+return").unwrap();
        assert_eq!(combo.to_string(), "alt+meta+enter");
    }

    #[test]
    fn test_empty_token_rejected() {
        assert!(matches!(
            KeyCombo::parse("ctrl++a"),
            Err(HotkeyError::InvalidKeys { .. })
        ));
        assert!(KeyCombo::parse("").is_err());
    }

    #[test]
    fn test_sequence_parsing() {
        let steps = parse_sequence("ctrl+k, ctrl+c").unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].to_string(), "ctrl+c");
        assert!(parse_sequence("ctrl+k").is_err());
    }

    #[test]
    fn test_from_press() {
        let event = KeyEvent {
            key: "c".to_string(),
            kind: KeyEventKind::Press,
            timestamp: 0.0,
            modifiers: [Modifier::Ctrl].into_iter().collect(),
            is_special: false,
            character: None,
        };
        let combo = KeyCombo::from_press(&event);
        assert_eq!(combo, KeyCombo::parse("ctrl+c").unwrap());
        assert!(!combo.is_modifier_only());
    }
}
