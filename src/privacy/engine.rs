//! Privacy policy engine.
//!
//! Decides per event whether to drop, strip, or filter content. It runs
//! first in each consumer thread, so nothing downstream ever observes
//! content the policy suppresses. Pre-filter content is never logged.

use crate::collector::types::{KeyEvent, PointerEvent};
use crate::collector::worker::EventFilter;
use crate::privacy::config::{PrivacyConfig, PrivacyLevel};
use crate::privacy::filters::{derive_salt, ContentFilter};
use crate::privacy::PrivacyError;
use crate::sync::lock;
use crate::transparency::SharedTransparencyLog;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

struct EngineState {
    config: PrivacyConfig,
    filter: ContentFilter,
    current_application: String,
}

/// Snapshot of the active policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivacySummary {
    pub level: PrivacyLevel,
    pub content_logging: bool,
    pub blocked_applications: usize,
    pub allowed_applications: usize,
    pub filter_patterns: usize,
    pub retention_days: u32,
    pub current_application: String,
    pub current_application_captured: bool,
}

pub struct PrivacyEngine {
    state: Mutex<EngineState>,
    salt: [u8; 32],
    transparency: Option<SharedTransparencyLog>,
}

impl PrivacyEngine {
    /// Build an engine with a fresh session salt.
    pub fn new(config: PrivacyConfig) -> Result<Self, PrivacyError> {
        let seed = uuid::Uuid::new_v4();
        Self::with_salt(config, derive_salt(seed.as_bytes()))
    }

    /// Build an engine with a fixed salt, for reproducible hashes.
    pub fn with_salt(config: PrivacyConfig, salt: [u8; 32]) -> Result<Self, PrivacyError> {
        let filter = ContentFilter::compile(&config, salt)?;
        Ok(Self {
            state: Mutex::new(EngineState {
                config,
                filter,
                current_application: String::new(),
            }),
            salt,
            transparency: None,
        })
    }

    /// Report filtering decisions to `log`.
    pub fn with_transparency(mut self, log: SharedTransparencyLog) -> Self {
        self.transparency = Some(log);
        self
    }

    /// Replace the policy. On error the previous policy stays in force.
    pub fn configure(&self, config: PrivacyConfig) -> Result<(), PrivacyError> {
        let filter = ContentFilter::compile(&config, self.salt)?;
        let mut state = lock(&self.state);
        info!(
            level = %config.level,
            patterns = filter.pattern_count(),
            "privacy policy updated"
        );
        state.config = config;
        state.filter = filter;
        Ok(())
    }

    pub fn config(&self) -> PrivacyConfig {
        lock(&self.state).config.clone()
    }

    pub fn level(&self) -> PrivacyLevel {
        lock(&self.state).config.level
    }

    /// Whether input in `application` may be captured.
    pub fn should_capture(&self, application: &str) -> bool {
        lock(&self.state).config.allows_application(application)
    }

    /// Record which application has focus. Its events are dropped while it
    /// is not capturable.
    pub fn set_current_application(&self, application: &str) {
        let application = application.to_lowercase();
        debug!(blocked = !self.should_capture(&application), "focus changed");
        lock(&self.state).current_application = application;
    }

    pub fn current_application(&self) -> String {
        lock(&self.state).current_application.clone()
    }

    fn drops_everything(state: &EngineState) -> bool {
        state.config.level == PrivacyLevel::Disabled
            || !state.config.allows_application(&state.current_application)
    }

    /// Apply the policy to a key event.
    ///
    /// `None` drops the event entirely. At `stats_only` the character is
    /// removed but the key identifier stays so hotkeys keep working.
    pub fn filter_keyboard_event(&self, mut event: KeyEvent) -> Option<KeyEvent> {
        let outcome = {
            let state = lock(&self.state);
            if Self::drops_everything(&state) {
                None
            } else {
                let mut redacted = false;
                match state.config.level {
                    PrivacyLevel::Full => {}
                    PrivacyLevel::StatsOnly => {
                        redacted = event.character.take().is_some();
                    }
                    _ => {
                        if let Some(character) = event.character.take() {
                            let filtered = state.filter.apply(&character);
                            redacted = filtered != character;
                            event.character = (!filtered.is_empty()).then_some(filtered);
                        }
                    }
                }
                Some(redacted)
            }
        };

        if let Some(log) = &self.transparency {
            log.record_keyboard_event();
            match outcome {
                None => log.record_dropped_by_policy(),
                Some(true) => log.record_redacted(),
                Some(false) => {}
            }
        }
        outcome.map(|_| event)
    }

    /// Apply the policy to a pointer event. At `stats_only` position and
    /// scroll delta are removed.
    pub fn filter_pointer_event(&self, mut event: PointerEvent) -> Option<PointerEvent> {
        let keep = {
            let state = lock(&self.state);
            if Self::drops_everything(&state) {
                false
            } else {
                if state.config.level == PrivacyLevel::StatsOnly {
                    event.position = None;
                    event.scroll = None;
                    event.velocity = None;
                }
                true
            }
        };

        if let Some(log) = &self.transparency {
            log.record_pointer_event();
            if !keep {
                log.record_dropped_by_policy();
            }
        }
        keep.then_some(event)
    }

    /// Run text through the content filter chain.
    pub fn filter_content(&self, text: &str) -> String {
        lock(&self.state).filter.apply(text)
    }

    /// Add a custom redaction regex. An invalid pattern is rejected and the
    /// existing patterns are unaffected.
    pub fn add_custom_pattern(&self, pattern: &str) -> Result<(), PrivacyError> {
        let mut state = lock(&self.state);
        let mut config = state.config.clone();
        config.custom_patterns.push(pattern.to_string());
        let filter = ContentFilter::compile(&config, self.salt)?;
        debug!(patterns = filter.pattern_count(), "custom pattern added");
        state.config = config;
        state.filter = filter;
        Ok(())
    }

    pub fn add_blocked_application(&self, application: &str) {
        lock(&self.state)
            .config
            .blocked_applications
            .insert(application.to_lowercase());
    }

    pub fn remove_blocked_application(&self, application: &str) -> bool {
        lock(&self.state)
            .config
            .blocked_applications
            .remove(&application.to_lowercase())
    }

    pub fn summary(&self) -> PrivacySummary {
        let state = lock(&self.state);
        PrivacySummary {
            level: state.config.level,
            content_logging: state.config.level.allows_content(),
            blocked_applications: state.config.blocked_applications.len(),
            allowed_applications: state.config.allowed_applications.len(),
            filter_patterns: state.filter.pattern_count(),
            retention_days: state.config.retention_days,
            current_application: state.current_application.clone(),
            current_application_captured: state
                .config
                .allows_application(&state.current_application),
        }
    }

    /// Write the policy as pretty JSON.
    pub fn export_config(&self, path: &Path) -> Result<(), PrivacyError> {
        let json = serde_json::to_string_pretty(&self.config())
            .map_err(|e| PrivacyError::Parse(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PrivacyError::Io(e.to_string()))?;
        }
        std::fs::write(path, json).map_err(|e| PrivacyError::Io(e.to_string()))
    }

    /// Load a policy written by [`export_config`](Self::export_config).
    /// Missing fields take their defaults.
    pub fn import_config(&self, path: &Path) -> Result<(), PrivacyError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| PrivacyError::Io(e.to_string()))?;
        let config: PrivacyConfig =
            serde_json::from_str(&content).map_err(|e| PrivacyError::Parse(e.to_string()))?;
        self.configure(config)
    }
}

impl EventFilter for PrivacyEngine {
    fn filter_key(&self, event: KeyEvent) -> Option<KeyEvent> {
        self.filter_keyboard_event(event)
    }

    fn filter_pointer(&self, event: PointerEvent) -> Option<PointerEvent> {
        self.filter_pointer_event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::{KeyEventKind, Point, PointerButton};
    use crate::transparency::TransparencyLog;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn key(c: &str) -> KeyEvent {
        KeyEvent {
            key: c.to_string(),
            kind: KeyEventKind::Press,
            timestamp: 1.0,
            modifiers: BTreeSet::new(),
            is_special: false,
            character: Some(c.to_string()),
        }
    }

    fn engine(level: PrivacyLevel) -> PrivacyEngine {
        PrivacyEngine::new(PrivacyConfig::with_level(level)).unwrap()
    }

    #[test]
    fn test_disabled_drops_everything() {
        let engine = engine(PrivacyLevel::Disabled);
        assert!(engine.filter_keyboard_event(key("a")).is_none());
        let click = PointerEvent::click(1.0, Some(Point::new(1.0, 1.0)), PointerButton::Left, true);
        assert!(engine.filter_pointer_event(click).is_none());
    }

    #[test]
    fn test_stats_only_strips_character_keeps_key() {
        let engine = engine(PrivacyLevel::StatsOnly);
        let event = engine.filter_keyboard_event(key("q")).unwrap();
        assert!(event.character.is_none());
        assert_eq!(event.key, "q");

        let scroll = PointerEvent::scroll(1.0, Some(Point::new(3.0, 4.0)), 0.0, 1.0);
        let filtered = engine.filter_pointer_event(scroll).unwrap();
        assert!(filtered.position.is_none());
        assert!(filtered.scroll.is_none());
    }

    #[test]
    fn test_filtered_masks_character() {
        let engine = engine(PrivacyLevel::Filtered);
        let event = engine.filter_keyboard_event(key("a")).unwrap();
        assert_eq!(event.character.as_deref(), Some("*"));
    }

    #[test]
    fn test_full_passes_through() {
        let engine = engine(PrivacyLevel::Full);
        assert_eq!(engine.filter_keyboard_event(key("a")), Some(key("a")));
    }

    #[test]
    fn test_blocked_application_drops_events() {
        let engine = engine(PrivacyLevel::Full);
        engine.set_current_application("Bitwarden");
        assert!(engine.filter_keyboard_event(key("a")).is_none());
        assert!(!engine.summary().current_application_captured);

        engine.remove_blocked_application("bitwarden");
        assert!(engine.filter_keyboard_event(key("a")).is_some());

        engine.add_blocked_application("Terminal");
        assert!(!engine.should_capture("terminal.app"));
    }

    #[test]
    fn test_password_content() {
        let engine = engine(PrivacyLevel::Filtered);
        let out = engine.filter_content("password: hunter2");
        assert!(out.contains("[PASSWORD]"));
        assert!(!out.contains("hunter2"));
    }

    #[test]
    fn test_concurrent_policy_edits_are_kept() {
        let engine = Arc::new(engine(PrivacyLevel::Filtered));
        let patterns = {
            let engine = engine.clone();
            std::thread::spawn(move || {
                for i in 0..20 {
                    engine.add_custom_pattern(&format!(r"tag{i}-\d+")).unwrap();
                }
            })
        };
        let apps = {
            let engine = engine.clone();
            std::thread::spawn(move || {
                for i in 0..20 {
                    engine.add_blocked_application(&format!("app{i}"));
                }
            })
        };
        patterns.join().unwrap();
        apps.join().unwrap();

        let config = engine.config();
        assert_eq!(config.custom_patterns.len(), 20);
        assert!((0..20).all(|i| !engine.should_capture(&format!("app{i}"))));
    }

    #[test]
    fn test_invalid_pattern_keeps_prior_config() {
        let engine = engine(PrivacyLevel::Filtered);
        engine.add_custom_pattern(r"secret-\d+").unwrap();
        let before = engine.config();

        let err = engine.add_custom_pattern("[bad").unwrap_err();
        assert!(matches!(err, PrivacyError::InvalidPattern { .. }));
        assert_eq!(engine.config(), before);
        assert_eq!(engine.summary().filter_patterns, 2);
    }

    #[test]
    fn test_export_import_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("privacy.json");

        let source = engine(PrivacyLevel::Anonymous);
        source.add_custom_pattern("acct-[0-9]+").unwrap();
        source.export_config(&path).unwrap();

        let target = engine(PrivacyLevel::Full);
        target.import_config(&path).unwrap();
        assert_eq!(target.config(), source.config());
    }

    #[test]
    fn test_transparency_counters() {
        let log = Arc::new(TransparencyLog::new());
        let engine = PrivacyEngine::new(PrivacyConfig::default())
            .unwrap()
            .with_transparency(log.clone());

        engine.filter_keyboard_event(key("a"));
        engine.set_current_application("keepass");
        engine.filter_keyboard_event(key("b"));

        let stats = log.stats();
        assert_eq!(stats.keyboard_events, 2);
        assert_eq!(stats.events_redacted, 1);
        assert_eq!(stats.events_dropped_by_policy, 1);
    }
}
