//! Transparency log.
//!
//! Counts what the agent observed and what the privacy policy did with it,
//! without storing any content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Session counters.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Keyboard events that reached the privacy filter
    keyboard_events: AtomicU64,
    /// Pointer events that reached the privacy filter
    pointer_events: AtomicU64,
    /// Events dropped by level or blocked application
    events_dropped_by_policy: AtomicU64,
    /// Events whose content was rewritten or stripped
    events_redacted: AtomicU64,
    /// Events lost to a full capture queue
    queue_overflows: AtomicU64,
    patterns_detected: AtomicU64,
    hotkeys_triggered: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    pub fn new() -> Self {
        Self {
            keyboard_events: AtomicU64::new(0),
            pointer_events: AtomicU64::new(0),
            events_dropped_by_policy: AtomicU64::new(0),
            events_redacted: AtomicU64::new(0),
            queue_overflows: AtomicU64::new(0),
            patterns_detected: AtomicU64::new(0),
            hotkeys_triggered: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that loads and saves its counters at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            debug!(error = %e, "could not load previous transparency stats");
        }

        log
    }

    pub fn record_keyboard_event(&self) {
        self.keyboard_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pointer_event(&self) {
        self.pointer_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_by_policy(&self) {
        self.events_dropped_by_policy.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_redacted(&self) {
        self.events_redacted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the current queue overflow total reported by the services.
    pub fn set_queue_overflows(&self, total: u64) {
        self.queue_overflows.store(total, Ordering::Relaxed);
    }

    pub fn record_pattern_detected(&self) {
        self.patterns_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hotkey_triggered(&self) {
        self.hotkeys_triggered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            keyboard_events: self.keyboard_events.load(Ordering::Relaxed),
            pointer_events: self.pointer_events.load(Ordering::Relaxed),
            events_dropped_by_policy: self.events_dropped_by_policy.load(Ordering::Relaxed),
            events_redacted: self.events_redacted.load(Ordering::Relaxed),
            queue_overflows: self.queue_overflows.load(Ordering::Relaxed),
            patterns_detected: self.patterns_detected.load(Ordering::Relaxed),
            hotkeys_triggered: self.hotkeys_triggered.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Human-readable summary.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Keyboard events observed: {}\n\
             - Pointer events observed: {}\n\
             - Events dropped by privacy policy: {}\n\
             - Events with content redacted: {}\n\
             - Events lost to queue overflow: {}\n\
             - Patterns detected: {}\n\
             - Hotkeys triggered: {}\n\
             - Session duration: {} seconds\n\
             \n\
             Privacy Guarantee:\n\
             - Content is filtered before any analysis sees it\n\
             - Unfiltered keystrokes are never logged or persisted\n\
             - Blocked applications produce no events at all",
            stats.keyboard_events,
            stats.pointer_events,
            stats.events_dropped_by_policy,
            stats.events_redacted,
            stats.queue_overflows,
            stats.patterns_detected,
            stats.hotkeys_triggered,
            stats.session_duration_secs
        )
    }

    /// Save counters to disk, if persistence is configured.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                keyboard_events: stats.keyboard_events,
                pointer_events: stats.pointer_events,
                events_dropped_by_policy: stats.events_dropped_by_policy,
                events_redacted: stats.events_redacted,
                patterns_detected: stats.patterns_detected,
                hotkeys_triggered: stats.hotkeys_triggered,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.keyboard_events
                    .store(persisted.keyboard_events, Ordering::Relaxed);
                self.pointer_events
                    .store(persisted.pointer_events, Ordering::Relaxed);
                self.events_dropped_by_policy
                    .store(persisted.events_dropped_by_policy, Ordering::Relaxed);
                self.events_redacted
                    .store(persisted.events_redacted, Ordering::Relaxed);
                self.patterns_detected
                    .store(persisted.patterns_detected, Ordering::Relaxed);
                self.hotkeys_triggered
                    .store(persisted.hotkeys_triggered, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    pub fn reset(&self) {
        for counter in [
            &self.keyboard_events,
            &self.pointer_events,
            &self.events_dropped_by_policy,
            &self.events_redacted,
            &self.queue_overflows,
            &self.patterns_detected,
            &self.hotkeys_triggered,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of transparency counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub keyboard_events: u64,
    pub pointer_events: u64,
    pub events_dropped_by_policy: u64,
    pub events_redacted: u64,
    pub queue_overflows: u64,
    pub patterns_detected: u64,
    pub hotkeys_triggered: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    keyboard_events: u64,
    pointer_events: u64,
    events_dropped_by_policy: u64,
    events_redacted: u64,
    patterns_detected: u64,
    hotkeys_triggered: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}
