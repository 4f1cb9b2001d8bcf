//! Configuration for the Input Insight agent.

use crate::analysis::AnalysisConfig;
use crate::collector::{KeyboardConfig, PointerConfig};
use crate::hotkey::{HotkeyRecord, DEFAULT_SEQUENCE_TIMEOUT};
use crate::orchestrator::OrchestratorConfig;
use crate::privacy::PrivacyConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which input sources to capture
    pub sources: SourceConfig,

    pub capture: CaptureSettings,

    pub analysis: AnalysisConfig,

    pub privacy: PrivacyConfig,

    pub hotkeys: HotkeySettings,

    /// Interval between maintenance ticks while running
    #[serde(with = "duration_serde")]
    pub tick_interval: Duration,

    /// Path for export documents
    pub export_path: PathBuf,

    /// Path for storing state and transparency logs
    pub data_path: PathBuf,

    /// Whether capture is currently paused
    pub paused: bool,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("input-insight");

        Self {
            sources: SourceConfig::default(),
            capture: CaptureSettings::default(),
            analysis: AnalysisConfig::default(),
            privacy: PrivacyConfig::default(),
            hotkeys: HotkeySettings::default(),
            tick_interval: Duration::from_secs(5),
            export_path: data_dir.join("exports"),
            data_path: data_dir,
            paused: false,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("input-insight")
            .join("config.json")
    }

    /// Where the transparency counters are persisted.
    pub fn transparency_path(&self) -> PathBuf {
        self.data_path.join("transparency.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Settings for building a [`CaptureOrchestrator`](crate::CaptureOrchestrator).
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let capture = &self.capture;
        OrchestratorConfig {
            keyboard: KeyboardConfig {
                max_events: capture.max_events,
                queue_capacity: capture.queue_capacity,
                typing_session_timeout: capture.typing_session_timeout,
                ..KeyboardConfig::default()
            },
            pointer: PointerConfig {
                movement_threshold: capture.movement_threshold,
                max_events: capture.max_events,
                queue_capacity: capture.queue_capacity,
                privacy_mode: capture.pointer_privacy_mode,
                scroll_session_timeout: capture.scroll_session_timeout,
                track_click_patterns: capture.track_click_patterns,
                ..PointerConfig::default()
            },
            analysis: self.analysis.clone(),
            privacy: self.privacy.clone(),
            sequence_timeout: self.hotkeys.sequence_timeout,
            capture_keyboard: self.sources.keyboard,
            capture_pointer: self.sources.pointer,
        }
    }
}

/// Configuration for which input sources to capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub keyboard: bool,
    #[serde(alias = "mouse")]
    pub pointer: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            keyboard: true,
            pointer: true,
        }
    }
}

impl SourceConfig {
    /// Parse source configuration from a comma-separated string.
    pub fn from_csv(s: &str) -> Self {
        let sources: Vec<String> = s.split(',').map(|s| s.trim().to_lowercase()).collect();

        Self {
            keyboard: sources.iter().any(|s| s == "keyboard" || s == "all"),
            pointer: sources
                .iter()
                .any(|s| s == "pointer" || s == "mouse" || s == "all"),
        }
    }

    /// Check if at least one source is enabled.
    pub fn any_enabled(&self) -> bool {
        self.keyboard || self.pointer
    }
}

/// Capture service tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Minimum pointer movement in pixels
    pub movement_threshold: f64,
    /// Suppress pointer positions entirely
    pub pointer_privacy_mode: bool,
    pub queue_capacity: usize,
    /// Size of each service's recent-events buffer
    pub max_events: usize,
    #[serde(with = "duration_serde")]
    pub typing_session_timeout: Duration,
    #[serde(with = "duration_serde")]
    pub scroll_session_timeout: Duration,
    pub track_click_patterns: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        let keyboard = KeyboardConfig::default();
        let pointer = PointerConfig::default();
        Self {
            movement_threshold: pointer.movement_threshold,
            pointer_privacy_mode: pointer.privacy_mode,
            queue_capacity: pointer.queue_capacity,
            max_events: pointer.max_events,
            typing_session_timeout: keyboard.typing_session_timeout,
            scroll_session_timeout: pointer.scroll_session_timeout,
            track_click_patterns: pointer.track_click_patterns,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeySettings {
    /// Time allowed from the first to the last step of a sequence
    #[serde(with = "duration_serde")]
    pub sequence_timeout: Duration,
    /// Register `show_help` and `toggle_context` on start
    pub builtins: bool,
    /// User bindings registered on start
    pub bindings: Vec<HotkeyRecord>,
}

impl Default for HotkeySettings {
    fn default() -> Self {
        Self {
            sequence_timeout: DEFAULT_SEQUENCE_TIMEOUT,
            builtins: true,
            bindings: Vec::new(),
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as fractional seconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_config_parsing() {
        let config = SourceConfig::from_csv("keyboard,pointer");
        assert!(config.keyboard);
        assert!(config.pointer);

        let config = SourceConfig::from_csv("keyboard");
        assert!(config.keyboard);
        assert!(!config.pointer);

        let config = SourceConfig::from_csv("mouse");
        assert!(!config.keyboard);
        assert!(config.pointer);

        let config = SourceConfig::from_csv("all");
        assert!(config.any_enabled());
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tick_interval, Duration::from_secs(5));
        assert_eq!(config.hotkeys.sequence_timeout, Duration::from_secs(2));
        assert!(config.sources.keyboard);
        assert!(config.sources.pointer);
        assert!(!config.paused);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"paused": true, "hotkeys": {"sequence_timeout": 1.5}, "sources": {"keyboard": true, "mouse": false}}"#,
        )
        .unwrap();
        assert!(config.paused);
        assert!(!config.sources.pointer);
        assert_eq!(config.hotkeys.sequence_timeout, Duration::from_millis(1500));
        assert!(config.hotkeys.builtins);
        assert_eq!(config.analysis.rhythm_window, 20);
    }

    #[test]
    fn test_user_bindings_parse() {
        let settings: HotkeySettings = serde_json::from_str(
            r#"{"builtins": false, "bindings": [{"name": "notes", "keys": "ctrl+alt+n"}]}"#,
        )
        .unwrap();
        assert!(!settings.builtins);
        assert_eq!(settings.bindings[0].name, "notes");
        assert_eq!(settings.bindings[0].context, "global");
    }

    #[test]
    fn test_negative_duration_rejected() {
        let result: Result<HotkeySettings, _> =
            serde_json::from_str(r#"{"sequence_timeout": -1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_orchestrator_settings() {
        let mut config = Config::default();
        config.capture.movement_threshold = 12.0;
        config.sources = SourceConfig::from_csv("keyboard");
        let settings = config.orchestrator_config();
        assert_eq!(settings.pointer.movement_threshold, 12.0);
        assert!(!settings.capture_pointer);
    }
}
