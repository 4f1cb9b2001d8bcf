//! Capture orchestrator.
//!
//! Owns both capture services and wires their filtered event streams into
//! the hotkey matcher and the analyzer. The privacy engine is installed as
//! the filter of both services, so every consumer downstream sees filtered
//! events only.

use crate::analysis::{AnalysisConfig, InputAnalyzer, Pattern, PatternType, ProductivityInsights};
use crate::clock;
use crate::collector::{
    Callback, CaptureError, EventFilter, HookTarget, InputEvent, InputHook, KeyEvent,
    KeyboardCapture, KeyboardConfig, PlatformHook, PointerCapture, PointerConfig, PointerEvent,
};
use crate::export::{import_document, ExportDocument, ExportError, ImportReport};
use crate::hotkey::{
    ActionMap, HotkeyAction, HotkeyError, HotkeyMatcher, HotkeySpec, HotkeyTrigger, SharedAction,
    DEFAULT_SEQUENCE_TIMEOUT,
};
use crate::privacy::{PrivacyConfig, PrivacyEngine, PrivacyError};
use crate::transparency::{create_shared_log, SharedTransparencyLog};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Keyboard filter: the privacy policy, plus forgetting held keys whenever
/// the policy suppresses a key event, since that event may be a release.
struct KeyboardPolicy {
    privacy: Arc<PrivacyEngine>,
    hotkeys: Arc<HotkeyMatcher>,
}

impl EventFilter for KeyboardPolicy {
    fn filter_key(&self, event: KeyEvent) -> Option<KeyEvent> {
        let filtered = self.privacy.filter_keyboard_event(event);
        if filtered.is_none() {
            self.hotkeys.reset_held_keys();
        }
        filtered
    }

    fn filter_pointer(&self, event: PointerEvent) -> Option<PointerEvent> {
        self.privacy.filter_pointer_event(event)
    }
}

/// Everything needed to build an orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub keyboard: KeyboardConfig,
    pub pointer: PointerConfig,
    pub analysis: AnalysisConfig,
    pub privacy: PrivacyConfig,
    pub sequence_timeout: Duration,
    pub capture_keyboard: bool,
    pub capture_pointer: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            keyboard: KeyboardConfig::default(),
            pointer: PointerConfig::default(),
            analysis: AnalysisConfig::default(),
            privacy: PrivacyConfig::default(),
            sequence_timeout: DEFAULT_SEQUENCE_TIMEOUT,
            capture_keyboard: true,
            capture_pointer: true,
        }
    }
}

/// Combined statistics of both services, the registry and the analyzer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureStatistics {
    pub total_keystrokes: u64,
    pub keys_per_minute: f64,
    pub total_clicks: u64,
    pub clicks_per_minute: f64,
    pub session_duration_secs: f64,
    pub registered_hotkeys: usize,
    pub pattern_counts: BTreeMap<PatternType, usize>,
    pub words_typed: u64,
    pub typing_sessions: u64,
    pub scroll_sessions: u64,
    pub total_distance: f64,
    pub average_velocity: f64,
    pub dropped_events: u64,
    pub is_capturing: bool,
}

pub struct CaptureOrchestrator {
    keyboard: KeyboardCapture,
    pointer: PointerCapture,
    privacy: Arc<PrivacyEngine>,
    hotkeys: Arc<HotkeyMatcher>,
    analyzer: Arc<InputAnalyzer>,
    transparency: SharedTransparencyLog,
    capture_keyboard: bool,
    capture_pointer: bool,
}

impl CaptureOrchestrator {
    /// Build an orchestrator over the given hooks.
    ///
    /// Fails only if the privacy configuration has an invalid custom pattern.
    pub fn new(
        config: OrchestratorConfig,
        keyboard_hook: Box<dyn InputHook>,
        pointer_hook: Box<dyn InputHook>,
    ) -> Result<Self, PrivacyError> {
        Self::with_transparency(config, keyboard_hook, pointer_hook, create_shared_log())
    }

    /// Build an orchestrator that reports into an existing transparency log.
    pub fn with_transparency(
        config: OrchestratorConfig,
        keyboard_hook: Box<dyn InputHook>,
        pointer_hook: Box<dyn InputHook>,
        transparency: SharedTransparencyLog,
    ) -> Result<Self, PrivacyError> {
        let privacy =
            Arc::new(PrivacyEngine::new(config.privacy)?.with_transparency(transparency.clone()));
        let hotkeys = Arc::new(HotkeyMatcher::new(config.sequence_timeout));
        let analyzer =
            Arc::new(InputAnalyzer::new(config.analysis).with_transparency(transparency.clone()));

        let keyboard = KeyboardCapture::new(config.keyboard, keyboard_hook);
        let pointer = PointerCapture::new(config.pointer, pointer_hook);
        keyboard.set_filter(Arc::new(KeyboardPolicy {
            privacy: privacy.clone(),
            hotkeys: hotkeys.clone(),
        }));
        pointer.set_filter(privacy.clone());

        {
            let hotkeys = hotkeys.clone();
            let analyzer = analyzer.clone();
            let transparency = transparency.clone();
            keyboard.on_key_press(Arc::new(move |event: &KeyEvent| {
                for trigger in hotkeys.process_event(event) {
                    transparency.record_hotkey_triggered();
                    analyzer.record_hotkey(&trigger.name, trigger.timestamp);
                }
                analyzer.observe_key(event);
            }));
        }
        {
            let hotkeys = hotkeys.clone();
            keyboard.on_key_release(Arc::new(move |event: &KeyEvent| {
                hotkeys.process_event(event);
            }));
        }
        let observe = {
            let analyzer = analyzer.clone();
            Arc::new(move |event: &PointerEvent| analyzer.observe_pointer(event))
                as Callback<PointerEvent>
        };
        pointer.on_pointer_move(observe.clone());
        pointer.on_pointer_click(observe.clone());
        pointer.on_pointer_scroll(observe);

        Ok(Self {
            keyboard,
            pointer,
            privacy,
            hotkeys,
            analyzer,
            transparency,
            capture_keyboard: config.capture_keyboard,
            capture_pointer: config.capture_pointer,
        })
    }

    /// Build an orchestrator over this platform's global hooks.
    pub fn with_platform_hooks(config: OrchestratorConfig) -> Result<Self, PrivacyError> {
        Self::new(
            config,
            Box::new(PlatformHook::new(HookTarget::Keyboard)),
            Box::new(PlatformHook::new(HookTarget::Pointer)),
        )
    }

    /// Start the enabled services.
    ///
    /// If the pointer service fails after the keyboard service started, the
    /// keyboard service is stopped again and the error returned.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.is_capturing() {
            warn!("capture already running");
            return Ok(());
        }
        if self.capture_keyboard {
            self.keyboard.start()?;
        }
        if self.capture_pointer {
            if let Err(e) = self.pointer.start() {
                self.keyboard.stop();
                return Err(e);
            }
        }
        info!(
            keyboard = self.capture_keyboard,
            pointer = self.capture_pointer,
            "capture started"
        );
        Ok(())
    }

    /// Stop both services. Idempotent.
    pub fn stop(&mut self) {
        let was_capturing = self.is_capturing();
        self.keyboard.stop();
        self.pointer.stop();
        self.hotkeys.reset_sequence();
        self.hotkeys.reset_held_keys();
        self.transparency.set_queue_overflows(self.dropped_events());
        if was_capturing {
            info!("capture stopped");
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.keyboard.is_capturing() || self.pointer.is_capturing()
    }

    /// Periodic maintenance at the current time.
    pub fn tick(&self) -> Option<Pattern> {
        self.tick_at(clock::now())
    }

    /// Idle detection, retention pruning and overflow accounting at `now`.
    ///
    /// Returns the idle pattern if one was detected.
    pub fn tick_at(&self, now: f64) -> Option<Pattern> {
        let idle = self.analyzer.detect_idle_periods(now);
        let retention = f64::from(self.privacy.config().retention_days) * SECONDS_PER_DAY;
        let pruned = self.analyzer.prune_before(now - retention);
        if pruned > 0 {
            debug!(pruned, "patterns past retention removed");
        }
        self.transparency.set_queue_overflows(self.dropped_events());
        idle
    }

    fn dropped_events(&self) -> u64 {
        self.keyboard.statistics().dropped_events + self.pointer.statistics().dropped_events
    }

    pub fn register_hotkey(&self, spec: HotkeySpec, action: SharedAction) -> Result<(), HotkeyError> {
        self.hotkeys.register(spec, action)
    }

    pub fn register_hotkey_fn<F>(&self, spec: HotkeySpec, action: F) -> Result<(), HotkeyError>
    where
        F: HotkeyAction + 'static,
    {
        self.hotkeys.register_fn(spec, action)
    }

    pub fn unregister_hotkey(&self, name: &str) -> bool {
        self.hotkeys.unregister(name)
    }

    /// Replace the privacy policy. An invalid policy leaves the current one.
    pub fn configure_privacy(&self, config: PrivacyConfig) -> Result<(), PrivacyError> {
        self.privacy.configure(config)
    }

    pub fn privacy(&self) -> &PrivacyEngine {
        &self.privacy
    }

    /// The hotkey registry, for contexts and enable/disable.
    /// Register the `show_help` and `toggle_context` bindings.
    pub fn register_builtin_hotkeys(&self) -> Result<(), HotkeyError> {
        self.hotkeys.register_builtins()
    }

    pub fn hotkeys(&self) -> &HotkeyMatcher {
        &self.hotkeys
    }

    pub fn analyzer(&self) -> &InputAnalyzer {
        &self.analyzer
    }

    pub fn keyboard(&self) -> &KeyboardCapture {
        &self.keyboard
    }

    pub fn pointer(&self) -> &PointerCapture {
        &self.pointer
    }

    pub fn transparency(&self) -> &SharedTransparencyLog {
        &self.transparency
    }

    pub fn on_key_press(&self, callback: Callback<KeyEvent>) {
        self.keyboard.on_key_press(callback);
    }

    pub fn on_key_release(&self, callback: Callback<KeyEvent>) {
        self.keyboard.on_key_release(callback);
    }

    pub fn on_pointer_move(&self, callback: Callback<PointerEvent>) {
        self.pointer.on_pointer_move(callback);
    }

    pub fn on_pointer_click(&self, callback: Callback<PointerEvent>) {
        self.pointer.on_pointer_click(callback);
    }

    pub fn on_pointer_scroll(&self, callback: Callback<PointerEvent>) {
        self.pointer.on_pointer_scroll(callback);
    }

    pub fn on_pattern_detected(&self, callback: Callback<Pattern>) {
        self.analyzer.on_pattern_detected(callback);
    }

    pub fn on_hotkey_triggered(&self, callback: Callback<HotkeyTrigger>) {
        self.hotkeys.on_trigger(callback);
    }

    pub fn get_statistics(&self) -> CaptureStatistics {
        let keyboard = self.keyboard.statistics();
        let pointer = self.pointer.statistics();
        CaptureStatistics {
            total_keystrokes: keyboard.total_keystrokes,
            keys_per_minute: keyboard.keys_per_minute,
            total_clicks: pointer.total_clicks,
            clicks_per_minute: pointer.clicks_per_minute,
            session_duration_secs: keyboard
                .session_duration_secs
                .max(pointer.session_duration_secs),
            registered_hotkeys: self.hotkeys.len(),
            pattern_counts: self.analyzer.pattern_counts(),
            words_typed: keyboard.words_typed,
            typing_sessions: keyboard.typing_sessions,
            scroll_sessions: pointer.scroll_sessions,
            total_distance: pointer.total_distance,
            average_velocity: pointer.average_velocity,
            dropped_events: keyboard.dropped_events + pointer.dropped_events,
            is_capturing: keyboard.is_capturing || pointer.is_capturing,
        }
    }

    /// The most recent `n` events of both services, oldest first.
    pub fn get_recent_events(&self, n: usize) -> Vec<InputEvent> {
        let mut events: Vec<InputEvent> = self
            .keyboard
            .get_recent_events(n)
            .into_iter()
            .map(InputEvent::Key)
            .chain(
                self.pointer
                    .get_recent_events(n)
                    .into_iter()
                    .map(InputEvent::Pointer),
            )
            .collect();
        events.sort_by(|a, b| a.timestamp().total_cmp(&b.timestamp()));
        let skip = events.len().saturating_sub(n);
        events.split_off(skip)
    }

    pub fn get_productivity_insights(&self) -> ProductivityInsights {
        self.analyzer.productivity_insights(clock::now())
    }

    pub fn patterns(&self) -> Vec<Pattern> {
        self.analyzer.patterns()
    }

    /// Write hotkeys, patterns and current statistics to `path`.
    pub fn export_to(&self, path: &Path) -> Result<(), ExportError> {
        ExportDocument::capture(&self.hotkeys, &self.analyzer, Some(self.get_statistics()))
            .save(path)
    }

    /// Re-bind hotkeys from `path` using `actions` and append its patterns.
    pub fn import_from(&self, path: &Path, actions: &ActionMap) -> Result<ImportReport, ExportError> {
        import_document(path, &self.hotkeys, &self.analyzer, actions)
    }
}

impl Drop for CaptureOrchestrator {
    fn drop(&mut self) {
        self.stop();
    }
}
