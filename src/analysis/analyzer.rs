//! Input analyzer.
//!
//! Receives filtered events from both capture services, keeps short sliding
//! windows per detector, and appends detected patterns to a bounded log.
//! Listeners run after all analyzer locks are released.

use crate::analysis::detectors;
use crate::analysis::insights::ProductivityInsights;
use crate::analysis::pattern::{Pattern, PatternData, PatternLog, PatternType};
use crate::collector::types::{KeyEvent, Modifier, Point, PointerEvent, PointerEventKind};
use crate::collector::worker::{Callback, CallbackList};
use crate::hotkey::KeyCombo;
use crate::sync::lock;
use crate::transparency::SharedTransparencyLog;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use tracing::debug;

/// Detector thresholds. Durations are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub enable_typing_analysis: bool,
    pub enable_pointer_analysis: bool,
    pub enable_workflow_analysis: bool,
    /// Presses considered for rhythm
    pub rhythm_window: usize,
    /// Intervals at or above this are pauses, not rhythm
    pub pause_cutoff_secs: f64,
    pub min_rhythm_intervals: usize,
    /// Interval variance below which typing counts as rhythmic, in s²
    pub rhythm_variance_threshold: f64,
    pub burst_threshold: usize,
    pub burst_window_secs: f64,
    /// Move samples considered for gestures
    pub gesture_window: usize,
    /// Allowed radius spread as a fraction of the mean radius
    pub circular_tolerance: f64,
    pub min_gesture_radius: f64,
    pub line_straightness: f64,
    pub min_line_distance: f64,
    pub repetition_threshold: usize,
    pub repetition_radius: f64,
    pub repetition_window_secs: f64,
    pub idle_threshold_secs: f64,
    pub max_patterns: usize,
    pub insight_window_secs: f64,
    pub hotkey_chain_length: usize,
    pub hotkey_chain_window_secs: f64,
    pub workflow_gap_secs: f64,
    /// Minimum time between two patterns of the same type
    pub emission_cooldown_secs: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enable_typing_analysis: true,
            enable_pointer_analysis: true,
            enable_workflow_analysis: true,
            rhythm_window: 20,
            pause_cutoff_secs: 2.0,
            min_rhythm_intervals: 10,
            rhythm_variance_threshold: 0.1,
            burst_threshold: 10,
            burst_window_secs: 1.0,
            gesture_window: 10,
            circular_tolerance: 0.3,
            min_gesture_radius: 20.0,
            line_straightness: 0.8,
            min_line_distance: 50.0,
            repetition_threshold: 5,
            repetition_radius: 50.0,
            repetition_window_secs: 2.0,
            idle_threshold_secs: 30.0,
            max_patterns: 1000,
            insight_window_secs: 3600.0,
            hotkey_chain_length: 3,
            hotkey_chain_window_secs: 5.0,
            workflow_gap_secs: 10.0,
            emission_cooldown_secs: 1.0,
        }
    }
}

fn push_capped<T>(window: &mut VecDeque<T>, item: T, cap: usize) {
    window.push_back(item);
    while window.len() > cap.max(1) {
        window.pop_front();
    }
}

#[derive(Default)]
struct Windows {
    presses: VecDeque<f64>,
    moves: VecDeque<(Point, f64)>,
    clicks: VecDeque<(Point, f64)>,
    hotkeys: VecDeque<(String, f64)>,
    shortcuts: VecDeque<(String, f64)>,
    last_emitted: HashMap<PatternType, f64>,
    last_activity: Option<f64>,
    /// Activity timestamp whose idle gap was already reported
    idle_reported: Option<f64>,
}

impl Windows {
    fn touch(&mut self, timestamp: f64) {
        self.last_activity = Some(self.last_activity.map_or(timestamp, |t| t.max(timestamp)));
    }

    /// Accept a pattern unless its type fired within the cooldown.
    fn admit(&mut self, pattern: Option<Pattern>, cooldown: f64, out: &mut Vec<Pattern>) -> bool {
        let Some(pattern) = pattern else {
            return false;
        };
        if let Some(last) = self.last_emitted.get(&pattern.pattern_type) {
            if pattern.timestamp - last < cooldown {
                return false;
            }
        }
        self.last_emitted
            .insert(pattern.pattern_type, pattern.timestamp);
        out.push(pattern);
        true
    }
}

/// Pattern detector over the filtered event stream.
pub struct InputAnalyzer {
    config: AnalysisConfig,
    windows: Mutex<Windows>,
    log: Mutex<PatternLog>,
    listeners: CallbackList<Pattern>,
    transparency: Option<SharedTransparencyLog>,
}

impl Default for InputAnalyzer {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

impl InputAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            log: Mutex::new(PatternLog::new(config.max_patterns)),
            windows: Mutex::new(Windows::default()),
            listeners: CallbackList::new("on_pattern_detected"),
            transparency: None,
            config,
        }
    }

    /// Count detected patterns in a transparency log.
    pub fn with_transparency(mut self, log: SharedTransparencyLog) -> Self {
        self.transparency = Some(log);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn on_pattern_detected(&self, callback: Callback<Pattern>) {
        self.listeners.push(callback);
    }

    /// Feed one filtered key event.
    pub fn observe_key(&self, event: &KeyEvent) {
        if !event.is_press() {
            return;
        }
        let config = &self.config;
        let cooldown = config.emission_cooldown_secs;
        let mut found = Vec::new();
        {
            let mut w = lock(&self.windows);
            w.touch(event.timestamp);

            if config.enable_typing_analysis && !event.is_modifier() {
                let cap = config.rhythm_window.max(config.burst_threshold) + 1;
                push_capped(&mut w.presses, event.timestamp, cap);
                let presses: Vec<f64> = w.presses.iter().copied().collect();
                let rhythm = detectors::typing_rhythm(&presses, config);
                w.admit(rhythm, cooldown, &mut found);
                let burst = detectors::typing_burst(&presses, config);
                w.admit(burst, cooldown, &mut found);
            }

            if config.enable_workflow_analysis && !event.is_modifier() {
                if let Some(shortcut) = shortcut_token(event) {
                    push_capped(&mut w.shortcuts, (shortcut, event.timestamp), 8);
                    let shortcuts: Vec<(String, f64)> = w.shortcuts.iter().cloned().collect();
                    let flow = detectors::workflow(&shortcuts, config);
                    if w.admit(flow, cooldown, &mut found) {
                        w.shortcuts.clear();
                    }
                }
            }
        }
        self.emit(found);
    }

    /// Feed one filtered pointer event.
    pub fn observe_pointer(&self, event: &PointerEvent) {
        let config = &self.config;
        let cooldown = config.emission_cooldown_secs;
        let mut found = Vec::new();
        {
            let mut w = lock(&self.windows);
            w.touch(event.timestamp);
            if !config.enable_pointer_analysis {
                return;
            }
            let Some(position) = event.position else {
                return;
            };

            match event.kind {
                PointerEventKind::Move => {
                    push_capped(&mut w.moves, (position, event.timestamp), config.gesture_window);
                    let moves: Vec<(Point, f64)> = w.moves.iter().copied().collect();
                    let gesture = detectors::pointer_gesture(&moves, config);
                    w.admit(gesture, cooldown, &mut found);
                }
                PointerEventKind::Click if event.is_press() => {
                    push_capped(&mut w.clicks, (position, event.timestamp), 64);
                    let window = config.repetition_window_secs;
                    while w
                        .clicks
                        .front()
                        .is_some_and(|(_, t)| event.timestamp - t > window)
                    {
                        w.clicks.pop_front();
                    }
                    let clicks: Vec<(Point, f64)> = w.clicks.iter().copied().collect();
                    let repeated = detectors::repetitive_clicks(&clicks, config);
                    if w.admit(repeated, cooldown, &mut found) {
                        w.clicks.clear();
                    }
                }
                _ => {}
            }
        }
        self.emit(found);
    }

    /// Record a triggered hotkey for chain detection.
    pub fn record_hotkey(&self, name: &str, timestamp: f64) {
        let config = &self.config;
        let mut found = Vec::new();
        {
            let mut w = lock(&self.windows);
            push_capped(&mut w.hotkeys, (name.to_string(), timestamp), 16);
            let hotkeys: Vec<(String, f64)> = w.hotkeys.iter().cloned().collect();
            let chain = detectors::hotkey_chain(&hotkeys, config);
            if w.admit(chain, config.emission_cooldown_secs, &mut found) {
                w.hotkeys.clear();
            }
        }
        self.emit(found);
    }

    /// Report the current inactivity gap once it exceeds the idle threshold.
    ///
    /// Each gap is reported at most once; new activity starts a new gap.
    pub fn detect_idle_periods(&self, now: f64) -> Option<Pattern> {
        let pattern = {
            let mut w = lock(&self.windows);
            let last = w.last_activity?;
            let idle = now - last;
            if idle <= self.config.idle_threshold_secs || w.idle_reported == Some(last) {
                return None;
            }
            w.idle_reported = Some(last);
            Pattern::new(
                PatternType::IdlePeriod,
                1.0,
                last,
                idle,
                PatternData::Idle {
                    idle_duration: idle,
                    start_time: last,
                    end_time: now,
                },
                format!("Idle period: {idle:.1} seconds"),
            )
        };
        self.emit(vec![pattern.clone()]);
        Some(pattern)
    }

    fn emit(&self, found: Vec<Pattern>) {
        if found.is_empty() {
            return;
        }
        {
            let mut log = lock(&self.log);
            for pattern in &found {
                debug!(
                    pattern = pattern.pattern_type.as_str(),
                    confidence = pattern.confidence,
                    "pattern detected"
                );
                log.push(pattern.clone());
            }
        }
        for pattern in &found {
            if let Some(ref t) = self.transparency {
                t.record_pattern_detected();
            }
            self.listeners.invoke(pattern);
        }
    }

    /// Snapshot of the pattern log, oldest first.
    pub fn patterns(&self) -> Vec<Pattern> {
        lock(&self.log).snapshot()
    }

    pub fn pattern_counts(&self) -> BTreeMap<PatternType, usize> {
        lock(&self.log).counts()
    }

    /// Append previously exported patterns without notifying listeners.
    /// Values are clamped as on detection; non-finite patterns are dropped.
    pub fn import_patterns(&self, patterns: impl IntoIterator<Item = Pattern>) -> usize {
        let mut log = lock(&self.log);
        let mut imported = 0;
        for pattern in patterns.into_iter().filter_map(Pattern::validated) {
            log.push(pattern);
            imported += 1;
        }
        imported
    }

    /// Drop patterns older than `cutoff`.
    pub fn prune_before(&self, cutoff: f64) -> usize {
        lock(&self.log).prune_before(cutoff)
    }

    pub fn last_activity(&self) -> Option<f64> {
        lock(&self.windows).last_activity
    }

    pub fn productivity_insights(&self, now: f64) -> ProductivityInsights {
        let patterns = self.patterns();
        ProductivityInsights::from_patterns(&patterns, now, self.config.insight_window_secs)
    }

    /// Forget all windows and patterns.
    pub fn clear(&self) {
        *lock(&self.windows) = Windows::default();
        lock(&self.log).clear();
    }
}

/// `ctrl+<key>` for shortcut presses, treating meta as ctrl.
fn shortcut_token(event: &KeyEvent) -> Option<String> {
    let has_command = event.modifiers.contains(&Modifier::Ctrl)
        || event.modifiers.contains(&Modifier::Meta);
    if !has_command {
        return None;
    }
    let combo = KeyCombo::parse(&event.key).ok()?;
    let key = combo.keys().iter().next()?;
    Some(format!("ctrl+{key}"))
}
