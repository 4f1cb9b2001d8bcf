//! Pointer capture service.
//!
//! The hook thread applies the movement threshold, computes velocity between
//! retained samples, synthesizes drag start/end, and suppresses positions in
//! privacy mode before enqueuing. The consumer thread records events, tracks
//! scroll sessions and click patterns, and invokes callbacks.

use crate::clock;
use crate::collector::hook::{CaptureError, InputHook, RawInputSink};
use crate::collector::types::{
    Point, PointerButton, PointerEvent, PointerEventKind, RawInput, ScrollDelta, ScrollDirection,
};
use crate::collector::worker::{
    run_consumer, Callback, CallbackList, EventFilter, SessionClock, Worker,
    DEFAULT_QUEUE_CAPACITY, STOP_TIMEOUT,
};
use crate::sync::lock;
use crossbeam_channel::{bounded, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

const DOUBLE_CLICK_INTERVAL: f64 = 0.5;
const DOUBLE_CLICK_DISTANCE: f64 = 10.0;
const RAPID_CLICK_COUNT: usize = 5;
const RAPID_CLICK_SPAN: f64 = 2.0;
const MAX_CLICK_HISTORY: usize = 1000;

/// Pointer service configuration.
#[derive(Debug, Clone)]
pub struct PointerConfig {
    /// Minimum pixel delta between retained move samples
    pub movement_threshold: f64,
    pub max_events: usize,
    pub queue_capacity: usize,
    /// Suppress positions on every event
    pub privacy_mode: bool,
    pub capture_movement: bool,
    pub capture_clicks: bool,
    pub capture_scrolling: bool,
    pub capture_dragging: bool,
    pub track_click_patterns: bool,
    pub scroll_session_timeout: Duration,
    /// Number of retained move samples averaged for velocity
    pub velocity_window: usize,
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            movement_threshold: 5.0,
            max_events: 1000,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            privacy_mode: false,
            capture_movement: true,
            capture_clicks: true,
            capture_scrolling: true,
            capture_dragging: true,
            track_click_patterns: true,
            scroll_session_timeout: Duration::from_secs(2),
            velocity_window: 50,
        }
    }
}

/// A click pattern recognized from recent presses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum ClickPattern {
    DoubleClick {
        position: Option<Point>,
        interval: f64,
    },
    RapidClicking {
        clicks: usize,
        span: f64,
        rate: f64,
    },
}

/// A closed scroll session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollSessionSummary {
    pub start: f64,
    pub end: f64,
    pub scrolls: u64,
    pub total_dx: f64,
    pub total_dy: f64,
    pub start_position: Option<Point>,
    pub dominant_direction: Option<ScrollDirection>,
}

/// One bucket of the click heatmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub x: f64,
    pub y: f64,
    pub count: u64,
}

/// Pointer statistics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointerStatistics {
    pub total_clicks: u64,
    pub clicks_per_minute: f64,
    pub total_scrolls: u64,
    pub total_movements: u64,
    pub total_distance: f64,
    pub average_velocity: f64,
    pub session_duration_secs: f64,
    pub scroll_sessions: u64,
    pub click_patterns: u64,
    pub events_buffered: usize,
    pub dropped_events: u64,
    pub is_capturing: bool,
}

/// Hook-thread state: threshold, velocity and drag synthesis.
#[derive(Debug, Default)]
struct PointerNormalizer {
    last_retained: Option<(Point, f64)>,
    left_down: Option<Point>,
    dragging: bool,
    total_distance: f64,
}

impl PointerNormalizer {
    fn visible(config: &PointerConfig, point: Point) -> Option<Point> {
        (!config.privacy_mode).then_some(point)
    }

    fn normalize(&mut self, raw: RawInput, config: &PointerConfig, out: &mut Vec<PointerEvent>) {
        match raw {
            RawInput::PointerMoved { x, y, timestamp } => {
                if !config.capture_movement {
                    return;
                }
                let point = Point::new(x, y);
                let mut velocity = 0.0;
                if let Some((last, last_ts)) = self.last_retained {
                    let distance = point.distance_to(&last);
                    if distance < config.movement_threshold {
                        return;
                    }
                    self.total_distance += distance;
                    if timestamp > last_ts {
                        velocity = distance / (timestamp - last_ts);
                    }
                }
                self.last_retained = Some((point, timestamp));

                if let Some(origin) = self.left_down {
                    if !self.dragging && config.capture_dragging {
                        self.dragging = true;
                        out.push(PointerEvent::drag_start(
                            timestamp,
                            Self::visible(config, origin),
                        ));
                    }
                }
                out.push(PointerEvent::movement(
                    timestamp,
                    Self::visible(config, point),
                    velocity,
                ));
            }
            RawInput::PointerButton {
                button,
                pressed,
                x,
                y,
                timestamp,
            } => {
                let point = Point::new(x, y);
                if config.capture_clicks {
                    out.push(PointerEvent::click(
                        timestamp,
                        Self::visible(config, point),
                        button,
                        pressed,
                    ));
                }
                if button == PointerButton::Left {
                    if pressed {
                        self.left_down = Some(point);
                    } else {
                        self.left_down = None;
                        if self.dragging {
                            self.dragging = false;
                            out.push(PointerEvent::drag_end(
                                timestamp,
                                Self::visible(config, point),
                            ));
                        }
                    }
                }
            }
            RawInput::PointerScrolled {
                x,
                y,
                dx,
                dy,
                timestamp,
            } => {
                if config.capture_scrolling {
                    out.push(PointerEvent::scroll(
                        timestamp,
                        Self::visible(config, Point::new(x, y)),
                        dx,
                        dy,
                    ));
                }
            }
            RawInput::KeyDown { .. } | RawInput::KeyUp { .. } => {}
        }
    }
}

struct SinkState {
    normalizer: PointerNormalizer,
    sender: Option<Sender<PointerEvent>>,
    scratch: Vec<PointerEvent>,
}

/// Hook-side half of the service. Never blocks.
struct PointerSink {
    config: PointerConfig,
    state: Mutex<SinkState>,
    dropped: AtomicU64,
}

impl PointerSink {
    fn new(config: PointerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(SinkState {
                normalizer: PointerNormalizer::default(),
                sender: None,
                scratch: Vec::with_capacity(2),
            }),
            dropped: AtomicU64::new(0),
        }
    }

    fn attach(&self, sender: Sender<PointerEvent>) {
        let mut state = lock(&self.state);
        let distance = state.normalizer.total_distance;
        state.normalizer = PointerNormalizer {
            total_distance: distance,
            ..PointerNormalizer::default()
        };
        state.sender = Some(sender);
    }

    fn detach(&self) {
        lock(&self.state).sender = None;
    }

    fn total_distance(&self) -> f64 {
        lock(&self.state).normalizer.total_distance
    }
}

impl RawInputSink for PointerSink {
    fn deliver(&self, input: RawInput) {
        let mut guard = lock(&self.state);
        let state = &mut *guard;
        let Some(sender) = &state.sender else {
            return;
        };
        state.normalizer.normalize(input, &self.config, &mut state.scratch);
        for event in state.scratch.drain(..) {
            if let Err(TrySendError::Full(_)) = sender.try_send(event) {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

struct OpenScroll {
    start: f64,
    last: f64,
    scrolls: u64,
    total_dx: f64,
    total_dy: f64,
    start_position: Option<Point>,
}

impl OpenScroll {
    fn close(self) -> ScrollSessionSummary {
        let dominant_direction = (self.total_dx != 0.0 || self.total_dy != 0.0).then(|| {
            ScrollDelta {
                dx: self.total_dx,
                dy: self.total_dy,
            }
            .direction()
        });
        ScrollSessionSummary {
            start: self.start,
            end: self.last,
            scrolls: self.scrolls,
            total_dx: self.total_dx,
            total_dy: self.total_dy,
            start_position: self.start_position,
            dominant_direction,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ClickRecord {
    position: Option<Point>,
    timestamp: f64,
}

struct PointerState {
    recent: VecDeque<PointerEvent>,
    max_events: usize,
    total_clicks: u64,
    total_scrolls: u64,
    total_movements: u64,
    velocities: VecDeque<f64>,
    velocity_window: usize,
    clock: SessionClock,
    scroll: Option<OpenScroll>,
    scroll_timeout: f64,
    scroll_sessions: u64,
    clicks: VecDeque<ClickRecord>,
    click_patterns: u64,
    track_click_patterns: bool,
}

#[derive(Default)]
struct PointerUpdate {
    patterns: Vec<ClickPattern>,
    scroll_ended: Vec<ScrollSessionSummary>,
}

impl PointerState {
    fn record(&mut self, event: &PointerEvent, update: &mut PointerUpdate) {
        if self.recent.len() >= self.max_events {
            self.recent.pop_front();
        }
        self.recent.push_back(event.clone());

        match event.kind {
            PointerEventKind::Move => {
                self.total_movements += 1;
                if let Some(v) = event.velocity {
                    if self.velocities.len() >= self.velocity_window {
                        self.velocities.pop_front();
                    }
                    self.velocities.push_back(v);
                }
            }
            PointerEventKind::Click if event.is_press() => {
                self.total_clicks += 1;
                if self.clicks.len() >= MAX_CLICK_HISTORY {
                    self.clicks.pop_front();
                }
                self.clicks.push_back(ClickRecord {
                    position: event.position,
                    timestamp: event.timestamp,
                });
                if self.track_click_patterns {
                    if let Some(pattern) = self.detect_click_pattern() {
                        self.click_patterns += 1;
                        update.patterns.push(pattern);
                    }
                }
            }
            PointerEventKind::Scroll => {
                self.total_scrolls += 1;
                let ts = event.timestamp;
                if self
                    .scroll
                    .as_ref()
                    .is_some_and(|s| ts - s.last > self.scroll_timeout)
                {
                    update.scroll_ended.extend(self.close_scroll());
                }
                let scroll = self.scroll.get_or_insert(OpenScroll {
                    start: ts,
                    last: ts,
                    scrolls: 0,
                    total_dx: 0.0,
                    total_dy: 0.0,
                    start_position: event.position,
                });
                scroll.last = ts;
                scroll.scrolls += 1;
                if let Some(delta) = event.scroll {
                    scroll.total_dx += delta.dx;
                    scroll.total_dy += delta.dy;
                }
            }
            _ => {}
        }
    }

    /// Rapid clicking takes precedence over a double click.
    fn detect_click_pattern(&self) -> Option<ClickPattern> {
        let n = self.clicks.len();
        if n >= RAPID_CLICK_COUNT {
            let first = self.clicks[n - RAPID_CLICK_COUNT];
            let last = self.clicks[n - 1];
            let span = last.timestamp - first.timestamp;
            if span < RAPID_CLICK_SPAN {
                let rate = if span > 0.0 {
                    RAPID_CLICK_COUNT as f64 / span
                } else {
                    0.0
                };
                return Some(ClickPattern::RapidClicking {
                    clicks: RAPID_CLICK_COUNT,
                    span,
                    rate,
                });
            }
        }

        if n >= 2 {
            let prev = self.clicks[n - 2];
            let last = self.clicks[n - 1];
            let interval = last.timestamp - prev.timestamp;
            let near = match (prev.position, last.position) {
                (Some(a), Some(b)) => a.distance_to(&b) < DOUBLE_CLICK_DISTANCE,
                // Positions suppressed: judge by timing alone
                _ => true,
            };
            if interval < DOUBLE_CLICK_INTERVAL && near {
                return Some(ClickPattern::DoubleClick {
                    position: last.position,
                    interval,
                });
            }
        }
        None
    }

    fn close_scroll(&mut self) -> Option<ScrollSessionSummary> {
        let summary = self.scroll.take()?.close();
        self.scroll_sessions += 1;
        Some(summary)
    }

    fn average_velocity(&self) -> f64 {
        if self.velocities.is_empty() {
            0.0
        } else {
            self.velocities.iter().sum::<f64>() / self.velocities.len() as f64
        }
    }
}

struct PointerShared {
    state: Mutex<PointerState>,
    filter: Mutex<Option<Arc<dyn EventFilter>>>,
    on_move: CallbackList<PointerEvent>,
    on_click: CallbackList<PointerEvent>,
    on_scroll: CallbackList<PointerEvent>,
    on_drag_start: CallbackList<PointerEvent>,
    on_drag_end: CallbackList<PointerEvent>,
    on_click_pattern: CallbackList<ClickPattern>,
    on_scroll_session_end: CallbackList<ScrollSessionSummary>,
}

impl PointerShared {
    fn dispatch(&self, event: PointerEvent) {
        let filter = lock(&self.filter).clone();
        let event = match filter {
            Some(filter) => match filter.filter_pointer(event) {
                Some(event) => event,
                None => return,
            },
            None => event,
        };

        let mut update = PointerUpdate::default();
        lock(&self.state).record(&event, &mut update);

        match event.kind {
            PointerEventKind::Move => self.on_move.invoke(&event),
            PointerEventKind::Click => self.on_click.invoke(&event),
            PointerEventKind::Scroll => self.on_scroll.invoke(&event),
            PointerEventKind::DragStart => self.on_drag_start.invoke(&event),
            PointerEventKind::DragEnd => self.on_drag_end.invoke(&event),
        }
        self.publish(update);
    }

    fn on_idle(&self) {
        let now = clock::now();
        let ended = {
            let mut state = lock(&self.state);
            let idle = state
                .scroll
                .as_ref()
                .is_some_and(|s| now - s.last > state.scroll_timeout);
            if idle {
                state.close_scroll()
            } else {
                None
            }
        };
        self.publish(PointerUpdate {
            patterns: Vec::new(),
            scroll_ended: ended.into_iter().collect(),
        });
    }

    fn finish(&self) {
        let ended = lock(&self.state).close_scroll();
        self.publish(PointerUpdate {
            patterns: Vec::new(),
            scroll_ended: ended.into_iter().collect(),
        });
    }

    fn publish(&self, update: PointerUpdate) {
        for pattern in update.patterns {
            debug!(?pattern, "click pattern");
            self.on_click_pattern.invoke(&pattern);
        }
        for summary in update.scroll_ended {
            self.on_scroll_session_end.invoke(&summary);
        }
    }
}

/// Global pointer capture.
pub struct PointerCapture {
    config: PointerConfig,
    hook: Box<dyn InputHook>,
    sink: Arc<PointerSink>,
    shared: Arc<PointerShared>,
    capturing: Arc<AtomicBool>,
    worker: Option<Worker>,
}

impl PointerCapture {
    pub fn new(config: PointerConfig, hook: Box<dyn InputHook>) -> Self {
        let state = PointerState {
            recent: VecDeque::with_capacity(config.max_events.min(1024)),
            max_events: config.max_events.max(1),
            total_clicks: 0,
            total_scrolls: 0,
            total_movements: 0,
            velocities: VecDeque::with_capacity(config.velocity_window),
            velocity_window: config.velocity_window.max(1),
            clock: SessionClock::default(),
            scroll: None,
            scroll_timeout: config.scroll_session_timeout.as_secs_f64(),
            scroll_sessions: 0,
            clicks: VecDeque::new(),
            click_patterns: 0,
            track_click_patterns: config.track_click_patterns,
        };

        Self {
            sink: Arc::new(PointerSink::new(config.clone())),
            config,
            hook,
            shared: Arc::new(PointerShared {
                state: Mutex::new(state),
                filter: Mutex::new(None),
                on_move: CallbackList::new("on_pointer_move"),
                on_click: CallbackList::new("on_pointer_click"),
                on_scroll: CallbackList::new("on_pointer_scroll"),
                on_drag_start: CallbackList::new("on_drag_start"),
                on_drag_end: CallbackList::new("on_drag_end"),
                on_click_pattern: CallbackList::new("on_click_pattern"),
                on_scroll_session_end: CallbackList::new("on_scroll_session_end"),
            }),
            capturing: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Start capturing.
    ///
    /// Fails with [`CaptureError::HookUnavailable`] if the platform refuses
    /// the hook. Starting while already capturing is a no-op.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.is_capturing() {
            warn!("pointer capture already running");
            return Ok(());
        }

        let (sender, receiver) = bounded(self.config.queue_capacity.max(1));
        self.sink.attach(sender);
        self.capturing.store(true, Ordering::SeqCst);

        if let Err(e) = self.hook.install(self.sink.clone()) {
            self.sink.detach();
            self.capturing.store(false, Ordering::SeqCst);
            warn!(error = %e, "pointer hook unavailable");
            return Err(e);
        }

        lock(&self.shared.state).clock.begin();

        let shared = self.shared.clone();
        let running = self.capturing.clone();
        let worker = Worker::spawn("pointer-capture", move || {
            run_consumer(
                &receiver,
                &running,
                |event| shared.dispatch(event),
                || shared.on_idle(),
            );
            shared.finish();
        });

        match worker {
            Ok(worker) => {
                self.worker = Some(worker);
                info!(
                    threshold = self.config.movement_threshold,
                    privacy_mode = self.config.privacy_mode,
                    "pointer capture started"
                );
                Ok(())
            }
            Err(e) => {
                self.hook.uninstall();
                self.sink.detach();
                self.capturing.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Stop capturing. Idempotent.
    pub fn stop(&mut self) {
        let was_capturing = self.capturing.swap(false, Ordering::SeqCst);
        self.hook.uninstall();
        self.sink.detach();

        if let Some(worker) = self.worker.take() {
            worker.join(STOP_TIMEOUT);
        }
        if was_capturing {
            lock(&self.shared.state).clock.end();
            info!("pointer capture stopped");
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    pub fn set_filter(&self, filter: Arc<dyn EventFilter>) {
        *lock(&self.shared.filter) = Some(filter);
    }

    pub fn on_pointer_move(&self, callback: Callback<PointerEvent>) {
        self.shared.on_move.push(callback);
    }

    pub fn on_pointer_click(&self, callback: Callback<PointerEvent>) {
        self.shared.on_click.push(callback);
    }

    pub fn on_pointer_scroll(&self, callback: Callback<PointerEvent>) {
        self.shared.on_scroll.push(callback);
    }

    pub fn on_drag_start(&self, callback: Callback<PointerEvent>) {
        self.shared.on_drag_start.push(callback);
    }

    pub fn on_drag_end(&self, callback: Callback<PointerEvent>) {
        self.shared.on_drag_end.push(callback);
    }

    pub fn on_click_pattern(&self, callback: Callback<ClickPattern>) {
        self.shared.on_click_pattern.push(callback);
    }

    pub fn on_scroll_session_end(&self, callback: Callback<ScrollSessionSummary>) {
        self.shared.on_scroll_session_end.push(callback);
    }

    /// The most recent `n` events, oldest first.
    pub fn get_recent_events(&self, n: usize) -> Vec<PointerEvent> {
        let state = lock(&self.shared.state);
        let skip = state.recent.len().saturating_sub(n);
        state.recent.iter().skip(skip).cloned().collect()
    }

    /// Click counts grouped by position within `tolerance` pixels.
    ///
    /// Empty in privacy mode.
    pub fn click_heatmap(&self, tolerance: f64) -> Vec<HeatmapCell> {
        if self.config.privacy_mode {
            return Vec::new();
        }
        let state = lock(&self.shared.state);
        let mut cells: Vec<HeatmapCell> = Vec::new();
        for position in state.clicks.iter().filter_map(|c| c.position) {
            match cells.iter_mut().find(|cell| {
                (cell.x - position.x).abs() < tolerance && (cell.y - position.y).abs() < tolerance
            }) {
                Some(cell) => cell.count += 1,
                None => cells.push(HeatmapCell {
                    x: position.x,
                    y: position.y,
                    count: 1,
                }),
            }
        }
        cells
    }

    pub fn statistics(&self) -> PointerStatistics {
        let state = lock(&self.shared.state);
        PointerStatistics {
            total_clicks: state.total_clicks,
            clicks_per_minute: state.clock.per_minute(state.total_clicks),
            total_scrolls: state.total_scrolls,
            total_movements: state.total_movements,
            total_distance: self.sink.total_distance(),
            average_velocity: state.average_velocity(),
            session_duration_secs: state.clock.duration_secs(),
            scroll_sessions: state.scroll_sessions,
            click_patterns: state.click_patterns,
            events_buffered: state.recent.len(),
            dropped_events: self.sink.dropped.load(Ordering::Relaxed),
            is_capturing: self.is_capturing(),
        }
    }

    pub fn clear(&self) {
        let mut state = lock(&self.shared.state);
        state.recent.clear();
        state.clicks.clear();
        state.velocities.clear();
        state.total_clicks = 0;
        state.total_scrolls = 0;
        state.total_movements = 0;
    }
}

impl Drop for PointerCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::hook::HookTarget;
    use crate::collector::synthetic::SyntheticInput;

    fn capture(config: PointerConfig) -> (PointerCapture, SyntheticInput) {
        let input = SyntheticInput::new();
        let capture = PointerCapture::new(config, Box::new(input.hook(HookTarget::Pointer)));
        (capture, input)
    }

    #[test]
    fn test_movement_threshold_drops_jitter() {
        let config = PointerConfig::default();
        let mut normalizer = PointerNormalizer::default();
        let mut out = Vec::new();
        for (i, x) in [0.0, 2.0, 4.0, 10.0].iter().enumerate() {
            normalizer.normalize(
                RawInput::PointerMoved {
                    x: *x,
                    y: 0.0,
                    timestamp: i as f64,
                },
                &config,
                &mut out,
            );
        }
        // 0 retained, 2 and 4 within 5px of 0, 10 retained
        assert_eq!(out.len(), 2);
        // velocity between retained samples: 10px over 3s
        assert!((out[1].velocity.unwrap() - 10.0 / 3.0).abs() < 1e-9);
        assert!((normalizer.total_distance - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_drag_synthesis() {
        let config = PointerConfig::default();
        let mut normalizer = PointerNormalizer::default();
        let mut out = Vec::new();
        normalizer.normalize(
            RawInput::PointerButton {
                button: PointerButton::Left,
                pressed: true,
                x: 0.0,
                y: 0.0,
                timestamp: 0.0,
            },
            &config,
            &mut out,
        );
        for (i, x) in [20.0, 40.0].iter().enumerate() {
            normalizer.normalize(
                RawInput::PointerMoved {
                    x: *x,
                    y: 0.0,
                    timestamp: 0.1 * (i + 1) as f64,
                },
                &config,
                &mut out,
            );
        }
        normalizer.normalize(
            RawInput::PointerButton {
                button: PointerButton::Left,
                pressed: false,
                x: 40.0,
                y: 0.0,
                timestamp: 0.5,
            },
            &config,
            &mut out,
        );

        let kinds: Vec<_> = out.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                PointerEventKind::Click,
                PointerEventKind::DragStart,
                PointerEventKind::Move,
                PointerEventKind::Move,
                PointerEventKind::Click,
                PointerEventKind::DragEnd,
            ]
        );
    }

    #[test]
    fn test_privacy_mode_suppresses_positions() {
        let (mut capture, input) = capture(PointerConfig {
            privacy_mode: true,
            ..PointerConfig::default()
        });
        capture.start().unwrap();
        input.click(PointerButton::Left, 100.0, 100.0, 0.0);
        input.move_to(300.0, 300.0, 0.1);
        capture.stop();

        let events = capture.get_recent_events(10);
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| e.position.is_none()));
        assert!(capture.click_heatmap(20.0).is_empty());
    }

    #[test]
    fn test_click_patterns_and_heatmap() {
        let (mut capture, input) = capture(PointerConfig::default());
        let patterns = Arc::new(Mutex::new(Vec::new()));
        let p = patterns.clone();
        capture.on_click_pattern(Arc::new(move |pattern: &ClickPattern| {
            lock(&p).push(pattern.clone())
        }));

        capture.start().unwrap();
        input.click(PointerButton::Left, 50.0, 50.0, 10.0);
        input.click(PointerButton::Left, 52.0, 51.0, 10.2);
        input.click(PointerButton::Left, 400.0, 400.0, 20.0);
        capture.stop();

        let patterns = lock(&patterns);
        assert_eq!(patterns.len(), 1);
        assert!(matches!(patterns[0], ClickPattern::DoubleClick { .. }));

        let heatmap = capture.click_heatmap(20.0);
        assert_eq!(heatmap.len(), 2);
        assert_eq!(heatmap[0].count, 2);

        let stats = capture.statistics();
        assert_eq!(stats.total_clicks, 3);
        assert_eq!(stats.click_patterns, 1);
    }

    #[test]
    fn test_scroll_sessions_split_on_gap() {
        let (mut capture, input) = capture(PointerConfig::default());
        let sessions = Arc::new(Mutex::new(Vec::new()));
        let s = sessions.clone();
        capture.on_scroll_session_end(Arc::new(move |summary: &ScrollSessionSummary| {
            lock(&s).push(summary.clone())
        }));

        capture.start().unwrap();
        input.scroll(0.0, 0.0, 0.0, 1.0, 100.0);
        input.scroll(0.0, 0.0, 0.0, 1.0, 100.5);
        input.scroll(0.0, 0.0, 0.0, -1.0, 110.0);
        capture.stop();

        let sessions = lock(&sessions);
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].scrolls, 2);
        assert_eq!(sessions[0].dominant_direction, Some(ScrollDirection::Down));
        assert_eq!(capture.statistics().scroll_sessions, 2);
        assert_eq!(capture.statistics().total_scrolls, 3);
    }

    #[test]
    fn test_stop_twice() {
        let (mut capture, _input) = capture(PointerConfig::default());
        capture.start().unwrap();
        capture.stop();
        capture.stop();
        assert!(!capture.is_capturing());
    }
}
