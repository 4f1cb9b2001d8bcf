//! Keyboard capture service.
//!
//! The hook thread normalizes raw key input (tracking held modifiers) and
//! enqueues it without blocking. A named consumer thread applies the event
//! filter, records the event, tracks words and typing sessions, and invokes
//! callbacks in capture order.

use crate::collector::hook::{CaptureError, InputHook, RawInputSink};
use crate::collector::types::{KeyEvent, KeyEventKind, Modifier, RawInput};
use crate::collector::worker::{
    run_consumer, Callback, CallbackList, EventFilter, SessionClock, Worker,
    DEFAULT_QUEUE_CAPACITY, STOP_TIMEOUT,
};
use crate::clock;
use crate::sync::lock;
use crossbeam_channel::{bounded, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Keyboard service configuration.
#[derive(Debug, Clone)]
pub struct KeyboardConfig {
    /// Size of the recent-events buffer
    pub max_events: usize,
    pub queue_capacity: usize,
    /// Inactivity that closes a typing session
    pub typing_session_timeout: Duration,
    pub track_typing: bool,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            max_events: 1000,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            typing_session_timeout: Duration::from_secs(5),
            track_typing: true,
        }
    }
}

/// A closed typing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingSessionSummary {
    pub start: f64,
    pub end: f64,
    pub keystrokes: u64,
    pub words: u64,
    pub characters: u64,
    pub wpm: f64,
}

impl TypingSessionSummary {
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Keyboard statistics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyboardStatistics {
    pub total_keystrokes: u64,
    pub keys_per_minute: f64,
    pub session_duration_secs: f64,
    pub words_typed: u64,
    pub typing_sessions: u64,
    pub average_session_wpm: f64,
    pub events_buffered: usize,
    pub dropped_events: u64,
    pub is_capturing: bool,
}

/// Tracks held modifiers on the hook thread.
#[derive(Debug, Default)]
struct KeyNormalizer {
    held: BTreeSet<Modifier>,
}

impl KeyNormalizer {
    fn normalize(&mut self, raw: RawInput) -> Option<KeyEvent> {
        let (key, character, timestamp, kind) = match raw {
            RawInput::KeyDown {
                key,
                character,
                timestamp,
            } => (key, character, timestamp, KeyEventKind::Press),
            RawInput::KeyUp {
                key,
                character,
                timestamp,
            } => (key, character, timestamp, KeyEventKind::Release),
            _ => return None,
        };

        let key = key.trim().to_ascii_lowercase();
        if let Some(modifier) = Modifier::from_key_name(&key) {
            match kind {
                KeyEventKind::Press => self.held.insert(modifier),
                KeyEventKind::Release => self.held.remove(&modifier),
            };
        }

        let character = character.filter(|c| !c.is_control()).map(String::from);
        let is_special = character
            .as_deref()
            .map_or(true, |c| c.chars().all(char::is_whitespace));

        Some(KeyEvent {
            key,
            kind,
            timestamp,
            modifiers: self.held.clone(),
            is_special,
            character,
        })
    }
}

struct SinkState {
    normalizer: KeyNormalizer,
    sender: Option<Sender<KeyEvent>>,
}

/// Hook-side half of the service. Never blocks.
struct KeyboardSink {
    state: Mutex<SinkState>,
    dropped: AtomicU64,
}

impl KeyboardSink {
    fn new() -> Self {
        Self {
            state: Mutex::new(SinkState {
                normalizer: KeyNormalizer::default(),
                sender: None,
            }),
            dropped: AtomicU64::new(0),
        }
    }

    fn attach(&self, sender: Sender<KeyEvent>) {
        let mut state = lock(&self.state);
        state.normalizer = KeyNormalizer::default();
        state.sender = Some(sender);
    }

    /// Drop the sender so the consumer drains and sees the disconnect.
    fn detach(&self) {
        lock(&self.state).sender = None;
    }
}

impl RawInputSink for KeyboardSink {
    fn deliver(&self, input: RawInput) {
        let mut state = lock(&self.state);
        if state.sender.is_none() {
            return;
        }
        let Some(event) = state.normalizer.normalize(input) else {
            return;
        };
        if let Some(sender) = &state.sender {
            if let Err(TrySendError::Full(_)) = sender.try_send(event) {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

struct OpenSession {
    start: f64,
    last: f64,
    keystrokes: u64,
    words: u64,
    characters: u64,
}

/// Word and typing-session tracking. Only lengths are kept.
struct TypingTracker {
    timeout: f64,
    word_len: usize,
    words_typed: u64,
    session: Option<OpenSession>,
    completed_sessions: u64,
    wpm_sum: f64,
}

#[derive(Default)]
struct TypingUpdate {
    words: Vec<usize>,
    ended: Vec<TypingSessionSummary>,
}

impl TypingTracker {
    fn new(timeout: Duration) -> Self {
        Self {
            timeout: timeout.as_secs_f64(),
            word_len: 0,
            words_typed: 0,
            session: None,
            completed_sessions: 0,
            wpm_sum: 0.0,
        }
    }

    fn on_press(&mut self, event: &KeyEvent, update: &mut TypingUpdate) {
        let ts = event.timestamp;
        if self.session.as_ref().is_some_and(|s| ts - s.last > self.timeout) {
            update.ended.extend(self.close_session());
        }

        match event.key.as_str() {
            "space" | "enter" | "return" | "tab" => self.complete_word(update),
            "backspace" => self.word_len = self.word_len.saturating_sub(1),
            _ => match event.character.as_deref().and_then(|c| c.chars().next()) {
                // '*' is an alphanumeric masked by the privacy filter
                Some(c) if !event.is_special && (c.is_alphanumeric() || "'-*".contains(c)) => {
                    self.word_len += 1;
                    if self.session.is_none() {
                        self.session = Some(OpenSession {
                            start: ts,
                            last: ts,
                            keystrokes: 0,
                            words: 0,
                            characters: 0,
                        });
                    }
                }
                Some(_) if !event.is_special => self.complete_word(update),
                _ => {}
            },
        }

        if let Some(session) = &mut self.session {
            session.last = ts;
            session.keystrokes += 1;
        }
    }

    fn complete_word(&mut self, update: &mut TypingUpdate) {
        if self.word_len > 1 {
            self.words_typed += 1;
            if let Some(session) = &mut self.session {
                session.words += 1;
                session.characters += self.word_len as u64;
            }
            update.words.push(self.word_len);
        }
        self.word_len = 0;
    }

    fn close_session(&mut self) -> Option<TypingSessionSummary> {
        let session = self.session.take()?;
        let duration = session.last - session.start;
        let wpm = if duration > 0.0 {
            session.words as f64 / (duration / 60.0)
        } else {
            0.0
        };
        self.completed_sessions += 1;
        self.wpm_sum += wpm;
        Some(TypingSessionSummary {
            start: session.start,
            end: session.last,
            keystrokes: session.keystrokes,
            words: session.words,
            characters: session.characters,
            wpm,
        })
    }

    fn close_if_idle(&mut self, now: f64) -> Option<TypingSessionSummary> {
        match &self.session {
            Some(s) if now - s.last > self.timeout => self.close_session(),
            _ => None,
        }
    }

    fn average_wpm(&self) -> f64 {
        if self.completed_sessions == 0 {
            0.0
        } else {
            self.wpm_sum / self.completed_sessions as f64
        }
    }
}

struct KeyboardState {
    recent: VecDeque<KeyEvent>,
    max_events: usize,
    total_keystrokes: u64,
    clock: SessionClock,
    typing: TypingTracker,
    track_typing: bool,
}

/// Consumer-side state shared with the service handle.
struct KeyboardShared {
    state: Mutex<KeyboardState>,
    filter: Mutex<Option<Arc<dyn EventFilter>>>,
    on_press: CallbackList<KeyEvent>,
    on_release: CallbackList<KeyEvent>,
    on_word: CallbackList<usize>,
    on_session_end: CallbackList<TypingSessionSummary>,
}

impl KeyboardShared {
    fn dispatch(&self, event: KeyEvent) {
        let filter = lock(&self.filter).clone();
        let event = match filter {
            Some(filter) => match filter.filter_key(event) {
                Some(event) => event,
                None => return,
            },
            None => event,
        };

        let mut update = TypingUpdate::default();
        {
            let mut state = lock(&self.state);
            if state.recent.len() >= state.max_events {
                state.recent.pop_front();
            }
            state.recent.push_back(event.clone());
            if event.is_press() {
                state.total_keystrokes += 1;
                if state.track_typing {
                    state.typing.on_press(&event, &mut update);
                }
            }
        }

        if event.is_press() {
            self.on_press.invoke(&event);
        } else {
            self.on_release.invoke(&event);
        }
        self.publish(update);
    }

    fn on_idle(&self) {
        let ended = lock(&self.state).typing.close_if_idle(clock::now());
        self.publish(TypingUpdate {
            words: Vec::new(),
            ended: ended.into_iter().collect(),
        });
    }

    /// Close the open typing session once the queue is drained.
    fn finish(&self) {
        let ended = lock(&self.state).typing.close_session();
        self.publish(TypingUpdate {
            words: Vec::new(),
            ended: ended.into_iter().collect(),
        });
    }

    fn publish(&self, update: TypingUpdate) {
        for len in update.words {
            self.on_word.invoke(&len);
        }
        for summary in update.ended {
            debug!(
                words = summary.words,
                wpm = summary.wpm,
                "typing session closed"
            );
            self.on_session_end.invoke(&summary);
        }
    }
}

/// Global keyboard capture.
pub struct KeyboardCapture {
    config: KeyboardConfig,
    hook: Box<dyn InputHook>,
    sink: Arc<KeyboardSink>,
    shared: Arc<KeyboardShared>,
    capturing: Arc<AtomicBool>,
    worker: Option<Worker>,
}

impl KeyboardCapture {
    pub fn new(config: KeyboardConfig, hook: Box<dyn InputHook>) -> Self {
        let state = KeyboardState {
            recent: VecDeque::with_capacity(config.max_events.min(1024)),
            max_events: config.max_events.max(1),
            total_keystrokes: 0,
            clock: SessionClock::default(),
            typing: TypingTracker::new(config.typing_session_timeout),
            track_typing: config.track_typing,
        };

        Self {
            config,
            hook,
            sink: Arc::new(KeyboardSink::new()),
            shared: Arc::new(KeyboardShared {
                state: Mutex::new(state),
                filter: Mutex::new(None),
                on_press: CallbackList::new("on_key_press"),
                on_release: CallbackList::new("on_key_release"),
                on_word: CallbackList::new("on_word_completed"),
                on_session_end: CallbackList::new("on_typing_session_end"),
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
            warn!("keyboard capture already running");
            return Ok(());
        }

        let (sender, receiver) = bounded(self.config.queue_capacity.max(1));
        self.sink.attach(sender);
        self.capturing.store(true, Ordering::SeqCst);

        if let Err(e) = self.hook.install(self.sink.clone()) {
            self.sink.detach();
            self.capturing.store(false, Ordering::SeqCst);
            warn!(error = %e, "keyboard hook unavailable");
            return Err(e);
        }

        lock(&self.shared.state).clock.begin();

        let shared = self.shared.clone();
        let running = self.capturing.clone();
        let worker = Worker::spawn("keyboard-capture", move || {
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
                info!("keyboard capture started");
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
            info!("keyboard capture stopped");
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    /// Install the filter applied to every event before anything else.
    pub fn set_filter(&self, filter: Arc<dyn EventFilter>) {
        *lock(&self.shared.filter) = Some(filter);
    }

    pub fn on_key_press(&self, callback: Callback<KeyEvent>) {
        self.shared.on_press.push(callback);
    }

    pub fn on_key_release(&self, callback: Callback<KeyEvent>) {
        self.shared.on_release.push(callback);
    }

    /// Called with the length of each completed word.
    pub fn on_word_completed(&self, callback: Callback<usize>) {
        self.shared.on_word.push(callback);
    }

    pub fn on_typing_session_end(&self, callback: Callback<TypingSessionSummary>) {
        self.shared.on_session_end.push(callback);
    }

    /// The most recent `n` events, oldest first.
    pub fn get_recent_events(&self, n: usize) -> Vec<KeyEvent> {
        let state = lock(&self.shared.state);
        let skip = state.recent.len().saturating_sub(n);
        state.recent.iter().skip(skip).cloned().collect()
    }

    pub fn statistics(&self) -> KeyboardStatistics {
        let state = lock(&self.shared.state);
        KeyboardStatistics {
            total_keystrokes: state.total_keystrokes,
            keys_per_minute: state.clock.per_minute(state.total_keystrokes),
            session_duration_secs: state.clock.duration_secs(),
            words_typed: state.typing.words_typed,
            typing_sessions: state.typing.completed_sessions,
            average_session_wpm: state.typing.average_wpm(),
            events_buffered: state.recent.len(),
            dropped_events: self.sink.dropped.load(Ordering::Relaxed),
            is_capturing: self.is_capturing(),
        }
    }

    /// Forget buffered events and counters.
    pub fn clear(&self) {
        let mut state = lock(&self.shared.state);
        state.recent.clear();
        state.total_keystrokes = 0;
        state.typing = TypingTracker::new(self.config.typing_session_timeout);
    }
}

impl Drop for KeyboardCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
