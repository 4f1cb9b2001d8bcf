//! Consumer-thread machinery shared by the keyboard and pointer services.

use crate::collector::hook::CaptureError;
use crate::collector::types::{KeyEvent, PointerEvent};
use crate::sync::lock;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Default capacity of the bounded event queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// How long the consumer blocks before re-checking the shutdown flag.
pub const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Upper bound on how long `stop()` waits for a consumer thread.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Filter applied to every event before anything else observes it.
pub trait EventFilter: Send + Sync {
    fn filter_key(&self, event: KeyEvent) -> Option<KeyEvent>;
    fn filter_pointer(&self, event: PointerEvent) -> Option<PointerEvent>;
}

/// A registered event callback.
pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Ordered list of callbacks for one event kind.
pub(crate) struct CallbackList<T> {
    label: &'static str,
    callbacks: Mutex<Vec<Callback<T>>>,
}

impl<T> CallbackList<T> {
    pub(crate) fn new(label: &'static str) -> Self {
        Self {
            label,
            callbacks: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn push(&self, callback: Callback<T>) {
        lock(&self.callbacks).push(callback);
    }

    /// Invoke every callback in registration order.
    ///
    /// The list is cloned first so callbacks may register further callbacks.
    /// A panicking callback is logged and the remaining ones still run.
    pub(crate) fn invoke(&self, value: &T) {
        let callbacks = lock(&self.callbacks).clone();
        for callback in callbacks {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(value))).is_err() {
                error!(callback = self.label, "event callback panicked");
            }
        }
    }
}

/// Tracks when a capture session started and stopped.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SessionClock {
    started: Option<Instant>,
    stopped: Option<Instant>,
}

impl SessionClock {
    pub(crate) fn begin(&mut self) {
        self.started = Some(Instant::now());
        self.stopped = None;
    }

    pub(crate) fn end(&mut self) {
        if self.started.is_some() && self.stopped.is_none() {
            self.stopped = Some(Instant::now());
        }
    }

    pub(crate) fn duration_secs(&self) -> f64 {
        match (self.started, self.stopped) {
            (Some(start), Some(stop)) => (stop - start).as_secs_f64(),
            (Some(start), None) => start.elapsed().as_secs_f64(),
            _ => 0.0,
        }
    }

    /// Events per minute over the session so far.
    pub(crate) fn per_minute(&self, count: u64) -> f64 {
        let secs = self.duration_secs();
        if secs > 0.0 {
            count as f64 / secs * 60.0
        } else {
            0.0
        }
    }
}

/// Drain `receiver` until shutdown, isolating each event.
///
/// Exits once `running` is false and the queue has been idle for one
/// timeout, or once every sender is gone and the queue is empty.
pub(crate) fn run_consumer<E>(
    receiver: &Receiver<E>,
    running: &AtomicBool,
    mut on_event: impl FnMut(E),
    mut on_idle: impl FnMut(),
) {
    loop {
        match receiver.recv_timeout(RECV_TIMEOUT) {
            Ok(event) => {
                if panic::catch_unwind(AssertUnwindSafe(|| on_event(event))).is_err() {
                    error!("event dispatch panicked; continuing with next event");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if panic::catch_unwind(AssertUnwindSafe(&mut on_idle)).is_err() {
                    error!("idle housekeeping panicked");
                }
                if !running.load(Ordering::SeqCst) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// A named consumer thread with a bounded join.
pub(crate) struct Worker {
    name: String,
    handle: JoinHandle<()>,
    done: Receiver<()>,
}

impl Worker {
    pub(crate) fn spawn<F>(name: &str, body: F) -> Result<Self, CaptureError>
    where
        F: FnOnce() + Send + 'static,
    {
        let (done_tx, done_rx) = bounded(1);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                body();
                let _ = done_tx.send(());
            })
            .map_err(|e| CaptureError::ThreadSpawn(e.to_string()))?;

        debug!(thread = name, "consumer thread spawned");
        Ok(Self {
            name: name.to_string(),
            handle,
            done: done_rx,
        })
    }

    /// Wait up to `timeout` for the thread to finish.
    ///
    /// Returns false if the thread did not finish in time; it is then
    /// detached and left to exit on its own.
    pub(crate) fn join(self, timeout: Duration) -> bool {
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.handle.join().is_err() {
                    warn!(thread = %self.name, "consumer thread panicked");
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    thread = %self.name,
                    timeout_ms = timeout.as_millis() as u64,
                    "consumer thread did not stop in time; detaching"
                );
                false
            }
        }
    }
}
