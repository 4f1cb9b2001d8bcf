//! Platform hook abstraction.
//!
//! A hook is an explicit-lifecycle owned resource: it is installed with a
//! sink, delivers [`RawInput`] from its own OS callback thread, and is
//! uninstalled on stop. The sink must never block the callback thread.

use crate::collector::types::RawInput;
use std::sync::Arc;

/// Which device stream a hook observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookTarget {
    Keyboard,
    Pointer,
}

impl HookTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            HookTarget::Keyboard => "keyboard",
            HookTarget::Pointer => "pointer",
        }
    }
}

/// Receiver of raw input on the OS callback thread.
pub trait RawInputSink: Send + Sync {
    fn deliver(&self, input: RawInput);
}

/// A global input hook.
pub trait InputHook: Send {
    /// The device stream this hook observes.
    fn target(&self) -> HookTarget;

    /// Attach to the platform and start delivering input to `sink`.
    ///
    /// Returns [`CaptureError::HookUnavailable`] when the platform refuses
    /// the hook. Must not panic.
    fn install(&mut self, sink: Arc<dyn RawInputSink>) -> Result<(), CaptureError>;

    /// Detach from the platform. Idempotent.
    fn uninstall(&mut self);
}

/// Errors that can occur while starting capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The platform denied or lacks a global input hook
    HookUnavailable(String),
    /// The consumer thread could not be spawned
    ThreadSpawn(String),
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::HookUnavailable(reason) => {
                write!(f, "Global input hook unavailable: {reason}")
            }
            CaptureError::ThreadSpawn(reason) => {
                write!(f, "Failed to spawn capture thread: {reason}")
            }
        }
    }
}

impl std::error::Error for CaptureError {}
