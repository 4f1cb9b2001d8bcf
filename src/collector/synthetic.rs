//! In-process hook driven by injected input.
//!
//! A [`SyntheticInput`] hands out keyboard and pointer hooks that share its
//! state. Injected input is delivered on the calling thread, which plays the
//! role of the OS callback thread. Timestamps are explicit so sequence
//! timeouts and rhythm detection are deterministic.

use crate::collector::hook::{CaptureError, HookTarget, InputHook, RawInputSink};
use crate::collector::types::{PointerButton, RawInput};
use crate::sync::lock;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Slots {
    keyboard: Mutex<Option<Arc<dyn RawInputSink>>>,
    pointer: Mutex<Option<Arc<dyn RawInputSink>>>,
}

impl Slots {
    fn slot(&self, target: HookTarget) -> &Mutex<Option<Arc<dyn RawInputSink>>> {
        match target {
            HookTarget::Keyboard => &self.keyboard,
            HookTarget::Pointer => &self.pointer,
        }
    }
}

/// Injector for synthetic raw input.
#[derive(Clone, Default)]
pub struct SyntheticInput {
    slots: Arc<Slots>,
}

impl SyntheticInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// A hook for `target` fed by this injector.
    pub fn hook(&self, target: HookTarget) -> SyntheticHook {
        SyntheticHook {
            target,
            slots: Some(self.slots.clone()),
        }
    }

    /// True if a hook for `target` is currently installed.
    pub fn is_attached(&self, target: HookTarget) -> bool {
        lock(self.slots.slot(target)).is_some()
    }

    /// Deliver raw input. Returns false if no hook is installed for it.
    pub fn send(&self, input: RawInput) -> bool {
        let target = if input.is_keyboard() {
            HookTarget::Keyboard
        } else {
            HookTarget::Pointer
        };
        let sink = lock(self.slots.slot(target)).clone();
        match sink {
            Some(sink) => {
                sink.deliver(input);
                true
            }
            None => false,
        }
    }

    pub fn key_down(&self, key: &str, timestamp: f64) -> bool {
        self.send(RawInput::KeyDown {
            key: key.to_string(),
            character: single_char(key),
            timestamp,
        })
    }

    pub fn key_up(&self, key: &str, timestamp: f64) -> bool {
        self.send(RawInput::KeyUp {
            key: key.to_string(),
            character: single_char(key),
            timestamp,
        })
    }

    /// Press and release `key`, the release 10 ms after the press.
    pub fn tap(&self, key: &str, timestamp: f64) -> bool {
        self.key_down(key, timestamp) && self.key_up(key, timestamp + 0.01)
    }

    /// Press every key of `combo` in order, then release them in reverse.
    pub fn chord(&self, combo: &[&str], timestamp: f64) -> bool {
        let mut ok = true;
        for key in combo {
            ok &= self.key_down(key, timestamp);
        }
        for key in combo.iter().rev() {
            ok &= self.key_up(key, timestamp + 0.01);
        }
        ok
    }

    pub fn move_to(&self, x: f64, y: f64, timestamp: f64) -> bool {
        self.send(RawInput::PointerMoved { x, y, timestamp })
    }

    pub fn button(&self, button: PointerButton, pressed: bool, x: f64, y: f64, timestamp: f64) -> bool {
        self.send(RawInput::PointerButton {
            button,
            pressed,
            x,
            y,
            timestamp,
        })
    }

    /// Press and release `button` at one position.
    pub fn click(&self, button: PointerButton, x: f64, y: f64, timestamp: f64) -> bool {
        self.button(button, true, x, y, timestamp) && self.button(button, false, x, y, timestamp + 0.01)
    }

    pub fn scroll(&self, x: f64, y: f64, dx: f64, dy: f64, timestamp: f64) -> bool {
        self.send(RawInput::PointerScrolled {
            x,
            y,
            dx,
            dy,
            timestamp,
        })
    }
}

fn single_char(key: &str) -> Option<char> {
    let mut chars = key.chars();
    let c = chars.next()?;
    chars.next().is_none().then_some(c)
}

/// A hook backed by a [`SyntheticInput`], or one that always refuses.
pub struct SyntheticHook {
    target: HookTarget,
    slots: Option<Arc<Slots>>,
}

impl SyntheticHook {
    /// A hook that fails to install, as a platform without permission would.
    pub fn denied(target: HookTarget) -> Self {
        Self {
            target,
            slots: None,
        }
    }
}

impl InputHook for SyntheticHook {
    fn target(&self) -> HookTarget {
        self.target
    }

    fn install(&mut self, sink: Arc<dyn RawInputSink>) -> Result<(), CaptureError> {
        match &self.slots {
            Some(slots) => {
                *lock(slots.slot(self.target)) = Some(sink);
                Ok(())
            }
            None => Err(CaptureError::HookUnavailable(
                "input monitoring permission denied".to_string(),
            )),
        }
    }

    fn uninstall(&mut self) {
        if let Some(slots) = &self.slots {
            lock(slots.slot(self.target)).take();
        }
    }
}
