//! macOS global input hook using a Core Graphics event tap.
//!
//! The tap runs on its own thread with a CFRunLoop. It requires the Input
//! Monitoring permission; without it tap creation fails and `install`
//! reports [`CaptureError::HookUnavailable`].

use crate::clock;
use crate::collector::hook::{CaptureError, HookTarget, InputHook, RawInputSink};
use crate::collector::types::{PointerButton, RawInput};
use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
    CGEventType, CallbackResult, EventField,
};
use crossbeam_channel::{bounded, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

const STARTUP_TIMEOUT: Duration = Duration::from_secs(2);
const RUN_LOOP_SLICE: Duration = Duration::from_millis(100);

/// Event tap hook for one device stream.
pub struct MacOSHook {
    target: HookTarget,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MacOSHook {
    pub fn new(target: HookTarget) -> Self {
        Self {
            target,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }
}

impl InputHook for MacOSHook {
    fn target(&self) -> HookTarget {
        self.target
    }

    fn install(&mut self, sink: Arc<dyn RawInputSink>) -> Result<(), CaptureError> {
        if self.thread.is_some() {
            return Ok(());
        }

        let (ready_tx, ready_rx) = bounded(1);
        let running = self.running.clone();
        let target = self.target;
        running.store(true, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name(format!("{}-event-tap", target.as_str()))
            .spawn(move || run_event_loop(target, sink, running, ready_tx))
            .map_err(|e| CaptureError::ThreadSpawn(e.to_string()))?;

        match ready_rx.recv_timeout(STARTUP_TIMEOUT) {
            Ok(Ok(())) => {
                debug!(target = target.as_str(), "event tap installed");
                self.thread = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                self.running.store(false, Ordering::SeqCst);
                warn!(target = target.as_str(), "event tap did not report startup");
                Err(CaptureError::HookUnavailable(
                    "event tap did not start in time".to_string(),
                ))
            }
        }
    }

    fn uninstall(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            // The run loop wakes at least every RUN_LOOP_SLICE
            let _ = handle.join();
            debug!(target = self.target.as_str(), "event tap removed");
        }
    }
}

impl Drop for MacOSHook {
    fn drop(&mut self) {
        self.uninstall();
    }
}

fn event_types(target: HookTarget) -> Vec<CGEventType> {
    match target {
        HookTarget::Keyboard => vec![
            CGEventType::KeyDown,
            CGEventType::KeyUp,
            CGEventType::FlagsChanged,
        ],
        HookTarget::Pointer => vec![
            CGEventType::MouseMoved,
            CGEventType::LeftMouseDown,
            CGEventType::LeftMouseUp,
            CGEventType::RightMouseDown,
            CGEventType::RightMouseUp,
            CGEventType::OtherMouseDown,
            CGEventType::OtherMouseUp,
            CGEventType::LeftMouseDragged,
            CGEventType::RightMouseDragged,
            CGEventType::OtherMouseDragged,
            CGEventType::ScrollWheel,
        ],
    }
}

fn run_event_loop(
    target: HookTarget,
    sink: Arc<dyn RawInputSink>,
    running: Arc<AtomicBool>,
    ready: Sender<Result<(), CaptureError>>,
) {
    let callback_sink = sink.clone();
    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        event_types(target),
        move |_proxy, event_type, event| {
            if let Some(raw) = translate(event_type, event) {
                callback_sink.deliver(raw);
            }
            CallbackResult::Keep
        },
    );

    let tap = match tap {
        Ok(tap) => tap,
        Err(()) => {
            let _ = ready.send(Err(CaptureError::HookUnavailable(
                "CGEvent tap creation failed; grant Input Monitoring permission".to_string(),
            )));
            return;
        }
    };

    let source = match tap.mach_port().create_runloop_source(0) {
        Ok(source) => source,
        Err(()) => {
            let _ = ready.send(Err(CaptureError::HookUnavailable(
                "failed to create run loop source".to_string(),
            )));
            return;
        }
    };

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }
    tap.enable();
    let _ = ready.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        CFRunLoop::run_in_mode(unsafe { kCFRunLoopDefaultMode }, RUN_LOOP_SLICE, false);
    }
    drop(sink);
}

fn translate(event_type: CGEventType, event: &CGEvent) -> Option<RawInput> {
    let timestamp = clock::now();
    let location = event.location();
    let (x, y) = (location.x, location.y);

    match event_type {
        CGEventType::KeyDown | CGEventType::KeyUp => {
            let code = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
            let key = key_name(code);
            let shifted = event.get_flags().contains(CGEventFlags::CGEventFlagShift);
            let character = key_character(&key, shifted);
            if matches!(event_type, CGEventType::KeyDown) {
                Some(RawInput::KeyDown {
                    key,
                    character,
                    timestamp,
                })
            } else {
                Some(RawInput::KeyUp {
                    key,
                    character,
                    timestamp,
                })
            }
        }
        CGEventType::FlagsChanged => {
            let code = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
            let flag = modifier_flag(code)?;
            let key = key_name(code);
            if event.get_flags().contains(flag) {
                Some(RawInput::KeyDown {
                    key,
                    character: None,
                    timestamp,
                })
            } else {
                Some(RawInput::KeyUp {
                    key,
                    character: None,
                    timestamp,
                })
            }
        }
        CGEventType::MouseMoved
        | CGEventType::LeftMouseDragged
        | CGEventType::RightMouseDragged
        | CGEventType::OtherMouseDragged => Some(RawInput::PointerMoved { x, y, timestamp }),
        CGEventType::LeftMouseDown | CGEventType::LeftMouseUp => Some(RawInput::PointerButton {
            button: PointerButton::Left,
            pressed: matches!(event_type, CGEventType::LeftMouseDown),
            x,
            y,
            timestamp,
        }),
        CGEventType::RightMouseDown | CGEventType::RightMouseUp => Some(RawInput::PointerButton {
            button: PointerButton::Right,
            pressed: matches!(event_type, CGEventType::RightMouseDown),
            x,
            y,
            timestamp,
        }),
        CGEventType::OtherMouseDown | CGEventType::OtherMouseUp => {
            let number = event.get_integer_value_field(EventField::MOUSE_EVENT_BUTTON_NUMBER);
            let button = match number {
                2 => PointerButton::Middle,
                n => PointerButton::Other(n.clamp(0, u8::MAX as i64) as u8),
            };
            Some(RawInput::PointerButton {
                button,
                pressed: matches!(event_type, CGEventType::OtherMouseDown),
                x,
                y,
                timestamp,
            })
        }
        CGEventType::ScrollWheel => {
            // Core Graphics reports positive axis-1 deltas for upward scrolls
            let dy = -event.get_double_value_field(
                EventField::SCROLL_WHEEL_EVENT_POINT_DELTA_AXIS_1,
            );
            let dx = -event.get_double_value_field(
                EventField::SCROLL_WHEEL_EVENT_POINT_DELTA_AXIS_2,
            );
            Some(RawInput::PointerScrolled {
                x,
                y,
                dx,
                dy,
                timestamp,
            })
        }
        _ => None,
    }
}

fn modifier_flag(code: u16) -> Option<CGEventFlags> {
    match code {
        54 | 55 => Some(CGEventFlags::CGEventFlagCommand),
        56 | 60 => Some(CGEventFlags::CGEventFlagShift),
        58 | 61 => Some(CGEventFlags::CGEventFlagAlternate),
        59 | 62 => Some(CGEventFlags::CGEventFlagControl),
        57 => Some(CGEventFlags::CGEventFlagAlphaShift),
        _ => None,
    }
}

/// Virtual key code to key name, ANSI layout.
fn key_name(code: u16) -> String {
    let name = match code {
        0 => "a",
        1 => "s",
        2 => "d",
        3 => "f",
        4 => "h",
        5 => "g",
        6 => "z",
        7 => "x",
        8 => "c",
        9 => "v",
        11 => "b",
        12 => "q",
        13 => "w",
        14 => "e",
        15 => "r",
        16 => "y",
        17 => "t",
        18 => "1",
        19 => "2",
        20 => "3",
        21 => "4",
        22 => "6",
        23 => "5",
        24 => "=",
        25 => "9",
        26 => "7",
        27 => "-",
        28 => "8",
        29 => "0",
        30 => "]",
        31 => "o",
        32 => "u",
        33 => "[",
        34 => "i",
        35 => "p",
        36 => "enter",
        37 => "l",
        38 => "j",
        39 => "'",
        40 => "k",
        41 => ";",
        42 => "\\",
        43 => ",",
        44 => "/",
        45 => "n",
        46 => "m",
        47 => ".",
        48 => "tab",
        49 => "space",
        50 => "`",
        51 => "backspace",
        53 => "escape",
        54 => "cmd_r",
        55 => "cmd",
        56 => "shift",
        57 => "caps_lock",
        58 => "alt",
        59 => "ctrl",
        60 => "shift_r",
        61 => "alt_r",
        62 => "ctrl_r",
        96 => "f5",
        97 => "f6",
        98 => "f7",
        99 => "f3",
        100 => "f8",
        101 => "f9",
        103 => "f11",
        109 => "f10",
        111 => "f12",
        115 => "home",
        116 => "page_up",
        117 => "delete",
        118 => "f4",
        119 => "end",
        120 => "f2",
        121 => "page_down",
        122 => "f1",
        123 => "left",
        124 => "right",
        125 => "down",
        126 => "up",
        other => return format!("keycode_{other}"),
    };
    name.to_string()
}

fn key_character(key: &str, shifted: bool) -> Option<char> {
    let mut chars = key.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    if shifted {
        Some(c.to_ascii_uppercase())
    } else {
        Some(c)
    }
}

/// Probe whether an event tap can be created.
///
/// macOS has no direct query for Input Monitoring; a passive tap that fails
/// to create is the signal that permission is missing.
pub fn check_permission() -> bool {
    CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown],
        |_proxy, _type, _event| CallbackResult::Keep,
    )
    .is_ok()
}
