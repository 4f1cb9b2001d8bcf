//! Windows global input hook using low-level hooks.
//!
//! `WH_KEYBOARD_LL` and `WH_MOUSE_LL` callbacks run on the thread that
//! installed them, which must pump messages. Each hook owns one such thread;
//! `uninstall` posts `WM_QUIT` to it.

use crate::clock;
use crate::collector::hook::{CaptureError, HookTarget, InputHook, RawInputSink};
use crate::collector::types::{PointerButton, RawInput};
use crossbeam_channel::bounded;
use std::cell::{Cell, RefCell};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, GetMessageW, PostThreadMessageW, SetWindowsHookExW, UnhookWindowsHookEx,
    HHOOK, KBDLLHOOKSTRUCT, MSG, MSLLHOOKSTRUCT, WH_KEYBOARD_LL, WH_MOUSE_LL, WM_KEYDOWN,
    WM_KEYUP, WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MBUTTONDOWN, WM_MBUTTONUP, WM_MOUSEHWHEEL,
    WM_MOUSEMOVE, WM_MOUSEWHEEL, WM_QUIT, WM_RBUTTONDOWN, WM_RBUTTONUP, WM_SYSKEYDOWN,
    WM_SYSKEYUP,
};

const STARTUP_TIMEOUT: Duration = Duration::from_secs(2);
const WHEEL_DELTA: f64 = 120.0;

thread_local! {
    static SINK: RefCell<Option<Arc<dyn RawInputSink>>> = const { RefCell::new(None) };
    static SHIFT_HELD: Cell<bool> = const { Cell::new(false) };
}

/// Low-level hook for one device stream.
pub struct WindowsHook {
    target: HookTarget,
    thread: Option<(JoinHandle<()>, u32)>,
}

impl WindowsHook {
    pub fn new(target: HookTarget) -> Self {
        Self {
            target,
            thread: None,
        }
    }
}

impl InputHook for WindowsHook {
    fn target(&self) -> HookTarget {
        self.target
    }

    fn install(&mut self, sink: Arc<dyn RawInputSink>) -> Result<(), CaptureError> {
        if self.thread.is_some() {
            return Ok(());
        }

        let (ready_tx, ready_rx) = bounded(1);
        let target = self.target;
        let handle = thread::Builder::new()
            .name(format!("{}-ll-hook", target.as_str()))
            .spawn(move || run_hook_loop(target, sink, ready_tx))
            .map_err(|e| CaptureError::ThreadSpawn(e.to_string()))?;

        match ready_rx.recv_timeout(STARTUP_TIMEOUT) {
            Ok(Ok(thread_id)) => {
                debug!(target = target.as_str(), "low-level hook installed");
                self.thread = Some((handle, thread_id));
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                warn!(target = target.as_str(), "hook thread did not report startup");
                Err(CaptureError::HookUnavailable(
                    "hook thread did not start in time".to_string(),
                ))
            }
        }
    }

    fn uninstall(&mut self) {
        if let Some((handle, thread_id)) = self.thread.take() {
            let posted = unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) };
            if posted.is_err() {
                warn!(target = self.target.as_str(), "failed to post WM_QUIT to hook thread");
                return;
            }
            let _ = handle.join();
            debug!(target = self.target.as_str(), "low-level hook removed");
        }
    }
}

impl Drop for WindowsHook {
    fn drop(&mut self) {
        self.uninstall();
    }
}

fn run_hook_loop(
    target: HookTarget,
    sink: Arc<dyn RawInputSink>,
    ready: crossbeam_channel::Sender<Result<u32, CaptureError>>,
) {
    SINK.with(|s| *s.borrow_mut() = Some(sink));

    let installed = unsafe {
        match target {
            HookTarget::Keyboard => {
                SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), HINSTANCE::default(), 0)
            }
            HookTarget::Pointer => {
                SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook_proc), HINSTANCE::default(), 0)
            }
        }
    };

    let hook = match installed {
        Ok(hook) => hook,
        Err(e) => {
            let _ = ready.send(Err(CaptureError::HookUnavailable(e.to_string())));
            SINK.with(|s| *s.borrow_mut() = None);
            return;
        }
    };

    let thread_id = unsafe { GetCurrentThreadId() };
    let _ = ready.send(Ok(thread_id));

    let mut msg = MSG::default();
    loop {
        // 0 is WM_QUIT, -1 is an error
        let result = unsafe { GetMessageW(&mut msg, HWND::default(), 0, 0) };
        if result.0 <= 0 {
            break;
        }
    }

    unsafe {
        let _ = UnhookWindowsHookEx(hook);
    }
    SINK.with(|s| *s.borrow_mut() = None);
}

fn deliver(raw: RawInput) {
    SINK.with(|sink| {
        if let Some(ref sink) = *sink.borrow() {
            sink.deliver(raw);
        }
    });
}

unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code >= 0 {
        let kb = &*(l_param.0 as *const KBDLLHOOKSTRUCT);
        let message = w_param.0 as u32;
        let pressed = matches!(message, WM_KEYDOWN | WM_SYSKEYDOWN);
        if pressed || matches!(message, WM_KEYUP | WM_SYSKEYUP) {
            let key = key_name(kb.vkCode);
            if key == "shift" || key == "shift_r" {
                SHIFT_HELD.with(|held| held.set(pressed));
            }
            let shifted = SHIFT_HELD.with(Cell::get);
            let character = key_character(&key, shifted);
            let timestamp = clock::now();
            deliver(if pressed {
                RawInput::KeyDown {
                    key,
                    character,
                    timestamp,
                }
            } else {
                RawInput::KeyUp {
                    key,
                    character,
                    timestamp,
                }
            });
        }
    }

    CallNextHookEx(HHOOK::default(), n_code, w_param, l_param)
}

unsafe extern "system" fn mouse_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code >= 0 {
        let ms = &*(l_param.0 as *const MSLLHOOKSTRUCT);
        let (x, y) = (ms.pt.x as f64, ms.pt.y as f64);
        let timestamp = clock::now();
        let wheel = ((ms.mouseData >> 16) & 0xFFFF) as i16 as f64 / WHEEL_DELTA;
        let button = |button, pressed| RawInput::PointerButton {
            button,
            pressed,
            x,
            y,
            timestamp,
        };

        let raw = match w_param.0 as u32 {
            WM_MOUSEMOVE => Some(RawInput::PointerMoved { x, y, timestamp }),
            WM_LBUTTONDOWN => Some(button(PointerButton::Left, true)),
            WM_LBUTTONUP => Some(button(PointerButton::Left, false)),
            WM_RBUTTONDOWN => Some(button(PointerButton::Right, true)),
            WM_RBUTTONUP => Some(button(PointerButton::Right, false)),
            WM_MBUTTONDOWN => Some(button(PointerButton::Middle, true)),
            WM_MBUTTONUP => Some(button(PointerButton::Middle, false)),
            // Positive wheel deltas scroll away from the user
            WM_MOUSEWHEEL => Some(RawInput::PointerScrolled {
                x,
                y,
                dx: 0.0,
                dy: -wheel,
                timestamp,
            }),
            WM_MOUSEHWHEEL => Some(RawInput::PointerScrolled {
                x,
                y,
                dx: wheel,
                dy: 0.0,
                timestamp,
            }),
            _ => None,
        };

        if let Some(raw) = raw {
            deliver(raw);
        }
    }

    CallNextHookEx(HHOOK::default(), n_code, w_param, l_param)
}

/// Virtual-key code to key name.
fn key_name(vk: u32) -> String {
    let name = match vk {
        0x41..=0x5A | 0x30..=0x39 => {
            return char::from_u32(vk)
                .map(|c| c.to_ascii_lowercase().to_string())
                .unwrap_or_default()
        }
        0x70..=0x7B => return format!("f{}", vk - 0x6F),
        0x08 => "backspace",
        0x09 => "tab",
        0x0D => "enter",
        0x10 | 0xA0 => "shift",
        0xA1 => "shift_r",
        0x11 | 0xA2 => "ctrl",
        0xA3 => "ctrl_r",
        0x12 | 0xA4 => "alt",
        0xA5 => "alt_r",
        0x5B => "cmd",
        0x5C => "cmd_r",
        0x14 => "caps_lock",
        0x1B => "escape",
        0x20 => "space",
        0x21 => "page_up",
        0x22 => "page_down",
        0x23 => "end",
        0x24 => "home",
        0x25 => "left",
        0x26 => "up",
        0x27 => "right",
        0x28 => "down",
        0x2E => "delete",
        0xBA => ";",
        0xBB => "=",
        0xBC => ",",
        0xBD => "-",
        0xBE => ".",
        0xBF => "/",
        0xC0 => "`",
        0xDB => "[",
        0xDC => "\\",
        0xDD => "]",
        0xDE => "'",
        other => return format!("vk_{other}"),
    };
    name.to_string()
}

fn key_character(key: &str, shifted: bool) -> Option<char> {
    let mut chars = key.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    Some(if shifted { c.to_ascii_uppercase() } else { c })
}

/// Probe whether a low-level keyboard hook can be installed.
pub fn check_permission() -> bool {
    unsafe {
        match SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), HINSTANCE::default(), 0)
        {
            Ok(hook) => {
                let _ = UnhookWindowsHookEx(hook);
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names() {
        assert_eq!(key_name(0x41), "a");
        assert_eq!(key_name(0x35), "5");
        assert_eq!(key_name(0x70), "f1");
        assert_eq!(key_name(0x7B), "f12");
        assert_eq!(key_name(0xA2), "ctrl");
    }

    #[test]
    fn test_key_character() {
        assert_eq!(key_character("a", true), Some('A'));
        assert_eq!(key_character("enter", false), None);
    }
}
