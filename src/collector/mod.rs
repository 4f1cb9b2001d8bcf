//! Global keyboard and pointer capture.
//!
//! Platform hooks deliver raw input on their own OS thread; the keyboard and
//! pointer services normalize it, queue it without blocking, and dispatch it
//! from a dedicated consumer thread.

pub mod hook;
pub mod keyboard;
pub mod pointer;
pub mod synthetic;
pub mod types;
pub(crate) mod worker;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub mod noop;

pub use hook::{CaptureError, HookTarget, InputHook, RawInputSink};
pub use keyboard::{KeyboardCapture, KeyboardConfig, KeyboardStatistics, TypingSessionSummary};
pub use pointer::{
    ClickPattern, HeatmapCell, PointerCapture, PointerConfig, PointerStatistics,
    ScrollSessionSummary,
};
pub use synthetic::{SyntheticHook, SyntheticInput};
pub use types::{
    InputEvent, KeyEvent, KeyEventKind, Modifier, Point, PointerButton, PointerEvent,
    PointerEventKind, RawInput, ScrollDelta, ScrollDirection,
};
pub use worker::{Callback, EventFilter, STOP_TIMEOUT};

#[cfg(target_os = "macos")]
pub use macos::check_permission;

/// Platform-specific hook type alias
#[cfg(target_os = "macos")]
pub type PlatformHook = macos::MacOSHook;

#[cfg(target_os = "windows")]
pub use windows::check_permission;

/// Platform-specific hook type alias
#[cfg(target_os = "windows")]
pub type PlatformHook = windows::WindowsHook;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub use noop::check_permission;

/// Platform-specific hook type alias
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub type PlatformHook = noop::NoopHook;
