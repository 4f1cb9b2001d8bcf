//! Normalized input event types.
//!
//! Platform hooks produce [`RawInput`]; the capture services turn it into
//! [`KeyEvent`] and [`PointerEvent`] values that flow through the privacy
//! filter to the hotkey matcher and the analyzer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Canonical keyboard modifier. Left and right variants collapse together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Meta,
}

impl Modifier {
    /// Resolve a key name (or alias) to a modifier.
    pub fn from_key_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ctrl" | "control" | "ctrl_l" | "ctrl_r" | "lctrl" | "rctrl" | "control_l"
            | "control_r" => Some(Modifier::Ctrl),
            "alt" | "option" | "alt_l" | "alt_r" | "alt_gr" | "lalt" | "ralt" => Some(Modifier::Alt),
            "shift" | "shift_l" | "shift_r" | "lshift" | "rshift" => Some(Modifier::Shift),
            "meta" | "cmd" | "command" | "super" | "win" | "windows" | "cmd_l" | "cmd_r"
            | "meta_l" | "meta_r" | "super_l" | "super_r" => Some(Modifier::Meta),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Modifier::Ctrl => "ctrl",
            Modifier::Alt => "alt",
            Modifier::Shift => "shift",
            Modifier::Meta => "meta",
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a key went down or up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyEventKind {
    Press,
    Release,
}

/// A normalized keyboard event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Key identifier as reported by the hook (`"a"`, `"enter"`, `"ctrl_l"`)
    pub key: String,
    pub kind: KeyEventKind,
    /// Monotonic seconds, see [`crate::clock`]
    pub timestamp: f64,
    /// Modifiers held when the event was produced
    pub modifiers: BTreeSet<Modifier>,
    /// True for keys without a printable character
    pub is_special: bool,
    /// Literal character, possibly rewritten by the privacy engine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
}

impl KeyEvent {
    pub fn is_press(&self) -> bool {
        self.kind == KeyEventKind::Press
    }

    /// True if this key itself is a modifier.
    pub fn is_modifier(&self) -> bool {
        Modifier::from_key_name(&self.key).is_some()
    }
}

/// A screen position in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Pointer event classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerEventKind {
    Move,
    Click,
    Scroll,
    DragStart,
    DragEnd,
}

/// Pointer button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerButton {
    Left,
    Right,
    Middle,
    Other(u8),
}

impl PointerButton {
    pub fn name(&self) -> String {
        match self {
            PointerButton::Left => "left".to_string(),
            PointerButton::Right => "right".to_string(),
            PointerButton::Middle => "middle".to_string(),
            PointerButton::Other(n) => format!("button{n}"),
        }
    }
}

/// Scroll direction derived from a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Scroll amount reported by the hook.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollDelta {
    pub dx: f64,
    pub dy: f64,
}

impl ScrollDelta {
    /// Dominant direction of the scroll. Positive `dy` scrolls down.
    pub fn direction(&self) -> ScrollDirection {
        if self.dy.abs() > self.dx.abs() {
            if self.dy > 0.0 {
                ScrollDirection::Down
            } else {
                ScrollDirection::Up
            }
        } else if self.dx > 0.0 {
            ScrollDirection::Right
        } else {
            ScrollDirection::Left
        }
    }
}

/// A normalized pointer event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub kind: PointerEventKind,
    pub timestamp: f64,
    /// `None` when the position is suppressed for privacy
    pub position: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button: Option<PointerButton>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scroll: Option<ScrollDelta>,
    /// Pixels per second since the previous retained move
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<f64>,
}

impl PointerEvent {
    fn bare(kind: PointerEventKind, timestamp: f64, position: Option<Point>) -> Self {
        Self {
            kind,
            timestamp,
            position,
            button: None,
            pressed: None,
            scroll: None,
            velocity: None,
        }
    }

    pub fn movement(timestamp: f64, position: Option<Point>, velocity: f64) -> Self {
        Self {
            velocity: Some(velocity),
            ..Self::bare(PointerEventKind::Move, timestamp, position)
        }
    }

    pub fn click(
        timestamp: f64,
        position: Option<Point>,
        button: PointerButton,
        pressed: bool,
    ) -> Self {
        Self {
            button: Some(button),
            pressed: Some(pressed),
            ..Self::bare(PointerEventKind::Click, timestamp, position)
        }
    }

    pub fn scroll(timestamp: f64, position: Option<Point>, dx: f64, dy: f64) -> Self {
        Self {
            scroll: Some(ScrollDelta { dx, dy }),
            ..Self::bare(PointerEventKind::Scroll, timestamp, position)
        }
    }

    pub fn drag_start(timestamp: f64, position: Option<Point>) -> Self {
        Self {
            button: Some(PointerButton::Left),
            ..Self::bare(PointerEventKind::DragStart, timestamp, position)
        }
    }

    pub fn drag_end(timestamp: f64, position: Option<Point>) -> Self {
        Self {
            button: Some(PointerButton::Left),
            ..Self::bare(PointerEventKind::DragEnd, timestamp, position)
        }
    }

    /// True for a button-down click.
    pub fn is_press(&self) -> bool {
        self.kind == PointerEventKind::Click && self.pressed == Some(true)
    }
}

/// Unified event type returned by recent-event queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "device", rename_all = "lowercase")]
pub enum InputEvent {
    Key(KeyEvent),
    Pointer(PointerEvent),
}

impl InputEvent {
    pub fn timestamp(&self) -> f64 {
        match self {
            InputEvent::Key(e) => e.timestamp,
            InputEvent::Pointer(e) => e.timestamp,
        }
    }
}

/// Raw input as delivered by a platform hook, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawInput {
    KeyDown {
        key: String,
        character: Option<char>,
        timestamp: f64,
    },
    KeyUp {
        key: String,
        character: Option<char>,
        timestamp: f64,
    },
    PointerMoved {
        x: f64,
        y: f64,
        timestamp: f64,
    },
    PointerButton {
        button: PointerButton,
        pressed: bool,
        x: f64,
        y: f64,
        timestamp: f64,
    },
    PointerScrolled {
        x: f64,
        y: f64,
        dx: f64,
        dy: f64,
        timestamp: f64,
    },
}

impl RawInput {
    pub fn is_keyboard(&self) -> bool {
        matches!(self, RawInput::KeyDown { .. } | RawInput::KeyUp { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_aliases_collapse() {
        assert_eq!(Modifier::from_key_name("ctrl_l"), Some(Modifier::Ctrl));
        assert_eq!(Modifier::from_key_name("Control"), Some(Modifier::Ctrl));
        assert_eq!(Modifier::from_key_name("cmd_r"), Some(Modifier::Meta));
        assert_eq!(Modifier::from_key_name("a"), None);
    }

    #[test]
    fn test_scroll_direction() {
        assert_eq!(ScrollDelta { dx: 0.0, dy: 3.0 }.direction(), ScrollDirection::Down);
        assert_eq!(ScrollDelta { dx: 0.0, dy: -1.0 }.direction(), ScrollDirection::Up);
        assert_eq!(ScrollDelta { dx: 2.0, dy: 1.0 }.direction(), ScrollDirection::Right);
        assert_eq!(ScrollDelta { dx: -2.0, dy: 0.0 }.direction(), ScrollDirection::Left);
    }

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_input_event_serializes_with_device_tag() {
        let event = InputEvent::Pointer(PointerEvent::click(
            1.0,
            Some(Point::new(5.0, 5.0)),
            PointerButton::Left,
            true,
        ));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["device"], "pointer");
        assert_eq!(json["kind"], "click");
        assert_eq!(json["button"], "left");
    }
}
