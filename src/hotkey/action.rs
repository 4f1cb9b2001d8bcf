//! Hotkey actions and the name-to-action map used on import.

use crate::hotkey::matcher::HotkeyKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Details passed to an action when its binding fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotkeyTrigger {
    pub name: String,
    pub keys: String,
    pub kind: HotkeyKind,
    pub context: String,
    pub timestamp: f64,
}

/// Something a hotkey can run.
pub trait HotkeyAction: Send + Sync {
    fn invoke(&self, trigger: &HotkeyTrigger);
}

impl<F> HotkeyAction for F
where
    F: Fn(&HotkeyTrigger) + Send + Sync,
{
    fn invoke(&self, trigger: &HotkeyTrigger) {
        self(trigger)
    }
}

pub type SharedAction = Arc<dyn HotkeyAction>;

/// Actions by binding name. Import re-binds hotkeys through this map and
/// never creates actions itself.
#[derive(Clone, Default)]
pub struct ActionMap {
    actions: HashMap<String, SharedAction>,
}

impl ActionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, action: SharedAction) {
        self.actions.insert(name.into(), action);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, action: impl HotkeyAction + 'static) -> Self {
        self.insert(name, Arc::new(action));
        self
    }

    pub fn get(&self, name: &str) -> Option<SharedAction> {
        self.actions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl fmt::Debug for ActionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.actions.keys().collect();
        names.sort();
        f.debug_struct("ActionMap").field("actions", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_closure_actions() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let map = ActionMap::new().with("save", move |_: &HotkeyTrigger| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        let trigger = HotkeyTrigger {
            name: "save".into(),
            keys: "ctrl+s".into(),
            kind: HotkeyKind::Simple,
            context: "global".into(),
            timestamp: 0.0,
        };
        map.get("save").unwrap().invoke(&trigger);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(map.get("open").is_none());
    }
}
