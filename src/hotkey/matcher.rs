//! Hotkey registry and matcher.
//!
//! Combination bindings (simple, chord, contextual) are checked against the
//! held-key set on every press; at most one fires per press. Sequence
//! bindings are matched against a rolling buffer of press tokens that
//! expires a fixed time after its first token.

use crate::collector::types::KeyEvent;
use crate::collector::worker::{Callback, CallbackList};
use crate::hotkey::action::{HotkeyAction, HotkeyTrigger, SharedAction};
use crate::hotkey::keys::{normalize_token, parse_sequence, KeyCombo, KeyToken};
use crate::hotkey::HotkeyError;
use crate::sync::lock;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Context in which bindings are always eligible.
pub const GLOBAL_CONTEXT: &str = "global";

/// Built-in binding that logs every registered hotkey.
pub const SHOW_HELP: &str = "show_help";

/// Built-in binding that switches between the global and application contexts.
pub const TOGGLE_CONTEXT: &str = "toggle_context";

/// Default time allowed from the first to the last step of a sequence.
pub const DEFAULT_SEQUENCE_TIMEOUT: Duration = Duration::from_secs(2);

/// A non-modifier key not pressed again within this many seconds is no
/// longer treated as held. Auto-repeat refreshes a key that really is down.
pub const HELD_KEY_TIMEOUT: f64 = 5.0;

/// Binding kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HotkeyKind {
    /// One combination, held keys may be a superset
    #[default]
    Simple,
    /// Ordered combinations within the sequence timeout
    Sequence,
    /// Held keys must equal the combination exactly
    Chord,
    /// A simple binding scoped to a non-global context
    Contextual,
}

impl HotkeyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HotkeyKind::Simple => "simple",
            HotkeyKind::Sequence => "sequence",
            HotkeyKind::Chord => "chord",
            HotkeyKind::Contextual => "contextual",
        }
    }
}

/// Registration request.
#[derive(Debug, Clone, PartialEq)]
pub struct HotkeySpec {
    pub name: String,
    pub keys: String,
    pub kind: HotkeyKind,
    pub context: String,
    pub priority: i32,
    pub description: String,
    pub enabled: bool,
}

impl HotkeySpec {
    /// A simple, global, enabled binding at priority 0.
    pub fn new(name: impl Into<String>, keys: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: keys.into(),
            kind: HotkeyKind::Simple,
            context: GLOBAL_CONTEXT.to_string(),
            priority: 0,
            description: String::new(),
            enabled: true,
        }
    }

    pub fn sequence(name: impl Into<String>, keys: impl Into<String>) -> Self {
        Self::new(name, keys).with_kind(HotkeyKind::Sequence)
    }

    pub fn chord(name: impl Into<String>, keys: impl Into<String>) -> Self {
        Self::new(name, keys).with_kind(HotkeyKind::Chord)
    }

    pub fn contextual(
        name: impl Into<String>,
        keys: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self::new(name, keys)
            .with_kind(HotkeyKind::Contextual)
            .with_context(context)
    }

    pub fn with_kind(mut self, kind: HotkeyKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Serializable form of a binding, without its action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeyRecord {
    pub name: String,
    pub keys: String,
    #[serde(default)]
    pub kind: HotkeyKind,
    #[serde(default = "default_context")]
    pub context: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub description: String,
}

fn default_context() -> String {
    GLOBAL_CONTEXT.to_string()
}

fn default_enabled() -> bool {
    true
}

impl From<HotkeyRecord> for HotkeySpec {
    fn from(record: HotkeyRecord) -> Self {
        Self {
            name: record.name,
            keys: record.keys,
            kind: record.kind,
            context: record.context,
            priority: record.priority,
            description: record.description,
            enabled: record.enabled,
        }
    }
}

/// A binding with its usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotkeyInfo {
    #[serde(flatten)]
    pub record: HotkeyRecord,
    /// Canonical form of the parsed keys
    pub normalized: String,
    pub usage_count: u64,
    pub last_triggered: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotkeyUsage {
    pub name: String,
    pub count: u64,
}

/// Registry summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotkeyStatistics {
    pub total_bindings: usize,
    pub enabled_bindings: usize,
    pub total_triggers: u64,
    pub bindings_by_kind: BTreeMap<String, usize>,
    /// Up to five most used bindings
    pub most_used: Vec<HotkeyUsage>,
    pub current_context: String,
    pub context_stack: Vec<String>,
}

#[derive(Debug, Clone)]
enum Pattern {
    Combo(KeyCombo),
    Sequence(Vec<KeyCombo>),
}

impl Pattern {
    fn parse(kind: HotkeyKind, keys: &str) -> Result<Self, HotkeyError> {
        match kind {
            HotkeyKind::Sequence => parse_sequence(keys).map(Pattern::Sequence),
            _ => {
                if keys.contains(',') {
                    return Err(HotkeyError::InvalidKeys {
                        keys: keys.to_string(),
                        reason: format!("',' is only valid in a sequence, not a {}", kind.as_str()),
                    });
                }
                KeyCombo::parse(keys).map(Pattern::Combo)
            }
        }
    }

    fn normalized(&self) -> String {
        match self {
            Pattern::Combo(combo) => combo.to_string(),
            Pattern::Sequence(steps) => steps
                .iter()
                .map(KeyCombo::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    fn combo(&self) -> Option<&KeyCombo> {
        match self {
            Pattern::Combo(combo) => Some(combo),
            Pattern::Sequence(_) => None,
        }
    }
}

struct Binding {
    record: HotkeyRecord,
    pattern: Pattern,
    action: SharedAction,
    order: u64,
    usage_count: u64,
    last_triggered: Option<f64>,
}

impl Binding {
    fn info(&self) -> HotkeyInfo {
        HotkeyInfo {
            record: self.record.clone(),
            normalized: self.pattern.normalized(),
            usage_count: self.usage_count,
            last_triggered: self.last_triggered,
        }
    }
}

fn contexts_overlap(a: &str, b: &str) -> bool {
    a == GLOBAL_CONTEXT || b == GLOBAL_CONTEXT || a == b
}

struct Registry {
    bindings: HashMap<String, Binding>,
    next_order: u64,
    /// Held non-modifier keys and their latest press time
    held_keys: BTreeMap<String, f64>,
    sequence: Vec<KeyCombo>,
    sequence_started: Option<f64>,
    current_context: String,
    context_stack: Vec<String>,
    total_triggers: u64,
}

impl Registry {
    fn eligible(&self, binding: &Binding) -> bool {
        let context = binding.record.context.as_str();
        binding.record.enabled
            && (context == GLOBAL_CONTEXT
                || context == self.current_context
                || self.context_stack.iter().any(|c| c == context))
    }

    /// An enabled combination binding that `name` would collide with.
    fn find_conflict(&self, name: &str, pattern: &Pattern, context: &str) -> Option<&Binding> {
        let combo = pattern.combo()?;
        self.bindings.values().find(|other| {
            other.record.name != name
                && other.record.enabled
                && other.pattern.combo() == Some(combo)
                && contexts_overlap(&other.record.context, context)
        })
    }

    fn fire(&mut self, name: &str, timestamp: f64) -> Option<(SharedAction, HotkeyTrigger)> {
        let binding = self.bindings.get_mut(name)?;
        binding.usage_count += 1;
        binding.last_triggered = Some(timestamp);
        let trigger = HotkeyTrigger {
            name: binding.record.name.clone(),
            keys: binding.record.keys.clone(),
            kind: binding.record.kind,
            context: binding.record.context.clone(),
            timestamp,
        };
        let action = binding.action.clone();
        self.total_triggers += 1;
        Some((action, trigger))
    }

    /// Best combination binding for a press. Higher priority wins, then the
    /// earlier registration.
    fn match_combo(&self, held: &KeyCombo, pressed: &KeyCombo) -> Option<String> {
        self.bindings
            .values()
            .filter(|b| self.eligible(b))
            .filter_map(|b| b.pattern.combo().map(|combo| (b, combo)))
            .filter(|(b, combo)| {
                let touches_pressed = pressed.is_subset_of(combo);
                match b.record.kind {
                    HotkeyKind::Chord => touches_pressed && *combo == held,
                    _ => touches_pressed && combo.is_subset_of(held),
                }
            })
            .max_by_key(|(b, _)| (b.record.priority, Reverse(b.order)))
            .map(|(b, _)| b.record.name.clone())
    }

    fn sequence_candidates(&self) -> (Option<String>, bool) {
        let buffer = &self.sequence;
        let mut exact: Option<&Binding> = None;
        let mut partial = false;
        for binding in self.bindings.values().filter(|b| self.eligible(b)) {
            let Pattern::Sequence(steps) = &binding.pattern else {
                continue;
            };
            if steps.as_slice() == buffer.as_slice() {
                let better = exact.map_or(true, |e| {
                    (binding.record.priority, Reverse(binding.order))
                        > (e.record.priority, Reverse(e.order))
                });
                if better {
                    exact = Some(binding);
                }
            } else if steps.len() > buffer.len() && steps.starts_with(buffer) {
                partial = true;
            }
        }
        (exact.map(|b| b.record.name.clone()), partial)
    }

    fn clear_sequence(&mut self) {
        self.sequence.clear();
        self.sequence_started = None;
    }
}

/// Thread-safe hotkey registry and matcher.
pub struct HotkeyMatcher {
    registry: Mutex<Registry>,
    sequence_timeout: f64,
    listeners: CallbackList<HotkeyTrigger>,
}

impl Default for HotkeyMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_SEQUENCE_TIMEOUT)
    }
}

impl HotkeyMatcher {
    pub fn new(sequence_timeout: Duration) -> Self {
        Self {
            registry: Mutex::new(Registry {
                bindings: HashMap::new(),
                next_order: 0,
                held_keys: BTreeMap::new(),
                sequence: Vec::new(),
                sequence_started: None,
                current_context: GLOBAL_CONTEXT.to_string(),
                context_stack: vec![GLOBAL_CONTEXT.to_string()],
                total_triggers: 0,
            }),
            sequence_timeout: sequence_timeout.as_secs_f64(),
            listeners: CallbackList::new("on_hotkey_triggered"),
        }
    }

    /// Register a binding.
    ///
    /// Fails with [`HotkeyError::Conflict`] if an enabled combination binding
    /// with the same normalized keys exists in an overlapping context.
    pub fn register(&self, spec: HotkeySpec, action: SharedAction) -> Result<(), HotkeyError> {
        let pattern = Pattern::parse(spec.kind, &spec.keys)?;
        let mut registry = lock(&self.registry);

        if registry.bindings.contains_key(&spec.name) {
            return Err(HotkeyError::DuplicateName(spec.name));
        }
        if spec.enabled {
            if let Some(existing) = registry.find_conflict(&spec.name, &pattern, &spec.context) {
                let err = HotkeyError::Conflict {
                    name: spec.name.clone(),
                    existing: existing.record.name.clone(),
                    keys: pattern.normalized(),
                };
                warn!(error = %err, "hotkey rejected");
                return Err(err);
            }
        }

        let order = registry.next_order;
        registry.next_order += 1;
        debug!(
            name = %spec.name,
            keys = %pattern.normalized(),
            kind = spec.kind.as_str(),
            context = %spec.context,
            "hotkey registered"
        );
        registry.bindings.insert(
            spec.name.clone(),
            Binding {
                record: HotkeyRecord {
                    name: spec.name,
                    keys: spec.keys,
                    kind: spec.kind,
                    context: spec.context,
                    enabled: spec.enabled,
                    priority: spec.priority,
                    description: spec.description,
                },
                pattern,
                action,
                order,
                usage_count: 0,
                last_triggered: None,
            },
        );
        Ok(())
    }

    /// Register the built-in `show_help` (`ctrl+shift+h`) and
    /// `toggle_context` (`ctrl+shift+c`) bindings.
    pub fn register_builtins(self: &Arc<Self>) -> Result<(), HotkeyError> {
        let matcher = Arc::downgrade(self);
        self.register_fn(
            HotkeySpec::new(SHOW_HELP, "ctrl+shift+h").with_description("List registered hotkeys"),
            move |_: &HotkeyTrigger| {
                let Some(matcher) = matcher.upgrade() else {
                    return;
                };
                for info in matcher.bindings(None) {
                    info!(
                        name = %info.record.name,
                        keys = %info.normalized,
                        context = %info.record.context,
                        uses = info.usage_count,
                        description = %info.record.description,
                        "hotkey"
                    );
                }
            },
        )?;

        let matcher = Arc::downgrade(self);
        self.register_fn(
            HotkeySpec::new(TOGGLE_CONTEXT, "ctrl+shift+c")
                .with_description("Switch between global and application context"),
            move |_: &HotkeyTrigger| {
                if let Some(matcher) = matcher.upgrade() {
                    let context = matcher.toggle_context();
                    info!(%context, "hotkey context switched");
                }
            },
        )
    }

    /// Register a closure as the action.
    pub fn register_fn<F>(&self, spec: HotkeySpec, action: F) -> Result<(), HotkeyError>
    where
        F: HotkeyAction + 'static,
    {
        self.register(spec, Arc::new(action))
    }

    pub fn unregister(&self, name: &str) -> bool {
        let removed = lock(&self.registry).bindings.remove(name).is_some();
        if removed {
            debug!(name, "hotkey unregistered");
        }
        removed
    }

    /// Enable a binding, re-checking for conflicts.
    pub fn enable(&self, name: &str) -> Result<(), HotkeyError> {
        let mut registry = lock(&self.registry);
        let binding = registry
            .bindings
            .get(name)
            .ok_or_else(|| HotkeyError::UnknownBinding(name.to_string()))?;
        if binding.record.enabled {
            return Ok(());
        }
        if let Some(existing) =
            registry.find_conflict(name, &binding.pattern, &binding.record.context)
        {
            return Err(HotkeyError::Conflict {
                name: name.to_string(),
                existing: existing.record.name.clone(),
                keys: binding.pattern.normalized(),
            });
        }
        if let Some(binding) = registry.bindings.get_mut(name) {
            binding.record.enabled = true;
        }
        Ok(())
    }

    pub fn disable(&self, name: &str) -> bool {
        match lock(&self.registry).bindings.get_mut(name) {
            Some(binding) => {
                binding.record.enabled = false;
                true
            }
            None => false,
        }
    }

    /// Called after every triggered action.
    pub fn on_trigger(&self, callback: Callback<HotkeyTrigger>) {
        self.listeners.push(callback);
    }

    /// Feed one key event. Returns the bindings that fired.
    pub fn process_event(&self, event: &KeyEvent) -> Vec<HotkeyTrigger> {
        let Some(token) = normalize_token(&event.key) else {
            return Vec::new();
        };
        let pressed = {
            let mut combo = KeyCombo::default();
            combo.insert(token.clone());
            combo
        };

        let mut fired = Vec::new();
        {
            let mut registry = lock(&self.registry);
            let is_modifier = pressed.is_modifier_only();

            if !event.is_press() {
                if !is_modifier {
                    for key in pressed.keys() {
                        registry.held_keys.remove(key);
                    }
                }
                return Vec::new();
            }

            let now = event.timestamp;
            registry
                .held_keys
                .retain(|_, pressed_at| now - *pressed_at <= HELD_KEY_TIMEOUT);
            if !is_modifier {
                for key in pressed.keys() {
                    registry.held_keys.insert(key.clone(), now);
                }
            }
            let mut held = KeyCombo::default();
            for modifier in &event.modifiers {
                held.insert(KeyToken::Modifier(*modifier));
            }
            held.insert(token);
            for key in registry.held_keys.keys() {
                held.insert(KeyToken::Key(key.clone()));
            }

            if let Some(name) = registry.match_combo(&held, &pressed) {
                fired.extend(registry.fire(&name, event.timestamp));
            }

            let step = KeyCombo::from_press(event);
            if !step.is_modifier_only() {
                fired.extend(self.advance_sequence(&mut registry, step, event.timestamp));
            }
        }

        self.run(fired)
    }

    /// Feed one sequence token directly.
    pub fn process_token(&self, token: &KeyCombo, timestamp: f64) -> Option<HotkeyTrigger> {
        let fired = {
            let mut registry = lock(&self.registry);
            self.advance_sequence(&mut registry, token.clone(), timestamp)
        };
        self.run(fired.into_iter().collect()).pop()
    }

    fn advance_sequence(
        &self,
        registry: &mut Registry,
        token: KeyCombo,
        timestamp: f64,
    ) -> Option<(SharedAction, HotkeyTrigger)> {
        if let Some(started) = registry.sequence_started {
            if timestamp - started > self.sequence_timeout {
                registry.clear_sequence();
            }
        }

        registry.sequence.push(token.clone());
        registry.sequence_started.get_or_insert(timestamp);

        let (exact, partial) = registry.sequence_candidates();
        if let Some(name) = exact {
            registry.clear_sequence();
            return registry.fire(&name, timestamp);
        }
        if partial {
            return None;
        }

        // No sequence continues this buffer; the token may still start one
        let retry = registry.sequence.len() > 1;
        registry.clear_sequence();
        if retry {
            registry.sequence.push(token);
            registry.sequence_started = Some(timestamp);
            let (exact, partial) = registry.sequence_candidates();
            if let Some(name) = exact {
                registry.clear_sequence();
                return registry.fire(&name, timestamp);
            }
            if !partial {
                registry.clear_sequence();
            }
        }
        None
    }

    /// Invoke actions and listeners outside the registry lock.
    fn run(&self, fired: Vec<(SharedAction, HotkeyTrigger)>) -> Vec<HotkeyTrigger> {
        fired
            .into_iter()
            .map(|(action, trigger)| {
                info!(name = %trigger.name, keys = %trigger.keys, "hotkey triggered");
                if panic::catch_unwind(AssertUnwindSafe(|| action.invoke(&trigger))).is_err() {
                    error!(name = %trigger.name, "hotkey action panicked");
                }
                self.listeners.invoke(&trigger);
                trigger
            })
            .collect()
    }

    /// Drop any partially entered sequence.
    pub fn reset_sequence(&self) {
        lock(&self.registry).clear_sequence();
    }

    /// Forget which keys are held. Call when releases may have been missed.
    pub fn reset_held_keys(&self) {
        let mut registry = lock(&self.registry);
        if !registry.held_keys.is_empty() {
            debug!(keys = registry.held_keys.len(), "held keys cleared");
            registry.held_keys.clear();
        }
    }

    pub fn set_context(&self, context: &str) {
        lock(&self.registry).current_context = context.to_string();
    }

    pub fn push_context(&self, context: &str) {
        let mut registry = lock(&self.registry);
        registry.context_stack.push(context.to_string());
        registry.current_context = context.to_string();
    }

    /// Pop the innermost context. The global root is never popped.
    pub fn pop_context(&self) -> Option<String> {
        let mut registry = lock(&self.registry);
        if registry.context_stack.len() <= 1 {
            return None;
        }
        let popped = registry.context_stack.pop();
        registry.current_context = registry
            .context_stack
            .last()
            .cloned()
            .unwrap_or_else(|| GLOBAL_CONTEXT.to_string());
        popped
    }

    /// Switch between the global and application contexts.
    pub fn toggle_context(&self) -> String {
        let mut registry = lock(&self.registry);
        registry.current_context = if registry.current_context == GLOBAL_CONTEXT {
            "application".to_string()
        } else {
            GLOBAL_CONTEXT.to_string()
        };
        registry.current_context.clone()
    }

    pub fn current_context(&self) -> String {
        lock(&self.registry).current_context.clone()
    }

    pub fn context_stack(&self) -> Vec<String> {
        lock(&self.registry).context_stack.clone()
    }

    pub fn get(&self, name: &str) -> Option<HotkeyInfo> {
        lock(&self.registry).bindings.get(name).map(Binding::info)
    }

    pub fn len(&self) -> usize {
        lock(&self.registry).bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bindings in `context` (all if `None`), most used first.
    pub fn bindings(&self, context: Option<&str>) -> Vec<HotkeyInfo> {
        let registry = lock(&self.registry);
        let mut bindings: Vec<&Binding> = registry
            .bindings
            .values()
            .filter(|b| context.map_or(true, |c| b.record.context == c))
            .collect();
        bindings.sort_by_key(|b| (Reverse(b.usage_count), b.order));
        bindings.into_iter().map(Binding::info).collect()
    }

    /// Records in registration order, for export.
    pub fn records(&self) -> Vec<HotkeyRecord> {
        let registry = lock(&self.registry);
        let mut bindings: Vec<&Binding> = registry.bindings.values().collect();
        bindings.sort_by_key(|b| b.order);
        bindings.into_iter().map(|b| b.record.clone()).collect()
    }

    pub fn statistics(&self) -> HotkeyStatistics {
        let registry = lock(&self.registry);
        let mut bindings_by_kind = BTreeMap::new();
        for binding in registry.bindings.values() {
            *bindings_by_kind
                .entry(binding.record.kind.as_str().to_string())
                .or_insert(0) += 1;
        }
        let mut used: Vec<&Binding> = registry
            .bindings
            .values()
            .filter(|b| b.usage_count > 0)
            .collect();
        used.sort_by_key(|b| (Reverse(b.usage_count), b.order));

        HotkeyStatistics {
            total_bindings: registry.bindings.len(),
            enabled_bindings: registry
                .bindings
                .values()
                .filter(|b| b.record.enabled)
                .count(),
            total_triggers: registry.total_triggers,
            bindings_by_kind,
            most_used: used
                .into_iter()
                .take(5)
                .map(|b| HotkeyUsage {
                    name: b.record.name.clone(),
                    count: b.usage_count,
                })
                .collect(),
            current_context: registry.current_context.clone(),
            context_stack: registry.context_stack.clone(),
        }
    }
}
