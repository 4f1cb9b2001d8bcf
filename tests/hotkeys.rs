//! Hotkey behavior through the capture pipeline.

use input_insight_agent::collector::{HookTarget, SyntheticInput};
use input_insight_agent::{
    CaptureOrchestrator, HotkeyError, HotkeyKind, HotkeySpec, HotkeyTrigger, OrchestratorConfig,
};
use std::sync::{Arc, Mutex};

type Fired = Arc<Mutex<Vec<String>>>;

fn orchestrator() -> (CaptureOrchestrator, SyntheticInput, Fired) {
    let input = SyntheticInput::new();
    let orchestrator = CaptureOrchestrator::new(
        OrchestratorConfig::default(),
        Box::new(input.hook(HookTarget::Keyboard)),
        Box::new(input.hook(HookTarget::Pointer)),
    )
    .unwrap();
    let fired: Fired = Arc::new(Mutex::new(Vec::new()));
    let f = fired.clone();
    orchestrator.on_hotkey_triggered(Arc::new(move |t: &HotkeyTrigger| {
        f.lock().unwrap().push(t.name.clone());
    }));
    (orchestrator, input, fired)
}

fn noop(_: &HotkeyTrigger) {}

#[test]
fn test_sequence_fires_within_timeout() {
    let (mut orchestrator, input, fired) = orchestrator();
    orchestrator
        .register_hotkey_fn(HotkeySpec::sequence("comment", "ctrl+k, ctrl+c"), noop)
        .unwrap();
    orchestrator.start().unwrap();

    input.chord(&["ctrl", "k"], 1.0);
    input.chord(&["ctrl", "c"], 1.8);
    orchestrator.stop();

    assert_eq!(*fired.lock().unwrap(), vec!["comment"]);
    let info = orchestrator.hotkeys().get("comment").unwrap();
    assert_eq!(info.usage_count, 1);
    assert_eq!(info.record.kind, HotkeyKind::Sequence);
}

#[test]
fn test_sequence_expires_after_timeout() {
    let (mut orchestrator, input, fired) = orchestrator();
    orchestrator
        .register_hotkey_fn(HotkeySpec::sequence("comment", "ctrl+k, ctrl+c"), noop)
        .unwrap();
    orchestrator.start().unwrap();

    input.chord(&["ctrl", "k"], 1.0);
    input.chord(&["ctrl", "c"], 3.5);
    // A fresh attempt after the expired one still works
    input.chord(&["ctrl", "k"], 5.0);
    input.chord(&["ctrl", "c"], 5.5);
    orchestrator.stop();

    assert_eq!(*fired.lock().unwrap(), vec!["comment"]);
}

#[test]
fn test_stop_discards_partial_sequence() {
    let (mut orchestrator, input, fired) = orchestrator();
    orchestrator
        .register_hotkey_fn(HotkeySpec::sequence("comment", "ctrl+k, ctrl+c"), noop)
        .unwrap();
    orchestrator.start().unwrap();
    input.chord(&["ctrl", "k"], 1.0);
    orchestrator.stop();

    orchestrator.start().unwrap();
    input.chord(&["ctrl", "c"], 1.2);
    orchestrator.stop();

    assert!(fired.lock().unwrap().is_empty());
}

#[test]
fn test_conflicting_registration_rejected() {
    let (orchestrator, _input, _fired) = orchestrator();
    orchestrator
        .register_hotkey_fn(HotkeySpec::new("save", "ctrl+s"), noop)
        .unwrap();

    let err = orchestrator
        .register_hotkey_fn(HotkeySpec::new("store", "S+Control"), noop)
        .unwrap_err();
    match err {
        HotkeyError::Conflict { name, existing, .. } => {
            assert_eq!(name, "store");
            assert_eq!(existing, "save");
        }
        other => panic!("expected conflict, got {other}"),
    }

    // Global bindings overlap every context
    assert!(orchestrator
        .register_hotkey_fn(HotkeySpec::contextual("editor-save", "ctrl+s", "editor"), noop)
        .is_err());
    // Distinct non-global contexts do not overlap
    orchestrator
        .register_hotkey_fn(HotkeySpec::contextual("run", "f5", "editor"), noop)
        .unwrap();
    orchestrator
        .register_hotkey_fn(HotkeySpec::contextual("refresh", "f5", "browser"), noop)
        .unwrap();
    assert_eq!(orchestrator.get_statistics().registered_hotkeys, 3);
}

#[test]
fn test_contextual_binding_follows_context_stack() {
    let (mut orchestrator, input, fired) = orchestrator();
    orchestrator
        .register_hotkey_fn(HotkeySpec::contextual("run", "f5", "editor"), noop)
        .unwrap();
    orchestrator.start().unwrap();

    // Stopping drains the queue, so each phase sees the context set before it
    input.tap("f5", 1.0);
    orchestrator.stop();

    orchestrator.hotkeys().push_context("editor");
    orchestrator.start().unwrap();
    input.tap("f5", 2.0);
    orchestrator.stop();

    assert_eq!(orchestrator.hotkeys().pop_context().as_deref(), Some("editor"));
    orchestrator.start().unwrap();
    input.tap("f5", 3.0);
    orchestrator.stop();

    assert_eq!(*fired.lock().unwrap(), vec!["run"]);
    assert_eq!(orchestrator.hotkeys().current_context(), "global");
    assert_eq!(orchestrator.hotkeys().pop_context(), None);
}

#[test]
fn test_disabled_binding_does_not_fire() {
    let (mut orchestrator, input, fired) = orchestrator();
    orchestrator
        .register_hotkey_fn(HotkeySpec::new("save", "ctrl+s"), noop)
        .unwrap();
    assert!(orchestrator.hotkeys().disable("save"));
    orchestrator.start().unwrap();
    input.chord(&["ctrl", "s"], 1.0);
    orchestrator.stop();

    orchestrator.hotkeys().enable("save").unwrap();
    orchestrator.start().unwrap();
    input.chord(&["ctrl", "s"], 2.0);
    orchestrator.stop();

    assert_eq!(*fired.lock().unwrap(), vec!["save"]);
}

#[test]
fn test_panicking_action_keeps_pipeline_running() {
    let (mut orchestrator, input, fired) = orchestrator();
    orchestrator
        .register_hotkey_fn(HotkeySpec::new("boom", "ctrl+b"), |_: &HotkeyTrigger| {
            panic!("action failure")
        })
        .unwrap();
    orchestrator.start().unwrap();
    input.chord(&["ctrl", "b"], 1.0);
    input.tap("a", 1.5);
    orchestrator.stop();

    assert_eq!(*fired.lock().unwrap(), vec!["boom"]);
    assert_eq!(orchestrator.get_statistics().total_keystrokes, 3);
}

#[test]
fn test_key_held_across_restart_does_not_block_chord() {
    let (mut orchestrator, input, fired) = orchestrator();
    orchestrator
        .register_hotkey_fn(HotkeySpec::chord("save", "ctrl+s"), noop)
        .unwrap();
    orchestrator.start().unwrap();
    input.key_down("a", 1.0);
    orchestrator.stop();

    orchestrator.start().unwrap();
    input.chord(&["ctrl", "s"], 1.5);
    orchestrator.stop();

    assert_eq!(*fired.lock().unwrap(), vec!["save"]);
}

#[test]
fn test_release_in_blocked_application_does_not_block_chord() {
    let (mut orchestrator, input, fired) = orchestrator();
    orchestrator
        .register_hotkey_fn(HotkeySpec::chord("save", "ctrl+s"), noop)
        .unwrap();
    orchestrator.privacy().set_current_application("Terminal");
    orchestrator.start().unwrap();

    input.key_down("a", 1.0);
    orchestrator.privacy().set_current_application("Bitwarden");
    input.key_up("a", 1.1);
    orchestrator.privacy().set_current_application("Terminal");
    input.chord(&["ctrl", "s"], 1.2);
    orchestrator.stop();

    assert_eq!(*fired.lock().unwrap(), vec!["save"]);
}

#[test]
fn test_builtin_toggle_context_hotkey() {
    let (mut orchestrator, input, fired) = orchestrator();
    orchestrator.register_builtin_hotkeys().unwrap();
    orchestrator.start().unwrap();
    input.chord(&["ctrl", "shift", "c"], 1.0);
    orchestrator.stop();

    assert_eq!(*fired.lock().unwrap(), vec!["toggle_context"]);
    assert_eq!(orchestrator.hotkeys().current_context(), "application");
}
