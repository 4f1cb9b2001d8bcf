//! Privacy policy enforcement across the capture pipeline.

use input_insight_agent::collector::{HookTarget, InputEvent, PointerButton, SyntheticInput};
use input_insight_agent::{
    CaptureOrchestrator, HotkeySpec, HotkeyTrigger, OrchestratorConfig, PatternType,
    PrivacyConfig, PrivacyLevel,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn orchestrator(privacy: PrivacyConfig) -> (CaptureOrchestrator, SyntheticInput) {
    let input = SyntheticInput::new();
    let config = OrchestratorConfig {
        privacy,
        ..OrchestratorConfig::default()
    };
    let orchestrator = CaptureOrchestrator::new(
        config,
        Box::new(input.hook(HookTarget::Keyboard)),
        Box::new(input.hook(HookTarget::Pointer)),
    )
    .unwrap();
    (orchestrator, input)
}

fn counter(orchestrator: &CaptureOrchestrator) -> Arc<AtomicUsize> {
    let seen = Arc::new(AtomicUsize::new(0));
    let s = seen.clone();
    orchestrator.on_key_press(Arc::new(move |_| {
        s.fetch_add(1, Ordering::SeqCst);
    }));
    let s = seen.clone();
    orchestrator.on_pointer_click(Arc::new(move |_| {
        s.fetch_add(1, Ordering::SeqCst);
    }));
    seen
}

#[test]
fn test_disabled_level_delivers_nothing() {
    let (mut orchestrator, input) = orchestrator(PrivacyConfig::with_level(PrivacyLevel::Disabled));
    let seen = counter(&orchestrator);
    orchestrator.start().unwrap();
    for i in 0..5 {
        input.tap("a", i as f64 * 0.2);
        input.click(PointerButton::Left, 10.0, 10.0, i as f64 * 0.2 + 0.1);
    }
    orchestrator.stop();

    assert_eq!(seen.load(Ordering::SeqCst), 0);
    let stats = orchestrator.get_statistics();
    assert_eq!(stats.total_keystrokes, 0);
    assert_eq!(stats.total_clicks, 0);
    assert!(orchestrator.patterns().is_empty());
    assert!(orchestrator.get_recent_events(10).is_empty());

    let transparency = orchestrator.transparency().stats();
    assert_eq!(transparency.keyboard_events, 10);
    assert_eq!(transparency.events_dropped_by_policy, 20);
}

#[test]
fn test_stats_only_strips_content_but_keeps_hotkeys() {
    let (mut orchestrator, input) =
        orchestrator(PrivacyConfig::with_level(PrivacyLevel::StatsOnly));
    let fired = Arc::new(AtomicUsize::new(0));
    let f = fired.clone();
    orchestrator
        .register_hotkey_fn(HotkeySpec::new("save", "ctrl+s"), move |_: &HotkeyTrigger| {
            f.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    orchestrator.start().unwrap();
    input.tap("x", 1.0);
    input.chord(&["ctrl", "s"], 1.5);
    for i in 0..5 {
        input.click(PointerButton::Left, 200.0, 200.0, 2.0 + i as f64 * 0.05);
    }
    orchestrator.stop();

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(orchestrator.get_statistics().total_keystrokes, 3);
    assert_eq!(orchestrator.get_statistics().total_clicks, 5);

    for event in orchestrator.get_recent_events(100) {
        match event {
            InputEvent::Key(key) => assert!(key.character.is_none()),
            InputEvent::Pointer(pointer) => assert!(pointer.position.is_none()),
        }
    }
    // Clicks without positions cannot form a repetition cluster
    assert_eq!(
        orchestrator.analyzer().pattern_counts()[&PatternType::RepetitiveAction],
        0
    );
}

#[test]
fn test_blocked_application_suppresses_capture() {
    let (mut orchestrator, input) = orchestrator(PrivacyConfig::default());
    let seen = counter(&orchestrator);

    orchestrator.privacy().set_current_application("1Password 8");
    assert!(!orchestrator.privacy().should_capture("1Password 8"));
    orchestrator.start().unwrap();
    input.tap("a", 1.0);
    orchestrator.stop();
    assert_eq!(seen.load(Ordering::SeqCst), 0);

    orchestrator.privacy().set_current_application("Terminal");
    orchestrator.start().unwrap();
    input.tap("a", 2.0);
    orchestrator.stop();
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn test_filtered_level_masks_characters() {
    let (mut orchestrator, input) = orchestrator(PrivacyConfig::default());
    orchestrator.start().unwrap();
    input.tap("q", 1.0);
    orchestrator.stop();

    let keys: Vec<String> = orchestrator
        .keyboard()
        .get_recent_events(10)
        .into_iter()
        .filter_map(|k| k.character)
        .collect();
    assert!(!keys.is_empty());
    assert!(keys.iter().all(|c| c == "*"));
}

#[test]
fn test_password_content_filtered() {
    let config = PrivacyConfig {
        replace_with_placeholders: false,
        ..PrivacyConfig::default()
    };
    let (orchestrator, _input) = orchestrator(config);
    let out = orchestrator.privacy().filter_content("login password: hunter2");
    assert!(!out.contains("hunter2"));
    assert!(out.starts_with("login"));
}

#[test]
fn test_invalid_custom_pattern_keeps_previous_policy() {
    let (orchestrator, _input) = orchestrator(PrivacyConfig::default());
    orchestrator
        .privacy()
        .add_custom_pattern(r"ticket-\d+")
        .unwrap();
    assert!(orchestrator.privacy().add_custom_pattern("[oops").is_err());

    let config = orchestrator.privacy().config();
    assert_eq!(config.custom_patterns, vec![r"ticket-\d+".to_string()]);
    assert!(!orchestrator
        .privacy()
        .filter_content("see ticket-42")
        .contains("42"));
}
