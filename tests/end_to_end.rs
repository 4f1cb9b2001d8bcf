//! Full pipeline tests: synthetic hooks through privacy, hotkeys and analysis.

use input_insight_agent::collector::{HookTarget, PointerButton, SyntheticInput};
use input_insight_agent::{
    CaptureOrchestrator, HotkeySpec, HotkeyTrigger, OrchestratorConfig, Pattern, PatternType,
};
use std::sync::{Arc, Mutex};

fn orchestrator(config: OrchestratorConfig) -> (CaptureOrchestrator, SyntheticInput) {
    let input = SyntheticInput::new();
    let orchestrator = CaptureOrchestrator::new(
        config,
        Box::new(input.hook(HookTarget::Keyboard)),
        Box::new(input.hook(HookTarget::Pointer)),
    )
    .unwrap();
    (orchestrator, input)
}

#[test]
fn test_steady_typing_counts_and_rhythm() {
    let (mut orchestrator, input) = orchestrator(OrchestratorConfig::default());
    orchestrator.start().unwrap();

    for i in 0..25 {
        assert!(input.tap("e", 10.0 + i as f64 * 0.1));
    }
    orchestrator.stop();

    let stats = orchestrator.get_statistics();
    assert_eq!(stats.total_keystrokes, 25);
    assert!(!stats.is_capturing);

    let rhythm: Vec<Pattern> = orchestrator
        .patterns()
        .into_iter()
        .filter(|p| p.pattern_type == PatternType::TypingRhythm)
        .collect();
    assert!(!rhythm.is_empty());
    assert!(rhythm[0].confidence > 0.0 && rhythm[0].confidence <= 1.0);

    let insights = orchestrator.analyzer().productivity_insights(13.0);
    assert!(insights.typing_efficiency.wpm > 0.0);
}

#[test]
fn test_repeated_clicks_reported_once() {
    let (mut orchestrator, input) = orchestrator(OrchestratorConfig::default());
    orchestrator.start().unwrap();

    let offsets = [(0.0, 0.0), (5.0, -5.0), (-5.0, 5.0), (3.0, 3.0), (-4.0, -2.0)];
    for (i, (dx, dy)) in offsets.iter().enumerate() {
        input.click(PointerButton::Left, 400.0 + dx, 300.0 + dy, 50.0 + i as f64 * 0.06);
    }
    orchestrator.stop();

    let repetitive: Vec<Pattern> = orchestrator
        .patterns()
        .into_iter()
        .filter(|p| p.pattern_type == PatternType::RepetitiveAction)
        .collect();
    assert_eq!(repetitive.len(), 1);
    match &repetitive[0].data {
        input_insight_agent::analysis::PatternData::RepetitiveClicking { click_count, .. } => {
            assert_eq!(*click_count, 5)
        }
        other => panic!("unexpected data: {other:?}"),
    }
    assert_eq!(orchestrator.get_statistics().total_clicks, 5);
}

#[test]
fn test_hotkey_and_pattern_callbacks() {
    let (mut orchestrator, input) = orchestrator(OrchestratorConfig::default());
    let fired = Arc::new(Mutex::new(Vec::new()));
    let f = fired.clone();
    orchestrator
        .register_hotkey_fn(HotkeySpec::new("save", "ctrl+s"), move |t: &HotkeyTrigger| {
            f.lock().unwrap().push(t.name.clone());
        })
        .unwrap();

    let observed = Arc::new(Mutex::new(Vec::new()));
    let o = observed.clone();
    orchestrator.on_pattern_detected(Arc::new(move |p: &Pattern| {
        o.lock().unwrap().push(p.pattern_type);
    }));

    orchestrator.start().unwrap();
    input.chord(&["ctrl", "s"], 1.0);
    input.chord(&["ctrl", "s"], 1.5);
    input.tap("a", 1.7);
    orchestrator.stop();

    assert_eq!(*fired.lock().unwrap(), vec!["save", "save"]);
    let stats = orchestrator.transparency().stats();
    assert_eq!(stats.hotkeys_triggered, 2);
    assert_eq!(
        observed.lock().unwrap().len(),
        orchestrator.patterns().len()
    );
}

#[test]
fn test_stop_twice_and_restart() {
    let (mut orchestrator, input) = orchestrator(OrchestratorConfig::default());
    orchestrator.start().unwrap();
    input.tap("a", 1.0);
    orchestrator.stop();
    orchestrator.stop();
    assert!(!input.is_attached(HookTarget::Keyboard));

    orchestrator.start().unwrap();
    input.tap("b", 2.0);
    orchestrator.stop();
    assert_eq!(orchestrator.get_statistics().total_keystrokes, 2);
}

#[test]
fn test_input_after_stop_is_ignored() {
    let (mut orchestrator, input) = orchestrator(OrchestratorConfig::default());
    orchestrator.start().unwrap();
    orchestrator.stop();
    assert!(!input.tap("a", 1.0));
    assert_eq!(orchestrator.get_statistics().total_keystrokes, 0);
}

#[test]
fn test_keyboard_only_capture() {
    let config = OrchestratorConfig {
        capture_pointer: false,
        ..OrchestratorConfig::default()
    };
    let (mut orchestrator, input) = orchestrator(config);
    orchestrator.start().unwrap();
    assert!(input.is_attached(HookTarget::Keyboard));
    assert!(!input.is_attached(HookTarget::Pointer));
    assert!(!input.click(PointerButton::Left, 1.0, 1.0, 1.0));
    orchestrator.stop();
}

#[test]
fn test_recent_events_are_merged_in_time_order() {
    let (mut orchestrator, input) = orchestrator(OrchestratorConfig::default());
    orchestrator.start().unwrap();
    input.tap("a", 1.0);
    input.click(PointerButton::Left, 10.0, 10.0, 1.5);
    input.tap("b", 2.0);
    orchestrator.stop();

    let events = orchestrator.get_recent_events(4);
    assert_eq!(events.len(), 4);
    let timestamps: Vec<f64> = events.iter().map(|e| e.timestamp()).collect();
    let mut sorted = timestamps.clone();
    sorted.sort_by(f64::total_cmp);
    assert_eq!(timestamps, sorted);
    assert!((timestamps[3] - 2.01).abs() < 1e-9);
    assert!((timestamps[0] - 1.5).abs() < 1e-9);
}
