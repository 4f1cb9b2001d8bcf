//! Export and re-import of hotkeys and patterns between orchestrators.

use input_insight_agent::collector::{HookTarget, SyntheticInput};
use input_insight_agent::export::FORMAT_VERSION;
use input_insight_agent::{
    ActionMap, CaptureOrchestrator, ExportDocument, ExportError, HotkeySpec, HotkeyTrigger,
    OrchestratorConfig, PatternType,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

fn orchestrator() -> (CaptureOrchestrator, SyntheticInput) {
    let input = SyntheticInput::new();
    let orchestrator = CaptureOrchestrator::new(
        OrchestratorConfig::default(),
        Box::new(input.hook(HookTarget::Keyboard)),
        Box::new(input.hook(HookTarget::Pointer)),
    )
    .unwrap();
    (orchestrator, input)
}

fn noop(_: &HotkeyTrigger) {}

fn populated() -> (CaptureOrchestrator, SyntheticInput) {
    let (mut orchestrator, input) = orchestrator();
    orchestrator
        .register_hotkey_fn(
            HotkeySpec::new("save", "ctrl+s").with_description("Save file"),
            noop,
        )
        .unwrap();
    orchestrator
        .register_hotkey_fn(HotkeySpec::sequence("comment", "ctrl+k, ctrl+c"), noop)
        .unwrap();
    orchestrator
        .register_hotkey_fn(
            HotkeySpec::contextual("run", "f5", "editor").with_priority(3),
            noop,
        )
        .unwrap();

    orchestrator.start().unwrap();
    for i in 0..25 {
        input.tap("t", 100.0 + i as f64 * 0.1);
    }
    input.chord(&["ctrl", "s"], 104.0);
    orchestrator.stop();
    (orchestrator, input)
}

#[test]
fn test_round_trip_into_fresh_orchestrator() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("exports").join("session.json");

    let (source, _input) = populated();
    assert!(!source.patterns().is_empty());
    source.export_to(&path).unwrap();

    let document = ExportDocument::load(&path).unwrap();
    assert_eq!(document.format_version, FORMAT_VERSION);
    assert_eq!(document.statistics.as_ref().unwrap().total_keystrokes, 27);

    let (target, input) = orchestrator();
    let saves = Arc::new(AtomicUsize::new(0));
    let s = saves.clone();
    let actions = ActionMap::new()
        .with("save", move |_: &HotkeyTrigger| {
            s.fetch_add(1, Ordering::SeqCst);
        })
        .with("comment", noop)
        .with("run", noop);

    let report = target.import_from(&path, &actions).unwrap();
    assert_eq!(report.imported_hotkeys, 3);
    assert_eq!(report.imported_patterns, source.patterns().len());
    assert!(report.skipped.is_empty());

    assert_eq!(target.hotkeys().records(), source.hotkeys().records());

    let before = source.patterns();
    let after = target.patterns();
    assert_eq!(before.len(), after.len());
    for (a, b) in before.iter().zip(&after) {
        assert_eq!(a.pattern_type, b.pattern_type);
        assert_eq!(a.description, b.description);
        assert!((a.timestamp - b.timestamp).abs() < 1e-9);
        assert!((a.confidence - b.confidence).abs() < 1e-9);
    }

    // Imported bindings are live
    let mut target = target;
    target.start().unwrap();
    input.chord(&["ctrl", "s"], 1.0);
    target.stop();
    assert_eq!(saves.load(Ordering::SeqCst), 1);
}

#[test]
fn test_missing_actions_are_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.json");
    let (source, _input) = populated();
    source.export_to(&path).unwrap();

    let (target, _input) = orchestrator();
    let actions = ActionMap::new().with("save", noop);
    let report = target.import_from(&path, &actions).unwrap();

    assert_eq!(report.imported_hotkeys, 1);
    let mut skipped: Vec<String> = report.skipped.iter().filter_map(|s| s.name.clone()).collect();
    skipped.sort();
    assert_eq!(skipped, vec!["comment", "run"]);
    assert!(target.hotkeys().get("comment").is_none());
}

#[test]
fn test_import_conflict_skips_entry() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.json");
    let (source, _input) = populated();
    source.export_to(&path).unwrap();

    let (target, _input) = orchestrator();
    target
        .register_hotkey_fn(HotkeySpec::new("write", "ctrl+s"), noop)
        .unwrap();
    let actions = ActionMap::new()
        .with("save", noop)
        .with("comment", noop)
        .with("run", noop);
    let report = target.import_from(&path, &actions).unwrap();

    assert_eq!(report.imported_hotkeys, 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].name.as_deref(), Some("save"));
}

#[test]
fn test_malformed_document_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ \"hotkeys\": [ ").unwrap();

    let (target, _input) = orchestrator();
    let err = target.import_from(&path, &ActionMap::new()).unwrap_err();
    assert!(matches!(err, ExportError::Import(_)));
    assert!(target.hotkeys().is_empty());
    assert!(target.patterns().is_empty());

    std::fs::write(&path, "[1, 2, 3]").unwrap();
    assert!(matches!(
        target.import_from(&path, &ActionMap::new()),
        Err(ExportError::Import(_))
    ));
}

#[test]
fn test_newer_format_version_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("future.json");
    let body = format!(
        r#"{{"format_version": {}, "hotkeys": [], "patterns": []}}"#,
        FORMAT_VERSION + 1
    );
    std::fs::write(&path, body).unwrap();

    let (target, _input) = orchestrator();
    assert!(matches!(
        target.import_from(&path, &ActionMap::new()),
        Err(ExportError::Import(_))
    ));
}

#[test]
fn test_malformed_pattern_entry_is_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("partial.json");
    std::fs::write(
        &path,
        r#"{
            "format_version": 1,
            "hotkeys": [],
            "patterns": [
                {"pattern_type": "idle_period", "confidence": 1.0, "timestamp": 10.0,
                 "duration": 40.0, "description": "Idle period: 40.0 seconds",
                 "data": {"kind": "idle", "idle_duration": 40.0, "start_time": 10.0, "end_time": 50.0}},
                {"pattern_type": "not_a_type"}
            ]
        }"#,
    )
    .unwrap();

    let (target, _input) = orchestrator();
    let report = target.import_from(&path, &ActionMap::new()).unwrap();
    assert_eq!(report.imported_patterns, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(
        target.analyzer().pattern_counts()[&PatternType::IdlePeriod],
        1
    );
}

#[test]
fn test_rejected_document_leaves_registry_untouched() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("half.json");
    std::fs::write(
        &path,
        r#"{"format_version": 1, "hotkeys": [{"name": "save", "keys": "ctrl+s"}], "patterns": "oops"}"#,
    )
    .unwrap();

    let (target, _input) = orchestrator();
    let actions = ActionMap::new().with("save", noop);
    assert!(matches!(
        target.import_from(&path, &actions),
        Err(ExportError::Import(_))
    ));
    assert!(target.hotkeys().is_empty());
    assert_eq!(target.get_statistics().registered_hotkeys, 0);
}

#[test]
fn test_out_of_range_pattern_values_are_clamped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("range.json");
    std::fs::write(
        &path,
        r#"{
            "format_version": 1,
            "hotkeys": [],
            "patterns": [
                {"pattern_type": "idle_period", "confidence": 5.0, "timestamp": 10.0,
                 "duration": -3.0, "description": "Idle period",
                 "data": {"kind": "idle", "idle_duration": 40.0, "start_time": 10.0, "end_time": 50.0}}
            ]
        }"#,
    )
    .unwrap();

    let (target, _input) = orchestrator();
    let report = target.import_from(&path, &ActionMap::new()).unwrap();
    assert_eq!(report.imported_patterns, 1);

    let pattern = &target.patterns()[0];
    assert_eq!(pattern.confidence, 1.0);
    assert_eq!(pattern.duration, 0.0);
}
