//! Demonstration of live input capture with the Input Insight Agent.
//!
//! This example shows how to:
//! 1. Check for input monitoring permission
//! 2. Build an orchestrator over the platform hooks
//! 3. Register simple and sequence hotkeys
//! 4. Watch detected patterns as they happen
//! 5. Read statistics and insights when capture ends
//!
//! Run with: cargo run --example capture_demo
//!
//! Note: Requires Input Monitoring permission on macOS.
//! Grant permission in System Settings > Privacy & Security > Input Monitoring

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use input_insight_agent::{
    collector::check_permission,
    hotkey::{HotkeySpec, HotkeyTrigger},
    CaptureOrchestrator, OrchestratorConfig, Pattern, PRIVACY_DECLARATION,
};

fn main() {
    println!("Input Insight Agent - Capture Demo");
    println!("==================================");
    println!();

    println!("{PRIVACY_DECLARATION}");
    println!();

    print!("Checking input monitoring permission... ");
    if check_permission() {
        println!("OK ✓");
    } else {
        println!("FAILED ✗");
        println!();
        println!("Please grant input monitoring permission:");
        println!("1. Open System Settings");
        println!("2. Go to Privacy & Security > Input Monitoring");
        println!("3. Add this application");
        println!("4. Restart this demo");
        return;
    }
    println!();

    let mut orchestrator = match CaptureOrchestrator::with_platform_hooks(OrchestratorConfig::default())
    {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            eprintln!("Invalid privacy configuration: {e}");
            return;
        }
    };

    let report = |t: &HotkeyTrigger| println!("  hotkey: {} ({})", t.name, t.keys);
    let bindings = [
        HotkeySpec::new("save", "ctrl+s"),
        HotkeySpec::new("find", "ctrl+f").with_priority(1),
        HotkeySpec::sequence("comment", "ctrl+k, ctrl+c"),
    ];
    for spec in bindings {
        if let Err(e) = orchestrator.register_hotkey_fn(spec, report) {
            eprintln!("Could not register hotkey: {e}");
        }
    }

    orchestrator.on_pattern_detected(Arc::new(|pattern: &Pattern| {
        println!(
            "  pattern: {} ({:.0}%) {}",
            pattern.pattern_type,
            pattern.confidence * 100.0,
            pattern.description
        );
    }));

    println!("Starting capture for 30 seconds...");
    println!("Try typing, pressing Ctrl+S, or drawing circles with the pointer!");
    println!();

    if let Err(e) = orchestrator.start() {
        eprintln!("Error starting capture: {e}");
        return;
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let started = Instant::now();
    while running.load(Ordering::SeqCst) && started.elapsed() < Duration::from_secs(30) {
        std::thread::sleep(Duration::from_secs(1));
        orchestrator.tick();
    }

    orchestrator.stop();

    let stats = orchestrator.get_statistics();
    println!();
    println!("Capture complete!");
    println!("  Keystrokes: {}", stats.total_keystrokes);
    println!("  Words typed: {}", stats.words_typed);
    println!("  Clicks: {}", stats.total_clicks);
    println!("  Pointer distance: {:.0}px", stats.total_distance);

    let insights = orchestrator.get_productivity_insights();
    println!("  Typing speed: {:.0} WPM", insights.typing_efficiency.wpm);
    for recommendation in &insights.recommendations {
        println!("  Tip: {recommendation}");
    }

    println!();
    println!("{}", orchestrator.transparency().summary());
}
