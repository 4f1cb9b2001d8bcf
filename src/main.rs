//! Input Insight Agent CLI
//!
//! Privacy-filtered hotkeys and input pattern analysis.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use input_insight_agent::{
    analysis::ProductivityInsights,
    clock,
    collector::{check_permission, HookTarget, PlatformHook, PointerButton, SyntheticInput},
    config::{Config, SourceConfig},
    hotkey::{HotkeySpec, HotkeyTrigger},
    transparency::{create_shared_log, create_shared_log_with_persistence},
    CaptureOrchestrator, ExportDocument, Pattern, PrivacyLevel, PRIVACY_DECLARATION, VERSION,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "input-insight")]
#[command(version = VERSION)]
#[command(about = "Privacy-filtered hotkeys and input pattern analysis", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start capturing input
    Start {
        /// Input sources to capture (keyboard, pointer, or all)
        #[arg(long, default_value = "all")]
        sources: String,

        /// Override the configured privacy level
        #[arg(long)]
        privacy: Option<PrivacyLevel>,

        /// Where to write the export on exit
        #[arg(long, short)]
        export: Option<PathBuf>,
    },

    /// Run a synthetic session without platform hooks
    Demo {
        /// Write the session export here
        #[arg(long, short)]
        export: Option<PathBuf>,
    },

    /// Pause capture
    Pause,

    /// Resume capture
    Resume,

    /// Show current capture status
    Status,

    /// Display privacy declaration and policy
    Privacy,

    /// Show configuration
    Config,

    /// Summarize the patterns of an export file
    Insights {
        /// Export document to read
        #[arg(long, short)]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Start {
            sources,
            privacy,
            export,
        } => cmd_start(&sources, privacy, export),
        Commands::Demo { export } => cmd_demo(export),
        Commands::Pause => cmd_set_paused(true),
        Commands::Resume => cmd_set_paused(false),
        Commands::Status => cmd_status(),
        Commands::Privacy => cmd_privacy(),
        Commands::Config => cmd_config(),
        Commands::Insights { input } => cmd_insights(&input),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn cmd_start(sources: &str, privacy: Option<PrivacyLevel>, export: Option<PathBuf>) -> Result<()> {
    println!("Input Insight Agent v{VERSION}");
    println!();

    if !check_permission() {
        eprintln!("Error: global input monitoring is not available.");
        eprintln!();
        eprintln!("On macOS:");
        eprintln!("1. Open System Settings > Privacy & Security > Input Monitoring");
        eprintln!("2. Add this application to the allowed list");
        eprintln!("3. Restart the application");
        eprintln!();
        eprintln!("Other platforms without a global hook can run `input-insight demo`.");
        std::process::exit(1);
    }

    let source_config = SourceConfig::from_csv(sources);
    if !source_config.any_enabled() {
        bail!("at least one source must be enabled (keyboard or pointer)");
    }

    let mut config = Config::load().unwrap_or_default();
    config.sources = source_config;
    if let Some(level) = privacy {
        config.privacy.level = level;
    }
    if let Err(e) = config.ensure_directories() {
        warn!(error = %e, "could not create directories");
    }

    println!("Starting capture...");
    println!("  Keyboard: {}", enabled(config.sources.keyboard));
    println!("  Pointer: {}", enabled(config.sources.pointer));
    println!("  Privacy level: {}", config.privacy.level);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let transparency = create_shared_log_with_persistence(config.transparency_path());
    let mut orchestrator = CaptureOrchestrator::with_transparency(
        config.orchestrator_config(),
        Box::new(PlatformHook::new(HookTarget::Keyboard)),
        Box::new(PlatformHook::new(HookTarget::Pointer)),
        transparency.clone(),
    )
    .context("invalid privacy configuration")?;

    orchestrator.on_pattern_detected(Arc::new(|pattern: &Pattern| print_pattern(pattern)));
    orchestrator.on_hotkey_triggered(Arc::new(|trigger: &HotkeyTrigger| {
        println!("[hotkey] {} ({})", trigger.name, trigger.keys);
    }));
    register_configured_hotkeys(&orchestrator, &config);

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    // Pause/resume from another process by polling the config file
    let mut paused = config.paused;
    if paused {
        println!("Capture is currently paused.");
        println!("Run `input-insight resume` to start capturing.");
        println!();
    } else {
        orchestrator.start().context("could not start capture")?;
    }

    let mut last_config_check = Instant::now();
    let mut last_tick = Instant::now();
    while running.load(Ordering::SeqCst) {
        if last_config_check.elapsed() >= Duration::from_secs(1) {
            if let Ok(cfg) = Config::load() {
                if cfg.paused != paused {
                    paused = cfg.paused;
                    if paused {
                        println!("Pausing capture...");
                        orchestrator.stop();
                    } else {
                        println!("Resuming capture...");
                        orchestrator.start().context("could not resume capture")?;
                    }
                }
            }
            last_config_check = Instant::now();
        }

        if !paused && last_tick.elapsed() >= config.tick_interval {
            orchestrator.tick();
            last_tick = Instant::now();
        }

        thread::sleep(Duration::from_millis(100));
    }

    println!();
    println!("Stopping capture...");
    orchestrator.stop();

    if let Err(e) = transparency.save() {
        warn!(error = %e, "could not save transparency log");
    }

    let export_path = export.unwrap_or_else(|| {
        config
            .export_path
            .join(format!("session_{}.json", Utc::now().format("%Y%m%d_%H%M%S")))
    });
    orchestrator
        .export_to(&export_path)
        .with_context(|| format!("could not export to {}", export_path.display()))?;
    println!("Exported session to {export_path:?}");

    print_statistics(&orchestrator);
    println!();
    println!("{}", transparency.summary());
    Ok(())
}

/// Built-ins and user bindings from the config. Bindings that fail to
/// register are reported and skipped.
fn register_configured_hotkeys(orchestrator: &CaptureOrchestrator, config: &Config) {
    if config.hotkeys.builtins {
        if let Err(e) = orchestrator.register_builtin_hotkeys() {
            warn!(error = %e, "could not register built-in hotkeys");
        }
    }
    // User bindings have no action of their own; the trigger listener reports them
    for record in &config.hotkeys.bindings {
        let name = record.name.clone();
        if let Err(e) =
            orchestrator.register_hotkey_fn(HotkeySpec::from(record.clone()), |_: &HotkeyTrigger| {})
        {
            warn!(name = %name, error = %e, "could not register configured hotkey");
        }
    }
    let count = orchestrator.hotkeys().len();
    if count > 0 {
        println!("Registered {count} hotkeys");
        if config.hotkeys.builtins {
            println!("Press Ctrl+Shift+H to list them");
        }
        println!();
    }
}

/// Drive a short synthetic session through the full pipeline.
fn cmd_demo(export: Option<PathBuf>) -> Result<()> {
    println!("Input Insight Agent v{VERSION} - synthetic demo");
    println!();

    let config = Config::load().unwrap_or_default();
    let input = SyntheticInput::new();
    let transparency = create_shared_log();
    let mut orchestrator = CaptureOrchestrator::with_transparency(
        config.orchestrator_config(),
        Box::new(input.hook(HookTarget::Keyboard)),
        Box::new(input.hook(HookTarget::Pointer)),
        transparency.clone(),
    )
    .context("invalid privacy configuration")?;

    orchestrator.on_pattern_detected(Arc::new(|pattern: &Pattern| print_pattern(pattern)));
    orchestrator.register_hotkey_fn(HotkeySpec::new("save", "ctrl+s"), |t: &HotkeyTrigger| {
        println!("[hotkey] {} ({})", t.name, t.keys);
    })?;
    orchestrator.register_hotkey_fn(
        HotkeySpec::sequence("comment", "ctrl+k, ctrl+c"),
        |t: &HotkeyTrigger| println!("[hotkey] {} ({})", t.name, t.keys),
    )?;

    orchestrator.start().context("could not start synthetic capture")?;

    let t0 = clock::now();
    for (i, ch) in "the quick brown fox jumps".chars().enumerate() {
        let key = if ch == ' ' { "space".to_string() } else { ch.to_string() };
        input.tap(&key, t0 + i as f64 * 0.1);
    }
    let t1 = t0 + 3.0;
    input.chord(&["ctrl", "s"], t1);
    input.chord(&["ctrl", "k"], t1 + 0.4);
    input.chord(&["ctrl", "c"], t1 + 0.8);

    let t2 = t1 + 2.0;
    for i in 0..12 {
        let angle = i as f64 * std::f64::consts::TAU / 12.0;
        input.move_to(500.0 + 80.0 * angle.cos(), 400.0 + 80.0 * angle.sin(), t2 + i as f64 * 0.02);
    }
    for i in 0..5 {
        let jitter = if i % 2 == 0 { 4.0 } else { -4.0 };
        input.click(PointerButton::Left, 640.0 + jitter, 360.0, t2 + 1.0 + i as f64 * 0.07);
    }

    orchestrator.stop();
    orchestrator.tick_at(t2 + 60.0);

    println!();
    print_statistics(&orchestrator);
    print_insights(&orchestrator.analyzer().productivity_insights(t2 + 60.0));
    println!();
    println!("{}", transparency.summary());

    if let Some(path) = export {
        orchestrator
            .export_to(&path)
            .with_context(|| format!("could not export to {}", path.display()))?;
        println!("Exported session to {path:?}");
    }
    Ok(())
}

fn cmd_set_paused(paused: bool) -> Result<()> {
    let mut config = Config::load().unwrap_or_default();
    config.paused = paused;
    config.save().context("could not save config")?;
    if paused {
        println!("Capture paused. Use 'input-insight resume' to continue.");
    } else {
        println!("Capture resumed.");
    }
    Ok(())
}

fn cmd_status() -> Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("Input Insight Agent Status");
    println!("==========================");
    println!();
    println!(
        "Input Monitoring Permission: {}",
        if check_permission() {
            "Granted ✓"
        } else {
            "Not Granted ✗"
        }
    );
    println!();

    println!("Configuration:");
    println!("  Keyboard capture: {}", enabled(config.sources.keyboard));
    println!("  Pointer capture: {}", enabled(config.sources.pointer));
    println!("  Privacy level: {}", config.privacy.level);
    println!(
        "  Sequence timeout: {:.1}s",
        config.hotkeys.sequence_timeout.as_secs_f64()
    );
    println!("  Paused: {}", config.paused);
    println!();

    let stats_path = config.transparency_path();
    if stats_path.exists() {
        let content = std::fs::read_to_string(&stats_path)
            .with_context(|| format!("could not read {}", stats_path.display()))?;
        let stats: serde_json::Value =
            serde_json::from_str(&content).context("transparency log is not valid JSON")?;
        println!("Cumulative Statistics:");
        for (label, key) in [
            ("Keyboard events", "keyboard_events"),
            ("Pointer events", "pointer_events"),
            ("Dropped by policy", "events_dropped_by_policy"),
            ("Redacted", "events_redacted"),
            ("Patterns detected", "patterns_detected"),
            ("Hotkeys triggered", "hotkeys_triggered"),
        ] {
            if let Some(value) = stats.get(key) {
                println!("  {label}: {value}");
            }
        }
    } else {
        println!("No previous session data found.");
    }
    Ok(())
}

fn cmd_privacy() -> Result<()> {
    println!("{PRIVACY_DECLARATION}");
    let config = Config::load().unwrap_or_default();
    let privacy = &config.privacy;
    println!("Active policy:");
    println!("  Level: {}", privacy.level);
    println!("  Filter passwords: {}", privacy.filter_passwords);
    println!("  Filter emails: {}", privacy.filter_emails);
    println!("  Filter URLs: {}", privacy.filter_urls);
    println!("  Filter numbers: {}", privacy.filter_numbers);
    println!("  Custom patterns: {}", privacy.custom_patterns.len());
    println!("  Retention: {} days", privacy.retention_days);
    println!("  Blocked applications:");
    for app in &privacy.blocked_applications {
        println!("    - {app}");
    }
    Ok(())
}

fn cmd_config() -> Result<()> {
    let config = Config::load().context("could not load config")?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_insights(input: &Path) -> Result<()> {
    let document = ExportDocument::load(input)
        .with_context(|| format!("could not read export {}", input.display()))?;
    let config = Config::load().unwrap_or_default();

    // Exported timestamps are monotonic, so measure recency from the newest pattern
    let now = document
        .patterns
        .iter()
        .map(|p| p.timestamp)
        .fold(f64::MIN, f64::max)
        .max(0.0);
    debug!(patterns = document.patterns.len(), "loaded export");

    println!("Export from {}", document.exported_at);
    println!(
        "  {} hotkeys, {} patterns",
        document.hotkeys.len(),
        document.patterns.len()
    );
    let insights = ProductivityInsights::from_patterns(
        &document.patterns,
        now + f64::EPSILON,
        config.analysis.insight_window_secs,
    );
    print_insights(&insights);
    Ok(())
}

fn print_pattern(pattern: &Pattern) {
    println!(
        "[pattern] {:<18} {:.2}  {}",
        pattern.pattern_type.as_str(),
        pattern.confidence,
        pattern.description
    );
}

fn print_statistics(orchestrator: &CaptureOrchestrator) {
    let stats = orchestrator.get_statistics();
    println!("Session Statistics:");
    println!(
        "  Keystrokes: {} ({:.1}/min)",
        stats.total_keystrokes, stats.keys_per_minute
    );
    println!("  Words typed: {}", stats.words_typed);
    println!(
        "  Clicks: {} ({:.1}/min)",
        stats.total_clicks, stats.clicks_per_minute
    );
    println!("  Pointer distance: {:.0}px", stats.total_distance);
    println!("  Hotkeys registered: {}", stats.registered_hotkeys);
    println!("  Dropped events: {}", stats.dropped_events);
    for (pattern_type, count) in stats.pattern_counts.iter().filter(|(_, c)| **c > 0) {
        println!("  {pattern_type}: {count}");
    }
}

fn print_insights(insights: &ProductivityInsights) {
    println!();
    println!("Productivity Insights:");
    println!(
        "  Typing: {:.0} WPM, consistency {:.2}, {} bursts",
        insights.typing_efficiency.wpm,
        insights.typing_efficiency.consistency,
        insights.typing_efficiency.burst_frequency
    );
    println!(
        "  Pointer: {} gestures, {} repetitive actions, efficiency {:.2}",
        insights.pointer_efficiency.gesture_usage,
        insights.pointer_efficiency.repetitive_actions,
        insights.pointer_efficiency.efficiency_score
    );
    if insights.recommendations.is_empty() {
        println!("  No recommendations.");
    } else {
        println!("  Recommendations:");
        for recommendation in &insights.recommendations {
            println!("    - {recommendation}");
        }
    }
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("could not set Ctrl+C handler")
}
