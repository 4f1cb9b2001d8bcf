//! Input Insight Agent - privacy-filtered keyboard and pointer analysis.
//!
//! This library observes global keyboard and pointer activity, matches it
//! against registered hotkeys, and derives behavioral patterns for
//! productivity insight. Every event passes the privacy policy before any
//! hotkey, analyzer or user callback sees it.
//!
//! # Privacy Guarantees
//!
//! - **Filtered first**: the privacy engine runs before everything else
//! - **Blocked applications**: password managers and similar apps produce no events
//! - **No raw storage**: only bounded in-memory buffers and explicit exports
//! - **Transparency**: observed and suppressed events are counted and auditable
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Capture Orchestrator                        │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌───────────┐   ┌─────────┐   ┌────────────┐   │
//! │  │ OS hook    │──▶│ Capture   │──▶│ Privacy │──▶│ Hotkeys    │   │
//! │  │ (per OS)   │   │ services  │   │ engine  │   │ Analyzer   │   │
//! │  └────────────┘   └───────────┘   └─────────┘   │ Callbacks  │   │
//! │                                        │        └────────────┘   │
//! │                                        ▼                         │
//! │                                 ┌─────────────┐                  │
//! │                                 │Transparency │                  │
//! │                                 │    Log      │                  │
//! │                                 └─────────────┘                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use input_insight_agent::{CaptureOrchestrator, HotkeySpec, OrchestratorConfig};
//!
//! // Requires input monitoring permission on macOS
//! let mut orchestrator =
//!     CaptureOrchestrator::with_platform_hooks(OrchestratorConfig::default())
//!         .expect("valid privacy config");
//!
//! orchestrator
//!     .register_hotkey_fn(HotkeySpec::new("save", "ctrl+s"), |t: &input_insight_agent::HotkeyTrigger| {
//!         println!("{} fired", t.name);
//!     })
//!     .expect("no conflict");
//!
//! orchestrator.start().expect("hook available");
//! ```

pub mod analysis;
pub mod clock;
pub mod collector;
pub mod config;
pub mod export;
pub mod hotkey;
pub mod orchestrator;
pub mod privacy;
pub(crate) mod sync;
pub mod transparency;

// Re-export key types at crate root for convenience
pub use analysis::{AnalysisConfig, InputAnalyzer, Pattern, PatternType, ProductivityInsights};
pub use collector::{CaptureError, InputEvent, KeyEvent, PointerEvent, SyntheticInput};
pub use config::{Config, SourceConfig};
pub use export::{ExportDocument, ExportError, ImportReport};
pub use hotkey::{ActionMap, HotkeyError, HotkeyKind, HotkeyMatcher, HotkeySpec, HotkeyTrigger};
pub use orchestrator::{CaptureOrchestrator, CaptureStatistics, OrchestratorConfig};
pub use privacy::{PrivacyConfig, PrivacyEngine, PrivacyError, PrivacyLevel};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║             INPUT INSIGHT AGENT - PRIVACY DECLARATION            ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This agent observes keyboard and pointer activity locally to    ║
║  trigger hotkeys and describe working patterns.                  ║
║                                                                  ║
║  ✓ WHAT WE USE:                                                  ║
║    • Key presses, filtered by your privacy level                 ║
║    • Pointer movement, clicks and scrolling                      ║
║    • Timing between events                                       ║
║                                                                  ║
║  ✗ WHAT WE NEVER DO:                                             ║
║    • Capture anything while a blocked application is active     ║
║    • Keep passwords, emails or card numbers in readable form     ║
║    • Write typed content to disk                                 ║
║    • Send anything off this machine                              ║
║                                                                  ║
║  Only detected patterns and hotkey bindings can be exported,     ║
║  and only when you ask for it.                                   ║
║                                                                  ║
║  You can view capture statistics anytime with:                   ║
║    input-insight status                                          ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_declaration_contents() {
        assert!(PRIVACY_DECLARATION.contains("PRIVACY"));
        assert!(PRIVACY_DECLARATION.contains("NEVER DO"));
        assert!(PRIVACY_DECLARATION.contains("blocked application"));
    }
}
