//! Behavioral pattern detection and productivity insights.

pub mod analyzer;
pub mod detectors;
pub mod insights;
pub mod pattern;

pub use analyzer::{AnalysisConfig, InputAnalyzer};
pub use detectors::WORKFLOW_TEMPLATES;
pub use insights::{PointerEfficiency, ProductivityInsights, TimelineEntry, TypingEfficiency};
pub use pattern::{GestureKind, Pattern, PatternData, PatternLog, PatternType};
