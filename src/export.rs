//! Export and import of hotkey bindings and detected patterns.
//!
//! Documents are pretty-printed JSON. Import is lenient per entry: a
//! hotkey without a matching action, with invalid keys, or in conflict is
//! skipped and reported; only a document that is not an export at all is
//! an error.

use crate::analysis::{InputAnalyzer, Pattern};
use crate::hotkey::{ActionMap, HotkeyMatcher, HotkeyRecord, HotkeySpec};
use crate::orchestrator::CaptureStatistics;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Current document format.
pub const FORMAT_VERSION: u32 = 1;

/// Serialized export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub format_version: u32,
    /// RFC 3339 wall-clock time of the export
    pub exported_at: String,
    pub hotkeys: Vec<HotkeyRecord>,
    pub patterns: Vec<Pattern>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<CaptureStatistics>,
}

impl ExportDocument {
    /// Snapshot the registry and the pattern log.
    pub fn capture(
        hotkeys: &HotkeyMatcher,
        analyzer: &InputAnalyzer,
        statistics: Option<CaptureStatistics>,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            exported_at: Utc::now().to_rfc3339(),
            hotkeys: hotkeys.records(),
            patterns: analyzer.patterns(),
            statistics,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ExportError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ExportError::Io(e.to_string()))?;
        }
        let json =
            serde_json::to_string_pretty(self).map_err(|e| ExportError::Serialize(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| ExportError::Io(e.to_string()))?;
        info!(
            path = %path.display(),
            hotkeys = self.hotkeys.len(),
            patterns = self.patterns.len(),
            "exported"
        );
        Ok(())
    }

    /// Read a document strictly; any malformed entry is an error.
    pub fn load(path: &Path) -> Result<Self, ExportError> {
        let content = std::fs::read_to_string(path).map_err(|e| ExportError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ExportError::Import(e.to_string()))
    }
}

/// An import entry that was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    /// Binding name, if the entry had one
    pub name: Option<String>,
    pub reason: String,
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported_hotkeys: usize,
    pub imported_patterns: usize,
    pub skipped: Vec<SkippedEntry>,
}

impl ImportReport {
    pub fn imported(&self) -> usize {
        self.imported_hotkeys + self.imported_patterns
    }

    fn skip(&mut self, name: Option<String>, reason: String) {
        warn!(name = name.as_deref().unwrap_or("<unnamed>"), %reason, "import entry skipped");
        self.skipped.push(SkippedEntry { name, reason });
    }
}

/// Entries of an optional array field; a missing or null field is empty.
fn array_field(
    object: &serde_json::Map<String, serde_json::Value>,
    field: &str,
) -> Result<Vec<serde_json::Value>, ExportError> {
    match object.get(field) {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::Array(entries)) => Ok(entries.clone()),
        Some(_) => Err(ExportError::Import(format!("'{field}' is not an array"))),
    }
}

/// Import a document into a registry and an analyzer.
///
/// Hotkeys are re-bound with the action of the same name in `actions`;
/// patterns are appended to the analyzer's log. The document shape is
/// checked in full before anything is applied, so an error leaves both
/// untouched.
pub fn import_document(
    path: &Path,
    hotkeys: &HotkeyMatcher,
    analyzer: &InputAnalyzer,
    actions: &ActionMap,
) -> Result<ImportReport, ExportError> {
    let content = std::fs::read_to_string(path).map_err(|e| ExportError::Io(e.to_string()))?;
    let document: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| ExportError::Import(e.to_string()))?;
    let object = document
        .as_object()
        .ok_or_else(|| ExportError::Import("document is not a JSON object".to_string()))?;
    match object.get("format_version") {
        None | Some(serde_json::Value::Null) => {}
        Some(version) => match version.as_u64() {
            Some(v) if v <= u64::from(FORMAT_VERSION) => {}
            _ => {
                return Err(ExportError::Import(format!(
                    "unsupported format version {version}"
                )))
            }
        },
    }

    let entries = array_field(object, "hotkeys")?;
    let patterns = array_field(object, "patterns")?;

    let mut report = ImportReport::default();
    for entry in entries {
        let name = entry
            .get("name")
            .and_then(|n| n.as_str())
            .map(str::to_string);
        let record: HotkeyRecord = match serde_json::from_value(entry) {
            Ok(record) => record,
            Err(e) => {
                report.skip(name, format!("malformed entry: {e}"));
                continue;
            }
        };
        let Some(action) = actions.get(&record.name) else {
            report.skip(Some(record.name), "no action supplied".to_string());
            continue;
        };
        let name = record.name.clone();
        match hotkeys.register(HotkeySpec::from(record), action) {
            Ok(()) => report.imported_hotkeys += 1,
            Err(e) => report.skip(Some(name), e.to_string()),
        }
    }

    let mut parsed = Vec::with_capacity(patterns.len());
    for entry in patterns {
        match serde_json::from_value::<Pattern>(entry).map(Pattern::validated) {
            Ok(Some(pattern)) => parsed.push(pattern),
            Ok(None) => report.skip(None, "pattern has a non-finite value".to_string()),
            Err(e) => report.skip(None, format!("malformed pattern: {e}")),
        }
    }
    report.imported_patterns = analyzer.import_patterns(parsed);

    info!(
        hotkeys = report.imported_hotkeys,
        patterns = report.imported_patterns,
        skipped = report.skipped.len(),
        "import finished"
    );
    Ok(report)
}

/// Export errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    Io(String),
    Serialize(String),
    /// The file is not a readable export document
    Import(String),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Io(e) => write!(f, "IO error: {e}"),
            ExportError::Serialize(e) => write!(f, "Serialize error: {e}"),
            ExportError::Import(e) => write!(f, "Import error: {e}"),
        }
    }
}

impl std::error::Error for ExportError {}
