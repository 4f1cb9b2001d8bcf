//! Detected patterns and the bounded log that holds them.

use crate::collector::types::Point;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Kind of behavior a pattern describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    TypingRhythm,
    MouseGesture,
    HotkeySequence,
    RepetitiveAction,
    WorkflowPattern,
    IdlePeriod,
    BurstActivity,
}

impl PatternType {
    pub const ALL: [PatternType; 7] = [
        PatternType::TypingRhythm,
        PatternType::MouseGesture,
        PatternType::HotkeySequence,
        PatternType::RepetitiveAction,
        PatternType::WorkflowPattern,
        PatternType::IdlePeriod,
        PatternType::BurstActivity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PatternType::TypingRhythm => "typing_rhythm",
            PatternType::MouseGesture => "mouse_gesture",
            PatternType::HotkeySequence => "hotkey_sequence",
            PatternType::RepetitiveAction => "repetitive_action",
            PatternType::WorkflowPattern => "workflow_pattern",
            PatternType::IdlePeriod => "idle_period",
            PatternType::BurstActivity => "burst_activity",
        }
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GestureKind {
    Circular,
    Line,
}

/// Payload of a pattern, one variant per detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PatternData {
    TypingRhythm {
        /// Mean seconds between presses
        average_interval: f64,
        /// Sample variance of the intervals, in s²
        variance: f64,
        keystrokes: usize,
        wpm_estimate: f64,
    },
    Burst {
        event_count: usize,
        /// Events per second
        rate: f64,
        source: String,
    },
    Gesture {
        gesture: GestureKind,
        path_length: usize,
        /// Mean distance from the centroid, for circular gestures
        radius: Option<f64>,
        /// Path distance, for line gestures
        distance: Option<f64>,
    },
    RepetitiveClicking {
        click_count: usize,
        cluster_center: Point,
    },
    Idle {
        idle_duration: f64,
        start_time: f64,
        end_time: f64,
    },
    HotkeyChain {
        hotkeys: Vec<String>,
        span: f64,
    },
    Workflow {
        workflow: String,
        steps: Vec<String>,
    },
}

/// A detected behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub pattern_type: PatternType,
    /// In `[0, 1]`
    pub confidence: f64,
    /// Monotonic seconds
    pub timestamp: f64,
    pub duration: f64,
    pub data: PatternData,
    pub description: String,
}

impl Pattern {
    pub fn new(
        pattern_type: PatternType,
        confidence: f64,
        timestamp: f64,
        duration: f64,
        data: PatternData,
        description: impl Into<String>,
    ) -> Self {
        Self {
            pattern_type,
            confidence: confidence.clamp(0.0, 1.0),
            timestamp,
            duration: duration.max(0.0),
            data,
            description: description.into(),
        }
    }

    /// Bring a deserialized pattern within the bounds [`Pattern::new`]
    /// enforces. `None` if a numeric field is not finite.
    pub fn validated(self) -> Option<Self> {
        if !(self.confidence.is_finite() && self.timestamp.is_finite() && self.duration.is_finite())
        {
            return None;
        }
        Some(Self::new(
            self.pattern_type,
            self.confidence,
            self.timestamp,
            self.duration,
            self.data,
            self.description,
        ))
    }
}

/// Append-only pattern ring. The oldest entry is evicted when full.
#[derive(Debug, Clone)]
pub struct PatternLog {
    patterns: VecDeque<Pattern>,
    capacity: usize,
}

impl PatternLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            patterns: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn push(&mut self, pattern: Pattern) {
        if self.patterns.len() == self.capacity {
            self.patterns.pop_front();
        }
        self.patterns.push_back(pattern);
    }

    pub fn extend(&mut self, patterns: impl IntoIterator<Item = Pattern>) {
        for pattern in patterns {
            self.push(pattern);
        }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    pub fn snapshot(&self) -> Vec<Pattern> {
        self.patterns.iter().cloned().collect()
    }

    /// Number of patterns of each type, every type present.
    pub fn counts(&self) -> BTreeMap<PatternType, usize> {
        let mut counts: BTreeMap<PatternType, usize> =
            PatternType::ALL.iter().map(|t| (*t, 0)).collect();
        for pattern in &self.patterns {
            *counts.entry(pattern.pattern_type).or_insert(0) += 1;
        }
        counts
    }

    /// Drop patterns older than `cutoff`. Returns how many were removed.
    pub fn prune_before(&mut self, cutoff: f64) -> usize {
        let before = self.patterns.len();
        self.patterns.retain(|p| p.timestamp >= cutoff);
        before - self.patterns.len()
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle(ts: f64) -> Pattern {
        Pattern::new(
            PatternType::IdlePeriod,
            1.0,
            ts,
            31.0,
            PatternData::Idle {
                idle_duration: 31.0,
                start_time: ts,
                end_time: ts + 31.0,
            },
            "Idle period",
        )
    }

    #[test]
    fn test_log_evicts_oldest() {
        let mut log = PatternLog::new(3);
        for i in 0..5 {
            log.push(idle(i as f64));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.iter().next().unwrap().timestamp, 2.0);
    }

    #[test]
    fn test_counts_include_every_type() {
        let mut log = PatternLog::new(10);
        log.push(idle(0.0));
        let counts = log.counts();
        assert_eq!(counts.len(), PatternType::ALL.len());
        assert_eq!(counts[&PatternType::IdlePeriod], 1);
        assert_eq!(counts[&PatternType::TypingRhythm], 0);
    }

    #[test]
    fn test_prune_before() {
        let mut log = PatternLog::new(10);
        log.extend((0..4).map(|i| idle(i as f64 * 10.0)));
        assert_eq!(log.prune_before(15.0), 2);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(idle(0.0).confidence, 1.0);
        let p = Pattern::new(
            PatternType::BurstActivity,
            1.7,
            0.0,
            -1.0,
            PatternData::Burst {
                event_count: 10,
                rate: 12.0,
                source: "typing_burst".into(),
            },
            "",
        );
        assert_eq!(p.confidence, 1.0);
        assert_eq!(p.duration, 0.0);
    }

    #[test]
    fn test_validated_clamps_imported_values() {
        let mut p = idle(3.0);
        p.confidence = 5.0;
        p.duration = -2.0;
        let p = p.validated().unwrap();
        assert_eq!(p.confidence, 1.0);
        assert_eq!(p.duration, 0.0);

        let mut nan = idle(3.0);
        nan.confidence = f64::NAN;
        assert!(nan.validated().is_none());
    }

    #[test]
    fn test_serialized_type_names() {
        let json = serde_json::to_string(&idle(1.0)).unwrap();
        assert!(json.contains("\"pattern_type\":\"idle_period\""));
        assert!(json.contains("\"kind\":\"idle\""));
    }
}
