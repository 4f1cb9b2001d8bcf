//! Productivity insights derived from the pattern log.

use crate::analysis::pattern::{Pattern, PatternData, PatternType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypingEfficiency {
    /// Mean WPM estimate over recent rhythm patterns
    pub wpm: f64,
    /// `1 - mean variance`, floored at zero
    pub consistency: f64,
    pub burst_frequency: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointerEfficiency {
    pub gesture_usage: usize,
    pub repetitive_actions: usize,
    pub efficiency_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub timestamp: f64,
    pub pattern_type: PatternType,
    pub description: String,
    pub confidence: f64,
}

/// Summary of recent behavior with recommendations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductivityInsights {
    pub typing_efficiency: TypingEfficiency,
    pub pointer_efficiency: PointerEfficiency,
    /// Recent pattern count per type name
    pub pattern_summary: BTreeMap<String, usize>,
    pub recommendations: Vec<String>,
    /// Up to the last 20 recent patterns, oldest first
    pub activity_timeline: Vec<TimelineEntry>,
}

const TIMELINE_LEN: usize = 20;

impl ProductivityInsights {
    /// Insights over patterns whose timestamp lies within `window` seconds
    /// before `now`.
    pub fn from_patterns(patterns: &[Pattern], now: f64, window: f64) -> Self {
        let mut recent: Vec<&Pattern> = patterns
            .iter()
            .filter(|p| now - p.timestamp < window)
            .collect();
        recent.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        let of_type = |t: PatternType| recent.iter().filter(move |p| p.pattern_type == t);

        let rhythm: Vec<(f64, f64)> = of_type(PatternType::TypingRhythm)
            .filter_map(|p| match p.data {
                PatternData::TypingRhythm {
                    wpm_estimate,
                    variance,
                    ..
                } => Some((wpm_estimate, variance)),
                _ => None,
            })
            .collect();
        let (wpm, consistency) = if rhythm.is_empty() {
            (0.0, 0.0)
        } else {
            let n = rhythm.len() as f64;
            let wpm = rhythm.iter().map(|(w, _)| w).sum::<f64>() / n;
            let variance = rhythm.iter().map(|(_, v)| v).sum::<f64>() / n;
            (wpm, (1.0 - variance).max(0.0))
        };
        let typing_efficiency = TypingEfficiency {
            wpm,
            consistency,
            burst_frequency: of_type(PatternType::BurstActivity).count(),
        };

        let repetitive_actions = of_type(PatternType::RepetitiveAction).count();
        let pointer_efficiency = PointerEfficiency {
            gesture_usage: of_type(PatternType::MouseGesture).count(),
            repetitive_actions,
            efficiency_score: (1.0 - 0.1 * repetitive_actions as f64).max(0.0),
        };

        let pattern_summary = PatternType::ALL
            .iter()
            .map(|t| (t.as_str().to_string(), of_type(*t).count()))
            .collect();

        let mut recommendations = Vec::new();
        if !rhythm.is_empty() && typing_efficiency.consistency < 0.5 {
            recommendations.push("Consider practicing typing to improve consistency".to_string());
        }
        if typing_efficiency.burst_frequency > 10 {
            recommendations.push("Try to maintain a steady typing pace instead of bursts".to_string());
        }
        if pointer_efficiency.repetitive_actions > 5 {
            recommendations
                .push("Consider keyboard shortcuts to reduce repetitive clicking".to_string());
        }
        if of_type(PatternType::IdlePeriod).count() > 3 {
            recommendations
                .push("Frequent breaks detected; consider time management techniques".to_string());
        }

        let skip = recent.len().saturating_sub(TIMELINE_LEN);
        let activity_timeline = recent
            .iter()
            .skip(skip)
            .map(|p| TimelineEntry {
                timestamp: p.timestamp,
                pattern_type: p.pattern_type,
                description: p.description.clone(),
                confidence: p.confidence,
            })
            .collect();

        Self {
            typing_efficiency,
            pointer_efficiency,
            pattern_summary,
            recommendations,
            activity_timeline,
        }
    }
}
