//! Pattern detectors.
//!
//! Each detector is a pure function over a window of recent samples and
//! returns at most one pattern. Windows, cooldowns and the pattern log are
//! owned by the analyzer.

use crate::analysis::analyzer::AnalysisConfig;
use crate::analysis::pattern::{GestureKind, Pattern, PatternData, PatternType};
use crate::collector::types::Point;
use statrs::statistics::Statistics;

/// Multi-step shortcut templates: name and the shortcuts in order.
pub const WORKFLOW_TEMPLATES: &[(&str, &[&str])] = &[
    ("copy_paste", &["ctrl+c", "ctrl+v"]),
    ("undo_redo", &["ctrl+z", "ctrl+y"]),
    ("save", &["ctrl+s"]),
];

/// Average characters per word used for WPM estimates.
const CHARS_PER_WORD: f64 = 5.0;

fn centroid(points: &[Point]) -> Point {
    let n = points.len().max(1) as f64;
    Point::new(
        points.iter().map(|p| p.x).sum::<f64>() / n,
        points.iter().map(|p| p.y).sum::<f64>() / n,
    )
}

fn path_distance(points: &[Point]) -> f64 {
    points.windows(2).map(|w| w[0].distance_to(&w[1])).sum()
}

/// Sample variance, zero with fewer than two values.
fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().variance()
}

/// Consistent typing rhythm over recent press timestamps.
pub fn typing_rhythm(presses: &[f64], config: &AnalysisConfig) -> Option<Pattern> {
    let start = presses.len().saturating_sub(config.rhythm_window);
    let window = &presses[start..];
    let intervals: Vec<f64> = window
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|i| *i >= 0.0 && *i < config.pause_cutoff_secs)
        .collect();

    if intervals.len() < config.min_rhythm_intervals {
        return None;
    }
    let var = variance(&intervals);
    if var >= config.rhythm_variance_threshold {
        return None;
    }
    let mean = intervals.iter().mean();
    if mean <= 0.0 {
        return None;
    }

    let wpm = 60.0 / (mean * CHARS_PER_WORD);
    let first = window.first().copied().unwrap_or_default();
    let last = window.last().copied().unwrap_or_default();
    Some(Pattern::new(
        PatternType::TypingRhythm,
        (1.0 - var).min(0.9),
        last,
        last - first,
        PatternData::TypingRhythm {
            average_interval: mean,
            variance: var,
            keystrokes: intervals.len(),
            wpm_estimate: wpm,
        },
        format!("Consistent typing rhythm detected (WPM: {wpm:.1})"),
    ))
}

/// Many presses inside the burst window ending at the latest press.
pub fn typing_burst(presses: &[f64], config: &AnalysisConfig) -> Option<Pattern> {
    let last = *presses.last()?;
    let recent: Vec<f64> = presses
        .iter()
        .copied()
        .filter(|t| last - t < config.burst_window_secs)
        .collect();
    if recent.len() < config.burst_threshold {
        return None;
    }

    let span = last - recent[0];
    let rate = recent.len() as f64 / span.max(f64::EPSILON);
    Some(Pattern::new(
        PatternType::BurstActivity,
        0.8,
        last,
        span,
        PatternData::Burst {
            event_count: recent.len(),
            rate,
            source: "typing_burst".to_string(),
        },
        format!("Typing burst: {} keys in {span:.1}s", recent.len()),
    ))
}

/// Circular or straight-line pointer movement over recent move samples.
pub fn pointer_gesture(moves: &[(Point, f64)], config: &AnalysisConfig) -> Option<Pattern> {
    let start = moves.len().saturating_sub(config.gesture_window);
    let window = &moves[start..];
    if window.len() < 3 {
        return None;
    }
    let path: Vec<Point> = window.iter().map(|(p, _)| *p).collect();
    let first_ts = window[0].1;
    let last_ts = window[window.len() - 1].1;

    if path.len() >= 5 {
        let center = centroid(&path);
        let radii: Vec<f64> = path.iter().map(|p| p.distance_to(&center)).collect();
        let mean = radii.iter().mean();
        let tolerance = mean * config.circular_tolerance;
        if mean > config.min_gesture_radius && variance(&radii) < tolerance * tolerance {
            return Some(Pattern::new(
                PatternType::MouseGesture,
                0.7,
                last_ts,
                last_ts - first_ts,
                PatternData::Gesture {
                    gesture: GestureKind::Circular,
                    path_length: path.len(),
                    radius: Some(mean),
                    distance: None,
                },
                "Circular pointer gesture detected",
            ));
        }
    }

    let travelled = path_distance(&path);
    let direct = path[0].distance_to(&path[path.len() - 1]);
    if direct > config.min_line_distance
        && travelled > 0.0
        && direct / travelled > config.line_straightness
    {
        return Some(Pattern::new(
            PatternType::MouseGesture,
            0.6,
            last_ts,
            last_ts - first_ts,
            PatternData::Gesture {
                gesture: GestureKind::Line,
                path_length: path.len(),
                radius: None,
                distance: Some(travelled),
            },
            "Linear pointer gesture detected",
        ));
    }
    None
}

/// Clicks clustered around one spot inside the repetition window.
pub fn repetitive_clicks(clicks: &[(Point, f64)], config: &AnalysisConfig) -> Option<Pattern> {
    let last = clicks.last()?.1;
    let recent: Vec<&(Point, f64)> = clicks
        .iter()
        .filter(|(_, t)| last - t <= config.repetition_window_secs)
        .collect();
    if recent.len() < config.repetition_threshold {
        return None;
    }

    let points: Vec<Point> = recent.iter().map(|(p, _)| *p).collect();
    let center = centroid(&points);
    if points
        .iter()
        .any(|p| p.distance_to(&center) > config.repetition_radius)
    {
        return None;
    }

    Some(Pattern::new(
        PatternType::RepetitiveAction,
        0.8,
        last,
        last - recent[0].1,
        PatternData::RepetitiveClicking {
            click_count: points.len(),
            cluster_center: center,
        },
        format!("Repetitive clicking detected: {} clicks", points.len()),
    ))
}

/// Several hotkeys fired in quick succession.
pub fn hotkey_chain(triggers: &[(String, f64)], config: &AnalysisConfig) -> Option<Pattern> {
    let last = triggers.last()?.1;
    let recent: Vec<&(String, f64)> = triggers
        .iter()
        .filter(|(_, t)| last - t <= config.hotkey_chain_window_secs)
        .collect();
    if recent.len() < config.hotkey_chain_length {
        return None;
    }

    let span = last - recent[0].1;
    let hotkeys: Vec<String> = recent.iter().map(|(name, _)| name.clone()).collect();
    Some(Pattern::new(
        PatternType::HotkeySequence,
        0.75,
        last,
        span,
        PatternData::HotkeyChain {
            hotkeys: hotkeys.clone(),
            span,
        },
        format!("Hotkey chain: {}", hotkeys.join(" → ")),
    ))
}

/// A shortcut template completed by the most recent shortcuts.
pub fn workflow(shortcuts: &[(String, f64)], config: &AnalysisConfig) -> Option<Pattern> {
    for (name, steps) in WORKFLOW_TEMPLATES {
        if shortcuts.len() < steps.len() {
            continue;
        }
        let tail = &shortcuts[shortcuts.len() - steps.len()..];
        let matches = tail.iter().zip(steps.iter()).all(|((s, _), step)| s == step);
        let tight = tail
            .windows(2)
            .all(|w| w[1].1 - w[0].1 <= config.workflow_gap_secs);
        if matches && tight {
            let start = tail[0].1;
            let end = tail[tail.len() - 1].1;
            return Some(Pattern::new(
                PatternType::WorkflowPattern,
                0.7,
                end,
                end - start,
                PatternData::Workflow {
                    workflow: name.to_string(),
                    steps: steps.iter().map(|s| s.to_string()).collect(),
                },
                format!("Workflow detected: {name}"),
            ));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AnalysisConfig {
        AnalysisConfig::default()
    }

    #[test]
    fn test_steady_typing_rhythm() {
        let presses: Vec<f64> = (0..25).map(|i| 100.0 + i as f64 * 0.1).collect();
        let pattern = typing_rhythm(&presses, &config()).unwrap();
        match pattern.data {
            PatternData::TypingRhythm { wpm_estimate, .. } => {
                assert!((wpm_estimate - 120.0).abs() < 1e-6)
            }
            other => panic!("unexpected payload {other:?}"),
        }
        assert!(pattern.confidence <= 0.9);
    }

    #[test]
    fn test_rhythm_needs_enough_intervals() {
        let presses: Vec<f64> = (0..8).map(|i| i as f64 * 0.1).collect();
        assert!(typing_rhythm(&presses, &config()).is_none());
    }

    #[test]
    fn test_pauses_are_excluded_from_rhythm() {
        // Eleven steady presses, a long pause, then ten more
        let mut presses: Vec<f64> = (0..11).map(|i| i as f64 * 0.2).collect();
        presses.extend((0..10).map(|i| 10.0 + i as f64 * 0.2));
        let pattern = typing_rhythm(&presses, &config()).unwrap();
        if let PatternData::TypingRhythm { keystrokes, .. } = pattern.data {
            assert_eq!(keystrokes, 18);
        }
    }

    #[test]
    fn test_burst_detection() {
        let presses: Vec<f64> = (0..12).map(|i| i as f64 * 0.05).collect();
        let pattern = typing_burst(&presses, &config()).unwrap();
        assert_eq!(pattern.pattern_type, PatternType::BurstActivity);

        let slow: Vec<f64> = (0..12).map(|i| i as f64 * 0.5).collect();
        assert!(typing_burst(&slow, &config()).is_none());
    }

    #[test]
    fn test_circular_gesture() {
        let moves: Vec<(Point, f64)> = (0..10)
            .map(|i| {
                let angle = i as f64 * std::f64::consts::TAU / 10.0;
                (
                    Point::new(200.0 + 60.0 * angle.cos(), 200.0 + 60.0 * angle.sin()),
                    i as f64 * 0.02,
                )
            })
            .collect();
        let pattern = pointer_gesture(&moves, &config()).unwrap();
        assert!(matches!(
            pattern.data,
            PatternData::Gesture {
                gesture: GestureKind::Circular,
                ..
            }
        ));
    }

    #[test]
    fn test_line_gesture() {
        let moves: Vec<(Point, f64)> = (0..6)
            .map(|i| (Point::new(i as f64 * 30.0, 5.0), i as f64 * 0.02))
            .collect();
        let pattern = pointer_gesture(&moves, &config()).unwrap();
        assert!(matches!(
            pattern.data,
            PatternData::Gesture {
                gesture: GestureKind::Line,
                ..
            }
        ));
    }

    #[test]
    fn test_repetitive_clicks_need_cluster() {
        let clustered: Vec<(Point, f64)> = (0..5)
            .map(|i| (Point::new(300.0 + (i % 2) as f64 * 5.0, 300.0), i as f64 * 0.07))
            .collect();
        let pattern = repetitive_clicks(&clustered, &config()).unwrap();
        if let PatternData::RepetitiveClicking { click_count, .. } = pattern.data {
            assert_eq!(click_count, 5);
        }

        let spread: Vec<(Point, f64)> = (0..5)
            .map(|i| (Point::new(i as f64 * 200.0, 0.0), i as f64 * 0.07))
            .collect();
        assert!(repetitive_clicks(&spread, &config()).is_none());
    }

    #[test]
    fn test_hotkey_chain() {
        let triggers: Vec<(String, f64)> = ["save", "build", "run"]
            .iter()
            .enumerate()
            .map(|(i, n)| (n.to_string(), i as f64))
            .collect();
        assert!(hotkey_chain(&triggers, &config()).is_some());
        assert!(hotkey_chain(&triggers[..2], &config()).is_none());
    }

    #[test]
    fn test_copy_paste_workflow() {
        let shortcuts = vec![("ctrl+c".to_string(), 1.0), ("ctrl+v".to_string(), 3.0)];
        let pattern = workflow(&shortcuts, &config()).unwrap();
        if let PatternData::Workflow { workflow, .. } = pattern.data {
            assert_eq!(workflow, "copy_paste");
        }

        let slow = vec![("ctrl+c".to_string(), 1.0), ("ctrl+v".to_string(), 30.0)];
        assert!(workflow(&slow, &config()).is_none());
    }
}
