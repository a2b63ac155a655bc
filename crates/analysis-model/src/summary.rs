//! Per-frame records and the end-of-session summary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::anomaly::Anomaly;
use crate::labels::{ActivityLevel, EmotionLabel};

/// Emotion assigned to one face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionClassification {
    pub label: EmotionLabel,
    pub confidence: f64,
    pub probabilities: BTreeMap<EmotionLabel, f64>,
}

impl EmotionClassification {
    /// Low-confidence neutral with a uniform distribution, used when no
    /// emotion could be read from a face.
    pub fn neutral_fallback() -> Self {
        let uniform = 1.0 / EmotionLabel::ALL.len() as f64;
        Self {
            label: EmotionLabel::Neutral,
            confidence: 0.3,
            probabilities: EmotionLabel::ALL.iter().map(|l| (*l, uniform)).collect(),
        }
    }

    /// Pick the most probable label from a distribution.
    ///
    /// Returns `None` for an empty distribution. Ties resolve to the label
    /// that sorts first.
    pub fn from_probabilities(probabilities: BTreeMap<EmotionLabel, f64>) -> Option<Self> {
        let (label, confidence) = probabilities
            .iter()
            .fold(None, |best: Option<(EmotionLabel, f64)>, (label, p)| match best {
                Some((_, best_p)) if best_p >= *p => best,
                _ => Some((*label, *p)),
            })?;
        Some(Self {
            label,
            confidence,
            probabilities,
        })
    }
}

/// Everything the aggregator needs to know about one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame_number: u64,
    pub timestamp: f64,
    pub num_faces: usize,
    pub emotions: Vec<EmotionClassification>,
    pub activity: ActivityLevel,
    pub anomaly: Option<Anomaly>,
}

impl FrameRecord {
    /// A frame with only an activity level.
    pub fn new(frame_number: u64, timestamp: f64, activity: ActivityLevel) -> Self {
        Self {
            frame_number,
            timestamp,
            num_faces: 0,
            emotions: Vec::new(),
            activity,
            anomaly: None,
        }
    }
}

/// Stream metadata reported by the frame source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub filename: String,
    pub total_frames: u64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    /// Seconds; zero when `fps` is unknown.
    pub duration: f64,
}

impl VideoInfo {
    pub fn new(
        filename: impl Into<String>,
        total_frames: u64,
        fps: f64,
        width: u32,
        height: u32,
    ) -> Self {
        let duration = if fps > 0.0 {
            total_frames as f64 / fps
        } else {
            0.0
        };
        Self {
            filename: filename.into(),
            total_frames,
            fps,
            width,
            height,
            duration,
        }
    }
}

/// One row of a distribution, with its share of the total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionEntry {
    pub label: String,
    pub count: u64,
    /// Percent of the distribution total, `0.0..=100.0`.
    pub percentage: f64,
}

/// Aggregate over a whole session. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub video_filename: String,
    /// Frames actually processed.
    pub total_frames: u64,
    pub duration: f64,
    pub fps: f64,
    pub total_faces_detected: u64,
    pub emotion_distribution: BTreeMap<EmotionLabel, u64>,
    pub activity_distribution: BTreeMap<ActivityLevel, u64>,
    /// Anomalies in frame order.
    #[serde(default)]
    pub anomalies: Vec<Anomaly>,
    /// Wall-clock processing time, seconds.
    pub processing_time: f64,
    /// RFC 3339 time the summary was built.
    #[serde(default)]
    pub generated_at: String,
}

impl AnalysisSummary {
    /// Emotion counts with percentages, most frequent first.
    pub fn emotion_breakdown(&self) -> Vec<DistributionEntry> {
        breakdown(self.emotion_distribution.iter().map(|(k, v)| (k.label(), *v)))
    }

    /// Activity counts with percentages, most frequent first.
    pub fn activity_breakdown(&self) -> Vec<DistributionEntry> {
        breakdown(self.activity_distribution.iter().map(|(k, v)| (k.label(), *v)))
    }

    /// Number of frames whose activity is the given level.
    pub fn activity_count(&self, level: ActivityLevel) -> u64 {
        self.activity_distribution.get(&level).copied().unwrap_or(0)
    }
}

fn breakdown<'a>(counts: impl Iterator<Item = (&'a str, u64)>) -> Vec<DistributionEntry> {
    let counts: Vec<(&str, u64)> = counts.collect();
    let total: u64 = counts.iter().map(|(_, c)| c).sum();

    let mut entries: Vec<DistributionEntry> = counts
        .into_iter()
        .map(|(label, count)| DistributionEntry {
            label: label.to_string(),
            count,
            percentage: if total > 0 {
                count as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        })
        .collect();

    // Stable sort keeps enum order among equal counts.
    entries.sort_by(|a, b| b.count.cmp(&a.count));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary_with(activity: &[(ActivityLevel, u64)]) -> AnalysisSummary {
        AnalysisSummary {
            video_filename: "clip.mp4".into(),
            total_frames: activity.iter().map(|(_, c)| c).sum(),
            duration: 1.0,
            fps: 30.0,
            total_faces_detected: 0,
            emotion_distribution: BTreeMap::new(),
            activity_distribution: activity.iter().copied().collect(),
            anomalies: vec![],
            processing_time: 0.1,
            generated_at: String::new(),
        }
    }

    #[test]
    fn test_breakdown_sorted_with_percentages() {
        let summary = summary_with(&[
            (ActivityLevel::Static, 1),
            (ActivityLevel::RapidMovement, 3),
        ]);
        let rows = summary.activity_breakdown();
        assert_eq!(rows[0].label, "Rapid Movement");
        assert!((rows[0].percentage - 75.0).abs() < 1e-9);
        assert_eq!(rows[1].label, "Static");
        assert!((rows[1].percentage - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_breakdown() {
        let summary = summary_with(&[]);
        assert!(summary.activity_breakdown().is_empty());
        assert!(summary.emotion_breakdown().is_empty());
        assert_eq!(summary.activity_count(ActivityLevel::Static), 0);
    }

    #[test]
    fn test_neutral_fallback_is_uniform() {
        let fallback = EmotionClassification::neutral_fallback();
        assert_eq!(fallback.label, EmotionLabel::Neutral);
        assert_eq!(fallback.confidence, 0.3);
        let total: f64 = fallback.probabilities.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_from_probabilities_picks_max() {
        let probs: BTreeMap<_, _> = [(EmotionLabel::Sad, 0.2), (EmotionLabel::Happy, 0.7)]
            .into_iter()
            .collect();
        let c = EmotionClassification::from_probabilities(probs).unwrap();
        assert_eq!(c.label, EmotionLabel::Happy);
        assert_eq!(c.confidence, 0.7);
        assert!(EmotionClassification::from_probabilities(BTreeMap::new()).is_none());
    }

    #[test]
    fn test_summary_json_uses_label_keys() {
        let summary = summary_with(&[(ActivityLevel::Static, 3)]);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["activity_distribution"]["static"], 3);
    }

    #[test]
    fn test_video_info_duration() {
        assert!((VideoInfo::new("a", 90, 30.0, 1, 1).duration - 3.0).abs() < 1e-12);
        assert_eq!(VideoInfo::new("a", 90, 0.0, 1, 1).duration, 0.0);
    }
}
