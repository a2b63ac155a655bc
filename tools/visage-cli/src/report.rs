//! Session outputs: plain-text report and JSON summary.

use std::path::{Path, PathBuf};

use visage_analysis_model::AnalysisSummary;

const RULE_WIDTH: usize = 60;

/// `MM:SS.s`, rounded to the nearest tenth of a second.
pub fn format_timestamp(seconds: f64) -> String {
    let tenths = (seconds.max(0.0) * 10.0).round() as u64;
    let minutes = tenths / 600;
    let rest = tenths % 600;
    format!("{minutes:02}:{:02}.{}", rest / 10, rest % 10)
}

pub fn render_report(summary: &AnalysisSummary) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut lines = vec![
        rule.clone(),
        "VIDEO ANALYSIS REPORT".to_string(),
        rule.clone(),
        String::new(),
        format!("File: {}", summary.video_filename),
        format!("Total Frames: {}", summary.total_frames),
        format!("Duration: {:.2} seconds", summary.duration),
        format!("FPS: {:.2}", summary.fps),
        String::new(),
        "--- FACE DETECTION ---".to_string(),
        format!("Total Faces Detected: {}", summary.total_faces_detected),
        String::new(),
    ];

    let emotions = summary.emotion_breakdown();
    if !emotions.is_empty() {
        lines.push("--- EMOTIONS ---".to_string());
        lines.extend(
            emotions
                .iter()
                .map(|row| format!("{}: {} ({:.1}%)", row.label, row.count, row.percentage)),
        );
        lines.push(String::new());
    }

    let activity = summary.activity_breakdown();
    if !activity.is_empty() {
        lines.push("--- ACTIVITY ---".to_string());
        lines.extend(activity.iter().map(|row| {
            format!("{}: {} frames ({:.1}%)", row.label, row.count, row.percentage)
        }));
        lines.push(String::new());
    }

    lines.push("--- ANOMALIES ---".to_string());
    if summary.anomalies.is_empty() {
        lines.push("None detected".to_string());
    } else {
        lines.extend(summary.anomalies.iter().map(|anomaly| {
            format!(
                "#{} [{}] {} (severity {:.2})",
                anomaly.anomaly_id,
                format_timestamp(anomaly.timestamp),
                anomaly.description,
                anomaly.severity
            )
        }));
    }
    lines.push(String::new());

    lines.push(format!("Processing Time: {:.1} seconds", summary.processing_time));
    if !summary.generated_at.is_empty() {
        lines.push(format!("Generated: {}", summary.generated_at));
    }
    lines.push(String::new());
    lines.push(rule);

    lines.join("\n")
}

/// Write `report.txt` and `summary.json` into `dir`, creating it if needed.
pub fn write_outputs(summary: &AnalysisSummary, dir: &Path) -> anyhow::Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir)?;

    let report_path = dir.join("report.txt");
    std::fs::write(&report_path, render_report(summary))?;

    let summary_path = dir.join("summary.json");
    std::fs::write(&summary_path, serde_json::to_string_pretty(summary)?)?;

    Ok((report_path, summary_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use visage_analysis_model::{ActivityLevel, Anomaly, AnomalyType, EmotionLabel};

    fn summary() -> AnalysisSummary {
        AnalysisSummary {
            video_filename: "clip".into(),
            total_frames: 4,
            duration: 4.0 / 30.0,
            fps: 30.0,
            total_faces_detected: 4,
            emotion_distribution: BTreeMap::from([(EmotionLabel::Happy, 3), (EmotionLabel::Sad, 1)]),
            activity_distribution: BTreeMap::from([
                (ActivityLevel::Static, 1),
                (ActivityLevel::ModerateMovement, 3),
            ]),
            anomalies: vec![Anomaly::new(1, 75, 62.5, AnomalyType::SuddenMovement, 0.42)],
            processing_time: 1.25,
            generated_at: String::new(),
        }
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00.0");
        assert_eq!(format_timestamp(62.5), "01:02.5");
    }

    #[test]
    fn test_format_timestamp_carries_rounded_minute() {
        assert_eq!(format_timestamp(59.96), "01:00.0");
        assert_eq!(format_timestamp(59.94), "00:59.9");
        assert_eq!(format_timestamp(-1.0), "00:00.0");
    }

    #[test]
    fn test_report_lists_distributions_and_anomalies() {
        let text = render_report(&summary());
        assert!(text.contains("Happy: 3 (75.0%)"));
        assert!(text.contains("Moderate Movement: 3 frames (75.0%)"));
        assert!(text.contains("#1 [01:02.5] Sudden Movement detected at frame 75 (severity 0.42)"));
        assert!(text.contains("Processing Time: 1.2 seconds") || text.contains("Processing Time: 1.3 seconds"));
        assert!(text.starts_with(&"=".repeat(RULE_WIDTH)));
        assert!(text.ends_with(&"=".repeat(RULE_WIDTH)));
    }

    #[test]
    fn test_report_without_anomalies_or_faces() {
        let mut quiet = summary();
        quiet.anomalies.clear();
        quiet.emotion_distribution.clear();
        let text = render_report(&quiet);
        assert!(text.contains("--- ANOMALIES ---\nNone detected"));
        assert!(!text.contains("--- EMOTIONS ---"));
    }

    #[test]
    fn test_write_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("run");
        let (report, json) = write_outputs(&summary(), &out).unwrap();
        assert!(report.exists());
        let parsed: AnalysisSummary =
            serde_json::from_str(&std::fs::read_to_string(json).unwrap()).unwrap();
        assert_eq!(parsed, summary());
    }
}
