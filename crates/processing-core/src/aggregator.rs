//! Session aggregation.
//!
//! Folds per-frame records, in frame order, into running counts. Only
//! absolute counts are kept; percentages are derived by the summary when a
//! report asks for them.

use std::collections::BTreeMap;

use visage_analysis_model::{
    ActivityLevel, AnalysisSummary, Anomaly, EmotionLabel, FrameRecord, VideoInfo,
};
use visage_common::{VisageError, VisageResult};

/// Running state for one session.
#[derive(Debug, Clone, Default)]
pub struct SessionAggregator {
    last_frame: Option<u64>,
    frames_folded: u64,
    total_faces: u64,
    emotions: BTreeMap<EmotionLabel, u64>,
    activity: BTreeMap<ActivityLevel, u64>,
    anomalies: Vec<Anomaly>,
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one frame.
    ///
    /// Frame numbers must strictly increase; a frame at or before the last
    /// folded one is rejected and the state is left untouched.
    pub fn fold(&mut self, record: FrameRecord) -> VisageResult<()> {
        if let Some(last) = self.last_frame {
            if record.frame_number <= last {
                return Err(VisageError::FrameOrder {
                    last,
                    got: record.frame_number,
                });
            }
        }

        self.last_frame = Some(record.frame_number);
        self.frames_folded += 1;
        self.total_faces += record.num_faces as u64;
        for emotion in &record.emotions {
            *self.emotions.entry(emotion.label).or_insert(0) += 1;
        }
        *self.activity.entry(record.activity).or_insert(0) += 1;
        if let Some(anomaly) = record.anomaly {
            self.anomalies.push(anomaly);
        }
        Ok(())
    }

    pub fn frames_folded(&self) -> u64 {
        self.frames_folded
    }

    pub fn anomaly_count(&self) -> usize {
        self.anomalies.len()
    }

    pub fn last_frame(&self) -> Option<u64> {
        self.last_frame
    }

    /// Close the session.
    ///
    /// `total_frames` in the summary is the number of frames actually
    /// folded; duration and fps come from the stream metadata.
    pub fn finalize(self, video: &VideoInfo, processing_time: f64) -> AnalysisSummary {
        AnalysisSummary {
            video_filename: video.filename.clone(),
            total_frames: self.frames_folded,
            duration: video.duration,
            fps: video.fps,
            total_faces_detected: self.total_faces,
            emotion_distribution: self.emotions,
            activity_distribution: self.activity,
            anomalies: self.anomalies,
            processing_time,
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
