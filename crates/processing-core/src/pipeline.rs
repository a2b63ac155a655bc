//! Session pipeline.
//!
//! Owns everything that carries over between frames: the previous image and
//! face count, the anomaly id counter, and the aggregator. Frames must be fed
//! in strictly increasing order; the first frame of a session has no motion
//! and is classified `Static`. A gap in frame numbers (a frame that could not
//! be decoded) starts motion over the same way, so flow is only ever measured
//! between adjacent frames.

use image::RgbImage;
use visage_analysis_model::{
    ActivityLevel, AnalysisSummary, Anomaly, DetectionIndex, EmotionClassification,
    FrameDetections, FrameRecord, MotionFeatureVector, VideoInfo,
};
use visage_common::{
    frame_timestamp, AnomalyThreshold, AppConfig, FlowConfig, ProcessingClock, ProgressGate,
    VisageError, VisageResult,
};

use crate::activity::ActivityClassifier;
use crate::aggregator::SessionAggregator;
use crate::anomaly_classifier;
use crate::anomaly_model::{is_anomaly, severity, AnomalyModel};
use crate::emotion::EmotionClassifier;
use crate::motion::{MotionAnalysis, MotionFeatureExtractor};

/// One decoded frame.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Zero-based position in the stream.
    pub index: u64,
    pub image: RgbImage,
}

impl VideoFrame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }
}

/// What the pipeline concluded about one frame.
#[derive(Debug, Clone)]
pub struct FrameOutcome {
    pub frame_number: u64,
    pub timestamp: f64,
    pub num_faces: usize,
    pub emotions: Vec<EmotionClassification>,
    /// `None` when motion could not be extracted for this frame pair.
    pub analysis: Option<MotionAnalysis>,
    pub activity: ActivityLevel,
    /// Model score, when a model was available and motion was computed.
    pub anomaly_score: Option<f64>,
    pub anomaly: Option<Anomaly>,
}

/// Per-session analysis state.
pub struct SessionPipeline<'m> {
    extractor: MotionFeatureExtractor,
    activity: ActivityClassifier,
    anomaly_threshold: AnomalyThreshold,
    model: Option<&'m AnomalyModel>,
    emotions: Box<dyn EmotionClassifier>,
    aggregator: SessionAggregator,
    fps: f64,
    progress: ProgressGate,
    clock: ProcessingClock,
    prev_frame: Option<RgbImage>,
    prev_num_faces: usize,
    next_anomaly_id: u64,
}

impl<'m> SessionPipeline<'m> {
    /// Set up a session.
    ///
    /// Thresholds and flow parameters are validated here; an error means
    /// the session must not start. Without a model the session still runs
    /// and reports no anomalies.
    pub fn new(
        config: &AppConfig,
        fps: f64,
        model: Option<&'m AnomalyModel>,
        emotions: Box<dyn EmotionClassifier>,
    ) -> VisageResult<Self> {
        let thresholds = config.analysis.validate()?;
        if model.is_none() {
            tracing::warn!("No anomaly model available; anomaly detection disabled");
        }
        let clock = ProcessingClock::start();
        tracing::debug!(started_at = clock.epoch_wall(), fps, "Session started");

        Ok(Self {
            extractor: MotionFeatureExtractor::new(config.analysis.flow),
            activity: ActivityClassifier::new(thresholds.activity),
            anomaly_threshold: thresholds.anomaly,
            model,
            emotions,
            aggregator: SessionAggregator::new(),
            fps,
            progress: ProgressGate::new(config.log_every_n_frames),
            clock,
            prev_frame: None,
            prev_num_faces: 0,
            next_anomaly_id: 1,
        })
    }

    /// Analyze one frame and fold it into the session.
    ///
    /// Motion failures degrade the frame to `Unknown` activity with no
    /// anomaly check. The only error is an out-of-order frame, which leaves
    /// the session untouched.
    pub fn process_frame(
        &mut self,
        frame: VideoFrame,
        detections: &FrameDetections,
    ) -> VisageResult<FrameOutcome> {
        if let Some(last) = self.aggregator.last_frame() {
            if frame.index <= last {
                return Err(VisageError::FrameOrder {
                    last,
                    got: frame.index,
                });
            }
            if frame.index > last + 1 && self.prev_frame.take().is_some() {
                tracing::warn!(
                    frame = frame.index,
                    last,
                    "Gap in frame sequence; motion restarts at this frame"
                );
            }
        }

        let frame_number = frame.index;
        let timestamp = frame_timestamp(frame_number, self.fps);
        let num_faces = detections.num_faces();
        let emotions = self.emotions.classify_all(&frame.image, &detections.faces);

        let analysis = match self.extractor.extract(
            frame_number,
            self.prev_frame.as_ref(),
            &frame.image,
            num_faces,
            detections.avg_face_area(),
        ) {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                tracing::warn!(frame = frame_number, error = %e, "Skipping motion analysis");
                None
            }
        };

        let activity = analysis
            .as_ref()
            .map(|a| self.activity.classify(a.features.magnitude_mean))
            .unwrap_or(ActivityLevel::Unknown);

        let anomaly_score = match (self.model, analysis.as_ref()) {
            (Some(model), Some(a)) if a.has_motion_data() => Some(model.score(&a.features)),
            _ => None,
        };
        let anomaly = match (anomaly_score, analysis.as_ref()) {
            (Some(score), Some(a)) if is_anomaly(score, self.anomaly_threshold) => {
                Some(self.record_anomaly(frame_number, timestamp, score, &a.features, num_faces))
            }
            _ => None,
        };

        self.aggregator.fold(FrameRecord {
            frame_number,
            timestamp,
            num_faces,
            emotions: emotions.clone(),
            activity,
            anomaly: anomaly.clone(),
        })?;

        self.prev_frame = Some(frame.image);
        self.prev_num_faces = num_faces;

        let processed = self.aggregator.frames_folded();
        if self.progress.should_report(processed) {
            tracing::info!(
                frames = processed,
                anomalies = self.aggregator.anomaly_count(),
                elapsed_secs = self.clock.elapsed_secs(),
                "Processing"
            );
        }

        Ok(FrameOutcome {
            frame_number,
            timestamp,
            num_faces,
            emotions,
            analysis,
            activity,
            anomaly_score,
            anomaly,
        })
    }

    fn record_anomaly(
        &mut self,
        frame_number: u64,
        timestamp: f64,
        score: f64,
        features: &MotionFeatureVector,
        num_faces: usize,
    ) -> Anomaly {
        let kind = anomaly_classifier::classify(features, self.prev_num_faces, num_faces);
        let record = anomaly_classifier::build_record(
            self.next_anomaly_id,
            frame_number,
            timestamp,
            kind,
            severity(score, self.anomaly_threshold),
        );
        self.next_anomaly_id += 1;
        tracing::debug!(
            frame = frame_number,
            score,
            kind = %kind.label(),
            "Anomaly detected"
        );
        record
    }

    pub fn frames_processed(&self) -> u64 {
        self.aggregator.frames_folded()
    }

    pub fn emotion_strategy(&self) -> &'static str {
        self.emotions.name()
    }

    /// Close the session and build its summary.
    pub fn finish(self, video: &VideoInfo) -> AnalysisSummary {
        let elapsed = self.clock.elapsed_secs();
        let summary = self.aggregator.finalize(video, elapsed);
        tracing::info!(
            frames = summary.total_frames,
            anomalies = summary.anomalies.len(),
            processing_secs = elapsed,
            "Session complete"
        );
        summary
    }
}

/// Motion feature vectors for a frame sequence, for model training.
///
/// Only frame pairs with computed flow contribute; the first frame and any
/// pair whose extraction fails are skipped.
pub fn collect_training_features<I>(
    frames: I,
    detections: &DetectionIndex,
    flow: FlowConfig,
) -> Vec<MotionFeatureVector>
where
    I: IntoIterator<Item = VideoFrame>,
{
    let extractor = MotionFeatureExtractor::new(flow);
    let mut prev: Option<(u64, RgbImage)> = None;
    let mut features = Vec::new();

    for frame in frames {
        // Pairs only span adjacent frames.
        let prev_image = match &prev {
            Some((index, image)) if *index + 1 == frame.index => Some(image),
            _ => None,
        };
        let faces = detections.for_frame(frame.index);
        match extractor.extract(
            frame.index,
            prev_image,
            &frame.image,
            faces.num_faces(),
            faces.avg_face_area(),
        ) {
            Ok(analysis) if analysis.has_motion_data() => features.push(analysis.features),
            Ok(_) => {}
            Err(e) => tracing::warn!(frame = frame.index, error = %e, "Skipping training pair"),
        }
        prev = Some((frame.index, frame.image));
    }

    tracing::debug!(samples = features.len(), "Collected training features");
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::DetectorScoresClassifier;
    use image::Rgb;
    use visage_analysis_model::{FaceBox, FaceObservation};

    fn grey(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([100, 100, 100]))
    }

    fn pipeline(model: Option<&AnomalyModel>) -> SessionPipeline<'_> {
        SessionPipeline::new(
            &AppConfig::default(),
            30.0,
            model,
            Box::new(DetectorScoresClassifier::new(20)),
        )
        .unwrap()
    }

    #[test]
    fn test_first_frame_is_static_without_score() {
        let model = AnomalyModel::train(&[]);
        let mut session = pipeline(Some(&model));
        let outcome = session
            .process_frame(VideoFrame::new(0, grey(32, 24)), &FrameDetections::empty(0))
            .unwrap();
        assert_eq!(outcome.activity, ActivityLevel::Static);
        assert!(outcome.anomaly_score.is_none());
        assert!(outcome.anomaly.is_none());
        assert!(!outcome.analysis.unwrap().has_motion_data());
    }

    #[test]
    fn test_size_change_degrades_to_unknown() {
        let mut session = pipeline(None);
        session
            .process_frame(VideoFrame::new(0, grey(32, 24)), &FrameDetections::empty(0))
            .unwrap();
        let outcome = session
            .process_frame(VideoFrame::new(1, grey(40, 24)), &FrameDetections::empty(1))
            .unwrap();
        assert_eq!(outcome.activity, ActivityLevel::Unknown);
        assert!(outcome.analysis.is_none());
        assert_eq!(session.frames_processed(), 2);
    }

    #[test]
    fn test_repeated_frame_number_is_rejected() {
        let mut session = pipeline(None);
        session
            .process_frame(VideoFrame::new(3, grey(16, 16)), &FrameDetections::empty(3))
            .unwrap();
        let err = session
            .process_frame(VideoFrame::new(3, grey(16, 16)), &FrameDetections::empty(3))
            .unwrap_err();
        assert!(matches!(err, VisageError::FrameOrder { last: 3, got: 3 }));
        assert_eq!(session.frames_processed(), 1);
    }

    #[test]
    fn test_gap_in_frames_restarts_motion() {
        let model = AnomalyModel::train(&[]);
        let mut session = pipeline(Some(&model));
        session
            .process_frame(VideoFrame::new(0, grey(32, 24)), &FrameDetections::empty(0))
            .unwrap();
        let outcome = session
            .process_frame(
                VideoFrame::new(2, RgbImage::from_pixel(32, 24, Rgb([200, 30, 30]))),
                &FrameDetections::empty(2),
            )
            .unwrap();
        assert_eq!(outcome.activity, ActivityLevel::Static);
        assert!(!outcome.analysis.unwrap().has_motion_data());
        assert!(outcome.anomaly_score.is_none());

        let next = session
            .process_frame(VideoFrame::new(3, grey(32, 24)), &FrameDetections::empty(3))
            .unwrap();
        assert!(next.analysis.unwrap().has_motion_data());
        assert!(next.anomaly_score.is_some());
    }

    #[test]
    fn test_invalid_thresholds_abort_setup() {
        let mut config = AppConfig::default();
        config.analysis.activity_threshold_low = 12.0;
        let result = SessionPipeline::new(
            &config,
            30.0,
            None,
            Box::new(DetectorScoresClassifier::new(20)),
        );
        assert!(matches!(
            result.err(),
            Some(VisageError::InvalidThresholdConfig { .. })
        ));
    }

    #[test]
    fn test_faces_and_emotions_reach_summary() {
        let mut session = pipeline(None);
        let detections = FrameDetections {
            frame: 0,
            faces: vec![
                FaceObservation::new(FaceBox::new(0, 0, 24, 24)).with_scores([("happy", 0.9)])
            ],
        };
        session
            .process_frame(VideoFrame::new(0, grey(32, 32)), &detections)
            .unwrap();
        let summary = session.finish(&VideoInfo::new("clip", 1, 30.0, 32, 32));
        assert_eq!(summary.total_faces_detected, 1);
        assert_eq!(
            summary.emotion_distribution[&visage_analysis_model::EmotionLabel::Happy],
            1
        );
    }

    #[test]
    fn test_training_features_skip_first_frame() {
        let frames = (0..4).map(|i| VideoFrame::new(i, grey(24, 24)));
        let features =
            collect_training_features(frames, &DetectionIndex::default(), FlowConfig::default());
        assert_eq!(features.len(), 3);
        assert!(features.iter().all(MotionFeatureVector::is_motionless));
    }

    #[test]
    fn test_training_features_skip_pairs_across_gaps() {
        let frames = [0, 1, 3, 4, 7].map(|i| VideoFrame::new(i, grey(24, 24)));
        let features =
            collect_training_features(frames, &DetectionIndex::default(), FlowConfig::default());
        // Only 0→1 and 3→4 are adjacent.
        assert_eq!(features.len(), 2);
    }
}
