use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;

use visage_analysis_model::{
    ActivityLevel, AnalysisSummary, AnomalyType, FaceBox, FaceObservation, FrameDetections,
    MotionFeatureVector, VideoInfo,
};
use visage_common::AppConfig;
use visage_processing_core::anomaly_classifier;
use visage_processing_core::emotion::DetectorScoresClassifier;
use visage_processing_core::{AnomalyModel, FrameOutcome, SessionPipeline, VideoFrame};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;

/// Checkerboard with a light disc, shifted `dx` pixels to the right.
fn scene(dx: i32) -> RgbImage {
    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([40, 40, 40]));
    for row in 0..(HEIGHT as i32 / 8) {
        for col in -1..(WIDTH as i32 / 8 + 1) {
            if (row + col) % 2 == 0 {
                draw_filled_rect_mut(
                    &mut img,
                    Rect::at(col * 8 + dx, row * 8).of_size(8, 8),
                    Rgb([200, 200, 200]),
                );
            }
        }
    }
    draw_filled_circle_mut(&mut img, (24 + dx, 20), 6, Rgb([255, 230, 180]));
    img
}

fn faces(frame: u64, count: usize) -> FrameDetections {
    FrameDetections {
        frame,
        faces: (0..count)
            .map(|i| FaceObservation::new(FaceBox::new(4 + 30 * i as u32, 4, 24, 24)))
            .collect(),
    }
}

fn run_session(
    config: &AppConfig,
    model: Option<&AnomalyModel>,
    frames: Vec<(RgbImage, FrameDetections)>,
) -> AnalysisSummary {
    run_session_with_outcomes(config, model, frames).1
}

fn run_session_with_outcomes(
    config: &AppConfig,
    model: Option<&AnomalyModel>,
    frames: Vec<(RgbImage, FrameDetections)>,
) -> (Vec<FrameOutcome>, AnalysisSummary) {
    let total = frames.len() as u64;
    let mut session = SessionPipeline::new(
        config,
        30.0,
        model,
        Box::new(DetectorScoresClassifier::new(20)),
    )
    .expect("default config is valid");

    let outcomes = frames
        .into_iter()
        .enumerate()
        .map(|(index, (image, detections))| {
            session
                .process_frame(VideoFrame::new(index as u64, image), &detections)
                .expect("frames arrive in order")
        })
        .collect();
    let summary = session.finish(&VideoInfo::new("synthetic", total, 30.0, WIDTH, HEIGHT));
    (outcomes, summary)
}

#[test]
fn identical_frames_are_static_without_anomalies() {
    let frames = (0..3).map(|i| (scene(0), faces(i, 0))).collect();
    let summary = run_session(&AppConfig::default(), None, frames);

    assert_eq!(summary.total_frames, 3);
    assert_eq!(summary.activity_distribution.len(), 1);
    assert_eq!(summary.activity_count(ActivityLevel::Static), 3);
    assert!(summary.anomalies.is_empty());
    assert!(summary.emotion_distribution.is_empty());
    assert!((summary.duration - 0.1).abs() < 1e-12);
}

#[test]
fn identical_frames_score_below_the_default_flag() {
    let config = AppConfig::default();
    let model = AnomalyModel::train(&[]);
    let frames = (0..3).map(|i| (scene(0), faces(i, 0))).collect();
    let (outcomes, summary) = run_session_with_outcomes(&config, Some(&model), frames);

    assert_eq!(outcomes[0].anomaly_score, None);
    for outcome in &outcomes[1..] {
        let score = outcome.anomaly_score.expect("still frames are scored");
        assert!(score >= config.analysis.anomaly_threshold, "score = {score}");
        assert!(outcome.anomaly.is_none());
    }
    assert_eq!(summary.activity_count(ActivityLevel::Static), 3);
    assert!(summary.anomalies.is_empty());
}

#[test]
fn face_count_changes_drive_anomaly_type() {
    // A positive threshold flags every scored frame.
    let mut config = AppConfig::default();
    config.analysis.anomaly_threshold = 0.5;
    let model = AnomalyModel::train(&[]);

    let frames = vec![
        (scene(0), faces(0, 0)),
        (scene(0), faces(1, 1)),
        (scene(0), faces(2, 1)),
    ];
    let summary = run_session(&config, Some(&model), frames);

    assert_eq!(summary.anomalies.len(), 2);
    let first = &summary.anomalies[0];
    assert_eq!(first.anomaly_id, 1);
    assert_eq!(first.frame_number, 1);
    assert_eq!(first.anomaly_type, AnomalyType::FaceAppearance);
    assert_eq!(first.severity, 1.0);
    assert_eq!(first.description, "Face Appearance detected at frame 1");

    let second = &summary.anomalies[1];
    assert_eq!(second.anomaly_id, 2);
    assert_eq!(second.anomaly_type, AnomalyType::Unknown);
    assert_eq!(summary.total_faces_detected, 2);
}

#[test]
fn classifier_matches_face_sequence() {
    let still = MotionFeatureVector::zero_motion(1, 576.0);
    assert_eq!(
        anomaly_classifier::classify(&still, 0, 1),
        AnomalyType::FaceAppearance
    );
    assert_eq!(anomaly_classifier::classify(&still, 1, 1), AnomalyType::Unknown);
}

#[test]
fn shifted_scene_produces_motion() {
    let frames = vec![
        (scene(0), faces(0, 0)),
        (scene(2), faces(1, 0)),
        (scene(4), faces(2, 0)),
    ];
    let mut session = SessionPipeline::new(
        &AppConfig::default(),
        30.0,
        None,
        Box::new(DetectorScoresClassifier::new(20)),
    )
    .unwrap();

    let mut means = Vec::new();
    for (index, (image, detections)) in frames.into_iter().enumerate() {
        let outcome = session
            .process_frame(VideoFrame::new(index as u64, image), &detections)
            .unwrap();
        let analysis = outcome.analysis.expect("same-size frames always analyze");
        means.push(analysis.features.magnitude_mean);
        assert_ne!(outcome.activity, ActivityLevel::Unknown);
    }

    assert_eq!(means[0], 0.0);
    assert!(means[1] > 0.0);
    assert!(means[2] > 0.0);
}

#[test]
fn corrupt_model_file_still_completes_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("anomaly_model.bin");
    std::fs::write(&path, [0xde, 0xad, 0xbe, 0xef]).unwrap();

    let model = AnomalyModel::load(&path);
    assert!(model.is_none());

    let frames = (0..3).map(|i| (scene(i as i32), faces(i, 1))).collect();
    let summary = run_session(&AppConfig::default(), model.as_ref(), frames);
    assert_eq!(summary.total_frames, 3);
    assert!(summary.anomalies.is_empty());
}

#[test]
fn sessions_are_deterministic() {
    let mut config = AppConfig::default();
    config.analysis.anomaly_threshold = -0.45;
    let model = AnomalyModel::train(&[]);

    let build = || {
        (0..4u64)
            .map(|i| (scene(i as i32 * 3), faces(i, (i % 2) as usize)))
            .collect::<Vec<_>>()
    };
    let a = run_session(&config, Some(&model), build());
    let b = run_session(&config, Some(&model), build());

    assert_eq!(a.activity_distribution, b.activity_distribution);
    assert_eq!(a.anomalies, b.anomalies);
    assert_eq!(a.total_faces_detected, b.total_faces_detected);
}
