//! Analyze a frame sequence and write the session report.

use std::path::PathBuf;

use visage_common::AppConfig;
use visage_processing_core::{select_classifier, AnomalyModel, SessionPipeline};

use crate::frames::{load_detections, FrameSource};
use crate::report;

pub fn run(
    config: AppConfig,
    frames: PathBuf,
    detections: Option<PathBuf>,
    fps: f64,
    use_model: bool,
) -> anyhow::Result<()> {
    println!("Analyzing frames in: {}", frames.display());

    // Configuration problems abort before any frame is touched.
    config
        .analysis
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    let source = FrameSource::open(&frames, fps)?;
    let (width, height) = source.dimensions();
    println!(
        "  {} frames, {width}x{height} @ {}fps",
        source.len(),
        source.fps()
    );

    let detections = load_detections(detections.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load detections: {e}"))?;
    println!("  Detections for {} frames", detections.len());

    let model = if use_model {
        AnomalyModel::load(&config.model_path)
    } else {
        None
    };
    match &model {
        Some(m) => println!(
            "  Anomaly model: {} ({} trees)",
            config.model_path.display(),
            m.n_trees()
        ),
        None => println!("  Anomaly model: none (anomaly detection disabled)"),
    }

    let classifier = select_classifier(
        config.analysis.emotion_strategy,
        detections.has_emotion_scores(),
        config.analysis.min_face_size,
    );
    let mut session = SessionPipeline::new(&config, source.fps(), model.as_ref(), classifier)
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;
    println!("  Emotion strategy: {}", session.emotion_strategy());

    for frame in source.decodable_frames() {
        let frame_detections = detections.for_frame(frame.index);
        session.process_frame(frame, &frame_detections)?;
    }

    let summary = session.finish(&source.video_info());
    let (report_path, summary_path) = report::write_outputs(&summary, &config.output_dir)?;

    println!("  Processed {} frames", summary.total_frames);
    println!("  Faces detected: {}", summary.total_faces_detected);
    println!("  Anomalies: {}", summary.anomalies.len());
    println!("  Report saved to: {}", report_path.display());
    println!("  Summary saved to: {}", summary_path.display());
    println!("\nAnalysis complete.");

    Ok(())
}
