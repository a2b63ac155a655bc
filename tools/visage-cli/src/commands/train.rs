//! Train the anomaly model from a frame sequence.

use std::path::PathBuf;

use visage_common::{AppConfig, FALLBACK_FPS};
use visage_processing_core::{collect_training_features, AnomalyModel};

use crate::frames::{load_detections, FrameSource};

pub fn run(
    config: AppConfig,
    frames: PathBuf,
    detections: Option<PathBuf>,
    output: PathBuf,
) -> anyhow::Result<()> {
    println!("Training anomaly model from: {}", frames.display());

    config
        .analysis
        .flow
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    let source = FrameSource::open(&frames, FALLBACK_FPS)?;
    let detections = load_detections(detections.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load detections: {e}"))?;

    let features =
        collect_training_features(source.decodable_frames(), &detections, config.analysis.flow);
    println!("  Extracted {} feature vectors", features.len());

    let model = AnomalyModel::train(&features);
    if model.is_synthetic() {
        println!("  Too few samples; model was fit on synthetic data");
    }

    if !model.save(&output) {
        anyhow::bail!("Failed to save model to {}", output.display());
    }
    println!("  Model saved to: {}", output.display());
    println!("  Decision offset: {:.4}", model.decision_offset());

    Ok(())
}
