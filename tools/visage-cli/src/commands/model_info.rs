//! Show a saved anomaly model.

use std::path::PathBuf;

use visage_processing_core::AnomalyModel;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let model = AnomalyModel::read(&path).map_err(|e| anyhow::anyhow!("{e}"))?;

    println!("Anomaly model: {}", path.display());
    println!("  Trees: {}", model.n_trees());
    println!("  Sub-sample size: {}", model.sample_size());
    println!("  Training samples: {}", model.training_samples());
    println!("  Synthetic training data: {}", model.is_synthetic());
    println!("  Decision offset: {:.4}", model.decision_offset());

    Ok(())
}
