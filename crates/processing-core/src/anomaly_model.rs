//! Trainable anomaly model with best-effort persistence.
//!
//! The model is an isolation forest over [`MotionFeatureVector`] rows. It is
//! immutable once trained or loaded; callers own it and lend it to sessions.
//!
//! On disk the model is a bincode blob: a small header (magic, format
//! version) followed by the forest. Loading and saving never fail loudly: a
//! missing or unreadable file means "no model", a failed write means `false`.

use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use visage_analysis_model::MotionFeatureVector;
use visage_common::{AnomalyThreshold, VisageError, VisageResult};

use crate::forest::{percentile, ForestParams, IsolationForest, Row};

/// Below this many usable samples the model trains on synthetic data.
pub const MIN_TRAINING_SAMPLES: usize = 10;

/// Expected share of outliers in the training data.
pub const CONTAMINATION: f64 = 0.1;

/// Seed for sub-sampling, split selection, and the synthetic fallback.
pub const RANDOM_SEED: u64 = 42;

const FALLBACK_SAMPLES: usize = 100;

const MODEL_MAGIC: [u8; 8] = *b"VISAGEIF";
const MODEL_FORMAT_VERSION: u32 = 1;

/// Fitted outlier-scoring model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyModel {
    forest: IsolationForest,
    /// Training-score percentile at [`CONTAMINATION`].
    decision_offset: f64,
    training_samples: usize,
    synthetic: bool,
}

#[derive(Serialize, Deserialize)]
struct ModelEnvelope {
    magic: [u8; 8],
    version: u32,
    model: AnomalyModel,
}

impl AnomalyModel {
    /// Fit a model on observed feature vectors.
    ///
    /// Rows with non-finite values are dropped. With fewer than
    /// [`MIN_TRAINING_SAMPLES`] usable rows the model is fit on standard
    /// normal noise instead and a warning is logged. Never fails; the same
    /// input always yields the same model.
    pub fn train(samples: &[MotionFeatureVector]) -> Self {
        let rows: Vec<Row> = samples
            .iter()
            .map(MotionFeatureVector::as_array)
            .filter(|row| row.iter().all(|v| v.is_finite()))
            .collect();
        if rows.len() < samples.len() {
            tracing::warn!(
                dropped = samples.len() - rows.len(),
                "Dropped training samples with non-finite values"
            );
        }

        let mut rng = StdRng::seed_from_u64(RANDOM_SEED);
        match Self::fit_rows(&rows, &mut rng) {
            Ok(model) => {
                tracing::info!(
                    samples = model.training_samples,
                    offset = model.decision_offset,
                    "Trained anomaly model"
                );
                model
            }
            Err(e) => {
                tracing::warn!(error = %e, "Falling back to synthetic training data");
                let mut rng = StdRng::seed_from_u64(RANDOM_SEED);
                let (forest, noise) = IsolationForest::fit_standard_normal(
                    FALLBACK_SAMPLES,
                    ForestParams::default(),
                    &mut rng,
                );
                Self::from_forest(forest, &noise, true)
            }
        }
    }

    fn fit_rows(rows: &[Row], rng: &mut StdRng) -> VisageResult<Self> {
        if rows.len() < MIN_TRAINING_SAMPLES {
            return Err(VisageError::model_train(format!(
                "need at least {MIN_TRAINING_SAMPLES} samples, got {}",
                rows.len()
            )));
        }
        let forest = IsolationForest::fit(rows, ForestParams::default(), rng)
            .ok_or_else(|| VisageError::model_train("forest could not be fit"))?;
        Ok(Self::from_forest(forest, rows, false))
    }

    fn from_forest(forest: IsolationForest, rows: &[Row], synthetic: bool) -> Self {
        let scores: Vec<f64> = rows.iter().map(|r| forest.score(r)).collect();
        Self {
            decision_offset: percentile(&scores, CONTAMINATION * 100.0),
            training_samples: rows.len(),
            synthetic,
            forest,
        }
    }

    /// Outlier score in `[-1, 0)`; higher is more normal.
    pub fn score(&self, features: &MotionFeatureVector) -> f64 {
        self.forest.score(&features.as_array())
    }

    /// Score below which the training data's most unusual tenth falls.
    pub fn decision_offset(&self) -> f64 {
        self.decision_offset
    }

    pub fn training_samples(&self) -> usize {
        self.training_samples
    }

    /// Whether the model was fit on synthetic noise.
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    pub fn n_trees(&self) -> usize {
        self.forest.n_trees()
    }

    pub fn sample_size(&self) -> usize {
        self.forest.sample_size()
    }

    /// Load a persisted model.
    ///
    /// A missing file yields `None`. An unreadable or invalid file is logged
    /// as an error and also yields `None`.
    pub fn load(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "No saved anomaly model");
            return None;
        }

        match Self::read(path) {
            Ok(model) => {
                tracing::info!(
                    path = %path.display(),
                    samples = model.training_samples,
                    "Loaded anomaly model"
                );
                Some(model)
            }
            Err(e) => {
                tracing::error!(error = %e, "Ignoring saved anomaly model");
                None
            }
        }
    }

    /// Read and validate a model file, reporting why it cannot be used.
    pub fn read(path: &Path) -> VisageResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| VisageError::model_load(path, e.to_string()))?;
        let envelope: ModelEnvelope =
            bincode::deserialize(&bytes).map_err(|e| VisageError::model_load(path, e.to_string()))?;

        if envelope.magic != MODEL_MAGIC {
            return Err(VisageError::model_load(path, "not an anomaly model file"));
        }
        if envelope.version != MODEL_FORMAT_VERSION {
            return Err(VisageError::model_load(
                path,
                format!(
                    "unsupported model format version {} (expected {MODEL_FORMAT_VERSION})",
                    envelope.version
                ),
            ));
        }

        let model = envelope.model;
        if !model.forest.is_well_formed() || !model.decision_offset.is_finite() {
            return Err(VisageError::model_load(path, "model structure is corrupt"));
        }
        Ok(model)
    }

    /// Persist the model, creating parent directories as needed.
    ///
    /// Failures are logged and reported as `false`.
    pub fn save(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match self.write(path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Saved anomaly model");
                true
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to save anomaly model");
                false
            }
        }
    }

    fn write(&self, path: &Path) -> VisageResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let envelope = ModelEnvelope {
            magic: MODEL_MAGIC,
            version: MODEL_FORMAT_VERSION,
            model: self.clone(),
        };
        let bytes = bincode::serialize(&envelope).map_err(|e| anyhow::anyhow!(e))?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

/// `score < threshold`.
pub fn is_anomaly(score: f64, threshold: AnomalyThreshold) -> bool {
    score < threshold.value()
}

/// How far below the threshold a score sits, relative to the threshold,
/// clamped to `[0, 1]`.
pub fn severity(score: f64, threshold: AnomalyThreshold) -> f64 {
    let t = threshold.value();
    let raw = (t - score) / t.abs();
    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(0.0, 1.0)
}
