//! Error types shared across Visage crates.

use std::path::PathBuf;

/// Top-level error type for Visage operations.
#[derive(Debug, thiserror::Error)]
pub enum VisageError {
    /// A persisted anomaly model exists but cannot be turned into a model.
    #[error("Failed to load anomaly model from {path}: {message}")]
    ModelLoad { path: PathBuf, message: String },

    /// Training data was insufficient or malformed.
    #[error("Anomaly model training error: {message}")]
    ModelTrain { message: String },

    /// Thresholds that cannot drive a session (non-monotonic, zero, NaN).
    #[error("Invalid threshold configuration: {message}")]
    InvalidThresholdConfig { message: String },

    /// Motion could not be computed for a frame pair.
    #[error("Feature extraction failed at frame {frame_number}: {message}")]
    FeatureExtraction { frame_number: u64, message: String },

    /// Frames were folded out of sequence.
    #[error("Frame {got} arrived after frame {last}; frames must be strictly increasing")]
    FrameOrder { last: u64, got: u64 },

    #[error("Detections error: {message}")]
    Detections { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using VisageError.
pub type VisageResult<T> = Result<T, VisageError>;

impl VisageError {
    pub fn model_load(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::ModelLoad {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn model_train(msg: impl Into<String>) -> Self {
        Self::ModelTrain {
            message: msg.into(),
        }
    }

    pub fn invalid_thresholds(msg: impl Into<String>) -> Self {
        Self::InvalidThresholdConfig {
            message: msg.into(),
        }
    }

    pub fn feature_extraction(frame_number: u64, msg: impl Into<String>) -> Self {
        Self::FeatureExtraction {
            frame_number,
            message: msg.into(),
        }
    }

    pub fn detections(msg: impl Into<String>) -> Self {
        Self::Detections {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether the session can carry on after this error.
    ///
    /// Configuration problems abort a session before the first frame;
    /// everything else is handled per frame or per model operation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidThresholdConfig { .. } | Self::Config { .. } | Self::FrameOrder { .. }
        )
    }
}
