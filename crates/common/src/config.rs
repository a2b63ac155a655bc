//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{VisageError, VisageResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where the anomaly model is persisted between sessions.
    pub model_path: PathBuf,

    /// Directory for reports and JSON summaries.
    pub output_dir: PathBuf,

    /// Emit a progress line every N frames (0 disables).
    pub log_every_n_frames: u64,

    /// Per-session analysis parameters.
    pub analysis: AnalysisConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Numeric policy for the motion/anomaly pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Mean flow magnitude below which a frame is `Static`.
    pub activity_threshold_low: f64,

    /// Mean flow magnitude at or above which a frame is `RapidMovement`.
    pub activity_threshold_high: f64,

    /// Model scores below this value are anomalies. Must be non-zero.
    pub anomaly_threshold: f64,

    /// Dense optical flow parameters.
    pub flow: FlowConfig,

    /// How per-face emotions are obtained.
    pub emotion_strategy: EmotionStrategy,

    /// Faces narrower or shorter than this (pixels) get the neutral fallback.
    pub min_face_size: u32,
}

/// Parameters of the multi-scale polynomial-expansion flow estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Scale between consecutive pyramid levels, in `(0, 1)`.
    pub pyr_scale: f64,
    /// Number of pyramid levels including the full-resolution one.
    pub levels: usize,
    /// Averaging window (pixels) for the displacement solve.
    pub win_size: usize,
    /// Refinement iterations per pyramid level.
    pub iterations: usize,
    /// Neighbourhood size for the polynomial fit (odd).
    pub poly_n: usize,
    /// Gaussian weighting of the polynomial fit.
    pub poly_sigma: f64,
}

/// Emotion classification strategy, chosen once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmotionStrategy {
    /// Use scores reported by the external emotion library.
    Library,
    /// Estimate from the face crop's intensity statistics.
    Heuristic,
    /// Library when the detections carry scores, heuristic otherwise.
    #[default]
    Auto,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "visage=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models").join("anomaly_model.bin"),
            output_dir: PathBuf::from("outputs"),
            log_every_n_frames: 30,
            analysis: AnalysisConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            activity_threshold_low: 2.0,
            activity_threshold_high: 10.0,
            anomaly_threshold: -0.5,
            flow: FlowConfig::default(),
            emotion_strategy: EmotionStrategy::Auto,
            min_face_size: 20,
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            pyr_scale: 0.5,
            levels: 3,
            win_size: 15,
            iterations: 3,
            poly_n: 5,
            poly_sigma: 1.2,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

/// Activity thresholds that are known to satisfy `low < high`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivityThresholds {
    low: f64,
    high: f64,
}

impl ActivityThresholds {
    pub fn new(low: f64, high: f64) -> VisageResult<Self> {
        if !low.is_finite() || !high.is_finite() {
            return Err(VisageError::invalid_thresholds(format!(
                "activity thresholds must be finite (low={low}, high={high})"
            )));
        }
        if low >= high {
            return Err(VisageError::invalid_thresholds(format!(
                "activity threshold low ({low}) must be below high ({high})"
            )));
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }
}

impl Default for ActivityThresholds {
    fn default() -> Self {
        Self {
            low: 2.0,
            high: 10.0,
        }
    }
}

/// Anomaly score threshold, guaranteed finite and non-zero.
///
/// Severity divides by `|threshold|`, so zero is rejected here rather than
/// producing infinities later.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyThreshold(f64);

impl AnomalyThreshold {
    pub fn new(value: f64) -> VisageResult<Self> {
        if !value.is_finite() || value == 0.0 {
            return Err(VisageError::invalid_thresholds(format!(
                "anomaly threshold must be finite and non-zero (got {value})"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for AnomalyThreshold {
    fn default() -> Self {
        Self(-0.5)
    }
}

/// Thresholds checked once at session setup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatedThresholds {
    pub activity: ActivityThresholds,
    pub anomaly: AnomalyThreshold,
}

impl AnalysisConfig {
    /// Check every numeric precondition of a session.
    ///
    /// Call before the first frame; any error here is fatal for the session.
    pub fn validate(&self) -> VisageResult<ValidatedThresholds> {
        let activity =
            ActivityThresholds::new(self.activity_threshold_low, self.activity_threshold_high)?;
        let anomaly = AnomalyThreshold::new(self.anomaly_threshold)?;
        self.flow.validate()?;
        Ok(ValidatedThresholds { activity, anomaly })
    }
}

impl FlowConfig {
    pub fn validate(&self) -> VisageResult<()> {
        if !(self.pyr_scale > 0.0 && self.pyr_scale < 1.0) {
            return Err(VisageError::config(format!(
                "flow.pyr_scale must be in (0, 1), got {}",
                self.pyr_scale
            )));
        }
        if self.levels == 0 || self.iterations == 0 || self.win_size == 0 {
            return Err(VisageError::config(
                "flow.levels, flow.iterations and flow.win_size must be at least 1",
            ));
        }
        if self.poly_n < 3 || self.poly_n % 2 == 0 {
            return Err(VisageError::config(format!(
                "flow.poly_n must be an odd number >= 3, got {}",
                self.poly_n
            )));
        }
        if !(self.poly_sigma > 0.0) {
            return Err(VisageError::config(format!(
                "flow.poly_sigma must be positive, got {}",
                self.poly_sigma
            )));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path. Unlike [`AppConfig::load`], errors
    /// are returned to the caller.
    pub fn load_from(path: impl AsRef<Path>) -> VisageResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VisageError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save config to an explicit path, creating parent directories.
    pub fn save_to(&self, path: impl AsRef<Path>) -> VisageResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("visage").join("config.json")
}
