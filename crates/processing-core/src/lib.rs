//! Visage Processing Core
//!
//! The sequential analysis pipeline:
//! - **Motion:** dense optical flow between consecutive frames, reduced to a
//!   feature vector
//! - **Activity:** motion intensity mapped to an activity level
//! - **Anomalies:** isolation-forest scoring, labelling, and persistence
//! - **Session:** strictly ordered aggregation into a summary
//!
//! No video decoding and no report formatting happen here. Frames and
//! detections come in as data; summaries go out as data.

pub mod activity;
pub mod aggregator;
pub mod anomaly_classifier;
pub mod anomaly_model;
pub mod emotion;
pub mod flow;
pub mod forest;
pub mod motion;
pub mod pipeline;

pub use activity::ActivityClassifier;
pub use aggregator::SessionAggregator;
pub use anomaly_model::{is_anomaly, severity, AnomalyModel};
pub use emotion::{select_classifier, EmotionClassifier};
pub use motion::{MotionAnalysis, MotionFeatureExtractor, MotionSource};
pub use pipeline::{collect_training_features, FrameOutcome, SessionPipeline, VideoFrame};
