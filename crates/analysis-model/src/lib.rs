//! Visage Analysis Model
//!
//! Defines the data contracts shared by the analysis pipeline and its
//! collaborators:
//! - **Features:** Per-frame motion feature vectors
//! - **Labels:** Activity levels, anomaly types, and emotion labels
//! - **Anomaly:** Immutable anomaly records
//! - **Detections:** Per-frame face/emotion results from external detectors
//! - **Summary:** Per-frame records and the end-of-session summary
//!
//! Every label is a closed enum; adding a variant is a compile-checked change
//! to each `match` that names it.

pub mod anomaly;
pub mod detections;
pub mod features;
pub mod labels;
pub mod summary;

pub use anomaly::*;
pub use detections::*;
pub use features::*;
pub use labels::*;
pub use summary::*;
