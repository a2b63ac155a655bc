//! Anomaly records.

use serde::{Deserialize, Serialize};

use crate::labels::AnomalyType;

/// A detected anomaly. Built once, never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    /// Monotonic, unique within a session.
    pub anomaly_id: u64,
    pub frame_number: u64,
    /// Seconds since the start of the stream.
    pub timestamp: f64,
    pub anomaly_type: AnomalyType,
    /// In `[0.0, 1.0]`; higher is more severe.
    pub severity: f64,
    pub description: String,
}

impl Anomaly {
    /// Build a record with the standard description
    /// `"<type label> detected at frame <frame_number>"`.
    pub fn new(
        anomaly_id: u64,
        frame_number: u64,
        timestamp: f64,
        anomaly_type: AnomalyType,
        severity: f64,
    ) -> Self {
        Self {
            anomaly_id,
            frame_number,
            timestamp,
            anomaly_type,
            severity: severity.clamp(0.0, 1.0),
            description: format!("{} detected at frame {}", anomaly_type.label(), frame_number),
        }
    }
}
