//! Motion feature extraction.
//!
//! Turns a pair of consecutive frames into a [`MotionFeatureVector`]: dense
//! flow between the frames, reduced to the mean, standard deviation, and
//! maximum of the per-pixel displacement magnitude.

use image::{GrayImage, RgbImage};
use visage_analysis_model::MotionFeatureVector;
use visage_common::{FlowConfig, VisageError, VisageResult};

use crate::flow::{dense_flow, FlowField};

/// Where a frame's motion numbers came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionSource {
    /// First frame of a session; nothing to compare against.
    NoPreviousFrame,
    /// Computed from a dense flow field.
    OpticalFlow,
}

/// Motion result for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionAnalysis {
    pub features: MotionFeatureVector,
    pub source: MotionSource,
}

impl MotionAnalysis {
    /// Whether real motion data is available for this frame.
    pub fn has_motion_data(&self) -> bool {
        self.source == MotionSource::OpticalFlow
    }
}

/// Stateless extractor; the caller keeps the previous frame.
#[derive(Debug, Clone, Default)]
pub struct MotionFeatureExtractor {
    flow: FlowConfig,
}

impl MotionFeatureExtractor {
    pub fn new(flow: FlowConfig) -> Self {
        Self { flow }
    }

    /// Extract motion features for `curr`.
    ///
    /// Without a previous frame this returns zero motion tagged
    /// [`MotionSource::NoPreviousFrame`]; no flow is computed. Frames of
    /// different sizes are a [`VisageError::FeatureExtraction`] error.
    /// `frame_number` is only used in error messages.
    pub fn extract(
        &self,
        frame_number: u64,
        prev: Option<&RgbImage>,
        curr: &RgbImage,
        num_faces: usize,
        avg_face_area: f64,
    ) -> VisageResult<MotionAnalysis> {
        let Some(prev) = prev else {
            return Ok(MotionAnalysis {
                features: MotionFeatureVector::zero_motion(num_faces, avg_face_area),
                source: MotionSource::NoPreviousFrame,
            });
        };

        if curr.width() == 0 || curr.height() == 0 {
            return Err(VisageError::feature_extraction(frame_number, "empty frame"));
        }
        if prev.dimensions() != curr.dimensions() {
            return Err(VisageError::feature_extraction(
                frame_number,
                format!(
                    "frame size changed from {}x{} to {}x{}",
                    prev.width(),
                    prev.height(),
                    curr.width(),
                    curr.height()
                ),
            ));
        }

        let flow = self.flow_between(prev, curr);
        let (mean, std, max) = magnitude_stats(&flow);

        Ok(MotionAnalysis {
            features: MotionFeatureVector::new(mean, std, max, num_faces, avg_face_area),
            source: MotionSource::OpticalFlow,
        })
    }

    /// Dense flow field between two equally sized frames.
    pub fn flow_between(&self, prev: &RgbImage, curr: &RgbImage) -> FlowField {
        dense_flow(&to_intensity(prev), &to_intensity(curr), &self.flow)
    }
}

fn to_intensity(frame: &RgbImage) -> GrayImage {
    image::imageops::grayscale(frame)
}

/// Mean, population standard deviation, and max of vector magnitudes.
fn magnitude_stats(flow: &FlowField) -> (f64, f64, f64) {
    let n = flow.vectors().len();
    if n == 0 {
        return (0.0, 0.0, 0.0);
    }

    let (sum, max) = flow
        .magnitudes()
        .fold((0.0, 0.0_f64), |(sum, max), m| (sum + m, max.max(m)));
    let mean = sum / n as f64;
    let variance = flow.magnitudes().map(|m| (m - mean).powi(2)).sum::<f64>() / n as f64;

    (mean, variance.sqrt(), max)
}
