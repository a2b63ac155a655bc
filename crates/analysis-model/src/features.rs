//! Motion feature vectors.

use serde::{Deserialize, Serialize};

/// Number of dimensions the anomaly model sees.
pub const FEATURE_DIM: usize = 5;

/// Per-frame motion summary plus face context.
///
/// Built once per frame pair and never modified afterwards. The magnitude
/// statistics come from the dense flow field; `num_faces` and
/// `avg_face_area` are supplied by the face-detection collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionFeatureVector {
    pub magnitude_mean: f64,
    pub magnitude_std: f64,
    pub magnitude_max: f64,
    pub num_faces: usize,
    pub avg_face_area: f64,
}

impl MotionFeatureVector {
    pub fn new(
        magnitude_mean: f64,
        magnitude_std: f64,
        magnitude_max: f64,
        num_faces: usize,
        avg_face_area: f64,
    ) -> Self {
        Self {
            magnitude_mean,
            magnitude_std,
            magnitude_max,
            num_faces,
            avg_face_area,
        }
    }

    /// Zero motion with the given face context.
    pub fn zero_motion(num_faces: usize, avg_face_area: f64) -> Self {
        Self::new(0.0, 0.0, 0.0, num_faces, avg_face_area)
    }

    /// Whether all three magnitude statistics are exactly zero.
    pub fn is_motionless(&self) -> bool {
        self.magnitude_mean == 0.0 && self.magnitude_std == 0.0 && self.magnitude_max == 0.0
    }

    /// Numeric view in model column order.
    pub fn as_array(&self) -> [f64; FEATURE_DIM] {
        [
            self.magnitude_mean,
            self.magnitude_std,
            self.magnitude_max,
            self.num_faces as f64,
            self.avg_face_area,
        ]
    }
}

impl From<&MotionFeatureVector> for [f64; FEATURE_DIM] {
    fn from(value: &MotionFeatureVector) -> Self {
        value.as_array()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_column_order() {
        let v = MotionFeatureVector::new(1.0, 2.0, 3.0, 4, 5.5);
        assert_eq!(v.as_array(), [1.0, 2.0, 3.0, 4.0, 5.5]);
    }

    #[test]
    fn test_zero_motion_keeps_face_context() {
        let v = MotionFeatureVector::zero_motion(2, 900.0);
        assert!(v.is_motionless());
        assert_eq!(v.num_faces, 2);
        assert_eq!(v.avg_face_area, 900.0);
    }
}
