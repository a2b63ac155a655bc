//! Anomaly taxonomy.

use visage_analysis_model::{Anomaly, AnomalyType, MotionFeatureVector};

/// Peak displacement (pixels) above which motion counts as sudden.
pub const SUDDEN_MOVEMENT_MAX: f64 = 20.0;

/// Mean displacement (pixels) above which motion counts as irregular.
pub const IRREGULAR_PATTERN_MEAN: f64 = 15.0;

/// Label a flagged frame.
///
/// Face-count changes win over motion: more faces is `FaceAppearance`,
/// fewer is `FaceDisappearance`, then a large peak is `SuddenMovement`, a
/// large mean `IrregularPattern`, and anything else `Unknown`.
pub fn classify(
    features: &MotionFeatureVector,
    prev_num_faces: usize,
    curr_num_faces: usize,
) -> AnomalyType {
    if curr_num_faces > prev_num_faces {
        AnomalyType::FaceAppearance
    } else if curr_num_faces < prev_num_faces {
        AnomalyType::FaceDisappearance
    } else if features.magnitude_max > SUDDEN_MOVEMENT_MAX {
        AnomalyType::SuddenMovement
    } else if features.magnitude_mean > IRREGULAR_PATTERN_MEAN {
        AnomalyType::IrregularPattern
    } else {
        AnomalyType::Unknown
    }
}

/// Build the immutable record for a flagged frame.
pub fn build_record(
    anomaly_id: u64,
    frame_number: u64,
    timestamp: f64,
    anomaly_type: AnomalyType,
    severity: f64,
) -> Anomaly {
    Anomaly::new(anomaly_id, frame_number, timestamp, anomaly_type, severity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn motion(mean: f64, max: f64) -> MotionFeatureVector {
        MotionFeatureVector::new(mean, 1.0, max, 1, 100.0)
    }

    #[test]
    fn test_priority_order() {
        assert_eq!(classify(&motion(30.0, 40.0), 1, 2), AnomalyType::FaceAppearance);
        assert_eq!(classify(&motion(30.0, 40.0), 2, 1), AnomalyType::FaceDisappearance);
        assert_eq!(classify(&motion(30.0, 40.0), 1, 1), AnomalyType::SuddenMovement);
        assert_eq!(classify(&motion(16.0, 20.0), 1, 1), AnomalyType::IrregularPattern);
        assert_eq!(classify(&motion(15.0, 20.0), 1, 1), AnomalyType::Unknown);
    }

    #[test]
    fn test_record_description() {
        let record = build_record(1, 12, 0.4, AnomalyType::FaceAppearance, 0.25);
        assert_eq!(record.description, "Face Appearance detected at frame 12");
        assert_eq!(record.severity, 0.25);
    }

    proptest! {
        #[test]
        fn prop_face_increase_always_wins(
            mean in 0.0f64..100.0,
            std in 0.0f64..50.0,
            max in 0.0f64..200.0,
            prev in 0usize..5,
            extra in 1usize..5,
        ) {
            let v = MotionFeatureVector::new(mean, std, max, prev + extra, 0.0);
            prop_assert_eq!(classify(&v, prev, prev + extra), AnomalyType::FaceAppearance);
        }
    }
}
