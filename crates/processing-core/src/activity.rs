//! Activity classification from motion intensity.

use visage_analysis_model::ActivityLevel;
use visage_common::ActivityThresholds;

/// Map mean flow magnitude to an activity level.
///
/// Intervals are closed on the lower bound: `m < low` is `Static`,
/// `low <= m < high` is `ModerateMovement`, `m >= high` is `RapidMovement`.
/// Requires `low < high`; use [`ActivityThresholds`] to have that checked
/// once up front.
pub fn classify(magnitude_mean: f64, threshold_low: f64, threshold_high: f64) -> ActivityLevel {
    if magnitude_mean < threshold_low {
        ActivityLevel::Static
    } else if magnitude_mean < threshold_high {
        ActivityLevel::ModerateMovement
    } else {
        ActivityLevel::RapidMovement
    }
}

/// Activity classifier bound to session thresholds.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityClassifier {
    thresholds: ActivityThresholds,
}

impl ActivityClassifier {
    pub fn new(thresholds: ActivityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn classify(&self, magnitude_mean: f64) -> ActivityLevel {
        classify(magnitude_mean, self.thresholds.low(), self.thresholds.high())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_boundaries_are_closed_below() {
        assert_eq!(classify(1.999, 2.0, 10.0), ActivityLevel::Static);
        assert_eq!(classify(2.0, 2.0, 10.0), ActivityLevel::ModerateMovement);
        assert_eq!(classify(9.999, 2.0, 10.0), ActivityLevel::ModerateMovement);
        assert_eq!(classify(10.0, 2.0, 10.0), ActivityLevel::RapidMovement);
    }

    #[test]
    fn test_zero_motion_is_static() {
        let classifier = ActivityClassifier::default();
        assert_eq!(classifier.classify(0.0), ActivityLevel::Static);
    }

    proptest! {
        #[test]
        fn prop_classify_never_unknown(
            lo in -100.0f64..100.0,
            gap in 0.001f64..100.0,
            m in -500.0f64..500.0,
        ) {
            let hi = lo + gap;
            let level = classify(m, lo, hi);
            prop_assert_ne!(level, ActivityLevel::Unknown);
            let expected = if m < lo {
                ActivityLevel::Static
            } else if m < hi {
                ActivityLevel::ModerateMovement
            } else {
                ActivityLevel::RapidMovement
            };
            prop_assert_eq!(level, expected);
        }

        #[test]
        fn prop_classify_monotone_in_magnitude(
            a in 0.0f64..50.0,
            b in 0.0f64..50.0,
        ) {
            let (small, large) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(classify(small, 2.0, 10.0) <= classify(large, 2.0, 10.0));
        }
    }
}
