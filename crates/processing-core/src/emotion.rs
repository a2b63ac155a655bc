//! Emotion classification strategies.
//!
//! Two interchangeable strategies sit behind [`EmotionClassifier`]:
//! [`DetectorScoresClassifier`] reads the per-face scores the external
//! emotion library wrote into the detections sidecar, and
//! [`IntensityHeuristicClassifier`] guesses from the pixels of the face crop
//! when no library output exists. A session picks one up front with
//! [`select_classifier`] and keeps it.

use std::collections::{BTreeMap, HashMap};

use image::RgbImage;
use visage_analysis_model::{EmotionClassification, EmotionLabel, FaceObservation};
use visage_common::EmotionStrategy;

/// Per-face emotion classifier.
pub trait EmotionClassifier {
    /// Short name for logs and reports.
    fn name(&self) -> &'static str;

    /// Classify one face of `frame`.
    fn classify(&self, frame: &RgbImage, face: &FaceObservation) -> EmotionClassification;

    /// Classify every face in order.
    fn classify_all(&self, frame: &RgbImage, faces: &[FaceObservation]) -> Vec<EmotionClassification> {
        faces.iter().map(|face| self.classify(frame, face)).collect()
    }
}

fn too_small(face: &FaceObservation, min_face_size: u32) -> bool {
    face.bbox.w < min_face_size || face.bbox.h < min_face_size
}

/// Uses emotion-library scores carried on each observation.
#[derive(Debug, Clone)]
pub struct DetectorScoresClassifier {
    min_face_size: u32,
}

impl DetectorScoresClassifier {
    pub fn new(min_face_size: u32) -> Self {
        Self { min_face_size }
    }

    /// Map raw library scores onto known labels.
    ///
    /// Unknown names are ignored. Percent-scale scores (any value above 1)
    /// are rescaled to `[0, 1]`.
    fn probabilities(scores: &HashMap<String, f64>) -> BTreeMap<EmotionLabel, f64> {
        let percent_scale = scores.values().any(|v| *v > 1.0);
        scores
            .iter()
            .filter(|(_, v)| v.is_finite())
            .filter_map(|(name, value)| match name.parse::<EmotionLabel>() {
                Ok(label) => Some((label, *value)),
                Err(e) => {
                    tracing::debug!(error = %e, "Ignoring emotion score");
                    None
                }
            })
            .map(|(label, value)| {
                let value = if percent_scale { value / 100.0 } else { value };
                (label, value.clamp(0.0, 1.0))
            })
            .collect()
    }
}

impl EmotionClassifier for DetectorScoresClassifier {
    fn name(&self) -> &'static str {
        "library"
    }

    fn classify(&self, _frame: &RgbImage, face: &FaceObservation) -> EmotionClassification {
        if too_small(face, self.min_face_size) {
            return EmotionClassification::neutral_fallback();
        }
        face.emotion_scores
            .as_ref()
            .map(Self::probabilities)
            .and_then(EmotionClassification::from_probabilities)
            .unwrap_or_else(EmotionClassification::neutral_fallback)
    }
}

/// Coarse intensity statistics of a face crop, all in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CropStats {
    brightness: f64,
    contrast: f64,
    /// Upper-half mean minus lower-half mean, divided by 255.
    balance: f64,
}

impl CropStats {
    fn measure(frame: &RgbImage, face: &FaceObservation) -> Option<Self> {
        let x0 = face.bbox.x.min(frame.width());
        let y0 = face.bbox.y.min(frame.height());
        let x1 = face.bbox.x.saturating_add(face.bbox.w).min(frame.width());
        let y1 = face.bbox.y.saturating_add(face.bbox.h).min(frame.height());
        if x1 <= x0 || y1 - y0 < 2 {
            return None;
        }

        let mid = y0 + (y1 - y0) / 2;
        let (mut sum, mut sum_sq, mut count) = (0.0, 0.0, 0.0);
        let (mut upper, mut upper_n, mut lower, mut lower_n) = (0.0, 0.0, 0.0, 0.0);
        for y in y0..y1 {
            for x in x0..x1 {
                let [r, g, b] = frame.get_pixel(x, y).0;
                let luma = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
                sum += luma;
                sum_sq += luma * luma;
                count += 1.0;
                if y < mid {
                    upper += luma;
                    upper_n += 1.0;
                } else {
                    lower += luma;
                    lower_n += 1.0;
                }
            }
        }

        let mean = sum / count;
        let std = (sum_sq / count - mean * mean).max(0.0).sqrt();
        Some(Self {
            brightness: mean / 255.0,
            contrast: (std / 128.0).min(1.0),
            balance: (upper / upper_n - lower / lower_n) / 255.0,
        })
    }

    /// Label and how strongly the stats point at it, `0..=1`.
    fn verdict(&self) -> (EmotionLabel, f64) {
        if self.contrast >= 0.35 {
            (EmotionLabel::Surprise, (self.contrast - 0.35) / 0.65)
        } else if self.brightness >= 0.6 {
            (EmotionLabel::Happy, (self.brightness - 0.6) / 0.4)
        } else if self.brightness <= 0.3 {
            (EmotionLabel::Sad, (0.3 - self.brightness) / 0.3)
        } else if self.balance.abs() >= 0.15 {
            (EmotionLabel::Angry, (self.balance.abs() - 0.15) / 0.85)
        } else {
            (EmotionLabel::Neutral, 1.0 - self.balance.abs() / 0.15)
        }
    }
}

/// Pixel-statistics guess used when no emotion library output exists.
///
/// Confidence never exceeds 0.6; this is a weak signal.
#[derive(Debug, Clone)]
pub struct IntensityHeuristicClassifier {
    min_face_size: u32,
}

impl IntensityHeuristicClassifier {
    const BASE_CONFIDENCE: f64 = 0.4;
    const MAX_BOOST: f64 = 0.2;

    pub fn new(min_face_size: u32) -> Self {
        Self { min_face_size }
    }
}

impl EmotionClassifier for IntensityHeuristicClassifier {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn classify(&self, frame: &RgbImage, face: &FaceObservation) -> EmotionClassification {
        if too_small(face, self.min_face_size) {
            return EmotionClassification::neutral_fallback();
        }
        let Some(stats) = CropStats::measure(frame, face) else {
            return EmotionClassification::neutral_fallback();
        };

        let (label, strength) = stats.verdict();
        let confidence = Self::BASE_CONFIDENCE + Self::MAX_BOOST * strength.clamp(0.0, 1.0);
        let rest = (1.0 - confidence) / (EmotionLabel::ALL.len() - 1) as f64;
        let probabilities = EmotionLabel::ALL
            .iter()
            .map(|l| (*l, if *l == label { confidence } else { rest }))
            .collect();

        EmotionClassification {
            label,
            confidence,
            probabilities,
        }
    }
}

/// Resolve the configured strategy once for a session.
///
/// `Auto` uses the library scores when the detections carry any.
pub fn select_classifier(
    strategy: EmotionStrategy,
    detections_have_scores: bool,
    min_face_size: u32,
) -> Box<dyn EmotionClassifier> {
    let classifier: Box<dyn EmotionClassifier> = match strategy {
        EmotionStrategy::Library => Box::new(DetectorScoresClassifier::new(min_face_size)),
        EmotionStrategy::Heuristic => Box::new(IntensityHeuristicClassifier::new(min_face_size)),
        EmotionStrategy::Auto if detections_have_scores => {
            Box::new(DetectorScoresClassifier::new(min_face_size))
        }
        EmotionStrategy::Auto => Box::new(IntensityHeuristicClassifier::new(min_face_size)),
    };

    if strategy == EmotionStrategy::Library && !detections_have_scores {
        tracing::warn!("Emotion library strategy selected but detections carry no scores");
    }
    tracing::info!(strategy = classifier.name(), "Emotion classifier selected");
    classifier
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use visage_analysis_model::FaceBox;

    fn face(w: u32, h: u32) -> FaceObservation {
        FaceObservation::new(FaceBox::new(0, 0, w, h))
    }

    #[test]
    fn test_library_picks_dominant_score() {
        let classifier = DetectorScoresClassifier::new(20);
        let obs = face(40, 40).with_scores([("happy", 0.7), ("sad", 0.2), ("contempt", 0.9)]);
        let result = classifier.classify(&RgbImage::new(1, 1), &obs);
        assert_eq!(result.label, EmotionLabel::Happy);
        assert_eq!(result.confidence, 0.7);
        assert_eq!(result.probabilities.len(), 2);
    }

    #[test]
    fn test_library_rescales_percent_scores() {
        let classifier = DetectorScoresClassifier::new(20);
        let obs = face(40, 40).with_scores([("Angry", 85.0), ("neutral", 15.0)]);
        let result = classifier.classify(&RgbImage::new(1, 1), &obs);
        assert_eq!(result.label, EmotionLabel::Angry);
        assert!((result.confidence - 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_library_falls_back_for_small_or_unscored_faces() {
        let classifier = DetectorScoresClassifier::new(20);
        let frame = RgbImage::new(1, 1);
        let small = face(10, 40).with_scores([("happy", 1.0)]);
        assert_eq!(
            classifier.classify(&frame, &small),
            EmotionClassification::neutral_fallback()
        );
        assert_eq!(
            classifier.classify(&frame, &face(40, 40)),
            EmotionClassification::neutral_fallback()
        );
    }

    #[test]
    fn test_heuristic_reads_bright_face_as_happy() {
        let frame = RgbImage::from_pixel(64, 64, Rgb([220, 220, 220]));
        let result = IntensityHeuristicClassifier::new(20).classify(&frame, &face(32, 32));
        assert_eq!(result.label, EmotionLabel::Happy);
        assert!(result.confidence > 0.4 && result.confidence <= 0.6);
        let total: f64 = result.probabilities.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_heuristic_reads_dark_face_as_sad() {
        let frame = RgbImage::from_pixel(64, 64, Rgb([30, 30, 30]));
        let result = IntensityHeuristicClassifier::new(20).classify(&frame, &face(32, 32));
        assert_eq!(result.label, EmotionLabel::Sad);
    }

    #[test]
    fn test_heuristic_mid_grey_is_neutral() {
        let frame = RgbImage::from_pixel(64, 64, Rgb([115, 115, 115]));
        let result = IntensityHeuristicClassifier::new(20).classify(&frame, &face(32, 32));
        assert_eq!(result.label, EmotionLabel::Neutral);
        assert!((result.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_heuristic_box_outside_frame_falls_back() {
        let frame = RgbImage::new(16, 16);
        let obs = FaceObservation::new(FaceBox::new(100, 100, 30, 30));
        assert_eq!(
            IntensityHeuristicClassifier::new(20).classify(&frame, &obs),
            EmotionClassification::neutral_fallback()
        );
    }

    #[test]
    fn test_auto_selection() {
        assert_eq!(select_classifier(EmotionStrategy::Auto, true, 20).name(), "library");
        assert_eq!(select_classifier(EmotionStrategy::Auto, false, 20).name(), "heuristic");
        assert_eq!(select_classifier(EmotionStrategy::Library, false, 20).name(), "library");
        assert_eq!(select_classifier(EmotionStrategy::Heuristic, true, 20).name(), "heuristic");
    }
}
