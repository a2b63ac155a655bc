//! Face detections supplied by external collaborators.
//!
//! Detections arrive as JSON Lines, one object per frame that has any faces:
//!
//! ```text
//! {"frame": 12, "faces": [{"x": 40, "y": 32, "w": 64, "h": 64, "emotion_scores": {"happy": 0.8, "neutral": 0.2}}]}
//! ```
//!
//! Frame indices are zero-based, matching the order frames are decoded in.
//! Frames with no line have no faces.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Axis-aligned face box in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl FaceBox {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn area(&self) -> f64 {
        self.w as f64 * self.h as f64
    }
}

/// One face reported by the detector for a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceObservation {
    #[serde(flatten)]
    pub bbox: FaceBox,

    /// Detector confidence.
    #[serde(default = "default_confidence")]
    pub confidence: f64,

    /// Raw scores from the emotion library, keyed by its label names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion_scores: Option<HashMap<String, f64>>,
}

fn default_confidence() -> f64 {
    1.0
}

impl FaceObservation {
    pub fn new(bbox: FaceBox) -> Self {
        Self {
            bbox,
            confidence: 1.0,
            emotion_scores: None,
        }
    }

    pub fn with_scores<I, S>(mut self, scores: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        self.emotion_scores = Some(scores.into_iter().map(|(k, v)| (k.into(), v)).collect());
        self
    }
}

/// All faces detected in one frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameDetections {
    pub frame: u64,
    #[serde(default)]
    pub faces: Vec<FaceObservation>,
}

impl FrameDetections {
    /// A frame with no detected faces.
    pub fn empty(frame: u64) -> Self {
        Self {
            frame,
            faces: Vec::new(),
        }
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Mean box area in square pixels, `0.0` without faces.
    pub fn avg_face_area(&self) -> f64 {
        if self.faces.is_empty() {
            return 0.0;
        }
        self.faces.iter().map(|f| f.bbox.area()).sum::<f64>() / self.faces.len() as f64
    }
}

/// Parse detections from JSONL content (one JSON object per line).
pub fn parse_detections(jsonl: &str) -> Result<Vec<FrameDetections>, serde_json::Error> {
    jsonl
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(serde_json::from_str)
        .collect()
}

/// Detections keyed by frame index.
#[derive(Debug, Clone, Default)]
pub struct DetectionIndex {
    frames: BTreeMap<u64, FrameDetections>,
}

impl DetectionIndex {
    /// Index parsed detections. Repeated frame indices are merged.
    pub fn new(detections: Vec<FrameDetections>) -> Self {
        let mut frames: BTreeMap<u64, FrameDetections> = BTreeMap::new();
        for detection in detections {
            frames
                .entry(detection.frame)
                .or_insert_with(|| FrameDetections::empty(detection.frame))
                .faces
                .extend(detection.faces);
        }
        Self { frames }
    }

    /// Detections for a frame; an empty set when none were reported.
    pub fn for_frame(&self, frame: u64) -> FrameDetections {
        self.frames
            .get(&frame)
            .cloned()
            .unwrap_or_else(|| FrameDetections::empty(frame))
    }

    /// Whether any face carries emotion-library scores.
    pub fn has_emotion_scores(&self) -> bool {
        self.frames
            .values()
            .flat_map(|f| f.faces.iter())
            .any(|face| face.emotion_scores.is_some())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
