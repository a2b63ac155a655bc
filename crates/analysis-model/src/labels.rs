//! Closed label sets: activity levels, anomaly types, and emotions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Activity level of a frame, derived from mean flow magnitude.
///
/// The first frame of a session has no predecessor, so its motion is zero
/// and it is reported as `Static`. `Unknown` is reserved for frames whose
/// motion could not be computed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Static,
    ModerateMovement,
    RapidMovement,
    #[default]
    Unknown,
}

impl ActivityLevel {
    pub const ALL: [ActivityLevel; 4] = [
        ActivityLevel::Static,
        ActivityLevel::ModerateMovement,
        ActivityLevel::RapidMovement,
        ActivityLevel::Unknown,
    ];

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            ActivityLevel::Static => "Static",
            ActivityLevel::ModerateMovement => "Moderate Movement",
            ActivityLevel::RapidMovement => "Rapid Movement",
            ActivityLevel::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Anomaly taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    SuddenMovement,
    IrregularPattern,
    FaceDisappearance,
    FaceAppearance,
    Unknown,
}

impl AnomalyType {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            AnomalyType::SuddenMovement => "Sudden Movement",
            AnomalyType::IrregularPattern => "Irregular Pattern",
            AnomalyType::FaceDisappearance => "Face Disappearance",
            AnomalyType::FaceAppearance => "Face Appearance",
            AnomalyType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Facial expression classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionLabel {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl EmotionLabel {
    pub const ALL: [EmotionLabel; 7] = [
        EmotionLabel::Angry,
        EmotionLabel::Disgust,
        EmotionLabel::Fear,
        EmotionLabel::Happy,
        EmotionLabel::Sad,
        EmotionLabel::Surprise,
        EmotionLabel::Neutral,
    ];

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            EmotionLabel::Angry => "Angry",
            EmotionLabel::Disgust => "Disgust",
            EmotionLabel::Fear => "Fear",
            EmotionLabel::Happy => "Happy",
            EmotionLabel::Sad => "Sad",
            EmotionLabel::Surprise => "Surprise",
            EmotionLabel::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A label name that is not part of the closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown emotion label: {0}")]
pub struct UnknownEmotion(pub String);

impl FromStr for EmotionLabel {
    type Err = UnknownEmotion;

    /// Parse the lowercase names emitted by emotion libraries
    /// (`"angry"`, `"happy"`, ...). Matching is case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "angry" => Ok(EmotionLabel::Angry),
            "disgust" => Ok(EmotionLabel::Disgust),
            "fear" => Ok(EmotionLabel::Fear),
            "happy" => Ok(EmotionLabel::Happy),
            "sad" => Ok(EmotionLabel::Sad),
            "surprise" => Ok(EmotionLabel::Surprise),
            "neutral" => Ok(EmotionLabel::Neutral),
            _ => Err(UnknownEmotion(s.to_string())),
        }
    }
}
