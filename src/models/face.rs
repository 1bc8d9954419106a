//! Facial attributes as reported by the vision service.
//!
//! Every optional attribute is its own `Option` field so a detector that skips
//! e.g. beard detection still deserializes into the same shape.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgeRange {
    pub low: u32,
    pub high: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gender {
    pub value: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emotion {
    #[serde(rename = "type")]
    pub emotion_type: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub width: f64,
    pub height: f64,
    pub left: f64,
    pub top: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceQuality {
    pub brightness: f64,
    pub sharpness: f64,
}

/// Boolean attribute with the detector's confidence (smile, eyeglasses, ...).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    pub value: bool,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceAttributes {
    pub age_range: Option<AgeRange>,
    pub gender: Option<Gender>,
    #[serde(default)]
    pub emotions: Vec<Emotion>,
    pub quality: Option<FaceQuality>,
    pub bounding_box: Option<BoundingBox>,
    pub smile: Option<Flag>,
    pub eyeglasses: Option<Flag>,
    pub sunglasses: Option<Flag>,
    pub beard: Option<Flag>,
    pub mustache: Option<Flag>,
    pub eyes_open: Option<Flag>,
    pub mouth_open: Option<Flag>,
}

impl FaceAttributes {
    /// Highest-confidence emotion. On a tie the one listed first wins.
    pub fn primary_emotion(&self) -> Option<&Emotion> {
        let mut primary: Option<&Emotion> = None;
        for emotion in &self.emotions {
            match primary {
                Some(current) if emotion.confidence <= current.confidence => {}
                _ => primary = Some(emotion),
            }
        }
        primary
    }

    /// Emotions ordered by confidence, highest first. Stable for equal scores.
    pub fn sorted_emotions(&self) -> Vec<Emotion> {
        let mut emotions = self.emotions.clone();
        emotions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        emotions
    }

    pub fn gender_value(&self) -> Option<&str> {
        self.gender.as_ref().map(|g| g.value.as_str())
    }
}

/// One face found in the target image of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceMatch {
    pub similarity: f64,
}
