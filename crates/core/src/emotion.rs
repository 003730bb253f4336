//! Emotion classification types and the single-image analysis path.
//!
//! The classifier itself is an external capability behind
//! [`EmotionClassifier`]; this module only decodes pixels, calls it, and
//! keeps the result consistent (dominant label == argmax of the scores).

use async_trait::async_trait;
use image::RgbImage;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Label → score mapping, in the order the classifier reported the labels.
pub type EmotionScores = IndexMap<String, f64>;

/// Classifier output for a single image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionResult {
    /// Highest-scoring label in [`emotions`](Self::emotions).
    pub dominant_emotion: String,
    /// Every label the classifier scored, normalised to sum to 1.0.
    pub emotions: EmotionScores,
}

impl EmotionResult {
    /// Build a result from raw classifier scores.
    ///
    /// Scores are normalised by their total (classifiers commonly report
    /// percentages) and the dominant label is recomputed as the argmax, the
    /// first label winning a tie. Returns `None` when no finite score exists.
    pub fn from_scores(scores: EmotionScores) -> Option<Self> {
        let total: f64 = scores.values().filter(|s| s.is_finite()).sum();
        let emotions: EmotionScores = if total > 0.0 {
            scores
                .into_iter()
                .map(|(label, score)| (label, score / total))
                .collect()
        } else {
            scores
        };

        let dominant_emotion = argmax(&emotions)?.to_string();
        Some(Self {
            dominant_emotion,
            emotions,
        })
    }
}

/// First label holding the maximum finite score.
fn argmax(scores: &EmotionScores) -> Option<&str> {
    let mut best: Option<(&str, f64)> = None;
    for (label, &score) in scores {
        if !score.is_finite() {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((label.as_str(), score)),
        }
    }
    best.map(|(label, _)| label)
}

// ---------------------------------------------------------------------------
// Classifier capability
// ---------------------------------------------------------------------------

/// Errors a classifier may report for one image.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// The image contains no detectable face. Expected for many video frames.
    #[error("Face could not be detected in the image")]
    NoFace,

    /// Anything else: transport failure, malformed response, model error.
    #[error("Emotion classifier failed: {0}")]
    Failed(String),
}

/// External facial-emotion classifier: given pixels, return a label distribution.
///
/// Implementations run with face-presence enforcement disabled, so a
/// best-effort result is returned whenever the model can produce one.
#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    async fn analyze(&self, image: &RgbImage) -> Result<EmotionResult, ClassifierError>;
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Failures of the image and video analysis paths.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Could not decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error("Could not open video: {0}")]
    VideoOpen(String),

    #[error("Failed to read video frame: {0}")]
    VideoRead(String),

    #[error("No faces detected in video")]
    NoFacesDetected,
}

/// Decode raw image bytes (any format the `image` features allow) into an
/// 8-bit three-channel RGB buffer.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, AnalysisError> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

/// Decode one image and run the classifier on it once.
pub async fn analyze_image(
    classifier: &dyn EmotionClassifier,
    bytes: &[u8],
) -> Result<EmotionResult, AnalysisError> {
    let image = decode_image(bytes)?;
    tracing::debug!(
        width = image.width(),
        height = image.height(),
        "Decoded image for emotion analysis"
    );

    let result = classifier.analyze(&image).await?;
    tracing::info!(dominant = %result.dominant_emotion, "Image analysed");
    Ok(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
