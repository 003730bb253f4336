//! Video emotion aggregation.
//!
//! Frames are pulled sequentially from a [`VideoSource`]; roughly one frame
//! per second of footage is handed to the classifier, and the per-frame
//! dominant labels are reduced to a frequency tally whose mode is reported.

use std::path::Path;

use async_trait::async_trait;
use image::RgbImage;
use indexmap::IndexMap;
use serde::Serialize;

use crate::emotion::{AnalysisError, ClassifierError, EmotionClassifier};

/// Frame-sequential video input.
#[async_trait]
pub trait VideoSource: Send {
    /// Nominal frames per second reported by the container (`0.0` if unknown).
    fn frame_rate(&self) -> f64;

    /// Next decoded RGB frame, or `None` once the stream is exhausted.
    async fn next_frame(&mut self) -> Result<Option<RgbImage>, AnalysisError>;
}

/// Opens a file on disk as a [`VideoSource`].
#[async_trait]
pub trait VideoDecoder: Send + Sync {
    /// Fails with [`AnalysisError::VideoOpen`] when the file is not a
    /// readable video.
    async fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, AnalysisError>;
}

/// Number of raw frames between two analysed frames.
///
/// The nominal rate is truncated to whole frames; anything below one frame
/// per second (including zero and unknown rates) samples every frame.
pub fn sampling_stride(frame_rate: f64) -> u64 {
    if frame_rate.is_finite() && frame_rate >= 1.0 {
        frame_rate.trunc() as u64
    } else {
        1
    }
}

// ---------------------------------------------------------------------------
// Tally
// ---------------------------------------------------------------------------

/// Occurrence count per label, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EmotionTally(IndexMap<String, u32>);

impl EmotionTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, label: &str) {
        *self.0.entry(label.to_string()).or_insert(0) += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }

    /// Most frequent label; the earliest-seen label wins a tie.
    pub fn dominant(&self) -> Option<&str> {
        let mut best: Option<(&str, u32)> = None;
        for (label, &count) in &self.0 {
            match best {
                Some((_, top)) if count <= top => {}
                _ => best = Some((label.as_str(), count)),
            }
        }
        best.map(|(label, _)| label)
    }

    pub fn into_inner(self) -> IndexMap<String, u32> {
        self.0
    }
}

/// Aggregated result of a video analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoEmotionSummary {
    /// Most frequent per-frame dominant label.
    pub dominant_emotion: String,
    /// Label → number of sampled frames it dominated.
    pub emotion_timeline: IndexMap<String, u32>,
    /// Sampled frames that produced a label (sum of the timeline).
    pub total_frames: u32,
    /// Classifier invocations, including frames that produced no label.
    pub sampled_frames: u32,
    /// Sampled frames where the classifier failed for a reason other than
    /// "no face".
    pub failed_frames: u32,
}

// ---------------------------------------------------------------------------
// Aggregation loop
// ---------------------------------------------------------------------------

/// Run the classifier over a video at ~1 Hz and summarise the labels.
///
/// Frame `i` is sampled iff `i % stride == 0`. Frames without a face are
/// skipped silently; other per-frame classifier failures are logged and
/// counted but never abort the analysis. Returns
/// [`AnalysisError::NoFacesDetected`] when no sampled frame produced a label.
pub async fn analyze_video<S>(
    classifier: &dyn EmotionClassifier,
    source: &mut S,
) -> Result<VideoEmotionSummary, AnalysisError>
where
    S: VideoSource + ?Sized,
{
    let stride = sampling_stride(source.frame_rate());
    tracing::debug!(frame_rate = source.frame_rate(), stride, "Starting video analysis");

    let mut tally = EmotionTally::new();
    let mut index: u64 = 0;
    let mut sampled_frames: u32 = 0;
    let mut failed_frames: u32 = 0;

    while let Some(frame) = source.next_frame().await? {
        if index % stride == 0 {
            sampled_frames += 1;
            match classifier.analyze(&frame).await {
                Ok(result) => tally.record(&result.dominant_emotion),
                Err(ClassifierError::NoFace) => {
                    tracing::debug!(frame = index, "No face in sampled frame");
                }
                Err(e) => {
                    failed_frames += 1;
                    tracing::warn!(frame = index, error = %e, "Classifier failed on sampled frame");
                }
            }
        }
        index += 1;
    }

    let dominant_emotion = match tally.dominant() {
        Some(label) => label.to_string(),
        None => {
            tracing::info!(
                frames = index,
                sampled_frames,
                failed_frames,
                "No faces detected in video"
            );
            return Err(AnalysisError::NoFacesDetected);
        }
    };

    let total_frames = tally.total();
    tracing::info!(
        frames = index,
        sampled_frames,
        total_frames,
        failed_frames,
        dominant = %dominant_emotion,
        "Video analysed"
    );

    Ok(VideoEmotionSummary {
        dominant_emotion,
        emotion_timeline: tally.into_inner(),
        total_frames,
        sampled_frames,
        failed_frames,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
