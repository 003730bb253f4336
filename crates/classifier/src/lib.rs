//! HTTP client for the facial-emotion classifier sidecar.
//!
//! The model runs in a separate service; this crate only ships pixels to it
//! and maps its answer onto [`EmotionClassifier`]. Face-presence enforcement
//! is always disabled so the sidecar returns a best-effort distribution.
//!
//! Protocol: `POST {base_url}/analyze` with a multipart body holding `image`
//! (PNG) and `enforce_detection`. `200` carries
//! `{"dominant_emotion": .., "emotion": {label: score}}` (or a one-element
//! list of those), `422` means no face was found.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use emorelay_core::emotion::{
    ClassifierError, EmotionClassifier, EmotionResult, EmotionScores,
};
use image::RgbImage;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;

/// Classifier sidecar configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Base URL, e.g. `http://127.0.0.1:5005`.
    pub base_url: String,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
}

impl ClassifierConfig {
    /// | Env Var                   | Default                 |
    /// |---------------------------|-------------------------|
    /// | `EMOTION_CLASSIFIER_URL`  | `http://127.0.0.1:5005` |
    /// | `CLASSIFIER_TIMEOUT_SECS` | `60`                    |
    pub fn from_env() -> Self {
        let base_url = std::env::var("EMOTION_CLASSIFIER_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:5005".into())
            .trim_end_matches('/')
            .to_string();

        let timeout_secs: u64 = std::env::var("CLASSIFIER_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("CLASSIFIER_TIMEOUT_SECS must be a valid u64");

        Self {
            base_url,
            timeout_secs,
        }
    }
}

/// Errors from the classifier HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The frame could not be encoded for upload.
    #[error("Failed to encode image: {0}")]
    Encode(#[from] image::ImageError),

    /// The sidecar found no face in the image.
    #[error("No face detected")]
    NoFace,

    /// The sidecar returned a non-2xx status code.
    #[error("Classifier API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    /// The response parsed but carried no usable scores.
    #[error("Classifier returned no emotion scores")]
    EmptyScores,
}

impl From<ClassifierApiError> for ClassifierError {
    fn from(err: ClassifierApiError) -> Self {
        match err {
            ClassifierApiError::NoFace => ClassifierError::NoFace,
            other => ClassifierError::Failed(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    emotion: EmotionScores,
}

/// Some classifier servers wrap the per-face result in a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AnalyzeBody {
    Single(AnalyzeResponse),
    PerFace(Vec<AnalyzeResponse>),
}

/// [`EmotionClassifier`] backed by the classifier sidecar.
pub struct HttpEmotionClassifier {
    client: reqwest::Client,
    api_url: String,
}

impl HttpEmotionClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassifierApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::with_client(client, config.base_url.clone()))
    }

    /// Reuse an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self { client, api_url }
    }

    /// Send one image to `POST /analyze` and parse the score distribution.
    pub async fn classify(&self, image: &RgbImage) -> Result<EmotionResult, ClassifierApiError> {
        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;

        let part = Part::bytes(png)
            .file_name("frame.png")
            .mime_str("image/png")?;
        let form = Form::new()
            .part("image", part)
            .text("enforce_detection", "false");

        let response = self
            .client
            .post(format!("{}/analyze", self.api_url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        tracing::trace!(status = status.as_u16(), "Classifier responded");
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(ClassifierApiError::NoFace);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ClassifierApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let scores = match response.json::<AnalyzeBody>().await? {
            AnalyzeBody::Single(r) => r.emotion,
            AnalyzeBody::PerFace(list) => list
                .into_iter()
                .next()
                .map(|r| r.emotion)
                .ok_or(ClassifierApiError::NoFace)?,
        };

        EmotionResult::from_scores(scores).ok_or(ClassifierApiError::EmptyScores)
    }
}

#[async_trait]
impl EmotionClassifier for HttpEmotionClassifier {
    async fn analyze(&self, image: &RgbImage) -> Result<EmotionResult, ClassifierError> {
        Ok(self.classify(image).await?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
