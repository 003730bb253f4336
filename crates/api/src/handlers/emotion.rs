//! Handler for `/emotion/analyze/` and `/emotion/video/`.
//!
//! The multipart body carries one of two fields: `image` (a photo or webcam
//! frame, analysed once) or `video` (staged to a temp file and sampled at
//! ~1 Hz). `image` wins when both are sent.

use std::path::Path;

use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use emorelay_core::emotion::{analyze_image, EmotionResult};
use emorelay_core::video::{analyze_video, VideoEmotionSummary};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Response body: the image result or the video summary, unwrapped.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum EmotionResponse {
    Image(EmotionResult),
    Video(VideoEmotionSummary),
}

/// An uploaded video field.
struct VideoUpload {
    filename: Option<String>,
    data: Bytes,
}

/// POST /api/emotion/analyze/ and POST /api/emotion/video/
pub async fn analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<EmotionResponse>> {
    let mut multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let mut image: Option<Bytes> = None;
    let mut video: Option<VideoUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "image" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                image = Some(data);
            }
            "video" => {
                let filename = field.file_name().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                video = Some(VideoUpload { filename, data });
            }
            _ => {} // ignore unknown fields
        }
    }

    if let Some(data) = image {
        if video.is_some() {
            tracing::warn!("Both image and video provided, analysing the image only");
        }
        let result = analyze_image(state.classifier.as_ref(), &data).await?;
        return Ok(Json(EmotionResponse::Image(result)));
    }

    let upload = video.ok_or(AppError::NoMedia)?;
    let summary = analyze_uploaded_video(&state, &upload).await?;
    Ok(Json(EmotionResponse::Video(summary)))
}

/// Stage the upload in a temp file and run the sampling loop over it.
///
/// The temp file is removed when `staged` drops, after the decoder has
/// been dropped, on every return path.
async fn analyze_uploaded_video(
    state: &AppState,
    upload: &VideoUpload,
) -> AppResult<VideoEmotionSummary> {
    let suffix = upload
        .filename
        .as_deref()
        .and_then(|f| Path::new(f).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| ".mp4".to_string());

    tokio::fs::create_dir_all(&state.config.scratch_dir)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;
    let staged = tempfile::Builder::new()
        .prefix("emotion-upload-")
        .suffix(&suffix)
        .tempfile_in(&state.config.scratch_dir)
        .map_err(|e| AppError::InternalError(e.to_string()))?;
    tokio::fs::write(staged.path(), &upload.data)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    tracing::debug!(
        path = %staged.path().display(),
        bytes = upload.data.len(),
        "Staged video upload"
    );

    let mut source = state.video_decoder.open(staged.path()).await?;
    let summary = analyze_video(state.classifier.as_ref(), source.as_mut()).await;
    drop(source);
    drop(staged);

    Ok(summary?)
}
