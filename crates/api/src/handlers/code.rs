//! Handler for the code relay.
//!
//! Commits the submitted source to the remote repository and triggers the
//! CI workflow that runs it. The response only confirms that both calls were
//! accepted; the run's outcome is never reported back here.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use emorelay_core::runner::relay;
use emorelay_core::submission::{Language, Submission};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Request body for the code relay.
#[derive(Debug, Deserialize)]
pub struct SubmitCodeRequest {
    pub code: String,
    /// One of `python`, `cpp`, `java`. Kept as a string so an unsupported
    /// value gets a typed error instead of a generic JSON rejection.
    pub language: String,
    pub os: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitCodeResponse {
    pub run_id: String,
    pub filename: String,
    pub language: String,
    pub os: String,
    pub message: String,
}

/// POST /api/code/submit/
pub async fn submit_code(
    State(state): State<AppState>,
    payload: Result<Json<SubmitCodeRequest>, JsonRejection>,
) -> AppResult<Json<SubmitCodeResponse>> {
    let Json(input) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let language: Language = input.language.parse()?;
    let submission = Submission::new(language, input.os, input.code);
    tracing::info!(
        run_id = %submission.run_id,
        language = %language,
        os = %submission.os,
        "Relaying code submission"
    );

    let handle = relay(
        state.runner.as_ref(),
        &submission,
        &state.config.scratch_dir,
    )
    .await?;

    Ok(Json(SubmitCodeResponse {
        run_id: submission.run_id.to_string(),
        filename: handle.filename,
        language: language.to_string(),
        os: submission.os,
        message: "Code pushed and runner workflow triggered".to_string(),
    }))
}
