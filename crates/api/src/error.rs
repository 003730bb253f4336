use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use emorelay_core::emotion::AnalysisError;
use emorelay_core::error::CoreError;
use emorelay_core::runner::{RelayError, RunnerError};
use emorelay_core::submission::Language;
use serde_json::{json, Value};

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain errors from `emorelay_core` and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent JSON error
/// responses of the form `{"error", "code", "details"?}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `emorelay_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Image or video analysis failed.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// The remote repository or CI rejected a call, or could not be reached.
    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// The code submission could not be written to the scratch directory.
    #[error("Failed to stage submission: {0}")]
    Staging(std::io::Error),

    /// The emotion endpoint received neither an `image` nor a `video` field.
    #[error("No image or video provided")]
    NoMedia,

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<RelayError> for AppError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Stage(e) => AppError::Staging(e),
            RelayError::Runner(e) => AppError::Runner(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details): (StatusCode, &str, String, Option<Value>) =
            match &self {
                // --- CoreError variants ---
                AppError::Core(CoreError::UnsupportedLanguage(lang)) => (
                    StatusCode::BAD_REQUEST,
                    "UNSUPPORTED_LANGUAGE",
                    "Unsupported language".to_string(),
                    Some(Value::String(format!(
                        "'{lang}' is not supported; supported: {}",
                        Language::supported_list()
                    ))),
                ),

                // --- Analysis errors ---
                AppError::Analysis(AnalysisError::NoFacesDetected) => (
                    StatusCode::BAD_REQUEST,
                    "NO_FACES",
                    AnalysisError::NoFacesDetected.to_string(),
                    None,
                ),
                AppError::Analysis(err) => {
                    tracing::error!(error = %err, "Emotion analysis failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "ANALYSIS_FAILED",
                        err.to_string(),
                        None,
                    )
                }

                // --- Remote collaborator errors ---
                AppError::Runner(err) => {
                    tracing::error!(error = %err, "Remote runner call failed");
                    let details = match err {
                        RunnerError::Remote { details, .. } => details.clone(),
                        RunnerError::Transport { message, .. } => Value::String(message.clone()),
                    };
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "REMOTE_ERROR",
                        format!("{} failed", err.stage()),
                        Some(details),
                    )
                }

                AppError::Staging(err) => {
                    tracing::error!(error = %err, "Failed to stage submission");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                        Some(Value::String("Submission could not be staged".to_string())),
                    )
                }

                // --- HTTP-specific errors ---
                AppError::NoMedia => (
                    StatusCode::BAD_REQUEST,
                    "NO_MEDIA",
                    self.to_string(),
                    None,
                ),
                AppError::BadRequest(msg) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), None)
                }
                AppError::InternalError(msg) => {
                    tracing::error!(error = %msg, "Internal error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                        None,
                    )
                }
            };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        (status, axum::Json(body)).into_response()
    }
}
