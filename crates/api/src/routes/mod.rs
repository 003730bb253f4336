pub mod code;
pub mod emotion;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /emotion/analyze/                                image / webcam frame / video (POST)
/// /emotion/video/                                  same handler (POST)
///
/// /code/submit/                                    push code and trigger runner (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Facial emotion analysis.
        .nest("/emotion", emotion::router())
        // Remote code execution relay.
        .nest("/code", code::router())
}
