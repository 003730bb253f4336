//! Route definitions for emotion analysis.
//!
//! Mounted at `/emotion`. Both paths share one handler; the multipart field
//! name (`image` or `video`) decides what is analysed.
//!
//! ```text
//! POST /analyze/    analyze   (images, webcam frames)
//! POST /video/      analyze   (video files)
//! ```

use axum::routing::post;
use axum::Router;

use crate::handlers::emotion;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/analyze/", post(emotion::analyze))
        .route("/video/", post(emotion::analyze))
}
