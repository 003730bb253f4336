//! Route definitions for the code relay.
//!
//! Mounted at `/code`.
//!
//! ```text
//! POST /submit/    submit_code
//! ```

use axum::routing::post;
use axum::Router;

use crate::handlers::code;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/submit/", post(code::submit_code))
}
