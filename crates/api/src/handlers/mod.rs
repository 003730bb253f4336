//! Request handlers.
//!
//! Handlers parse the request, delegate to `emorelay_core` against the
//! capabilities held in [`AppState`](crate::state::AppState), and map errors
//! via [`AppError`](crate::error::AppError).

pub mod code;
pub mod emotion;
