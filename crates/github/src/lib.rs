//! GitHub-backed [`RemoteCodeRunner`](emorelay_core::runner::RemoteCodeRunner).
//!
//! Submissions are committed through the repository contents API
//! (upsert-by-path) and executed by a `workflow_dispatch` workflow.

pub mod client;
pub mod config;

pub use client::{GitHubClient, GitHubError};
pub use config::GitHubConfig;
