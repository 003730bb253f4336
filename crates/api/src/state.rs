use std::sync::Arc;

use emorelay_core::emotion::EmotionClassifier;
use emorelay_core::runner::RemoteCodeRunner;
use emorelay_core::video::VideoDecoder;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`). Nothing in it is
/// mutated after startup; requests share no state with each other.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// External facial-emotion classifier.
    pub classifier: Arc<dyn EmotionClassifier>,
    /// Turns uploaded video files into frame sources.
    pub video_decoder: Arc<dyn VideoDecoder>,
    /// Remote repository + CI used by the code relay.
    pub runner: Arc<dyn RemoteCodeRunner>,
}
