//! Domain layer for the emotion-analysis and code-relay service.
//!
//! Holds the capability traits ([`emotion::EmotionClassifier`],
//! [`runner::RemoteCodeRunner`]) that the HTTP layer depends on, plus the
//! small amount of logic that lives here: image decoding, the video
//! sampling loop, and the submission model.

pub mod emotion;
pub mod error;
pub mod ffmpeg;
pub mod runner;
pub mod submission;
pub mod video;
