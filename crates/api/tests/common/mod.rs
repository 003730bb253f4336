#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use emorelay_core::emotion::{
    AnalysisError, ClassifierError, EmotionClassifier, EmotionResult, EmotionScores,
};
use emorelay_core::runner::{
    DispatchAck, RemoteCodeRunner, RemoteStage, RunHandle, RunnerError, SubmissionFile,
};
use emorelay_core::submission::DispatchInputs;
use emorelay_core::video::{VideoDecoder, VideoSource};
use http_body_util::BodyExt;
use image::RgbImage;
use tower::ServiceExt;

use emorelay_api::config::ServerConfig;
use emorelay_api::router::build_app_router;
use emorelay_api::state::AppState;

// ---------------------------------------------------------------------------
// Fake classifier
// ---------------------------------------------------------------------------

pub enum ClassifierBehavior {
    /// Return these scores for every image.
    Scores(Vec<(&'static str, f64)>),
    /// Make the given label dominant, one entry per call; `None` means no face.
    /// Calls past the end of the script report no face.
    Script(Vec<Option<&'static str>>),
    /// Fail every call.
    Fail,
}

pub struct FakeClassifier {
    behavior: ClassifierBehavior,
    calls: AtomicUsize,
}

impl FakeClassifier {
    pub fn new(behavior: ClassifierBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn single(label: &str) -> EmotionResult {
    let mut scores = EmotionScores::new();
    scores.insert(label.to_string(), 0.9);
    scores.insert("neutral_rest".to_string(), 0.1);
    EmotionResult::from_scores(scores).expect("non-empty scores")
}

#[async_trait]
impl EmotionClassifier for FakeClassifier {
    async fn analyze(&self, _image: &RgbImage) -> Result<EmotionResult, ClassifierError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            ClassifierBehavior::Scores(pairs) => {
                let scores: EmotionScores =
                    pairs.iter().map(|(l, s)| (l.to_string(), *s)).collect();
                EmotionResult::from_scores(scores)
                    .ok_or_else(|| ClassifierError::Failed("empty".into()))
            }
            ClassifierBehavior::Script(script) => match script.get(call).copied().flatten() {
                Some(label) => Ok(single(label)),
                None => Err(ClassifierError::NoFace),
            },
            ClassifierBehavior::Fail => Err(ClassifierError::Failed("model unavailable".into())),
        }
    }
}

// ---------------------------------------------------------------------------
// Fake video decoder
// ---------------------------------------------------------------------------

/// Produces `frames` blank frames at `fps`, remembering which file it opened.
pub struct FakeDecoder {
    frames: usize,
    fps: f64,
    fail_open: bool,
    pub opened: Mutex<Vec<(PathBuf, Vec<u8>)>>,
}

impl FakeDecoder {
    pub fn new(frames: usize, fps: f64) -> Arc<Self> {
        Arc::new(Self {
            frames,
            fps,
            fail_open: false,
            opened: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            frames: 0,
            fps: 0.0,
            fail_open: true,
            opened: Mutex::new(Vec::new()),
        })
    }

    pub fn opened_paths(&self) -> Vec<PathBuf> {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .map(|(p, _)| p.clone())
            .collect()
    }
}

struct BlankSource {
    remaining: usize,
    fps: f64,
}

#[async_trait]
impl VideoSource for BlankSource {
    fn frame_rate(&self) -> f64 {
        self.fps
    }

    async fn next_frame(&mut self) -> Result<Option<RgbImage>, AnalysisError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some(RgbImage::new(2, 2)))
    }
}

#[async_trait]
impl VideoDecoder for FakeDecoder {
    async fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, AnalysisError> {
        let bytes = std::fs::read(path).map_err(|e| AnalysisError::VideoOpen(e.to_string()))?;
        self.opened
            .lock()
            .unwrap()
            .push((path.to_path_buf(), bytes));
        if self.fail_open {
            return Err(AnalysisError::VideoOpen("unsupported container".into()));
        }
        Ok(Box::new(BlankSource {
            remaining: self.frames,
            fps: self.fps,
        }))
    }
}

// ---------------------------------------------------------------------------
// Fake remote runner
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeRunner {
    pub fail_push: bool,
    pub fail_dispatch: bool,
    pub submitted: Mutex<Vec<SubmissionFile>>,
    pub dispatched: Mutex<VecDeque<DispatchInputs>>,
}

impl FakeRunner {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_fails() -> Arc<Self> {
        Arc::new(Self {
            fail_push: true,
            ..Default::default()
        })
    }

    pub fn dispatch_fails() -> Arc<Self> {
        Arc::new(Self {
            fail_dispatch: true,
            ..Default::default()
        })
    }
}

#[async_trait]
impl RemoteCodeRunner for FakeRunner {
    async fn submit(&self, file: &SubmissionFile) -> Result<RunHandle, RunnerError> {
        if self.fail_push {
            return Err(RunnerError::Remote {
                stage: RemoteStage::Push,
                status: 401,
                details: serde_json::json!({"message": "Bad credentials"}),
            });
        }
        self.submitted.lock().unwrap().push(file.clone());
        Ok(RunHandle {
            filename: file.filename.clone(),
            remote_path: file.remote_path.clone(),
            commit_sha: Some("c0ffee".into()),
            created: true,
        })
    }

    async fn dispatch(
        &self,
        _handle: &RunHandle,
        inputs: &DispatchInputs,
    ) -> Result<DispatchAck, RunnerError> {
        if self.fail_dispatch {
            return Err(RunnerError::Remote {
                stage: RemoteStage::Dispatch,
                status: 404,
                details: serde_json::json!({"message": "Not Found"}),
            });
        }
        self.dispatched.lock().unwrap().push_back(inputs.clone());
        Ok(DispatchAck { status: 204 })
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with safe defaults and the given scratch dir.
pub fn test_config(scratch_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_upload_bytes: 10 * 1024 * 1024,
        scratch_dir: scratch_dir.to_path_buf(),
    }
}

/// Fakes plus a private scratch directory for one test.
pub struct TestContext {
    pub classifier: Arc<FakeClassifier>,
    pub decoder: Arc<FakeDecoder>,
    pub runner: Arc<FakeRunner>,
    pub scratch: tempfile::TempDir,
}

impl TestContext {
    pub fn new(
        classifier: Arc<FakeClassifier>,
        decoder: Arc<FakeDecoder>,
        runner: Arc<FakeRunner>,
    ) -> Self {
        Self {
            classifier,
            decoder,
            runner,
            scratch: tempfile::tempdir().expect("scratch dir"),
        }
    }

    /// Context for code-relay tests; the emotion fakes are never exercised.
    pub fn with_runner(runner: Arc<FakeRunner>) -> Self {
        Self::new(
            FakeClassifier::new(ClassifierBehavior::Fail),
            FakeDecoder::new(0, 0.0),
            runner,
        )
    }

    /// Build the full application router (production middleware stack)
    /// around the fakes.
    pub fn app(&self) -> Router {
        self.app_with_scratch(self.scratch.path())
    }

    /// Same as [`app`](Self::app) but staging into `scratch_dir`.
    pub fn app_with_scratch(&self, scratch_dir: &Path) -> Router {
        let config = test_config(scratch_dir);
        let state = AppState {
            config: Arc::new(config.clone()),
            classifier: self.classifier.clone(),
            video_decoder: self.decoder.clone(),
            runner: self.runner.clone(),
        };
        build_app_router(state, &config)
    }

    /// Number of entries left in the scratch directory.
    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.scratch.path())
            .expect("read scratch dir")
            .count()
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

const BOUNDARY: &str = "emorelay-test-boundary";

/// A multipart part: field name, optional filename, content.
pub struct Part<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub data: &'a [u8],
}

/// Encode `parts` as a `multipart/form-data` body.
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part.filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{filename}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n",
                    part.name
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                    .as_bytes(),
            ),
        }
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn post_multipart(app: Router, uri: &str, parts: &[Part<'_>]) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// A small valid PNG.
pub fn png_bytes() -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(RgbImage::new(8, 8));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}
