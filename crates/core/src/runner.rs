//! Remote code-hosting and CI capability.
//!
//! [`RemoteCodeRunner`] abstracts "store this file remotely" and "trigger the
//! pipeline that runs it". [`relay`] drives one submission through both
//! calls; it does not retry and does not wait for the pipeline to finish.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

use crate::submission::{DispatchInputs, Submission};

/// A file ready to be upserted into the remote repository.
#[derive(Debug, Clone)]
pub struct SubmissionFile {
    pub remote_path: String,
    pub filename: String,
    pub commit_message: String,
    pub content: Vec<u8>,
}

/// Handle to a file the remote store accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunHandle {
    pub filename: String,
    pub remote_path: String,
    /// Commit created by the upsert, when the remote reports one.
    pub commit_sha: Option<String>,
    /// `true` if the file was created, `false` if an existing one was updated.
    pub created: bool,
}

/// Acknowledgement that the remote pipeline was triggered (not completed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchAck {
    pub status: u16,
}

/// Which outbound call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStage {
    Push,
    Dispatch,
}

impl fmt::Display for RemoteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteStage::Push => f.write_str("Remote push"),
            RemoteStage::Dispatch => f.write_str("Workflow dispatch"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The request never produced a response (network, DNS, TLS, timeout).
    #[error("{stage} request failed: {message}")]
    Transport { stage: RemoteStage, message: String },

    /// The remote answered with a non-success status.
    #[error("{stage} failed with HTTP {status}")]
    Remote {
        stage: RemoteStage,
        status: u16,
        /// Remote error payload (JSON if the body parsed, otherwise the text).
        details: serde_json::Value,
    },
}

impl RunnerError {
    pub fn stage(&self) -> RemoteStage {
        match self {
            RunnerError::Transport { stage, .. } | RunnerError::Remote { stage, .. } => *stage,
        }
    }
}

#[async_trait]
pub trait RemoteCodeRunner: Send + Sync {
    /// Create or update the file at `file.remote_path`.
    async fn submit(&self, file: &SubmissionFile) -> Result<RunHandle, RunnerError>;

    /// Trigger the remote pipeline for a submitted file.
    async fn dispatch(
        &self,
        handle: &RunHandle,
        inputs: &DispatchInputs,
    ) -> Result<DispatchAck, RunnerError>;
}

/// Failures of [`relay`].
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Failed to stage submission: {0}")]
    Stage(#[from] std::io::Error),

    #[error(transparent)]
    Runner(#[from] RunnerError),
}

/// Stage the submission locally, upsert it remotely, then dispatch the run.
///
/// The staging directory is removed before this returns, on success or failure.
pub async fn relay(
    runner: &dyn RemoteCodeRunner,
    submission: &Submission,
    scratch_root: &Path,
) -> Result<RunHandle, RelayError> {
    let staged = submission.stage(scratch_root).await?;
    let file = SubmissionFile {
        remote_path: submission.remote_path(),
        filename: submission.filename(),
        commit_message: submission.commit_message(),
        content: staged.read().await?,
    };
    drop(staged);

    let handle = runner.submit(&file).await?;
    tracing::info!(
        run_id = %submission.run_id,
        path = %handle.remote_path,
        created = handle.created,
        "Submission pushed"
    );

    let ack = runner
        .dispatch(&handle, &submission.dispatch_inputs())
        .await?;
    tracing::info!(
        run_id = %submission.run_id,
        status = ack.status,
        "Workflow dispatched"
    );

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;

    use super::*;
    use crate::submission::Language;

    #[derive(Default)]
    struct RecordingRunner {
        submitted: Mutex<Vec<SubmissionFile>>,
        dispatched: Mutex<Vec<DispatchInputs>>,
        fail_push: bool,
    }

    #[async_trait]
    impl RemoteCodeRunner for RecordingRunner {
        async fn submit(&self, file: &SubmissionFile) -> Result<RunHandle, RunnerError> {
            if self.fail_push {
                return Err(RunnerError::Remote {
                    stage: RemoteStage::Push,
                    status: 422,
                    details: serde_json::json!({"message": "Invalid request"}),
                });
            }
            self.submitted.lock().unwrap().push(file.clone());
            Ok(RunHandle {
                filename: file.filename.clone(),
                remote_path: file.remote_path.clone(),
                commit_sha: None,
                created: true,
            })
        }

        async fn dispatch(
            &self,
            _handle: &RunHandle,
            inputs: &DispatchInputs,
        ) -> Result<DispatchAck, RunnerError> {
            self.dispatched.lock().unwrap().push(inputs.clone());
            Ok(DispatchAck { status: 204 })
        }
    }

    #[tokio::test]
    async fn relay_pushes_then_dispatches() {
        let scratch = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::default();
        let sub = Submission::new(Language::Python, "linux", "print(1)");

        let handle = relay(&runner, &sub, scratch.path()).await.unwrap();
        assert_eq!(handle.filename, sub.filename());

        let submitted = runner.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].content, b"print(1)");
        assert_eq!(submitted[0].remote_path, sub.remote_path());

        let dispatched = runner.dispatched.lock().unwrap();
        assert_eq!(dispatched.as_slice(), &[sub.dispatch_inputs()]);

        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn push_failure_skips_dispatch() {
        let scratch = tempfile::tempdir().unwrap();
        let runner = RecordingRunner {
            fail_push: true,
            ..Default::default()
        };
        let sub = Submission::new(Language::Java, "windows", "class A {}");

        let err = relay(&runner, &sub, scratch.path()).await.unwrap_err();
        assert_matches!(
            err,
            RelayError::Runner(RunnerError::Remote { stage: RemoteStage::Push, status: 422, .. })
        );
        assert!(runner.dispatched.lock().unwrap().is_empty());
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn error_reports_stage() {
        let err = RunnerError::Transport {
            stage: RemoteStage::Dispatch,
            message: "connection refused".into(),
        };
        assert_eq!(err.stage(), RemoteStage::Dispatch);
        assert_eq!(
            err.to_string(),
            "Workflow dispatch request failed: connection refused"
        );
    }
}
