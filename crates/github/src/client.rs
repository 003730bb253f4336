//! REST client for the GitHub contents and workflow-dispatch endpoints.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use emorelay_core::runner::{
    DispatchAck, RemoteCodeRunner, RemoteStage, RunHandle, RunnerError, SubmissionFile,
};
use emorelay_core::submission::DispatchInputs;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::GitHubConfig;

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("emorelay/", env!("CARGO_PKG_VERSION"));

/// Errors from the GitHub REST layer.
#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    /// Missing or malformed configuration.
    #[error("GitHub configuration error: {0}")]
    Config(String),

    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// GitHub returned a non-success status code.
    #[error("GitHub API error ({status})")]
    Api {
        status: u16,
        /// Error payload: parsed JSON when possible, raw text otherwise.
        details: serde_json::Value,
    },
}

impl GitHubError {
    fn into_runner_error(self, stage: RemoteStage) -> RunnerError {
        match self {
            GitHubError::Api { status, details } => RunnerError::Remote {
                stage,
                status,
                details,
            },
            other => RunnerError::Transport {
                stage,
                message: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContentsEntry {
    sha: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutContents<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PutContentsResponse {
    commit: Option<CommitRef>,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: Option<String>,
}

#[derive(Debug, Serialize)]
struct WorkflowDispatch<'a> {
    #[serde(rename = "ref")]
    git_ref: &'a str,
    inputs: &'a DispatchInputs,
}

/// HTTP client for one repository.
pub struct GitHubClient {
    client: reqwest::Client,
    config: GitHubConfig,
}

impl GitHubClient {
    pub fn new(config: GitHubConfig) -> Result<Self, GitHubError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, config })
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.config.api_url, self.config.repo, path
        )
    }

    fn dispatch_url(&self) -> String {
        format!(
            "{}/repos/{}/actions/workflows/{}/dispatches",
            self.config.api_url, self.config.repo, self.config.workflow
        )
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.config.token)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// Blob sha of the file currently at `path` on the target branch, if any.
    ///
    /// Any non-200 answer (usually 404) means "no existing file".
    pub async fn current_sha(&self, path: &str) -> Result<Option<String>, GitHubError> {
        let response = self
            .request(reqwest::Method::GET, self.contents_url(path))
            .query(&[("ref", self.config.branch.as_str())])
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            tracing::debug!(path, status = response.status().as_u16(), "No existing file");
            return Ok(None);
        }
        // A directory listing parses as an array and yields no sha.
        let entry = response.json::<ContentsEntry>().await.ok();
        Ok(entry.and_then(|e| e.sha))
    }

    /// Create or update `file.remote_path` on the target branch.
    pub async fn upsert_file(&self, file: &SubmissionFile) -> Result<RunHandle, GitHubError> {
        let sha = self.current_sha(&file.remote_path).await?;
        let updating = sha.is_some();

        let payload = PutContents {
            message: &file.commit_message,
            content: base64::engine::general_purpose::STANDARD.encode(&file.content),
            branch: &self.config.branch,
            sha,
        };

        let response = self
            .request(reqwest::Method::PUT, self.contents_url(&file.remote_path))
            .json(&payload)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let created = response.status() == StatusCode::CREATED;

        let body = response.json::<PutContentsResponse>().await.ok();
        let commit_sha = body.and_then(|b| b.commit).and_then(|c| c.sha);

        tracing::debug!(
            path = %file.remote_path,
            updating,
            created,
            commit = ?commit_sha,
            "Upserted file"
        );

        Ok(RunHandle {
            filename: file.filename.clone(),
            remote_path: file.remote_path.clone(),
            commit_sha,
            created,
        })
    }

    /// Fire the configured workflow on the target branch.
    pub async fn dispatch_workflow(&self, inputs: &DispatchInputs) -> Result<u16, GitHubError> {
        let payload = WorkflowDispatch {
            git_ref: &self.config.branch,
            inputs,
        };

        let response = self
            .request(reqwest::Method::POST, self.dispatch_url())
            .json(&payload)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.status().as_u16())
    }
}

/// Return the response unchanged on 2xx, otherwise capture status and payload.
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, GitHubError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    let details =
        serde_json::from_str(&text).unwrap_or_else(|_| serde_json::Value::String(text));
    Err(GitHubError::Api {
        status: status.as_u16(),
        details,
    })
}

#[async_trait]
impl RemoteCodeRunner for GitHubClient {
    async fn submit(&self, file: &SubmissionFile) -> Result<RunHandle, RunnerError> {
        self.upsert_file(file)
            .await
            .map_err(|e| e.into_runner_error(RemoteStage::Push))
    }

    async fn dispatch(
        &self,
        handle: &RunHandle,
        inputs: &DispatchInputs,
    ) -> Result<DispatchAck, RunnerError> {
        tracing::debug!(path = %handle.remote_path, "Dispatching workflow");
        let status = self
            .dispatch_workflow(inputs)
            .await
            .map_err(|e| e.into_runner_error(RemoteStage::Dispatch))?;
        Ok(DispatchAck { status })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
