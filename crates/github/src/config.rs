use crate::client::GitHubError;

/// GitHub connection settings, loaded once at startup.
#[derive(Clone)]
pub struct GitHubConfig {
    /// Token with `contents:write` and `actions:write` on the repository.
    pub token: String,
    /// `owner/name`.
    pub repo: String,
    /// Branch files are committed to and the workflow runs on.
    pub branch: String,
    /// Workflow file name (or id) to dispatch.
    pub workflow: String,
    /// REST API base URL.
    pub api_url: String,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
}

impl GitHubConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var               | Default                  |
    /// |-----------------------|--------------------------|
    /// | `GITHUB_TOKEN`        | required                 |
    /// | `GITHUB_REPO`         | required                 |
    /// | `GITHUB_BRANCH`       | `main`                   |
    /// | `GITHUB_WORKFLOW`     | `run_code.yml`           |
    /// | `GITHUB_API_URL`      | `https://api.github.com` |
    /// | `GITHUB_TIMEOUT_SECS` | `30`                     |
    pub fn from_env() -> Result<Self, GitHubError> {
        let token = required("GITHUB_TOKEN")?;
        let repo = required("GITHUB_REPO")?;
        if !repo.contains('/') {
            return Err(GitHubError::Config(format!(
                "GITHUB_REPO must be 'owner/name', got '{repo}'"
            )));
        }

        let branch = std::env::var("GITHUB_BRANCH").unwrap_or_else(|_| "main".into());
        let workflow = std::env::var("GITHUB_WORKFLOW").unwrap_or_else(|_| "run_code.yml".into());
        let api_url = std::env::var("GITHUB_API_URL")
            .unwrap_or_else(|_| "https://api.github.com".into())
            .trim_end_matches('/')
            .to_string();

        let timeout_secs: u64 = std::env::var("GITHUB_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .map_err(|_| GitHubError::Config("GITHUB_TIMEOUT_SECS must be a valid u64".into()))?;

        Ok(Self {
            token,
            repo,
            branch,
            workflow,
            api_url,
            timeout_secs,
        })
    }
}

fn required(key: &str) -> Result<String, GitHubError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| GitHubError::Config(format!("{key} must be set")))
}

// The token must never end up in logs.
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("token", &"<redacted>")
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("workflow", &self.workflow)
            .field("api_url", &self.api_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
