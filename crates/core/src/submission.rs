//! Code submissions: supported languages, derived names, local staging.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Languages the remote runner knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Cpp,
    Java,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Python, Language::Cpp, Language::Java];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Cpp => "cpp",
            Language::Java => "java",
        }
    }

    /// Source file extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Language::Python => "py",
            Language::Cpp => "cpp",
            Language::Java => "java",
        }
    }

    /// Comma-separated list of supported names, for error messages.
    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(Language::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|lang| lang.as_str() == s)
            .ok_or_else(|| CoreError::UnsupportedLanguage(s.to_string()))
    }
}

/// Inputs passed to the remote workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchInputs {
    pub language: String,
    pub os: String,
    pub filename: String,
}

/// One request to run a piece of code remotely.
#[derive(Debug, Clone)]
pub struct Submission {
    pub run_id: Uuid,
    pub language: Language,
    /// Target OS for the runner. Passed through untouched.
    pub os: String,
    pub code: String,
}

impl Submission {
    /// Create a submission with a fresh run id.
    pub fn new(language: Language, os: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            language,
            os: os.into(),
            code: code.into(),
        }
    }

    /// `{run_id}.{ext}`
    pub fn filename(&self) -> String {
        format!("{}.{}", self.run_id, self.language.extension())
    }

    /// Repository path the file is committed to: `code/{language}/{filename}`.
    pub fn remote_path(&self) -> String {
        format!("code/{}/{}", self.language, self.filename())
    }

    pub fn commit_message(&self) -> String {
        format!("Add {} via code relay", self.filename())
    }

    pub fn dispatch_inputs(&self) -> DispatchInputs {
        DispatchInputs {
            language: self.language.to_string(),
            os: self.os.clone(),
            filename: self.filename(),
        }
    }

    /// Write the code to `{scratch_root}/{run_id}-*/code/{filename}`.
    ///
    /// The returned guard owns the staging directory and removes it on drop.
    pub async fn stage(&self, scratch_root: &Path) -> std::io::Result<StagedFile> {
        tokio::fs::create_dir_all(scratch_root).await?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", self.run_id))
            .tempdir_in(scratch_root)?;

        let code_dir = dir.path().join("code");
        tokio::fs::create_dir_all(&code_dir).await?;
        let path = code_dir.join(self.filename());
        tokio::fs::write(&path, self.code.as_bytes()).await?;

        tracing::debug!(run_id = %self.run_id, path = %path.display(), "Staged submission");
        Ok(StagedFile { _dir: dir, path })
    }
}

/// A staged source file. Dropping it deletes the staging directory.
#[derive(Debug)]
pub struct StagedFile {
    _dir: tempfile::TempDir,
    path: PathBuf,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}
