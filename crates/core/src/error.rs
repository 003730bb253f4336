#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
}
