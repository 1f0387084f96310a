use thiserror::Error;

#[derive(Debug, Error)]
pub enum DroidClawError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Screen capture not initialized")]
    NotInitialized,

    #[error("Screen capture timed out after {attempts} attempts")]
    CaptureTimeout { attempts: u32 },

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("LLM provider error: {0}")]
    LlmProvider(String),

    #[error("Reasoning service timed out after {0}s")]
    ReasoningTimeout(u64),

    #[error("SSE parsing error: {0}")]
    SseParsing(String),

    #[error("Automation not enabled")]
    ExecutorUnavailable,

    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    #[error("Action not verified: {0}")]
    VerificationTimeout(String),

    #[error("Shell error: {0}")]
    Shell(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type DroidClawResult<T> = Result<T, DroidClawError>;
