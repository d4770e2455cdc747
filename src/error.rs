//! Error handling for the skill matcher

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SkillMatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Embedding generation error: {0}")]
    Embedding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Output formatting error: {0}")]
    Output(String),

    #[error("Worker task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, SkillMatchError>;

/// Coarse error category reported to callers in failure records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    ModelUnavailable,
    Extraction,
    Decode,
    Embedding,
    Io,
    Serialization,
    InvalidInput,
    Output,
    Task,
}

impl SkillMatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SkillMatchError::Config(_) => ErrorKind::Config,
            SkillMatchError::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            SkillMatchError::Extraction(_) => ErrorKind::Extraction,
            SkillMatchError::Decode(_) => ErrorKind::Decode,
            SkillMatchError::Embedding(_) => ErrorKind::Embedding,
            SkillMatchError::Io(_) => ErrorKind::Io,
            SkillMatchError::Serialization(_) => ErrorKind::Serialization,
            SkillMatchError::InvalidInput(_) => ErrorKind::InvalidInput,
            SkillMatchError::Output(_) => ErrorKind::Output,
            SkillMatchError::Task(_) => ErrorKind::Task,
        }
    }

    /// Fatal errors invalidate the whole run; the rest are per-document.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SkillMatchError::Config(_)
                | SkillMatchError::ModelUnavailable(_)
                | SkillMatchError::Extraction(_)
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Config => "config",
            ErrorKind::ModelUnavailable => "model_unavailable",
            ErrorKind::Extraction => "extraction",
            ErrorKind::Decode => "decode",
            ErrorKind::Embedding => "embedding",
            ErrorKind::Io => "io",
            ErrorKind::Serialization => "serialization",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Output => "output",
            ErrorKind::Task => "task",
        };
        write!(f, "{}", name)
    }
}

impl From<tokio::task::JoinError> for SkillMatchError {
    fn from(err: tokio::task::JoinError) -> Self {
        SkillMatchError::Task(err.to_string())
    }
}

impl From<csv::Error> for SkillMatchError {
    fn from(err: csv::Error) -> Self {
        SkillMatchError::Output(err.to_string())
    }
}

impl From<toml::de::Error> for SkillMatchError {
    fn from(err: toml::de::Error) -> Self {
        SkillMatchError::Config(err.to_string())
    }
}
