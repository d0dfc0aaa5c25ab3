use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Artifact resolution failed: {path:?} - {message}")]
    ResolutionError {
        path: PathBuf,
        message: String,
    },

    #[error("Artifact store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Configuration mismatch: {0}")]
    ConfigMismatch(String),

    #[error("Workflow submission failed: {0}")]
    SubmissionError(String),

    #[error("File error: {path:?} - {message}")]
    FileError {
        path: PathBuf,
        message: String,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Task failed: {task} - {message}")]
    TaskError {
        task: String,
        message: String,
    },

    #[error("External tool error: {tool} - {message}")]
    ExternalToolError {
        tool: String,
        message: String,
    },
}

pub type FlowResult<T> = std::result::Result<T, FlowError>;
