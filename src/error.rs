//! Error types for the roster engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// The sheet export could not be read or decoded at all.
    #[error("Unreadable file {file}: {reason}")]
    UnreadableFile { file: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No readable files in batch")]
    EmptyBatch,

    #[error("Ingestion task failed: {0}")]
    Task(String),
}

impl EngineError {
    pub fn unreadable(file: impl Into<String>, reason: impl ToString) -> Self {
        Self::UnreadableFile {
            file: file.into(),
            reason: reason.to_string(),
        }
    }
}
