//! Error types for the conversational engine.

use docent_core::error::DocentError;

/// Errors from the chat engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("agent is not configured yet")]
    NotConfigured,
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("ingestion failed: {0}")]
    Ingest(String),
    #[error("model error: {0}")]
    Model(String),
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DocentError> for ChatError {
    fn from(err: DocentError) -> Self {
        match err {
            DocentError::InvalidSettings(msg) => ChatError::InvalidSettings(msg),
            DocentError::NotConfigured => ChatError::NotConfigured,
            DocentError::Model(msg) => ChatError::Model(msg),
            DocentError::UnsupportedFormat(_)
            | DocentError::Extraction(_)
            | DocentError::Embedding(_) => ChatError::Ingest(err.to_string()),
            other => ChatError::Internal(other.to_string()),
        }
    }
}
