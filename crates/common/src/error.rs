use std::time::Duration;

use thiserror::Error;

/// The triggering event is malformed. Never retried: redelivery carries the same data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

/// Fault raised by a directory store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Decode error: {0}")]
    Decode(String),
}

/// The recipient cannot be reached through the directory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("User not found: {0}")]
    NotFound(String),

    #[error("User {0} has no device tokens")]
    EmptyTokenSet(String),

    #[error("Directory store error: {0}")]
    Store(String),
}

impl From<StoreError> for LookupError {
    fn from(err: StoreError) -> Self {
        LookupError::Store(err.to_string())
    }
}

/// Fatal, request-level gateway failure. No outcome exists when this is raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Push gateway unreachable: {0}")]
    Transport(String),

    #[error("Push gateway did not respond within {0:?}")]
    Timeout(Duration),

    #[error("Push gateway rejected the request: {0}")]
    Rejected(String),
}

/// Any failure that stops a pipeline invocation before an outcome is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl PipelineError {
    /// Name of the pipeline stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "parse",
            PipelineError::Lookup(_) => "resolve_recipient",
            PipelineError::Dispatch(_) => "dispatch",
        }
    }

    /// Short machine-readable error kind for logs and adapter responses.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Validation(ValidationError::MissingField(_)) => "missing_field",
            PipelineError::Lookup(LookupError::NotFound(_)) => "not_found",
            PipelineError::Lookup(LookupError::EmptyTokenSet(_)) => "empty_token_set",
            PipelineError::Lookup(LookupError::Store(_)) => "store",
            PipelineError::Dispatch(DispatchError::Transport(_)) => "transport",
            PipelineError::Dispatch(DispatchError::Timeout(_)) => "timeout",
            PipelineError::Dispatch(DispatchError::Rejected(_)) => "rejected",
        }
    }
}
