//! Common error types used throughout clipshrink.
//!
//! Covers the caller-visible failures of the job core (unknown job, invalid
//! cancel, refused state transition) plus validation and I/O failures.

use crate::{JobId, JobStatus};

/// Common error type for clipshrink.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No job with this id is known.
    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// A job with this id already exists.
    #[error("Job already exists: {0}")]
    DuplicateJob(JobId),

    /// The operation is not allowed for a job in its current status.
    #[error("Cannot {action} job with status: {status}")]
    InvalidState {
        action: &'static str,
        status: JobStatus,
    },

    /// A status update violates the job state machine.
    #[error("Invalid status transition for job {id}: {from} -> {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new Validation error.
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Map this error to an HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound(_) => 404,
            Error::DuplicateJob(_) => 409,
            Error::InvalidState { .. } => 400,
            Error::InvalidTransition { .. } => 409,
            Error::Validation(_) => 400,
            Error::Io(_) => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Short machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::DuplicateJob(_) => "duplicate_job",
            Error::InvalidState { .. } => "invalid_state",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::Validation(_) => "validation_error",
            Error::Io(_) => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
