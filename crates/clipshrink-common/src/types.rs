//! Core enums shared by the job core and its callers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a compression job.
///
/// `Queued -> Processing -> {Completed | Failed | Cancelled}`. A queued job may
/// also be cancelled directly. The three terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether no further transitions are permitted.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether a job in this status may still be cancelled.
    pub fn is_cancellable(self) -> bool {
        !self.is_terminal()
    }

    /// Whether moving from `self` to `next` is allowed.
    ///
    /// Re-asserting a non-terminal status (e.g. `Processing -> Processing`) is
    /// permitted so that progress-only updates can carry the current status.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Queued, Queued) => true,
            (Queued, Processing) => true,
            (Queued, Failed) | (Queued, Cancelled) => true,
            (Processing, Processing) => true,
            (Processing, Completed) | (Processing, Failed) | (Processing, Cancelled) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
