//! Job records and the updates applied to them.

use chrono::{DateTime, Utc};
use clipshrink_av::{CompressionOptions, MediaSummary};
use clipshrink_common::{Error, JobId, JobStatus, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Message stored on successfully completed jobs.
pub const COMPLETED_MESSAGE: &str = "Compression complete";

/// Message stored on jobs cancelled through the API or CLI.
pub const CANCELLED_MESSAGE: &str = "Job cancelled by user";

/// The observable state of one compression job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub status: JobStatus,
    /// Percent complete, `0..=100`.
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Display name of the submitted file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub options: CompressionOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_info: Option<MediaSummary>,
    /// Present exactly when the job is completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_metadata: Option<CompressionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl JobRecord {
    /// Fresh `queued` record for a submission.
    pub fn queued(job: NewJob) -> Self {
        let now = Utc::now();
        Self {
            id: job.id,
            status: JobStatus::Queued,
            progress: 0,
            created_at: now,
            updated_at: now,
            filename: job.filename,
            input_path: job.input_path,
            output_path: job.output_path,
            options: job.options,
            original_info: None,
            result_metadata: None,
            message: None,
        }
    }

    /// Apply `update` atomically: either every field changes or none does.
    ///
    /// Terminal records are frozen, status changes must follow the state
    /// machine, and result metadata may only arrive with `completed`.
    pub fn apply(&mut self, update: JobUpdate, now: DateTime<Utc>) -> Result<()> {
        let target = update.status.unwrap_or(self.status);

        if self.status.is_terminal() || !self.status.can_transition_to(target) {
            return Err(Error::InvalidTransition {
                id: self.id,
                from: self.status,
                to: target,
            });
        }

        let completing = target == JobStatus::Completed;
        if completing != update.result_metadata.is_some() {
            return Err(Error::internal(format!(
                "job {}: result metadata must accompany exactly the completed status",
                self.id
            )));
        }

        if let Some(progress) = update.progress {
            // Lower values are stale reports from a slower writer.
            if matches!(target, JobStatus::Processing | JobStatus::Completed) {
                self.progress = self.progress.max(progress.min(100));
            }
        }
        self.status = target;
        if let Some(message) = update.message {
            self.message = Some(message);
        }
        if let Some(info) = update.original_info {
            self.original_info = Some(info);
        }
        if let Some(result) = update.result_metadata {
            self.result_metadata = Some(result);
        }
        self.updated_at = now.max(self.updated_at);
        Ok(())
    }
}

/// Fields supplied when a job is submitted.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: JobId,
    pub filename: Option<String>,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub options: CompressionOptions,
}

impl NewJob {
    pub fn new(
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        options: CompressionOptions,
    ) -> Self {
        Self {
            id: JobId::new(),
            filename: None,
            input_path: input_path.into(),
            output_path: output_path.into(),
            options,
        }
    }

    /// Use a pre-allocated id, e.g. one already baked into the upload path.
    pub fn with_id(mut self, id: JobId) -> Self {
        self.id = id;
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

/// A partial change to a [`JobRecord`]. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub original_info: Option<MediaSummary>,
    pub result_metadata: Option<CompressionResult>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    /// `processing` with progress reset to 0.
    pub fn started() -> Self {
        Self::status(JobStatus::Processing).with_progress(0)
    }

    pub fn completed(result: CompressionResult) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(100),
            message: Some(COMPLETED_MESSAGE.to_string()),
            result_metadata: Some(result),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::status(JobStatus::Failed).with_message(message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::status(JobStatus::Cancelled).with_message(message)
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_original_info(mut self, info: MediaSummary) -> Self {
        self.original_info = Some(info);
        self
    }
}

/// Size comparison of a finished compression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionResult {
    /// Bytes.
    pub original_size: u64,
    /// Bytes.
    pub compressed_size: u64,
    pub original_size_mb: f64,
    pub compressed_size_mb: f64,
    pub compression_ratio: f64,
    pub compression_percent: f64,
    pub output_filename: String,
}

impl CompressionResult {
    pub fn from_summaries(
        original: &MediaSummary,
        compressed: &MediaSummary,
        output_filename: impl Into<String>,
    ) -> Self {
        Self {
            original_size: original.size_bytes,
            compressed_size: compressed.size_bytes,
            original_size_mb: original.size_mb,
            compressed_size_mb: compressed.size_mb,
            compression_ratio: compression_ratio(original.size_bytes, compressed.size_bytes),
            compression_percent: compression_percent(original.size_bytes, compressed.size_bytes),
            output_filename: output_filename.into(),
        }
    }
}

/// `original / compressed`, or 0 when the output is empty.
pub fn compression_ratio(original: u64, compressed: u64) -> f64 {
    if compressed == 0 {
        return 0.0;
    }
    original as f64 / compressed as f64
}

/// Space saved as a percentage of the original, or 0 when the input is empty.
pub fn compression_percent(original: u64, compressed: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (original as f64 - compressed as f64) * 100.0 / original as f64
}
