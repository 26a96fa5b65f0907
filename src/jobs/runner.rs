//! Drives one job from `queued` to a terminal status.

use super::processes::{ProcessGuard, ProcessRegistry};
use super::registry::JobRegistry;
use super::types::{CompressionResult, JobRecord, JobUpdate};
use anyhow::Context;
use clipshrink_av::{EncodeRequest, Encoder, EncoderRun, ProgressFn};
use clipshrink_common::{Error, JobId, JobStatus};
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Progress once the input has been probed.
const PROBED_PROGRESS: u8 = 10;
/// Highest progress reported while the encoder is still running.
const ENCODING_CEILING: u8 = 99;

/// Executes compression jobs against an [`Encoder`].
#[derive(Clone)]
pub struct JobRunner {
    jobs: Arc<JobRegistry>,
    processes: Arc<ProcessRegistry>,
    encoder: Arc<dyn Encoder>,
}

impl JobRunner {
    pub fn new(
        jobs: Arc<JobRegistry>,
        processes: Arc<ProcessRegistry>,
        encoder: Arc<dyn Encoder>,
    ) -> Self {
        Self {
            jobs,
            processes,
            encoder,
        }
    }

    /// Run `id` on a background task and return immediately.
    ///
    /// With a `limiter`, the job waits for a permit while still `queued`. A
    /// panic inside the job is turned into a `failed` record.
    pub fn spawn(&self, id: JobId, limiter: Option<Arc<Semaphore>>) -> JoinHandle<()> {
        let runner = self.clone();
        tokio::spawn(async move {
            let _permit = match limiter {
                Some(semaphore) => match semaphore.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        runner.record_failure(id, "Job scheduler is shut down");
                        return;
                    }
                },
                None => None,
            };

            let worker = {
                let runner = runner.clone();
                tokio::spawn(async move { runner.run(id).await })
            };
            if let Err(err) = worker.await {
                tracing::error!(job_id = %id, "Job task panicked: {}", err);
                runner.record_failure(id, format!("Job task panicked: {}", err));
            }
        })
    }

    /// Run `id` to completion on the current task.
    ///
    /// Never returns an error: anything that goes wrong ends up in the
    /// job's record.
    pub async fn run(&self, id: JobId) {
        if let Err(e) = self.execute(id).await {
            let message = format!("{:#}", e);
            tracing::error!(job_id = %id, "Job failed: {}", message);
            self.record_failure(id, message);
        }
    }

    async fn execute(&self, id: JobId) -> anyhow::Result<()> {
        let job = self.jobs.get(id)?;

        if !proceed(self.jobs.update(id, JobUpdate::started()))? {
            return Ok(());
        }
        tracing::info!("Processing job {}: {:?}", id, job.input_path);

        let original = self.encoder.probe(&job.input_path).await;
        let probed = JobUpdate::progress(PROBED_PROGRESS).with_original_info(original.clone());
        if !proceed(self.jobs.update(id, probed))? {
            return Ok(());
        }

        let request = EncodeRequest::new(&job.input_path, &job.output_path, job.options.clone())
            .with_duration(original.duration_secs);
        let EncoderRun { handle, completion } = self
            .encoder
            .run(&request, self.progress_reporter(id))
            .context("Failed to start encoder")?;

        let guard = ProcessGuard::register(self.processes.clone(), id, handle);
        // A cancel that raced the registration found no handle to stop.
        if self.jobs.get(id)?.status == JobStatus::Cancelled {
            tracing::info!(job_id = %id, "Cancelled during encoder start-up, terminating");
            self.encoder.terminate(&handle);
        }

        let outcome = completion.await;
        // Unregister only once the encoder has observed the exit; until then
        // a cancel must still be able to reach the process.
        drop(guard);

        if self.jobs.get(id)?.status == JobStatus::Cancelled {
            tracing::info!("Job {} was cancelled", id);
            discard_output(&job.output_path).await;
            return Ok(());
        }

        let outcome = outcome.context("Encoder did not finish")?;
        if !outcome.success {
            let diagnostics = if outcome.diagnostics.is_empty() {
                "encoder exited with an error"
            } else {
                outcome.diagnostics.as_str()
            };
            return self
                .finish(&job, JobUpdate::failed(format!("FFmpeg error: {}", diagnostics)))
                .await;
        }

        let compressed = self.encoder.probe(&job.output_path).await;
        let output_filename = job
            .output_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let result = CompressionResult::from_summaries(&original, &compressed, output_filename);
        tracing::info!(
            job_id = %id,
            ratio = result.compression_ratio,
            saved_percent = result.compression_percent,
            "Compression finished"
        );
        self.finish(&job, JobUpdate::completed(result)).await
    }

    /// Record the terminal outcome unless a cancel got there first.
    async fn finish(&self, job: &JobRecord, update: JobUpdate) -> anyhow::Result<()> {
        match self.jobs.update(job.id, update) {
            Ok(record) => {
                tracing::info!("Job {} {}", job.id, record.status);
                Ok(())
            }
            Err(Error::InvalidTransition {
                from: JobStatus::Cancelled,
                ..
            }) => {
                tracing::info!("Job {} was cancelled", job.id);
                discard_output(&job.output_path).await;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn record_failure(&self, id: JobId, message: impl Into<String>) {
        match self.jobs.update(id, JobUpdate::failed(message)) {
            Ok(_) => {}
            Err(Error::InvalidTransition { from, .. }) => {
                tracing::debug!(job_id = %id, "Job already {}, failure not recorded", from);
            }
            Err(e) => tracing::warn!(job_id = %id, "Failed to record job failure: {}", e),
        }
    }

    fn progress_reporter(&self, id: JobId) -> ProgressFn {
        let jobs = self.jobs.clone();
        let last = AtomicU8::new(PROBED_PROGRESS);
        Arc::new(move |fraction: f64| {
            let percent = encoding_percent(fraction);
            if last.fetch_max(percent, Ordering::Relaxed) >= percent {
                return;
            }
            if let Err(e) = jobs.update(id, JobUpdate::progress(percent)) {
                tracing::debug!(job_id = %id, "Progress update dropped: {}", e);
            }
        })
    }
}

/// Whether the runner should keep going after a status write.
///
/// A refused transition means the job was cancelled (or otherwise finished)
/// underneath us.
fn proceed(result: clipshrink_common::Result<JobRecord>) -> anyhow::Result<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(Error::InvalidTransition { id, from, .. }) => {
            tracing::info!("Job {} is {}, not running it", id, from);
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Map an encoder fraction onto the `10..=99` progress band.
fn encoding_percent(fraction: f64) -> u8 {
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let band = f64::from(ENCODING_CEILING - PROBED_PROGRESS);
    PROBED_PROGRESS + (fraction * band).round() as u8
}

/// Remove a partial output; a missing file is fine.
async fn discard_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::info!("Removed partial output {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove partial output {:?}: {}", path, e),
    }
}
