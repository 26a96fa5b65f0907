//! User-initiated cancellation.

use super::processes::ProcessRegistry;
use super::registry::JobRegistry;
use super::types::{JobRecord, JobUpdate, CANCELLED_MESSAGE};
use clipshrink_av::Encoder;
use clipshrink_common::{Error, JobId, Result};
use std::sync::Arc;

/// Cancels queued or running jobs and stops their encoder.
#[derive(Clone)]
pub struct CancellationController {
    jobs: Arc<JobRegistry>,
    processes: Arc<ProcessRegistry>,
    encoder: Arc<dyn Encoder>,
}

impl CancellationController {
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

    /// Cancel `id`.
    ///
    /// The record is marked `cancelled` before the encoder is signalled, so
    /// the runner always sees the cancellation once the process dies. Failing
    /// to signal the process is logged but does not undo the cancellation.
    pub fn cancel(&self, id: JobId) -> Result<JobRecord> {
        let job = self.jobs.get(id)?;
        if !job.status.is_cancellable() {
            return Err(Error::InvalidState {
                action: "cancel",
                status: job.status,
            });
        }

        let record = match self.jobs.update(id, JobUpdate::cancelled(CANCELLED_MESSAGE)) {
            Ok(record) => record,
            // Finished between the check above and the update.
            Err(Error::InvalidTransition { from, .. }) => {
                return Err(Error::InvalidState {
                    action: "cancel",
                    status: from,
                })
            }
            Err(e) => return Err(e),
        };

        match self.processes.lookup(id) {
            Some(handle) => {
                if self.encoder.terminate(&handle) {
                    tracing::info!(job_id = %id, pid = handle.pid(), "Terminated encoder");
                } else {
                    tracing::warn!(
                        job_id = %id,
                        pid = handle.pid(),
                        "Could not terminate encoder; job is cancelled regardless"
                    );
                }
            }
            None => tracing::debug!(job_id = %id, "No running encoder to terminate"),
        }

        tracing::info!("Job {} cancelled", id);
        Ok(record)
    }
}
