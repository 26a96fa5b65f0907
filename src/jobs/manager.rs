//! The public face of the job core: submit, status, cancel, list.

use super::cancel::CancellationController;
use super::janitor::{Janitor, DEFAULT_RETENTION};
use super::processes::ProcessRegistry;
use super::registry::JobRegistry;
use super::runner::JobRunner;
use super::types::{JobRecord, NewJob};
use clipshrink_av::Encoder;
use clipshrink_common::{JobId, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Tunables for a [`JobManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSettings {
    /// How long terminal records are kept.
    pub retention: Duration,
    /// Upper bound on concurrently running jobs; `None` is unbounded.
    pub max_concurrent: Option<usize>,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            retention: DEFAULT_RETENTION,
            max_concurrent: None,
        }
    }
}

/// Owns the registries and hands work to the runner.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct JobManager {
    jobs: Arc<JobRegistry>,
    processes: Arc<ProcessRegistry>,
    runner: JobRunner,
    canceller: CancellationController,
    janitor: Janitor,
    limiter: Option<Arc<Semaphore>>,
}

impl JobManager {
    pub fn new(encoder: Arc<dyn Encoder>, settings: JobSettings) -> Self {
        let jobs = Arc::new(JobRegistry::new());
        let processes = Arc::new(ProcessRegistry::new());
        Self {
            runner: JobRunner::new(jobs.clone(), processes.clone(), encoder.clone()),
            canceller: CancellationController::new(jobs.clone(), processes.clone(), encoder),
            janitor: Janitor::new(jobs.clone(), settings.retention),
            limiter: settings
                .max_concurrent
                .map(|permits| Arc::new(Semaphore::new(permits.max(1)))),
            jobs,
            processes,
        }
    }

    /// Register a `queued` job and start running it in the background.
    ///
    /// Returns as soon as the record exists. Must be called from within a
    /// Tokio runtime.
    pub fn submit(&self, job: NewJob) -> Result<JobId> {
        let record = self.jobs.create(job)?;
        tracing::info!(
            job_id = %record.id,
            input = ?record.input_path,
            "Job queued"
        );
        self.runner.spawn(record.id, self.limiter.clone());
        Ok(record.id)
    }

    /// Current record for `id`.
    pub fn status(&self, id: JobId) -> Result<JobRecord> {
        self.jobs.get(id)
    }

    /// Cancel a queued or running job.
    pub fn cancel(&self, id: JobId) -> Result<JobRecord> {
        self.canceller.cancel(id)
    }

    /// Every retained job, after evicting expired terminal records.
    pub fn list_jobs(&self) -> HashMap<JobId, JobRecord> {
        self.janitor.sweep();
        self.jobs.list_all()
    }

    /// Evict expired terminal records now.
    pub fn sweep(&self) -> usize {
        self.janitor.sweep()
    }

    /// Start sweeping every `interval` in the background.
    pub fn start_janitor(&self, interval: Duration) -> JoinHandle<()> {
        tracing::info!(
            interval_secs = interval.as_secs(),
            retention_secs = self.janitor.retention().as_secs(),
            "Starting job janitor"
        );
        self.janitor.clone().start(interval)
    }

    /// Poll until `id` reaches a terminal status.
    pub async fn wait_for(&self, id: JobId, poll: Duration) -> Result<JobRecord> {
        loop {
            let job = self.jobs.get(id)?;
            if job.status.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(poll).await;
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.jobs
    }

    pub fn processes(&self) -> &Arc<ProcessRegistry> {
        &self.processes
    }
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("jobs", &self.jobs.len())
            .field("running", &self.processes.len())
            .field("retention", &self.janitor.retention())
            .finish_non_exhaustive()
    }
}
