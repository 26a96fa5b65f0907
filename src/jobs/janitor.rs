//! Eviction of old terminal job records.

use super::registry::JobRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How long terminal records are kept by default.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(3600);

/// Removes terminal records once they are older than the retention window.
#[derive(Debug, Clone)]
pub struct Janitor {
    jobs: Arc<JobRegistry>,
    retention: Duration,
}

impl Janitor {
    pub fn new(jobs: Arc<JobRegistry>, retention: Duration) -> Self {
        Self { jobs, retention }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Run one eviction pass, returning how many records were removed.
    pub fn sweep(&self) -> usize {
        let removed = self.jobs.evict_terminal(self.retention);
        if removed > 0 {
            tracing::debug!(removed, "Swept expired job records");
        }
        removed
    }

    /// Start a background task that sweeps every `interval`.
    ///
    /// Abort the returned handle to stop it.
    pub fn start(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                self.sweep();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::types::{JobUpdate, NewJob};
    use clipshrink_av::CompressionOptions;

    fn finished_job(jobs: &JobRegistry) -> clipshrink_common::JobId {
        let id = jobs
            .create(NewJob::new("/in.mp4", "/out.mp4", CompressionOptions::default()))
            .unwrap()
            .id;
        jobs.update(id, JobUpdate::failed("boom")).unwrap();
        id
    }

    #[test]
    fn test_sweep_respects_retention() {
        let jobs = Arc::new(JobRegistry::new());
        finished_job(&jobs);

        let patient = Janitor::new(jobs.clone(), DEFAULT_RETENTION);
        assert_eq!(patient.sweep(), 0);
        assert_eq!(jobs.len(), 1);

        let eager = Janitor::new(jobs.clone(), Duration::ZERO);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(eager.sweep(), 1);
        assert!(jobs.is_empty());
    }

    #[test]
    fn test_sweep_keeps_active_jobs() {
        let jobs = Arc::new(JobRegistry::new());
        jobs.create(NewJob::new("/in.mp4", "/out.mp4", CompressionOptions::default()))
            .unwrap();

        let janitor = Janitor::new(jobs.clone(), Duration::ZERO);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(janitor.sweep(), 0);
        assert_eq!(jobs.len(), 1);
    }

    #[tokio::test]
    async fn test_background_sweep() {
        let jobs = Arc::new(JobRegistry::new());
        finished_job(&jobs);

        let handle = Janitor::new(jobs.clone(), Duration::ZERO).start(Duration::from_millis(20));

        for _ in 0..50 {
            if jobs.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(jobs.is_empty());

        handle.abort();
    }
}
