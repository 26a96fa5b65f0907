//! The authoritative store of job records.

use super::types::{JobRecord, JobUpdate, NewJob};
use chrono::{DateTime, Utc};
use clipshrink_common::{Error, JobId, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;

/// Thread-safe map of job id to [`JobRecord`].
///
/// Every read returns a copy, and every mutation happens under the write
/// lock, so no caller ever observes a half-applied update.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new `queued` record.
    pub fn create(&self, job: NewJob) -> Result<JobRecord> {
        let mut jobs = self.jobs.write();
        if jobs.contains_key(&job.id) {
            return Err(Error::DuplicateJob(job.id));
        }

        let record = JobRecord::queued(job);
        jobs.insert(record.id, record.clone());
        tracing::debug!(job_id = %record.id, "Job record created");
        Ok(record)
    }

    pub fn get(&self, id: JobId) -> Result<JobRecord> {
        self.jobs.read().get(&id).cloned().ok_or(Error::NotFound(id))
    }

    /// Merge `update` into the record and refresh `updated_at`.
    ///
    /// Fails with [`Error::InvalidTransition`] when the state machine forbids
    /// the change; the record is then left untouched.
    pub fn update(&self, id: JobId, update: JobUpdate) -> Result<JobRecord> {
        let mut jobs = self.jobs.write();
        let record = jobs.get_mut(&id).ok_or(Error::NotFound(id))?;
        let previous = record.status;

        record.apply(update, Utc::now())?;

        if record.status != previous {
            tracing::debug!(
                job_id = %id,
                from = %previous,
                to = %record.status,
                "Job status changed"
            );
        }
        Ok(record.clone())
    }

    /// Snapshot of every record.
    pub fn list_all(&self) -> HashMap<JobId, JobRecord> {
        self.jobs.read().clone()
    }

    /// Remove terminal records whose last update is older than `max_age`.
    ///
    /// Returns the number of records removed.
    pub fn evict_terminal(&self, max_age: Duration) -> usize {
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return 0;
        };
        match Utc::now().checked_sub_signed(max_age) {
            Some(cutoff) => self.evict_terminal_before(cutoff),
            None => 0,
        }
    }

    /// Remove terminal records last updated strictly before `cutoff`.
    pub fn evict_terminal_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut jobs = self.jobs.write();
        let before = jobs.len();
        jobs.retain(|id, job| {
            let expired = job.status.is_terminal() && job.updated_at < cutoff;
            if expired {
                tracing::info!(
                    job_id = %id,
                    status = %job.status,
                    "Evicted expired job record"
                );
            }
            !expired
        });
        before - jobs.len()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}
