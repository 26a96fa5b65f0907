//! Live encoder processes, keyed by job.

use clipshrink_av::ProcessHandle;
use clipshrink_common::JobId;
use dashmap::DashMap;
use std::sync::Arc;

/// Map of job id to the handle of its running encoder.
///
/// A job has an entry only between the encoder starting and the runner
/// observing its exit.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    handles: DashMap<JobId, ProcessHandle>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the handle for `id`, replacing any stale entry.
    pub fn register(&self, id: JobId, handle: ProcessHandle) {
        if let Some(stale) = self.handles.insert(id, handle) {
            tracing::warn!(
                job_id = %id,
                stale_pid = stale.pid(),
                "Replaced stale process handle"
            );
        }
    }

    /// Remove the entry for `id`; absent entries are fine.
    pub fn unregister(&self, id: JobId) {
        self.handles.remove(&id);
    }

    pub fn lookup(&self, id: JobId) -> Option<ProcessHandle> {
        self.handles.get(&id).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Keeps a handle registered for as long as it is alive.
///
/// Dropping the guard (including during a panic unwind) removes the entry,
/// unless another handle has since been registered for the same job.
///
/// The guard may outlive the process by the time it takes the runner to see
/// the exit. A cancel in that window still finds the handle, so encoders
/// refuse to signal a process they have already reaped.
#[derive(Debug)]
pub struct ProcessGuard {
    registry: Arc<ProcessRegistry>,
    id: JobId,
    handle: ProcessHandle,
}

impl ProcessGuard {
    pub fn register(registry: Arc<ProcessRegistry>, id: JobId, handle: ProcessHandle) -> Self {
        registry.register(id, handle);
        Self {
            registry,
            id,
            handle,
        }
    }

    pub fn handle(&self) -> ProcessHandle {
        self.handle
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        let handle = self.handle;
        self.registry
            .handles
            .remove_if(&self.id, |_, current| *current == handle);
    }
}
