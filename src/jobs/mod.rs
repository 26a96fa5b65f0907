//! The asynchronous job core.
//!
//! A submitted job gets a record in the [`JobRegistry`] and a background
//! [`JobRunner`] task that probes the input, drives the encoder and records
//! the outcome. While the encoder runs its handle sits in the
//! [`ProcessRegistry`], where the [`CancellationController`] can find and
//! terminate it. The [`Janitor`] drops terminal records after the retention
//! window. [`JobManager`] ties these together behind `submit`, `status`,
//! `cancel` and `list_jobs`.

mod cancel;
mod janitor;
mod manager;
mod processes;
mod registry;
mod runner;
mod types;

pub use cancel::CancellationController;
pub use janitor::{Janitor, DEFAULT_RETENTION};
pub use manager::{JobManager, JobSettings};
pub use processes::{ProcessGuard, ProcessRegistry};
pub use registry::JobRegistry;
pub use runner::JobRunner;
pub use types::{
    compression_percent, compression_ratio, CompressionResult, JobRecord, JobUpdate, NewJob,
    CANCELLED_MESSAGE, COMPLETED_MESSAGE,
};
