//! Clipshrink-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across clipshrink:
//!
//! - **Typed IDs**: [`JobId`], an unguessable UUIDv4 wrapper
//! - **Core Types**: the [`JobStatus`] state machine
//! - **Path Utilities**: video extension checks and upload filename sanitising
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use clipshrink_common::{JobId, JobStatus, Error, Result};
//! use clipshrink_common::paths::is_video_file;
//! use std::path::Path;
//!
//! let job_id = JobId::new();
//! assert!(JobStatus::Queued.can_transition_to(JobStatus::Processing));
//! assert!(is_video_file(Path::new("holiday.mkv")));
//!
//! fn example(id: JobId) -> Result<()> {
//!     Err(Error::NotFound(id))
//! }
//! assert!(example(job_id).is_err());
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
