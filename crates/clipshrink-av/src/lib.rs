//! # clipshrink-av
//!
//! The encoder side of clipshrink.
//!
//! This crate provides:
//! - The [`Encoder`] trait: probe an artifact, start an encode, terminate it
//! - [`FfmpegEncoder`], the production implementation driving the `ffmpeg`
//!   and `ffprobe` command-line tools
//! - Per-platform process-tree termination ([`process_tree`])
//! - External tool detection ([`check_tools`])
//!
//! ## Example
//!
//! ```no_run
//! use clipshrink_av::{CompressionOptions, EncodeRequest, Encoder, FfmpegEncoder};
//! use std::sync::Arc;
//!
//! # async fn example() -> clipshrink_av::Result<()> {
//! let encoder = FfmpegEncoder::discover(None, None)?;
//! let request = EncodeRequest::new("in.mp4", "out.mp4", CompressionOptions::default());
//! let run = encoder.run(&request, Arc::new(|fraction| println!("{:.0}%", fraction * 100.0)))?;
//! let outcome = run.completion.await?;
//! assert!(outcome.success);
//! # Ok(())
//! # }
//! ```

mod encoder;
mod error;
pub mod ffmpeg;
pub mod options;
pub mod probe;
pub mod process_tree;
pub mod tools;

// Re-exports
pub use encoder::{
    EncodeOutcome, EncodeRequest, Encoder, EncoderRun, MediaSummary, ProcessHandle, ProgressFn,
};
pub use error::{Error, Result};
pub use ffmpeg::FfmpegEncoder;
pub use options::CompressionOptions;
pub use tools::{check_tool, check_tools, require_tool, ToolInfo};
