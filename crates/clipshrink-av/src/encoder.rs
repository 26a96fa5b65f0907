//! The encoder collaborator as seen by the job core.

use crate::{process_tree, CompressionOptions, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Callback receiving encode progress as a fraction in `0.0..=1.0`.
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// Descriptive metadata about a media artifact.
///
/// Probing is best-effort: only `size_bytes` is always populated (0 when the
/// file cannot be read at all).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaSummary {
    pub size_bytes: u64,
    pub size_mb: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    /// `WIDTHxHEIGHT` of the first video stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

impl MediaSummary {
    /// Summary carrying only the file size.
    pub fn with_size(size_bytes: u64) -> Self {
        Self {
            size_bytes,
            size_mb: size_bytes as f64 / BYTES_PER_MB,
            ..Self::default()
        }
    }
}

/// Everything the encoder needs to run one job.
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub options: CompressionOptions,
    /// Source duration, used to turn encoder timestamps into a fraction.
    pub duration_secs: Option<f64>,
}

impl EncodeRequest {
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        options: CompressionOptions,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            options,
            duration_secs: None,
        }
    }

    pub fn with_duration(mut self, duration_secs: Option<f64>) -> Self {
        self.duration_secs = duration_secs;
        self
    }
}

/// Live reference to a running encoder process.
///
/// Encoder processes are started as process-group leaders, so on Unix the
/// pid doubles as the group id used to signal the whole tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessHandle {
    pid: u32,
}

impl ProcessHandle {
    pub fn new(pid: u32) -> Self {
        Self { pid }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

/// How an encoder invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOutcome {
    /// Whether the process exited successfully.
    pub success: bool,
    /// Diagnostic output (stderr without progress lines).
    pub diagnostics: String,
}

impl EncodeOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            diagnostics: String::new(),
        }
    }

    pub fn failed(diagnostics: impl Into<String>) -> Self {
        Self {
            success: false,
            diagnostics: diagnostics.into(),
        }
    }
}

/// A started encoder invocation.
///
/// `handle` is available immediately so the process can be terminated while
/// `completion` is still being awaited.
pub struct EncoderRun {
    pub handle: ProcessHandle,
    pub completion: BoxFuture<'static, Result<EncodeOutcome>>,
}

impl std::fmt::Debug for EncoderRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderRun")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// An external transcoding engine.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Describe an artifact. Never fails; missing details are left empty.
    async fn probe(&self, path: &Path) -> MediaSummary;

    /// Start encoding `request.input` into `request.output`.
    ///
    /// Returns as soon as the process is running. `progress` may be called
    /// from the completion future any number of times.
    fn run(&self, request: &EncodeRequest, progress: ProgressFn) -> Result<EncoderRun>;

    /// Ask the process tree behind `handle` to stop.
    ///
    /// Returns whether the request was delivered, not whether the process
    /// has exited. Implementations must not signal a process once its
    /// completion future has reaped it, since the pid may have been reused.
    fn terminate(&self, handle: &ProcessHandle) -> bool {
        match process_tree::terminate(handle) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to terminate process tree {}: {}", handle.pid(), e);
                false
            }
        }
    }
}
