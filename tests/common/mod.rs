//! Shared test harness for integration tests.
//!
//! Provides [`StubEncoder`], a scriptable [`Encoder`] that never spawns a real
//! process, plus helpers to build a [`JobManager`] or a full [`AppContext`]
//! around it and to wait for asynchronous job state.

#![allow(dead_code)]

use async_trait::async_trait;
use clipshrink::config::Config;
use clipshrink::jobs::{JobManager, JobRecord, JobSettings, NewJob};
use clipshrink::server::AppContext;
use clipshrink_av::{
    CompressionOptions, EncodeOutcome, EncodeRequest, Encoder, EncoderRun, MediaSummary,
    ProcessHandle, ProgressFn,
};
use clipshrink_common::{JobId, JobStatus};
use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const MB: u64 = 1024 * 1024;

/// How long the wait helpers poll before giving up.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// A fake encoder whose behaviour is configured up front.
///
/// Each `run` hands out a fresh fake pid backed by a [`CancellationToken`];
/// `terminate` cancels the token, which ends the fake process with a failed
/// outcome. When `write_output` is set the output file is created as soon as
/// the run starts, so cancellation clean-up can be observed.
pub struct StubEncoder {
    delay: Duration,
    failure: Option<String>,
    input_size: u64,
    output_size: u64,
    ticks: Vec<f64>,
    write_output: bool,
    panic_in_run: bool,
    deliver_termination: bool,

    runs: AtomicUsize,
    next_pid: AtomicU32,
    running: DashMap<u32, CancellationToken>,
    terminated: Mutex<Vec<ProcessHandle>>,
    outputs: Mutex<HashSet<PathBuf>>,
}

impl StubEncoder {
    /// Instant success: 100 MB in, 10 MB out.
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            failure: None,
            input_size: 100 * MB,
            output_size: 10 * MB,
            ticks: vec![0.25, 0.5, 0.75],
            write_output: true,
            panic_in_run: false,
            deliver_termination: true,
            runs: AtomicUsize::new(0),
            next_pid: AtomicU32::new(10_000),
            running: DashMap::new(),
            terminated: Mutex::new(Vec::new()),
            outputs: Mutex::new(HashSet::new()),
        }
    }

    /// Keep the fake process alive for `delay` unless terminated.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Exit unsuccessfully with `diagnostics`.
    pub fn failing(mut self, diagnostics: &str) -> Self {
        self.failure = Some(diagnostics.to_string());
        self
    }

    pub fn with_sizes(mut self, input: u64, output: u64) -> Self {
        self.input_size = input;
        self.output_size = output;
        self
    }

    pub fn without_output(mut self) -> Self {
        self.write_output = false;
        self
    }

    /// Panic while the encoder is running.
    pub fn panicking(mut self) -> Self {
        self.panic_in_run = true;
        self
    }

    /// Report termination as failed and keep running.
    pub fn ignoring_termination(mut self) -> Self {
        self.deliver_termination = false;
        self
    }

    /// Number of times `run` was called.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Handles passed to `terminate`, in order.
    pub fn terminated(&self) -> Vec<ProcessHandle> {
        self.terminated.lock().clone()
    }
}

impl Default for StubEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Encoder for StubEncoder {
    async fn probe(&self, path: &Path) -> MediaSummary {
        if self.outputs.lock().contains(path) {
            MediaSummary::with_size(self.output_size)
        } else {
            MediaSummary::with_size(self.input_size)
        }
    }

    fn run(&self, request: &EncodeRequest, progress: ProgressFn) -> clipshrink_av::Result<EncoderRun> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.outputs.lock().insert(request.output.clone());

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();
        self.running.insert(pid, token.clone());

        let delay = self.delay;
        let failure = self.failure.clone();
        let ticks = self.ticks.clone();
        let panic_in_run = self.panic_in_run;
        let output = self.write_output.then(|| request.output.clone());

        let completion = async move {
            if let Some(output) = output {
                tokio::fs::write(&output, b"partial").await?;
            }
            for tick in ticks {
                progress(tick);
            }
            if panic_in_run {
                tokio::time::sleep(Duration::from_millis(20)).await;
                panic!("stub encoder exploded");
            }

            tokio::select! {
                _ = token.cancelled() => Ok::<_, clipshrink_av::Error>(EncodeOutcome::failed("terminated by signal")),
                _ = tokio::time::sleep(delay) => Ok(match failure {
                    Some(diagnostics) => EncodeOutcome::failed(diagnostics),
                    None => EncodeOutcome::succeeded(),
                }),
            }
        }
        .boxed();

        Ok(EncoderRun {
            handle: ProcessHandle::new(pid),
            completion,
        })
    }

    fn terminate(&self, handle: &ProcessHandle) -> bool {
        self.terminated.lock().push(*handle);
        if !self.deliver_termination {
            return false;
        }
        match self.running.get(&handle.pid()) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Manager with default settings around `encoder`.
pub fn manager(encoder: Arc<StubEncoder>) -> JobManager {
    JobManager::new(encoder, JobSettings::default())
}

pub fn manager_with(encoder: Arc<StubEncoder>, settings: JobSettings) -> JobManager {
    JobManager::new(encoder, settings)
}

/// A job reading `<dir>/<name>` and writing `<dir>/compressed_<name>`.
pub fn new_job(dir: &Path, name: &str) -> NewJob {
    NewJob::new(
        dir.join(name),
        dir.join(format!("compressed_{}", name)),
        CompressionOptions::default(),
    )
    .with_filename(name)
}

/// Poll until `check` accepts the job's record.
pub async fn wait_until<F>(manager: &JobManager, id: JobId, mut check: F) -> JobRecord
where
    F: FnMut(&JobRecord) -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    loop {
        let job = manager.status(id).expect("job disappeared while waiting");
        if check(&job) {
            return job;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting on job {} (last status {})",
            id,
            job.status
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn wait_for_status(manager: &JobManager, id: JobId, status: JobStatus) -> JobRecord {
    wait_until(manager, id, |job| job.status == status).await
}

/// Poll until `condition` holds.
pub async fn eventually<F>(what: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {}", what);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Config whose storage directories live under `root`.
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.storage.upload_dir = root.join("uploads");
    config.storage.output_dir = root.join("compressed");
    config
}

/// Full application context around `encoder`, storing files under `root`.
pub fn test_context(encoder: Arc<StubEncoder>, root: &Path) -> AppContext {
    let config = test_config(root);
    std::fs::create_dir_all(&config.storage.upload_dir).unwrap();
    std::fs::create_dir_all(&config.storage.output_dir).unwrap();
    AppContext::new(manager(encoder), config)
}
