//! Command-line batch compression on top of the job core.
//!
//! Inputs are expanded (directories are walked for video files), each file is
//! submitted as a job, and results are printed as jobs finish. The manager's
//! concurrency limit bounds how many encoders run at once.

use crate::jobs::{JobManager, JobRecord, NewJob};
use anyhow::{Context, Result};
use clipshrink_av::CompressionOptions;
use clipshrink_common::paths::is_video_file;
use clipshrink_common::{Error, JobId, JobStatus};
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// One input file and where its compressed copy goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    /// Final record of every job, in completion order.
    pub jobs: Vec<JobRecord>,
}

/// Expand `inputs` into video files.
///
/// Directories are walked recursively and filtered by extension; plain files
/// are taken as given. Missing paths are reported and skipped.
pub fn collect_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        tracing::warn!("Skipping unreadable entry under {:?}: {}", input, e);
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file() && is_video_file(entry.path()))
                .map(|entry| entry.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            println!("Warning: Input '{}' does not exist, skipping.", input.display());
        }
    }

    files
}

/// Decide the output path for every input.
///
/// A single input is written straight to `output` when that names a video
/// file; otherwise `output` is a directory receiving `compressed_<name>`.
pub fn plan_outputs(files: Vec<PathBuf>, output: &Path) -> Vec<BatchItem> {
    if files.len() == 1 && !output.is_dir() && is_video_file(output) {
        return files
            .into_iter()
            .map(|input| BatchItem {
                input,
                output: output.to_path_buf(),
            })
            .collect();
    }

    files
        .into_iter()
        .map(|input| {
            let name = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            BatchItem {
                output: output.join(format!("compressed_{}", name)),
                input,
            }
        })
        .collect()
}

/// Submit every item and wait for all of them.
///
/// When `interrupt` resolves first, every unfinished job is cancelled and the
/// run waits for the cancellations to settle.
pub async fn run_batch<F>(
    manager: &JobManager,
    items: Vec<BatchItem>,
    options: &CompressionOptions,
    interrupt: F,
) -> Result<BatchReport>
where
    F: Future<Output = ()>,
{
    let mut submitted: Vec<JobId> = Vec::with_capacity(items.len());
    for item in &items {
        if let Some(parent) = item.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create output directory {:?}", parent))?;
        }

        let filename = item
            .input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let job = NewJob::new(&item.input, &item.output, options.clone()).with_filename(filename);
        println!("Processing: {}", item.input.display());
        submitted.push(manager.submit(job)?);
    }

    let mut report = BatchReport {
        total: submitted.len(),
        ..BatchReport::default()
    };

    let mut pending: FuturesUnordered<_> = submitted
        .iter()
        .map(|&id| manager.wait_for(id, POLL_INTERVAL))
        .collect();

    tokio::pin!(interrupt);
    let mut interrupted = false;

    loop {
        tokio::select! {
            next = pending.next() => match next {
                Some(result) => {
                    let job = result?;
                    println!("{}", describe(&job));
                    if job.status == JobStatus::Completed {
                        report.succeeded += 1;
                    }
                    report.jobs.push(job);
                }
                None => break,
            },
            _ = &mut interrupt, if !interrupted => {
                interrupted = true;
                println!("Interrupted, cancelling running jobs...");
                cancel_all(manager, &submitted);
            }
        }
    }

    Ok(report)
}

fn cancel_all(manager: &JobManager, ids: &[JobId]) {
    for &id in ids {
        match manager.cancel(id) {
            Ok(_) | Err(Error::InvalidState { .. }) => {}
            Err(e) => tracing::warn!("Failed to cancel job {}: {}", id, e),
        }
    }
}

/// Human-readable summary of a finished job.
pub fn describe(job: &JobRecord) -> String {
    match (&job.status, &job.result_metadata) {
        (JobStatus::Completed, Some(result)) => {
            let elapsed = (job.updated_at - job.created_at).num_milliseconds() as f64 / 1000.0;
            format!(
                "Compression complete:\n\
                 Original size: {:.2} MB\n\
                 Compressed size: {:.2} MB\n\
                 Compression ratio: {:.2}x\n\
                 Time taken: {:.2} seconds",
                result.original_size_mb, result.compressed_size_mb, result.compression_ratio, elapsed
            )
        }
        _ => job
            .message
            .clone()
            .unwrap_or_else(|| format!("Job {} {}", job.id, job.status)),
    }
}
