//! FFmpeg-backed [`Encoder`].

use crate::encoder::ProgressFn;
use crate::tools::get_tool_path;
use crate::{
    probe, process_tree, EncodeOutcome, EncodeRequest, Encoder, EncoderRun, Error, MediaSummary,
    ProcessHandle, Result,
};
use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Keys emitted by `ffmpeg -progress`.
const PROGRESS_KEYS: &[&str] = &[
    "frame",
    "fps",
    "bitrate",
    "total_size",
    "out_time_us",
    "out_time_ms",
    "out_time",
    "dup_frames",
    "drop_frames",
    "speed",
    "progress",
];

/// Pids of started encoders that have not been reaped yet.
///
/// A pid leaves the set before the child is reaped, and `terminate` only
/// signals while holding the lock, so a reaped (and possibly reused) pid is
/// never signalled.
type LivePids = Arc<Mutex<HashSet<u32>>>;

/// Membership of one pid in [`LivePids`], released on drop.
struct LiveEntry {
    live: LivePids,
    pid: u32,
}

impl LiveEntry {
    fn insert(live: &LivePids, pid: u32) -> Self {
        live.lock().insert(pid);
        Self {
            live: live.clone(),
            pid,
        }
    }
}

impl Drop for LiveEntry {
    fn drop(&mut self) {
        self.live.lock().remove(&self.pid);
    }
}

/// Runs compressions with the `ffmpeg` CLI and probes with `ffprobe`.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    live: LivePids,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            live: LivePids::default(),
        }
    }

    /// Locate the tools, preferring configured paths over `PATH`.
    pub fn discover(ffmpeg: Option<&Path>, ffprobe: Option<&Path>) -> Result<Self> {
        Ok(Self::new(
            get_tool_path("ffmpeg", ffmpeg)?,
            get_tool_path("ffprobe", ffprobe)?,
        ))
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg
    }

    /// Build the ffmpeg argument list for a request.
    pub fn build_args(request: &EncodeRequest) -> Vec<String> {
        let options = &request.options;
        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-nostats".into(),
            "-progress".into(),
            "pipe:2".into(),
            "-i".into(),
            request.input.to_string_lossy().into_owned(),
        ];

        if let Some(max_width) = options.max_width {
            args.push("-vf".into());
            args.push(format!("scale='min({},iw)':-2", max_width));
        }

        args.extend([
            "-c:v".into(),
            options.codec.clone(),
            "-crf".into(),
            options.crf.to_string(),
            "-preset".into(),
            options.preset.clone(),
        ]);

        args.extend([
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            options.audio_bitrate.clone(),
        ]);

        if options.codec == "libx265" {
            args.extend(["-x265-params".into(), "log-level=error".into()]);
        }

        args.push("-y".into());
        args.push(request.output.to_string_lossy().into_owned());
        args
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn probe(&self, path: &Path) -> MediaSummary {
        probe::probe(&self.ffprobe, path).await
    }

    fn run(&self, request: &EncodeRequest, progress: ProgressFn) -> Result<EncoderRun> {
        let args = Self::build_args(request);
        tracing::debug!("FFmpeg args: {:?}", args);

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        process_tree::spawn_as_group_leader(&mut cmd);

        let mut child = cmd.spawn().map_err(|source| Error::Spawn {
            tool: "ffmpeg".to_string(),
            source,
        })?;
        let pid = child
            .id()
            .ok_or_else(|| Error::tool_failed("ffmpeg", "process exited before it was tracked"))?;
        let entry = LiveEntry::insert(&self.live, pid);
        let stderr = child.stderr.take();
        let mut tracker = ProgressTracker::new(request.duration_secs);

        let completion = async move {
            let mut diagnostics: Vec<String> = Vec::new();

            if let Some(stderr) = stderr {
                let mut reader = BufReader::new(stderr);
                let mut buf = Vec::new();
                loop {
                    buf.clear();
                    if reader.read_until(b'\n', &mut buf).await? == 0 {
                        break;
                    }
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end();
                    match tracker.feed(line) {
                        Line::Progress(Some(fraction)) => progress(fraction),
                        Line::Progress(None) => {}
                        Line::Diagnostic if !line.is_empty() => diagnostics.push(line.to_string()),
                        Line::Diagnostic => {}
                    }
                }
            }

            // stderr hit EOF, so ffmpeg is exiting; stop accepting
            // termination before the pid is reaped and can be reused.
            drop(entry);
            let status = child.wait().await?;
            tracing::debug!("ffmpeg (pid {}) exited with {}", pid, status);

            Ok(EncodeOutcome {
                success: status.success(),
                diagnostics: diagnostics.join("\n"),
            })
        }
        .boxed();

        Ok(EncoderRun {
            handle: ProcessHandle::new(pid),
            completion,
        })
    }

    fn terminate(&self, handle: &ProcessHandle) -> bool {
        let live = self.live.lock();
        if !live.contains(&handle.pid()) {
            tracing::debug!("ffmpeg (pid {}) already exited, not signalling", handle.pid());
            return false;
        }
        match process_tree::terminate(handle) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to terminate ffmpeg (pid {}): {}", handle.pid(), e);
                false
            }
        }
    }
}

#[derive(Debug, PartialEq)]
enum Line {
    /// A `-progress` line; carries a new fraction at the end of a block.
    Progress(Option<f64>),
    Diagnostic,
}

/// Turns `-progress` key/value lines into completion fractions.
#[derive(Debug)]
struct ProgressTracker {
    duration_secs: Option<f64>,
    out_time_us: Option<i64>,
}

impl ProgressTracker {
    fn new(duration_secs: Option<f64>) -> Self {
        Self {
            duration_secs: duration_secs.filter(|d| *d > 0.0),
            out_time_us: None,
        }
    }

    fn feed(&mut self, line: &str) -> Line {
        let Some((key, value)) = line.split_once('=') else {
            return Line::Diagnostic;
        };
        let key = key.trim();
        if !(PROGRESS_KEYS.contains(&key) || key.starts_with("stream_")) {
            return Line::Diagnostic;
        }

        match key {
            // out_time_ms is reported in microseconds as well.
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.trim().parse::<i64>() {
                    self.out_time_us = Some(us);
                }
                Line::Progress(None)
            }
            "progress" => Line::Progress(self.fraction()),
            _ => Line::Progress(None),
        }
    }

    fn fraction(&self) -> Option<f64> {
        let duration = self.duration_secs?;
        let us = self.out_time_us?;
        let elapsed = us.max(0) as f64 / 1_000_000.0;
        Some((elapsed / duration).clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CompressionOptions;

    fn request(options: CompressionOptions) -> EncodeRequest {
        EncodeRequest::new("/in/clip.mov", "/out/clip.mov", options)
    }

    #[test]
    fn test_build_args_defaults() {
        let args = FfmpegEncoder::build_args(&request(CompressionOptions::default()));
        let joined = args.join(" ");
        assert!(joined.starts_with("-hide_banner -nostats -progress pipe:2 -i /in/clip.mov"));
        assert!(joined.contains("-c:v libx265 -crf 28 -preset medium"));
        assert!(joined.contains("-c:a aac -b:a 128k"));
        assert!(joined.contains("-x265-params log-level=error"));
        assert!(!joined.contains("-vf"));
        assert_eq!(args.last().map(String::as_str), Some("/out/clip.mov"));
        assert_eq!(args[args.len() - 2], "-y");
    }

    #[test]
    fn test_build_args_scaling_and_x264() {
        let options = CompressionOptions {
            codec: "libx264".into(),
            crf: 23,
            preset: "fast".into(),
            max_width: Some(1280),
            ..CompressionOptions::default()
        };
        let args = FfmpegEncoder::build_args(&request(options));
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[vf + 1], "scale='min(1280,iw)':-2");
        assert!(!args.iter().any(|a| a == "-x265-params"));
        assert!(args.join(" ").contains("-c:v libx264 -crf 23 -preset fast"));
    }

    #[test]
    fn test_progress_tracker_fraction() {
        let mut tracker = ProgressTracker::new(Some(10.0));
        assert_eq!(tracker.feed("frame=120"), Line::Progress(None));
        assert_eq!(tracker.feed("bitrate= 512.3kbits/s"), Line::Progress(None));
        assert_eq!(tracker.feed("out_time_us=5000000"), Line::Progress(None));
        assert_eq!(tracker.feed("progress=continue"), Line::Progress(Some(0.5)));
        tracker.feed("out_time_ms=20000000");
        assert_eq!(tracker.feed("progress=end"), Line::Progress(Some(1.0)));
    }

    #[test]
    fn test_progress_tracker_without_duration() {
        let mut tracker = ProgressTracker::new(None);
        tracker.feed("out_time_us=5000000");
        assert_eq!(tracker.feed("progress=continue"), Line::Progress(None));
    }

    #[test]
    fn test_diagnostic_lines() {
        let mut tracker = ProgressTracker::new(Some(1.0));
        assert_eq!(
            tracker.feed("/in/clip.mov: No such file or directory"),
            Line::Diagnostic
        );
        assert_eq!(
            tracker.feed("[libx265 @ 0x55] invalid option crf=abc"),
            Line::Diagnostic
        );
        assert_eq!(tracker.feed("stream_0_0_q=28.0"), Line::Progress(None));
    }

    #[tokio::test]
    async fn test_run_missing_binary_is_spawn_error() {
        let encoder = FfmpegEncoder::new("nonexistent_ffmpeg_12345", "nonexistent_ffprobe_12345");
        let result = encoder.run(
            &request(CompressionOptions::default()),
            std::sync::Arc::new(|_| {}),
        );
        assert!(matches!(result, Err(Error::Spawn { .. })));
    }

    /// An executable shell script standing in for ffmpeg.
    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_running_encoder() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = FfmpegEncoder::new(fake_ffmpeg(dir.path(), "exec sleep 30"), "ffprobe");

        let run = encoder
            .run(&request(CompressionOptions::default()), Arc::new(|_| {}))
            .unwrap();
        assert!(encoder.terminate(&run.handle));

        let outcome = tokio::time::timeout(std::time::Duration::from_secs(10), run.completion)
            .await
            .expect("terminated encoder did not exit")
            .unwrap();
        assert!(!outcome.success);
        assert!(encoder.live.lock().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_after_exit_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = FfmpegEncoder::new(
            fake_ffmpeg(dir.path(), "echo 'Invalid data found' >&2; exit 1"),
            "ffprobe",
        );

        let run = encoder
            .run(&request(CompressionOptions::default()), Arc::new(|_| {}))
            .unwrap();
        let handle = run.handle;
        let outcome = run.completion.await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.diagnostics, "Invalid data found");

        // The pid is reaped and may belong to someone else by now.
        assert!(!encoder.terminate(&handle));
    }
}
