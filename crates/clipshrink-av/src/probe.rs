//! Best-effort media probing via `ffprobe`.

use crate::{Error, MediaSummary, Result};
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Probe `path`, never failing.
///
/// The size comes from the filesystem; codec, resolution and duration from
/// ffprobe when it works. A missing file yields an empty summary.
pub async fn probe(ffprobe: &Path, path: &Path) -> MediaSummary {
    let size_bytes = match tokio::fs::metadata(path).await {
        Ok(meta) => meta.len(),
        Err(e) => {
            tracing::warn!("Cannot stat {:?} for probing: {}", path, e);
            return MediaSummary::default();
        }
    };

    let mut summary = MediaSummary::with_size(size_bytes);
    match run_ffprobe(ffprobe, path).await {
        Ok(json) => {
            if let Err(e) = apply_ffprobe_json(&mut summary, &json) {
                tracing::warn!("Unreadable ffprobe output for {:?}: {}", path, e);
            }
        }
        Err(e) => tracing::warn!("ffprobe failed for {:?}: {}", path, e),
    }
    summary
}

async fn run_ffprobe(ffprobe: &Path, path: &Path) -> Result<String> {
    let output = Command::new(ffprobe)
        .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| Error::Spawn {
            tool: "ffprobe".to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(Error::tool_failed(
            "ffprobe",
            format!("exited with status {}", output.status),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Fill codec, resolution and duration from ffprobe's JSON output.
fn apply_ffprobe_json(summary: &mut MediaSummary, json: &str) -> Result<()> {
    let parsed: FfprobeOutput = serde_json::from_str(json)?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));

    if let Some(video) = video {
        summary.codec = video.codec_name.clone();
        if let (Some(w), Some(h)) = (video.width, video.height) {
            summary.resolution = Some(format!("{}x{}", w, h));
        }
    }

    summary.duration_secs = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or_else(|| video.and_then(|v| v.duration.as_deref()))
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);

    Ok(())
}
