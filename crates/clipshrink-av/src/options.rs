//! Compression settings handed to the encoder.
//!
//! The job core never interprets these; they travel with a job from
//! submission to the encoder unchanged.

use serde::{Deserialize, Serialize};

/// Settings for one compression run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionOptions {
    /// Target file size in MB (informational; quality is driven by `crf`).
    #[serde(default = "default_target_size_mb")]
    pub target_size_mb: u32,

    /// Video codec passed to `-c:v` (libx264, libx265, vp9, ...).
    #[serde(default = "default_codec")]
    pub codec: String,

    /// Constant Rate Factor, lower is better quality.
    #[serde(default = "default_crf")]
    pub crf: u32,

    /// Encoder preset (ultrafast ... veryslow).
    #[serde(default = "default_preset")]
    pub preset: String,

    /// AAC audio bitrate, e.g. `128k`.
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Scale down to at most this width, keeping the aspect ratio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
}

fn default_target_size_mb() -> u32 {
    30
}
fn default_codec() -> String {
    "libx265".to_string()
}
fn default_crf() -> u32 {
    28
}
fn default_preset() -> String {
    "medium".to_string()
}
fn default_audio_bitrate() -> String {
    "128k".to_string()
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            target_size_mb: default_target_size_mb(),
            codec: default_codec(),
            crf: default_crf(),
            preset: default_preset(),
            audio_bitrate: default_audio_bitrate(),
            max_width: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CompressionOptions::default();
        assert_eq!(options.target_size_mb, 30);
        assert_eq!(options.codec, "libx265");
        assert_eq!(options.crf, 28);
        assert_eq!(options.preset, "medium");
        assert_eq!(options.audio_bitrate, "128k");
        assert!(options.max_width.is_none());
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let options: CompressionOptions =
            serde_json::from_str(r#"{"codec": "libx264", "max_width": 1280}"#).unwrap();
        assert_eq!(options.codec, "libx264");
        assert_eq!(options.max_width, Some(1280));
        assert_eq!(options.crf, 28);
        assert_eq!(options.preset, "medium");
    }
}
