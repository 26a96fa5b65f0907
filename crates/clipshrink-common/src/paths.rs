//! Path utilities for accepted uploads.
//!
//! Only a fixed set of video containers is accepted, and client-supplied
//! filenames are reduced to a safe single path component before they are
//! joined onto a storage directory.

use std::path::Path;

/// Video extensions accepted for compression.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "wmv", "flv"];

/// Check if a path has an accepted video file extension (case-insensitive).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use clipshrink_common::paths::is_video_file;
///
/// assert!(is_video_file(Path::new("movie.MKV")));
/// assert!(is_video_file(Path::new("/path/to/video.mp4")));
/// assert!(!is_video_file(Path::new("subtitle.srt")));
/// assert!(!is_video_file(Path::new("no_extension")));
/// ```
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Reduce a client-supplied filename to a safe, single path component.
///
/// Directory parts are dropped, whitespace becomes `_`, and anything other
/// than ASCII alphanumerics, `.`, `-` and `_` is removed. Leading dots are
/// stripped so the result can never be `..` or a hidden file. Returns `None`
/// when nothing usable is left.
///
/// # Examples
///
/// ```
/// use clipshrink_common::paths::sanitize_filename;
///
/// assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("passwd"));
/// assert_eq!(sanitize_filename("my holiday.mp4").as_deref(), Some("my_holiday.mp4"));
/// assert_eq!(sanitize_filename("..").as_deref(), None);
/// ```
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let cleaned: String = base
        .trim()
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                Some(c)
            } else {
                None
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_accepted_extensions() {
        for ext in VIDEO_EXTENSIONS {
            let name = format!("clip.{}", ext);
            assert!(is_video_file(Path::new(&name)), "{name} should be accepted");
        }
    }

    #[test]
    fn test_rejected_extensions() {
        assert!(!is_video_file(Path::new("clip.webm")));
        assert!(!is_video_file(Path::new("clip.txt")));
        assert!(!is_video_file(Path::new(".mp4")));
    }

    #[test]
    fn test_sanitize_windows_path() {
        assert_eq!(
            sanitize_filename(r"C:\Users\me\clip final.mov").as_deref(),
            Some("clip_final.mov")
        );
    }

    #[test]
    fn test_sanitize_strips_unsafe_chars() {
        assert_eq!(
            sanitize_filename("cl*ip?<>|.mp4").as_deref(),
            Some("clip.mp4")
        );
        assert_eq!(sanitize_filename(".hidden.mkv").as_deref(), Some("hidden.mkv"));
        assert_eq!(sanitize_filename("   ").as_deref(), None);
        assert_eq!(sanitize_filename("").as_deref(), None);
    }
}
