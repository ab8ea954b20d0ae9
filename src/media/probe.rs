use std::path::Path;
use std::process::Command;

use crate::foundation::error::{StageError, StageResult};

/// Source media metadata gathered through `ffprobe`.
#[derive(Clone, Debug, serde::Serialize)]
pub struct MediaInfo {
    /// Width in pixels of the first video stream, if any.
    pub width: Option<u32>,
    /// Height in pixels of the first video stream, if any.
    pub height: Option<u32>,
    /// Frame rate of the first video stream, if any.
    pub fps: Option<f64>,
    /// Container duration in seconds, if reported.
    pub duration_secs: Option<f64>,
    /// Sample rate of the first audio stream, if any.
    pub sample_rate: Option<u32>,
    /// Channel count of the first audio stream, if any.
    pub channels: Option<u16>,
    /// Whether at least one video stream is present.
    pub has_video: bool,
    /// Whether at least one audio stream is present.
    pub has_audio: bool,
}

/// Probe source media metadata through `ffprobe`.
pub fn probe_media(path: &Path) -> StageResult<MediaInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        avg_frame_rate: Option<String>,
        sample_rate: Option<String>,
        channels: Option<u16>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| StageError::launch(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(StageError::stream(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| StageError::stream(format!("ffprobe json parse failed: {e}")))?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let audio = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(MediaInfo {
        width: video.and_then(|s| s.width),
        height: video.and_then(|s| s.height),
        fps: video
            .and_then(|s| s.avg_frame_rate.as_deref())
            .and_then(parse_rational),
        duration_secs: parsed
            .format
            .and_then(|f| f.duration)
            .and_then(|d| d.parse().ok()),
        sample_rate: audio
            .and_then(|s| s.sample_rate.as_deref())
            .and_then(|r| r.parse().ok()),
        channels: audio.and_then(|s| s.channels),
        has_video: video.is_some(),
        has_audio: audio.is_some(),
    })
}

/// Resolve a possibly partial `(width, height)` request against the source's
/// aspect ratio.
///
/// A missing dimension is derived from the probed aspect ratio and rounded
/// down to a multiple of 4; when both are missing the source dimensions are
/// used as-is.
pub fn infer_size(
    path: &Path,
    width: Option<u32>,
    height: Option<u32>,
) -> StageResult<(u32, u32)> {
    if let (Some(w), Some(h)) = (width, height) {
        return Ok((w, h));
    }

    let info = probe_media(path)?;
    let (src_w, src_h) = match (info.width, info.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w as f64, h as f64),
        _ => {
            return Err(StageError::stream(format!(
                "cannot infer size: '{}' has no probed video dimensions",
                path.display()
            )));
        }
    };

    let div4 = |v: f64| -> u32 { (4.0 * (v / 4.0).floor()).max(4.0) as u32 };

    Ok(match (width, height) {
        (None, None) => (src_w as u32, src_h as u32),
        (None, Some(h)) => (div4(f64::from(h) * (src_w / src_h)), h),
        (Some(w), None) => (w, div4(f64::from(w) * (src_h / src_w))),
        (Some(w), Some(h)) => (w, h),
    })
}

fn parse_rational(s: &str) -> Option<f64> {
    let (num, den) = s.split_once('/')?;
    let num: f64 = num.parse().ok()?;
    let den: f64 = den.parse().ok()?;
    if den == 0.0 { None } else { Some(num / den) }
}

// No unit tests here: probing shells out to `ffprobe` and is validated by the
// integration tests, which are skipped when the tool is unavailable.
