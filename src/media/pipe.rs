//! Spawning of external codec processes.
//!
//! Every function here turns a media source or destination into a process
//! whose stdin/stdout is a raw, headerless stream of fixed-size records. The
//! record protocol itself lives in [`crate::media::stream`].

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::foundation::error::{StageError, StageResult};
use crate::media::format::{AudioFormat, FrameGeometry};
use crate::media::stream::{ChunkSinkProcess, ChunkStream, FrameSinkProcess, FrameStream};

/// Where decoded media comes from.
#[derive(Clone, Debug)]
pub enum MediaSource {
    /// A media file on disk (any container/codec ffmpeg understands).
    File(PathBuf),
    /// A capture device, addressed by the platform's device name.
    Camera {
        /// Device name; empty string selects the platform default.
        device: String,
    },
}

/// Seek/limit/rate options for decoding.
#[derive(Clone, Copy, Debug)]
pub struct DecodeOpts {
    /// Seek offset into the source, in seconds.
    pub start_secs: f64,
    /// Stop decoding after this many seconds, when set.
    pub duration_secs: Option<f64>,
    /// Output frame rate for video decoding.
    pub fps: u32,
}

impl Default for DecodeOpts {
    fn default() -> Self {
        Self {
            start_secs: 0.0,
            duration_secs: None,
            fps: 30,
        }
    }
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    tool_on_path("ffmpeg")
}

/// Return `true` when `ffprobe` can be invoked from `PATH`.
pub fn is_ffprobe_on_path() -> bool {
    tool_on_path("ffprobe")
}

fn tool_on_path(tool: &str) -> bool {
    Command::new(tool)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Spawn a decoder producing raw video records at the requested geometry.
///
/// The source is scaled and paced to `geometry`/`opts.fps` regardless of its
/// native size and rate. Spawn failure is a [`StageError::Launch`]; a source
/// the codec cannot read surfaces as an immediately diminished stream.
pub fn open_frame_decoder(
    source: &MediaSource,
    geometry: FrameGeometry,
    opts: DecodeOpts,
) -> StageResult<FrameStream> {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-loglevel", "error"]);
    push_source_input(&mut cmd, source, opts)?;
    cmd.args([
        "-vf",
        &format!("scale={}:{}", geometry.width, geometry.height),
        "-r",
        &opts.fps.to_string(),
        "-an",
        "-vcodec",
        "rawvideo",
        "-f",
        "rawvideo",
        "-pix_fmt",
        geometry.order.pix_fmt(),
        "pipe:1",
    ]);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    let child = cmd
        .spawn()
        .map_err(|e| StageError::launch(format!("failed to spawn ffmpeg decoder: {e}")))?;
    FrameStream::from_child(child, geometry)
}

/// Spawn a decoder producing raw audio records of `chunk_frames` sample
/// frames each.
pub fn open_chunk_decoder(
    source: &MediaSource,
    format: AudioFormat,
    chunk_frames: u32,
    opts: DecodeOpts,
) -> StageResult<ChunkStream> {
    if chunk_frames == 0 {
        return Err(StageError::validation("chunk_frames must be non-zero"));
    }

    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-loglevel", "error"]);
    push_source_input(&mut cmd, source, opts)?;
    cmd.args([
        "-vn",
        "-ar",
        &format.sample_rate.to_string(),
        "-ac",
        &format.channels.to_string(),
        "-f",
        "s16le",
        "-acodec",
        "pcm_s16le",
        "pipe:1",
    ]);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    let child = cmd
        .spawn()
        .map_err(|e| StageError::launch(format!("failed to spawn ffmpeg decoder: {e}")))?;
    ChunkStream::from_child(child, format, chunk_frames)
}

/// Spawn an encoder accepting raw video records on stdin and producing an
/// encoded file at `dest`.
pub fn open_frame_encoder(
    dest: &Path,
    geometry: FrameGeometry,
    fps: u32,
    overwrite: bool,
) -> StageResult<FrameSinkProcess> {
    if fps == 0 {
        return Err(StageError::validation("encode fps must be non-zero"));
    }

    let mut cmd = Command::new("ffmpeg");
    cmd.arg(if overwrite { "-y" } else { "-n" });
    cmd.args([
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-vcodec",
        "rawvideo",
        "-pix_fmt",
        geometry.order.pix_fmt(),
        "-s",
        &format!("{}x{}", geometry.width, geometry.height),
        "-r",
        &fps.to_string(),
        "-an",
        "-i",
        "pipe:0",
        "-pix_fmt",
        "yuv420p",
    ])
    .arg(dest);
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let child = cmd
        .spawn()
        .map_err(|e| StageError::launch(format!("failed to spawn ffmpeg encoder: {e}")))?;
    FrameSinkProcess::from_child(child, geometry)
}

/// Spawn an encoder accepting raw audio records on stdin and producing an
/// encoded file at `dest`.
pub fn open_chunk_encoder(
    dest: &Path,
    format: AudioFormat,
    overwrite: bool,
) -> StageResult<ChunkSinkProcess> {
    let mut cmd = Command::new("ffmpeg");
    cmd.arg(if overwrite { "-y" } else { "-n" });
    cmd.args([
        "-loglevel",
        "error",
        "-vn",
        "-ar",
        &format.sample_rate.to_string(),
        "-ac",
        &format.channels.to_string(),
        "-acodec",
        "pcm_s16le",
        "-f",
        "s16le",
        "-i",
        "pipe:0",
    ])
    .arg(dest);
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let child = cmd
        .spawn()
        .map_err(|e| StageError::launch(format!("failed to spawn ffmpeg encoder: {e}")))?;
    ChunkSinkProcess::from_child(child, format)
}

/// Merge an encoded video file and an encoded audio file into `out` with a
/// single remux invocation (video stream copied, audio re-encoded).
pub fn remux(video: &Path, audio: &Path, out: &Path) -> StageResult<()> {
    let result = Command::new("ffmpeg")
        .args(["-y", "-loglevel", "error", "-i"])
        .arg(video)
        .arg("-i")
        .arg(audio)
        .args([
            "-map",
            "0:v",
            "-map",
            "1:a",
            "-c:v",
            "copy",
            "-b:a",
            "192k",
            "-movflags",
            "+faststart",
        ])
        .arg(out)
        .output()
        .map_err(|e| StageError::launch(format!("failed to spawn ffmpeg remux: {e}")))?;

    if !result.status.success() {
        return Err(StageError::stream(format!(
            "ffmpeg remux into '{}' exited with status {}: {}",
            out.display(),
            result.status,
            String::from_utf8_lossy(&result.stderr).trim()
        )));
    }
    Ok(())
}

fn push_source_input(cmd: &mut Command, source: &MediaSource, opts: DecodeOpts) -> StageResult<()> {
    match source {
        MediaSource::File(path) => {
            cmd.args(["-ss", &format!("{:.6}", opts.start_secs)]);
            cmd.arg("-i").arg(path);
        }
        MediaSource::Camera { device } => {
            cmd.args(["-f", camera_input_format()?]);
            let device = if device.is_empty() {
                default_camera_device()
            } else {
                device.as_str()
            };
            cmd.args(["-i", device]);
        }
    }
    if let Some(dur) = opts.duration_secs {
        cmd.args(["-t", &format!("{dur:.6}")]);
    }
    Ok(())
}

fn camera_input_format() -> StageResult<&'static str> {
    if cfg!(target_os = "linux") {
        Ok("v4l2")
    } else if cfg!(target_os = "macos") {
        Ok("avfoundation")
    } else {
        Err(StageError::device(
            "camera capture is only supported on linux (v4l2) and macos (avfoundation)",
        ))
    }
}

fn default_camera_device() -> &'static str {
    if cfg!(target_os = "linux") {
        "/dev/video0"
    } else {
        "0"
    }
}

// Spawning and remuxing are exercised by the ffmpeg-gated integration tests;
// the record protocol over these pipes is unit-tested in `media::stream`.
