//! Deterministic offline rendering of a capability set.
//!
//! The same callbacks that drive a live session are driven tick-for-tick on
//! a virtual timeline instead of the wall clock: frame `i` covers
//! `[i/fps, (i+1)/fps)` and its audio chunk holds exactly `sample_rate/fps`
//! sample frames, so the two streams stay sample-aligned over any duration.

use std::path::Path;

use tracing::info;

use crate::foundation::error::{StageError, StageResult};
use crate::media::format::{AudioFormat, Frame, FrameGeometry, SampleChunk};
use crate::media::pipe::{open_chunk_encoder, open_frame_encoder, remux};
use crate::render::sink::{ChunkSink, EncoderChunkSink, EncoderFrameSink, FrameSink};
use crate::runtime::capability::CapabilityRegistry;

/// Shape and length of one offline render.
#[derive(Clone, Copy, Debug)]
pub struct RenderOpts {
    /// Output frame geometry.
    pub geometry: FrameGeometry,
    /// Output frame rate.
    pub fps: u32,
    /// Timeline length in seconds.
    pub duration_secs: f64,
    /// Audio sample rate. Must divide evenly by `fps`.
    pub sample_rate: u32,
    /// Audio channel count.
    pub channels: u16,
}

impl Default for RenderOpts {
    fn default() -> Self {
        Self {
            geometry: FrameGeometry {
                width: 1280,
                height: 720,
                order: crate::media::format::ChannelOrder::Rgb,
            },
            fps: 30,
            duration_secs: 10.0,
            sample_rate: 44_100,
            channels: 2,
        }
    }
}

impl RenderOpts {
    /// Check every parameter before any process is spawned.
    pub fn validate(&self) -> StageResult<()> {
        if self.fps == 0 {
            return Err(StageError::validation("render fps must be non-zero"));
        }
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(StageError::validation(
                "render duration must be a positive number of seconds",
            ));
        }
        if self.sample_rate == 0 {
            return Err(StageError::validation("render sample_rate must be non-zero"));
        }
        if self.channels == 0 {
            return Err(StageError::validation("render channels must be non-zero"));
        }
        // yuv420p chroma subsampling requires even dimensions.
        if self.geometry.width % 2 != 0 || self.geometry.height % 2 != 0 {
            return Err(StageError::validation(format!(
                "render dimensions {}x{} must be even",
                self.geometry.width, self.geometry.height
            )));
        }
        if self.sample_rate % self.fps != 0 {
            return Err(StageError::validation(format!(
                "sample_rate {} is not divisible by fps {}; audio would drift against video",
                self.sample_rate, self.fps
            )));
        }
        Ok(())
    }

    /// Number of frames on the timeline: `floor(duration * fps)`.
    pub fn total_frames(&self) -> u64 {
        (self.duration_secs * f64::from(self.fps)).floor() as u64
    }

    /// Audio sample frames per video frame.
    pub fn samples_per_frame(&self) -> u32 {
        self.sample_rate / self.fps
    }

    /// The audio shape of the render.
    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }
}

/// Drive the registry tick-for-tick into the given sinks.
///
/// Dispatches `init` once, then `video_out` and (when an audio sink is
/// given) `audio_out` exactly [`RenderOpts::total_frames`] times. Absent
/// callbacks render black frames and silence.
pub fn render_frames(
    registry: &CapabilityRegistry,
    opts: RenderOpts,
    video: &mut dyn FrameSink,
    mut audio: Option<&mut dyn ChunkSink>,
) -> StageResult<()> {
    opts.validate()?;
    let total = opts.total_frames();
    video.begin(total)?;
    registry.dispatch_init();

    let mut frame = Frame::zeroed(opts.geometry);
    let mut chunk = SampleChunk::zeroed(opts.channels, opts.samples_per_frame());
    for _ in 0..total {
        registry.dispatch_video_out(&mut frame);
        video.push_frame(&frame)?;
        if let Some(sink) = audio.as_deref_mut() {
            registry.dispatch_audio_out(&mut chunk);
            sink.push_chunk(&chunk)?;
        }
    }

    video.end()?;
    if let Some(sink) = audio {
        sink.end()?;
    }
    Ok(())
}

/// Render the registry into a single encoded A/V file at `dest`.
///
/// Video and audio are encoded into temporaries and merged with one remux
/// pass at the end, so a render that fails partway leaves no half-written
/// file at `dest`.
pub fn render_offline(
    registry: &CapabilityRegistry,
    opts: RenderOpts,
    dest: &Path,
    overwrite: bool,
) -> StageResult<()> {
    opts.validate()?;
    if !overwrite && dest.exists() {
        return Err(StageError::validation(format!(
            "'{}' already exists",
            dest.display()
        )));
    }

    let tmp = tempfile::tempdir()
        .map_err(|e| StageError::stream(format!("failed to create render temp dir: {e}")))?;
    let ext = dest.extension().and_then(|e| e.to_str()).unwrap_or("mp4");
    let video_path = tmp.path().join(format!("video.{ext}"));
    let audio_path = tmp.path().join("audio.wav");

    let mut video = EncoderFrameSink::new(open_frame_encoder(
        &video_path,
        opts.geometry,
        opts.fps,
        true,
    )?);
    let mut audio = EncoderChunkSink::new(open_chunk_encoder(
        &audio_path,
        opts.audio_format(),
        true,
    )?);
    render_frames(registry, opts, &mut video, Some(&mut audio))?;

    remux(&video_path, &audio_path, dest)?;
    info!(
        dest = %dest.display(),
        frames = opts.total_frames(),
        "offline render complete"
    );
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/render/offline.rs"]
mod tests;
