//! Hardware-paced audio dispatch through cpal.
//!
//! The output device's own callback drives `audio_out`: the registry fills
//! one fixed-size chunk at a time and a carry position bridges the mismatch
//! between chunk length and whatever buffer size the hardware asks for. With
//! capture enabled, the input stream's callback accumulates samples and
//! dispatches `audio_in` one full chunk at a time.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, Stream, StreamConfig};
use tracing::error;

use crate::foundation::error::{StageError, StageResult};
use crate::media::format::SampleChunk;
use crate::runtime::capability::CapabilityRegistry;

/// Fixed audio shape for a session's lifetime.
#[derive(Clone, Copy, Debug)]
pub struct AudioConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Sample frames per dispatched chunk.
    pub chunk_frames: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            chunk_frames: 1024,
        }
    }
}

impl AudioConfig {
    /// Validate the shape.
    pub fn validate(&self) -> StageResult<()> {
        if self.sample_rate == 0 {
            return Err(StageError::validation("audio sample_rate must be non-zero"));
        }
        if self.channels == 0 {
            return Err(StageError::validation("audio channels must be non-zero"));
        }
        if self.chunk_frames == 0 {
            return Err(StageError::validation("audio chunk_frames must be non-zero"));
        }
        Ok(())
    }

    fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            channels: self.channels,
            sample_rate: self.sample_rate,
            buffer_size: BufferSize::Default,
        }
    }
}

/// Pulls chunks from the registry and hands out one sample at a time.
struct OutputPump {
    registry: Arc<CapabilityRegistry>,
    chunk: SampleChunk,
    pos: usize,
}

impl OutputPump {
    fn new(registry: Arc<CapabilityRegistry>, cfg: AudioConfig) -> Self {
        let chunk = SampleChunk::zeroed(cfg.channels, cfg.chunk_frames);
        // Start exhausted so the first hardware callback dispatches.
        let pos = chunk.samples.len();
        Self {
            registry,
            chunk,
            pos,
        }
    }

    fn next_sample(&mut self) -> i16 {
        if self.pos >= self.chunk.samples.len() {
            self.registry.dispatch_audio_out(&mut self.chunk);
            self.pos = 0;
        }
        let sample = self.chunk.samples[self.pos];
        self.pos += 1;
        sample
    }

    fn fill_i16(&mut self, data: &mut [i16]) {
        for slot in data {
            *slot = self.next_sample();
        }
    }

    fn fill_f32(&mut self, data: &mut [f32]) {
        for slot in data {
            *slot = f32::from(self.next_sample()) / 32_768.0;
        }
    }
}

/// Accumulates captured samples and dispatches whole chunks.
struct InputPump {
    registry: Arc<CapabilityRegistry>,
    channels: u16,
    chunk_samples: usize,
    pending: Vec<i16>,
}

impl InputPump {
    fn new(registry: Arc<CapabilityRegistry>, cfg: AudioConfig) -> Self {
        Self {
            registry,
            channels: cfg.channels,
            chunk_samples: cfg.chunk_frames as usize * cfg.channels as usize,
            pending: Vec::new(),
        }
    }

    fn push(&mut self, samples: impl Iterator<Item = i16>) {
        self.pending.extend(samples);
        while self.pending.len() >= self.chunk_samples {
            let rest = self.pending.split_off(self.chunk_samples);
            let chunk = SampleChunk {
                channels: self.channels,
                samples: std::mem::replace(&mut self.pending, rest),
            };
            self.registry.dispatch_audio_in(&chunk);
        }
    }
}

/// Running audio streams bound to one registry.
///
/// Dropping the bridge stops playback and capture.
pub struct AudioBridge {
    config: AudioConfig,
    _output: Stream,
    _input: Option<Stream>,
}

impl AudioBridge {
    /// Open the default output device (and, with `capture`, the default
    /// input device) and start dispatching.
    pub fn start(
        registry: Arc<CapabilityRegistry>,
        cfg: AudioConfig,
        capture: bool,
    ) -> StageResult<Self> {
        cfg.validate()?;
        let host = cpal::default_host();

        let output = build_output(&host, registry.clone(), cfg)?;
        output
            .play()
            .map_err(|e| StageError::device(format!("failed to start audio output: {e}")))?;

        let input = if capture {
            let stream = build_input(&host, registry, cfg)?;
            stream
                .play()
                .map_err(|e| StageError::device(format!("failed to start audio capture: {e}")))?;
            Some(stream)
        } else {
            None
        };

        Ok(Self {
            config: cfg,
            _output: output,
            _input: input,
        })
    }

    /// The shape the bridge was started with.
    pub fn config(&self) -> AudioConfig {
        self.config
    }
}

fn build_output(
    host: &cpal::Host,
    registry: Arc<CapabilityRegistry>,
    cfg: AudioConfig,
) -> StageResult<Stream> {
    let device = host
        .default_output_device()
        .ok_or_else(|| StageError::device("no default audio output device"))?;
    let sample_format = device
        .default_output_config()
        .map_err(|e| StageError::device(format!("failed to query audio output device: {e}")))?
        .sample_format();

    let mut pump = OutputPump::new(registry, cfg);
    let err_fn = |e| error!("audio output stream error: {e}");
    let stream = match sample_format {
        SampleFormat::I16 => device.build_output_stream(
            &cfg.stream_config(),
            move |data: &mut [i16], _: &_| pump.fill_i16(data),
            err_fn,
            None,
        ),
        SampleFormat::F32 => device.build_output_stream(
            &cfg.stream_config(),
            move |data: &mut [f32], _: &_| pump.fill_f32(data),
            err_fn,
            None,
        ),
        other => {
            return Err(StageError::device(format!(
                "unsupported audio output sample format {other:?}"
            )));
        }
    };
    stream.map_err(|e| StageError::device(format!("failed to open audio output stream: {e}")))
}

fn build_input(
    host: &cpal::Host,
    registry: Arc<CapabilityRegistry>,
    cfg: AudioConfig,
) -> StageResult<Stream> {
    let device = host
        .default_input_device()
        .ok_or_else(|| StageError::device("no default audio input device"))?;
    let sample_format = device
        .default_input_config()
        .map_err(|e| StageError::device(format!("failed to query audio input device: {e}")))?
        .sample_format();

    let mut pump = InputPump::new(registry, cfg);
    let err_fn = |e| error!("audio input stream error: {e}");
    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            &cfg.stream_config(),
            move |data: &[i16], _: &_| pump.push(data.iter().copied()),
            err_fn,
            None,
        ),
        SampleFormat::F32 => device.build_input_stream(
            &cfg.stream_config(),
            move |data: &[f32], _: &_| {
                pump.push(
                    data.iter()
                        .map(|s| (s.clamp(-1.0, 1.0) * 32_767.0) as i16),
                )
            },
            err_fn,
            None,
        ),
        other => {
            return Err(StageError::device(format!(
                "unsupported audio input sample format {other:?}"
            )));
        }
    };
    stream.map_err(|e| StageError::device(format!("failed to open audio input stream: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/audio/bridge.rs"]
mod tests;
