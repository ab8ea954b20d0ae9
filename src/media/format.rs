use crate::foundation::core::Size;
use crate::foundation::error::{StageError, StageResult};

/// Byte order of the three pixel channels in a raw video record.
///
/// The order is a caller-supplied parameter end-to-end: decoders emit and
/// encoders accept exactly this layout, and no component reorders channels on
/// its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ChannelOrder {
    /// Red, green, blue.
    Rgb,
    /// Blue, green, red (what SDL surfaces use on Linux, for example).
    Bgr,
}

impl ChannelOrder {
    /// The ffmpeg `-pix_fmt` name for this order at 8 bits per channel.
    pub fn pix_fmt(self) -> &'static str {
        match self {
            Self::Rgb => "rgb24",
            Self::Bgr => "bgr24",
        }
    }
}

/// Fixed frame geometry of a raw video stream: `height x width x 3` bytes,
/// 8-bit unsigned per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameGeometry {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Channel byte order.
    pub order: ChannelOrder,
}

/// Bytes per pixel for raw video records.
pub const BYTES_PER_PIXEL: usize = 3;

impl FrameGeometry {
    /// Create a validated geometry.
    pub fn new(width: u32, height: u32, order: ChannelOrder) -> StageResult<Self> {
        if width == 0 || height == 0 {
            return Err(StageError::validation(
                "frame geometry width/height must be non-zero",
            ));
        }
        Ok(Self {
            width,
            height,
            order,
        })
    }

    /// Size of one raw frame record in bytes.
    pub fn record_size(self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    /// The geometry's dimensions as a [`Size`].
    pub fn size(self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }
}

/// Fixed sample format of a raw audio stream: interleaved signed 16-bit
/// little-endian samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AudioFormat {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count, fixed for the stream's lifetime.
    pub channels: u16,
}

impl AudioFormat {
    /// Create a validated format.
    pub fn new(sample_rate: u32, channels: u16) -> StageResult<Self> {
        if sample_rate == 0 {
            return Err(StageError::validation("audio sample_rate must be non-zero"));
        }
        if channels == 0 {
            return Err(StageError::validation("audio channels must be non-zero"));
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    /// Size in bytes of a record holding `chunk_frames` sample frames.
    pub fn record_size(self, chunk_frames: u32) -> usize {
        chunk_frames as usize * self.channels as usize * 2
    }
}

/// One fixed-shape pixel grid.
///
/// Immutable once produced by a decoder; used as a mutable output buffer by
/// the presentation loop and render mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Geometry the pixel data conforms to.
    pub geometry: FrameGeometry,
    /// `height * width * 3` channel bytes in `geometry.order`.
    pub data: Vec<u8>,
}

impl Frame {
    /// A black frame of the given geometry.
    pub fn zeroed(geometry: FrameGeometry) -> Self {
        Self {
            geometry,
            data: vec![0u8; geometry.record_size()],
        }
    }

    /// Wrap raw record bytes, checking the length against the geometry.
    pub fn from_record(geometry: FrameGeometry, data: Vec<u8>) -> StageResult<Self> {
        if data.len() != geometry.record_size() {
            return Err(StageError::stream(format!(
                "frame record has {} bytes, geometry {}x{} requires {}",
                data.len(),
                geometry.width,
                geometry.height,
                geometry.record_size()
            )));
        }
        Ok(Self { geometry, data })
    }

    /// Read one pixel. Out-of-bounds coordinates return `None`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.geometry.width || y >= self.geometry.height {
            return None;
        }
        let off = (y as usize * self.geometry.width as usize + x as usize) * BYTES_PER_PIXEL;
        Some([self.data[off], self.data[off + 1], self.data[off + 2]])
    }

    /// Write one pixel. Out-of-bounds coordinates are ignored.
    pub fn put_pixel(&mut self, x: u32, y: u32, px: [u8; 3]) {
        if x >= self.geometry.width || y >= self.geometry.height {
            return;
        }
        let off = (y as usize * self.geometry.width as usize + x as usize) * BYTES_PER_PIXEL;
        self.data[off..off + BYTES_PER_PIXEL].copy_from_slice(&px);
    }

    /// Fill the whole frame with a single color.
    pub fn fill(&mut self, px: [u8; 3]) {
        for chunk in self.data.chunks_exact_mut(BYTES_PER_PIXEL) {
            chunk.copy_from_slice(&px);
        }
    }
}

/// One fixed-length block of interleaved signed 16-bit samples.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleChunk {
    /// Interleaved channel count.
    pub channels: u16,
    /// `frames * channels` interleaved samples.
    pub samples: Vec<i16>,
}

impl SampleChunk {
    /// A silent chunk holding `frames` sample frames.
    pub fn zeroed(channels: u16, frames: u32) -> Self {
        Self {
            channels,
            samples: vec![0i16; frames as usize * channels as usize],
        }
    }

    /// Decode little-endian record bytes, checking alignment.
    pub fn from_record(format: AudioFormat, data: &[u8]) -> StageResult<Self> {
        let stride = format.channels as usize * 2;
        if stride == 0 || !data.len().is_multiple_of(stride) {
            return Err(StageError::stream(format!(
                "sample record of {} bytes is not aligned to {} channels of i16",
                data.len(),
                format.channels
            )));
        }
        let samples = data
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        Ok(Self {
            channels: format.channels,
            samples,
        })
    }

    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Serialize to little-endian record bytes.
    pub fn to_record(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.samples.len() * 2);
        for s in &self.samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    /// Overwrite every sample with `value`.
    pub fn fill(&mut self, value: i16) {
        self.samples.fill(value);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/format.rs"]
mod tests;
