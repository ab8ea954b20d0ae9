//! Output seams for offline rendering.

use crate::foundation::error::{StageError, StageResult};
use crate::media::format::{Frame, SampleChunk};
use crate::media::stream::{ChunkSinkProcess, FrameSinkProcess};

/// Receives rendered frames in presentation order.
pub trait FrameSink {
    /// Announce the number of frames that will follow.
    fn begin(&mut self, total_frames: u64) -> StageResult<()> {
        let _ = total_frames;
        Ok(())
    }

    /// Accept the next frame.
    fn push_frame(&mut self, frame: &Frame) -> StageResult<()>;

    /// Finalize the sink. No frames follow.
    fn end(&mut self) -> StageResult<()> {
        Ok(())
    }
}

/// Receives rendered audio chunks in timeline order.
pub trait ChunkSink {
    /// Accept the next chunk.
    fn push_chunk(&mut self, chunk: &SampleChunk) -> StageResult<()>;

    /// Finalize the sink. No chunks follow.
    fn end(&mut self) -> StageResult<()> {
        Ok(())
    }
}

/// Frame sink over a process-backed encoder.
pub struct EncoderFrameSink {
    encoder: Option<FrameSinkProcess>,
}

impl EncoderFrameSink {
    /// Wrap a spawned encoder.
    pub fn new(encoder: FrameSinkProcess) -> Self {
        Self {
            encoder: Some(encoder),
        }
    }
}

impl FrameSink for EncoderFrameSink {
    fn push_frame(&mut self, frame: &Frame) -> StageResult<()> {
        self.encoder
            .as_mut()
            .ok_or_else(|| StageError::stream("frame encoder is already finalized"))?
            .write_frame(frame)
    }

    fn end(&mut self) -> StageResult<()> {
        match self.encoder.take() {
            Some(encoder) => encoder.finish(),
            None => Ok(()),
        }
    }
}

/// Chunk sink over a process-backed encoder.
pub struct EncoderChunkSink {
    encoder: Option<ChunkSinkProcess>,
}

impl EncoderChunkSink {
    /// Wrap a spawned encoder.
    pub fn new(encoder: ChunkSinkProcess) -> Self {
        Self {
            encoder: Some(encoder),
        }
    }
}

impl ChunkSink for EncoderChunkSink {
    fn push_chunk(&mut self, chunk: &SampleChunk) -> StageResult<()> {
        self.encoder
            .as_mut()
            .ok_or_else(|| StageError::stream("audio encoder is already finalized"))?
            .write_chunk(chunk)
    }

    fn end(&mut self) -> StageResult<()> {
        match self.encoder.take() {
            Some(encoder) => encoder.finish(),
            None => Ok(()),
        }
    }
}

/// In-memory sink retaining every frame, for tests and previews.
#[derive(Default)]
pub struct MemoryFrameSink {
    /// Announced frame count, if any.
    pub announced: Option<u64>,
    /// All frames pushed so far.
    pub frames: Vec<Frame>,
    /// Whether the sink was finalized.
    pub ended: bool,
}

impl FrameSink for MemoryFrameSink {
    fn begin(&mut self, total_frames: u64) -> StageResult<()> {
        self.announced = Some(total_frames);
        Ok(())
    }

    fn push_frame(&mut self, frame: &Frame) -> StageResult<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn end(&mut self) -> StageResult<()> {
        self.ended = true;
        Ok(())
    }
}

/// In-memory sink retaining every chunk.
#[derive(Default)]
pub struct MemoryChunkSink {
    /// All chunks pushed so far.
    pub chunks: Vec<SampleChunk>,
    /// Whether the sink was finalized.
    pub ended: bool,
}

impl ChunkSink for MemoryChunkSink {
    fn push_chunk(&mut self, chunk: &SampleChunk) -> StageResult<()> {
        self.chunks.push(chunk.clone());
        Ok(())
    }

    fn end(&mut self) -> StageResult<()> {
        self.ended = true;
        Ok(())
    }
}
