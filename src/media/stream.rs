//! Fixed-record stream protocol over opaque byte pipes.
//!
//! Decoding reads exactly `record_size` bytes per record; a short read
//! (including zero bytes) is the normal terminal condition and never yields a
//! partial record. Encoding writes records in arrival order with no
//! cross-record buffering beyond what the OS pipe provides.

use std::io::{BufReader, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout};

use tracing::warn;

use crate::foundation::error::{StageError, StageResult};
use crate::media::format::{AudioFormat, Frame, FrameGeometry, SampleChunk};

/// Fill `buf` completely from `reader`.
///
/// Returns `true` when a full record was read, `false` on end-of-stream
/// (fewer bytes than the record size, including zero). Read errors other
/// than interruption also terminate the stream.
fn read_record<R: Read>(reader: &mut R, buf: &mut [u8]) -> bool {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return false,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("record stream read failed, treating as end-of-stream: {e}");
                return false;
            }
        }
    }
    true
}

/// Lazy, finite, non-restartable sequence of [`Frame`] records over any byte
/// reader.
pub struct FrameReader<R> {
    reader: R,
    geometry: FrameGeometry,
    done: bool,
}

impl<R: Read> FrameReader<R> {
    /// Wrap a byte reader producing records of `geometry.record_size()`.
    pub fn new(reader: R, geometry: FrameGeometry) -> Self {
        Self {
            reader,
            geometry,
            done: false,
        }
    }

    /// Geometry of every yielded frame.
    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.done {
            return None;
        }
        let mut data = vec![0u8; self.geometry.record_size()];
        if !read_record(&mut self.reader, &mut data) {
            self.done = true;
            return None;
        }
        Some(Frame {
            geometry: self.geometry,
            data,
        })
    }
}

/// Lazy, finite, non-restartable sequence of [`SampleChunk`] records over any
/// byte reader.
pub struct ChunkReader<R> {
    reader: R,
    format: AudioFormat,
    chunk_frames: u32,
    done: bool,
}

impl<R: Read> ChunkReader<R> {
    /// Wrap a byte reader producing records of `chunk_frames` sample frames.
    pub fn new(reader: R, format: AudioFormat, chunk_frames: u32) -> Self {
        Self {
            reader,
            format,
            chunk_frames,
            done: false,
        }
    }

    /// Format of every yielded chunk.
    pub fn format(&self) -> AudioFormat {
        self.format
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = SampleChunk;

    fn next(&mut self) -> Option<SampleChunk> {
        if self.done {
            return None;
        }
        let mut data = vec![0u8; self.format.record_size(self.chunk_frames)];
        if !read_record(&mut self.reader, &mut data) {
            self.done = true;
            return None;
        }
        // Alignment is guaranteed by construction of the record size.
        SampleChunk::from_record(self.format, &data).ok()
    }
}

/// Record writer over any byte writer: one frame in, `record_size` bytes out.
pub struct FrameWriter<W> {
    writer: W,
    geometry: FrameGeometry,
}

impl<W: Write> FrameWriter<W> {
    /// Wrap a byte writer accepting records of `geometry.record_size()`.
    pub fn new(writer: W, geometry: FrameGeometry) -> Self {
        Self { writer, geometry }
    }

    /// Serialize one frame, checking its shape against the stream geometry.
    pub fn write_frame(&mut self, frame: &Frame) -> StageResult<()> {
        if frame.geometry != self.geometry {
            return Err(StageError::validation(format!(
                "frame geometry mismatch: got {}x{}, stream expects {}x{}",
                frame.geometry.width,
                frame.geometry.height,
                self.geometry.width,
                self.geometry.height
            )));
        }
        self.writer
            .write_all(&frame.data)
            .map_err(|e| StageError::stream(format!("failed to write frame record: {e}")))
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> StageResult<W> {
        self.writer
            .flush()
            .map_err(|e| StageError::stream(format!("failed to flush frame records: {e}")))?;
        Ok(self.writer)
    }
}

/// Record writer for interleaved sample chunks.
pub struct ChunkWriter<W> {
    writer: W,
    format: AudioFormat,
}

impl<W: Write> ChunkWriter<W> {
    /// Wrap a byte writer accepting `format` records.
    pub fn new(writer: W, format: AudioFormat) -> Self {
        Self { writer, format }
    }

    /// Serialize one chunk, checking its channel count.
    pub fn write_chunk(&mut self, chunk: &SampleChunk) -> StageResult<()> {
        if chunk.channels != self.format.channels {
            return Err(StageError::validation(format!(
                "chunk has {} channels, stream expects {}",
                chunk.channels, self.format.channels
            )));
        }
        self.writer
            .write_all(&chunk.to_record())
            .map_err(|e| StageError::stream(format!("failed to write sample record: {e}")))
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> StageResult<W> {
        self.writer
            .flush()
            .map_err(|e| StageError::stream(format!("failed to flush sample records: {e}")))?;
        Ok(self.writer)
    }
}

/// Reap a decoder child once its stream ends; kill it if the stream is
/// dropped early.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn reap(&mut self) {
        if self.reaped {
            return;
        }
        self.reaped = true;
        if let Err(e) = self.child.wait() {
            warn!("failed to wait for codec process: {e}");
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = self.child.kill();
            self.reap();
        }
    }
}

/// Process-backed frame decoder stream.
///
/// Yields frames until the codec's stdout runs short of a full record, then
/// waits on the process and terminates. Not restartable; a fresh stream
/// requires a fresh [`crate::media::pipe::open_frame_decoder`] call.
pub struct FrameStream {
    inner: FrameReader<BufReader<ChildStdout>>,
    guard: ChildGuard,
}

impl FrameStream {
    pub(crate) fn from_child(mut child: Child, geometry: FrameGeometry) -> StageResult<Self> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StageError::launch("failed to open decoder stdout (unexpected)"))?;
        Ok(Self {
            inner: FrameReader::new(BufReader::new(stdout), geometry),
            guard: ChildGuard {
                child,
                reaped: false,
            },
        })
    }

    /// Geometry of every yielded frame.
    pub fn geometry(&self) -> FrameGeometry {
        self.inner.geometry()
    }
}

impl Iterator for FrameStream {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        match self.inner.next() {
            Some(frame) => Some(frame),
            None => {
                self.guard.reap();
                None
            }
        }
    }
}

/// Process-backed audio decoder stream.
pub struct ChunkStream {
    inner: ChunkReader<BufReader<ChildStdout>>,
    guard: ChildGuard,
}

impl ChunkStream {
    pub(crate) fn from_child(
        mut child: Child,
        format: AudioFormat,
        chunk_frames: u32,
    ) -> StageResult<Self> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StageError::launch("failed to open decoder stdout (unexpected)"))?;
        Ok(Self {
            inner: ChunkReader::new(BufReader::new(stdout), format, chunk_frames),
            guard: ChildGuard {
                child,
                reaped: false,
            },
        })
    }

    /// Format of every yielded chunk.
    pub fn format(&self) -> AudioFormat {
        self.inner.format()
    }
}

impl Iterator for ChunkStream {
    type Item = SampleChunk;

    fn next(&mut self) -> Option<SampleChunk> {
        match self.inner.next() {
            Some(chunk) => Some(chunk),
            None => {
                self.guard.reap();
                None
            }
        }
    }
}

/// Shared state of a process-backed encoder: stdin writer plus the stderr
/// drain used for diagnostics on failure.
struct SinkProcess {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
}

impl SinkProcess {
    fn from_child(mut child: Child) -> StageResult<Self> {
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| StageError::launch("failed to open encoder stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| StageError::launch("failed to open encoder stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });
        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            stderr_drain: Some(stderr_drain),
        })
    }

    fn stdin(&mut self) -> StageResult<&mut ChildStdin> {
        self.stdin
            .as_mut()
            .ok_or_else(|| StageError::stream("encoder is already finalized"))
    }

    /// Close stdin, wait the process to completion and surface a non-zero
    /// exit with its drained stderr.
    fn finish(&mut self) -> StageResult<()> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| StageError::stream("encoder is already finalized"))?;

        let status = child
            .wait()
            .map_err(|e| StageError::stream(format!("failed to wait for encoder: {e}")))?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| StageError::stream("encoder stderr drain thread panicked"))?
                .map_err(|e| StageError::stream(format!("encoder stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            return Err(StageError::stream(format!(
                "encoder exited with status {}: {}",
                status,
                String::from_utf8_lossy(&stderr_bytes).trim()
            )));
        }
        Ok(())
    }
}

impl Drop for SinkProcess {
    fn drop(&mut self) {
        // Early drop without finish(): don't leave a zombie encoder around.
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Process-backed frame encoder.
pub struct FrameSinkProcess {
    process: SinkProcess,
    geometry: FrameGeometry,
}

impl FrameSinkProcess {
    pub(crate) fn from_child(child: Child, geometry: FrameGeometry) -> StageResult<Self> {
        Ok(Self {
            process: SinkProcess::from_child(child)?,
            geometry,
        })
    }

    /// Geometry every written frame must match.
    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    /// Write one frame record in arrival order.
    pub fn write_frame(&mut self, frame: &Frame) -> StageResult<()> {
        if frame.geometry != self.geometry {
            return Err(StageError::validation(format!(
                "frame geometry mismatch: got {}x{}, encoder expects {}x{}",
                frame.geometry.width, frame.geometry.height, self.geometry.width,
                self.geometry.height
            )));
        }
        let stdin = self.process.stdin()?;
        stdin
            .write_all(&frame.data)
            .map_err(|e| StageError::stream(format!("failed to write frame to encoder: {e}")))
    }

    /// Close the write endpoint and wait for the encoder to complete.
    pub fn finish(mut self) -> StageResult<()> {
        self.process.finish()
    }
}

/// Process-backed audio encoder.
pub struct ChunkSinkProcess {
    process: SinkProcess,
    format: AudioFormat,
}

impl ChunkSinkProcess {
    pub(crate) fn from_child(child: Child, format: AudioFormat) -> StageResult<Self> {
        Ok(Self {
            process: SinkProcess::from_child(child)?,
            format,
        })
    }

    /// Format every written chunk must match.
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Write one sample record in arrival order.
    pub fn write_chunk(&mut self, chunk: &SampleChunk) -> StageResult<()> {
        if chunk.channels != self.format.channels {
            return Err(StageError::validation(format!(
                "chunk has {} channels, encoder expects {}",
                chunk.channels, self.format.channels
            )));
        }
        let stdin = self.process.stdin()?;
        stdin
            .write_all(&chunk.to_record())
            .map_err(|e| StageError::stream(format!("failed to write chunk to encoder: {e}")))
    }

    /// Close the write endpoint and wait for the encoder to complete.
    pub fn finish(mut self) -> StageResult<()> {
        self.process.finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/stream.rs"]
mod tests;
