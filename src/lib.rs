//! avstage is a live-coding audio/visual runtime.
//!
//! Media moves through external codec processes as raw streams of fixed-size
//! records; user behavior is a set of named capability callbacks that can be
//! replaced atomically while the session runs. The public API is
//! session-oriented:
//!
//! - Decode and encode raw media through the [`media`] process pipes
//! - Install callbacks into a [`CapabilityRegistry`] and drive them with a
//!   [`Session`] loop
//! - Swap whole capability sets on source changes with a
//!   [`HotReloadController`]
//! - Render the same callbacks offline, faster or slower than real time,
//!   with [`render_offline`]
#![forbid(unsafe_code)]

pub mod audio;
pub mod foundation;
pub mod media;
pub mod reload;
pub mod render;
pub mod runtime;

pub use crate::audio::bridge::{AudioBridge, AudioConfig};
pub use crate::foundation::core::Size;
pub use crate::foundation::error::{StageError, StageResult};
pub use crate::media::format::{AudioFormat, ChannelOrder, Frame, FrameGeometry, SampleChunk};
pub use crate::media::pipe::{DecodeOpts, MediaSource};
pub use crate::media::probe::{MediaInfo, infer_size, probe_media};
pub use crate::reload::controller::{CapabilitySource, FnCapabilitySource, HotReloadController};
pub use crate::render::offline::{RenderOpts, render_frames, render_offline};
pub use crate::render::sink::{ChunkSink, FrameSink, MemoryChunkSink, MemoryFrameSink};
pub use crate::runtime::capability::{Capability, CapabilityName, CapabilityRegistry, CapabilitySet};
pub use crate::runtime::input::{InputEvent, Key, Mods, PointerButton};
pub use crate::runtime::session::{
    IDLE_TICK, LoopState, Session, VideoInput, install_stop_signal, run_all,
};
pub use crate::runtime::surface::{EventPump, HeadlessSurface, PresentSurface, WindowId};
