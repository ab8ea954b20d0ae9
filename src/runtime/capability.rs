//! Named, optional behavior slots with per-slot fault isolation.
//!
//! A running session may or may not have a callback bound to each reserved
//! capability name. Absence is never an error: dispatch reports `false` and
//! performs the capability's defined default. A callback that panics is
//! logged, removed from its slot, and the loop carries on; one broken user
//! function degrades to a no-op (or silence) instead of ending the session.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::error;

use crate::media::format::{Frame, SampleChunk};
use crate::runtime::input::InputEvent;

/// Callback bound to `init`.
pub type InitFn = Arc<dyn Fn() + Send + Sync>;
/// Callback bound to `video_out`: fills the mutable presentation buffer.
pub type VideoOutFn = Arc<dyn Fn(&mut Frame) + Send + Sync>;
/// Callback bound to `video_in`: observes one decoded input frame.
pub type VideoInFn = Arc<dyn Fn(&Frame) + Send + Sync>;
/// Callback bound to `audio_out`: fills the mutable output chunk.
pub type AudioOutFn = Arc<dyn Fn(&mut SampleChunk) + Send + Sync>;
/// Callback bound to `audio_in`: observes one captured input chunk.
pub type AudioInFn = Arc<dyn Fn(&SampleChunk) + Send + Sync>;
/// Callback bound to `mouse_in` or `keyboard_in`.
pub type InputFn = Arc<dyn Fn(&InputEvent) + Send + Sync>;

/// The reserved capability names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CapabilityName {
    /// Runs once when a session loop starts.
    Init,
    /// Produces the presentation frame each tick.
    VideoOut,
    /// Consumes decoded input frames.
    VideoIn,
    /// Produces audio under the hardware-paced callback.
    AudioOut,
    /// Consumes captured audio chunks.
    AudioIn,
    /// Consumes pointer events.
    MouseIn,
    /// Consumes key events.
    KeyboardIn,
}

impl CapabilityName {
    /// All reserved names.
    pub const ALL: [CapabilityName; 7] = [
        CapabilityName::Init,
        CapabilityName::VideoOut,
        CapabilityName::VideoIn,
        CapabilityName::AudioOut,
        CapabilityName::AudioIn,
        CapabilityName::MouseIn,
        CapabilityName::KeyboardIn,
    ];

    /// The reserved source-level spelling of this name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::VideoOut => "video_out",
            Self::VideoIn => "video_in",
            Self::AudioOut => "audio_out",
            Self::AudioIn => "audio_in",
            Self::MouseIn => "mouse_in",
            Self::KeyboardIn => "keyboard_in",
        }
    }

    /// Parse a reserved name; any other top-level name is ignored by loaders.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.as_str() == s)
    }
}

/// One typed callback tagged with its slot.
#[derive(Clone)]
pub enum Capability {
    /// `init` slot.
    Init(InitFn),
    /// `video_out` slot.
    VideoOut(VideoOutFn),
    /// `video_in` slot.
    VideoIn(VideoInFn),
    /// `audio_out` slot.
    AudioOut(AudioOutFn),
    /// `audio_in` slot.
    AudioIn(AudioInFn),
    /// `mouse_in` slot.
    MouseIn(InputFn),
    /// `keyboard_in` slot.
    KeyboardIn(InputFn),
}

impl Capability {
    /// The slot this callback belongs to.
    pub fn name(&self) -> CapabilityName {
        match self {
            Self::Init(_) => CapabilityName::Init,
            Self::VideoOut(_) => CapabilityName::VideoOut,
            Self::VideoIn(_) => CapabilityName::VideoIn,
            Self::AudioOut(_) => CapabilityName::AudioOut,
            Self::AudioIn(_) => CapabilityName::AudioIn,
            Self::MouseIn(_) => CapabilityName::MouseIn,
            Self::KeyboardIn(_) => CapabilityName::KeyboardIn,
        }
    }
}

/// Explicit optional-field set of installed callbacks.
///
/// Populated at construction/reload time; an absent field means the feature
/// is disabled for the session.
#[derive(Clone, Default)]
pub struct CapabilitySet {
    /// `init` slot.
    pub init: Option<InitFn>,
    /// `video_out` slot.
    pub video_out: Option<VideoOutFn>,
    /// `video_in` slot.
    pub video_in: Option<VideoInFn>,
    /// `audio_out` slot.
    pub audio_out: Option<AudioOutFn>,
    /// `audio_in` slot.
    pub audio_in: Option<AudioInFn>,
    /// `mouse_in` slot.
    pub mouse_in: Option<InputFn>,
    /// `keyboard_in` slot.
    pub keyboard_in: Option<InputFn>,
}

impl CapabilitySet {
    /// An empty set: every dispatch is the defined default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind one callback, replacing any previous entry in its slot.
    pub fn put(&mut self, capability: Capability) {
        match capability {
            Capability::Init(f) => self.init = Some(f),
            Capability::VideoOut(f) => self.video_out = Some(f),
            Capability::VideoIn(f) => self.video_in = Some(f),
            Capability::AudioOut(f) => self.audio_out = Some(f),
            Capability::AudioIn(f) => self.audio_in = Some(f),
            Capability::MouseIn(f) => self.mouse_in = Some(f),
            Capability::KeyboardIn(f) => self.keyboard_in = Some(f),
        }
    }

    /// Builder-style [`CapabilitySet::put`].
    pub fn with(mut self, capability: Capability) -> Self {
        self.put(capability);
        self
    }

    /// Empty one slot.
    pub fn clear(&mut self, name: CapabilityName) {
        match name {
            CapabilityName::Init => self.init = None,
            CapabilityName::VideoOut => self.video_out = None,
            CapabilityName::VideoIn => self.video_in = None,
            CapabilityName::AudioOut => self.audio_out = None,
            CapabilityName::AudioIn => self.audio_in = None,
            CapabilityName::MouseIn => self.mouse_in = None,
            CapabilityName::KeyboardIn => self.keyboard_in = None,
        }
    }

    /// Whether a slot is bound.
    pub fn contains(&self, name: CapabilityName) -> bool {
        match name {
            CapabilityName::Init => self.init.is_some(),
            CapabilityName::VideoOut => self.video_out.is_some(),
            CapabilityName::VideoIn => self.video_in.is_some(),
            CapabilityName::AudioOut => self.audio_out.is_some(),
            CapabilityName::AudioIn => self.audio_in.is_some(),
            CapabilityName::MouseIn => self.mouse_in.is_some(),
            CapabilityName::KeyboardIn => self.keyboard_in.is_some(),
        }
    }

    /// Names of all bound slots.
    pub fn names(&self) -> Vec<CapabilityName> {
        CapabilityName::ALL
            .into_iter()
            .filter(|n| self.contains(*n))
            .collect()
    }
}

impl std::fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilitySet")
            .field("names", &self.names())
            .finish()
    }
}

struct Installed {
    generation: u64,
    set: CapabilitySet,
}

/// Shared name-to-callback mapping with atomic bulk replacement.
///
/// The installed set is an immutable snapshot behind a lock: dispatchers
/// clone the `Arc` and run against a consistent view, replacements swap in a
/// whole new snapshot. A reload happening during an in-flight audio callback
/// can therefore never expose a partially updated mapping.
pub struct CapabilityRegistry {
    installed: RwLock<Arc<Installed>>,
    generation: AtomicU64,
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            installed: RwLock::new(Arc::new(Installed {
                generation: 0,
                set: CapabilitySet::new(),
            })),
            generation: AtomicU64::new(0),
        }
    }

    /// Atomically replace the full installed set.
    ///
    /// Slots absent from `set` become absent in the registry: a reload drops
    /// callbacks the new source version no longer defines.
    pub fn install_all(&self, set: CapabilitySet) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        *self.installed.write() = Arc::new(Installed { generation, set });
    }

    /// Replace a single slot, leaving the others untouched.
    pub fn install(&self, capability: Capability) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let mut guard = self.installed.write();
        let mut set = guard.set.clone();
        set.put(capability);
        *guard = Arc::new(Installed { generation, set });
    }

    /// Names currently bound.
    pub fn installed_names(&self) -> Vec<CapabilityName> {
        self.installed.read().set.names()
    }

    /// Whether a slot is currently bound.
    pub fn contains(&self, name: CapabilityName) -> bool {
        self.installed.read().set.contains(name)
    }

    fn snapshot(&self) -> Arc<Installed> {
        self.installed.read().clone()
    }

    /// Remove a slot, but only from the snapshot generation that faulted. A
    /// reload that landed in between keeps its freshly installed callback.
    fn disable_faulted(&self, name: CapabilityName, generation: u64) {
        let mut guard = self.installed.write();
        if guard.generation != generation {
            return;
        }
        let mut set = guard.set.clone();
        set.clear(name);
        *guard = Arc::new(Installed {
            generation: guard.generation,
            set,
        });
    }

    fn invoke(&self, name: CapabilityName, generation: u64, call: impl FnOnce()) -> bool {
        match catch_unwind(AssertUnwindSafe(call)) {
            Ok(()) => true,
            Err(payload) => {
                error!(
                    capability = name.as_str(),
                    "capability callback panicked, disabling it: {}",
                    panic_message(&payload)
                );
                self.disable_faulted(name, generation);
                false
            }
        }
    }

    /// Dispatch `init`. Absent slot is a no-op.
    pub fn dispatch_init(&self) -> bool {
        let cur = self.snapshot();
        let Some(cb) = cur.set.init.clone() else {
            return false;
        };
        self.invoke(CapabilityName::Init, cur.generation, || cb())
    }

    /// Dispatch `video_out` with the mutable presentation buffer. Absent
    /// slot leaves the buffer untouched.
    pub fn dispatch_video_out(&self, frame: &mut Frame) -> bool {
        let cur = self.snapshot();
        let Some(cb) = cur.set.video_out.clone() else {
            return false;
        };
        self.invoke(CapabilityName::VideoOut, cur.generation, || cb(frame))
    }

    /// Dispatch `video_in` with one decoded frame.
    pub fn dispatch_video_in(&self, frame: &Frame) -> bool {
        let cur = self.snapshot();
        let Some(cb) = cur.set.video_in.clone() else {
            return false;
        };
        self.invoke(CapabilityName::VideoIn, cur.generation, || cb(frame))
    }

    /// Dispatch `audio_out` with the mutable output chunk.
    ///
    /// The defined default is silence: when the slot is absent, or the
    /// callback faults, the chunk is explicitly zeroed rather than left with
    /// stale content.
    pub fn dispatch_audio_out(&self, chunk: &mut SampleChunk) -> bool {
        let cur = self.snapshot();
        let Some(cb) = cur.set.audio_out.clone() else {
            chunk.fill(0);
            return false;
        };
        let ok = self.invoke(CapabilityName::AudioOut, cur.generation, || cb(chunk));
        if !ok {
            chunk.fill(0);
        }
        ok
    }

    /// Dispatch `audio_in` with one captured chunk.
    pub fn dispatch_audio_in(&self, chunk: &SampleChunk) -> bool {
        let cur = self.snapshot();
        let Some(cb) = cur.set.audio_in.clone() else {
            return false;
        };
        self.invoke(CapabilityName::AudioIn, cur.generation, || cb(chunk))
    }

    /// Dispatch `mouse_in` with one pointer event.
    pub fn dispatch_mouse_in(&self, event: &InputEvent) -> bool {
        let cur = self.snapshot();
        let Some(cb) = cur.set.mouse_in.clone() else {
            return false;
        };
        self.invoke(CapabilityName::MouseIn, cur.generation, || cb(event))
    }

    /// Dispatch `keyboard_in` with one key event.
    pub fn dispatch_keyboard_in(&self, event: &InputEvent) -> bool {
        let cur = self.snapshot();
        let Some(cb) = cur.set.keyboard_in.clone() else {
            return false;
        };
        self.invoke(CapabilityName::KeyboardIn, cur.generation, || cb(event))
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/runtime/capability.rs"]
mod tests;
