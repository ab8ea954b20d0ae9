//! Narrow seam to the display/input subsystem.
//!
//! Window-surface creation and pixel-buffer acquisition are external
//! collaborators; the runtime only needs to present fixed-shape frames and
//! drain input events. [`HeadlessSurface`] is the in-crate double used by
//! tests and audio-only sessions that still want scripted input.

use crate::foundation::core::Size;
use crate::foundation::error::StageResult;
use crate::media::format::Frame;
use crate::runtime::input::InputEvent;

/// Identifier of the window a surface presents into, used to route shared
/// event-queue entries to the owning session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WindowId(pub u64);

/// A presentable display target plus its per-window input queue.
pub trait PresentSurface: Send {
    /// Window identifier for event routing.
    fn id(&self) -> WindowId;

    /// Current presentation size in pixels.
    fn size(&self) -> Size;

    /// Drain all pending input events for this window.
    ///
    /// Implementations deliver pointer coordinates in presentation pixels
    /// (normalizing unit-coordinate touch contacts by [`Self::size`]).
    fn poll_events(&mut self) -> Vec<InputEvent>;

    /// Present/flip one frame to the display.
    fn present(&mut self, frame: &Frame) -> StageResult<()>;
}

/// Shared event queue for multi-instance loops: one poll, events tagged with
/// the destination window.
pub trait EventPump {
    /// Drain all pending events across every window.
    fn poll(&mut self) -> Vec<(WindowId, InputEvent)>;
}

/// Surface double that records presented frames and replays scripted events.
pub struct HeadlessSurface {
    id: WindowId,
    size: Size,
    queued: Vec<InputEvent>,
    /// Number of frames presented so far.
    pub presented: u64,
    /// The most recently presented frame, if any.
    pub last_frame: Option<Frame>,
}

impl HeadlessSurface {
    /// Create a headless surface of the given size.
    pub fn new(id: WindowId, size: Size) -> Self {
        Self {
            id,
            size,
            queued: Vec::new(),
            presented: 0,
            last_frame: None,
        }
    }

    /// Queue an event for the next [`PresentSurface::poll_events`] drain.
    pub fn push_event(&mut self, event: InputEvent) {
        self.queued.push(event);
    }
}

impl PresentSurface for HeadlessSurface {
    fn id(&self) -> WindowId {
        self.id
    }

    fn size(&self) -> Size {
        self.size
    }

    fn poll_events(&mut self) -> Vec<InputEvent> {
        std::mem::take(&mut self.queued)
    }

    fn present(&mut self, frame: &Frame) -> StageResult<()> {
        self.presented += 1;
        self.last_frame = Some(frame.clone());
        Ok(())
    }
}
