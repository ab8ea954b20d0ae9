//! The runtime instance and its cooperative presentation loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use crate::audio::bridge::{AudioBridge, AudioConfig};
use crate::foundation::error::{StageError, StageResult};
use crate::media::format::{Frame, FrameGeometry};
use crate::media::pipe::{DecodeOpts, MediaSource, open_frame_decoder};
use crate::media::stream::FrameStream;
use crate::reload::controller::HotReloadController;
use crate::runtime::capability::{CapabilityName, CapabilityRegistry};
use crate::runtime::input::InputEvent;
use crate::runtime::surface::{EventPump, PresentSurface};

/// Pacing interval when no video capability is active, to avoid
/// busy-spinning an audio-only session.
pub const IDLE_TICK: Duration = Duration::from_millis(100);

/// Lifecycle of a presentation loop, entered once per session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// Created, loop not yet entered.
    Idle,
    /// Loop running.
    Running,
    /// Loop exited; owned resources released.
    Stopped,
}

/// Decoded video input bound to a session, with its re-open recipe.
///
/// A spoofed (looping) source that reaches end-of-stream is re-opened and
/// retried at most once per tick; a second failure that tick yields no frame,
/// so the retry rate is bounded by the tick rate.
pub struct VideoInput {
    source: MediaSource,
    geometry: FrameGeometry,
    opts: DecodeOpts,
    stream: FrameStream,
    reopen_on_eof: bool,
}

impl VideoInput {
    /// Open a decoder for `source` and wrap it for per-tick pulls.
    ///
    /// `reopen_on_eof` marks loopable sources (spoofed cameras); real
    /// cameras and finite files terminate instead.
    pub fn open(
        source: MediaSource,
        geometry: FrameGeometry,
        opts: DecodeOpts,
        reopen_on_eof: bool,
    ) -> StageResult<Self> {
        let stream = open_frame_decoder(&source, geometry, opts)?;
        Ok(Self {
            source,
            geometry,
            opts,
            stream,
            reopen_on_eof,
        })
    }

    /// Geometry of delivered frames.
    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    /// Pull exactly one frame; `None` when the stream ended this tick.
    pub fn next_frame(&mut self) -> Option<Frame> {
        if let Some(frame) = self.stream.next() {
            return Some(frame);
        }
        if !self.reopen_on_eof {
            return None;
        }

        debug!("video input ended, re-opening looping source");
        match open_frame_decoder(&self.source, self.geometry, self.opts) {
            Ok(stream) => {
                self.stream = stream;
                let frame = self.stream.next();
                if frame.is_none() {
                    warn!("re-opened video input produced no frame, skipping this tick");
                }
                frame
            }
            Err(e) => {
                warn!("failed to re-open video input: {e}");
                None
            }
        }
    }
}

/// One runtime instance: a capability registry plus its optional display
/// surface, video input and audio binding.
pub struct Session {
    registry: Arc<CapabilityRegistry>,
    surface: Option<Box<dyn PresentSurface>>,
    video_in: Option<VideoInput>,
    audio: Option<AudioBridge>,
    scratch: Frame,
    state: LoopState,
}

impl Session {
    /// Create an idle session presenting at `geometry`.
    pub fn new(geometry: FrameGeometry) -> Self {
        Self {
            registry: Arc::new(CapabilityRegistry::new()),
            surface: None,
            video_in: None,
            audio: None,
            scratch: Frame::zeroed(geometry),
            state: LoopState::Idle,
        }
    }

    /// The session's registry, shared with reload controllers and the audio
    /// bridge.
    pub fn registry(&self) -> Arc<CapabilityRegistry> {
        self.registry.clone()
    }

    /// Current loop state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Bind a display surface.
    pub fn attach_surface(&mut self, surface: Box<dyn PresentSurface>) {
        self.surface = Some(surface);
    }

    /// Bind a decoded video input feeding the `video_in` capability.
    pub fn attach_video_input(&mut self, input: VideoInput) {
        self.video_in = Some(input);
    }

    /// Start the hardware-paced audio bridge for this session.
    pub fn start_audio(&mut self, cfg: AudioConfig, capture: bool) -> StageResult<()> {
        self.audio = Some(AudioBridge::start(self.registry.clone(), cfg, capture)?);
        Ok(())
    }

    /// Run the cooperative loop until `stop` is raised.
    ///
    /// Each tick drains input events, pulls at most one input frame, and
    /// produces/presents one output frame (or paces when no video capability
    /// is active). All owned resources are released on every exit path.
    pub fn run(
        &mut self,
        stop: &AtomicBool,
        mut reload: Option<&mut HotReloadController>,
    ) -> StageResult<()> {
        self.enter_running()?;
        self.registry.dispatch_init();

        while !stop.load(Ordering::Relaxed) {
            if let Some(ctl) = reload.as_mut() {
                ctl.poll();
            }
            let presented = self.tick();
            if !presented {
                std::thread::sleep(IDLE_TICK);
            }
        }

        self.shutdown();
        Ok(())
    }

    fn enter_running(&mut self) -> StageResult<()> {
        if self.state != LoopState::Idle {
            return Err(StageError::validation(
                "a session loop can only be entered once",
            ));
        }
        self.state = LoopState::Running;
        Ok(())
    }

    fn shutdown(&mut self) {
        self.state = LoopState::Stopped;
        // Scoped release: surface, audio binding and input stream handles
        // all tear down through Drop.
        self.surface = None;
        self.audio = None;
        self.video_in = None;
    }

    /// Route one event to `mouse_in` or `keyboard_in`.
    pub fn dispatch_input(&self, event: &InputEvent) {
        if event.is_pointer() {
            self.registry.dispatch_mouse_in(event);
        } else {
            self.registry.dispatch_keyboard_in(event);
        }
    }

    /// One full tick: input drain plus AV update. Returns whether a frame
    /// was presented (callers pace when nothing was).
    fn tick(&mut self) -> bool {
        if let Some(surface) = self.surface.as_mut() {
            for event in surface.poll_events() {
                if event.is_pointer() {
                    self.registry.dispatch_mouse_in(&event);
                } else {
                    self.registry.dispatch_keyboard_in(&event);
                }
            }
        }
        self.update_av()
    }

    /// Per-tick video update shared by the single and multi-instance loops.
    fn update_av(&mut self) -> bool {
        if self.registry.contains(CapabilityName::VideoIn)
            && let Some(input) = self.video_in.as_mut()
            && let Some(frame) = input.next_frame()
        {
            self.registry.dispatch_video_in(&frame);
        }

        if self.registry.contains(CapabilityName::VideoOut)
            && let Some(surface) = self.surface.as_mut()
        {
            self.registry.dispatch_video_out(&mut self.scratch);
            if let Err(e) = surface.present(&self.scratch) {
                warn!("failed to present frame: {e}");
            }
            return true;
        }
        false
    }

    fn surface_id(&self) -> Option<crate::runtime::surface::WindowId> {
        self.surface.as_ref().map(|s| s.id())
    }
}

/// Multi-instance loop: one shared event queue, N isolated registries.
///
/// Events are fanned out to the session owning the originating window, then
/// every session's per-tick AV update runs in the same shared loop. The loop
/// paces only when no session presented a frame.
pub fn run_all(
    sessions: &mut [Session],
    pump: &mut dyn EventPump,
    stop: &AtomicBool,
    mut controllers: Vec<&mut HotReloadController>,
) -> StageResult<()> {
    for session in sessions.iter_mut() {
        session.enter_running()?;
    }
    for session in sessions.iter() {
        session.registry.dispatch_init();
    }

    while !stop.load(Ordering::Relaxed) {
        for ctl in controllers.iter_mut() {
            ctl.poll();
        }

        for (window, event) in pump.poll() {
            match sessions
                .iter()
                .find(|s| s.surface_id() == Some(window))
            {
                Some(session) => session.dispatch_input(&event),
                None => debug!(window = window.0, "event for unknown window dropped"),
            }
        }

        let mut any_presented = false;
        for session in sessions.iter_mut() {
            any_presented |= session.update_av();
        }
        if !any_presented {
            std::thread::sleep(IDLE_TICK);
        }
    }

    for session in sessions.iter_mut() {
        session.shutdown();
    }
    Ok(())
}

/// Install an interrupt handler that raises the returned stop flag.
pub fn install_stop_signal() -> StageResult<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = flag.clone();
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::Relaxed))
        .map_err(|e| StageError::device(format!("failed to install interrupt handler: {e}")))?;
    Ok(flag)
}

#[cfg(test)]
#[path = "../../tests/unit/runtime/session.rs"]
mod tests;
