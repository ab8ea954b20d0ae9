use std::sync::atomic::AtomicU64;

use super::*;
use crate::foundation::core::Size;
use crate::media::format::ChannelOrder;
use crate::runtime::capability::{Capability, CapabilitySet};
use crate::runtime::input::{DeviceId, Key, Mods};
use crate::runtime::surface::{HeadlessSurface, WindowId};

fn geometry() -> FrameGeometry {
    FrameGeometry::new(8, 6, ChannelOrder::Rgb).unwrap()
}

fn surface(id: u64) -> HeadlessSurface {
    HeadlessSurface::new(WindowId(id), Size::new(8, 6).unwrap())
}

/// A video_out callback that raises `stop` after `ticks` invocations.
fn stopping_video_out(
    ticks: u64,
    counter: Arc<AtomicU64>,
    stop: Arc<AtomicBool>,
) -> Capability {
    Capability::VideoOut(Arc::new(move |frame: &mut Frame| {
        frame.fill([9, 9, 9]);
        if counter.fetch_add(1, Ordering::Relaxed) + 1 >= ticks {
            stop.store(true, Ordering::Relaxed);
        }
    }))
}

#[test]
fn loop_dispatches_init_once_and_ticks_until_stopped() {
    let mut session = Session::new(geometry());
    let registry = session.registry();
    let stop = Arc::new(AtomicBool::new(false));
    let inits = Arc::new(AtomicU64::new(0));
    let ticks = Arc::new(AtomicU64::new(0));

    let init_counter = inits.clone();
    registry.install_all(
        CapabilitySet::new()
            .with(Capability::Init(Arc::new(move || {
                init_counter.fetch_add(1, Ordering::Relaxed);
            })))
            .with(stopping_video_out(3, ticks.clone(), stop.clone())),
    );
    session.attach_surface(Box::new(surface(1)));

    session.run(&stop, None).unwrap();
    assert_eq!(inits.load(Ordering::Relaxed), 1);
    assert_eq!(ticks.load(Ordering::Relaxed), 3);
    assert_eq!(session.state(), LoopState::Stopped);
}

#[test]
fn loop_can_only_be_entered_once() {
    let mut session = Session::new(geometry());
    let stop = Arc::new(AtomicBool::new(true));
    session.attach_surface(Box::new(surface(1)));
    session.run(&stop, None).unwrap();
    assert!(matches!(
        session.run(&stop, None),
        Err(StageError::Validation(_))
    ));
}

#[test]
fn surface_events_route_to_mouse_and_keyboard_slots() {
    let mut session = Session::new(geometry());
    let registry = session.registry();
    let stop = Arc::new(AtomicBool::new(false));
    let pointer_events = Arc::new(AtomicU64::new(0));
    let key_events = Arc::new(AtomicU64::new(0));

    let pointer_counter = pointer_events.clone();
    let key_counter = key_events.clone();
    registry.install_all(
        CapabilitySet::new()
            .with(Capability::MouseIn(Arc::new(move |_| {
                pointer_counter.fetch_add(1, Ordering::Relaxed);
            })))
            .with(Capability::KeyboardIn(Arc::new(move |_| {
                key_counter.fetch_add(1, Ordering::Relaxed);
            })))
            .with(stopping_video_out(
                1,
                Arc::new(AtomicU64::new(0)),
                stop.clone(),
            )),
    );

    let mut window = surface(1);
    window.push_event(InputEvent::PointerMove {
        x: 3.0,
        y: 4.0,
        device: DeviceId::MOUSE,
    });
    window.push_event(InputEvent::KeyPress {
        key: Key::Char('a'),
        mods: Mods::default(),
    });
    session.attach_surface(Box::new(window));

    session.run(&stop, None).unwrap();
    assert_eq!(pointer_events.load(Ordering::Relaxed), 1);
    assert_eq!(key_events.load(Ordering::Relaxed), 1);
}

#[test]
fn dispatch_input_routes_by_event_kind() {
    let session = Session::new(geometry());
    let registry = session.registry();
    let pointer_events = Arc::new(AtomicU64::new(0));
    let pointer_counter = pointer_events.clone();
    registry.install(Capability::MouseIn(Arc::new(move |_| {
        pointer_counter.fetch_add(1, Ordering::Relaxed);
    })));

    session.dispatch_input(&InputEvent::PointerMove {
        x: 0.0,
        y: 0.0,
        device: DeviceId::MOUSE,
    });
    session.dispatch_input(&InputEvent::KeyPress {
        key: Key::Escape,
        mods: Mods::default(),
    });
    assert_eq!(pointer_events.load(Ordering::Relaxed), 1);
}

struct ScriptedPump {
    events: Vec<(crate::runtime::surface::WindowId, InputEvent)>,
}

impl EventPump for ScriptedPump {
    fn poll(&mut self) -> Vec<(crate::runtime::surface::WindowId, InputEvent)> {
        std::mem::take(&mut self.events)
    }
}

#[test]
fn run_all_fans_events_out_by_window() {
    let mut first = Session::new(geometry());
    let mut second = Session::new(geometry());
    let stop = Arc::new(AtomicBool::new(false));

    let first_events = Arc::new(AtomicU64::new(0));
    let second_events = Arc::new(AtomicU64::new(0));
    let first_counter = first_events.clone();
    let second_counter = second_events.clone();

    first.registry().install_all(
        CapabilitySet::new()
            .with(Capability::MouseIn(Arc::new(move |_| {
                first_counter.fetch_add(1, Ordering::Relaxed);
            })))
            .with(stopping_video_out(
                2,
                Arc::new(AtomicU64::new(0)),
                stop.clone(),
            )),
    );
    second.registry().install(Capability::MouseIn(Arc::new(move |_| {
        second_counter.fetch_add(1, Ordering::Relaxed);
    })));

    first.attach_surface(Box::new(surface(1)));
    second.attach_surface(Box::new(surface(2)));

    let pointer = |x| InputEvent::PointerMove {
        x,
        y: 0.0,
        device: DeviceId::MOUSE,
    };
    let mut pump = ScriptedPump {
        events: vec![
            (WindowId(1), pointer(1.0)),
            (WindowId(2), pointer(2.0)),
            // Events for unknown windows are dropped, not misrouted.
            (WindowId(9), pointer(9.0)),
        ],
    };

    let mut sessions = [first, second];
    run_all(&mut sessions, &mut pump, &stop, Vec::new()).unwrap();

    assert_eq!(first_events.load(Ordering::Relaxed), 1);
    assert_eq!(second_events.load(Ordering::Relaxed), 1);
    assert!(sessions.iter().all(|s| s.state() == LoopState::Stopped));
}
