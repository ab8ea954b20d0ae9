use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::*;
use crate::media::format::{ChannelOrder, FrameGeometry};
use crate::runtime::input::{DeviceId, InputEvent};

fn test_frame() -> Frame {
    Frame::zeroed(FrameGeometry::new(4, 4, ChannelOrder::Rgb).unwrap())
}

fn pointer_event() -> InputEvent {
    InputEvent::PointerMove {
        x: 1.0,
        y: 1.0,
        device: DeviceId::MOUSE,
    }
}

#[test]
fn name_spellings_round_trip() {
    for name in CapabilityName::ALL {
        assert_eq!(CapabilityName::parse(name.as_str()), Some(name));
    }
    assert_eq!(CapabilityName::parse("render"), None);
}

#[test]
fn absent_dispatch_is_a_no_op_reporting_false() {
    let registry = CapabilityRegistry::new();
    let mut frame = test_frame();
    frame.fill([5, 5, 5]);

    assert!(!registry.dispatch_init());
    assert!(!registry.dispatch_video_out(&mut frame));
    assert!(!registry.dispatch_mouse_in(&pointer_event()));
    // The presentation buffer is untouched by an absent video_out.
    assert_eq!(frame.pixel(0, 0), Some([5, 5, 5]));
}

#[test]
fn absent_audio_out_silences_the_chunk() {
    let registry = CapabilityRegistry::new();
    let mut chunk = SampleChunk::zeroed(2, 4);
    chunk.fill(99);
    assert!(!registry.dispatch_audio_out(&mut chunk));
    assert!(chunk.samples.iter().all(|s| *s == 0));
}

#[test]
fn install_binds_one_slot_and_leaves_the_rest() {
    let registry = CapabilityRegistry::new();
    let calls = Arc::new(AtomicU64::new(0));
    let counter = calls.clone();
    registry.install(Capability::Init(Arc::new(move || {
        counter.fetch_add(1, Ordering::Relaxed);
    })));

    assert!(registry.contains(CapabilityName::Init));
    assert!(!registry.contains(CapabilityName::VideoOut));
    assert!(registry.dispatch_init());
    assert_eq!(calls.load(Ordering::Relaxed), 1);
}

#[test]
fn install_all_drops_slots_absent_from_the_new_set() {
    let registry = CapabilityRegistry::new();
    registry.install(Capability::Init(Arc::new(|| {})));
    registry.install(Capability::MouseIn(Arc::new(|_| {})));

    registry.install_all(CapabilitySet::new().with(Capability::Init(Arc::new(|| {}))));
    assert!(registry.contains(CapabilityName::Init));
    assert!(!registry.contains(CapabilityName::MouseIn));
}

#[test]
fn panicking_callback_is_disabled_until_reinstalled() {
    let registry = CapabilityRegistry::new();
    registry.install(Capability::VideoOut(Arc::new(|_| {
        panic!("broken user callback");
    })));

    let mut frame = test_frame();
    assert!(!registry.dispatch_video_out(&mut frame));
    assert!(!registry.contains(CapabilityName::VideoOut));
    // The slot stays a cheap no-op afterwards.
    assert!(!registry.dispatch_video_out(&mut frame));

    registry.install(Capability::VideoOut(Arc::new(|f: &mut Frame| {
        f.fill([1, 1, 1])
    })));
    assert!(registry.dispatch_video_out(&mut frame));
    assert_eq!(frame.pixel(0, 0), Some([1, 1, 1]));
}

#[test]
fn faulting_audio_out_still_delivers_silence() {
    let registry = CapabilityRegistry::new();
    registry.install(Capability::AudioOut(Arc::new(|chunk: &mut SampleChunk| {
        chunk.fill(42);
        panic!("fault after writing");
    })));

    let mut chunk = SampleChunk::zeroed(2, 8);
    assert!(!registry.dispatch_audio_out(&mut chunk));
    assert!(chunk.samples.iter().all(|s| *s == 0));
}

#[test]
fn fault_in_one_slot_leaves_other_slots_installed() {
    let registry = CapabilityRegistry::new();
    registry.install(Capability::VideoOut(Arc::new(|_| panic!("fault"))));
    registry.install(Capability::MouseIn(Arc::new(|_| {})));

    let mut frame = test_frame();
    assert!(!registry.dispatch_video_out(&mut frame));
    assert!(registry.contains(CapabilityName::MouseIn));
    assert!(registry.dispatch_mouse_in(&pointer_event()));
}

#[test]
fn fault_removal_skips_slots_reinstalled_in_between() {
    let registry = CapabilityRegistry::new();
    registry.install(Capability::VideoOut(Arc::new(|_| {})));
    let stale_generation = registry.installed.read().generation;

    // A reload lands before the faulted generation gets to disable itself.
    registry.install_all(CapabilitySet::new().with(Capability::VideoOut(Arc::new(|_| {}))));
    registry.disable_faulted(CapabilityName::VideoOut, stale_generation);
    assert!(registry.contains(CapabilityName::VideoOut));

    // Against the live generation the removal applies.
    let live_generation = registry.installed.read().generation;
    registry.disable_faulted(CapabilityName::VideoOut, live_generation);
    assert!(!registry.contains(CapabilityName::VideoOut));
}

#[test]
fn install_all_is_atomic_under_concurrent_snapshots() {
    let registry = Arc::new(CapabilityRegistry::new());
    let reader = {
        let registry = registry.clone();
        std::thread::spawn(move || {
            // video_out and keyboard_in are only ever installed together;
            // a snapshot must never observe one without the other.
            for _ in 0..20_000 {
                let snap = registry.snapshot();
                assert_eq!(
                    snap.set.contains(CapabilityName::VideoOut),
                    snap.set.contains(CapabilityName::KeyboardIn)
                );
            }
        })
    };

    for i in 0..2_000 {
        if i % 2 == 0 {
            registry.install_all(
                CapabilitySet::new()
                    .with(Capability::VideoOut(Arc::new(|_| {})))
                    .with(Capability::KeyboardIn(Arc::new(|_| {}))),
            );
        } else {
            registry.install_all(CapabilitySet::new());
        }
    }
    reader.join().unwrap();
}

#[test]
fn set_debug_lists_installed_names() {
    let set = CapabilitySet::new()
        .with(Capability::Init(Arc::new(|| {})))
        .with(Capability::AudioOut(Arc::new(|_| {})));
    let debug = format!("{set:?}");
    assert!(debug.contains("Init"));
    assert!(debug.contains("AudioOut"));
    assert!(!debug.contains("VideoIn"));
}
