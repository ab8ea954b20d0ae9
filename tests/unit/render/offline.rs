use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::*;
use crate::media::format::ChannelOrder;
use crate::render::sink::{MemoryChunkSink, MemoryFrameSink};
use crate::runtime::capability::Capability;

fn opts() -> RenderOpts {
    RenderOpts {
        geometry: FrameGeometry::new(8, 6, ChannelOrder::Rgb).unwrap(),
        fps: 10,
        duration_secs: 1.0,
        sample_rate: 8_000,
        channels: 2,
    }
}

#[test]
fn validation_rejects_degenerate_parameters() {
    assert!(RenderOpts { fps: 0, ..opts() }.validate().is_err());
    assert!(
        RenderOpts {
            duration_secs: 0.0,
            ..opts()
        }
        .validate()
        .is_err()
    );
    assert!(
        RenderOpts {
            duration_secs: f64::NAN,
            ..opts()
        }
        .validate()
        .is_err()
    );
    assert!(
        RenderOpts {
            sample_rate: 0,
            ..opts()
        }
        .validate()
        .is_err()
    );
    assert!(RenderOpts { channels: 0, ..opts() }.validate().is_err());
}

#[test]
fn validation_requires_even_dimensions() {
    let odd = RenderOpts {
        geometry: FrameGeometry::new(7, 6, ChannelOrder::Rgb).unwrap(),
        ..opts()
    };
    assert!(matches!(odd.validate(), Err(StageError::Validation(_))));
}

#[test]
fn validation_requires_sample_rate_divisible_by_fps() {
    let drifting = RenderOpts {
        sample_rate: 44_100,
        fps: 24,
        ..opts()
    };
    assert!(matches!(
        drifting.validate(),
        Err(StageError::Validation(_))
    ));
    assert!(
        RenderOpts {
            sample_rate: 48_000,
            fps: 24,
            ..opts()
        }
        .validate()
        .is_ok()
    );
}

#[test]
fn frame_count_floors_fractional_durations() {
    assert_eq!(opts().total_frames(), 10);
    assert_eq!(
        RenderOpts {
            duration_secs: 1.55,
            ..opts()
        }
        .total_frames(),
        15
    );
    assert_eq!(
        RenderOpts {
            duration_secs: 0.05,
            ..opts()
        }
        .total_frames(),
        0
    );
}

#[test]
fn render_produces_exact_frame_and_chunk_counts() {
    let opts = RenderOpts {
        duration_secs: 0.7,
        ..opts()
    };
    let registry = CapabilityRegistry::new();
    let ticks = Arc::new(AtomicU64::new(0));
    let counter = ticks.clone();
    registry.install(Capability::VideoOut(Arc::new(move |frame: &mut Frame| {
        let t = counter.fetch_add(1, Ordering::Relaxed);
        frame.fill([t as u8, 0, 0]);
    })));
    registry.install(Capability::AudioOut(Arc::new(|chunk: &mut SampleChunk| {
        chunk.fill(5);
    })));

    let mut video = MemoryFrameSink::default();
    let mut audio = MemoryChunkSink::default();
    render_frames(&registry, opts, &mut video, Some(&mut audio)).unwrap();

    assert_eq!(video.announced, Some(7));
    assert_eq!(video.frames.len(), 7);
    assert!(video.ended);
    assert_eq!(video.frames[0].pixel(0, 0), Some([0, 0, 0]));
    assert_eq!(video.frames[6].pixel(0, 0), Some([6, 0, 0]));

    assert_eq!(audio.chunks.len(), 7);
    assert!(audio.ended);
    // 8000 Hz / 10 fps = 800 sample frames per chunk.
    assert!(audio.chunks.iter().all(|c| c.frames() == 800));
    assert!(audio.chunks[0].samples.iter().all(|s| *s == 5));
}

#[test]
fn absent_callbacks_render_black_frames_and_silence() {
    let registry = CapabilityRegistry::new();
    let mut video = MemoryFrameSink::default();
    let mut audio = MemoryChunkSink::default();
    render_frames(
        &registry,
        RenderOpts {
            duration_secs: 0.3,
            ..opts()
        },
        &mut video,
        Some(&mut audio),
    )
    .unwrap();

    assert_eq!(video.frames.len(), 3);
    assert!(video.frames.iter().all(|f| f.data.iter().all(|b| *b == 0)));
    assert!(
        audio
            .chunks
            .iter()
            .all(|c| c.samples.iter().all(|s| *s == 0))
    );
}

#[test]
fn render_runs_init_before_the_first_frame() {
    let registry = CapabilityRegistry::new();
    let order = Arc::new(AtomicU64::new(0));
    let init_seen = order.clone();
    registry.install(Capability::Init(Arc::new(move || {
        init_seen.store(1, Ordering::Relaxed);
    })));
    let first_frame_order = Arc::new(AtomicU64::new(0));
    let frame_seen = first_frame_order.clone();
    let init_order = order.clone();
    registry.install(Capability::VideoOut(Arc::new(move |_: &mut Frame| {
        frame_seen
            .compare_exchange(
                0,
                init_order.load(Ordering::Relaxed),
                Ordering::Relaxed,
                Ordering::Relaxed,
            )
            .ok();
    })));

    let mut video = MemoryFrameSink::default();
    render_frames(
        &registry,
        RenderOpts {
            duration_secs: 0.2,
            ..opts()
        },
        &mut video,
        None,
    )
    .unwrap();
    // video_out observed the init side effect on its first invocation.
    assert_eq!(first_frame_order.load(Ordering::Relaxed), 1);
}

#[test]
fn render_offline_refuses_to_clobber_without_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out.mp4");
    std::fs::write(&dest, "existing").unwrap();

    let registry = CapabilityRegistry::new();
    assert!(matches!(
        render_offline(&registry, opts(), &dest, false),
        Err(StageError::Validation(_))
    ));
    // The existing file is untouched.
    assert_eq!(std::fs::read(&dest).unwrap(), b"existing");
}
