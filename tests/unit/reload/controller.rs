use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::*;
use crate::runtime::capability::{Capability, CapabilityName};

fn artifact() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("show.toml");
    fs::write(&path, "v1").unwrap();
    (dir, path)
}

fn video_only_set() -> CapabilitySet {
    CapabilitySet::new().with(Capability::VideoOut(Arc::new(|_| {})))
}

#[test]
fn load_now_installs_the_loaded_set() {
    let (_dir, path) = artifact();
    let registry = Arc::new(CapabilityRegistry::new());
    let mut controller = HotReloadController::new(
        &path,
        Box::new(FnCapabilitySource(|_: &std::path::Path| -> StageResult<CapabilitySet> {
            Ok(video_only_set())
        })),
    )
    .unwrap();

    controller.attach(registry.clone());
    controller.load_now().unwrap();
    assert!(registry.contains(CapabilityName::VideoOut));
    assert_eq!(controller.reloads(), 1);
}

#[test]
fn shared_controller_installs_into_every_attached_registry() {
    let (_dir, path) = artifact();
    let first = Arc::new(CapabilityRegistry::new());
    let second = Arc::new(CapabilityRegistry::new());
    let mut controller = HotReloadController::new(
        &path,
        Box::new(FnCapabilitySource(|_: &std::path::Path| -> StageResult<CapabilitySet> {
            Ok(video_only_set())
        })),
    )
    .unwrap();

    controller.attach(first.clone());
    controller.attach(second.clone());
    controller.load_now().unwrap();
    assert!(first.contains(CapabilityName::VideoOut));
    assert!(second.contains(CapabilityName::VideoOut));
}

#[test]
fn load_now_without_a_registry_is_a_reload_error() {
    let (_dir, path) = artifact();
    let mut controller = HotReloadController::new(
        &path,
        Box::new(FnCapabilitySource(|_: &std::path::Path| -> StageResult<CapabilitySet> {
            Ok(CapabilitySet::new())
        })),
    )
    .unwrap();
    assert!(matches!(
        controller.load_now(),
        Err(StageError::Reload(_))
    ));
}

#[test]
fn failed_load_keeps_the_previous_set_installed() {
    let (_dir, path) = artifact();
    let registry = Arc::new(CapabilityRegistry::new());

    let loads = Arc::new(AtomicU64::new(0));
    let counter = loads.clone();
    let mut controller = HotReloadController::new(
        &path,
        Box::new(FnCapabilitySource(move |_: &std::path::Path| -> StageResult<CapabilitySet> {
            if counter.fetch_add(1, Ordering::Relaxed) == 0 {
                Ok(video_only_set())
            } else {
                Err(StageError::reload("syntax error in show.toml"))
            }
        })),
    )
    .unwrap();

    controller.attach(registry.clone());
    controller.load_now().unwrap();
    assert!(registry.contains(CapabilityName::VideoOut));

    assert!(controller.load_now().is_err());
    assert!(registry.contains(CapabilityName::VideoOut));
    assert_eq!(controller.reloads(), 1);
}

#[test]
fn poll_reloads_after_the_artifact_changes() {
    let (_dir, path) = artifact();
    let registry = Arc::new(CapabilityRegistry::new());
    let mut controller = HotReloadController::new(
        &path,
        Box::new(FnCapabilitySource(|_: &std::path::Path| -> StageResult<CapabilitySet> {
            Ok(video_only_set())
        })),
    )
    .unwrap();
    controller.attach(registry.clone());

    assert!(!controller.poll());

    fs::write(&path, "v2").unwrap();
    let mut reloaded = false;
    for _ in 0..100 {
        if controller.poll() {
            reloaded = true;
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(50));
    }
    assert!(reloaded);
    assert!(registry.contains(CapabilityName::VideoOut));
}
