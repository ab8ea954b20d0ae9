use std::fs;
use std::time::Duration;

use super::*;

fn wait_for_change(watcher: &mut SourceWatcher) -> bool {
    // Notification delivery is asynchronous; poll with a generous deadline.
    for _ in 0..100 {
        if watcher.poll_changed() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

#[test]
fn watching_a_missing_file_is_a_reload_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(matches!(
        SourceWatcher::new(&missing),
        Err(StageError::Reload(_))
    ));
}

#[test]
fn detects_a_write_to_the_watched_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("show.toml");
    fs::write(&path, "a").unwrap();

    let mut watcher = SourceWatcher::new(&path).unwrap();
    assert!(!watcher.poll_changed());

    fs::write(&path, "b").unwrap();
    assert!(wait_for_change(&mut watcher));
}

#[test]
fn ignores_sibling_files_in_the_same_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("show.toml");
    let sibling = dir.path().join("notes.txt");
    fs::write(&path, "a").unwrap();

    let mut watcher = SourceWatcher::new(&path).unwrap();
    fs::write(&sibling, "noise").unwrap();
    std::thread::sleep(Duration::from_millis(300));
    assert!(!watcher.poll_changed());
}

#[test]
fn change_inside_the_debounce_window_is_held_then_fires() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("show.toml");
    fs::write(&path, "a").unwrap();

    let mut watcher = SourceWatcher::new(&path).unwrap();
    fs::write(&path, "b").unwrap();
    assert!(wait_for_change(&mut watcher));

    // A second write right after the first fire lands inside the window;
    // polling it away must not lose it.
    fs::write(&path, "c").unwrap();
    std::thread::sleep(Duration::from_millis(100));
    assert!(!watcher.poll_changed());

    assert!(wait_for_change(&mut watcher));
}

#[test]
fn removing_the_watched_file_does_not_fire() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("show.toml");
    fs::write(&path, "a").unwrap();

    let mut watcher = SourceWatcher::new(&path).unwrap();
    fs::remove_file(&path).unwrap();
    std::thread::sleep(Duration::from_millis(300));
    assert!(!watcher.poll_changed());
}
