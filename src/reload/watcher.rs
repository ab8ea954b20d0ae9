//! Debounced change detection for a single source artifact.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, unbounded};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::warn;

use crate::foundation::error::{StageError, StageResult};

/// Minimum interval between reported changes. Editors commonly save with a
/// burst of writes and renames; one reload per burst is enough.
pub const DEBOUNCE: Duration = Duration::from_millis(250);

/// Watches one file and answers "did it change since last asked".
///
/// The watch is placed on the parent directory: editors that save by
/// write-then-rename replace the file's inode, which would detach a watch
/// placed on the file itself.
pub struct SourceWatcher {
    _watcher: RecommendedWatcher,
    events: Receiver<notify::Result<Event>>,
    path: PathBuf,
    last_fire: Option<Instant>,
    pending: bool,
}

impl SourceWatcher {
    /// Start watching `path`. The file must exist.
    pub fn new(path: &Path) -> StageResult<Self> {
        let canonical = path
            .canonicalize()
            .map_err(|e| StageError::reload(format!("cannot watch '{}': {e}", path.display())))?;
        let parent = canonical
            .parent()
            .ok_or_else(|| {
                StageError::reload(format!(
                    "cannot watch '{}': no parent directory",
                    canonical.display()
                ))
            })?
            .to_path_buf();

        let (tx, rx) = unbounded();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .map_err(|e| StageError::reload(format!("failed to create file watcher: {e}")))?;
        watcher
            .watch(&parent, RecursiveMode::NonRecursive)
            .map_err(|e| {
                StageError::reload(format!("failed to watch '{}': {e}", parent.display()))
            })?;

        Ok(Self {
            _watcher: watcher,
            events: rx,
            path: canonical,
            last_fire: None,
            pending: false,
        })
    }

    /// The canonical path under watch.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drain pending notifications without blocking; `true` when the watched
    /// file was created or modified and the debounce window has elapsed.
    ///
    /// A change landing inside the window is held, not dropped: it fires on
    /// the first poll after the window elapses. Removals are ignored; the
    /// next save of the file is what matters.
    pub fn poll_changed(&mut self) -> bool {
        while let Ok(res) = self.events.try_recv() {
            match res {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
                        && event.paths.iter().any(|p| p == &self.path)
                    {
                        self.pending = true;
                    }
                }
                Err(e) => warn!("file watcher error: {e}"),
            }
        }
        if !self.pending {
            return false;
        }

        let now = Instant::now();
        match self.last_fire {
            Some(last) if now.duration_since(last) < DEBOUNCE => false,
            _ => {
                self.pending = false;
                self.last_fire = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/reload/watcher.rs"]
mod tests;
