//! Live replacement of a session's capability set.
//!
//! The controller watches one source artifact and, when it changes, asks a
//! [`CapabilitySource`] to build the complete new set, then installs it
//! atomically. A load that fails leaves the previously installed set
//! running untouched.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use crate::foundation::error::{StageError, StageResult};
use crate::reload::watcher::SourceWatcher;
use crate::runtime::capability::{CapabilityRegistry, CapabilitySet};

/// Builds a fresh capability set from a source artifact on disk.
///
/// Implementations own the loading mechanism (an embedded interpreter, a
/// dynamic library, a declarative patch format); the controller owns
/// watching, swap atomicity and failure containment. A returned error must
/// leave no partial state behind.
pub trait CapabilitySource: Send {
    /// Load `path` and construct the complete new set.
    fn load(&mut self, path: &Path) -> StageResult<CapabilitySet>;
}

/// [`CapabilitySource`] over a plain closure, for hosts that assemble their
/// sets in Rust.
pub struct FnCapabilitySource<F>(pub F);

impl<F> CapabilitySource for FnCapabilitySource<F>
where
    F: FnMut(&Path) -> StageResult<CapabilitySet> + Send,
{
    fn load(&mut self, path: &Path) -> StageResult<CapabilitySet> {
        (self.0)(path)
    }
}

/// Watches a source artifact and swaps reloaded capability sets into a
/// registry.
pub struct HotReloadController {
    source: Box<dyn CapabilitySource>,
    watcher: SourceWatcher,
    registries: Vec<Arc<CapabilityRegistry>>,
    reloads: u64,
}

impl HotReloadController {
    /// Start watching `path`; nothing is loaded yet.
    pub fn new(path: &Path, source: Box<dyn CapabilitySource>) -> StageResult<Self> {
        Ok(Self {
            source,
            watcher: SourceWatcher::new(path)?,
            registries: Vec::new(),
            reloads: 0,
        })
    }

    /// Bind a registry that reloads install into. One controller per watched
    /// path; sessions sharing that path attach to the same controller.
    pub fn attach(&mut self, registry: Arc<CapabilityRegistry>) {
        self.registries.push(registry);
    }

    /// Number of successful reloads so far.
    pub fn reloads(&self) -> u64 {
        self.reloads
    }

    /// Load the artifact now and install the result.
    ///
    /// Used for the initial load before a session loop starts, and by
    /// [`HotReloadController::poll`] on every detected change.
    pub fn load_now(&mut self) -> StageResult<()> {
        if self.registries.is_empty() {
            return Err(StageError::reload("no registry attached to reload into"));
        }
        let set = self.source.load(self.watcher.path())?;
        for registry in &self.registries {
            registry.install_all(set.clone());
        }
        self.reloads += 1;
        info!(
            path = %self.watcher.path().display(),
            reloads = self.reloads,
            "capability set installed"
        );
        Ok(())
    }

    /// Check for a change and reload on one; `true` when a new set was
    /// installed. A failed load is logged and the old set keeps running.
    pub fn poll(&mut self) -> bool {
        if !self.watcher.poll_changed() {
            return false;
        }
        match self.load_now() {
            Ok(()) => true,
            Err(e) => {
                error!("reload failed, keeping previous capability set: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/reload/controller.rs"]
mod tests;
