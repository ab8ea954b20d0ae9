//! Watch-and-swap hot reload of capability sets.

pub mod controller;
pub mod watcher;
