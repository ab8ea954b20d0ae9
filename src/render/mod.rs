//! Offline rendering of capability sets to encoded files.

pub mod offline;
pub mod sink;
