//! Capability registry, input vocabulary and the presentation loop.

pub mod capability;
pub mod input;
pub mod session;
pub mod surface;
