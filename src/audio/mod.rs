//! Hardware-paced audio binding.

pub mod bridge;
