pub mod format;
pub mod pipe;
pub mod probe;
pub mod stream;
