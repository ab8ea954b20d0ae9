/// Convenience result type used across avstage.
pub type StageResult<T> = Result<T, StageError>;

/// Top-level error taxonomy used by runtime APIs.
///
/// End-of-stream truncation and user-callback faults are intentionally not
/// represented here: truncation is the normal terminal condition of a record
/// stream, and callback faults are isolated inside the capability registry
/// and reported as a `false` dispatch.
#[derive(thiserror::Error, Debug)]
pub enum StageError {
    /// An external codec process could not be spawned.
    #[error("launch error: {0}")]
    Launch(String),

    /// The audio or display subsystem failed to initialize.
    #[error("device error: {0}")]
    Device(String),

    /// A capability module failed to load; the previous set stays installed.
    #[error("reload error: {0}")]
    Reload(String),

    /// Invalid user-provided geometry, format or options.
    #[error("validation error: {0}")]
    Validation(String),

    /// Pipe I/O or record-protocol fault other than end-of-stream.
    #[error("stream error: {0}")]
    Stream(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StageError {
    /// Build a [`StageError::Launch`] value.
    pub fn launch(msg: impl Into<String>) -> Self {
        Self::Launch(msg.into())
    }

    /// Build a [`StageError::Device`] value.
    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }

    /// Build a [`StageError::Reload`] value.
    pub fn reload(msg: impl Into<String>) -> Self {
        Self::Reload(msg.into())
    }

    /// Build a [`StageError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`StageError::Stream`] value.
    pub fn stream(msg: impl Into<String>) -> Self {
        Self::Stream(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
