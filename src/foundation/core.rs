use crate::foundation::error::{StageError, StageResult};

/// Presentation dimensions in pixels.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Size {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Size {
    /// Create a validated, non-zero size.
    pub fn new(width: u32, height: u32) -> StageResult<Self> {
        if width == 0 || height == 0 {
            return Err(StageError::validation("size width/height must be non-zero"));
        }
        Ok(Self { width, height })
    }

    /// Pixel count.
    pub fn area(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
