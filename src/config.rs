use crate::format::MAX_POINT_COUNT;
use crate::loader::binary::DecodeStrategy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BUFFER_CAPACITY: usize = 1 << 20;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid json: {0}")]
    JsonError(#[from] serde_json::error::Error),

    #[error("Buffer capacity must be greater than zero")]
    ZeroBufferCapacity,
}

/// Options for [`BinaryLoader`](crate::loader::binary::BinaryLoader).
///
/// Deserializes from camelCase json, missing fields take their defaults:
///
/// ```json
/// { "strategy": "streamed", "maxPoints": 1000000, "bufferCapacity": 65536 }
/// ```
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct LoaderOptions {
    pub strategy: DecodeStrategy,
    /// Declared counts above this fail. Never raised past [`MAX_POINT_COUNT`].
    pub max_points: u32,
    /// Read buffer size of the streamed decoder.
    pub buffer_capacity: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            strategy: DecodeStrategy::preferred(),
            max_points: MAX_POINT_COUNT,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl LoaderOptions {
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let options: Self = serde_json::from_slice(bytes)?;
        options.validated()
    }

    pub fn with_strategy(mut self, strategy: DecodeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_max_points(mut self, max_points: u32) -> Self {
        self.max_points = max_points;
        self
    }

    /// Clamps `max_points` to the hard ceiling and rejects an empty read buffer.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        if self.buffer_capacity == 0 {
            return Err(ConfigError::ZeroBufferCapacity);
        }
        self.max_points = self.max_points.min(MAX_POINT_COUNT);
        Ok(self)
    }
}
