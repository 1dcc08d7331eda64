//! Tunables for response body streaming.
//!
//! A [`StreamConfig`] is handed to the [`Realizer`](crate::realize::Realizer) and from
//! there to every producer it drives. The defaults are suitable for most hosts:
//!
//! ```
//! use micro_wai::config::StreamConfig;
//!
//! let config = StreamConfig::builder().block_size(16 * 1024).build().unwrap();
//! assert_eq!(config.block_size(), 16 * 1024);
//! ```

use crate::ensure;
use crate::protocol::ConfigError;

/// Size of a single file read, and therefore the upper bound of a file chunk.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Streaming configuration shared by all producers of one realizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    block_size: usize,
}

impl StreamConfig {
    /// Starts from the defaults, see [`DEFAULT_BLOCK_SIZE`].
    pub fn builder() -> StreamConfigBuilder {
        StreamConfigBuilder::new()
    }

    /// The maximum number of bytes read from a file per chunk.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { block_size: DEFAULT_BLOCK_SIZE }
    }
}

#[derive(Debug, Clone)]
pub struct StreamConfigBuilder {
    block_size: usize,
}

impl StreamConfigBuilder {
    fn new() -> Self {
        Self { block_size: DEFAULT_BLOCK_SIZE }
    }

    /// Upper bound of a single file read, must be greater than zero.
    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn build(self) -> Result<StreamConfig, ConfigError> {
        ensure!(self.block_size > 0, ConfigError::invalid_block_size(self.block_size));

        Ok(StreamConfig { block_size: self.block_size })
    }
}
