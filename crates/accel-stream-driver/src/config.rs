//! Transfer and device configuration

use crate::WORD_BYTES;
use std::path::PathBuf;
use tracing::debug;

/// Default character device exposed by the DMA kernel module
pub const DEFAULT_DEVICE_PATH: &str = "/dev/simple_dma0";

/// Largest chunk the accelerator's DMA engine accepts per operation
pub const MAX_CHUNK_ELEMENTS: usize = 1024;

/// Default time to wait for the device to become ready (ms)
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 5000;

/// Parameters of one streaming transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    /// Elements per device operation
    pub chunk_size: usize,

    /// Elements that must be written before reading starts
    pub lead_elements: usize,
}

impl TransferConfig {
    /// Create a configuration with an explicit chunk size and lead
    pub const fn new(chunk_size: usize, lead_elements: usize) -> Self {
        Self {
            chunk_size,
            lead_elements,
        }
    }

    /// Configuration for a row-major image streamed through a 2D stencil
    ///
    /// The stencil pipeline needs two full rows before its first output,
    /// and one row per operation keeps chunks aligned to rows (capped at
    /// [`MAX_CHUNK_ELEMENTS`]).
    pub fn for_image(width: usize) -> Self {
        let chunk_size = width.clamp(1, MAX_CHUNK_ELEMENTS);
        let lead_elements = width.saturating_mul(2);

        debug!("Image width {width}: chunk {chunk_size}, lead {lead_elements}");

        Self {
            chunk_size,
            lead_elements,
        }
    }

    /// Configuration with the chunk expressed in bytes
    ///
    /// Byte counts are rounded up to whole words.
    pub const fn from_chunk_bytes(chunk_bytes: usize, lead_elements: usize) -> Self {
        Self {
            chunk_size: chunk_bytes.div_ceil(WORD_BYTES),
            lead_elements,
        }
    }

    /// Set the chunk size
    #[must_use]
    pub const fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the lead
    #[must_use]
    pub const fn with_lead_elements(mut self, lead_elements: usize) -> Self {
        self.lead_elements = lead_elements;
        self
    }

    /// Chunk size in bytes
    pub const fn chunk_bytes(&self) -> usize {
        self.chunk_size * WORD_BYTES
    }
}

impl Default for TransferConfig {
    /// Full-size chunks, no pipeline lead
    fn default() -> Self {
        Self::new(MAX_CHUNK_ELEMENTS, 0)
    }
}

/// Character device channel configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Device node path
    pub path: PathBuf,

    /// How long one chunk may wait for the device to become ready (ms)
    pub poll_timeout_ms: u64,
}

impl DeviceConfig {
    /// Configuration for `path` with the default timeout
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
        }
    }

    /// Set the readiness timeout
    #[must_use]
    pub const fn with_poll_timeout_ms(mut self, poll_timeout_ms: u64) -> Self {
        self.poll_timeout_ms = poll_timeout_ms;
        self
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_image_two_row_lead() {
        let config = TransferConfig::for_image(640);
        assert_eq!(config.chunk_size, 640);
        assert_eq!(config.lead_elements, 1280);
    }

    #[test]
    fn test_for_image_caps_chunk() {
        let config = TransferConfig::for_image(4096);
        assert_eq!(config.chunk_size, MAX_CHUNK_ELEMENTS);
        assert_eq!(config.lead_elements, 8192);
    }

    #[test]
    fn test_from_chunk_bytes_rounds_up() {
        assert_eq!(TransferConfig::from_chunk_bytes(128, 0).chunk_size, 32);
        assert_eq!(TransferConfig::from_chunk_bytes(130, 0).chunk_size, 33);
        assert_eq!(TransferConfig::from_chunk_bytes(128, 0).chunk_bytes(), 128);
    }

    #[test]
    fn test_device_config_defaults() {
        let config = DeviceConfig::default();
        assert_eq!(config.path, PathBuf::from("/dev/simple_dma0"));
        assert_eq!(config.poll_timeout_ms, 5000);

        let config = DeviceConfig::new("/dev/dma1").with_poll_timeout_ms(50);
        assert_eq!(config.poll_timeout_ms, 50);
    }
}
