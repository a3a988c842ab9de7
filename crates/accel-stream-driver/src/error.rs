//! Error types for streaming transfers
//!
//! Two layers: [`ChannelError`] is what a channel reports for a single
//! primitive, [`StreamError`] is the tagged outcome of a whole transfer.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for transfer operations
pub type Result<T> = std::result::Result<T, StreamError>;

/// Transfer direction of a failed chunk operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host buffer into the device
    Write,
    /// Device output back into the host buffer
    Read,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Write => write!(f, "write"),
            Self::Read => write!(f, "read"),
        }
    }
}

/// Errors that can occur during a streaming transfer
#[derive(Debug, Error)]
pub enum StreamError {
    /// Zero length, zero chunk size, or a length the buffer cannot hold.
    /// Detected before the channel is touched.
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the inputs
        reason: String,
    },

    /// The channel could not be opened
    #[error("Device unavailable: {source}")]
    DeviceUnavailable {
        /// Underlying channel error
        #[source]
        source: ChannelError,
    },

    /// A chunk operation failed; the transfer was aborted
    #[error("Transfer failed: {direction} of {count} elements at offset {offset}: {source}")]
    TransferFailure {
        /// Which side failed
        direction: Direction,
        /// Element offset of the failed chunk
        offset: usize,
        /// Element count of the failed chunk
        count: usize,
        /// Underlying channel error
        #[source]
        source: ChannelError,
    },
}

impl StreamError {
    /// Create an invalid argument error
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create a device unavailable error
    pub const fn device_unavailable(source: ChannelError) -> Self {
        Self::DeviceUnavailable { source }
    }

    /// Create a transfer failure error
    pub const fn transfer_failure(
        direction: Direction,
        offset: usize,
        count: usize,
        source: ChannelError,
    ) -> Self {
        Self::TransferFailure {
            direction,
            offset,
            count,
            source,
        }
    }

    /// Whether the caller can fix the inputs and retry.
    ///
    /// Channel failures leave the device pipeline in an unknown state and
    /// are never recoverable from the controller's point of view.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }
}

/// Errors reported by a [`Channel`](crate::Channel) primitive
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Device node does not exist
    #[error("Device not found: {}", path.display())]
    DeviceNotFound {
        /// Path that was checked
        path: PathBuf,
    },

    /// I/O error during device communication
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// Device did not become ready in time
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds
        duration_ms: u64,
    },

    /// Read requested more output than the pipeline has produced
    #[error("Pipeline underrun: requested {requested} elements, {available} available")]
    Underrun {
        /// Elements requested
        requested: usize,
        /// Elements the pipeline could supply
        available: usize,
    },

    /// Device refused the operation
    #[error("Operation rejected: {reason}")]
    Rejected {
        /// Reason for rejection
        reason: String,
    },

    /// Primitive used without a successful `open`
    #[error("Channel is not open")]
    NotOpen,
}

impl ChannelError {
    /// Create a device not found error
    pub fn device_not_found(path: impl Into<PathBuf>) -> Self {
        Self::DeviceNotFound { path: path.into() }
    }

    /// Create a rejected error
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}

impl From<rustix::io::Errno> for ChannelError {
    fn from(errno: rustix::io::Errno) -> Self {
        Self::Io {
            source: errno.into(),
        }
    }
}
