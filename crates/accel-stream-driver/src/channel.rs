//! Channel abstraction
//!
//! The controller treats the accelerator as an opaque, blocking, chunked
//! endpoint. Everything device-specific (node path, register layout,
//! readiness signalling) lives behind this trait.

use crate::channels::{DeviceChannel, LoopbackChannel, RecordingChannel};
use crate::config::DeviceConfig;
use crate::error::ChannelError;
use crate::Word;
use std::fmt::Debug;

/// Blocking chunked endpoint consumed by the stream controller
///
/// `offset` arguments are the element offset of the chunk within the
/// caller's buffer. Channels may use them for logging or bookkeeping; the
/// data itself is always the slice passed in.
pub trait Channel: Debug {
    /// Acquire exclusive access to the device
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened.
    fn open(&mut self) -> Result<(), ChannelError>;

    /// Hand `chunk` to the device input queue
    ///
    /// Returns once every element has been accepted (not necessarily
    /// processed).
    ///
    /// # Errors
    ///
    /// Returns error if the device rejects or fails the transfer.
    fn write_chunk(&mut self, offset: usize, chunk: &[Word]) -> Result<(), ChannelError>;

    /// Fill `chunk` with device output, in production order
    ///
    /// # Errors
    ///
    /// Returns error if the device fails the transfer.
    fn read_chunk(&mut self, offset: usize, chunk: &mut [Word]) -> Result<(), ChannelError>;

    /// Release the device
    fn close(&mut self);

    /// Channel type for logging
    fn kind(&self) -> ChannelKind;
}

/// Channel type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Character device node (e.g. `/dev/simple_dma0`)
    Device,

    /// In-memory pipeline model, no hardware required
    Loopback,

    /// Recording test double
    Recording,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Device => write!(f, "Device"),
            Self::Loopback => write!(f, "Loopback"),
            Self::Recording => write!(f, "Recording"),
        }
    }
}

/// Channel selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSelection {
    /// Device node if it exists, loopback otherwise
    Auto,

    /// Force the character device
    Device,

    /// Force the software loopback (identity transform, no latency)
    Loopback,

    /// Dry run: record operations, echo data back
    Recording,
}

/// Build a channel according to `selection`
///
/// Nothing is opened here; the controller opens the channel when a transfer
/// starts.
pub fn select_channel(selection: ChannelSelection, config: &DeviceConfig) -> Box<dyn Channel> {
    match selection {
        ChannelSelection::Auto => {
            if config.path.exists() {
                tracing::info!("Using device channel at {}", config.path.display());
                Box::new(DeviceChannel::new(config.clone()))
            } else {
                tracing::info!(
                    "{} missing, using loopback channel",
                    config.path.display()
                );
                Box::new(LoopbackChannel::identity())
            }
        }

        ChannelSelection::Device => Box::new(DeviceChannel::new(config.clone())),

        ChannelSelection::Loopback => Box::new(LoopbackChannel::identity()),

        ChannelSelection::Recording => Box::new(RecordingChannel::new()),
    }
}
