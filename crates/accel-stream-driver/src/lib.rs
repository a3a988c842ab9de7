//! Chunked, pipelined streaming transfers through an FPGA accelerator.
//!
//! The accelerator exposes one fixed-width DMA channel that accepts and
//! returns data in bounded chunks, and its processing pipeline only starts
//! producing output after a minimum amount of input has gone in. This crate
//! moves an arbitrary-length buffer through such a channel in place:
//!
//! ```text
//! buffer ──write_chunk──►  accelerator pipeline  ──read_chunk──► buffer
//!          (WriteSide)     (lead_elements fill)     (ReadSide)
//! ```
//!
//! Writes and reads are two state machines interleaved by one controller
//! loop on the calling thread. Reading starts once `lead_elements` have been
//! written, the buffer tail that does not fill a whole chunk goes out as one
//! short operation per side, and any failed operation aborts the transfer
//! after the channel has been closed.
//!
//! # Channels
//!
//! ```text
//! Hardware:
//!   DeviceChannel     /dev/simple_dma0 read/write, bounded poll on EAGAIN
//!
//! No hardware:
//!   LoopbackChannel   in-memory pipeline with fill latency and transform
//!   RecordingChannel  operation log, fault injection, dry runs
//! ```
//!
//! # Quick start
//!
//! ```
//! use accel_stream_driver::{transfer, LoopbackChannel};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut image: Vec<u32> = (0..100).collect();
//! let mut channel = LoopbackChannel::new(|px| px + 1).with_pipeline(80, 100);
//!
//! let report = transfer(&mut channel, &mut image, 100, 40, 80)?;
//! assert_eq!(report.write_ops, 3);
//! assert_eq!(image[0], 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod channel;
pub mod channels;
mod config;
mod controller;
mod error;
mod plan;
mod report;
pub mod state;

/// Native element of the DMA channel
pub type Word = u32;

/// Bytes per [`Word`]
pub const WORD_BYTES: usize = std::mem::size_of::<Word>();

pub use channel::{select_channel, Channel, ChannelKind, ChannelSelection};
pub use channels::{ChannelOp, DeviceChannel, LoopbackChannel, RecordingChannel};
pub use config::{
    DeviceConfig, TransferConfig, DEFAULT_DEVICE_PATH, DEFAULT_POLL_TIMEOUT_MS,
    MAX_CHUNK_ELEMENTS,
};
pub use controller::{transfer, StreamController, Transfer};
pub use error::{ChannelError, Direction, Result, StreamError};
pub use plan::{Chunk, ChunkPlan};
pub use report::{calculate_throughput, TransferReport};
