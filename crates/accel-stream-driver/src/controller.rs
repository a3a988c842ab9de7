//! Stream pipeline controller
//!
//! Drives the WriteSide and ReadSide state machines over one channel until
//! the ReadSide finishes.
//!
//! # Loop
//!
//! Each iteration advances the WriteSide one step, then the ReadSide one
//! step against the writer's progress from the same iteration. Both sides
//! run on the calling thread; "concurrent" means interleaved. Reads can
//! never overtake writes because the reader starts no earlier than the
//! writer and moves at most one chunk per iteration.
//!
//! # Failure
//!
//! The first failed chunk aborts the transfer. No retry is attempted since
//! the accelerator pipeline state cannot be inspected afterwards. The
//! channel is closed exactly once on every path out of a transfer that
//! managed to open it, including unwinding.

use crate::channel::Channel;
use crate::config::TransferConfig;
use crate::error::{Direction, Result, StreamError};
use crate::plan::{Chunk, ChunkPlan};
use crate::report::TransferReport;
use crate::state::{advance_read, advance_write, Phase};
use crate::Word;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Move `length` elements of `buffer` through `channel` in place
///
/// Writes `buffer[..length]` to the device in `chunk_size` pieces and reads
/// the device output back over the same elements, starting the reads once
/// `lead_elements` have been written.
///
/// # Errors
///
/// - `InvalidArgument` if `length` or `chunk_size` is zero, or `length`
///   exceeds the buffer; the channel is not touched.
/// - `DeviceUnavailable` if the channel cannot be opened.
/// - `TransferFailure` if any chunk operation fails. The channel has been
///   closed and the unread part of the buffer is indeterminate.
pub fn transfer<C: Channel + ?Sized>(
    channel: &mut C,
    buffer: &mut [Word],
    length: usize,
    chunk_size: usize,
    lead_elements: usize,
) -> Result<TransferReport> {
    if length > buffer.len() {
        return Err(StreamError::invalid_argument(format!(
            "length {length} exceeds buffer of {} elements",
            buffer.len()
        )));
    }

    StreamController::new(TransferConfig::new(chunk_size, lead_elements))
        .run(channel, &mut buffer[..length])
}

/// Runs transfers with a fixed configuration
#[derive(Debug, Clone)]
pub struct StreamController {
    config: TransferConfig,
}

impl StreamController {
    /// Create a controller
    pub const fn new(config: TransferConfig) -> Self {
        Self { config }
    }

    /// Configuration in use
    pub const fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Transfer the whole of `buffer` in place
    ///
    /// # Errors
    ///
    /// See [`transfer`].
    pub fn run<C: Channel + ?Sized>(
        &self,
        channel: &mut C,
        buffer: &mut [Word],
    ) -> Result<TransferReport> {
        let mut transfer = self.begin(channel, buffer)?;
        while !transfer.is_finished() {
            transfer = transfer.step()?;
        }
        Ok(transfer.finish())
    }

    /// Validate the inputs, open the channel and return the idle transfer
    ///
    /// The caller drives it with [`Transfer::step`].
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty buffer or zero chunk size,
    /// `DeviceUnavailable` if the channel cannot be opened.
    pub fn begin<'a, C: Channel + ?Sized>(
        &self,
        channel: &'a mut C,
        buffer: &'a mut [Word],
    ) -> Result<Transfer<'a, C>> {
        let plan = ChunkPlan::new(buffer.len(), self.config.chunk_size)?;

        info!(
            "Streaming {} elements through {} channel (chunk {}, lead {})",
            plan.length(),
            channel.kind(),
            plan.chunk_size(),
            self.config.lead_elements
        );
        debug!(
            "{} ops per side ({} full, remainder {})",
            plan.op_count(),
            plan.full_chunks(),
            plan.remainder()
        );

        let session = OpenChannel::open(channel)?;

        Ok(Transfer {
            session,
            buffer,
            plan,
            lead_elements: self.config.lead_elements,
            writer: Phase::Idle,
            reader: Phase::Idle,
            report: TransferReport::new(),
            started: Instant::now(),
        })
    }
}

/// Open channel; closes it when dropped
#[derive(Debug)]
struct OpenChannel<'a, C: Channel + ?Sized> {
    channel: &'a mut C,
}

impl<'a, C: Channel + ?Sized> OpenChannel<'a, C> {
    fn open(channel: &'a mut C) -> Result<Self> {
        channel.open().map_err(|e| {
            warn!("Failed to open {} channel: {e}", channel.kind());
            StreamError::device_unavailable(e)
        })?;
        Ok(Self { channel })
    }
}

impl<C: Channel + ?Sized> Drop for OpenChannel<'_, C> {
    fn drop(&mut self) {
        debug!("Closing {} channel", self.channel.kind());
        self.channel.close();
    }
}

/// One transfer in progress
///
/// Holds the open channel; dropping the transfer closes it. [`step`]
/// consumes the transfer so that a failed step cannot be followed by
/// another.
///
/// [`step`]: Transfer::step
#[derive(Debug)]
pub struct Transfer<'a, C: Channel + ?Sized> {
    session: OpenChannel<'a, C>,
    buffer: &'a mut [Word],
    plan: ChunkPlan,
    lead_elements: usize,
    writer: Phase,
    reader: Phase,
    report: TransferReport,
    started: Instant,
}

impl<'a, C: Channel + ?Sized> Transfer<'a, C> {
    /// Run one controller iteration
    ///
    /// # Errors
    ///
    /// `TransferFailure` if a chunk operation fails. The transfer is
    /// dropped, closing the channel.
    pub fn step(mut self) -> Result<Self> {
        if self.is_finished() {
            return Ok(self);
        }
        self.report.iterations += 1;

        let step = advance_write(self.writer, &self.plan);
        if let Some(chunk) = step.op {
            self.write_op(chunk)?;
        }
        self.writer = step.next;

        let step = advance_read(self.reader, &self.plan, self.writer, self.lead_elements);
        if self.reader == Phase::Idle && step.next != Phase::Idle {
            debug!("Reader released after {} elements written", self.elements_written());
            self.report.read_released_at = Some(self.elements_written());
        }
        if let Some(chunk) = step.op {
            self.read_op(chunk)?;
        }
        self.reader = step.next;

        debug_assert!(self.read_cursor() <= self.write_cursor());
        debug_assert!(self.elements_read() <= self.elements_written());
        Ok(self)
    }

    /// Whether the ReadSide has finished
    pub const fn is_finished(&self) -> bool {
        self.reader.is_finished()
    }

    /// WriteSide phase
    pub const fn writer(&self) -> Phase {
        self.writer
    }

    /// ReadSide phase
    pub const fn reader(&self) -> Phase {
        self.reader
    }

    /// Offset of the WriteSide's next full chunk
    ///
    /// Stays at `body_length` once the remainder is written; use
    /// [`elements_written`](Self::elements_written) for cumulative progress.
    pub const fn write_cursor(&self) -> usize {
        chunk_cursor(self.writer, &self.plan)
    }

    /// Offset of the ReadSide's next full chunk
    ///
    /// Counted like [`write_cursor`](Self::write_cursor), so
    /// `read_cursor() <= write_cursor()` holds after every step.
    pub const fn read_cursor(&self) -> usize {
        chunk_cursor(self.reader, &self.plan)
    }

    /// Cumulative elements handed to the device
    pub const fn elements_written(&self) -> usize {
        self.writer.cursor(&self.plan)
    }

    /// Cumulative elements read back
    pub const fn elements_read(&self) -> usize {
        self.reader.cursor(&self.plan)
    }

    /// Geometry of this transfer
    pub const fn plan(&self) -> &ChunkPlan {
        &self.plan
    }

    /// Close the channel and return the accounting
    pub fn finish(mut self) -> TransferReport {
        self.report.finish(self.started.elapsed());
        info!(
            "Transfer complete: {} elements in {} write / {} read ops, {:?} ({:.2} MB/s)",
            self.report.elements_read,
            self.report.write_ops,
            self.report.read_ops,
            self.report.duration,
            self.report.throughput_mbps
        );
        self.report
    }

    fn write_op(&mut self, chunk: Chunk) -> Result<()> {
        let data = &self.buffer[chunk.range()];
        self.session
            .channel
            .write_chunk(chunk.offset, data)
            .map_err(|e| {
                warn!("Write of {} at {} failed, aborting: {e}", chunk.len, chunk.offset);
                StreamError::transfer_failure(Direction::Write, chunk.offset, chunk.len, e)
            })?;

        debug!("Wrote {} elements at {}", chunk.len, chunk.offset);
        self.account(chunk);
        self.report.write_ops += 1;
        self.report.elements_written += chunk.len;
        Ok(())
    }

    fn read_op(&mut self, chunk: Chunk) -> Result<()> {
        let data = &mut self.buffer[chunk.range()];
        self.session
            .channel
            .read_chunk(chunk.offset, data)
            .map_err(|e| {
                warn!("Read of {} at {} failed, aborting: {e}", chunk.len, chunk.offset);
                StreamError::transfer_failure(Direction::Read, chunk.offset, chunk.len, e)
            })?;

        debug!("Read {} elements at {}", chunk.len, chunk.offset);
        self.account(chunk);
        self.report.read_ops += 1;
        self.report.elements_read += chunk.len;
        Ok(())
    }

    fn account(&mut self, chunk: Chunk) {
        if self.plan.is_short(&chunk) {
            self.report.short_ops += 1;
        }
    }
}

/// Full-chunk cursor of one side: `body_length` once finished
const fn chunk_cursor(phase: Phase, plan: &ChunkPlan) -> usize {
    match phase {
        Phase::Finished => plan.body_length(),
        phase => phase.cursor(plan),
    }
}
