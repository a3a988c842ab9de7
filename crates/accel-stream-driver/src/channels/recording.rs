//! Recording channel
//!
//! Logs every primitive with its element offset and count, echoes written
//! data back (optionally transformed), and can fail a chosen operation.
//! Backs the controller tests and the CLI's dry-run schedule.

use crate::channel::{Channel, ChannelKind};
use crate::error::ChannelError;
use crate::Word;
use std::collections::VecDeque;

/// One recorded primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOp {
    /// `open` was called
    Open,
    /// `write_chunk` was called
    Write {
        /// Element offset
        offset: usize,
        /// Element count
        len: usize,
    },
    /// `read_chunk` was called
    Read {
        /// Element offset
        offset: usize,
        /// Element count
        len: usize,
    },
    /// `close` was called
    Close,
}

impl std::fmt::Display for ChannelOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Write { offset, len } => write!(f, "write {len:>6} @ {offset}"),
            Self::Read { offset, len } => write!(f, "read  {len:>6} @ {offset}"),
            Self::Close => write!(f, "close"),
        }
    }
}

/// Fault to inject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    Open,
    /// 1-based write number
    Write(usize),
    /// 1-based read number
    Read(usize),
}

/// Echo channel that records what the controller asked of it
#[derive(Debug)]
pub struct RecordingChannel {
    ops: Vec<ChannelOp>,
    echo: VecDeque<Word>,
    transform: fn(Word) -> Word,
    fault: Option<Fault>,
    writes: usize,
    reads: usize,
    open: bool,
}

impl RecordingChannel {
    /// Create an echo channel with no faults
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            echo: VecDeque::new(),
            transform: |word| word,
            fault: None,
            writes: 0,
            reads: 0,
            open: false,
        }
    }

    /// Apply `transform` to echoed words
    #[must_use]
    pub fn with_transform(mut self, transform: fn(Word) -> Word) -> Self {
        self.transform = transform;
        self
    }

    /// Fail `open`
    #[must_use]
    pub fn failing_open(mut self) -> Self {
        self.fault = Some(Fault::Open);
        self
    }

    /// Fail the `n`-th write (1-based)
    #[must_use]
    pub fn failing_write(mut self, n: usize) -> Self {
        self.fault = Some(Fault::Write(n));
        self
    }

    /// Fail the `n`-th read (1-based)
    #[must_use]
    pub fn failing_read(mut self, n: usize) -> Self {
        self.fault = Some(Fault::Read(n));
        self
    }

    /// Every primitive called, in order (failed attempts included)
    pub fn ops(&self) -> &[ChannelOp] {
        &self.ops
    }

    /// Element counts of the recorded writes
    pub fn write_sizes(&self) -> Vec<usize> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                ChannelOp::Write { len, .. } => Some(*len),
                _ => None,
            })
            .collect()
    }

    /// Element counts of the recorded reads
    pub fn read_sizes(&self) -> Vec<usize> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                ChannelOp::Read { len, .. } => Some(*len),
                _ => None,
            })
            .collect()
    }

    /// Number of `open` calls
    pub fn open_count(&self) -> usize {
        self.ops.iter().filter(|op| **op == ChannelOp::Open).count()
    }

    /// Number of `close` calls
    pub fn close_count(&self) -> usize {
        self.ops.iter().filter(|op| **op == ChannelOp::Close).count()
    }

    /// Whether the channel is open
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// Forget recorded operations and counters (faults are kept)
    pub fn reset(&mut self) {
        self.ops.clear();
        self.echo.clear();
        self.writes = 0;
        self.reads = 0;
        self.open = false;
    }

    fn injected(what: &str) -> ChannelError {
        ChannelError::rejected(format!("injected {what} fault"))
    }
}

impl Default for RecordingChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel for RecordingChannel {
    fn open(&mut self) -> Result<(), ChannelError> {
        self.ops.push(ChannelOp::Open);
        if self.fault == Some(Fault::Open) {
            return Err(Self::injected("open"));
        }
        self.echo.clear();
        self.open = true;
        Ok(())
    }

    fn write_chunk(&mut self, offset: usize, chunk: &[Word]) -> Result<(), ChannelError> {
        if !self.open {
            return Err(ChannelError::NotOpen);
        }
        self.ops.push(ChannelOp::Write {
            offset,
            len: chunk.len(),
        });
        self.writes += 1;
        if self.fault == Some(Fault::Write(self.writes)) {
            return Err(Self::injected("write"));
        }

        self.echo
            .extend(chunk.iter().map(|&word| (self.transform)(word)));
        Ok(())
    }

    fn read_chunk(&mut self, offset: usize, chunk: &mut [Word]) -> Result<(), ChannelError> {
        if !self.open {
            return Err(ChannelError::NotOpen);
        }
        self.ops.push(ChannelOp::Read {
            offset,
            len: chunk.len(),
        });
        self.reads += 1;
        if self.fault == Some(Fault::Read(self.reads)) {
            return Err(Self::injected("read"));
        }

        if chunk.len() > self.echo.len() {
            return Err(ChannelError::Underrun {
                requested: chunk.len(),
                available: self.echo.len(),
            });
        }
        let len = chunk.len();
        for (slot, word) in chunk.iter_mut().zip(self.echo.drain(..len)) {
            *slot = word;
        }
        Ok(())
    }

    fn close(&mut self) {
        self.ops.push(ChannelOp::Close);
        self.open = false;
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Recording
    }
}
