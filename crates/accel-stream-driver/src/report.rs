//! Transfer accounting

use crate::WORD_BYTES;
use std::time::Duration;

/// What one completed transfer did
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReport {
    /// Elements handed to the device
    pub elements_written: usize,

    /// Elements read back
    pub elements_read: usize,

    /// Write operations issued
    pub write_ops: usize,

    /// Read operations issued
    pub read_ops: usize,

    /// Short (remainder) operations issued, both sides
    pub short_ops: usize,

    /// Controller loop iterations
    pub iterations: usize,

    /// Cumulative elements written when the ReadSide left `Idle`
    pub read_released_at: Option<usize>,

    /// Wall time from open to close
    pub duration: Duration,

    /// Throughput, read + write combined (MB/s)
    pub throughput_mbps: f64,
}

impl TransferReport {
    pub(crate) const fn new() -> Self {
        Self {
            elements_written: 0,
            elements_read: 0,
            write_ops: 0,
            read_ops: 0,
            short_ops: 0,
            iterations: 0,
            read_released_at: None,
            duration: Duration::from_secs(0),
            throughput_mbps: 0.0,
        }
    }

    /// Bytes moved in both directions
    pub const fn bytes_moved(&self) -> usize {
        (self.elements_written + self.elements_read) * WORD_BYTES
    }

    pub(crate) fn finish(&mut self, duration: Duration) {
        self.duration = duration;
        self.throughput_mbps = calculate_throughput(self.bytes_moved(), duration.as_secs_f64());
    }
}

/// Calculate throughput in MB/s
pub fn calculate_throughput(bytes: usize, seconds: f64) -> f64 {
    if seconds == 0.0 {
        return 0.0;
    }

    #[allow(clippy::cast_precision_loss)]
    let megabytes = bytes as f64 / 1_048_576.0;
    megabytes / seconds
}
