// SPDX-License-Identifier: AGPL-3.0-only

//! Software (loopback) accelerator channel
//!
//! Models the accelerator's streaming pipeline in memory so transfers can be
//! exercised without hardware:
//!
//! 1. **Transform**: every word written passes through a caller-supplied
//!    function, standing in for the synthesized kernel.
//! 2. **Fill latency**: output word `i` only exists once `i + 1 + latency`
//!    words have been written. A stencil over a row-major image needs about
//!    two rows of input before its first output, which is the latency the
//!    controller's `lead_elements` has to cover.
//! 3. **Frame flush**: once the whole frame has been written, the tail still
//!    held in the pipeline is released.
//!
//! Where real hardware would stall on a premature read, the model fails
//! with `Underrun`. That makes a too-small lead visible in tests instead of
//! hanging them.

use crate::channel::{Channel, ChannelKind};
use crate::error::ChannelError;
use crate::Word;
use std::collections::VecDeque;
use tracing::{debug, info};

/// In-memory accelerator pipeline
#[derive(Debug)]
pub struct LoopbackChannel {
    transform: fn(Word) -> Word,
    latency: usize,
    frame_len: Option<usize>,
    pipeline: VecDeque<Word>,
    written: usize,
    open: bool,
}

impl LoopbackChannel {
    /// Create a loopback applying `transform` with no fill latency
    pub fn new(transform: fn(Word) -> Word) -> Self {
        Self {
            transform,
            latency: 0,
            frame_len: None,
            pipeline: VecDeque::new(),
            written: 0,
            open: false,
        }
    }

    /// Loopback that returns data unchanged
    pub fn identity() -> Self {
        Self::new(|word| word)
    }

    /// Hold back `latency` words until `frame_len` words have been written
    #[must_use]
    pub const fn with_pipeline(mut self, latency: usize, frame_len: usize) -> Self {
        self.latency = latency;
        self.frame_len = Some(frame_len);
        self
    }

    /// Words written since the last `open`
    pub const fn written(&self) -> usize {
        self.written
    }

    /// Output words ready to be read
    pub fn available(&self) -> usize {
        let flushed = self.frame_len.is_some_and(|frame| self.written >= frame);
        if flushed {
            self.pipeline.len()
        } else {
            self.pipeline.len().saturating_sub(self.latency)
        }
    }

    fn ensure_open(&self) -> Result<(), ChannelError> {
        if self.open {
            Ok(())
        } else {
            Err(ChannelError::NotOpen)
        }
    }
}

impl Channel for LoopbackChannel {
    fn open(&mut self) -> Result<(), ChannelError> {
        if self.open {
            return Err(ChannelError::rejected("loopback is already open"));
        }
        self.pipeline.clear();
        self.written = 0;
        self.open = true;
        info!(
            "Loopback opened: latency={} frame={:?}",
            self.latency, self.frame_len
        );
        Ok(())
    }

    fn write_chunk(&mut self, offset: usize, chunk: &[Word]) -> Result<(), ChannelError> {
        self.ensure_open()?;
        if let Some(frame) = self.frame_len {
            if self.written + chunk.len() > frame {
                return Err(ChannelError::rejected(format!(
                    "write of {} at {offset} overruns frame of {frame}",
                    chunk.len()
                )));
            }
        }

        self.pipeline
            .extend(chunk.iter().map(|&word| (self.transform)(word)));
        self.written += chunk.len();
        debug!(
            "Loopback accepted {} at {offset}, {} ready",
            chunk.len(),
            self.available()
        );
        Ok(())
    }

    fn read_chunk(&mut self, offset: usize, chunk: &mut [Word]) -> Result<(), ChannelError> {
        self.ensure_open()?;
        let available = self.available();
        if chunk.len() > available {
            return Err(ChannelError::Underrun {
                requested: chunk.len(),
                available,
            });
        }

        let len = chunk.len();
        for (slot, word) in chunk.iter_mut().zip(self.pipeline.drain(..len)) {
            *slot = word;
        }
        debug!("Loopback produced {len} at {offset}");
        Ok(())
    }

    fn close(&mut self) {
        if self.open {
            debug!(
                "Loopback closed with {} words in flight",
                self.pipeline.len()
            );
        }
        self.open = false;
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Loopback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_echo() {
        let mut channel = LoopbackChannel::identity();
        channel.open().unwrap();
        channel.write_chunk(0, &[1, 2, 3, 4]).unwrap();

        let mut out = [0; 4];
        channel.read_chunk(0, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4]);
        assert_eq!(channel.available(), 0);
    }

    #[test]
    fn test_transform_applied() {
        let mut channel = LoopbackChannel::new(|w| w * 2 + 1);
        channel.open().unwrap();
        channel.write_chunk(0, &[0, 1, 2]).unwrap();

        let mut out = [0; 3];
        channel.read_chunk(0, &mut out).unwrap();
        assert_eq!(out, [1, 3, 5]);
    }

    #[test]
    fn test_latency_holds_output() {
        let mut channel = LoopbackChannel::identity().with_pipeline(8, 16);
        channel.open().unwrap();

        channel.write_chunk(0, &[1; 8]).unwrap();
        assert_eq!(channel.available(), 0);

        let mut out = [0; 4];
        let err = channel.read_chunk(0, &mut out).unwrap_err();
        assert!(matches!(
            err,
            ChannelError::Underrun {
                requested: 4,
                available: 0
            }
        ));

        channel.write_chunk(8, &[2; 4]).unwrap();
        assert_eq!(channel.available(), 4);
        channel.read_chunk(0, &mut out).unwrap();
        assert_eq!(out, [1; 4]);
    }

    #[test]
    fn test_frame_flush_releases_tail() {
        let mut channel = LoopbackChannel::identity().with_pipeline(8, 10);
        channel.open().unwrap();
        channel.write_chunk(0, &[5; 10]).unwrap();
        assert_eq!(channel.available(), 10);
    }

    #[test]
    fn test_write_past_frame_rejected() {
        let mut channel = LoopbackChannel::identity().with_pipeline(0, 4);
        channel.open().unwrap();
        assert!(matches!(
            channel.write_chunk(0, &[0; 5]),
            Err(ChannelError::Rejected { .. })
        ));
    }

    #[test]
    fn test_reopen_resets_pipeline() {
        let mut channel = LoopbackChannel::identity();
        channel.open().unwrap();
        channel.write_chunk(0, &[9; 3]).unwrap();
        channel.close();

        assert!(matches!(
            channel.write_chunk(0, &[9]),
            Err(ChannelError::NotOpen)
        ));

        channel.open().unwrap();
        assert_eq!(channel.written(), 0);
        assert_eq!(channel.available(), 0);
    }
}
