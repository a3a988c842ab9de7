//! Character device channel
//!
//! Streams chunks through a DMA device node (default `/dev/simple_dma0`).
//! The node is opened non-blocking; when the device is not ready the
//! channel waits with a bounded `poll(2)` instead of spinning, so each
//! primitive is still synchronous from the controller's point of view.

use crate::channel::{Channel, ChannelKind};
use crate::config::DeviceConfig;
use crate::error::ChannelError;
use crate::Word;
use rustix::event::{poll, PollFd, PollFlags};
use rustix::fd::{AsFd, BorrowedFd};
use rustix::fs::OFlags;
use rustix::io::Errno;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::{Duration, Instant};

/// Channel over a DMA character device
#[derive(Debug)]
pub struct DeviceChannel {
    config: DeviceConfig,
    file: Option<File>,
}

impl DeviceChannel {
    /// Create a channel for the configured device (not yet opened)
    pub const fn new(config: DeviceConfig) -> Self {
        Self { config, file: None }
    }

    /// Device node path
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Whether the device is currently open
    pub const fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn fd(&self) -> Result<BorrowedFd<'_>, ChannelError> {
        self.file
            .as_ref()
            .map(|file| file.as_fd())
            .ok_or(ChannelError::NotOpen)
    }

    fn timed_out(&self) -> ChannelError {
        tracing::warn!(
            "{} not ready after {}ms",
            self.config.path.display(),
            self.config.poll_timeout_ms
        );
        ChannelError::Timeout {
            duration_ms: self.config.poll_timeout_ms,
        }
    }

    /// Block until `fd` is ready for `interest` or `deadline` passes
    fn wait_ready(
        &self,
        fd: BorrowedFd<'_>,
        interest: PollFlags,
        deadline: Instant,
    ) -> Result<(), ChannelError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(self.timed_out());
        }
        let timeout = i32::try_from(remaining.as_micros().div_ceil(1000)).unwrap_or(i32::MAX);
        let mut fds = [PollFd::new(&fd, interest)];

        match poll(&mut fds, timeout) {
            Ok(0) => Err(self.timed_out()),
            Ok(_) => {
                let revents = fds[0].revents();
                if revents.intersects(PollFlags::ERR | PollFlags::HUP | PollFlags::NVAL) {
                    return Err(ChannelError::rejected(format!(
                        "{} signalled {revents:?}",
                        self.config.path.display()
                    )));
                }
                Ok(())
            }
            Err(Errno::INTR) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Move `len` bytes with `op`, resuming short transfers and waiting out
    /// `EAGAIN`
    ///
    /// The whole chunk shares one `poll_timeout_ms` budget.
    fn drive<F>(
        &self,
        fd: BorrowedFd<'_>,
        len: usize,
        interest: PollFlags,
        mut op: F,
    ) -> Result<(), ChannelError>
    where
        F: FnMut(usize) -> rustix::io::Result<usize>,
    {
        let deadline = Instant::now() + Duration::from_millis(self.config.poll_timeout_ms);
        let mut done = 0;
        while done < len {
            match op(done) {
                Ok(0) => {
                    return Err(ChannelError::rejected(format!(
                        "device stopped after {done} of {len} bytes"
                    )));
                }
                Ok(n) => done += n,
                Err(Errno::INTR) => {}
                Err(Errno::AGAIN) => self.wait_ready(fd, interest, deadline)?,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl Channel for DeviceChannel {
    fn open(&mut self) -> Result<(), ChannelError> {
        let path = self.path();
        if self.file.is_some() {
            return Err(ChannelError::rejected(format!(
                "{} is already open",
                path.display()
            )));
        }
        if !path.exists() {
            return Err(ChannelError::device_not_found(path));
        }

        tracing::debug!("Opening {}", path.display());

        // SAFETY: OFlags::NONBLOCK.bits() is a small positive flag value
        #[allow(clippy::cast_possible_wrap)]
        let nonblock_flag = OFlags::NONBLOCK.bits() as i32;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(nonblock_flag)
            .open(path)?;

        tracing::info!("Opened {}", path.display());
        self.file = Some(file);
        Ok(())
    }

    fn write_chunk(&mut self, offset: usize, chunk: &[Word]) -> Result<(), ChannelError> {
        let fd = self.fd()?;
        let bytes = bytemuck::cast_slice::<Word, u8>(chunk);

        tracing::trace!("write {} bytes (element offset {offset})", bytes.len());
        self.drive(fd, bytes.len(), PollFlags::OUT, |done| {
            rustix::io::write(fd, &bytes[done..])
        })
    }

    fn read_chunk(&mut self, offset: usize, chunk: &mut [Word]) -> Result<(), ChannelError> {
        let fd = self.fd()?;
        let bytes = bytemuck::cast_slice_mut::<Word, u8>(chunk);
        let len = bytes.len();

        tracing::trace!("read {len} bytes (element offset {offset})");
        self.drive(fd, len, PollFlags::IN, |done| {
            rustix::io::read(fd, &mut bytes[done..])
        })
    }

    fn close(&mut self) {
        if self.file.take().is_some() {
            tracing::info!("Closed {}", self.config.path.display());
        }
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Device
    }
}

impl Drop for DeviceChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_device() {
        let mut channel = DeviceChannel::new(DeviceConfig::new("/dev/simple_dma999"));
        let err = channel.open().unwrap_err();
        assert!(matches!(err, ChannelError::DeviceNotFound { .. }));
        assert!(!channel.is_open());
    }

    #[test]
    fn test_primitives_require_open() {
        let mut channel = DeviceChannel::new(DeviceConfig::default());
        assert!(matches!(
            channel.write_chunk(0, &[1, 2, 3]),
            Err(ChannelError::NotOpen)
        ));
        let mut buf = [0; 3];
        assert!(matches!(
            channel.read_chunk(0, &mut buf),
            Err(ChannelError::NotOpen)
        ));
    }

    #[test]
    fn test_dev_null_round_trip() {
        // /dev/null accepts every write and reports end-of-file on read.
        let mut channel = DeviceChannel::new(DeviceConfig::new("/dev/null"));
        channel.open().unwrap();
        assert!(channel.is_open());
        channel.write_chunk(0, &[0xdead_beef; 64]).unwrap();

        let mut buf = [0; 4];
        let err = channel.read_chunk(0, &mut buf).unwrap_err();
        assert!(matches!(err, ChannelError::Rejected { .. }));

        channel.close();
        assert!(!channel.is_open());
    }

    #[test]
    fn test_dev_zero_reads_fill_chunk() {
        let mut channel = DeviceChannel::new(DeviceConfig::new("/dev/zero"));
        channel.open().unwrap();
        let mut buf = [7; 100];
        channel.read_chunk(0, &mut buf).unwrap();
        assert!(buf.iter().all(|&w| w == 0));
    }

    #[test]
    fn test_stalled_device_times_out() {
        let mut channel =
            DeviceChannel::new(DeviceConfig::new("/dev/null").with_poll_timeout_ms(10));
        channel.open().unwrap();
        let fd = channel.fd().unwrap();

        // /dev/null always polls writable, so only the deadline ends this.
        let mut attempts = 0;
        let err = channel
            .drive(fd, 16, PollFlags::OUT, |_| {
                attempts += 1;
                Err(Errno::AGAIN)
            })
            .unwrap_err();

        assert!(matches!(err, ChannelError::Timeout { duration_ms: 10 }));
        assert!(attempts > 1);
    }

    #[test]
    #[ignore] // Requires the DMA kernel module
    fn test_hardware_device_open() {
        let mut channel = DeviceChannel::new(DeviceConfig::default());
        channel.open().expect("open /dev/simple_dma0");
        channel.close();
    }
}
