//! Channel implementations
//!
//! - **Device**: character device node written and read with `rustix`
//!   (requires the DMA kernel module)
//! - **Loopback**: in-memory pipeline model with configurable fill latency
//!   (CI, self-test)
//! - **Recording**: logs every primitive and can inject faults (tests, dry
//!   runs)

pub mod device;
pub mod loopback;
pub mod recording;

pub use device::DeviceChannel;
pub use loopback::LoopbackChannel;
pub use recording::{ChannelOp, RecordingChannel};
