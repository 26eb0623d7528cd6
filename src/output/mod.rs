mod loopback;

pub use loopback::{LoopbackOpener, V4L2Output};

use crate::config::{Resolution, SessionConfig};
use crate::frame::FrameBuffer;
use anyhow::Result;

/// Trait for output destinations
pub trait OutputSink {
    /// Write a frame to the output
    fn write_frame(&mut self, frame: &FrameBuffer) -> Result<()>;

    /// Get the negotiated output resolution
    fn resolution(&self) -> Resolution;

    /// Human readable name of the device, for logs and the status line
    fn device_name(&self) -> String;
}

/// Opens a sink for one session. Called on the publisher thread, so the
/// sink itself never crosses threads.
pub trait SinkOpener: Send + Sync {
    fn open(&self, config: &SessionConfig) -> Result<Box<dyn OutputSink>>;
}
