//! Mock sinks and test images
//!
//! Stand-ins for the v4l2loopback device so session tests run anywhere.

#![allow(dead_code)]

use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use stillcam::config::{Resolution, SessionConfig};
use stillcam::output::{OutputSink, SinkOpener};
use stillcam::FrameBuffer;

/// Write a small gradient PNG and return its path
pub fn write_test_image(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 4) as u8, (y * 5) as u8, 128]))
        .save(&path)
        .expect("write test image");
    path
}

/// Shared view of what the mock sinks saw
#[derive(Default)]
pub struct SinkLog {
    pub opens: AtomicUsize,
    pub writes: AtomicUsize,
    pub frame_sizes: Mutex<Vec<(Resolution, usize)>>,
}

impl SinkLog {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

/// Accepts every frame
pub struct RecordingOpener {
    pub log: Arc<SinkLog>,
}

impl RecordingOpener {
    pub fn new() -> (Arc<Self>, Arc<SinkLog>) {
        let log = Arc::new(SinkLog::default());
        (Arc::new(Self { log: Arc::clone(&log) }), log)
    }
}

impl SinkOpener for RecordingOpener {
    fn open(&self, config: &SessionConfig) -> anyhow::Result<Box<dyn OutputSink>> {
        self.log.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingSink {
            log: Arc::clone(&self.log),
            resolution: config.resolution,
        }))
    }
}

struct RecordingSink {
    log: Arc<SinkLog>,
    resolution: Resolution,
}

impl OutputSink for RecordingSink {
    fn write_frame(&mut self, frame: &FrameBuffer) -> anyhow::Result<()> {
        self.log.writes.fetch_add(1, Ordering::SeqCst);
        let mut sizes = self.log.frame_sizes.lock().unwrap();
        if sizes.is_empty() {
            sizes.push((frame.resolution(), frame.as_bytes().len()));
        }
        Ok(())
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn device_name(&self) -> String {
        "/dev/mock0".into()
    }
}

/// Fails to open, like a device held by another process
pub struct BusyOpener;

impl SinkOpener for BusyOpener {
    fn open(&self, _config: &SessionConfig) -> anyhow::Result<Box<dyn OutputSink>> {
        anyhow::bail!("Device or resource busy")
    }
}

/// Opens fine, then fails after `ok_writes` frames
pub struct FlakyOpener {
    pub ok_writes: usize,
}

impl SinkOpener for FlakyOpener {
    fn open(&self, config: &SessionConfig) -> anyhow::Result<Box<dyn OutputSink>> {
        Ok(Box::new(FlakySink {
            remaining: self.ok_writes,
            resolution: config.resolution,
        }))
    }
}

struct FlakySink {
    remaining: usize,
    resolution: Resolution,
}

impl OutputSink for FlakySink {
    fn write_frame(&mut self, _frame: &FrameBuffer) -> anyhow::Result<()> {
        if self.remaining == 0 {
            anyhow::bail!("write failed: No such device");
        }
        self.remaining -= 1;
        Ok(())
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn device_name(&self) -> String {
        "/dev/flaky0".into()
    }
}

/// Every write blocks for `delay`, so stop cannot be acknowledged quickly
pub struct StallingOpener {
    pub delay: Duration,
}

impl SinkOpener for StallingOpener {
    fn open(&self, config: &SessionConfig) -> anyhow::Result<Box<dyn OutputSink>> {
        Ok(Box::new(StallingSink {
            delay: self.delay,
            resolution: config.resolution,
        }))
    }
}

struct StallingSink {
    delay: Duration,
    resolution: Resolution,
}

impl OutputSink for StallingSink {
    fn write_frame(&mut self, _frame: &FrameBuffer) -> anyhow::Result<()> {
        std::thread::sleep(self.delay);
        Ok(())
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn device_name(&self) -> String {
        "/dev/stall0".into()
    }
}

/// Poll `cond` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

/// Opens fine, then panics on the first write
pub struct PanickingOpener;

impl SinkOpener for PanickingOpener {
    fn open(&self, config: &SessionConfig) -> anyhow::Result<Box<dyn OutputSink>> {
        Ok(Box::new(PanickingSink {
            resolution: config.resolution,
        }))
    }
}

struct PanickingSink {
    resolution: Resolution,
}

impl OutputSink for PanickingSink {
    fn write_frame(&mut self, _frame: &FrameBuffer) -> anyhow::Result<()> {
        panic!("driver exploded");
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn device_name(&self) -> String {
        "/dev/panic0".into()
    }
}
