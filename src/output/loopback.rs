use super::{OutputSink, SinkOpener};
use crate::config::{PixelFormat, Resolution, SessionConfig};
use crate::frame::FrameBuffer;
use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use v4l::video::Output;
use v4l::{Device, Format, FourCC};

/// A v4l2loopback device node opened for writing
pub struct V4L2Output {
    file: File,
    path: PathBuf,
    resolution: Resolution,
    format: PixelFormat,
}

impl V4L2Output {
    pub fn new<P: AsRef<Path>>(
        device_path: P,
        resolution: Resolution,
        format: PixelFormat,
    ) -> Result<Self> {
        let path = device_path.as_ref();
        tracing::info!(
            "Opening v4l2loopback device at {} ({}, {})",
            path.display(),
            resolution,
            format
        );

        let device = Device::with_path(path)
            .with_context(|| format!("Failed to open v4l2loopback device at {}", path.display()))?;

        let wanted = Format::new(resolution.width, resolution.height, FourCC::new(&format.fourcc()));
        let actual = Output::set_format(&device, &wanted)
            .with_context(|| format!("Failed to set output format on {}", path.display()))?;

        if actual.width != wanted.width
            || actual.height != wanted.height
            || actual.fourcc != wanted.fourcc
        {
            bail!(
                "{} does not support {} {} (driver offered {}x{} {})",
                path.display(),
                resolution,
                format,
                actual.width,
                actual.height,
                actual.fourcc
            );
        }
        tracing::debug!("Negotiated output format: {}", actual);

        // v4l2loopback accepts raw frame data written to the device file
        let file = File::options()
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open {} for writing", path.display()))?;

        tracing::info!("v4l2loopback device opened successfully");

        Ok(Self {
            file,
            path: path.to_path_buf(),
            resolution,
            format,
        })
    }
}

impl OutputSink for V4L2Output {
    fn write_frame(&mut self, frame: &FrameBuffer) -> Result<()> {
        if frame.resolution() != self.resolution || frame.pixel_format() != self.format {
            bail!(
                "frame is {} {}, device expects {} {}",
                frame.resolution(),
                frame.pixel_format(),
                self.resolution,
                self.format
            );
        }

        self.file
            .write_all(frame.as_bytes())
            .context("Failed to write frame to v4l2loopback device")?;

        Ok(())
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn device_name(&self) -> String {
        self.path.display().to_string()
    }
}

/// Opens the configured loopback node for each session
#[derive(Debug, Clone)]
pub struct LoopbackOpener {
    device_path: PathBuf,
}

impl LoopbackOpener {
    pub fn new(device_path: impl Into<PathBuf>) -> Self {
        Self {
            device_path: device_path.into(),
        }
    }

    pub fn device_path(&self) -> &Path {
        &self.device_path
    }
}

impl SinkOpener for LoopbackOpener {
    fn open(&self, config: &SessionConfig) -> Result<Box<dyn OutputSink>> {
        let output = V4L2Output::new(&self.device_path, config.resolution, config.pixel_format)?;
        Ok(Box::new(output))
    }
}
