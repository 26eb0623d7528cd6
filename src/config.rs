use crate::error::{AppError, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const MIN_FPS: u32 = 1;
pub const MAX_FPS: u32 = 60;
pub const DEFAULT_FPS: u32 = 30;

/// Largest accepted width or height
pub const MAX_DIMENSION: u32 = 8192;

/// Output resolutions offered in the panel
pub const PRESET_RESOLUTIONS: [Resolution; 6] = [
    Resolution::new(640, 480),
    Resolution::new(480, 640),
    Resolution::new(600, 600),
    Resolution::new(1024, 768),
    Resolution::new(1280, 720),
    Resolution::new(1920, 1080),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for Resolution {
    fn default() -> Self {
        PRESET_RESOLUTIONS[0]
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = AppError;

    /// Accepts `1280x720`, `1280X720` and `1280×720`
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (w, h) = s
            .split_once(['x', 'X', '×'])
            .ok_or_else(|| AppError::configuration(format!("resolution '{}' is not WIDTHxHEIGHT", s)))?;

        let parse = |part: &str| -> Result<u32> {
            match part.trim().parse::<u32>() {
                Ok(v) if v > MAX_DIMENSION => Err(AppError::configuration(format!(
                    "resolution '{}' exceeds {} pixels per side",
                    s, MAX_DIMENSION
                ))),
                Ok(v) if v > 0 => Ok(v),
                _ => Err(AppError::configuration(format!(
                    "resolution '{}' must be two positive integers",
                    s
                ))),
            }
        };

        Ok(Self::new(parse(w)?, parse(h)?))
    }
}

/// Pixel layout written to the loopback device. Chosen once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PixelFormat {
    /// Packed 24-bit R, G, B
    #[default]
    Rgb24,
    /// Packed 24-bit B, G, R
    Bgr24,
    /// Packed 4:2:2 Y0 U Y1 V
    Yuyv,
}

impl PixelFormat {
    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            PixelFormat::Rgb24 => *b"RGB3",
            PixelFormat::Bgr24 => *b"BGR3",
            PixelFormat::Yuyv => *b"YUYV",
        }
    }

    /// Size in bytes of one frame at `width` x `height`
    pub fn frame_size(&self, width: u32, height: u32) -> usize {
        let (w, h) = (width as usize, height as usize);
        match self {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => w * h * 3,
            // Odd widths pad the last pair with a repeated pixel
            PixelFormat::Yuyv => w.div_ceil(2) * 4 * h,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelFormat::Rgb24 => "rgb24",
            PixelFormat::Bgr24 => "bgr24",
            PixelFormat::Yuyv => "yuyv",
        };
        f.write_str(name)
    }
}

pub fn clamp_fps(fps: u32) -> u32 {
    fps.clamp(MIN_FPS, MAX_FPS)
}

/// Everything a running session needs. Built by `Controller::start` and
/// never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub image_path: PathBuf,
    pub resolution: Resolution,
    pub fps: u32,
    pub pixel_format: PixelFormat,
}

impl SessionConfig {
    /// Validates the raw panel inputs
    pub fn new(
        image_path: Option<PathBuf>,
        resolution: &str,
        fps: u32,
        pixel_format: PixelFormat,
    ) -> Result<Self> {
        let image_path =
            image_path.ok_or_else(|| AppError::configuration("no image selected"))?;
        if !image_path.is_file() {
            return Err(AppError::configuration(format!(
                "image {} no longer exists",
                image_path.display()
            )));
        }

        let resolution = resolution.parse::<Resolution>()?;

        if !(MIN_FPS..=MAX_FPS).contains(&fps) {
            return Err(AppError::configuration(format!(
                "frame rate {} outside {}-{}",
                fps, MIN_FPS, MAX_FPS
            )));
        }

        Ok(Self {
            image_path,
            resolution,
            fps,
            pixel_format,
        })
    }

    pub fn frame_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(1) / self.fps
    }
}
