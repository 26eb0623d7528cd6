use crate::config::{PixelFormat, Resolution, SessionConfig};
use crate::error::{AppError, Result};
use image::{imageops, DynamicImage, ImageReader, RgbImage, RgbaImage};
use std::path::Path;

/// Longest edge of the panel preview
pub const PREVIEW_SIZE: u32 = 400;

/// Decode an image file. The format is sniffed from the content, so files
/// with an unusual extension still load when the decoder supports them.
pub fn decode_image(path: &Path) -> Result<DynamicImage> {
    let _span = tracing::debug_span!("decode", path = %path.display()).entered();

    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| AppError::invalid_image(format!("{}: {}", path.display(), e)))?;

    reader
        .decode()
        .map_err(|e| AppError::invalid_image(format!("{}: {}", path.display(), e)))
}

/// Thumbnail for the panel, aspect ratio kept
pub fn preview(image: &DynamicImage) -> RgbaImage {
    image.thumbnail(PREVIEW_SIZE, PREVIEW_SIZE).to_rgba8()
}

/// One frame, already resized and packed in the device pixel layout.
/// Written unchanged on every cycle of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    resolution: Resolution,
    format: PixelFormat,
    data: Vec<u8>,
}

impl FrameBuffer {
    /// Decode the session image and render it at the session resolution
    pub fn load(config: &SessionConfig) -> Result<Self> {
        let image = decode_image(&config.image_path)?;
        Ok(Self::render(&image, config.resolution, config.pixel_format))
    }

    /// Stretch `image` to exactly `resolution` and pack it as `format`
    pub fn render(image: &DynamicImage, resolution: Resolution, format: PixelFormat) -> Self {
        let _span = tracing::debug_span!("render", %resolution, %format).entered();

        let rgb = image.to_rgb8();
        let resized = if rgb.dimensions() != (resolution.width, resolution.height) {
            imageops::resize(
                &rgb,
                resolution.width,
                resolution.height,
                imageops::FilterType::Lanczos3,
            )
        } else {
            rgb
        };

        let data = match format {
            PixelFormat::Rgb24 => resized.into_raw(),
            PixelFormat::Bgr24 => rgb_to_bgr(resized),
            PixelFormat::Yuyv => rgb_to_yuyv(&resized),
        };

        Self {
            resolution,
            format,
            data,
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    pub fn pixel_count(&self) -> usize {
        self.resolution.pixel_count()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

fn rgb_to_bgr(rgb_image: RgbImage) -> Vec<u8> {
    let mut data = rgb_image.into_raw();
    for px in data.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
    data
}

/// Pack as YUV 4:2:2 (YUYV). Chroma is averaged over each horizontal pair.
fn rgb_to_yuyv(rgb_image: &RgbImage) -> Vec<u8> {
    let (width, height) = rgb_image.dimensions();
    let mut yuyv = Vec::with_capacity(PixelFormat::Yuyv.frame_size(width, height));

    for y in 0..height {
        for x in (0..width).step_by(2) {
            let p1 = rgb_image.get_pixel(x, y);
            let p2 = if x + 1 < width {
                rgb_image.get_pixel(x + 1, y)
            } else {
                p1
            };

            let (y1, u1, v1) = rgb_to_yuv(p1[0], p1[1], p1[2]);
            let (y2, u2, v2) = rgb_to_yuv(p2[0], p2[1], p2[2]);

            let u = ((u1 as u16 + u2 as u16) / 2) as u8;
            let v = ((v1 as u16 + v2 as u16) / 2) as u8;

            yuyv.extend_from_slice(&[y1, u, y2, v]);
        }
    }

    yuyv
}

fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as f32, g as f32, b as f32);

    let y = (0.299 * r + 0.587 * g + 0.114 * b).clamp(0.0, 255.0) as u8;
    let u = ((-0.147 * r - 0.289 * g + 0.436 * b) + 128.0).clamp(0.0, 255.0) as u8;
    let v = ((0.615 * r - 0.515 * g - 0.100 * b) + 128.0).clamp(0.0, 255.0) as u8;

    (y, u, v)
}
