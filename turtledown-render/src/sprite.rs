//! Tiled sprite sheets.
//!
//! A `-tiled.png` resource is a horizontal strip of square frames, each
//! `base` pixels wide. Frame 0 is the full-size image; every following frame
//! holds the image shrunk by roughly 1.5× again, anchored top-left and padded
//! to `base × base`. Small renditions are cut from the smallest frame that is
//! still at least as large as the target, so downscaling never has to average
//! over hundreds of source pixels.

use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbaImage};
use rayon::prelude::*;
use tracing::debug;

use turtledown_core::TileImage;

use crate::error::RenderError;

/// Size ratio between consecutive frames.
pub const MIP_STEP: f64 = 1.5;

fn log_step(value: f64) -> f64 {
    value.ln() / MIP_STEP.ln()
}

/// Frame sizes of a strip built from a `base`-pixel image, largest first.
pub fn mip_sizes(base: u32) -> Vec<u32> {
    let mut sizes = Vec::new();
    let mut size = base;
    while size >= 1 {
        sizes.push(size);
        let next = MIP_STEP.powf(log_step(size as f64).ceil() - 1.0).floor() as u32;
        if next >= size {
            break;
        }
        size = next;
    }
    sizes
}

#[derive(Debug, Clone)]
pub struct SpriteSheet {
    strip: RgbaImage,
    base: u32,
    /// Content size of each frame present in the strip.
    frames: Vec<u32>,
}

impl SpriteSheet {
    /// Wrap a decoded strip. Its height is the base size; a square image is a
    /// strip with a single frame.
    pub fn new(strip: RgbaImage) -> crate::Result<Self> {
        let (width, height) = strip.dimensions();
        if height == 0 || width < height {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        let count = (width / height) as usize;
        let mut frames = mip_sizes(height);
        frames.truncate(count.max(1));
        Ok(Self {
            strip,
            base: height,
            frames,
        })
    }

    /// Decode a PNG strip.
    pub fn decode(bytes: &[u8]) -> crate::Result<Self> {
        let image = image::load_from_memory_with_format(bytes, ImageFormat::Png)?.to_rgba8();
        let sheet = Self::new(image)?;
        debug!(
            base = sheet.base,
            frames = sheet.frames.len(),
            "decoded sprite sheet"
        );
        Ok(sheet)
    }

    pub fn base_size(&self) -> u32 {
        self.base
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn strip(&self) -> &RgbaImage {
        &self.strip
    }

    /// Frame index and source side length to scale from for a `size`-pixel
    /// rendition.
    pub fn frame_for(&self, size: u32) -> (usize, u32) {
        let levels = log_step(self.base as f64).floor();
        if size as f64 > MIP_STEP.powf(levels) {
            return (0, self.base);
        }
        let exponent = log_step(size.max(1) as f64).ceil();
        let last = self.frames.len() - 1;
        let frame = ((levels - exponent + 1.0).max(0.0) as usize).min(last);
        (frame, self.frames[frame])
    }

    /// The image resized to `size × size`, cut from the best fitting frame.
    pub fn scaled(&self, size: u32) -> RgbaImage {
        let size = size.max(1);
        let (frame, src) = self.frame_for(size);
        let view = imageops::crop_imm(&self.strip, frame as u32 * self.base, 0, src, src).to_image();
        if src == size {
            return view;
        }
        imageops::resize(&view, size, size, FilterType::Triangle)
    }

    /// Assemble a strip from a square image the way the asset pipeline does.
    pub fn build_strip(image: &RgbaImage) -> crate::Result<RgbaImage> {
        let (width, height) = image.dimensions();
        if width != height || width == 0 {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        let base = width;
        let sizes = mip_sizes(base);
        let frames: Vec<RgbaImage> = sizes
            .par_iter()
            .map(|&size| {
                if size == base {
                    image.clone()
                } else {
                    imageops::resize(image, size, size, FilterType::Triangle)
                }
            })
            .collect();

        let mut strip = RgbaImage::new(base * frames.len() as u32, base);
        for (index, frame) in frames.iter().enumerate() {
            imageops::replace(&mut strip, frame, index as i64 * base as i64, 0);
        }
        Ok(strip)
    }
}

impl TileImage for SpriteSheet {
    fn red_channel(&self, width: u32, height: u32) -> Option<Vec<u8>> {
        if width > self.base || height > self.base {
            return None;
        }
        if width == 0 || height == 0 {
            return Some(Vec::new());
        }
        let mut red = vec![0u8; width as usize * height as usize];
        red.par_chunks_mut(width as usize)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, value) in row.iter_mut().enumerate() {
                    *value = self.strip.get_pixel(x as u32, y as u32)[0];
                }
            });
        Some(red)
    }
}
