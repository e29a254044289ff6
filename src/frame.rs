//! Owned raster frames and conversions to and from the `image` crate.

use std::path::Path;

use image::{DynamicImage, RgbaImage};
use ndarray::Array3;

use crate::error::{Error, Result};

/// Display-ready image handed to the presentation side.
pub type DisplayImage = RgbaImage;

/// An owned raster: `height x width x channels` bytes, row-major, interleaved.
///
/// Filters understand 1 (gray), 3 (RGB) and 4 (RGBA) channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pixels: Array3<u8>,
}

impl Frame {
    /// A black frame.
    pub fn new(width: u32, height: u32, channels: usize) -> Self {
        Self {
            pixels: Array3::zeros((height as usize, width as usize, channels.max(1))),
        }
    }

    pub fn from_raw(width: u32, height: u32, channels: usize, data: Vec<u8>) -> Result<Self> {
        if channels == 0 {
            return Err(Error::InvalidFrame("channel count must be at least 1".into()));
        }
        let expected = width as usize * height as usize * channels;
        if data.len() != expected {
            return Err(Error::InvalidFrame(format!(
                "{width}x{height}x{channels} needs {expected} bytes, got {}",
                data.len()
            )));
        }

        let pixels = Array3::from_shape_vec((height as usize, width as usize, channels), data)
            .map_err(|e| Error::InvalidFrame(e.to_string()))?;
        Ok(Self { pixels })
    }

    pub fn from_pixels(pixels: Array3<u8>) -> Self {
        Self { pixels }
    }

    /// Loads a still image from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|e| Error::Open {
            target: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_image(image))
    }

    /// Converts to gray, RGB or RGBA depending on the source color type.
    pub fn from_image(image: DynamicImage) -> Self {
        let (width, height) = (image.width(), image.height());
        let (channels, data) = match image {
            DynamicImage::ImageLuma8(buf) => (1, buf.into_raw()),
            DynamicImage::ImageRgb8(buf) => (3, buf.into_raw()),
            DynamicImage::ImageRgba8(buf) => (4, buf.into_raw()),
            other if other.color().has_color() && other.color().has_alpha() => {
                (4, other.to_rgba8().into_raw())
            }
            other if other.color().has_color() => (3, other.to_rgb8().into_raw()),
            other => (1, other.to_luma8().into_raw()),
        };

        let pixels = Array3::from_shape_vec((height as usize, width as usize, channels), data)
            .unwrap_or_else(|_| Array3::zeros((height as usize, width as usize, channels)));
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.dim().1 as u32
    }

    pub fn height(&self) -> u32 {
        self.pixels.dim().0 as u32
    }

    pub fn channels(&self) -> usize {
        self.pixels.dim().2
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &Array3<u8> {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut Array3<u8> {
        &mut self.pixels
    }

    pub fn get(&self, x: usize, y: usize, c: usize) -> u8 {
        self.pixels[[y, x, c]]
    }

    /// Row-major interleaved bytes.
    pub fn to_raw(&self) -> Vec<u8> {
        self.pixels.iter().copied().collect()
    }

    /// Luma of one pixel; gray frames return the stored value.
    pub fn luma_at(&self, x: usize, y: usize) -> u8 {
        if self.channels() >= 3 {
            luma(
                self.pixels[[y, x, 0]],
                self.pixels[[y, x, 1]],
                self.pixels[[y, x, 2]],
            )
        } else {
            self.pixels[[y, x, 0]]
        }
    }

    /// Single channel luma frame.
    pub fn to_gray(&self) -> Frame {
        if self.channels() == 1 {
            return self.clone();
        }
        let (h, w, _) = self.pixels.dim();
        Frame::from_pixels(Array3::from_shape_fn((h, w, 1), |(y, x, _)| {
            self.luma_at(x, y)
        }))
    }

    /// Three channel RGB frame. Gray is replicated, alpha is dropped.
    pub fn to_rgb(&self) -> Frame {
        if self.channels() == 3 {
            return self.clone();
        }
        let (h, w, channels) = self.pixels.dim();
        Frame::from_pixels(Array3::from_shape_fn((h, w, 3), |(y, x, c)| {
            if channels >= 3 {
                self.pixels[[y, x, c]]
            } else {
                self.pixels[[y, x, 0]]
            }
        }))
    }

    /// Converts into an owned RGBA image for presentation.
    ///
    /// Only 1, 3 and 4 channel frames are displayable; anything else yields `None`.
    pub fn to_display(&self) -> Option<DisplayImage> {
        let data: Vec<u8> = match self.channels() {
            1 => self.pixels.iter().flat_map(|&v| [v, v, v, 0xff]).collect(),
            3 => self
                .pixels
                .as_standard_layout()
                .as_slice()?
                .chunks_exact(3)
                .flat_map(|px| [px[0], px[1], px[2], 0xff])
                .collect(),
            4 => self.to_raw(),
            _ => return None,
        };
        RgbaImage::from_raw(self.width(), self.height(), data)
    }
}

/// ITU-R BT.601 luma in 14 bit fixed point; equal channels map to themselves.
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868 + 8192) >> 14) as u8
}
