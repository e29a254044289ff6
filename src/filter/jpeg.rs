use std::{any::Any, io::Cursor};

use image::{codecs::jpeg::JpegEncoder, ImageFormat, RgbImage};

use super::Filter;
use crate::{
    error::{Error, Result},
    frame::Frame,
};

/// Re-encodes the frame as JPEG and decodes it again.
#[derive(Debug)]
pub struct Jpeg {
    enabled: bool,
    quality: i32,
}

impl Default for Jpeg {
    fn default() -> Self {
        Self {
            enabled: false,
            quality: 80,
        }
    }
}

impl Jpeg {
    pub fn new(quality: i32) -> Self {
        let mut jpeg = Self {
            enabled: true,
            ..Self::default()
        };
        jpeg.set_quality(quality);
        jpeg
    }

    pub fn set_quality(&mut self, q: i32) {
        self.quality = q.clamp(0, 100);
    }

    pub fn quality(&self) -> i32 {
        self.quality
    }

    /// The re-encode itself, independent of the enabled flag. Always yields RGB.
    pub(crate) fn recompress(&self, src: &Frame) -> Result<Frame> {
        if src.is_empty() {
            return Err(Error::Encode("empty frame".into()));
        }
        let rgb = src.to_rgb();
        let image = RgbImage::from_raw(rgb.width(), rgb.height(), rgb.to_raw())
            .ok_or_else(|| Error::Encode("frame does not fit an RGB image".into()))?;

        // the encoder's scale starts at 1
        let quality = self.quality.max(1) as u8;
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, quality)
            .encode_image(&image)
            .map_err(|e| Error::Encode(e.to_string()))?;

        let decoded = image::load(Cursor::new(buf), ImageFormat::Jpeg)
            .map_err(|e| Error::Decode(e.to_string()))?;
        Frame::from_raw(
            decoded.width(),
            decoded.height(),
            3,
            decoded.to_rgb8().into_raw(),
        )
    }
}

impl Filter for Jpeg {
    fn id(&self) -> &'static str {
        "jpeg"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, on: bool) {
        self.enabled = on;
    }

    fn render(&self, src: &Frame) -> Result<Frame> {
        self.recompress(src)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps() {
        let mut jpeg = Jpeg::default();
        jpeg.set_quality(-3);
        assert_eq!(jpeg.quality(), 0);
        jpeg.set_quality(250);
        assert_eq!(jpeg.quality(), 100);
        jpeg.set_quality(42);
        assert_eq!(jpeg.quality(), 42);
    }

    #[test]
    fn output_is_rgb_with_same_size() {
        let frame = Frame::from_raw(16, 8, 1, (0..128).map(|v| v as u8).collect()).unwrap();
        let out = Jpeg::new(50).apply(&frame).into_owned();
        assert_eq!(out.channels(), 3);
        assert_eq!((out.width(), out.height()), (16, 8));
    }

    #[test]
    fn empty_frame_passes_through() {
        let frame = Frame::new(0, 0, 3);
        let out = Jpeg::new(50).apply(&frame);
        assert!(matches!(out, std::borrow::Cow::Borrowed(_)));
    }
}
