use std::any::Any;

use ndarray::Array3;

use super::{ops, Filter};
use crate::{error::Result, frame::Frame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MorphologyOp {
    Erode,
    Dilate,
    #[default]
    Open,
    Close,
}

/// Binary morphology with a square kernel on the thresholded luma.
#[derive(Debug)]
pub struct Morphology {
    enabled: bool,
    op: MorphologyOp,
    kernel_size: i32,
    iterations: i32,
}

impl Default for Morphology {
    fn default() -> Self {
        Self {
            enabled: false,
            op: MorphologyOp::Open,
            kernel_size: 3,
            iterations: 1,
        }
    }
}

impl Morphology {
    pub fn new(op: MorphologyOp) -> Self {
        Self {
            enabled: true,
            op,
            ..Self::default()
        }
    }

    pub fn set_op(&mut self, op: MorphologyOp) {
        self.op = op;
    }

    pub fn op(&self) -> MorphologyOp {
        self.op
    }

    pub fn set_kernel_size(&mut self, v: i32) {
        self.kernel_size = ops::odd(v.max(1));
    }

    pub fn kernel_size(&self) -> i32 {
        self.kernel_size
    }

    pub fn set_iterations(&mut self, v: i32) {
        self.iterations = v.max(1);
    }

    pub fn iterations(&self) -> i32 {
        self.iterations
    }

    fn repeat(&self, frame: Frame, dilate: bool) -> Frame {
        let radius = (self.kernel_size / 2) as usize;
        (0..self.iterations).fold(frame, |f, _| extremum(&f, radius, dilate))
    }
}

/// Rectangular min (erode) or max (dilate) filter. Pixels outside the frame
/// never win.
fn extremum(src: &Frame, radius: usize, dilate: bool) -> Frame {
    let pick = |a: u8, b: u8| if dilate { a.max(b) } else { a.min(b) };
    let pixels = src.pixels();
    let (h, w, c) = pixels.dim();

    let rows = Array3::from_shape_fn((h, w, c), |(y, x, ch)| {
        let lo = x.saturating_sub(radius);
        let hi = (x + radius).min(w - 1);
        (lo..=hi).fold(pixels[[y, x, ch]], |acc, xx| pick(acc, pixels[[y, xx, ch]]))
    });
    let out = Array3::from_shape_fn((h, w, c), |(y, x, ch)| {
        let lo = y.saturating_sub(radius);
        let hi = (y + radius).min(h - 1);
        (lo..=hi).fold(rows[[y, x, ch]], |acc, yy| pick(acc, rows[[yy, x, ch]]))
    });
    Frame::from_pixels(out)
}

impl Filter for Morphology {
    fn id(&self) -> &'static str {
        "morphology"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, on: bool) {
        self.enabled = on;
    }

    fn render(&self, src: &Frame) -> Result<Frame> {
        if src.is_empty() {
            return Ok(src.clone());
        }
        let bin = ops::binarize(&src.to_gray(), 128);

        let out = match self.op {
            MorphologyOp::Erode => self.repeat(bin, false),
            MorphologyOp::Dilate => self.repeat(bin, true),
            MorphologyOp::Open => self.repeat(self.repeat(bin, false), true),
            MorphologyOp::Close => self.repeat(self.repeat(bin, true), false),
        };
        Ok(out.to_rgb())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
