use std::any::Any;

use ndarray::Array3;

use super::{ops, Filter};
use crate::{error::Result, frame::Frame};

/// Unsharp mask, limited to pixels whose local contrast exceeds `threshold`.
#[derive(Debug)]
pub struct Sharpen {
    enabled: bool,
    amount: f64,
    radius: i32,
    threshold: i32,
}

impl Default for Sharpen {
    fn default() -> Self {
        Self {
            enabled: false,
            amount: 1.0,
            radius: 3,
            threshold: 10,
        }
    }
}

impl Sharpen {
    pub fn new(amount: f64) -> Self {
        let mut sharpen = Self {
            enabled: true,
            ..Self::default()
        };
        sharpen.set_amount(amount);
        sharpen
    }

    /// NaN resets to 1.
    pub fn set_amount(&mut self, v: f64) {
        self.amount = if v.is_nan() { 1.0 } else { v.clamp(0.0, 3.0) };
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn set_radius(&mut self, v: i32) {
        self.radius = v.clamp(1, 15);
    }

    pub fn radius(&self) -> i32 {
        self.radius
    }

    pub fn set_threshold(&mut self, v: i32) {
        self.threshold = v.clamp(0, 255);
    }

    pub fn threshold(&self) -> i32 {
        self.threshold
    }
}

impl Filter for Sharpen {
    fn id(&self) -> &'static str {
        "sharpen"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, on: bool) {
        self.enabled = on;
    }

    fn render(&self, src: &Frame) -> Result<Frame> {
        let blurred = ops::gaussian_blur(src, (self.radius * 2 + 1) as usize);
        let (s, b) = (src.pixels(), blurred.pixels());
        let (h, w, c) = s.dim();

        let diff = Frame::from_pixels(Array3::from_shape_fn((h, w, c), |(y, x, ch)| {
            s[[y, x, ch]].abs_diff(b[[y, x, ch]])
        }))
        .to_gray();

        let amount = self.amount as f32;
        let out = Array3::from_shape_fn((h, w, c), |(y, x, ch)| {
            let v = s[[y, x, ch]];
            if (diff.get(x, y, 0) as i32) <= self.threshold {
                return v;
            }
            ops::saturate(v as f32 * (1.0 + amount) - b[[y, x, ch]] as f32 * amount)
        });
        Ok(Frame::from_pixels(out))
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
