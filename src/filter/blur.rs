use std::any::Any;

use super::{ops, Filter};
use crate::{error::Result, frame::Frame};

/// Gaussian blur with a square kernel.
#[derive(Debug, Default)]
pub struct Blur {
    enabled: bool,
    ksize: i32,
}

impl Blur {
    pub fn new(ksize: i32) -> Self {
        let mut blur = Self::default();
        blur.set_ksize(ksize);
        blur
    }

    /// Sizes of 1 or less switch the blur off; even sizes round up.
    pub fn set_ksize(&mut self, k: i32) {
        if k <= 1 {
            self.ksize = 0;
            self.enabled = false;
        } else {
            self.ksize = ops::odd(k);
            self.enabled = true;
        }
    }

    pub fn ksize(&self) -> i32 {
        self.ksize
    }
}

impl Filter for Blur {
    fn id(&self) -> &'static str {
        "blur"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, on: bool) {
        self.enabled = on;
    }

    fn render(&self, src: &Frame) -> Result<Frame> {
        if self.ksize <= 1 {
            return Ok(src.clone());
        }
        Ok(ops::gaussian_blur(src, self.ksize as usize))
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
