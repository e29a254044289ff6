use std::any::Any;

use super::{ops, Filter};
use crate::{error::Result, frame::Frame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThresholdMode {
    /// Fixed cut-off.
    #[default]
    Binary,
    /// Cut-off follows the mean of the surrounding block.
    AdaptiveMean,
    /// Cut-off follows a gaussian-weighted mean of the surrounding block.
    AdaptiveGaussian,
}

/// Binarizes the luma of the frame. Output is 3-channel 0/255.
#[derive(Debug)]
pub struct Threshold {
    enabled: bool,
    mode: ThresholdMode,
    thresh: i32,
    block_size: i32,
    c: i32,
}

impl Default for Threshold {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: ThresholdMode::Binary,
            thresh: 128,
            block_size: 11,
            c: 2,
        }
    }
}

impl Threshold {
    pub fn binary(thresh: i32) -> Self {
        let mut threshold = Self {
            enabled: true,
            ..Self::default()
        };
        threshold.set_thresh(thresh);
        threshold
    }

    pub fn set_mode(&mut self, mode: ThresholdMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> ThresholdMode {
        self.mode
    }

    pub fn set_thresh(&mut self, v: i32) {
        self.thresh = v.clamp(0, 255);
    }

    pub fn thresh(&self) -> i32 {
        self.thresh
    }

    /// At least 3, always odd.
    pub fn set_block_size(&mut self, v: i32) {
        self.block_size = ops::odd(v.max(3));
    }

    pub fn block_size(&self) -> i32 {
        self.block_size
    }

    pub fn set_c(&mut self, v: i32) {
        self.c = v.clamp(-50, 50);
    }

    pub fn c(&self) -> i32 {
        self.c
    }

    fn adaptive(&self, gray: &Frame, kernel: &[f32]) -> Frame {
        let local = ops::convolve_separable(gray, kernel);
        let out = ndarray::Zip::from(gray.pixels())
            .and(local.pixels())
            .map_collect(|&v, &mean| {
                if v as i32 > mean as i32 - self.c {
                    255
                } else {
                    0
                }
            });
        Frame::from_pixels(out)
    }
}

impl Filter for Threshold {
    fn id(&self) -> &'static str {
        "threshold"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, on: bool) {
        self.enabled = on;
    }

    fn render(&self, src: &Frame) -> Result<Frame> {
        let gray = src.to_gray();
        let block = self.block_size as usize;
        let len = ops::kernel_len(block, &gray);

        let bin = match self.mode {
            ThresholdMode::Binary => ops::binarize(&gray, self.thresh as u8),
            ThresholdMode::AdaptiveMean => self.adaptive(&gray, &vec![1.0 / len as f32; len]),
            ThresholdMode::AdaptiveGaussian => {
                self.adaptive(&gray, &ops::gaussian_kernel(len, ops::sigma_for(block)))
            }
        };

        Ok(bin.to_rgb())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
