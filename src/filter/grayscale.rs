use std::any::Any;

use super::Filter;
use crate::{error::Result, frame::Frame};

/// Collapses the frame to a single luma channel.
#[derive(Debug, Default)]
pub struct Grayscale {
    enabled: bool,
}

impl Grayscale {
    pub fn new() -> Self {
        Self { enabled: true }
    }
}

impl Filter for Grayscale {
    fn id(&self) -> &'static str {
        "grayscale"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, on: bool) {
        self.enabled = on;
    }

    fn render(&self, src: &Frame) -> Result<Frame> {
        Ok(src.to_gray())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
