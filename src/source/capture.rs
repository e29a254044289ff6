use std::path::Path;

use crate::{error::Result, frame::Frame};

/// An open video file or camera. Dropping it releases the device.
pub trait Capture: Send {
    /// The next frame, or `None` at end of stream or on a failed read.
    fn read(&mut self) -> Option<Frame>;

    /// Restarts from the first frame. Returns `false` if the handle cannot seek.
    fn rewind(&mut self) -> bool;
}

/// Opens capture handles for a [`super::FrameSource`].
pub trait CaptureBackend: Send {
    fn open_video(&mut self, path: &Path) -> Result<Box<dyn Capture>>;

    fn open_camera(&mut self, index: u32) -> Result<Box<dyn Capture>>;
}
