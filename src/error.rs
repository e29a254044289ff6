//! Error types for framefx

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for framefx operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    // Acquisition errors
    #[error("No static image set")]
    NoStaticImage,

    #[error("Failed to open {target}: {reason}")]
    Open { target: String, reason: String },

    #[error("Camera read failed")]
    CameraRead,

    #[error("Video {path:?} could not be read after rewind and reopen")]
    VideoExhausted { path: PathBuf },

    // Filter errors
    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

impl Error {
    /// Whether the error came from frame acquisition (the driver skips the tick).
    pub fn is_acquisition(&self) -> bool {
        matches!(
            self,
            Error::NoStaticImage
                | Error::Open { .. }
                | Error::CameraRead
                | Error::VideoExhausted { .. }
        )
    }
}
