//! # framefx
//!
//! A live image effects pipeline. A [`FrameSource`] produces frames from a
//! still image, a looping video file or a camera; an [`Engine`] runs each
//! frame through an ordered chain of [`Filter`]s and converts the result into
//! a [`DisplayImage`].
//!
//! ```no_run
//! use framefx::{filter::{shared, Glitch, Grayscale}, Engine, FilterHandle, FrameSource, SourceKind};
//!
//! let mut source = FrameSource::new();
//! source.set_source(SourceKind::Video);
//! source.set_video_path("clip.mp4");
//!
//! let mut engine = Engine::new(source);
//! engine.add_filter(shared(Grayscale::new()) as FilterHandle);
//! engine.add_filter(shared(Glitch::new(12)) as FilterHandle);
//!
//! if engine.grab().is_ok() {
//!     let _display = engine.process();
//! }
//! ```

pub mod engine;
pub mod error;
pub mod filter;
pub mod frame;
pub mod source;

pub use engine::Engine;
pub use error::{Error, Result};
pub use filter::{configure, shared, Filter, FilterHandle};
pub use frame::{DisplayImage, Frame};
pub use source::{Capture, CaptureBackend, FrameSource, SourceKind};
