//! Capture handles backed by an `ffmpeg` child process decoding to raw RGB.

use std::path::{Path, PathBuf};

use ffmpeg_sidecar::{
    child::FfmpegChild,
    command::{ffmpeg_is_installed, FfmpegCommand},
    event::{FfmpegEvent, LogLevel},
    iter::FfmpegIterator,
};

use super::capture::{Capture, CaptureBackend};
use crate::{
    error::{Error, Result},
    frame::Frame,
};

#[derive(Debug, Clone)]
enum Input {
    Video(PathBuf),
    Camera(u32),
}

impl Input {
    fn command(&self) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new();
        cmd.hide_banner();
        match self {
            Input::Video(path) => {
                cmd.input(&*path.to_string_lossy());
            }
            Input::Camera(index) => {
                cmd.args(camera_args(*index));
            }
        }
        cmd.args("-an -f rawvideo -pix_fmt rgb24 -".split(' '));
        cmd
    }

    fn describe(&self) -> String {
        match self {
            Input::Video(path) => format!("video {}", path.display()),
            Input::Camera(index) => format!("camera #{index}"),
        }
    }

    fn open_error(&self, reason: impl ToString) -> Error {
        Error::Open {
            target: self.describe(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(target_os = "macos")]
fn camera_args(index: u32) -> Vec<String> {
    vec![
        "-f".into(),
        "avfoundation".into(),
        "-framerate".into(),
        "30".into(),
        "-i".into(),
        format!("{index}:none"),
    ]
}

#[cfg(target_os = "windows")]
fn camera_args(index: u32) -> Vec<String> {
    vec!["-f".into(), "vfwcap".into(), "-i".into(), index.to_string()]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn camera_args(index: u32) -> Vec<String> {
    vec![
        "-f".into(),
        "v4l2".into(),
        "-i".into(),
        format!("/dev/video{index}"),
    ]
}

/// Decoder process plus its event stream.
///
/// Opening decodes the first frame eagerly, so a file ffmpeg cannot decode
/// fails at open time rather than on the first read.
pub struct FfmpegCapture {
    input: Input,
    child: FfmpegChild,
    events: FfmpegIterator,
    pending: Option<Frame>,
    // nothing handed out since the decoder started
    fresh: bool,
    last_error: Option<String>,
}

impl FfmpegCapture {
    fn spawn(input: Input) -> Result<Self> {
        let mut child = input
            .command()
            .spawn()
            .map_err(|e| input.open_error(e))?;
        let events = match child.iter() {
            Ok(events) => events,
            Err(e) => {
                let _ = child.kill();
                return Err(input.open_error(e));
            }
        };

        let mut capture = Self {
            input,
            child,
            events,
            pending: None,
            fresh: true,
            last_error: None,
        };

        match capture.next_frame() {
            Some(frame) => {
                tracing::debug!(
                    "{} decoding {}x{}",
                    capture.input.describe(),
                    frame.width(),
                    frame.height()
                );
                capture.pending = Some(frame);
                Ok(capture)
            }
            None => {
                let reason = capture
                    .last_error
                    .take()
                    .unwrap_or_else(|| "no decodable frames".to_string());
                Err(capture.input.open_error(reason))
            }
        }
    }

    fn next_frame(&mut self) -> Option<Frame> {
        for event in self.events.by_ref() {
            match event {
                FfmpegEvent::OutputFrame(frame) => {
                    return match Frame::from_raw(frame.width, frame.height, 3, frame.data) {
                        Ok(frame) => Some(frame),
                        Err(e) => {
                            tracing::warn!("dropping malformed frame: {e}");
                            None
                        }
                    };
                }
                FfmpegEvent::Error(msg)
                | FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, msg) => {
                    tracing::debug!("[ffmpeg] {msg}");
                    self.last_error = Some(msg);
                }
                _ => (),
            }
        }
        None
    }
}

impl Capture for FfmpegCapture {
    fn read(&mut self) -> Option<Frame> {
        self.fresh = false;
        match self.pending.take() {
            Some(frame) => Some(frame),
            None => self.next_frame(),
        }
    }

    fn rewind(&mut self) -> bool {
        if self.fresh {
            return true;
        }
        // live devices have no start to return to
        if let Input::Camera(_) = self.input {
            return false;
        }
        match Self::spawn(self.input.clone()) {
            Ok(restarted) => {
                *self = restarted;
                true
            }
            Err(e) => {
                tracing::warn!("rewind failed: {e}");
                false
            }
        }
    }
}

impl Drop for FfmpegCapture {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Opens files and cameras through the system `ffmpeg` binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegBackend;

impl FfmpegBackend {
    fn ensure_installed(input: &Input) -> Result<()> {
        if ffmpeg_is_installed() {
            Ok(())
        } else {
            Err(input.open_error("ffmpeg is not installed"))
        }
    }
}

impl CaptureBackend for FfmpegBackend {
    fn open_video(&mut self, path: &Path) -> Result<Box<dyn Capture>> {
        let input = Input::Video(path.to_path_buf());
        if !path.is_file() {
            return Err(input.open_error("no such file"));
        }
        Self::ensure_installed(&input)?;
        Ok(Box::new(FfmpegCapture::spawn(input)?))
    }

    fn open_camera(&mut self, index: u32) -> Result<Box<dyn Capture>> {
        let input = Input::Camera(index);
        Self::ensure_installed(&input)?;
        Ok(Box::new(FfmpegCapture::spawn(input)?))
    }
}
