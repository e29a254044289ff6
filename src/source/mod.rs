//! Frame acquisition from a still image, a looping video file or a camera.

mod capture;
mod ffmpeg;

pub use capture::{Capture, CaptureBackend};
pub use ffmpeg::{FfmpegBackend, FfmpegCapture};

use std::path::{Path, PathBuf};

use crate::{
    error::{Error, Result},
    frame::Frame,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    #[default]
    Image,
    Video,
    Camera,
}

/// Escalation steps when a video read fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Reading,
    Seeking,
    Reopening,
    Failed,
}

/// The active origin of frames.
///
/// Video and camera handles are opened lazily by [`FrameSource::grab`] and
/// owned exclusively; they are released on [`FrameSource::close`], when the
/// source kind or its target changes, and on drop.
pub struct FrameSource {
    kind: SourceKind,
    still: Option<Frame>,
    video_path: Option<PathBuf>,
    camera_index: u32,
    backend: Box<dyn CaptureBackend>,
    capture: Option<Box<dyn Capture>>,
}

impl Default for FrameSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource {
    pub fn new() -> Self {
        Self::with_backend(FfmpegBackend)
    }

    pub fn with_backend(backend: impl CaptureBackend + 'static) -> Self {
        Self {
            kind: SourceKind::Image,
            still: None,
            video_path: None,
            camera_index: 0,
            backend: Box::new(backend),
            capture: None,
        }
    }

    /// Switches the active kind. Does not open anything; a handle opened for
    /// a different kind is released.
    pub fn set_source(&mut self, kind: SourceKind) {
        if kind != self.kind {
            self.close();
            tracing::debug!(?kind, "source switched");
        }
        self.kind = kind;
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn set_static_image(&mut self, frame: Frame) {
        self.still = Some(frame);
    }

    pub fn static_image(&self) -> Option<&Frame> {
        self.still.as_ref()
    }

    pub fn set_video_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if self.kind == SourceKind::Video && self.video_path.as_ref() != Some(&path) {
            self.close();
        }
        self.video_path = Some(path);
    }

    pub fn video_path(&self) -> Option<&Path> {
        self.video_path.as_deref()
    }

    pub fn set_camera_index(&mut self, index: u32) {
        if self.kind == SourceKind::Camera && self.camera_index != index {
            self.close();
        }
        self.camera_index = index;
    }

    pub fn camera_index(&self) -> u32 {
        self.camera_index
    }

    pub fn is_open(&self) -> bool {
        self.capture.is_some()
    }

    /// Opens the capture handle for the active kind, replacing any open one.
    /// Always succeeds for still images.
    pub fn open(&mut self) -> Result<()> {
        self.close();

        let opened = match self.kind {
            SourceKind::Image => return Ok(()),
            SourceKind::Video => {
                let path = self.video_path.clone().ok_or_else(|| Error::Open {
                    target: "video".into(),
                    reason: "no video path set".into(),
                })?;
                self.backend.open_video(&path)
            }
            SourceKind::Camera => self.backend.open_camera(self.camera_index),
        };

        match opened {
            Ok(capture) => {
                tracing::info!(kind = ?self.kind, "capture opened");
                self.capture = Some(capture);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("open failed: {e}");
                Err(e)
            }
        }
    }

    /// Releases the capture handle. Safe to call when nothing is open.
    pub fn close(&mut self) {
        if self.capture.take().is_some() {
            tracing::info!(kind = ?self.kind, "capture closed");
        }
    }

    /// Produces the next frame for the active kind.
    pub fn grab(&mut self) -> Result<Frame> {
        match self.kind {
            SourceKind::Image => self.still.clone().ok_or(Error::NoStaticImage),
            SourceKind::Video => {
                if self.capture.is_none() {
                    self.open()?;
                }
                self.grab_looping()
            }
            SourceKind::Camera => {
                if self.capture.is_none() {
                    self.open()?;
                }
                self.read().ok_or_else(|| {
                    tracing::warn!(index = self.camera_index, "camera read failed");
                    Error::CameraRead
                })
            }
        }
    }

    fn read(&mut self) -> Option<Frame> {
        self.capture.as_mut()?.read()
    }

    fn rewind(&mut self) -> bool {
        self.capture.as_mut().is_some_and(|c| c.rewind())
    }

    /// Reads the next video frame, wrapping to the start at end of stream:
    /// read, then rewind and read, then reopen, rewind and read.
    fn grab_looping(&mut self) -> Result<Frame> {
        let mut state = LoopState::Reading;
        loop {
            state = match state {
                LoopState::Reading => match self.read() {
                    Some(frame) => return Ok(frame),
                    None => LoopState::Seeking,
                },
                LoopState::Seeking => match self.rewind().then(|| self.read()).flatten() {
                    Some(frame) => return Ok(frame),
                    None => LoopState::Reopening,
                },
                LoopState::Reopening => {
                    let frame = match self.open() {
                        Ok(()) => self.rewind().then(|| self.read()).flatten(),
                        Err(_) => None,
                    };
                    match frame {
                        Some(frame) => return Ok(frame),
                        None => LoopState::Failed,
                    }
                }
                LoopState::Failed => {
                    self.close();
                    let path = self.video_path.clone().unwrap_or_default();
                    tracing::warn!(?path, "video could not be recovered");
                    return Err(Error::VideoExhausted { path });
                }
            };
            tracing::debug!(?state, "video read failed, escalating");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    #[derive(Default, Clone)]
    struct Counters {
        opens: Arc<AtomicUsize>,
        rewinds: Arc<AtomicUsize>,
        drops: Arc<AtomicUsize>,
    }

    impl Counters {
        fn get(counter: &Arc<AtomicUsize>) -> usize {
            counter.load(Ordering::SeqCst)
        }
    }

    struct FakeCapture {
        frames: Vec<Frame>,
        pos: usize,
        seekable: bool,
        counters: Counters,
    }

    impl Capture for FakeCapture {
        fn read(&mut self) -> Option<Frame> {
            let frame = self.frames.get(self.pos).cloned();
            self.pos += 1;
            frame
        }

        fn rewind(&mut self) -> bool {
            self.counters.rewinds.fetch_add(1, Ordering::SeqCst);
            if self.pos == 0 || self.seekable {
                self.pos = 0;
                true
            } else {
                false
            }
        }
    }

    impl Drop for FakeCapture {
        fn drop(&mut self) {
            self.counters.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FakeBackend {
        frames: Vec<Frame>,
        seekable: bool,
        max_opens: usize,
        counters: Counters,
    }

    impl FakeBackend {
        fn new(frames: usize) -> Self {
            Self {
                frames: (0..frames).map(numbered).collect(),
                seekable: true,
                max_opens: usize::MAX,
                counters: Counters::default(),
            }
        }

        fn open(&mut self) -> Result<Box<dyn Capture>> {
            let n = self.counters.opens.fetch_add(1, Ordering::SeqCst) + 1;
            if n > self.max_opens {
                return Err(Error::Open {
                    target: "fake".into(),
                    reason: "unopenable".into(),
                });
            }
            Ok(Box::new(FakeCapture {
                frames: self.frames.clone(),
                pos: 0,
                seekable: self.seekable,
                counters: self.counters.clone(),
            }))
        }
    }

    impl CaptureBackend for FakeBackend {
        fn open_video(&mut self, _path: &Path) -> Result<Box<dyn Capture>> {
            self.open()
        }

        fn open_camera(&mut self, _index: u32) -> Result<Box<dyn Capture>> {
            self.open()
        }
    }

    fn numbered(i: usize) -> Frame {
        Frame::from_raw(1, 1, 1, vec![i as u8]).unwrap()
    }

    fn id(frame: &Frame) -> u8 {
        frame.get(0, 0, 0)
    }

    fn video(backend: FakeBackend) -> FrameSource {
        let mut source = FrameSource::with_backend(backend);
        source.set_source(SourceKind::Video);
        source.set_video_path("clip.mp4");
        source
    }

    #[test]
    fn image_source_returns_copies() {
        let mut source = FrameSource::with_backend(FakeBackend::new(0));
        assert!(matches!(source.grab(), Err(Error::NoStaticImage)));
        assert!(source.static_image().is_none());
        assert!(source.open().is_ok());

        source.set_static_image(numbered(9));
        assert_eq!(id(&source.grab().unwrap()), 9);
        assert_eq!(id(&source.grab().unwrap()), 9);
        assert_eq!(source.static_image().map(id), Some(9));

        // the still survives a trip through another kind
        source.set_source(SourceKind::Camera);
        source.set_source(SourceKind::Image);
        assert_eq!(source.static_image().map(id), Some(9));
    }

    #[test]
    fn video_loops_by_rewinding() {
        let backend = FakeBackend::new(3);
        let counters = backend.counters.clone();
        let mut source = video(backend);

        let ids: Vec<u8> = (0..4).map(|_| id(&source.grab().unwrap())).collect();
        assert_eq!(ids, vec![0, 1, 2, 0]);
        assert_eq!(Counters::get(&counters.opens), 1);
        assert_eq!(Counters::get(&counters.rewinds), 1);
    }

    #[test]
    fn video_reopens_when_rewind_fails() {
        let mut backend = FakeBackend::new(2);
        backend.seekable = false;
        let counters = backend.counters.clone();
        let mut source = video(backend);

        let ids: Vec<u8> = (0..5).map(|_| id(&source.grab().unwrap())).collect();
        assert_eq!(ids, vec![0, 1, 0, 1, 0]);
        assert_eq!(Counters::get(&counters.opens), 3);
    }

    #[test]
    fn video_fails_after_all_recovery_steps() {
        let mut backend = FakeBackend::new(1);
        backend.seekable = false;
        backend.max_opens = 1;
        let counters = backend.counters.clone();
        let mut source = video(backend);

        assert_eq!(id(&source.grab().unwrap()), 0);
        assert!(matches!(source.grab(), Err(Error::VideoExhausted { .. })));
        assert!(!source.is_open());
        // initial open plus a single reopen attempt
        assert_eq!(Counters::get(&counters.opens), 2);
    }

    #[test]
    fn empty_video_fails_without_spinning() {
        let counters = {
            let backend = FakeBackend::new(0);
            let counters = backend.counters.clone();
            let mut source = video(backend);
            assert!(source.grab().is_err());
            counters
        };
        assert_eq!(Counters::get(&counters.opens), 2);
    }

    #[test]
    fn unopenable_video_reports_failure() {
        let mut backend = FakeBackend::new(3);
        backend.max_opens = 0;
        let counters = backend.counters.clone();
        let mut source = video(backend);

        assert!(matches!(source.open(), Err(Error::Open { .. })));
        assert!(matches!(source.grab(), Err(Error::Open { .. })));
        assert!(!source.is_open());
        assert_eq!(Counters::get(&counters.opens), 2);
    }

    #[test]
    fn video_without_path_fails_to_open() {
        let mut source = FrameSource::with_backend(FakeBackend::new(3));
        source.set_source(SourceKind::Video);
        assert!(matches!(source.open(), Err(Error::Open { .. })));
    }

    #[test]
    fn camera_read_failure_is_not_retried() {
        let backend = FakeBackend::new(2);
        let counters = backend.counters.clone();
        let mut source = FrameSource::with_backend(backend);
        source.set_source(SourceKind::Camera);

        assert_eq!(id(&source.grab().unwrap()), 0);
        assert_eq!(id(&source.grab().unwrap()), 1);
        assert!(matches!(source.grab(), Err(Error::CameraRead)));
        assert_eq!(Counters::get(&counters.rewinds), 0);
        assert_eq!(Counters::get(&counters.opens), 1);
    }

    #[test]
    fn open_is_idempotent_and_releases_the_old_handle() {
        let backend = FakeBackend::new(3);
        let counters = backend.counters.clone();
        let mut source = video(backend);

        source.open().unwrap();
        source.open().unwrap();
        assert_eq!(Counters::get(&counters.opens), 2);
        assert_eq!(Counters::get(&counters.drops), 1);

        source.close();
        source.close();
        assert_eq!(Counters::get(&counters.drops), 2);
    }

    #[test]
    fn switching_kind_releases_the_handle() {
        let backend = FakeBackend::new(3);
        let counters = backend.counters.clone();
        let mut source = video(backend);

        source.grab().unwrap();
        assert!(source.is_open());

        source.set_source(SourceKind::Video);
        assert!(source.is_open());

        source.set_source(SourceKind::Camera);
        assert!(!source.is_open());
        assert_eq!(Counters::get(&counters.drops), 1);
    }

    #[test]
    fn retargeting_the_active_kind_releases_the_handle() {
        let mut source = video(FakeBackend::new(3));
        source.grab().unwrap();

        source.set_video_path("clip.mp4");
        assert!(source.is_open());
        source.set_video_path("other.mp4");
        assert!(!source.is_open());

        source.set_source(SourceKind::Camera);
        source.grab().unwrap();
        source.set_camera_index(0);
        assert!(source.is_open());
        source.set_camera_index(2);
        assert!(!source.is_open());
        assert_eq!(source.camera_index(), 2);
    }
}
