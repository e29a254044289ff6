use std::path::{Path, PathBuf};

use ffmpeg_sidecar::command::{ffmpeg_is_installed, FfmpegCommand};
use framefx::{Error, FrameSource, SourceKind};

/// Encodes a short lossless test clip of `frames` frames.
fn make_clip(dir: &Path, frames: u32) -> PathBuf {
    let path = dir.join("clip.mkv");
    let count = frames.to_string();
    let mut child = FfmpegCommand::new()
        .hide_banner()
        .args(["-f", "lavfi", "-i", "testsrc=size=32x24:rate=10"])
        .args(["-frames:v", count.as_str(), "-c:v", "ffv1", "-y"])
        .output(&*path.to_string_lossy())
        .spawn()
        .unwrap();
    for _ in child.iter().unwrap() {}
    assert!(child.wait().unwrap().success());
    path
}

fn video_source(path: &Path) -> FrameSource {
    let mut source = FrameSource::new();
    source.set_source(SourceKind::Video);
    source.set_video_path(path);
    source
}

#[test]
#[ignore = "needs ffmpeg on PATH; run with --ignored"]
fn video_wraps_to_first_frame() {
    assert!(ffmpeg_is_installed(), "ffmpeg not found on PATH");
    let dir = tempfile::tempdir().unwrap();
    let clip = make_clip(dir.path(), 3);

    let mut source = video_source(&clip);
    let frames: Vec<_> = (0..4).map(|_| source.grab().unwrap()).collect();

    assert_eq!((frames[0].width(), frames[0].height()), (32, 24));
    assert_eq!(frames[3], frames[0]);
    assert!(source.is_open());

    source.close();
    assert!(!source.is_open());
}

#[test]
#[ignore = "needs ffmpeg on PATH; run with --ignored"]
fn undecodable_video_fails_to_open() {
    assert!(ffmpeg_is_installed(), "ffmpeg not found on PATH");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.mp4");
    std::fs::write(&path, b"definitely not a video").unwrap();

    let mut source = video_source(&path);
    assert!(matches!(source.open(), Err(Error::Open { .. })));
    assert!(!source.is_open());
    assert!(source.grab().is_err());
}

#[test]
fn missing_video_fails_without_ffmpeg() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = video_source(&dir.path().join("absent.mp4"));
    assert!(matches!(source.grab(), Err(Error::Open { .. })));
}
