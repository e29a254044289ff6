use anyhow::{anyhow, Context, Result};
use clap::{ArgGroup, Parser, ValueEnum};
use framefx::{
    filter::{
        shared, Affine, Blur, Canny, Contours, Glitch, Grayscale, Jpeg, Keypoints, Morphology,
        MorphologyOp, PixelSort, Sharpen, Threshold,
    },
    DisplayImage, Engine, FilterHandle, Frame, FrameSource, SourceKind,
};
use image::ImageFormat;
use std::{path::PathBuf, time::Duration};
use tokio::{
    io::{stdout, AsyncWriteExt},
    sync::mpsc,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(group(ArgGroup::new("input").required(true).args(["image", "video", "camera"])))]
struct Args {
    /// Still image to run the chain on
    #[arg(long, value_name = "PATH")]
    image: Option<PathBuf>,

    /// Video file, played in a loop
    #[arg(long, value_name = "PATH")]
    video: Option<PathBuf>,

    /// Camera device index
    #[arg(long, value_name = "INDEX")]
    camera: Option<u32>,

    /// Ticks per second
    #[arg(long, value_name = "FPS", default_value_t = 30)]
    fps: u32,

    /// Stop after this many displayed frames
    #[arg(short = 'n', long, value_name = "NUM")]
    frames: Option<u64>,

    /// Where to write the latest frame as PNG
    #[arg(short = 'o', long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Converts to gray
    #[arg(long)]
    grayscale: bool,

    /// Gaussian blur with kernel size <K>
    #[arg(long, value_name = "K")]
    blur: Option<i32>,

    /// Canny edges with hysteresis thresholds
    #[arg(long, value_name = "LOW,HIGH")]
    canny: Option<String>,

    /// Binary threshold at <T>
    #[arg(long, value_name = "T")]
    threshold: Option<i32>,

    /// JPEG re-encode at quality <Q>
    #[arg(long, value_name = "Q")]
    jpeg: Option<i32>,

    /// Makes the image glitch by <STRENGTH>
    #[arg(long, value_name = "STRENGTH")]
    glitch: Option<i32>,

    /// Sorts pixel runs of <CHUNK> by brightness
    #[arg(long, value_name = "CHUNK")]
    pixel_sort: Option<i32>,

    /// Unsharp mask with <AMOUNT>
    #[arg(long, value_name = "AMOUNT")]
    sharpen: Option<f64>,

    /// Rotates by <DEG> degrees around the center
    #[arg(long, value_name = "DEG", allow_hyphen_values = true)]
    rotate: Option<f64>,

    /// Binary morphology
    #[arg(long, value_enum, value_name = "OP")]
    morphology: Option<MorphologyArg>,

    /// Marks FAST corners above <THRESH>
    #[arg(long, value_name = "THRESH")]
    keypoints: Option<i32>,

    /// Outlines bright regions enclosing at least <MIN_AREA> pixels
    #[arg(long, value_name = "MIN_AREA")]
    contours: Option<f64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MorphologyArg {
    Erode,
    Dilate,
    Open,
    Close,
}

impl From<MorphologyArg> for MorphologyOp {
    fn from(arg: MorphologyArg) -> Self {
        match arg {
            MorphologyArg::Erode => MorphologyOp::Erode,
            MorphologyArg::Dilate => MorphologyOp::Dilate,
            MorphologyArg::Open => MorphologyOp::Open,
            MorphologyArg::Close => MorphologyOp::Close,
        }
    }
}

enum Update {
    Frame(DisplayImage),
    Skipped,
}

fn start_display(output: Option<PathBuf>) -> (mpsc::UnboundedSender<Update>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        let (mut shown, mut skipped) = (0u64, 0u64);
        let mut size = (0, 0);

        while let Some(update) = rx.recv().await {
            match update {
                Update::Frame(image) => {
                    shown += 1;
                    size = image.dimensions();
                    if let Some(path) = output.clone() {
                        let saved = tokio::task::spawn_blocking(move || {
                            image.save_with_format(&path, ImageFormat::Png)
                        })
                        .await;
                        match saved {
                            Ok(Ok(())) => (),
                            Ok(Err(e)) => tracing::warn!("failed to write frame: {e}"),
                            Err(e) => tracing::warn!("display task failed: {e}"),
                        }
                    }
                }
                Update::Skipped => skipped += 1,
            }

            let line = format!(
                "\rFrames: {shown}  |  Skipped: {skipped}  |  Size: {}x{}",
                size.0, size.1
            );
            let mut out = stdout();
            if out.write_all(line.as_bytes()).await.is_err() || out.flush().await.is_err() {
                break;
            }
        }
    });

    (tx, handle)
}

fn build_source(args: &Args) -> Result<FrameSource> {
    let mut source = FrameSource::new();

    if let Some(path) = &args.image {
        let frame = Frame::open(path)?;
        tracing::info!("loaded {}x{} still from {path:?}", frame.width(), frame.height());
        source.set_static_image(frame);
        source.set_source(SourceKind::Image);
    } else if let Some(path) = &args.video {
        source.set_video_path(path);
        source.set_source(SourceKind::Video);
    } else if let Some(index) = args.camera {
        source.set_camera_index(index);
        source.set_source(SourceKind::Camera);
    }

    Ok(source)
}

fn parse_canny(value: &str) -> Result<(f64, f64)> {
    let (low, high) = value
        .split_once(',')
        .ok_or_else(|| anyhow!("expected LOW,HIGH for --canny, got {value:?}"))?;
    let low = low.trim().parse().context("invalid low canny threshold")?;
    let high = high.trim().parse().context("invalid high canny threshold")?;
    Ok((low, high))
}

fn build_chain(args: &Args) -> Result<Vec<FilterHandle>> {
    let mut filters: Vec<FilterHandle> = Vec::new();

    if args.grayscale {
        filters.push(shared(Grayscale::new()));
    }

    if let Some(ksize) = args.blur {
        filters.push(shared(Blur::new(ksize)));
    }

    if let Some(value) = &args.canny {
        let (low, high) = parse_canny(value)?;
        filters.push(shared(Canny::new(low, high)));
    }

    if let Some(thresh) = args.threshold {
        filters.push(shared(Threshold::binary(thresh)));
    }

    if let Some(quality) = args.jpeg {
        filters.push(shared(Jpeg::new(quality)));
    }

    if let Some(strength) = args.glitch {
        filters.push(shared(Glitch::new(strength)));
    }

    if let Some(chunk) = args.pixel_sort {
        filters.push(shared(PixelSort::new(chunk)));
    }

    if let Some(amount) = args.sharpen {
        filters.push(shared(Sharpen::new(amount)));
    }

    if let Some(angle) = args.rotate {
        filters.push(shared(Affine::rotation(angle)));
    }

    if let Some(op) = args.morphology {
        filters.push(shared(Morphology::new(op.into())));
    }

    if let Some(thresh) = args.keypoints {
        filters.push(shared(Keypoints::new(thresh)));
    }

    if let Some(min_area) = args.contours {
        filters.push(shared(Contours::new(min_area)));
    }

    Ok(filters)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut engine = Engine::new(build_source(&args)?);
    for filter in build_chain(&args)? {
        engine.add_filter(filter);
    }
    tracing::info!("running {} filters at {} fps", engine.filters().len(), args.fps);

    let (display_tx, display) = start_display(args.output.clone());

    let mut ticker = interval(Duration::from_secs_f64(1.0 / args.fps.max(1) as f64));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut shown = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => (),
            _ = tokio::signal::ctrl_c() => break,
        }

        if let Err(e) = engine.grab() {
            if !e.is_acquisition() {
                return Err(e.into());
            }
            tracing::warn!("skipping tick: {e}");
            display_tx.send(Update::Skipped)?;
            continue;
        }

        match engine.process() {
            Some(image) => {
                display_tx.send(Update::Frame(image))?;
                shown += 1;
            }
            None => display_tx.send(Update::Skipped)?,
        }

        if args.frames.is_some_and(|limit| shown >= limit) {
            break;
        }
    }

    engine.close();
    drop(display_tx);
    display.await?;
    println!();

    Ok(())
}
