#![warn(unused_extern_crates)]
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use snapbooth_img::capture::process_capture;
use snapbooth_img::pipeline::{FaceDetector, OnnxFaceDetector};
use snapbooth_img::store::PhotoStore;

use crate::app::{App, AppConfig};

mod app;
mod overlay;
mod video;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct CmdArgs {
    /// Target frame rate
    #[arg(long, default_value = "30")]
    fps: u32,

    /// Output window width
    #[arg(long, default_value = "1280")]
    width: u32,

    /// Output window height
    #[arg(long, default_value = "720")]
    height: u32,

    /// Directory holding captured photos and the photo index
    #[arg(long, value_name = "DIR", default_value = "booth-data")]
    data_dir: PathBuf,

    /// Face detection model to load
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "models/face_detection_short_range.onnx"
    )]
    model: PathBuf,

    /// Camera to use; defaults to the last camera found
    #[arg(long)]
    camera_index: Option<u32>,

    /// Max threads for the face detection session
    #[arg(long)]
    max_threads: Option<usize>,

    /// Process a single image file instead of opening the camera
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Where to write the processed photo (single-image mode only)
    #[arg(short, long, requires = "input")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let filter = EnvFilter::from_default_env();
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_env_filter(filter)
        .init();

    let args = CmdArgs::parse();

    let total_threads = num_cpus::get();
    let detector_threads = args
        .max_threads
        .unwrap_or(total_threads / 2)
        .clamp(1, total_threads);

    if let Some(input) = args.input.clone() {
        return process_file(&args, detector_threads, input);
    }

    let config = AppConfig {
        fps: args.fps,
        width: args.width,
        height: args.height,
        data_dir: args.data_dir,
        model: args.model,
        detector_threads,
        camera_index: args.camera_index,
    };

    let mut app = App::new(config)?;
    app.run()
}

/// Single-image mode: run the capture pipeline on a file, without a camera.
fn process_file(args: &CmdArgs, detector_threads: usize, input: PathBuf) -> Result<()> {
    let mut store = PhotoStore::open(&args.data_dir)?;

    let mut detector = match OnnxFaceDetector::from_file(&args.model, detector_threads) {
        Ok(d) => Some(d),
        Err(e) => {
            warn!("Face detection unavailable, photo stays uncropped: {e:?}");
            None
        }
    };

    let img = image::open(&input)?.into_rgb8();
    let outcome = process_capture(
        detector.as_mut().map(|d| d as &mut dyn FaceDetector),
        &img,
    );

    let kept_original = if outcome.crop.is_some() {
        Some(&outcome.original)
    } else {
        None
    };
    let record = store.add(&outcome.photo, kept_original, outcome.crop)?;
    info!("Stored photo {} ({} total)", record.id, store.len());

    if let Some(output) = &args.output {
        outcome.photo.save(output)?;
        info!("Result at {:?}", output);
    }

    Ok(())
}
