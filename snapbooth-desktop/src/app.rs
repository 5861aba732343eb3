use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use image::{imageops, Rgb, RgbImage};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::Camera;
use tracing::{error, info, span, warn, Level};

use snapbooth_img::capture::process_capture;
use snapbooth_img::grid;
use snapbooth_img::pipeline::{FaceDetector, OnnxFaceDetector};
use snapbooth_img::store::PhotoStore;

use crate::overlay;
use crate::video::{create_input_stream, CameraFailure, OutputVideoStream};

const LANDING_BACKGROUND: Rgb<u8> = Rgb([38, 24, 64]);
const GRID_GAP: u32 = 4;
const COUNTDOWN_SECONDS: u8 = 3;
const COUNTDOWN_DIM: f32 = 0.5;
const PROCESSING_DIM: f32 = 0.3;

pub struct AppConfig {
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub data_dir: PathBuf,
    pub model: PathBuf,
    pub detector_threads: usize,
    pub camera_index: Option<u32>,
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Landing,
    Preview,
    Countdown { remaining: u8, next_tick: Instant },
    CameraError,
}

pub struct App {
    config: AppConfig,
    store: PhotoStore,
    output: OutputVideoStream,
    detector: Option<OnnxFaceDetector>,
    detector_unavailable: bool,
    camera: Option<Camera>,
    mode: Mode,
    landing_frame: RgbImage,
    last_frame: Option<RgbImage>,
}

struct RawMode;

impl RawMode {
    fn enable() -> Result<RawMode> {
        terminal::enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            error!("Failed to restore the terminal: {e:?}");
        }
    }
}

impl App {
    pub fn new(config: AppConfig) -> Result<App> {
        let store = PhotoStore::open(&config.data_dir)?;
        let output = OutputVideoStream::new(config.width, config.height)?;

        let mut app = App {
            config,
            store,
            output,
            detector: None,
            detector_unavailable: false,
            camera: None,
            mode: Mode::Landing,
            landing_frame: RgbImage::new(1, 1),
            last_frame: None,
        };
        app.refresh_landing();

        Ok(app)
    }

    pub fn run(&mut self) -> Result<()> {
        info!(
            "{} photos loaded; space opens the camera, 'd' removes the newest photo, \
             'c' clears the grid, 'q' quits",
            self.store.len()
        );

        let _raw = RawMode::enable()?;
        let frame_budget = Duration::from_millis(1000 / u64::from(self.config.fps.max(1)));

        loop {
            let start = Instant::now();

            if !self.handle_keys()? {
                break;
            }

            let frame = self.next_frame()?;
            if let Err(e) = self.output.write_frame(&frame) {
                error!("Failed to render frame: {e:?}");
                break;
            }

            // camera pulls pace the loop while streaming
            if self.camera.is_none() {
                let elapsed = start.elapsed();
                if elapsed < frame_budget {
                    std::thread::sleep(frame_budget - elapsed);
                }
            }
        }

        self.release_camera();
        Ok(())
    }

    /// Returns `false` when the app should quit.
    fn handle_keys(&mut self) -> Result<bool> {
        while event::poll(Duration::ZERO)? {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                return Ok(false);
            }

            match self.mode {
                Mode::Landing => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(false),
                    KeyCode::Char(' ') | KeyCode::Enter => self.enter_camera(),
                    KeyCode::Char('d') => self.remove_newest()?,
                    KeyCode::Char('c') => {
                        self.store.clear()?;
                        self.refresh_landing();
                    }
                    _ => {}
                },
                Mode::Preview => match key.code {
                    KeyCode::Char(' ') | KeyCode::Enter => {
                        self.mode = Mode::Countdown {
                            remaining: COUNTDOWN_SECONDS,
                            next_tick: Instant::now() + Duration::from_secs(1),
                        };
                    }
                    KeyCode::Char('q') | KeyCode::Esc => self.leave_camera(),
                    _ => {}
                },
                Mode::Countdown { .. } => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => self.leave_camera(),
                    _ => {}
                },
                Mode::CameraError => match key.code {
                    KeyCode::Char('r') => self.enter_camera(),
                    KeyCode::Char('q') | KeyCode::Esc => self.mode = Mode::Landing,
                    _ => {}
                },
            }
        }

        Ok(true)
    }

    fn next_frame(&mut self) -> Result<RgbImage> {
        match self.mode {
            Mode::Landing => Ok(self.landing_frame.clone()),
            Mode::CameraError => {
                let mut frame = self.landing_frame.clone();
                overlay::dim(&mut frame, PROCESSING_DIM);
                Ok(frame)
            }
            Mode::Preview => self.camera_frame(),
            Mode::Countdown {
                mut remaining,
                mut next_tick,
            } => {
                let frame = self.camera_frame()?;
                if !matches!(self.mode, Mode::Countdown { .. }) {
                    // the camera died mid-countdown
                    return Ok(frame);
                }

                if Instant::now() >= next_tick {
                    remaining -= 1;
                    next_tick += Duration::from_secs(1);
                    if remaining == 0 {
                        return self.capture();
                    }
                    self.mode = Mode::Countdown {
                        remaining,
                        next_tick,
                    };
                }

                let mut dimmed = frame;
                overlay::dim(&mut dimmed, COUNTDOWN_DIM);
                overlay::draw_digit(&mut dimmed, remaining);
                Ok(dimmed)
            }
        }
    }

    /// Pull, mirror, and cover-fit one camera frame; remembers the full-size
    /// mirrored frame for capture.
    fn camera_frame(&mut self) -> Result<RgbImage> {
        let frame = match self.camera.as_mut() {
            Some(camera) => camera.frame().and_then(|b| b.decode_image::<RgbFormat>()),
            None => {
                self.mode = Mode::Landing;
                return Ok(self.landing_frame.clone());
            }
        };

        match frame {
            Ok(decoded) => {
                let mirrored = imageops::flip_horizontal(&decoded);
                let display = grid::cover(&mirrored, self.config.width, self.config.height);
                self.last_frame = Some(mirrored);
                Ok(display)
            }
            Err(e) => {
                let failure = CameraFailure::classify(e);
                error!("Failed to pull frame from webcam: {failure}");
                self.release_camera();
                self.mode = Mode::CameraError;

                let mut frame = self.landing_frame.clone();
                overlay::dim(&mut frame, PROCESSING_DIM);
                Ok(frame)
            }
        }
    }

    fn capture(&mut self) -> Result<RgbImage> {
        let Some(original) = self.last_frame.take() else {
            warn!("No frame available to capture");
            self.leave_camera();
            return Ok(self.landing_frame.clone());
        };

        // show the processing state while detection runs
        let mut processing = grid::cover(&original, self.config.width, self.config.height);
        overlay::dim(&mut processing, PROCESSING_DIM);
        if let Err(e) = self.output.write_frame(&processing) {
            error!("Failed to render frame: {e:?}");
        }

        let capture_span = span!(Level::DEBUG, "process_capture");
        let capture_guard = capture_span.enter();
        let outcome = process_capture(self.detector(), &original);
        drop(capture_guard);

        let kept_original = if outcome.crop.is_some() {
            Some(&outcome.original)
        } else {
            None
        };
        match self.store.add(&outcome.photo, kept_original, outcome.crop) {
            Ok(record) => info!("Captured photo {} ({} total)", record.id, self.store.len()),
            Err(e) => error!("Failed to store photo: {e:?}"),
        }

        self.leave_camera();
        self.refresh_landing();
        Ok(self.landing_frame.clone())
    }

    /// Lazily initialize the face detector; a failed init is remembered so
    /// captures skip detection instead of retrying every time.
    fn detector(&mut self) -> Option<&mut dyn FaceDetector> {
        if self.detector.is_none() && !self.detector_unavailable {
            match OnnxFaceDetector::from_file(&self.config.model, self.config.detector_threads) {
                Ok(d) => self.detector = Some(d),
                Err(e) => {
                    warn!("Face detection unavailable, photos stay uncropped: {e:?}");
                    self.detector_unavailable = true;
                }
            }
        }

        self.detector.as_mut().map(|d| d as &mut dyn FaceDetector)
    }

    fn enter_camera(&mut self) {
        match create_input_stream(self.config.fps, self.config.camera_index) {
            Ok(camera) => {
                self.camera = Some(camera);
                self.last_frame = None;
                self.mode = Mode::Preview;
            }
            Err(failure) => {
                error!("{failure}");
                self.mode = Mode::CameraError;
            }
        }
    }

    fn leave_camera(&mut self) {
        self.release_camera();
        self.mode = Mode::Landing;
    }

    fn release_camera(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                warn!("Failed to stop camera stream: {e:?}");
            }
        }
        self.last_frame = None;
    }

    fn remove_newest(&mut self) -> Result<()> {
        let Some(id) = self.store.photos().last().map(|p| p.id.clone()) else {
            return Ok(());
        };
        self.store.remove(&id)?;
        self.refresh_landing();
        Ok(())
    }

    fn refresh_landing(&mut self) {
        let mut images = Vec::new();
        for record in self.store.photos() {
            match self.store.load_image(record) {
                Ok(img) => images.push(img),
                Err(e) => warn!("Skipping unreadable photo {}: {e:?}", record.id),
            }
        }

        self.landing_frame = grid::compose(
            &images,
            self.config.width,
            self.config.height,
            GRID_GAP,
            LANDING_BACKGROUND,
        );
    }
}
