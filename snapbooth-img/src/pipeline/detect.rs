use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::{Array, ArrayView2, Axis, Ix2};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tracing::debug;

use super::{Detection, FaceDetector};
use crate::shapes::Rect;

/// Square model input edge, in pixels.
const INPUT_SIZE: u32 = 640;

const MIN_CONFIDENCE: f32 = 0.5;

/// Candidates overlapping an accepted box by more than this are duplicates.
const SUPPRESSION_OVERLAP_PCT: f32 = 30.0;

/// Face detector backed by an ONNX short-range face model.
pub struct OnnxFaceDetector {
    session: Session,
}

impl OnnxFaceDetector {
    pub fn from_file(model_path: &Path, threads: usize) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(threads.max(1))?
            .commit_from_file(model_path)?;

        Ok(Self { session })
    }
}

impl FaceDetector for OnnxFaceDetector {
    fn detect(&mut self, img: &RgbImage) -> Result<Vec<Detection>> {
        let start = Instant::now();
        let (resized, resized_w, resized_h) = fit_to_input(img);
        debug!("Took {:?} to resize image", start.elapsed());

        let model_input = Array::from_shape_fn(
            (1, 3, INPUT_SIZE as usize, INPUT_SIZE as usize),
            |(_, c, y, x)| {
                let y = y as u32;
                let x = x as u32;
                if y >= resized_h || x >= resized_w {
                    0.
                } else {
                    resized.get_pixel(x, y)[c] as f32 / 255.0
                }
            },
        );

        let input = Tensor::from_array(model_input)?;

        let start = Instant::now();
        let outputs = self.session.run(ort::inputs!["images" => input]?)?;
        debug!("Took {:?} to run model", start.elapsed());

        let raw = outputs["output0"].try_extract_tensor::<f32>()?;
        let rows = raw.index_axis(Axis(0), 0).into_dimensionality::<Ix2>()?;

        let detections = decode_detections(
            rows,
            img.width() as f32 / resized_w as f32,
            img.height() as f32 / resized_h as f32,
            img.width(),
            img.height(),
        );
        debug!("Face detection found {:?} faces", detections.len());

        Ok(detections)
    }
}

/// Aspect-preserving resize into the model input square; the remainder is
/// zero-padded by the tensor fill above.
fn fit_to_input(img: &RgbImage) -> (RgbImage, u32, u32) {
    let scale = (INPUT_SIZE as f32 / img.width() as f32).min(INPUT_SIZE as f32 / img.height() as f32);
    let w = ((img.width() as f32 * scale).round() as u32).clamp(1, INPUT_SIZE);
    let h = ((img.height() as f32 * scale).round() as u32).clamp(1, INPUT_SIZE);

    (imageops::resize(img, w, h, FilterType::Nearest), w, h)
}

/// Decode candidate columns of `[cx, cy, w, h, confidence, ...]` into
/// deduplicated detections in source-image coordinates.
fn decode_detections(
    rows: ArrayView2<f32>,
    x_scale: f32,
    y_scale: f32,
    image_width: u32,
    image_height: u32,
) -> Vec<Detection> {
    let mut detections: Vec<Detection> = Vec::new();

    if rows.nrows() < 5 {
        return detections;
    }

    for row in rows.columns() {
        let confidence = row[4];
        if confidence < MIN_CONFIDENCE {
            continue;
        }

        let bounds = Rect::from_center_clamped(
            row[0] * x_scale,
            row[1] * y_scale,
            row[2] * x_scale,
            row[3] * y_scale,
            image_width,
            image_height,
        );
        if bounds.area() == 0 {
            continue;
        }

        let mut has_better_dup = false;
        for (i, d) in detections.iter().enumerate() {
            if bounds.overlap_pct(&d.bounds) > SUPPRESSION_OVERLAP_PCT {
                if d.confidence > confidence {
                    has_better_dup = true;
                } else {
                    detections.swap_remove(i);
                }
                break;
            }
        }

        if has_better_dup {
            continue;
        }

        detections.push(Detection { bounds, confidence });
    }

    detections
}
