use anyhow::Result;
use image::RgbImage;

use crate::shapes::Rect;

mod detect;

pub use detect::OnnxFaceDetector;

/// A detected face within a source image.
#[derive(Debug, Clone)]
pub struct Detection {
    pub bounds: Rect,
    pub confidence: f32,
}

/// Pluggable face detection backend.
///
/// The capture flow treats the detector as an opaque collaborator: any
/// failure degrades to an uncropped photo instead of failing the capture.
pub trait FaceDetector {
    fn detect(&mut self, img: &RgbImage) -> Result<Vec<Detection>>;
}

/// Pick the most confident detection, if any.
pub fn best_detection(detections: Vec<Detection>) -> Option<Detection> {
    detections.into_iter().max_by(|a, b| {
        a.confidence
            .partial_cmp(&b.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}
