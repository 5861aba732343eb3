use image::{imageops, RgbImage};
use tracing::{info, warn};

use crate::crop::{crop_around_face, CropRect};
use crate::pipeline::{best_detection, FaceDetector};

/// Result of processing one captured frame.
pub struct CaptureOutcome {
    /// The photo to keep: cropped when a face was found, the frame otherwise.
    pub photo: RgbImage,
    /// The uncropped frame.
    pub original: RgbImage,
    /// The crop applied, when detection succeeded.
    pub crop: Option<CropRect>,
}

/// Detect a face in the captured frame and crop around it.
///
/// Detection never blocks a capture: a missing detector, an inference error,
/// or an empty result all keep the uncropped frame.
pub fn process_capture(detector: Option<&mut dyn FaceDetector>, frame: &RgbImage) -> CaptureOutcome {
    let crop = detector.and_then(|detector| match detector.detect(frame) {
        Ok(detections) => match best_detection(detections) {
            Some(detection) => {
                let crop = crop_around_face(detection.bounds, frame.width(), frame.height());
                if crop.width == 0 || crop.height == 0 {
                    warn!("Degenerate crop for face at {:?}", detection.bounds);
                    None
                } else {
                    Some(crop)
                }
            }
            None => {
                info!("No face detected, keeping the uncropped photo");
                None
            }
        },
        Err(e) => {
            warn!("Face detection failed, keeping the uncropped photo: {e:?}");
            None
        }
    });

    let photo = match &crop {
        Some(c) => imageops::crop_imm(frame, c.x, c.y, c.width, c.height).to_image(),
        None => frame.clone(),
    };

    CaptureOutcome {
        photo,
        original: frame.clone(),
        crop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Detection;
    use crate::shapes::Rect;
    use anyhow::{anyhow, Result};

    struct StubDetector(Vec<Detection>);

    impl FaceDetector for StubDetector {
        fn detect(&mut self, _img: &RgbImage) -> Result<Vec<Detection>> {
            Ok(self.0.clone())
        }
    }

    struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn detect(&mut self, _img: &RgbImage) -> Result<Vec<Detection>> {
            Err(anyhow!("model exploded"))
        }
    }

    fn frame(width: u32, height: u32) -> RgbImage {
        RgbImage::new(width, height)
    }

    #[test]
    fn without_detector_keeps_the_frame() {
        let img = frame(320, 240);
        let outcome = process_capture(None, &img);
        assert!(outcome.crop.is_none());
        assert_eq!(outcome.photo.dimensions(), (320, 240));
    }

    #[test]
    fn detected_face_is_cropped() {
        let img = frame(1000, 1000);
        let mut detector = StubDetector(vec![Detection {
            bounds: Rect::new(400, 400, 200, 200),
            confidence: 0.9,
        }]);
        let outcome = process_capture(Some(&mut detector), &img);
        let crop = outcome.crop.expect("face should produce a crop");
        assert_eq!((crop.x, crop.y), (330, 400));
        assert_eq!(outcome.photo.dimensions(), (340, 300));
        assert_eq!(outcome.original.dimensions(), (1000, 1000));
    }

    #[test]
    fn most_confident_face_wins() {
        let img = frame(1000, 1000);
        let mut detector = StubDetector(vec![
            Detection {
                bounds: Rect::new(100, 100, 100, 100),
                confidence: 0.6,
            },
            Detection {
                bounds: Rect::new(400, 400, 200, 200),
                confidence: 0.9,
            },
        ]);
        let outcome = process_capture(Some(&mut detector), &img);
        assert_eq!(outcome.crop.unwrap().y, 400);
    }

    #[test]
    fn no_face_falls_back_to_the_frame() {
        let img = frame(320, 240);
        let mut detector = StubDetector(Vec::new());
        let outcome = process_capture(Some(&mut detector), &img);
        assert!(outcome.crop.is_none());
        assert_eq!(outcome.photo.dimensions(), (320, 240));
    }

    #[test]
    fn detector_error_falls_back_to_the_frame() {
        let img = frame(320, 240);
        let mut detector = FailingDetector;
        let outcome = process_capture(Some(&mut detector), &img);
        assert!(outcome.crop.is_none());
        assert_eq!(outcome.photo.dimensions(), (320, 240));
    }

    #[test]
    fn degenerate_detection_falls_back_to_the_frame() {
        let img = frame(320, 240);
        let mut detector = StubDetector(vec![Detection {
            bounds: Rect::new(319, 239, 0, 0),
            confidence: 0.9,
        }]);
        let outcome = process_capture(Some(&mut detector), &img);
        assert!(outcome.crop.is_none());
    }
}
