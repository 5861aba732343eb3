//! Core photo-booth logic: face detection, crop calculation, photo storage,
//! and grid composition for captured selfies.

pub mod capture;
pub mod crop;
pub mod grid;
pub mod pipeline;
pub mod shapes;
pub mod store;

pub use capture::{process_capture, CaptureOutcome};
pub use crop::{crop_around_face, CropRect};
pub use pipeline::{best_detection, Detection, FaceDetector, OnnxFaceDetector};
pub use shapes::Rect;
pub use store::{PhotoRecord, PhotoStore};
