use serde::{Deserialize, Serialize};

use crate::shapes::Rect;

/// Side padding, as a fraction of face width, applied left and right.
const SIDE_PAD_RATIO: f32 = 0.35;

/// Extra height below the face, as a fraction of face height, to include shoulders.
const SHOULDER_PAD_RATIO: f32 = 0.5;

/// The padded, bounds-clamped rectangle used to extract the final cropped photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Expand a face bounding box into the crop rectangle for the final photo.
///
/// The face keeps its top edge (no headroom is added), gains 35% of its width
/// on each side, and 50% of its height below for the shoulders. The result is
/// clamped so it never leaves the image.
pub fn crop_around_face(face: Rect, image_width: u32, image_height: u32) -> CropRect {
    let face_w = face.width as f32;
    let face_h = face.height as f32;

    let side_pad = face_w * SIDE_PAD_RATIO;
    let shoulder_pad = face_h * SHOULDER_PAD_RATIO;

    let x = (face.x as f32 - side_pad).max(0.).round();
    let y = (face.y as f32).min(image_height as f32);
    let width = (face_w + 2. * side_pad).round().min(image_width as f32 - x);
    let height = (face_h + shoulder_pad).round().min(image_height as f32 - y);

    CropRect {
        x: x as u32,
        y: y as u32,
        width: width.max(0.) as u32,
        height: height.max(0.) as u32,
    }
}
