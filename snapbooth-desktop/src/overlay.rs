use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

const DIGIT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Darken the frame in place. `factor` is the remaining brightness,
/// so 0.5 matches a half-opacity black overlay.
pub fn dim(img: &mut RgbImage, factor: f32) {
    for pixel in img.pixels_mut() {
        for c in pixel.0.iter_mut() {
            *c = (*c as f32 * factor).round() as u8;
        }
    }
}

/// Lit segments per digit: top, top-right, bottom-right, bottom,
/// bottom-left, top-left, middle.
const SEGMENTS: [[bool; 7]; 10] = [
    [true, true, true, true, true, true, false],
    [false, true, true, false, false, false, false],
    [true, true, false, true, true, false, true],
    [true, true, true, true, false, false, true],
    [false, true, true, false, false, true, true],
    [true, false, true, true, false, true, true],
    [true, false, true, true, true, true, true],
    [true, true, true, false, false, false, false],
    [true, true, true, true, true, true, true],
    [true, true, true, true, false, true, true],
];

/// Draw a large seven-segment digit centered on the frame.
pub fn draw_digit(img: &mut RgbImage, digit: u8) {
    let digit = (digit % 10) as usize;

    let height = (img.height() / 3).max(8);
    let width = (height * 11 / 20).max(3);
    let thickness = (height / 8).max(1);
    let half = height / 2;

    let x0 = img.width().saturating_sub(width) / 2;
    let y0 = img.height().saturating_sub(height) / 2;

    let segments = [
        horizontal(x0, y0, width, thickness),
        vertical(x0 + width - thickness, y0, half, thickness),
        vertical(x0 + width - thickness, y0 + half, height - half, thickness),
        horizontal(x0, y0 + height - thickness, width, thickness),
        vertical(x0, y0 + half, height - half, thickness),
        vertical(x0, y0, half, thickness),
        horizontal(x0, y0 + half - thickness / 2, width, thickness),
    ];

    for (rect, lit) in segments.iter().zip(SEGMENTS[digit]) {
        if lit {
            draw_filled_rect_mut(img, *rect, DIGIT_COLOR);
        }
    }
}

fn horizontal(x: u32, y: u32, length: u32, thickness: u32) -> Rect {
    Rect::at(x as i32, y as i32).of_size(length, thickness)
}

fn vertical(x: u32, y: u32, length: u32, thickness: u32) -> Rect {
    Rect::at(x as i32, y as i32).of_size(thickness, length)
}
