use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

/// Column count for a grid of `count` photos.
///
/// Small counts get fixed layouts; past 16 photos the grid grows as the
/// square root, capped at five columns.
pub fn columns_for(count: usize) -> u32 {
    match count {
        0 | 1 => 1,
        2..=4 => 2,
        5..=9 => 3,
        10..=16 => 4,
        n => ((n as f64).sqrt().ceil() as u32).min(5),
    }
}

/// Fill a `width` × `height` cell with `img`: center-crop to the cell aspect
/// ratio, then resize.
pub fn cover(img: &RgbImage, width: u32, height: u32) -> RgbImage {
    if width == 0 || height == 0 || img.width() == 0 || img.height() == 0 {
        return RgbImage::new(width, height);
    }

    let src_aspect = img.width() as f64 / img.height() as f64;
    let dst_aspect = width as f64 / height as f64;

    let (crop_w, crop_h) = if src_aspect > dst_aspect {
        let w = (img.height() as f64 * dst_aspect).round() as u32;
        (w.clamp(1, img.width()), img.height())
    } else {
        let h = (img.width() as f64 / dst_aspect).round() as u32;
        (img.width(), h.clamp(1, img.height()))
    };

    let x = (img.width() - crop_w) / 2;
    let y = (img.height() - crop_h) / 2;

    let cropped = imageops::crop_imm(img, x, y, crop_w, crop_h).to_image();
    imageops::resize(&cropped, width, height, FilterType::Triangle)
}

/// Compose the photo list into one grid frame over a flat background.
///
/// Photos fill row-major cells separated by `gap` pixels; trailing cells of
/// the last row stay background-colored.
pub fn compose(
    photos: &[RgbImage],
    width: u32,
    height: u32,
    gap: u32,
    background: Rgb<u8>,
) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(width, height, background);
    if photos.is_empty() {
        return canvas;
    }

    let cols = columns_for(photos.len());
    let rows = (photos.len() as u32).div_ceil(cols);

    let cell_w = width.saturating_sub(gap * (cols - 1)) / cols;
    let cell_h = height.saturating_sub(gap * (rows - 1)) / rows;
    if cell_w == 0 || cell_h == 0 {
        return canvas;
    }

    for (i, photo) in photos.iter().enumerate() {
        let col = i as u32 % cols;
        let row = i as u32 / cols;
        let x = col * (cell_w + gap);
        let y = row * (cell_h + gap);

        let cell = cover(photo, cell_w, cell_h);
        imageops::replace(&mut canvas, &cell, x as i64, y as i64);
    }

    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    const BG: Rgb<u8> = Rgb([10, 10, 10]);

    fn solid(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb(color))
    }

    #[test]
    fn column_thresholds() {
        assert_eq!(columns_for(1), 1);
        assert_eq!(columns_for(2), 2);
        assert_eq!(columns_for(3), 2);
        assert_eq!(columns_for(4), 2);
        assert_eq!(columns_for(5), 3);
        assert_eq!(columns_for(9), 3);
        assert_eq!(columns_for(10), 4);
        assert_eq!(columns_for(16), 4);
        assert_eq!(columns_for(17), 5);
        assert_eq!(columns_for(50), 5);
    }

    #[test]
    fn cover_wide_source_crops_the_sides() {
        let img = solid(100, 50, [200, 0, 0]);
        let out = cover(&img, 50, 50);
        assert_eq!(out.dimensions(), (50, 50));
        assert_eq!(out.get_pixel(25, 25), &Rgb([200, 0, 0]));
    }

    #[test]
    fn cover_tall_source_crops_the_bottom_and_top() {
        let img = solid(50, 200, [0, 200, 0]);
        let out = cover(&img, 100, 50);
        assert_eq!(out.dimensions(), (100, 50));
    }

    #[test]
    fn cover_of_matching_aspect_only_resizes() {
        let img = solid(80, 40, [0, 0, 200]);
        let out = cover(&img, 40, 20);
        assert_eq!(out.dimensions(), (40, 20));
        assert_eq!(out.get_pixel(0, 0), &Rgb([0, 0, 200]));
    }

    #[test]
    fn compose_of_empty_list_is_background() {
        let out = compose(&[], 60, 60, 2, BG);
        assert_eq!(out.dimensions(), (60, 60));
        assert_eq!(out.get_pixel(30, 30), &BG);
    }

    #[test]
    fn compose_places_photos_row_major() {
        let photos = vec![
            solid(30, 30, [200, 0, 0]),
            solid(30, 30, [0, 200, 0]),
            solid(30, 30, [0, 0, 200]),
        ];
        // 3 photos → 2 columns × 2 rows; cells are 49×49 on a 100×100 canvas
        let out = compose(&photos, 100, 100, 2, BG);
        assert_eq!(out.dimensions(), (100, 100));
        assert_eq!(out.get_pixel(0, 0), &Rgb([200, 0, 0]));
        assert_eq!(out.get_pixel(51, 0), &Rgb([0, 200, 0]));
        assert_eq!(out.get_pixel(0, 51), &Rgb([0, 0, 200]));
        // the fourth cell stays background
        assert_eq!(out.get_pixel(99, 99), &BG);
        // so does the gap between cells
        assert_eq!(out.get_pixel(49, 0), &BG);
    }

    #[test]
    fn single_photo_fills_the_canvas() {
        let photos = vec![solid(10, 10, [200, 0, 0])];
        let out = compose(&photos, 64, 64, 2, BG);
        assert_eq!(out.get_pixel(0, 0), &Rgb([200, 0, 0]));
        assert_eq!(out.get_pixel(63, 63), &Rgb([200, 0, 0]));
    }
}
