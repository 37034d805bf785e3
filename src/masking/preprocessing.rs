use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageReader, Luma};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;

use crate::error::MaskError;

/// Number of tile rows and columns in the adaptive equalization grid.
const TILE_GRID: u32 = 8;

/// Decode a source photograph, capping its longest side at `max_side`.
///
/// Downscaling preserves aspect ratio and uses an averaging filter, so a
/// thin seam survives minification instead of aliasing away. Any decode
/// problem (missing file, corrupt data, unsupported format) is fatal for
/// this image only.
pub fn read_image(path: &Path, max_side: u32) -> Result<DynamicImage, MaskError> {
    let decoded = ImageReader::open(path)
        .map_err(|e| MaskError::Decode {
            path: path.to_path_buf(),
            source: image::ImageError::IoError(e),
        })?
        .decode()
        .map_err(|e| MaskError::Decode {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(cap_resolution(decoded, max_side))
}

/// Downscale so that `max(width, height) <= max_side`, keeping aspect
/// ratio. Images already within the cap pass through untouched.
pub fn cap_resolution(image: DynamicImage, max_side: u32) -> DynamicImage {
    let (w, h) = (image.width(), image.height());
    let longest = w.max(h);
    if longest <= max_side {
        return image;
    }

    let scale = max_side as f32 / longest as f32;
    let new_w = ((w as f32 * scale) as u32).max(1);
    let new_h = ((h as f32 * scale) as u32).max(1);
    image.resize_exact(new_w, new_h, FilterType::Triangle)
}

/// Convert image to grayscale.
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Light Gaussian smoothing to suppress shot noise before gradient
/// computation.
pub fn apply_blur(img: &GrayImage, sigma: f32) -> GrayImage {
    gaussian_blur_f32(img, sigma)
}

/// Canny edge detection: L2 gradient magnitude with hysteresis linking
/// between the low and high thresholds, so a continuous seam does not
/// fragment into dashes under small local contrast dips.
pub fn detect_edges(img: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    canny(img, low_threshold, high_threshold)
}

/// Contrast-limited adaptive histogram equalization over a fixed
/// `TILE_GRID` x `TILE_GRID` grid.
///
/// Each tile's histogram is clipped at `clip_limit` times the uniform bin
/// height before equalization, which stops flat, noisy tiles from being
/// amplified into texture. Per-pixel output bilinearly blends the
/// mappings of the four surrounding tiles so tile borders stay invisible.
pub fn clahe(gray: &GrayImage, clip_limit: f32) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }

    let tiles_x = TILE_GRID.min(w);
    let tiles_y = TILE_GRID.min(h);
    let luts = tile_mappings(gray, tiles_x, tiles_y, clip_limit);

    let mut out = GrayImage::new(w, h);
    for (x, y, pixel) in gray.enumerate_pixels() {
        // Position in tile-center coordinates.
        let fx = (x as f32 + 0.5) * tiles_x as f32 / w as f32 - 0.5;
        let fy = (y as f32 + 0.5) * tiles_y as f32 / h as f32 - 0.5;

        let tx0 = fx.floor().clamp(0.0, (tiles_x - 1) as f32) as u32;
        let ty0 = fy.floor().clamp(0.0, (tiles_y - 1) as f32) as u32;
        let tx1 = (tx0 + 1).min(tiles_x - 1);
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let wx = (fx - tx0 as f32).clamp(0.0, 1.0);
        let wy = (fy - ty0 as f32).clamp(0.0, 1.0);

        let v = pixel[0] as usize;
        let top = lut_at(&luts, tiles_x, tx0, ty0, v) * (1.0 - wx)
            + lut_at(&luts, tiles_x, tx1, ty0, v) * wx;
        let bottom = lut_at(&luts, tiles_x, tx0, ty1, v) * (1.0 - wx)
            + lut_at(&luts, tiles_x, tx1, ty1, v) * wx;
        let blended = top * (1.0 - wy) + bottom * wy;

        out.put_pixel(x, y, Luma([blended.round().clamp(0.0, 255.0) as u8]));
    }

    out
}

fn lut_at(luts: &[[u8; 256]], tiles_x: u32, tx: u32, ty: u32, value: usize) -> f32 {
    luts[(ty * tiles_x + tx) as usize][value] as f32
}

/// Build one clipped-equalization lookup table per tile.
fn tile_mappings(gray: &GrayImage, tiles_x: u32, tiles_y: u32, clip_limit: f32) -> Vec<[u8; 256]> {
    let (w, h) = gray.dimensions();
    let mut luts = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];

    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            // Even partition: boundaries scale with the image so no tile
            // is ever empty.
            let x0 = tx * w / tiles_x;
            let x1 = (tx + 1) * w / tiles_x;
            let y0 = ty * h / tiles_y;
            let y1 = (ty + 1) * h / tiles_y;
            let area = ((x1 - x0) * (y1 - y0)) as u32;

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[gray.get_pixel(x, y)[0] as usize] += 1;
                }
            }

            clip_histogram(&mut hist, clip_limit, area);

            let lut = &mut luts[(ty * tiles_x + tx) as usize];
            let mut cdf = 0u32;
            for (value, &count) in hist.iter().enumerate() {
                cdf += count;
                lut[value] = ((cdf as f32 * 255.0) / area as f32).round().min(255.0) as u8;
            }
        }
    }

    luts
}

/// Clip histogram bins at `clip_limit` times the uniform height and
/// redistribute the excess evenly across all bins.
fn clip_histogram(hist: &mut [u32; 256], clip_limit: f32, area: u32) {
    let limit = ((clip_limit * area as f32 / 256.0).max(1.0)) as u32;

    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }

    let bonus = excess / 256;
    let remainder = excess as usize % 256;
    for (i, bin) in hist.iter_mut().enumerate() {
        *bin += bonus + u32::from(i < remainder);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_resolution_preserves_aspect_ratio() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(2000, 1000));
        let capped = cap_resolution(img, 1024);
        assert_eq!(capped.width(), 1024);
        assert_eq!(capped.height(), 512);
    }

    #[test]
    fn cap_resolution_leaves_small_images_untouched() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(640, 480));
        let capped = cap_resolution(img, 1024);
        assert_eq!((capped.width(), capped.height()), (640, 480));
    }

    #[test]
    fn clahe_preserves_dimensions() {
        let gray = GrayImage::from_fn(100, 60, |x, y| Luma([((x + y) % 256) as u8]));
        let enhanced = clahe(&gray, 2.0);
        assert_eq!(enhanced.dimensions(), (100, 60));
    }

    #[test]
    fn clahe_on_uniform_image_stays_uniform() {
        // A flat tile has all mass in one bin; after clipping and
        // redistribution the mapping must not invent structure.
        let gray = GrayImage::from_pixel(64, 64, Luma([90u8]));
        let enhanced = clahe(&gray, 2.0);
        let first = enhanced.get_pixel(0, 0)[0];
        assert!(enhanced.pixels().all(|p| p[0] == first));
    }

    #[test]
    fn clahe_stretches_weak_local_contrast() {
        // Left half 100, right half 110: a weak step the equalizer
        // should widen.
        let gray = GrayImage::from_fn(128, 64, |x, _| Luma([if x < 64 { 100 } else { 110 }]));
        let enhanced = clahe(&gray, 4.0);
        let left = enhanced.get_pixel(16, 32)[0] as i32;
        let right = enhanced.get_pixel(112, 32)[0] as i32;
        assert!(
            (right - left).abs() >= 10,
            "contrast not stretched: left={left} right={right}"
        );
    }

    #[test]
    fn read_image_missing_file_is_decode_error() {
        let err = read_image(Path::new("/nonexistent/image.jpg"), 1024).unwrap_err();
        assert!(matches!(err, MaskError::Decode { .. }));
    }
}
