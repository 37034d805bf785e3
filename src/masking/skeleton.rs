use clap::ValueEnum;
use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate, erode};
use serde::Serialize;

/// Thinning algorithm used to reduce a candidate mask to a 1-pixel
/// centerline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SkeletonMethod {
    /// Zhang-Suen iterative thinning. Preferred: preserves topology and
    /// converges to single-pixel strokes.
    ZhangSuen,
    /// Iterative morphological skeleton built from erosions with a cross
    /// element. Portable fallback with the same contract.
    Morphological,
}

/// Thin a candidate mask to a 1-pixel-wide centerline.
///
/// Any nonzero input pixel counts as foreground (anti-aliased strokes
/// carry intermediate values); output is strictly {0, 255}.
pub fn skeletonize(mask: &GrayImage, method: SkeletonMethod) -> GrayImage {
    match method {
        SkeletonMethod::ZhangSuen => thin_zhang_suen(mask),
        SkeletonMethod::Morphological => morphological_skeleton(mask),
    }
}

/// Widen a skeleton by `radius` using a disc structuring element of
/// diameter `2 * radius + 1`, one iteration, then hard-binarize.
pub fn dilate_mask(mask: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return binarize(mask);
    }
    binarize(&dilate(&binarize(mask), Norm::L2, radius as u8))
}

/// Zhang-Suen thinning: alternate two sub-iterations deleting boundary
/// pixels whose neighborhood keeps the stroke connected, until a full
/// pass deletes nothing.
pub fn thin_zhang_suen(mask: &GrayImage) -> GrayImage {
    let (w, h) = mask.dimensions();
    let mut grid: Vec<bool> = mask.pixels().map(|p| p[0] > 0).collect();

    loop {
        let removed = thin_pass(&mut grid, w, h, true) + thin_pass(&mut grid, w, h, false);
        if removed == 0 {
            break;
        }
    }

    let mut out = GrayImage::new(w, h);
    for (pixel, &on) in out.pixels_mut().zip(grid.iter()) {
        pixel.0[0] = if on { 255 } else { 0 };
    }
    out
}

/// One Zhang-Suen sub-iteration. Returns the number of deleted pixels.
fn thin_pass(grid: &mut [bool], w: u32, h: u32, first_subiteration: bool) -> usize {
    let at = |grid: &[bool], x: i64, y: i64| -> bool {
        x >= 0 && y >= 0 && x < w as i64 && y < h as i64 && grid[(y * w as i64 + x) as usize]
    };

    let mut to_clear = Vec::new();
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            if !at(grid, x, y) {
                continue;
            }

            // Neighbors p2..p9, clockwise from north.
            let p = [
                at(grid, x, y - 1),
                at(grid, x + 1, y - 1),
                at(grid, x + 1, y),
                at(grid, x + 1, y + 1),
                at(grid, x, y + 1),
                at(grid, x - 1, y + 1),
                at(grid, x - 1, y),
                at(grid, x - 1, y - 1),
            ];

            let neighbors = p.iter().filter(|&&v| v).count();
            if !(2..=6).contains(&neighbors) {
                continue;
            }

            // Transitions from background to foreground around the ring.
            let transitions = (0..8).filter(|&i| !p[i] && p[(i + 1) % 8]).count();
            if transitions != 1 {
                continue;
            }

            // p2*p4*p6 == 0 and p4*p6*p8 == 0 (first sub-iteration);
            // p2*p4*p8 == 0 and p2*p6*p8 == 0 (second).
            let (a, b) = if first_subiteration {
                (p[0] && p[2] && p[4], p[2] && p[4] && p[6])
            } else {
                (p[0] && p[2] && p[6], p[0] && p[4] && p[6])
            };
            if a || b {
                continue;
            }

            to_clear.push((y * w as i64 + x) as usize);
        }
    }

    for &idx in &to_clear {
        grid[idx] = false;
    }
    to_clear.len()
}

/// Morphological skeleton: repeatedly erode with a 3x3 cross element,
/// open the eroded image back up, and collect the boundary pixels the
/// erosion removed, until the working image is empty.
pub fn morphological_skeleton(mask: &GrayImage) -> GrayImage {
    let (w, h) = mask.dimensions();
    let mut working = binarize(mask);
    let mut skeleton = GrayImage::new(w, h);

    while !super::lines::mask_is_empty(&working) {
        // Norm::L1 radius 1 is the cross-shaped structuring element.
        let eroded = erode(&working, Norm::L1, 1);
        if eroded.as_raw() == working.as_raw() {
            // Erosion stalled (foreground with no in-frame background);
            // keep what remains as skeleton rather than loop forever.
            for (skel, current) in skeleton.pixels_mut().zip(working.pixels()) {
                if current[0] > 0 {
                    skel.0[0] = 255;
                }
            }
            break;
        }
        let opened = dilate(&eroded, Norm::L1, 1);

        for ((skel, current), open) in skeleton
            .pixels_mut()
            .zip(working.pixels())
            .zip(opened.pixels())
        {
            if current[0] > 0 && open[0] == 0 {
                skel.0[0] = 255;
            }
        }

        working = eroded;
    }

    skeleton
}

/// Hard-binarize: any nonzero value becomes 255.
pub fn binarize(mask: &GrayImage) -> GrayImage {
    let mut out = mask.clone();
    for pixel in out.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > 0 { 255 } else { 0 };
    }
    out
}

#[cfg(test)]
mod tests {
    use image::Luma;

    use super::*;

    /// A thick horizontal bar through the middle of a small canvas.
    fn horizontal_bar(w: u32, h: u32, y0: u32, y1: u32) -> GrayImage {
        let mut mask = GrayImage::new(w, h);
        for y in y0..y1 {
            for x in 5..w - 5 {
                mask.put_pixel(x, y, Luma([255u8]));
            }
        }
        mask
    }

    fn column_width(mask: &GrayImage, x: u32) -> u32 {
        (0..mask.height()).filter(|&y| mask.get_pixel(x, y)[0] > 0).count() as u32
    }

    fn count_nonzero(mask: &GrayImage) -> usize {
        mask.pixels().filter(|p| p[0] > 0).count()
    }

    #[test]
    fn zhang_suen_thins_bar_to_single_pixel_width() {
        let bar = horizontal_bar(100, 40, 15, 22);
        let skeleton = thin_zhang_suen(&bar);

        assert!(count_nonzero(&skeleton) > 0);
        for x in 10..90 {
            assert!(
                column_width(&skeleton, x) <= 1,
                "column {x} wider than one pixel"
            );
        }
    }

    #[test]
    fn zhang_suen_keeps_stroke_connected() {
        let bar = horizontal_bar(100, 40, 15, 22);
        let skeleton = thin_zhang_suen(&bar);

        // Every interior skeleton column must still be populated; a break
        // would disconnect the seam line.
        let first = (0..100).find(|&x| column_width(&skeleton, x) > 0).unwrap();
        let last = (0..100).rev().find(|&x| column_width(&skeleton, x) > 0).unwrap();
        for x in first..=last {
            assert!(column_width(&skeleton, x) > 0, "stroke broken at column {x}");
        }
    }

    #[test]
    fn morphological_skeleton_spans_the_bar() {
        let bar = horizontal_bar(100, 40, 15, 22);
        let skeleton = morphological_skeleton(&bar);

        assert!(count_nonzero(&skeleton) > 0);
        let populated: Vec<u32> = (0..100).filter(|&x| column_width(&skeleton, x) > 0).collect();
        assert!(populated.len() > 60, "skeleton lost most of the bar");
    }

    #[test]
    fn both_methods_agree_on_fixture_extent() {
        // The two thinning paths must produce topologically equivalent
        // output: same horizontal extent, both thin, both nonempty.
        let bar = horizontal_bar(120, 50, 20, 27);

        let zs = thin_zhang_suen(&bar);
        let morph = morphological_skeleton(&bar);

        let extent = |m: &GrayImage| {
            let first = (0..120).find(|&x| column_width(m, x) > 0).unwrap();
            let last = (0..120).rev().find(|&x| column_width(m, x) > 0).unwrap();
            (first, last)
        };
        let (zs_first, zs_last) = extent(&zs);
        let (m_first, m_last) = extent(&morph);

        assert!((zs_first as i32 - m_first as i32).abs() <= 4);
        assert!((zs_last as i32 - m_last as i32).abs() <= 4);
    }

    #[test]
    fn skeleton_of_empty_mask_is_empty() {
        let empty = GrayImage::new(64, 64);
        assert_eq!(count_nonzero(&thin_zhang_suen(&empty)), 0);
        assert_eq!(count_nonzero(&morphological_skeleton(&empty)), 0);
    }

    #[test]
    fn skeleton_binarizes_antialiased_input() {
        let mut mask = GrayImage::new(64, 64);
        for x in 5..59 {
            mask.put_pixel(x, 30, Luma([255u8]));
            mask.put_pixel(x, 31, Luma([120u8]));
            mask.put_pixel(x, 29, Luma([40u8]));
        }
        let skeleton = skeletonize(&mask, SkeletonMethod::ZhangSuen);
        assert!(skeleton.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert!(count_nonzero(&skeleton) > 0);
    }

    #[test]
    fn dilation_grows_monotonically_with_radius() {
        let mut mask = GrayImage::new(64, 64);
        for x in 10..54 {
            mask.put_pixel(x, 32, Luma([255u8]));
        }

        let r1 = dilate_mask(&mask, 1);
        let r2 = dilate_mask(&mask, 3);

        for (a, b) in r1.pixels().zip(r2.pixels()) {
            assert!(b[0] >= a[0], "larger radius lost a pixel");
        }
        assert!(count_nonzero(&r2) > count_nonzero(&r1));
    }

    #[test]
    fn dilate_mask_output_is_binary() {
        let mut mask = GrayImage::new(32, 32);
        mask.put_pixel(16, 16, Luma([90u8]));
        let dilated = dilate_mask(&mask, 2);
        assert!(dilated.pixels().all(|p| p[0] == 0 || p[0] == 255));
        // A single pixel dilated by radius 2 covers the disc around it.
        assert!(dilated.get_pixel(16, 18)[0] == 255);
        assert!(dilated.get_pixel(18, 16)[0] == 255);
        assert!(dilated.get_pixel(16, 16)[0] == 255);
    }

    #[test]
    fn dilate_radius_zero_only_binarizes() {
        let mut mask = GrayImage::new(16, 16);
        mask.put_pixel(8, 8, Luma([7u8]));
        let out = dilate_mask(&mask, 0);
        assert_eq!(out.get_pixel(8, 8)[0], 255);
        assert_eq!(count_nonzero(&out), 1);
    }
}
