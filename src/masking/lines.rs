use image::{GrayImage, Luma};
use imageproc::drawing::draw_antialiased_line_segment_mut;
use imageproc::hough::{LineDetectionOptions, PolarLine, detect_lines};
use imageproc::pixelops::interpolate;

use crate::models::LineSegment;

/// Half-width of the horizontal band around the image center where a seam
/// midpoint may lie, as a fraction of image width. Camera-rig constant:
/// the fixture frames the joint near the vertical center line.
pub const CENTER_BAND_FRAC: f32 = 0.4;

/// Largest absolute segment angle, in degrees from horizontal, accepted
/// as a seam candidate. Camera-rig constant: seams run near-horizontal in
/// frame.
pub const MAX_SEAM_ANGLE_DEG: f32 = 45.0;

/// Non-maximum suppression radius for accumulator peaks; keeps
/// near-duplicate votes from yielding stacks of parallel lines.
const SUPPRESSION_RADIUS: u32 = 8;

/// Perpendicular tolerance, in pixels, when matching edge pixels to a
/// voted line. Edge chains rarely sit exactly on the rasterized line.
const BAND_HALF_WIDTH: i32 = 1;

/// Extract straight line segments from a binary edge map.
///
/// The Hough accumulator votes for candidate lines; every line that
/// clears `vote_threshold` is then walked across the image in scan order,
/// collecting runs of edge pixels. Runs may bridge gaps of up to
/// `max_gap` pixels; runs shorter than `min_length` are discarded. The
/// walk order is fixed, so output is deterministic for a given input.
pub fn extract_segments(
    edges: &GrayImage,
    vote_threshold: u32,
    min_length: u32,
    max_gap: u32,
) -> Vec<LineSegment> {
    let options = LineDetectionOptions {
        vote_threshold,
        suppression_radius: SUPPRESSION_RADIUS,
    };

    let mut segments = Vec::new();
    for line in detect_lines(edges, options) {
        trace_segments_along(edges, &line, min_length, max_gap, &mut segments);
    }
    segments
}

/// Walk one voted line across the image, emitting edge-pixel runs as
/// segments.
fn trace_segments_along(
    edges: &GrayImage,
    line: &PolarLine,
    min_length: u32,
    max_gap: u32,
    out: &mut Vec<LineSegment>,
) {
    let (w, h) = edges.dimensions();
    let theta = (line.angle_in_degrees as f32).to_radians();
    let (sin_t, cos_t) = theta.sin_cos();

    // The line satisfies x*cos(theta) + y*sin(theta) = r. Walk along its
    // direction vector from a point on the line.
    let origin = (line.r * cos_t, line.r * sin_t);
    let dir = (-sin_t, cos_t);
    let reach = ((w as f32).powi(2) + (h as f32).powi(2)).sqrt().ceil() as i32;

    let point_at = |t: i32| {
        let x = origin.0 + t as f32 * dir.0;
        let y = origin.1 + t as f32 * dir.1;
        (x, y)
    };

    let mut run_start: Option<i32> = None;
    let mut last_hit = 0i32;

    for t in -reach..=reach {
        let (x, y) = point_at(t);
        let hit = edge_near(edges, x, y, cos_t, sin_t);

        if hit {
            if run_start.is_none() {
                run_start = Some(t);
            }
            last_hit = t;
        } else if let Some(start) = run_start {
            if t - last_hit > max_gap as i32 {
                emit_run(&point_at, start, last_hit, min_length, out);
                run_start = None;
            }
        }
    }

    if let Some(start) = run_start {
        emit_run(&point_at, start, last_hit, min_length, out);
    }
}

fn emit_run(
    point_at: &impl Fn(i32) -> (f32, f32),
    start: i32,
    end: i32,
    min_length: u32,
    out: &mut Vec<LineSegment>,
) {
    if (end - start) < min_length as i32 {
        return;
    }
    let (x1, y1) = point_at(start);
    let (x2, y2) = point_at(end);
    out.push(LineSegment::new(
        (x1.round() as i32, y1.round() as i32),
        (x2.round() as i32, y2.round() as i32),
    ));
}

/// True if an edge pixel lies within `BAND_HALF_WIDTH` of (x, y) along
/// the line normal.
fn edge_near(edges: &GrayImage, x: f32, y: f32, cos_t: f32, sin_t: f32) -> bool {
    let (w, h) = edges.dimensions();
    for offset in -BAND_HALF_WIDTH..=BAND_HALF_WIDTH {
        let px = (x + offset as f32 * cos_t).round();
        let py = (y + offset as f32 * sin_t).round();
        if px < 0.0 || py < 0.0 || px >= w as f32 || py >= h as f32 {
            continue;
        }
        if edges.get_pixel(px as u32, py as u32)[0] > 0 {
            return true;
        }
    }
    false
}

/// Seam filter: a candidate must sit near the horizontal center of the
/// frame and run near-horizontal.
pub fn is_seam_candidate(segment: &LineSegment, image_width: u32) -> bool {
    let center_x = image_width as f32 / 2.0;
    let within_band = (segment.midpoint_x() - center_x).abs() < image_width as f32 * CENTER_BAND_FRAC;
    let near_horizontal = segment.angle_degrees().abs() <= MAX_SEAM_ANGLE_DEG;
    within_band && near_horizontal
}

/// Apply the seam filter to a batch of candidates.
pub fn filter_seam_segments(segments: Vec<LineSegment>, image_width: u32) -> Vec<LineSegment> {
    segments
        .into_iter()
        .filter(|s| is_seam_candidate(s, image_width))
        .collect()
}

/// Rasterize segments onto a fresh zero mask, each as an anti-aliased
/// 1-pixel stroke. Overlapping strokes simply accumulate; any nonzero
/// pixel counts as foreground downstream.
pub fn rasterize_segments(segments: &[LineSegment], width: u32, height: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    for segment in segments {
        draw_antialiased_line_segment_mut(
            &mut mask,
            (segment.x1, segment.y1),
            (segment.x2, segment.y2),
            Luma([255u8]),
            interpolate,
        );
    }
    mask
}

/// True if the mask holds no foreground at all.
pub fn mask_is_empty(mask: &GrayImage) -> bool {
    mask.pixels().all(|p| p[0] == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge_map_with_row(w: u32, h: u32, y: u32, x_range: std::ops::Range<u32>) -> GrayImage {
        let mut edges = GrayImage::new(w, h);
        for x in x_range {
            edges.put_pixel(x, y, Luma([255u8]));
        }
        edges
    }

    #[test]
    fn horizontal_line_yields_near_horizontal_segment() {
        let edges = edge_map_with_row(200, 100, 50, 10..190);
        let segments = extract_segments(&edges, 60, 30, 10);

        assert!(!segments.is_empty(), "no segments extracted");
        let longest = segments
            .iter()
            .max_by(|a, b| a.length().total_cmp(&b.length()))
            .unwrap();
        assert!(longest.length() > 150.0, "run too short: {:?}", longest);
        assert!(longest.angle_degrees().abs() < 5.0);
        assert!((longest.y1 - 50).abs() <= 1 && (longest.y2 - 50).abs() <= 1);
    }

    #[test]
    fn gap_below_limit_is_bridged() {
        let mut edges = edge_map_with_row(200, 100, 50, 10..80);
        for x in 86..150 {
            edges.put_pixel(x, 50, Luma([255u8]));
        }
        let segments = extract_segments(&edges, 60, 30, 10);

        let longest = segments
            .iter()
            .max_by(|a, b| a.length().total_cmp(&b.length()))
            .expect("no segments extracted");
        assert!(
            longest.length() > 130.0,
            "gap not bridged into one run: {:?}",
            longest
        );
    }

    #[test]
    fn gap_above_limit_splits_runs() {
        let mut edges = edge_map_with_row(400, 100, 50, 10..110);
        for x in 150..300 {
            edges.put_pixel(x, 50, Luma([255u8]));
        }
        let segments = extract_segments(&edges, 60, 30, 10);

        // The 40 pixel hole exceeds the max gap, so no single run may span
        // both halves.
        assert!(segments.iter().all(|s| s.length() < 250.0));
        assert!(segments.len() >= 2);
    }

    #[test]
    fn short_runs_are_discarded() {
        let edges = edge_map_with_row(200, 100, 50, 90..110);
        // 20 px of edges cannot clear a 60 vote threshold, and even with a
        // tiny threshold the run is below min_length.
        let segments = extract_segments(&edges, 10, 30, 10);
        assert!(segments.is_empty());
    }

    #[test]
    fn seam_filter_rejects_vertical_segments() {
        let vertical = LineSegment::new((100, 10), (100, 90));
        assert!(!is_seam_candidate(&vertical, 200));
    }

    #[test]
    fn seam_filter_rejects_off_center_segments() {
        // Midpoint at x=10 on a 200 wide image: 90 from center > 80 band.
        let far_left = LineSegment::new((0, 50), (20, 50));
        assert!(!is_seam_candidate(&far_left, 200));
    }

    #[test]
    fn seam_filter_accepts_centered_horizontal_segment() {
        let seam = LineSegment::new((40, 52), (160, 48));
        assert!(is_seam_candidate(&seam, 200));
    }

    #[test]
    fn steep_diagonal_inside_angle_window_is_accepted() {
        // atan2(39, 40) is just over 44 degrees, inside the +-45 window.
        let diagonal = LineSegment::new((80, 80), (120, 119));
        assert!(is_seam_candidate(&diagonal, 200));
    }

    #[test]
    fn diagonal_beyond_angle_window_is_rejected() {
        // atan2(50, 30) is about 59 degrees.
        let steep = LineSegment::new((85, 40), (115, 90));
        assert!(!is_seam_candidate(&steep, 200));
    }

    #[test]
    fn rasterized_segments_cover_their_span() {
        let segments = vec![LineSegment::new((10, 50), (190, 50))];
        let mask = rasterize_segments(&segments, 200, 100);

        assert!(!mask_is_empty(&mask));
        for x in 10..=190 {
            let lit = (49..=51).any(|y| mask.get_pixel(x, y)[0] > 0);
            assert!(lit, "no stroke at x={x}");
        }
    }

    #[test]
    fn empty_segment_list_rasterizes_to_zero_mask() {
        let mask = rasterize_segments(&[], 64, 64);
        assert!(mask_is_empty(&mask));
    }
}
