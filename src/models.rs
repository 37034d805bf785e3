use serde::Serialize;

/// A straight line segment fitted to the edge map, endpoints in pixel
/// coordinates.
///
/// Endpoints are normalized on construction so that `x1 <= x2` (ties
/// broken by `y`), which keeps the segment angle well-defined in
/// [-90, 90] degrees regardless of the direction the extractor walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSegment {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl LineSegment {
    pub fn new(a: (i32, i32), b: (i32, i32)) -> Self {
        let ((x1, y1), (x2, y2)) = if (a.0, a.1) <= (b.0, b.1) { (a, b) } else { (b, a) };
        Self { x1, y1, x2, y2 }
    }

    pub fn length(&self) -> f32 {
        let dx = (self.x2 - self.x1) as f32;
        let dy = (self.y2 - self.y1) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    /// X coordinate of the segment midpoint.
    pub fn midpoint_x(&self) -> f32 {
        (self.x1 + self.x2) as f32 / 2.0
    }

    /// Angle from the horizontal axis in degrees, in [-90, 90].
    pub fn angle_degrees(&self) -> f32 {
        let dy = (self.y2 - self.y1) as f32;
        let dx = (self.x2 - self.x1) as f32;
        dy.atan2(dx).to_degrees()
    }
}

/// Outcome of one image's trip through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskStatus {
    /// Mask generated and written.
    Generated,
    /// Source image unreadable or corrupt.
    DecodeFailed,
    /// A pipeline stage failed after a successful decode.
    PipelineFailed,
    /// Mask could not be written to the destination.
    WriteFailed,
}

/// Structured per-image result record collected by the batch driver.
#[derive(Debug, Clone, Serialize)]
pub struct MaskRecord {
    /// Source image file name.
    pub image: String,
    /// Mask file name, present only when the full pipeline completed.
    pub mask: Option<String>,
    pub status: MaskStatus,
    /// Failure reason, when there is one.
    pub detail: Option<String>,
}

impl MaskRecord {
    pub fn generated(image: String, mask: String) -> Self {
        Self {
            image,
            mask: Some(mask),
            status: MaskStatus::Generated,
            detail: None,
        }
    }

    pub fn failed(image: String, status: MaskStatus, detail: String) -> Self {
        Self {
            image,
            mask: None,
            status,
            detail: Some(detail),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == MaskStatus::Generated
    }
}

/// Per-split summary of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct SplitReport {
    pub split: String,
    pub records: Vec<MaskRecord>,
}

impl SplitReport {
    pub fn succeeded(&self) -> usize {
        self.records.iter().filter(|r| r.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.records.len() - self.succeeded()
    }
}

/// Result of the stem-based image/mask pairing check for one split.
#[derive(Debug, Clone, Serialize)]
pub struct PairingReport {
    pub split: String,
    pub total_images: usize,
    /// Image file names with no mask sharing their stem.
    pub missing_masks: Vec<String>,
}

impl PairingReport {
    pub fn is_complete(&self) -> bool {
        self.missing_masks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_endpoints_are_normalized() {
        let seg = LineSegment::new((100, 20), (10, 40));
        assert_eq!((seg.x1, seg.y1), (10, 40));
        assert_eq!((seg.x2, seg.y2), (100, 20));
    }

    #[test]
    fn angle_is_direction_independent() {
        let a = LineSegment::new((0, 0), (100, 50));
        let b = LineSegment::new((100, 50), (0, 0));
        assert_eq!(a.angle_degrees(), b.angle_degrees());
        assert!((a.angle_degrees() - 26.565).abs() < 0.01);
    }

    #[test]
    fn horizontal_segment_has_zero_angle() {
        let seg = LineSegment::new((5, 10), (50, 10));
        assert_eq!(seg.angle_degrees(), 0.0);
        assert_eq!(seg.length(), 45.0);
        assert_eq!(seg.midpoint_x(), 27.5);
    }
}
