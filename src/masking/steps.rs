use anyhow::Result;
use image::DynamicImage;
use tracing::debug;

use crate::masking::{lines, preprocessing, skeleton};
use crate::pipeline::{PipelineContext, PipelineData, PipelineStep};

/// Convert the working image to grayscale.
pub struct GrayscaleStep;

impl PipelineStep for GrayscaleStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let gray = preprocessing::to_grayscale(&data.image);
        data.image = DynamicImage::ImageLuma8(gray);
        Ok(data)
    }

    fn name(&self) -> &str {
        "Grayscale"
    }
}

/// Tile-local adaptive contrast enhancement, so weak seam edges become
/// comparable in magnitude to specular highlights.
pub struct ContrastStep {
    pub clip_limit: f32,
}

impl PipelineStep for ContrastStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let gray = data.image.to_luma8();
        let enhanced = preprocessing::clahe(&gray, self.clip_limit);
        data.image = DynamicImage::ImageLuma8(enhanced);
        Ok(data)
    }

    fn name(&self) -> &str {
        "Contrast Enhancement"
    }
}

/// Gaussian smoothing before gradient computation.
pub struct BlurStep {
    pub sigma: f32,
}

impl PipelineStep for BlurStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let gray = data.image.to_luma8();
        let blurred = preprocessing::apply_blur(&gray, self.sigma);
        data.image = DynamicImage::ImageLuma8(blurred);
        Ok(data)
    }

    fn name(&self) -> &str {
        "Gaussian Blur"
    }
}

/// Canny edge detection. The edge map is also retained on the carrier
/// for the fallback stage.
pub struct EdgeDetectionStep {
    pub low_threshold: f32,
    pub high_threshold: f32,
}

impl PipelineStep for EdgeDetectionStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let gray = data.image.to_luma8();
        let edges = preprocessing::detect_edges(&gray, self.low_threshold, self.high_threshold);
        data.edges = Some(edges.clone());
        data.image = DynamicImage::ImageLuma8(edges);
        Ok(data)
    }

    fn name(&self) -> &str {
        "Edge Detection"
    }
}

/// Fit line segments to the edge map, keep seam candidates, and
/// rasterize them onto a fresh mask.
pub struct LineExtractionStep {
    pub vote_threshold: u32,
    pub min_line_frac: f32,
    pub max_line_gap: u32,
}

impl PipelineStep for LineExtractionStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let edges = data.image.to_luma8();
        let (width, height) = edges.dimensions();
        let min_length = (width.min(height) as f32 * self.min_line_frac) as u32;

        let candidates =
            lines::extract_segments(&edges, self.vote_threshold, min_length, self.max_line_gap);
        let total = candidates.len();
        let seams = lines::filter_seam_segments(candidates, width);
        debug!(candidates = total, kept = seams.len(), "segments filtered");

        data.segments_kept = Some(seams.len());
        data.image = DynamicImage::ImageLuma8(lines::rasterize_segments(&seams, width, height));
        Ok(data)
    }

    fn name(&self) -> &str {
        "Line Extraction"
    }
}

/// Fail-open selector: when no segment survived filtering, the raw edge
/// map becomes the candidate mask. An over-inclusive mask beats an empty
/// training label.
pub struct FallbackStep;

impl PipelineStep for FallbackStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let mask = data.image.to_luma8();
        if lines::mask_is_empty(&mask) {
            if let Some(edges) = &data.edges {
                debug!("candidate mask empty, substituting raw edge map");
                data.image = DynamicImage::ImageLuma8(edges.clone());
                data.fallback_used = true;
            }
        }
        Ok(data)
    }

    fn name(&self) -> &str {
        "Fallback Selection"
    }
}

/// Thin the candidate mask to a 1-pixel centerline.
pub struct SkeletonStep {
    pub method: skeleton::SkeletonMethod,
}

impl PipelineStep for SkeletonStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let mask = data.image.to_luma8();
        data.image = DynamicImage::ImageLuma8(skeleton::skeletonize(&mask, self.method));
        Ok(data)
    }

    fn name(&self) -> &str {
        "Skeletonization"
    }
}

/// Widen the skeleton for training-label tolerance and binarize to
/// {0, 255}.
pub struct DilationStep {
    pub radius: u32,
}

impl PipelineStep for DilationStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let mask = data.image.to_luma8();
        data.image = DynamicImage::ImageLuma8(skeleton::dilate_mask(&mask, self.radius));
        Ok(data)
    }

    fn name(&self) -> &str {
        "Dilation"
    }
}
