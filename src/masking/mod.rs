pub mod lines;
pub mod preprocessing;
pub mod skeleton;
pub mod steps;

use std::path::PathBuf;

use anyhow::Result;
use image::{DynamicImage, GrayImage};

use crate::config::MaskConfig;
use crate::pipeline::Pipeline;

/// Result of one mask generation: the finished binary mask plus the
/// facts the batch driver records about how it was produced.
pub struct MaskOutcome {
    /// Final mask, values in {0, 255}. Terminal: never re-processed.
    pub mask: GrayImage,
    /// Segments that survived the seam filter.
    pub segments_kept: usize,
    /// Whether the raw edge map substituted for an empty candidate mask.
    pub fallback_used: bool,
}

/// Seam mask generator: runs the full stage chain over one loaded image.
///
/// Holds only the immutable configuration, so one masker can process any
/// number of images with no state carried between them.
pub struct SeamMasker {
    config: MaskConfig,
}

impl SeamMasker {
    pub fn new(config: MaskConfig) -> Self {
        Self { config }
    }

    /// Assemble the stage chain for this configuration.
    pub fn build_pipeline(&self) -> Pipeline {
        use crate::masking::steps::*;

        Pipeline::new()
            .add_step(Box::new(GrayscaleStep))
            .add_step(Box::new(ContrastStep {
                clip_limit: self.config.clahe_clip_limit,
            }))
            .add_step(Box::new(BlurStep {
                sigma: self.config.blur_sigma,
            }))
            .add_step(Box::new(EdgeDetectionStep {
                low_threshold: self.config.canny_low,
                high_threshold: self.config.canny_high,
            }))
            .add_step(Box::new(LineExtractionStep {
                vote_threshold: self.config.vote_threshold,
                min_line_frac: self.config.min_line_frac,
                max_line_gap: self.config.max_line_gap,
            }))
            .add_step(Box::new(FallbackStep))
            .add_step(Box::new(SkeletonStep {
                method: self.config.skeleton_method,
            }))
            .add_step(Box::new(DilationStep {
                radius: self.config.dilate_radius,
            }))
    }

    /// Generate a mask for an already loaded (and resolution-capped)
    /// image.
    pub fn generate(&self, image: DynamicImage) -> Result<MaskOutcome> {
        self.run_pipeline(self.build_pipeline(), image)
    }

    /// Like [`SeamMasker::generate`], additionally dumping every stage's
    /// output into `debug_dir` (which must be empty or non-existent).
    pub fn generate_with_debug(
        &self,
        image: DynamicImage,
        debug_dir: PathBuf,
    ) -> Result<MaskOutcome> {
        let pipeline = self.build_pipeline().with_debug(debug_dir)?;
        self.run_pipeline(pipeline, image)
    }

    fn run_pipeline(&self, pipeline: Pipeline, image: DynamicImage) -> Result<MaskOutcome> {
        let data = pipeline.run(image)?;
        let segments_kept = data.segments_kept.unwrap_or(0);
        let fallback_used = data.fallback_used;
        Ok(MaskOutcome {
            mask: data.into_mask(),
            segments_kept,
            fallback_used,
        })
    }
}
