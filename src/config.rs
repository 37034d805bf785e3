use serde::Serialize;

use crate::masking::skeleton::SkeletonMethod;

/// Tunable parameters for one mask-generation run.
///
/// A config is read once when a run starts and never mutated while images
/// are being processed, so concurrent pipeline invocations can share a
/// clone freely.
#[derive(Debug, Clone, Serialize)]
pub struct MaskConfig {
    /// Longest side allowed into the pipeline; larger inputs are
    /// downscaled preserving aspect ratio.
    pub max_width: u32,
    /// Canny hysteresis low threshold.
    pub canny_low: f32,
    /// Canny hysteresis high threshold.
    pub canny_high: f32,
    /// Accumulator votes required before a line is considered a candidate.
    pub vote_threshold: u32,
    /// Minimum segment length as a fraction of `min(height, width)`.
    pub min_line_frac: f32,
    /// Largest run of missing edge pixels bridged within one segment.
    pub max_line_gap: u32,
    /// Radius of the elliptical dilation applied to the final skeleton.
    pub dilate_radius: u32,
    /// Clip limit for the adaptive contrast enhancement.
    pub clahe_clip_limit: f32,
    /// Sigma of the Gaussian smoothing applied before edge detection.
    pub blur_sigma: f32,
    /// Thinning algorithm used by the skeletonizer.
    pub skeleton_method: SkeletonMethod,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            max_width: 1024,
            canny_low: 50.0,
            canny_high: 150.0,
            vote_threshold: 60,
            min_line_frac: 0.15,
            max_line_gap: 10,
            dilate_radius: 2,
            clahe_clip_limit: 2.0,
            blur_sigma: 0.8,
            skeleton_method: SkeletonMethod::ZhangSuen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_surface() {
        let config = MaskConfig::default();
        assert_eq!(config.max_width, 1024);
        assert_eq!((config.canny_low, config.canny_high), (50.0, 150.0));
        assert_eq!(config.vote_threshold, 60);
        assert_eq!(config.min_line_frac, 0.15);
        assert_eq!(config.max_line_gap, 10);
        assert_eq!(config.dilate_radius, 2);
        assert_eq!(config.skeleton_method, SkeletonMethod::ZhangSuen);
    }
}
