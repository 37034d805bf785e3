use std::path::PathBuf;

use anyhow::Result;
use image::{DynamicImage, GrayImage};
use tracing::debug;

/// Data that flows through the pipeline.
///
/// The mask generator is a strictly linear chain: each stage consumes the
/// previous stage's working image and produces the next one. Besides the
/// working image the carrier keeps the raw edge map once the edge stage
/// has produced it, because the fallback stage needs it again after line
/// filtering may have discarded everything.
pub struct PipelineData {
    /// The working image for the next stage.
    pub image: DynamicImage,

    /// Edge map captured by the edge-detection stage.
    pub edges: Option<GrayImage>,

    /// Segments that survived the seam filter, once line extraction ran.
    pub segments_kept: Option<usize>,

    /// Whether the fallback selector replaced an empty candidate mask
    /// with the raw edge map.
    pub fallback_used: bool,
}

impl PipelineData {
    /// Wrap a freshly loaded image.
    pub fn from_image(image: DynamicImage) -> Self {
        Self {
            image,
            edges: None,
            segments_kept: None,
            fallback_used: false,
        }
    }

    /// Consume the carrier and return the working image as a single
    /// channel mask.
    pub fn into_mask(self) -> GrayImage {
        self.image.into_luma8()
    }
}

/// Debug configuration: dump every stage's output image to a directory.
#[derive(Clone, Debug)]
pub struct DebugConfig {
    pub output_dir: PathBuf,
}

/// Context available to all pipeline steps.
#[derive(Clone, Debug, Default)]
pub struct PipelineContext {
    pub debug: Option<DebugConfig>,
}

/// Trait that all pipeline stages implement.
pub trait PipelineStep: Send + Sync {
    /// Transform the carrier. Stages must not retain state across calls;
    /// a pipeline may be reused for many images.
    fn process(&self, data: PipelineData, context: &PipelineContext) -> Result<PipelineData>;

    /// Human-readable stage name, used in logs and debug file names.
    fn name(&self) -> &str;
}

/// Composable pipeline: stages run in insertion order.
pub struct Pipeline {
    steps: Vec<Box<dyn PipelineStep>>,
    context: PipelineContext,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            context: PipelineContext::default(),
        }
    }

    /// Enable debug mode with an output directory. The directory must be
    /// empty or non-existent so stage dumps from different runs cannot
    /// mix.
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.context.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    /// Append a processing stage.
    pub fn add_step(mut self, step: Box<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Run all stages over a loaded image and return the final carrier.
    pub fn run(&self, input: DynamicImage) -> Result<PipelineData> {
        self.save_debug(&input, 0, "input")?;

        let mut data = PipelineData::from_image(input);
        for (step_idx, step) in self.steps.iter().enumerate() {
            debug!(stage = step.name(), "running stage");
            data = step.process(data, &self.context)?;
            self.save_debug(&data.image, step_idx + 1, step.name())?;
        }

        Ok(data)
    }

    fn save_debug(&self, image: &DynamicImage, index: usize, name: &str) -> Result<()> {
        let Some(debug_config) = &self.context.debug else {
            return Ok(());
        };

        let file_name = format!("{:02}_{}.png", index, name.to_lowercase().replace(' ', "_"));
        let path = debug_config.output_dir.join(&file_name);
        image
            .save(&path)
            .map_err(|e| anyhow::anyhow!("failed to save debug image {}: {}", path.display(), e))?;
        debug!(file = %path.display(), "saved stage dump");
        Ok(())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
