pub mod batch;
pub mod config;
pub mod error;
pub mod masking;
pub mod models;
pub mod pipeline;

pub use batch::BatchDriver;
pub use config::MaskConfig;
pub use error::MaskError;
pub use masking::skeleton::SkeletonMethod;
pub use masking::{MaskOutcome, SeamMasker};
pub use models::{LineSegment, MaskRecord, MaskStatus, PairingReport, SplitReport};
pub use pipeline::{DebugConfig, Pipeline, PipelineContext, PipelineData, PipelineStep};
