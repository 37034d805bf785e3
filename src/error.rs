use std::path::PathBuf;

use thiserror::Error;

/// Failures that are fatal for a single image but never for the batch.
///
/// An empty candidate mask is not an error: the fallback selector resolves
/// it internally and the pipeline still produces a mask.
#[derive(Debug, Error)]
pub enum MaskError {
    /// The source image is missing, corrupt, or in an unsupported format.
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The finished mask could not be written to the destination.
    #[error("failed to write mask {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}
