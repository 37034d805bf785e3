use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::MaskConfig;
use crate::error::MaskError;
use crate::masking::{MaskOutcome, SeamMasker, preprocessing};
use crate::models::{MaskRecord, MaskStatus, PairingReport, SplitReport};

/// Subdirectory of a split holding source photographs.
const IMAGES_SUBDIR: &str = "images";

/// Subdirectory of a split receiving generated masks.
const MASKS_SUBDIR: &str = "masks_clean";

/// Accepted source extensions, matched case-insensitively.
const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Drives the per-image pipeline over a dataset laid out as
/// `<root>/<split>/images/`, writing masks to
/// `<root>/<split>/masks_clean/<stem>.png`.
///
/// A failing image is logged, recorded, and skipped; a batch never
/// aborts because of a single bad input.
pub struct BatchDriver {
    root: PathBuf,
    config: MaskConfig,
    debug_root: Option<PathBuf>,
}

impl BatchDriver {
    pub fn new(root: PathBuf, config: MaskConfig) -> Self {
        Self {
            root,
            config,
            debug_root: None,
        }
    }

    /// Dump per-stage images for every processed input under
    /// `<dir>/<split>/<stem>/`.
    pub fn with_debug_root(mut self, dir: PathBuf) -> Self {
        self.debug_root = Some(dir);
        self
    }

    /// Process every image of one split, in file-name order.
    pub fn process_split(&self, split: &str) -> Result<SplitReport> {
        let images_dir = self.root.join(split).join(IMAGES_SUBDIR);
        let masks_dir = self.root.join(split).join(MASKS_SUBDIR);

        // The masks directory exists even for an empty split, so
        // downstream consumers can rely on the layout.
        fs::create_dir_all(&masks_dir)
            .with_context(|| format!("creating mask directory {}", masks_dir.display()))?;

        let images = list_images(&images_dir)?;
        if images.is_empty() {
            warn!(split, dir = %images_dir.display(), "no images in split");
        } else {
            info!(split, count = images.len(), "processing split");
        }

        let masker = SeamMasker::new(self.config.clone());
        let records: Vec<MaskRecord> = images
            .iter()
            .map(|path| self.process_image(&masker, split, path, &masks_dir))
            .collect();

        let report = SplitReport {
            split: split.to_string(),
            records,
        };
        info!(
            split,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "split complete"
        );
        Ok(report)
    }

    /// Verify every image of a split has a mask paired by file stem.
    pub fn check_split(&self, split: &str) -> Result<PairingReport> {
        let images_dir = self.root.join(split).join(IMAGES_SUBDIR);
        let masks_dir = self.root.join(split).join(MASKS_SUBDIR);

        let images = list_images(&images_dir)?;
        let mask_stems: HashSet<String> = list_images(&masks_dir)
            .unwrap_or_default()
            .iter()
            .filter_map(|p| file_stem(p))
            .collect();

        let missing_masks: Vec<String> = images
            .iter()
            .filter(|p| !file_stem(p).is_some_and(|stem| mask_stems.contains(&stem)))
            .filter_map(|p| file_name(p))
            .collect();

        Ok(PairingReport {
            split: split.to_string(),
            total_images: images.len(),
            missing_masks,
        })
    }

    /// Run the full pipeline for one image. Every failure becomes a
    /// record, never an error: the batch must continue.
    fn process_image(
        &self,
        masker: &SeamMasker,
        split: &str,
        path: &Path,
        masks_dir: &Path,
    ) -> MaskRecord {
        let image_name = file_name(path).unwrap_or_else(|| path.display().to_string());
        let Some(stem) = file_stem(path) else {
            return MaskRecord::failed(
                image_name,
                MaskStatus::DecodeFailed,
                "file name has no stem".to_string(),
            );
        };

        let image = match preprocessing::read_image(path, self.config.max_width) {
            Ok(image) => image,
            Err(e) => {
                warn!(image = %image_name, error = %e, "decode failed");
                return MaskRecord::failed(image_name, MaskStatus::DecodeFailed, e.to_string());
            }
        };

        let outcome = match self.generate(masker, split, &stem, image) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(image = %image_name, error = %e, "pipeline failed");
                return MaskRecord::failed(image_name, MaskStatus::PipelineFailed, e.to_string());
            }
        };

        let mask_name = format!("{stem}.png");
        let mask_path = masks_dir.join(&mask_name);
        if let Err(e) = outcome.mask.save(&mask_path) {
            // Never leave a partial mask behind.
            let _ = fs::remove_file(&mask_path);
            let write_error = MaskError::Write {
                path: mask_path,
                source: e,
            };
            warn!(image = %image_name, error = %write_error, "write failed");
            return MaskRecord::failed(image_name, MaskStatus::WriteFailed, write_error.to_string());
        }

        info!(
            image = %image_name,
            mask = %mask_name,
            segments = outcome.segments_kept,
            fallback = outcome.fallback_used,
            "mask written"
        );
        MaskRecord::generated(image_name, mask_name)
    }

    fn generate(
        &self,
        masker: &SeamMasker,
        split: &str,
        stem: &str,
        image: image::DynamicImage,
    ) -> Result<MaskOutcome> {
        match &self.debug_root {
            Some(debug_root) => {
                masker.generate_with_debug(image, debug_root.join(split).join(stem))
            }
            None => masker.generate(image),
        }
    }
}

/// Enumerate image files in a directory, sorted by file name so batch
/// order (and therefore logs and reports) is reproducible.
fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("reading image directory {}", dir.display()))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && has_image_extension(p))
        .collect();
    paths.sort();
    Ok(paths)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let lower = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&lower.as_str())
        })
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}
