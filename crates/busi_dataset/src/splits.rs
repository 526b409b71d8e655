//! Train/test manifest generation from a class-per-directory image tree.

use crate::labels::{BusiLabel, BUSI_LABELS};
use crate::manifest::{manifest_field, write_manifest, Sample};
use crate::types::{DatasetError, DatasetResult};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const TRAIN_MANIFEST_NAME: &str = "train_sample.txt";
pub const TEST_MANIFEST_NAME: &str = "test_sample.txt";

#[derive(Debug, Clone)]
pub struct SplitOptions {
    /// Images per class routed to the test manifest.
    pub test_samples_per_class: usize,
    /// File extensions to collect (case-insensitive, without dot).
    pub extensions: Vec<String>,
    /// Any path below the image root containing this substring is treated as
    /// a mask and skipped.
    pub mask_marker: String,
    /// Seed for reproducible shuffling; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            test_samples_per_class: 40,
            extensions: vec!["bmp".to_string()],
            mask_marker: "mask".to_string(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassCounts {
    pub train: usize,
    pub test: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SplitSummary {
    pub train_manifest: PathBuf,
    pub test_manifest: PathBuf,
    pub per_class: BTreeMap<String, ClassCounts>,
    pub skipped_masks: usize,
    /// Images whose path cannot be written as a manifest field.
    pub skipped_unrepresentable: usize,
}

impl SplitSummary {
    pub fn train_total(&self) -> usize {
        self.per_class.values().map(|c| c.train).sum()
    }

    pub fn test_total(&self) -> usize {
        self.per_class.values().map(|c| c.test).sum()
    }
}

/// Scan `img_dir`, split images per class and write both manifests into `save_dir`.
///
/// The class of an image is the name of its parent directory.
pub fn generate_image_list(
    img_dir: &Path,
    save_dir: &Path,
    opts: &SplitOptions,
) -> DatasetResult<SplitSummary> {
    let mut images = Vec::new();
    collect_images(img_dir, &opts.extensions, &mut images)?;
    images.sort();

    let mut rng = match opts.seed {
        Some(seed) => rand::rngs::StdRng::seed_from_u64(seed),
        None => rand::rngs::StdRng::from_rng(&mut rand::rng()),
    };
    images.shuffle(&mut rng);

    let mut summary = SplitSummary {
        train_manifest: save_dir.join(TRAIN_MANIFEST_NAME),
        test_manifest: save_dir.join(TEST_MANIFEST_NAME),
        ..Default::default()
    };
    for label in BUSI_LABELS {
        summary
            .per_class
            .insert((*label).to_string(), ClassCounts::default());
    }

    let mut train = Vec::new();
    let mut test = Vec::new();
    for img in images {
        let relative = img.strip_prefix(img_dir).unwrap_or(img.as_path());
        if relative.to_string_lossy().contains(&opts.mask_marker) {
            summary.skipped_masks += 1;
            continue;
        }
        if let Err(e) = manifest_field(&img) {
            tracing::warn!(error = %e, "skipping image");
            summary.skipped_unrepresentable += 1;
            continue;
        }
        let class_name = img
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let label = BusiLabel::parse(&class_name)?;
        let counts = summary
            .per_class
            .entry(label.as_str().to_string())
            .or_default();
        if counts.test < opts.test_samples_per_class {
            counts.test += 1;
            test.push(Sample::new(img, label.as_str()));
        } else {
            counts.train += 1;
            train.push(Sample::new(img, label.as_str()));
        }
    }

    fs::create_dir_all(save_dir).map_err(|e| DatasetError::io(save_dir, e))?;
    write_manifest(&summary.train_manifest, &train)?;
    write_manifest(&summary.test_manifest, &test)?;
    tracing::info!(
        root = %img_dir.display(),
        train = train.len(),
        test = test.len(),
        skipped_masks = summary.skipped_masks,
        skipped_unrepresentable = summary.skipped_unrepresentable,
        "wrote manifests"
    );
    Ok(summary)
}

fn collect_images(dir: &Path, extensions: &[String], out: &mut Vec<PathBuf>) -> DatasetResult<()> {
    let entries = fs::read_dir(dir).map_err(|e| DatasetError::io(dir, e))?;
    for entry in entries {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if path.is_dir() {
            collect_images(&path, extensions, out)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.iter().any(|want| want.eq_ignore_ascii_case(e)))
        {
            out.push(path);
        }
    }
    Ok(())
}
