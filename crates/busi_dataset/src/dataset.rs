//! Random-access dataset over a manifest, with synchronized augmentation.

use crate::aug::{specs_for, SpecPair};
use crate::config::DataConfig;
use crate::labels::BUSI_LABELS;
use crate::manifest::{Sample, SampleIndex};
use crate::mask::{MaskProvider, SiblingMaskProvider};
use crate::types::{DatasetError, DatasetResult, LabeledExample, Mode};
use image::imageops::FilterType;
use image::GrayImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Labeled ultrasound images (and optionally masks) listed in a manifest.
///
/// Every [`get`](BusiDataset::get) re-draws augmentation parameters; nothing is
/// cached between calls.
#[derive(Clone)]
pub struct BusiDataset {
    index: SampleIndex,
    specs: SpecPair,
    mask_enabled: bool,
    mask_dilate: u32,
    mask_provider: Arc<dyn MaskProvider>,
}

impl std::fmt::Debug for BusiDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusiDataset")
            .field("samples", &self.index.len())
            .field("mask_enabled", &self.mask_enabled)
            .field("mask_dilate", &self.mask_dilate)
            .finish_non_exhaustive()
    }
}

impl BusiDataset {
    pub fn new(
        manifest_path: &Path,
        specs: SpecPair,
        mask_enabled: bool,
        mask_dilate: u32,
        mask_provider: Arc<dyn MaskProvider>,
    ) -> DatasetResult<Self> {
        let index = SampleIndex::load(manifest_path)?;
        tracing::info!(
            manifest = %manifest_path.display(),
            samples = index.len(),
            mask = mask_enabled,
            "loaded dataset manifest"
        );
        Ok(Self::from_index(
            index,
            specs,
            mask_enabled,
            mask_dilate,
            mask_provider,
        ))
    }

    pub fn from_index(
        index: SampleIndex,
        specs: SpecPair,
        mask_enabled: bool,
        mask_dilate: u32,
        mask_provider: Arc<dyn MaskProvider>,
    ) -> Self {
        Self {
            index,
            specs,
            mask_enabled,
            mask_dilate,
            mask_provider,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn samples(&self) -> &SampleIndex {
        &self.index
    }

    pub fn specs(&self) -> &SpecPair {
        &self.specs
    }

    pub fn mask_enabled(&self) -> bool {
        self.mask_enabled
    }

    /// Label strings indexed by `label_id`.
    pub fn label_names(&self) -> &'static [&'static str] {
        BUSI_LABELS
    }

    /// Load sample `index` with a fresh augmentation draw.
    pub fn get(&self, index: usize) -> DatasetResult<LabeledExample> {
        let seed: u64 = rand::rng().random();
        self.get_with_seed(index, seed)
    }

    /// Load sample `index`; the same seed always yields the same example.
    pub fn get_with_seed(&self, index: usize, seed: u64) -> DatasetResult<LabeledExample> {
        let sample = self
            .index
            .get(index)
            .ok_or(DatasetError::IndexOutOfRange {
                index,
                len: self.index.len(),
            })?;
        if !sample.image_path.exists() {
            return Err(DatasetError::MissingFile {
                path: sample.image_path.clone(),
            });
        }
        let image = image::open(&sample.image_path)
            .map_err(|e| DatasetError::Image {
                path: sample.image_path.clone(),
                source: e,
            })?
            .to_rgb8();
        let label_id = sample.label_id()?;

        let mask = if self.mask_enabled {
            Some(self.load_mask(sample, image.dimensions())?)
        } else {
            None
        };

        let mut rng = StdRng::seed_from_u64(seed);
        let (image, mask) = self.specs.apply(image, mask, &mut rng)?;
        tracing::debug!(
            index,
            seed,
            label = %sample.label,
            path = %sample.image_path.display(),
            "loaded sample"
        );
        Ok(LabeledExample {
            image,
            label_id,
            mask,
        })
    }

    fn load_mask(&self, sample: &Sample, (w, h): (u32, u32)) -> DatasetResult<GrayImage> {
        let raw = self.mask_provider.get_mask(&sample.image_path)?;
        let mut mask = self.mask_provider.dilate(&raw, self.mask_dilate);
        if mask.dimensions() != (w, h) {
            // crop draws depend on input size, so the mask must match the image
            tracing::warn!(
                path = %sample.image_path.display(),
                mask = ?mask.dimensions(),
                image = ?(w, h),
                "mask size differs from image; resizing"
            );
            mask = image::imageops::resize(&mask, w, h, FilterType::Nearest);
        }
        Ok(mask)
    }

    pub fn describe(&self) -> String {
        format!(
            "samples={} mask={} dilate={} {}",
            self.len(),
            self.mask_enabled,
            self.mask_dilate,
            self.specs.describe()
        )
    }
}

pub type DatasetMap = BTreeMap<Mode, BusiDataset>;
pub type SizeMap = BTreeMap<Mode, usize>;

/// Build train and test datasets from `config`, sharing `mask_provider`.
pub fn prepare_data(
    config: &DataConfig,
    mask_provider: Arc<dyn MaskProvider>,
) -> DatasetResult<(DatasetMap, SizeMap)> {
    config.validate()?;
    let mut datasets = DatasetMap::new();
    let mut sizes = SizeMap::new();
    for mode in Mode::ALL {
        let specs = specs_for(mode, config.image_size)?;
        let ds = BusiDataset::new(
            config.dataset.manifest(mode),
            specs,
            config.mask,
            config.mask_dilute,
            Arc::clone(&mask_provider),
        )?;
        sizes.insert(mode, ds.len());
        datasets.insert(mode, ds);
    }
    tracing::info!(
        dataset = config.dataset.name(),
        image_size = config.image_size,
        train = sizes.get(&Mode::Train).copied().unwrap_or(0),
        test = sizes.get(&Mode::Test).copied().unwrap_or(0),
        "prepared datasets"
    );
    Ok((datasets, sizes))
}

/// [`prepare_data`] with masks read from `<stem>_mask*` files beside each image.
pub fn prepare_data_default(config: &DataConfig) -> DatasetResult<(DatasetMap, SizeMap)> {
    prepare_data(config, Arc::new(SiblingMaskProvider::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aug::{test_specs, train_specs};
    use crate::mask::InMemoryMaskProvider;
    use image::{Luma, Rgb, RgbImage};
    use std::path::PathBuf;

    fn write_image(path: &Path, w: u32, h: u32) {
        let mut img = RgbImage::new(w, h);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, 90]);
        }
        img.save(path).unwrap();
    }

    fn no_masks() -> Arc<dyn MaskProvider> {
        Arc::new(InMemoryMaskProvider::new())
    }

    fn one_sample(dir: &Path, label: &str) -> (PathBuf, SampleIndex) {
        let path = dir.join("a.png");
        write_image(&path, 40, 32);
        let index = SampleIndex::from_samples(vec![Sample::new(&path, label)]);
        (path, index)
    }

    #[test]
    fn missing_file_is_reported() {
        let index = SampleIndex::from_samples(vec![Sample::new("/nonexistent/x.bmp", "benign")]);
        let ds = BusiDataset::from_index(index, test_specs(8).unwrap(), false, 0, no_masks());
        assert!(matches!(ds.get(0), Err(DatasetError::MissingFile { .. })));
        assert!(matches!(
            ds.get(1),
            Err(DatasetError::IndexOutOfRange { index: 1, len: 1 })
        ));
    }

    #[test]
    fn label_resolves_to_class_id() {
        let dir = tempfile::tempdir().unwrap();
        let (_, index) = one_sample(dir.path(), "malignant");
        let ds = BusiDataset::from_index(index, test_specs(16).unwrap(), false, 0, no_masks());
        let ex = ds.get(0).unwrap();
        assert_eq!(ex.label_id, 1);
        assert_eq!(ex.image.shape, [3, 16, 16]);
        assert!(ex.mask.is_none());
    }

    #[test]
    fn unknown_label_fails_at_access() {
        let dir = tempfile::tempdir().unwrap();
        let (_, index) = one_sample(dir.path(), "cyst");
        let ds = BusiDataset::from_index(index, test_specs(16).unwrap(), false, 0, no_masks());
        assert_eq!(ds.len(), 1);
        assert!(matches!(ds.get(0), Err(DatasetError::UnknownLabel { .. })));
    }

    #[test]
    fn seeded_access_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let (path, index) = one_sample(dir.path(), "benign");
        let mut masks = InMemoryMaskProvider::new();
        let mut m = GrayImage::new(40, 32);
        m.put_pixel(5, 5, Luma([255]));
        masks.insert(&path, m);
        let ds = BusiDataset::from_index(index, train_specs(16).unwrap(), true, 2, Arc::new(masks));
        let a = ds.get_with_seed(0, 11).unwrap();
        let b = ds.get_with_seed(0, 11).unwrap();
        assert_eq!(a.image, b.image);
        assert_eq!(a.mask, b.mask);
        assert_eq!(a.mask.map(|t| t.shape), Some([1, 16, 16]));
    }

    #[test]
    fn mask_error_yields_no_example() {
        let dir = tempfile::tempdir().unwrap();
        let (_, index) = one_sample(dir.path(), "normal");
        let ds = BusiDataset::from_index(index, test_specs(16).unwrap(), true, 0, no_masks());
        assert!(matches!(ds.get(0), Err(DatasetError::MissingMask { .. })));
    }

    #[test]
    fn mismatched_mask_is_resized_to_image() {
        let dir = tempfile::tempdir().unwrap();
        let (path, index) = one_sample(dir.path(), "benign");
        let mut masks = InMemoryMaskProvider::new();
        masks.insert(&path, GrayImage::new(20, 16));
        let ds = BusiDataset::from_index(index, test_specs(16).unwrap(), true, 0, Arc::new(masks));
        let ex = ds.get(0).unwrap();
        assert_eq!(ex.mask.map(|t| t.shape), Some([1, 16, 16]));
    }
}
