//! Segmentation mask lookup and morphological dilation.

use crate::types::{DatasetError, DatasetResult};
use image::{GrayImage, ImageFormat, Luma};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Source of per-image segmentation masks.
pub trait MaskProvider: Send + Sync {
    /// Single-channel mask for `image_path`; non-zero pixels are foreground.
    fn get_mask(&self, image_path: &Path) -> DatasetResult<GrayImage>;

    /// Grow foreground regions by `distance` pixels in every direction.
    fn dilate(&self, mask: &GrayImage, distance: u32) -> GrayImage {
        dilate_mask(mask, distance)
    }
}

/// Grayscale dilation with a Euclidean disk of radius `distance`.
///
/// `distance == 0` returns an identical copy.
pub fn dilate_mask(mask: &GrayImage, distance: u32) -> GrayImage {
    if distance == 0 {
        return mask.clone();
    }
    let r = distance as i64;
    let offsets: Vec<(i64, i64)> = (-r..=r)
        .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
        .filter(|(dx, dy)| dx * dx + dy * dy <= r * r)
        .collect();

    let (w, h) = mask.dimensions();
    let mut out = mask.clone();
    for (x, y, px) in mask.enumerate_pixels() {
        let v = px[0];
        if v == 0 {
            continue;
        }
        for (dx, dy) in &offsets {
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                continue;
            }
            let dst = out.get_pixel_mut(nx as u32, ny as u32);
            if dst[0] < v {
                *dst = Luma([v]);
            }
        }
    }
    out
}

/// Masks stored beside their image, BUSI style: `benign (3).png` is annotated by
/// `benign (3)_mask.png`, and extra lesions by `benign (3)_mask_1.png`, ...
///
/// All matching files are merged by union and binarized to 0/255. Only files
/// with an extension the `image` crate can decode are considered. Each
/// directory is listed once; masks added after the first lookup in a directory
/// are not seen.
#[derive(Debug)]
pub struct SiblingMaskProvider {
    marker: String,
    listings: RwLock<HashMap<PathBuf, Arc<Vec<PathBuf>>>>,
}

impl Default for SiblingMaskProvider {
    fn default() -> Self {
        Self::with_marker("_mask")
    }
}

impl SiblingMaskProvider {
    pub fn with_marker(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            listings: RwLock::new(HashMap::new()),
        }
    }

    /// Decodable files in `dir` whose stem contains the marker, sorted.
    fn listing(&self, dir: &Path) -> DatasetResult<Arc<Vec<PathBuf>>> {
        let cached = self
            .listings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(dir)
            .cloned();
        if let Some(listing) = cached {
            return Ok(listing);
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|e| DatasetError::io(dir, e))?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| {
                p.file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| s.contains(&self.marker))
            })
            .filter(|p| ImageFormat::from_path(p).is_ok_and(|f| f.reading_enabled()))
            .collect();
        paths.sort();
        tracing::debug!(dir = %dir.display(), masks = paths.len(), "indexed mask directory");
        let listing = Arc::new(paths);
        self.listings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(dir.to_path_buf(), Arc::clone(&listing));
        Ok(listing)
    }

    fn mask_paths(&self, image_path: &Path) -> DatasetResult<Vec<PathBuf>> {
        let Some(stem) = image_path.file_stem().and_then(|s| s.to_str()) else {
            return Ok(Vec::new());
        };
        let prefix = format!("{stem}{}", self.marker);
        let dir = match image_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        Ok(self
            .listing(dir)?
            .iter()
            .filter(|p| {
                p.file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| s.starts_with(&prefix))
            })
            .cloned()
            .collect())
    }
}

impl MaskProvider for SiblingMaskProvider {
    fn get_mask(&self, image_path: &Path) -> DatasetResult<GrayImage> {
        let paths = self.mask_paths(image_path)?;
        if paths.is_empty() {
            return Err(DatasetError::MissingMask {
                image: image_path.to_path_buf(),
            });
        }
        let mut merged: Option<GrayImage> = None;
        for path in &paths {
            let layer = image::open(path)
                .map_err(|e| DatasetError::Image {
                    path: path.clone(),
                    source: e,
                })?
                .to_luma8();
            match merged.as_mut() {
                None => merged = Some(layer),
                Some(acc) => {
                    if acc.dimensions() != layer.dimensions() {
                        tracing::warn!(
                            mask = %path.display(),
                            "mask layer size differs from first layer; skipping"
                        );
                        continue;
                    }
                    for (dst, src) in acc.pixels_mut().zip(layer.pixels()) {
                        dst[0] = dst[0].max(src[0]);
                    }
                }
            }
        }
        let mut mask = merged.ok_or_else(|| DatasetError::MissingMask {
            image: image_path.to_path_buf(),
        })?;
        for px in mask.pixels_mut() {
            px[0] = if px[0] > 0 { 255 } else { 0 };
        }
        tracing::debug!(image = %image_path.display(), layers = paths.len(), "loaded mask");
        Ok(mask)
    }
}

/// Fixed path → mask table, for synthetic data and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMaskProvider {
    masks: HashMap<PathBuf, GrayImage>,
}

impl InMemoryMaskProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, image_path: impl Into<PathBuf>, mask: GrayImage) {
        self.masks.insert(image_path.into(), mask);
    }
}

impl MaskProvider for InMemoryMaskProvider {
    fn get_mask(&self, image_path: &Path) -> DatasetResult<GrayImage> {
        self.masks
            .get(image_path)
            .cloned()
            .ok_or_else(|| DatasetError::MissingMask {
                image: image_path.to_path_buf(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(size: u32, at: (u32, u32)) -> GrayImage {
        let mut m = GrayImage::new(size, size);
        m.put_pixel(at.0, at.1, Luma([255]));
        m
    }

    #[test]
    fn dilate_zero_is_identity() {
        let m = dot(7, (3, 3));
        assert_eq!(dilate_mask(&m, 0), m);
    }

    #[test]
    fn dilate_grows_a_disk() {
        let m = dot(9, (4, 4));
        let d = dilate_mask(&m, 2);
        assert_eq!(d.get_pixel(4, 2)[0], 255);
        assert_eq!(d.get_pixel(6, 4)[0], 255);
        assert_eq!(d.get_pixel(5, 5)[0], 255);
        // (2,2) offset has distance sqrt(8) > 2
        assert_eq!(d.get_pixel(6, 6)[0], 0);
        assert_eq!(d.get_pixel(4, 7)[0], 0);
    }

    #[test]
    fn dilate_clips_at_borders() {
        let m = dot(4, (0, 0));
        let d = dilate_mask(&m, 3);
        assert_eq!(d.dimensions(), (4, 4));
        assert_eq!(d.get_pixel(3, 0)[0], 255);
        assert_eq!(d.get_pixel(3, 3)[0], 0);
    }

    #[test]
    fn sibling_provider_merges_layers() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("benign (1).png");
        GrayImage::new(4, 4).save(&image_path).unwrap();
        dot(4, (0, 0)).save(dir.path().join("benign (1)_mask.png")).unwrap();
        let mut second = dot(4, (3, 3));
        second.put_pixel(3, 3, Luma([1]));
        second.save(dir.path().join("benign (1)_mask_1.png")).unwrap();
        // different stem, must not be merged
        dot(4, (2, 2)).save(dir.path().join("benign (10)_mask.png")).unwrap();

        let mask = SiblingMaskProvider::default().get_mask(&image_path).unwrap();
        assert_eq!(mask.get_pixel(0, 0)[0], 255);
        assert_eq!(mask.get_pixel(3, 3)[0], 255);
        assert_eq!(mask.get_pixel(2, 2)[0], 0);
    }

    #[test]
    fn sibling_provider_ignores_undecodable_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("benign (1).png");
        GrayImage::new(4, 4).save(&image_path).unwrap();
        dot(4, (1, 1)).save(dir.path().join("benign (1)_mask.png")).unwrap();
        fs::write(dir.path().join("benign (1)_mask.png.bak"), b"stale").unwrap();
        fs::write(dir.path().join("benign (1)_mask.txt"), b"notes").unwrap();

        let mask = SiblingMaskProvider::default().get_mask(&image_path).unwrap();
        assert_eq!(mask.get_pixel(1, 1)[0], 255);
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn sibling_provider_lists_each_directory_once() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("normal (1).png");
        let second = dir.path().join("normal (2).png");
        for (img, at) in [(&first, (0, 0)), (&second, (2, 2))] {
            GrayImage::new(4, 4).save(img).unwrap();
            let stem = img.file_stem().unwrap().to_str().unwrap();
            dot(4, at).save(dir.path().join(format!("{stem}_mask.png"))).unwrap();
        }

        let provider = SiblingMaskProvider::default();
        assert_eq!(provider.get_mask(&first).unwrap().get_pixel(0, 0)[0], 255);
        // a layer added after the directory was indexed is not picked up
        dot(4, (3, 3)).save(dir.path().join("normal (2)_mask_1.png")).unwrap();
        let mask = provider.get_mask(&second).unwrap();
        assert_eq!(mask.get_pixel(2, 2)[0], 255);
        assert_eq!(mask.get_pixel(3, 3)[0], 0);
        assert_eq!(provider.listings.read().unwrap().len(), 1);
    }

    #[test]
    fn sibling_provider_reports_missing_mask() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("normal (1).png");
        GrayImage::new(2, 2).save(&image_path).unwrap();
        let err = SiblingMaskProvider::default().get_mask(&image_path).unwrap_err();
        assert!(matches!(err, DatasetError::MissingMask { .. }));
    }
}
