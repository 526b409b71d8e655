//! Manifest parsing: an ordered index of `(image path, label)` samples.
//!
//! A manifest is a headerless text file with one `<image_path>,<label>` row per
//! sample. Paths containing commas or line breaks cannot be represented; see
//! [`manifest_field`].

use crate::labels::BusiLabel;
use crate::types::{DatasetError, DatasetResult};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub image_path: PathBuf,
    pub label: String,
}

impl Sample {
    pub fn new(image_path: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            image_path: image_path.into(),
            label: label.into(),
        }
    }

    /// Resolve the label string to its class id.
    pub fn label_id(&self) -> DatasetResult<usize> {
        BusiLabel::parse(&self.label).map(|l| l.id())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SampleIndex {
    samples: Vec<Sample>,
}

impl SampleIndex {
    pub fn load(manifest_path: &Path) -> DatasetResult<Self> {
        let content = fs::read_to_string(manifest_path)
            .map_err(|e| DatasetError::io(manifest_path, e))?;
        let index = Self::parse(&content, manifest_path)?;
        if index.is_empty() {
            tracing::warn!(manifest = %manifest_path.display(), "manifest has no samples");
        }
        Ok(index)
    }

    /// Parse manifest text; `origin` is only used in error messages.
    pub fn parse(content: &str, origin: &Path) -> DatasetResult<Self> {
        let mut samples = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() != 2 {
                return Err(DatasetError::ManifestFormat {
                    path: origin.to_path_buf(),
                    line: line_no + 1,
                    fields: fields.len(),
                });
            }
            samples.push(Sample::new(fields[0].trim(), fields[1].trim()));
        }
        Ok(Self { samples })
    }

    pub fn from_samples(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }
}

/// `image_path` as it would appear in a manifest row.
///
/// Fails for non-UTF-8 paths, paths containing a comma or line break, and
/// paths with surrounding whitespace, since [`SampleIndex::parse`] could not
/// read them back unchanged.
pub fn manifest_field(image_path: &Path) -> DatasetResult<&str> {
    let unrepresentable = || DatasetError::UnrepresentablePath {
        path: image_path.to_path_buf(),
    };
    let field = image_path.to_str().ok_or_else(unrepresentable)?;
    if field.is_empty() || field.trim() != field || field.contains([',', '\n', '\r']) {
        return Err(unrepresentable());
    }
    Ok(field)
}

/// Write samples in manifest format, one row per sample.
///
/// Every path is checked with [`manifest_field`] before the file is created.
pub fn write_manifest(path: &Path, samples: &[Sample]) -> DatasetResult<()> {
    let fields = samples
        .iter()
        .map(|s| manifest_field(&s.image_path))
        .collect::<DatasetResult<Vec<_>>>()?;
    let mut file = fs::File::create(path).map_err(|e| DatasetError::io(path, e))?;
    for (field, s) in fields.iter().zip(samples) {
        writeln!(file, "{field},{}", s.label).map_err(|e| DatasetError::io(path, e))?;
    }
    Ok(())
}
