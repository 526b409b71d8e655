//! Core types, error definitions, and data structures for busi_dataset.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("manifest {path} line {line}: expected 2 fields, found {fields}")]
    ManifestFormat {
        path: PathBuf,
        line: usize,
        fields: usize,
    },
    #[error("unknown label {label:?} (expected one of {expected:?})")]
    UnknownLabel {
        label: String,
        expected: &'static [&'static str],
    },
    #[error("path cannot be written as a manifest field: {path:?}")]
    UnrepresentablePath { path: PathBuf },
    #[error("image file not found: {path}")]
    MissingFile { path: PathBuf },
    #[error("no mask found for image {image}")]
    MissingMask { image: PathBuf },
    #[error("unsupported dataset {0:?}")]
    UnsupportedDataset(String),
    #[error("index {index} out of range for dataset of {len} samples")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("invalid augmentation spec: {0}")]
    InvalidSpec(String),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("config parse error at {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl DatasetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DatasetError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Dense `f32` tensor in CHW layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub data: Vec<f32>,
    /// `[channels, height, width]`.
    pub shape: [usize; 3],
}

impl ImageTensor {
    pub fn zeros(shape: [usize; 3]) -> Self {
        Self {
            data: vec![0.0; shape.iter().product()],
            shape,
        }
    }

    pub fn channels(&self) -> usize {
        self.shape[0]
    }

    pub fn height(&self) -> usize {
        self.shape[1]
    }

    pub fn width(&self) -> usize {
        self.shape[2]
    }

    /// Value at channel `c`, row `y`, column `x`.
    pub fn at(&self, c: usize, y: usize, x: usize) -> f32 {
        self.data[(c * self.shape[1] + y) * self.shape[2] + x]
    }

    /// Borrow one channel plane.
    pub fn plane(&self, c: usize) -> &[f32] {
        let n = self.shape[1] * self.shape[2];
        &self.data[c * n..(c + 1) * n]
    }
}

/// One augmented, labeled sample as handed to a training loop.
#[derive(Debug, Clone)]
pub struct LabeledExample {
    /// `[3, H, W]`, normalized.
    pub image: ImageTensor,
    /// Index into the dataset's label set.
    pub label_id: usize,
    /// `[1, H, W]` with values in `[0, 1]`; `None` when masks are disabled.
    pub mask: Option<ImageTensor>,
}

/// Which half of a train/test split a dataset serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Train,
    Test,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Train, Mode::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Train => "train",
            Mode::Test => "test",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "train" => Ok(Mode::Train),
            "test" => Ok(Mode::Test),
            other => Err(format!("unknown mode {other:?} (expected train or test)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tensor_indexing_is_chw() {
        let t = ImageTensor {
            data: (0..12).map(|v| v as f32).collect(),
            shape: [3, 2, 2],
        };
        assert_eq!(t.at(0, 0, 1), 1.0);
        assert_eq!(t.at(1, 1, 0), 6.0);
        assert_eq!(t.plane(2), &[8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn mode_round_trips_through_str() {
        assert_eq!("Train".parse::<Mode>(), Ok(Mode::Train));
        assert_eq!(Mode::Test.to_string(), "test");
        assert!("val".parse::<Mode>().is_err());
    }

    #[test]
    fn errors_render_paths() {
        let err = DatasetError::MissingFile {
            path: PathBuf::from("/data/a.bmp"),
        };
        assert!(err.to_string().contains("/data/a.bmp"));
    }
}
