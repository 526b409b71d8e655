//! Typed dataset configuration, loadable from TOML.
//!
//! ```toml
//! image_size = 224
//! mask = true
//! mask_dilute = 15
//!
//! [dataset]
//! kind = "BUSI"
//! train = "train_sample.txt"
//! test = "test_sample.txt"
//! ```

use crate::labels::BUSI_LABELS;
use crate::types::{DatasetError, DatasetResult, Mode};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_NAME: &str = "busi-data.toml";
const CONFIG_ENV: &str = "BUSI_DATA_CONFIG";

/// Supported dataset families, each with its own manifests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    Busi { train: PathBuf, test: PathBuf },
}

impl DatasetSource {
    pub fn busi(train: impl Into<PathBuf>, test: impl Into<PathBuf>) -> Self {
        DatasetSource::Busi {
            train: train.into(),
            test: test.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DatasetSource::Busi { .. } => "BUSI",
        }
    }

    pub fn manifest(&self, mode: Mode) -> &Path {
        match (self, mode) {
            (DatasetSource::Busi { train, .. }, Mode::Train) => train,
            (DatasetSource::Busi { test, .. }, Mode::Test) => test,
        }
    }

    pub fn label_names(&self) -> &'static [&'static str] {
        match self {
            DatasetSource::Busi { .. } => BUSI_LABELS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataConfig {
    /// Side length of the square tensors produced.
    pub image_size: u32,
    pub dataset: DatasetSource,
    /// Return segmentation masks alongside images.
    pub mask: bool,
    /// Dilation radius applied to masks, in pixels.
    pub mask_dilute: u32,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DataConfigFile {
    image_size: Option<i64>,
    dataset: Option<DatasetSection>,
    mask: Option<bool>,
    mask_dilute: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DatasetSection {
    kind: String,
    train: Option<String>,
    test: Option<String>,
}

impl DataConfig {
    pub fn new(image_size: u32, dataset: DatasetSource) -> Self {
        Self {
            image_size,
            dataset,
            mask: false,
            mask_dilute: 0,
        }
    }

    pub fn with_mask(mut self, enabled: bool, dilute: u32) -> Self {
        self.mask = enabled;
        self.mask_dilute = dilute;
        self
    }

    /// Load from `$BUSI_DATA_CONFIG`, falling back to `busi-data.toml`.
    pub fn load() -> DatasetResult<Self> {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_NAME));
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> DatasetResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;
        Self::from_toml_str(&raw, path)
    }

    /// Parse TOML text; `origin` is only used in error messages.
    pub fn from_toml_str(raw: &str, origin: &Path) -> DatasetResult<Self> {
        let file: DataConfigFile = toml::from_str(raw).map_err(|e| DatasetError::Toml {
            path: origin.to_path_buf(),
            source: e,
        })?;
        Self::from_file(file)
    }

    fn from_file(file: DataConfigFile) -> DatasetResult<Self> {
        let image_size = file
            .image_size
            .ok_or_else(|| DatasetError::InvalidConfig("image_size is required".to_string()))?;
        let image_size = u32::try_from(image_size)
            .ok()
            .filter(|v| *v > 0)
            .ok_or_else(|| {
                DatasetError::InvalidConfig(format!("image_size must be > 0, got {image_size}"))
            })?;
        let mask_dilute = file.mask_dilute.unwrap_or(0);
        let mask_dilute = u32::try_from(mask_dilute).map_err(|_| {
            DatasetError::InvalidConfig(format!("mask_dilute must be >= 0, got {mask_dilute}"))
        })?;

        let section = file
            .dataset
            .ok_or_else(|| DatasetError::InvalidConfig("[dataset] section is required".to_string()))?;
        let dataset = match section.kind.trim() {
            "BUSI" => {
                let manifest = |field: Option<String>, name: &str| {
                    field
                        .filter(|v| !v.trim().is_empty())
                        .map(|v| expand_path(&v))
                        .ok_or_else(|| {
                            DatasetError::InvalidConfig(format!("dataset.{name} is required"))
                        })
                };
                DatasetSource::Busi {
                    train: manifest(section.train, "train")?,
                    test: manifest(section.test, "test")?,
                }
            }
            other => return Err(DatasetError::UnsupportedDataset(other.to_string())),
        };

        let cfg = DataConfig {
            image_size,
            dataset,
            mask: file.mask.unwrap_or(false),
            mask_dilute,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> DatasetResult<()> {
        if self.image_size == 0 {
            return Err(DatasetError::InvalidConfig(
                "image_size must be > 0".to_string(),
            ));
        }
        if !self.mask && self.mask_dilute > 0 {
            tracing::warn!(
                mask_dilute = self.mask_dilute,
                "mask_dilute is set but masks are disabled"
            );
        }
        Ok(())
    }
}

fn expand_path(raw: &str) -> PathBuf {
    let mut out = raw.trim().to_string();
    if let Some(stripped) = out.strip_prefix('~') {
        if let Ok(home) = std::env::var("HOME") {
            out = format!("{home}{stripped}");
        }
    }
    PathBuf::from(expand_env(&out))
}

/// Substitute `${VAR}`; unknown variables are left verbatim.
fn expand_env(input: &str) -> String {
    let mut out = String::new();
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match std::env::var(key) {
                    Ok(val) => out.push_str(&val),
                    Err(_) => {
                        out.push_str("${");
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
