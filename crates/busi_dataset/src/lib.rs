//! Manifest-driven loading of the BUSI breast ultrasound dataset.
//!
//! This crate provides utilities for:
//! - Parsing `path,label` sample manifests and generating train/test splits
//! - Paired image/mask augmentation with shared geometric draws
//! - Mask lookup and dilation
//! - Batch iteration, with Burn tensors behind the `burn-runtime` feature

pub mod aug;
pub mod batch;
pub mod config;
pub mod dataset;
pub mod labels;
pub mod manifest;
pub mod mask;
pub mod splits;
pub mod types;

pub use aug::{
    specs_for, test_specs, train_specs, AugmentationSpec, AugmentationSpecBuilder, SpecPair,
    StepKind, TransformStep,
};
pub use batch::{Batch, BatchConfig, BatchIter};
pub use config::{DataConfig, DatasetSource};
pub use dataset::{prepare_data, prepare_data_default, BusiDataset, DatasetMap, SizeMap};
pub use labels::{BusiLabel, BUSI_LABELS};
pub use manifest::{write_manifest, Sample, SampleIndex};
pub use mask::{dilate_mask, InMemoryMaskProvider, MaskProvider, SiblingMaskProvider};
pub use splits::{generate_image_list, ClassCounts, SplitOptions, SplitSummary};
pub use types::*;

#[cfg(feature = "burn-runtime")]
pub use batch::BurnBatch;
