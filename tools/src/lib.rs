//! Shared plumbing for the BUSI command-line tools.

pub mod preview;

use std::path::PathBuf;

use anyhow::{Context, Result};
use busi_dataset::DataConfig;
use tracing_subscriber::EnvFilter;

pub use preview::{render_example, tensor_to_gray, tensor_to_rgb};

/// Install a stderr `fmt` subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Load the dataset config from `path`, or from the environment/default file.
pub fn load_data_config(path: Option<&PathBuf>) -> Result<DataConfig> {
    match path {
        Some(p) => DataConfig::from_path(p)
            .with_context(|| format!("load data config {}", p.display())),
        None => DataConfig::load().context("load data config (BUSI_DATA_CONFIG or busi-data.toml)"),
    }
}
