use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use busi_dataset::{prepare_data_default, Mode};
use busi_tools::{load_data_config, render_example};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "preview",
    about = "Write augmented samples (image | mask) as PNGs for visual inspection"
)]
struct Args {
    /// Dataset config TOML; defaults to $BUSI_DATA_CONFIG or busi-data.toml.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Split to sample from (train applies random augmentation).
    #[arg(long, default_value_t = Mode::Train)]
    mode: Mode,
    /// Number of samples to render.
    #[arg(long, default_value_t = 8)]
    count: usize,
    /// Output directory for rendered PNGs.
    #[arg(long, default_value = "preview")]
    out: PathBuf,
}

fn main() -> Result<()> {
    busi_tools::init_tracing();
    let args = Args::parse();
    let cfg = load_data_config(args.config.as_ref())?;
    let (datasets, sizes) = prepare_data_default(&cfg).context("prepare datasets")?;
    let Some(dataset) = datasets.get(&args.mode) else {
        anyhow::bail!("no {} dataset configured", args.mode);
    };
    tracing::info!(mode = %args.mode, sizes = ?sizes, specs = %dataset.describe(), "previewing");

    fs::create_dir_all(&args.out).context("create output dir")?;
    let n = args.count.min(dataset.len());
    for i in 0..n {
        let example = dataset
            .get(i)
            .with_context(|| format!("load sample {i}"))?;
        let canvas = render_example(&example)?;
        let label = dataset
            .label_names()
            .get(example.label_id)
            .copied()
            .unwrap_or("unknown");
        let out_path = args.out.join(format!("{}_{i:03}_{label}.png", args.mode));
        canvas
            .save(&out_path)
            .with_context(|| format!("write {}", out_path.display()))?;
    }
    println!("wrote {n} previews to {}", args.out.display());
    Ok(())
}
