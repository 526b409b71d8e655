use std::path::PathBuf;

use anyhow::{Context, Result};
use busi_dataset::{generate_image_list, SplitOptions};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "gen_manifest",
    about = "Scan a class-per-directory BUSI tree and write train/test sample manifests"
)]
struct Args {
    /// Root containing normal/, malignant/ and benign/ image directories.
    #[arg(long, default_value = "Dataset_BUSI_with_GT")]
    img_dir: PathBuf,
    /// Directory receiving train_sample.txt and test_sample.txt.
    #[arg(long, default_value = ".")]
    save_dir: PathBuf,
    /// Images per class held out for the test manifest.
    #[arg(long, default_value_t = 40)]
    test_samples: usize,
    /// Shuffle seed; omit for a fresh random split.
    #[arg(long)]
    seed: Option<u64>,
    /// Image extensions to collect (repeatable).
    #[arg(long = "ext", default_values_t = vec!["bmp".to_string()])]
    extensions: Vec<String>,
}

fn main() -> Result<()> {
    busi_tools::init_tracing();
    let args = Args::parse();
    let opts = SplitOptions {
        test_samples_per_class: args.test_samples,
        extensions: args.extensions,
        seed: args.seed,
        ..Default::default()
    };
    let summary = generate_image_list(&args.img_dir, &args.save_dir, &opts)
        .with_context(|| format!("generate manifests from {}", args.img_dir.display()))?;

    for (class, counts) in &summary.per_class {
        println!("{class:<10} train={:<5} test={}", counts.train, counts.test);
    }
    if summary.skipped_unrepresentable > 0 {
        eprintln!(
            "skipped {} images whose paths contain commas, line breaks or non-UTF-8 bytes",
            summary.skipped_unrepresentable
        );
    }
    println!(
        "wrote {} ({} rows) and {} ({} rows)",
        summary.train_manifest.display(),
        summary.train_total(),
        summary.test_manifest.display(),
        summary.test_total()
    );
    Ok(())
}
