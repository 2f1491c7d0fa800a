use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use framelabel::export::{self, read_dataset};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge several exported datasets (each a directory with labels.json and frames/)
    Merge {
        /// Dataset directories to merge
        #[arg(required = true)]
        datasets: Vec<PathBuf>,

        /// Output directory for the merged dataset
        #[arg(short, long, default_value = "merged_dataset")]
        output: PathBuf,
    },

    /// Print image, annotation and category counts of a labels.json
    Inspect {
        /// Path to a COCO labels file
        labels: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match args.command {
        Command::Merge { datasets, output } => {
            for dataset in &datasets {
                if !dataset.is_dir() {
                    anyhow::bail!("{} is not a valid directory", dataset.display());
                }
            }

            let summary = export::merge_datasets(datasets.as_slice(), &output)
                .context("Failed to merge datasets")?;

            tracing::info!("Merging complete!");
            tracing::info!("Output directory: {}", output.display());
            tracing::info!("Total images: {}", summary.images);
            tracing::info!("Total annotations: {}", summary.annotations);
            tracing::info!("Total categories: {}", summary.categories);
            if summary.missing_files > 0 {
                tracing::warn!("{} image file(s) were missing", summary.missing_files);
            }
            tracing::info!("Labels saved to: {}", summary.labels_path.display());
        }
        Command::Inspect { labels } => {
            let dataset = read_dataset(&labels)
                .with_context(|| format!("Failed to load {}", labels.display()))?;

            tracing::info!("{}", labels.display());
            tracing::info!("Images: {}", dataset.images.len());
            tracing::info!("Annotations: {}", dataset.annotations.len());
            for (name, count) in dataset.annotations_per_category() {
                tracing::info!("  {}: {}", name, count);
            }
        }
    }

    Ok(())
}
