//! Batch command - extract images from many local PDFs.

use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, warn};

use super::process::extract_file;

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern matching the input PDFs
    #[arg(required = true)]
    input: String,

    /// Directory for the extracted images
    #[arg(short, long, default_value = "extracted-pdf-images")]
    output_dir: PathBuf,

    /// Stop at the first document that cannot be processed
    #[arg(long)]
    fail_fast: bool,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = super::load_config(config_path)?;

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files",
            )?
            .progress_chars("=>-"),
    );

    let mut images = 0u32;
    let mut skipped = 0u32;
    let mut failed = Vec::new();

    for path in &files {
        match extract_file(path, &args.output_dir, &config).await {
            Ok(summary) => {
                images += summary.images_written;
                skipped += summary.header_footer_skipped;
            }
            Err(e) if args.fail_fast => {
                error!("{}", e);
                pb.abandon();
                return Err(e);
            }
            Err(e) => {
                warn!("{}", e);
                failed.push((path.clone(), e.to_string()));
            }
        }
        pb.inc(1);
    }

    pb.finish_with_message("Complete");

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        files.len(),
        start.elapsed()
    );
    println!(
        "   {} images written, {} header/footer placements skipped, {} files failed",
        style(images).green(),
        skipped,
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for (path, error) in &failed {
            println!("  - {}: {}", path.display(), error);
        }
    }

    Ok(())
}
