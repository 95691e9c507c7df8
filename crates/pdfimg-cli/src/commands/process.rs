//! Process command - extract images from a single local PDF.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use pdfimg_core::{
    process_pdf, ExtractOptions, ExtractionSummary, ExtractorConfig, LocalStore, OutputTarget,
};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input PDF file
    #[arg(required = true)]
    input: PathBuf,

    /// Directory for the extracted images
    #[arg(short, long, default_value = "extracted-pdf-images")]
    output_dir: PathBuf,

    /// Override the header ratio from the config
    #[arg(long)]
    header_ratio: Option<f32>,

    /// Override the footer ratio from the config
    #[arg(long)]
    footer_ratio: Option<f32>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let mut config = super::load_config(config_path)?;
    if let Some(ratio) = args.header_ratio {
        config.header_ratio = ratio;
    }
    if let Some(ratio) = args.footer_ratio {
        config.footer_ratio = ratio;
    }

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")?,
    );
    pb.set_message(format!("Extracting images from {}...", args.input.display()));
    pb.enable_steady_tick(Duration::from_millis(100));

    let result = extract_file(&args.input, &args.output_dir, &config).await;
    pb.finish_and_clear();
    let summary = result?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        super::print_summary(&args.input.display().to_string(), &summary);
        println!(
            "{} Saved to {} in {:?}",
            style("ℹ").blue(),
            args.output_dir.display(),
            start.elapsed()
        );
    }

    Ok(())
}

/// Run the extractor on one file, writing into `output_dir`.
pub async fn extract_file(
    input: &Path,
    output_dir: &Path,
    config: &ExtractorConfig,
) -> anyhow::Result<ExtractionSummary> {
    let data = fs::read(input)?;
    fs::create_dir_all(output_dir)?;

    let store = LocalStore::new(output_dir);
    let target = OutputTarget::new(&store, "", "");
    let source_name = input.to_string_lossy();

    debug!("Read {} bytes from {}", data.len(), input.display());
    let summary = process_pdf(&data, &source_name, &target, ExtractOptions::from(config))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to process {}: {}", input.display(), e))?;
    Ok(summary)
}
