//! Handle command - deliver one storage event to the extractor.

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::error;

use pdfimg_core::{
    handle_event, ExtractorConfig, IgnoreReason, LocalStore, ObjectStore, StorageEvent,
    TriggerOutcome,
};

/// Arguments for the handle command.
#[derive(Args)]
pub struct HandleArgs {
    /// Event JSON file, or `-` for stdin
    #[arg(short, long, required = true)]
    event: String,

    /// Object store backend
    #[arg(short, long, value_enum, default_value = "local")]
    store: StoreKind,

    /// Root directory of the local store (one directory per bucket)
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Exit non-zero on unexpected failures so the host can retry
    #[arg(long)]
    fail_on_error: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum StoreKind {
    /// Directories on the local filesystem
    Local,
    /// Amazon S3 or an S3-compatible service
    S3,
}

pub async fn run(args: HandleArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let payload = read_event(&args.event)?;
    let store = open_store(&args, &config).await?;

    let result = match StorageEvent::from_json(&payload) {
        Ok(event) => handle_event(&event, &config, store.as_ref()).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(outcome) => report(&outcome, args.json),
        Err(e) => {
            error!("Unexpected error handling event: {}", e);
            if args.fail_on_error {
                return Err(e.into());
            }
            eprintln!("{} {}", style("✗").red(), e);
            Ok(())
        }
    }
}

fn read_event(source: &str) -> anyhow::Result<String> {
    if source == "-" {
        let mut payload = String::new();
        std::io::stdin().read_to_string(&mut payload)?;
        Ok(payload)
    } else {
        fs::read_to_string(source)
            .map_err(|e| anyhow::anyhow!("Failed to read event file {}: {}", source, e))
    }
}

#[cfg_attr(not(feature = "s3"), allow(unused_variables))]
async fn open_store(
    args: &HandleArgs,
    config: &ExtractorConfig,
) -> anyhow::Result<Box<dyn ObjectStore>> {
    match args.store {
        StoreKind::Local => Ok(Box::new(LocalStore::new(&args.root))),
        #[cfg(feature = "s3")]
        StoreKind::S3 => Ok(Box::new(pdfimg_core::S3Store::new(&config.s3).await)),
        #[cfg(not(feature = "s3"))]
        StoreKind::S3 => {
            anyhow::bail!("pdfimg was built without S3 support (enable the `s3` feature)")
        }
    }
}

fn report(outcome: &TriggerOutcome, json: bool) -> anyhow::Result<()> {
    match outcome {
        TriggerOutcome::Processed(summary) if json => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
        TriggerOutcome::Processed(summary) => super::print_summary("event", summary),
        TriggerOutcome::Ignored(IgnoreReason::NotPdf) => {
            println!("{} Ignored: not a PDF", style("ℹ").blue());
        }
        TriggerOutcome::Ignored(IgnoreReason::OwnOutput) => {
            println!("{} Ignored: object is in the output directory", style("ℹ").blue());
        }
        TriggerOutcome::SourceMissing => {
            println!("{} Source object not found", style("⚠").yellow());
        }
        TriggerOutcome::OutputBucketMissing => {
            println!("{} Output bucket not found", style("⚠").yellow());
        }
        TriggerOutcome::DocumentFailed(e) => {
            println!("{} Document could not be processed: {}", style("⚠").yellow(), e);
        }
    }
    Ok(())
}
