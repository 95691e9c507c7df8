pub mod batch;
pub mod config;
pub mod handle;
pub mod process;

use std::path::{Path, PathBuf};

use console::style;
use pdfimg_core::{ExtractionSummary, ExtractorConfig};

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pdfimg")
        .join("config.json")
}

/// Config from `-c`, else the default file when present, else built-in defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<ExtractorConfig> {
    if let Some(path) = config_path {
        return ExtractorConfig::from_file(Path::new(path))
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", path, e));
    }

    let default_path = default_config_path();
    if default_path.exists() {
        Ok(ExtractorConfig::from_file(&default_path)?)
    } else {
        Ok(ExtractorConfig::default())
    }
}

/// Human-readable summary of one document.
pub fn print_summary(name: &str, summary: &ExtractionSummary) {
    println!(
        "{} {}: {} images written from {} pages",
        style("✓").green(),
        name,
        style(summary.images_written).green(),
        summary.pages
    );
    if summary.header_footer_skipped > 0 {
        println!(
            "   {} header/footer placements skipped",
            summary.header_footer_skipped
        );
    }
    if summary.images_failed > 0 || summary.pages_skipped > 0 {
        println!(
            "   {} images failed, {} pages skipped",
            style(summary.images_failed).red(),
            style(summary.pages_skipped).red()
        );
    }
}
