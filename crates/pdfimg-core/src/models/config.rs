//! Configuration for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{PdfImgError, Result};
use crate::filter::ZoneRatios;

/// Main configuration for the extractor.
///
/// Fixed at deployment time and passed explicitly into every call, so tests can
/// override any field per invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Destination bucket for extracted images.
    pub output_bucket: String,

    /// Path prefix inside the destination bucket.
    pub output_dir: String,

    /// Top fraction of the page treated as header zone (0.0 - <1.0).
    pub header_ratio: f32,

    /// Bottom fraction of the page treated as footer zone (0.0 - <1.0).
    pub footer_ratio: f32,

    /// Upper bound on downloading the source PDF, in seconds.
    pub download_timeout_secs: u64,

    /// JPEG quality of the re-encoded output (1 - 100).
    pub jpeg_quality: u8,

    /// S3 backend settings.
    pub s3: S3Config,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            output_bucket: "sbi-image-sample".to_string(),
            output_dir: "extracted-pdf-images".to_string(),
            header_ratio: 0.15,
            footer_ratio: 0.15,
            download_timeout_secs: 300,
            jpeg_quality: crate::normalize::DEFAULT_JPEG_QUALITY,
            s3: S3Config::default(),
        }
    }
}

/// Settings for S3-compatible object storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    /// Custom endpoint (MinIO, R2, GCS interoperability). `None` uses AWS.
    pub endpoint: Option<String>,

    /// Region override. Falls back to the environment.
    pub region: Option<String>,

    /// Use path-style addressing, required by most S3-compatible services.
    pub force_path_style: bool,
}

impl ExtractorConfig {
    /// Load configuration from a JSON file.
    ///
    /// An unreadable file is [`PdfImgError::Io`]; malformed JSON is [`PdfImgError::Config`].
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| PdfImgError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| PdfImgError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Output directory without leading or trailing slashes.
    pub fn output_prefix(&self) -> &str {
        self.output_dir.trim_matches('/')
    }

    /// Validated header/footer ratios.
    pub fn zone_ratios(&self) -> ZoneRatios {
        ZoneRatios::new(self.header_ratio, self.footer_ratio)
    }

    /// Download timeout as a [`Duration`].
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// JPEG quality clamped to the encoder's accepted range.
    pub fn quality(&self) -> u8 {
        self.jpeg_quality.clamp(1, 100)
    }
}
