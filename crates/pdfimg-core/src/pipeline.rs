//! Document-level orchestration.
//!
//! Walks pages in order, filters header/footer images, normalizes the rest and
//! writes them to the output target. Failures are contained at the narrowest
//! scope: one image, one page, or (only when the PDF cannot be opened) the
//! whole document.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::error::{DocumentError, ImageError, PageError};
use crate::filter::{is_header_footer_only, ZoneLimits, ZoneRatios};
use crate::models::config::ExtractorConfig;
use crate::models::image::ImageRef;
use crate::naming::{document_base_name, OutputName};
use crate::normalize::normalize;
use crate::pdf::{PageImageSource, PdfDocument, Placements};
use crate::storage::OutputTarget;

/// Counts reported after processing one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionSummary {
    /// Pages in the document.
    pub pages: u32,
    /// Pages skipped because of page-local errors.
    pub pages_skipped: u32,
    /// Images written to the output target.
    pub images_written: u32,
    /// Image references skipped as header/footer decoration.
    pub header_footer_skipped: u32,
    /// Images that failed to decode, encode or write.
    pub images_failed: u32,
    /// References without retrievable pixel data.
    pub images_without_data: u32,
    /// Keys written, in order.
    pub written: Vec<String>,
}

/// Per-document parameters.
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    pub ratios: ZoneRatios,
    pub jpeg_quality: u8,
}

impl From<&ExtractorConfig> for ExtractOptions {
    fn from(config: &ExtractorConfig) -> Self {
        Self {
            ratios: config.zone_ratios(),
            jpeg_quality: config.quality(),
        }
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            ratios: ZoneRatios::default(),
            jpeg_quality: crate::normalize::DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Open a PDF from bytes and extract its images.
///
/// Only a document that cannot be opened is an error; everything narrower is
/// logged and counted in the summary. The document is dropped before returning.
pub async fn process_pdf(
    data: &[u8],
    source_name: &str,
    target: &OutputTarget<'_>,
    options: ExtractOptions,
) -> Result<ExtractionSummary, DocumentError> {
    let document = PdfDocument::load(data)?;
    Ok(extract_document_images(&document, source_name, target, options).await)
}

/// Extract every kept image of an opened document.
pub async fn extract_document_images<D: PageImageSource>(
    document: &D,
    source_name: &str,
    target: &OutputTarget<'_>,
    options: ExtractOptions,
) -> ExtractionSummary {
    let base_name = document_base_name(source_name);
    let mut extraction = DocumentExtraction {
        document,
        target,
        options,
        base_name,
        summary: ExtractionSummary {
            pages: document.page_count(),
            ..Default::default()
        },
    };

    info!(
        "Processing {} pages in '{}'...",
        extraction.summary.pages, source_name
    );

    for page in 1..=extraction.summary.pages {
        if let Err(e) = extraction.process_page(page).await {
            warn!("Skipping page {} of {}: {}", page, source_name, e);
            extraction.summary.pages_skipped += 1;
        }
    }

    let summary = extraction.summary;
    info!(
        "Extracted {} images from {} and saved to {}/{}",
        summary.images_written, source_name, target.bucket, target.dir
    );
    if summary.header_footer_skipped > 0 {
        info!(
            "Skipped {} potential header/footer image placements",
            summary.header_footer_skipped
        );
    }
    summary
}

struct DocumentExtraction<'a, 't, D> {
    document: &'a D,
    target: &'a OutputTarget<'t>,
    options: ExtractOptions,
    base_name: String,
    summary: ExtractionSummary,
}

impl<D: PageImageSource> DocumentExtraction<'_, '_, D> {
    async fn process_page(&mut self, page: u32) -> Result<(), PageError> {
        let height = self.document.page_height(page)?;
        if height.is_nan() || height <= 0.0 {
            return Err(PageError::NonPositiveHeight { page, height });
        }
        let limits = ZoneLimits::for_page(height, self.options.ratios);

        let images = self.document.page_images(page)?;
        if images.is_empty() {
            trace!("Page {} has no images", page);
            return Ok(());
        }

        let placements = self.document.image_placements(page).unwrap_or_else(|e| {
            warn!("Could not get image placements on page {}: {}", page, e);
            Placements::new()
        });

        let mut processed = HashSet::new();
        for image in &images {
            if !image.is_valid() || !processed.insert(image.xref) {
                continue;
            }

            let rects = placements.get(&image.xref).map(Vec::as_slice).unwrap_or(&[]);
            if is_header_footer_only(rects, limits) {
                debug!(
                    "Skipping header/footer image {} on page {}",
                    image.xref, page
                );
                self.summary.header_footer_skipped += 1;
                continue;
            }

            match self.write_image(page, image).await {
                Ok(Some(key)) => {
                    self.summary.images_written += 1;
                    self.summary.written.push(key);
                }
                Ok(None) => {
                    trace!("No image data for {} on page {}", image.xref, page);
                    self.summary.images_without_data += 1;
                }
                Err(e) => {
                    warn!(
                        "Error extracting/saving image {} from page {}: {}",
                        image.xref, page, e
                    );
                    self.summary.images_failed += 1;
                }
            }
        }

        Ok(())
    }

    /// Extract, normalize and write one image. Returns the written key.
    async fn write_image(
        &self,
        page: u32,
        image: &ImageRef,
    ) -> Result<Option<String>, ImageError> {
        let Some(extracted) = self.document.extract_image(image)? else {
            return Ok(None);
        };

        let normalized = normalize(&extracted, self.options.jpeg_quality)?;
        let name = OutputName::new(
            self.base_name.as_str(),
            page,
            self.summary.images_written + 1,
        );
        let key = name.object_key(self.target.dir);
        let content_type = normalized.content_type();
        let (width, height) = (normalized.width, normalized.height);

        self.target
            .store
            .put_object(self.target.bucket, &key, normalized.data, content_type)
            .await?;

        debug!(
            "Saved {} ({}x{}, from {})",
            key,
            width,
            height,
            extracted.format.extension()
        );
        Ok(Some(key))
    }
}
