//! Core library for extracting embedded images from PDFs in object storage.
//!
//! This crate provides:
//! - PDF access (page geometry, image enumeration, placement rectangles, raw image data)
//! - Header/footer filtering by page position
//! - Normalization of every kept image to opaque RGB JPEG
//! - Storage-event handling and object-store backends (memory, local, S3)

pub mod error;
pub mod filter;
pub mod models;
pub mod naming;
pub mod normalize;
pub mod pdf;
pub mod pipeline;
pub mod storage;
pub mod trigger;

pub use error::{PdfImgError, Result};
pub use filter::{is_header_footer_only, ZoneLimits, ZoneRatios};
pub use models::config::{ExtractorConfig, S3Config};
pub use models::image::{ExtractedImage, ImageRef, NormalizedImage, Rect, SourceFormat};
pub use pdf::{PageImageSource, PdfDocument};
pub use pipeline::{extract_document_images, process_pdf, ExtractOptions, ExtractionSummary};
pub use storage::{LocalStore, MemoryStore, ObjectStore, OutputTarget};
pub use trigger::{handle_event, screen_event, IgnoreReason, StorageEvent, TriggerOutcome};

#[cfg(feature = "s3")]
pub use storage::S3Store;
