//! Error types for the pdfimg-core library.
//!
//! Each enum maps to one containment scope: a [`DocumentError`] ends the document,
//! a [`PageError`] skips one page and an [`ImageError`] skips one image. The
//! orchestration layer decides where each kind stops.

use thiserror::Error;

/// Main error type for the pdfimg library.
#[derive(Error, Debug)]
pub enum PdfImgError {
    /// Document-fatal error.
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    /// Page-local error.
    #[error("page error: {0}")]
    Page(#[from] PageError),

    /// Image-local error.
    #[error("image error: {0}")]
    Image(#[from] ImageError),

    /// Object storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Trigger handling error.
    #[error("trigger error: {0}")]
    Trigger(#[from] TriggerError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors that make a whole document unprocessable.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// Failed to open/parse the PDF.
    #[error("failed to open PDF: {0}")]
    Open(String),

    /// The PDF is encrypted and the empty password does not unlock it.
    #[error("PDF is encrypted")]
    Encrypted,
}

/// Errors confined to a single page.
#[derive(Error, Debug)]
pub enum PageError {
    /// Page number outside the document.
    #[error("invalid page number: {0}")]
    MissingPage(u32),

    /// The page has no usable page box.
    #[error("unreadable page geometry: {0}")]
    Geometry(String),

    /// Header/footer zones cannot be computed for a page without height.
    #[error("page {page} has non-positive height {height}")]
    NonPositiveHeight { page: u32, height: f32 },

    /// The image list or its placements could not be read.
    #[error("failed to list images: {0}")]
    Images(String),
}

/// Errors confined to a single embedded image.
#[derive(Error, Debug)]
pub enum ImageError {
    /// The reference points at nothing.
    #[error("image object {0} not found")]
    MissingObject(u32),

    /// The reference does not resolve to an image XObject.
    #[error("object {0} is not an image")]
    NotAnImage(u32),

    /// The stream uses a filter the codec cannot read.
    #[error("unsupported image filter: {0}")]
    UnsupportedFilter(String),

    /// The color space cannot be mapped to a raster layout.
    #[error("unsupported color space: {0}")]
    UnsupportedColorSpace(String),

    /// Bits per component other than 1, 2, 4, 8 or 16.
    #[error("unsupported bits per component: {0}")]
    UnsupportedBitDepth(u8),

    /// Stream decompression failed.
    #[error("failed to decode stream: {0}")]
    Filter(String),

    /// Pixel data shorter than the declared geometry.
    #[error("raster data too short: expected {expected} bytes, got {actual}")]
    MalformedRaster { expected: usize, actual: usize },

    /// The codec could not decode the extracted bytes.
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// The codec could not encode the normalized image.
    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    /// Writing the encoded image to the sink failed.
    #[error("failed to write image: {0}")]
    Write(#[from] StorageError),
}

/// Errors reported by object storage backends.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The requested object does not exist.
    #[error("object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    /// The requested bucket does not exist.
    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    /// The transfer did not finish in time.
    #[error("transfer timed out after {0}s")]
    Timeout(u64),

    /// Local filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Unexpected failures while handling a trigger event.
#[derive(Error, Debug)]
pub enum TriggerError {
    /// The event payload lacks required fields or is not JSON.
    #[error("malformed event: {0}")]
    MalformedEvent(#[from] serde_json::Error),

    /// A storage failure other than a missing resource.
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for the pdfimg library.
pub type Result<T> = std::result::Result<T, PdfImgError>;
