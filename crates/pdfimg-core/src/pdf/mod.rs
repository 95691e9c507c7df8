//! PDF access: pages, embedded images, placements and image bytes.

mod document;
mod extractor;
mod placement;

#[cfg(test)]
pub(crate) mod fixtures;

pub use document::PdfDocument;

use std::collections::HashMap;

use crate::error::{ImageError, PageError};
use crate::models::image::{ExtractedImage, ImageRef, Rect};

/// Placement rectangles of each image on a page, keyed by reference id.
pub type Placements = HashMap<u32, Vec<Rect>>;

/// The page/image enumeration capability the extractor relies on.
///
/// Pages are numbered from 1.
pub trait PageImageSource {
    /// Number of pages in the document.
    fn page_count(&self) -> u32;

    /// Height of a page in document units.
    fn page_height(&self, page: u32) -> Result<f32, PageError>;

    /// Embedded images referenced by a page, in resource order. May repeat ids.
    fn page_images(&self, page: u32) -> Result<Vec<ImageRef>, PageError>;

    /// Where each image is drawn on a page, in top-down page coordinates.
    fn image_placements(&self, page: u32) -> Result<Placements, PageError>;

    /// Encoded bytes of one image, or `None` when the object carries no pixel data.
    fn extract_image(&self, image: &ImageRef) -> Result<Option<ExtractedImage>, ImageError>;
}
