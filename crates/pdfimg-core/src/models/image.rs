//! Image references, placements and extracted payloads.

use serde::Serialize;

/// Axis-aligned rectangle in top-down page coordinates.
///
/// The origin is the top-left corner of the page box and `y` grows downward, so
/// `y0` is the top edge and `y1` the bottom edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    /// Create a rectangle, normalizing the corner order.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}

/// One embedded image object referenced by a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Cross-reference object number. Zero marks a direct (unreferenced) entry.
    pub xref: u32,
    /// Generation number of the object.
    pub generation: u16,
    /// Resource name the page uses for the image.
    pub name: String,
}

impl ImageRef {
    /// Whether this reference can be resolved to an indirect object.
    pub fn is_valid(&self) -> bool {
        self.xref != 0
    }

    pub fn object_id(&self) -> (u32, u16) {
        (self.xref, self.generation)
    }
}

/// Encoding of the bytes handed out by the PDF layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Raw DCT stream copied out of the PDF.
    Jpeg,
    /// Raster rebuilt from decoded samples.
    Png,
}

impl SourceFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }

    pub(crate) fn image_format(&self) -> ::image::ImageFormat {
        match self {
            Self::Jpeg => ::image::ImageFormat::Jpeg,
            Self::Png => ::image::ImageFormat::Png,
        }
    }
}

/// Encoded bytes of one embedded image as stored in (or rebuilt from) the PDF.
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    /// Encoded image data.
    pub data: Vec<u8>,
    /// Encoding of `data`.
    pub format: SourceFormat,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// An image re-encoded into the fixed output format.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    /// JPEG bytes.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl NormalizedImage {
    pub const EXTENSION: &'static str = "jpg";
    pub const CONTENT_TYPE: &'static str = "image/jpeg";

    pub fn extension(&self) -> &'static str {
        Self::EXTENSION
    }

    pub fn content_type(&self) -> &'static str {
        Self::CONTENT_TYPE
    }
}
