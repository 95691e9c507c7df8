//! Normalization of extracted images to a single JPEG output format.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};
use tracing::trace;

use crate::error::ImageError;
use crate::models::image::{ExtractedImage, NormalizedImage};

/// Quality used for every re-encoded image.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Decode an extracted image and re-encode it as an opaque RGB JPEG.
pub fn normalize(extracted: &ExtractedImage, quality: u8) -> Result<NormalizedImage, ImageError> {
    let decoded = decode(extracted)?;
    trace!(
        "Normalizing {}x{} {:?} image",
        decoded.width(),
        decoded.height(),
        decoded.color()
    );

    let rgb = to_opaque_rgb(&decoded);
    let (width, height) = rgb.dimensions();

    let mut data = Vec::new();
    JpegEncoder::new_with_quality(&mut data, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(ImageError::Encode)?;

    Ok(NormalizedImage {
        data,
        width,
        height,
    })
}

/// Decode bytes, sniffing the format first and falling back to the source hint.
fn decode(extracted: &ExtractedImage) -> Result<DynamicImage, ImageError> {
    match image::load_from_memory(&extracted.data) {
        Ok(decoded) => Ok(decoded),
        Err(image::ImageError::Unsupported(_)) => {
            image::load_from_memory_with_format(&extracted.data, extracted.format.image_format())
                .map_err(ImageError::Decode)
        }
        Err(e) => Err(ImageError::Decode(e)),
    }
}

/// Flatten any color mode to 8-bit RGB.
///
/// Images with an alpha channel are composited over white. Palette images arrive
/// from the decoder already expanded, so they take the plain conversion path.
pub fn to_opaque_rgb(decoded: &DynamicImage) -> RgbImage {
    if !decoded.color().has_alpha() {
        return decoded.to_rgb8();
    }

    let rgba = decoded.to_rgba8();
    let mut background = RgbImage::from_pixel(rgba.width(), rgba.height(), Rgb([255, 255, 255]));

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u16::from(a);
        let blend = |c: u8| -> u8 {
            ((u16::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8
        };
        background.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }

    background
}
