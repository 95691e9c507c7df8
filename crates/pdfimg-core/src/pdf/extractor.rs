//! Image XObject extraction using lopdf.
//!
//! DCT streams are handed out as the JPEG bytes stored in the file, after undoing
//! any outer filters. A DCT image with a soft mask is decoded and rebuilt as PNG
//! so the mask survives. Other rasters are decompressed, expanded to 8-bit samples
//! and rebuilt as PNG.

use std::io::Cursor;

use image::{DynamicImage, GrayAlphaImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use lopdf::{Dictionary, Document, Object, Stream};
use tracing::{debug, trace};

use super::document::subtype;
use crate::error::ImageError;
use crate::models::image::{ExtractedImage, ImageRef, SourceFormat};

pub(crate) fn extract_image(
    doc: &Document,
    image: &ImageRef,
) -> Result<Option<ExtractedImage>, ImageError> {
    let stream = doc
        .get_object(image.object_id())
        .map_err(|_| ImageError::MissingObject(image.xref))?
        .as_stream()
        .map_err(|_| ImageError::NotAnImage(image.xref))?;
    let dict = &stream.dict;

    if subtype(dict) != Some(b"Image".as_slice()) {
        return Err(ImageError::NotAnImage(image.xref));
    }

    // Stencil masks carry no color of their own.
    if dict.get(b"ImageMask").and_then(Object::as_bool).unwrap_or(false) {
        trace!("Image {} is a stencil mask", image.xref);
        return Ok(None);
    }

    let width = positive_int(dict, b"Width").ok_or(ImageError::NotAnImage(image.xref))?;
    let height = positive_int(dict, b"Height").ok_or(ImageError::NotAnImage(image.xref))?;

    if stream.content.is_empty() {
        return Ok(None);
    }

    let filters = filter_names(dict);
    trace!(
        "Image {}: {}x{}, filters={:?}",
        image.xref, width, height, filters
    );

    match filters.last().map(String::as_str) {
        Some("DCTDecode") => {
            let data = jpeg_payload(stream, &filters[..filters.len() - 1])?;
            return dct_image(doc, dict, data, width, height).map(Some);
        }
        Some(filter @ ("JPXDecode" | "CCITTFaxDecode" | "JBIG2Decode")) => {
            return Err(ImageError::UnsupportedFilter(if filters.len() == 1 {
                filter.to_string()
            } else {
                filters.join(" ")
            }));
        }
        _ => {}
    }

    let samples = stream_samples(stream)?;
    let color_space = match dict.get(b"ColorSpace") {
        Ok(obj) => ColorSpace::resolve(doc, obj)?,
        Err(_) => return Err(ImageError::UnsupportedColorSpace("missing".to_string())),
    };
    let bits = dict
        .get(b"BitsPerComponent")
        .and_then(Object::as_i64)
        .unwrap_or(8) as u8;

    let raster = Raster::new(width, height, bits, color_space.components())?;
    let mut decoded = raster.to_image(&samples, &color_space)?;

    if let Some(alpha) = soft_mask(doc, dict, width, height) {
        decoded = attach_alpha(decoded, alpha);
    }

    png_image(decoded, width, height).map(Some)
}

/// JPEG bytes of a DCT stream, undoing any filters applied on top of it.
fn jpeg_payload(stream: &Stream, outer: &[String]) -> Result<Vec<u8>, ImageError> {
    if outer.is_empty() {
        return Ok(stream.content.clone());
    }

    let mut unwrapped = stream.clone();
    let names: Vec<Object> = outer
        .iter()
        .map(|filter| Object::Name(filter.as_bytes().to_vec()))
        .collect();
    unwrapped.dict.set("Filter", names);
    if let Ok(Object::Array(params)) = stream.dict.get(b"DecodeParms") {
        match params.first() {
            Some(first) if outer.len() == 1 => unwrapped.dict.set("DecodeParms", first.clone()),
            _ => {
                unwrapped.dict.remove(b"DecodeParms");
            }
        }
    }

    unwrapped
        .decompressed_content()
        .map_err(|e| ImageError::Filter(e.to_string()))
}

/// A DCT image: the stored JPEG as is, or rebuilt as PNG when a soft mask applies.
fn dct_image(
    doc: &Document,
    dict: &Dictionary,
    data: Vec<u8>,
    width: u32,
    height: u32,
) -> Result<ExtractedImage, ImageError> {
    let Some(alpha) = soft_mask(doc, dict, width, height) else {
        return Ok(ExtractedImage {
            data,
            format: SourceFormat::Jpeg,
            width,
            height,
        });
    };

    let decoded = image::load_from_memory_with_format(&data, ImageFormat::Jpeg)
        .map_err(ImageError::Decode)?;
    png_image(attach_alpha(decoded, alpha), width, height)
}

fn png_image(decoded: DynamicImage, width: u32, height: u32) -> Result<ExtractedImage, ImageError> {
    let mut data = Vec::new();
    decoded
        .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
        .map_err(ImageError::Encode)?;

    Ok(ExtractedImage {
        data,
        format: SourceFormat::Png,
        width,
        height,
    })
}

fn positive_int(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    dict.get(key)
        .and_then(Object::as_i64)
        .ok()
        .filter(|v| *v > 0)
        .and_then(|v| u32::try_from(v).ok())
}

/// Filter names in application order.
fn filter_names(dict: &Dictionary) -> Vec<String> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![String::from_utf8_lossy(name).to_string()],
        Ok(Object::Array(arr)) => arr
            .iter()
            .filter_map(|o| o.as_name().ok())
            .map(|name| String::from_utf8_lossy(name).to_string())
            .collect(),
        _ => Vec::new(),
    }
}

/// Decompressed stream content, or the raw content when unfiltered.
fn stream_samples(stream: &Stream) -> Result<Vec<u8>, ImageError> {
    if stream.dict.has(b"Filter") {
        stream
            .decompressed_content()
            .map_err(|e| ImageError::Filter(e.to_string()))
    } else {
        Ok(stream.content.clone())
    }
}

/// Color spaces that can be expanded to gray or RGB samples.
#[derive(Debug, Clone, PartialEq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    Indexed {
        base: Box<ColorSpace>,
        hival: u8,
        lookup: Vec<u8>,
    },
}

impl ColorSpace {
    fn resolve(doc: &Document, obj: &Object) -> Result<Self, ImageError> {
        let (_, obj) = doc
            .dereference(obj)
            .map_err(|e| ImageError::UnsupportedColorSpace(e.to_string()))?;

        match obj {
            Object::Name(name) => Self::from_family(name),
            Object::Array(arr) => {
                let family = arr
                    .first()
                    .and_then(|o| o.as_name().ok())
                    .ok_or_else(|| ImageError::UnsupportedColorSpace("empty array".to_string()))?;

                match family {
                    b"ICCBased" => Self::icc_based(doc, arr.get(1)),
                    b"Indexed" | b"I" => Self::indexed(doc, arr),
                    _ => Self::from_family(family),
                }
            }
            _ => Err(ImageError::UnsupportedColorSpace(
                "not a name or array".to_string(),
            )),
        }
    }

    fn from_family(name: &[u8]) -> Result<Self, ImageError> {
        match name {
            b"DeviceGray" | b"G" | b"CalGray" => Ok(Self::Gray),
            b"DeviceRGB" | b"RGB" | b"CalRGB" => Ok(Self::Rgb),
            b"DeviceCMYK" | b"CMYK" => Ok(Self::Cmyk),
            other => Err(ImageError::UnsupportedColorSpace(
                String::from_utf8_lossy(other).to_string(),
            )),
        }
    }

    /// ICC profiles are approximated by their component count.
    fn icc_based(doc: &Document, profile: Option<&Object>) -> Result<Self, ImageError> {
        let components = profile
            .and_then(|p| doc.dereference(p).ok())
            .and_then(|(_, p)| p.as_stream().ok())
            .and_then(|s| s.dict.get(b"N").and_then(Object::as_i64).ok());

        match components {
            Some(1) => Ok(Self::Gray),
            Some(3) => Ok(Self::Rgb),
            Some(4) => Ok(Self::Cmyk),
            other => Err(ImageError::UnsupportedColorSpace(format!(
                "ICCBased with N={other:?}"
            ))),
        }
    }

    fn indexed(doc: &Document, arr: &[Object]) -> Result<Self, ImageError> {
        let [_, base, hival, lookup] = arr else {
            return Err(ImageError::UnsupportedColorSpace(
                "Indexed needs 4 entries".to_string(),
            ));
        };

        let base = Self::resolve(doc, base)?;
        if matches!(base, Self::Indexed { .. }) {
            return Err(ImageError::UnsupportedColorSpace(
                "nested Indexed".to_string(),
            ));
        }

        let hival = hival
            .as_i64()
            .ok()
            .and_then(|v| u8::try_from(v).ok())
            .ok_or_else(|| ImageError::UnsupportedColorSpace("bad Indexed hival".to_string()))?;

        let lookup = match doc.dereference(lookup) {
            Ok((_, Object::String(bytes, _))) => bytes.clone(),
            Ok((_, Object::Stream(stream))) => stream_samples(stream)?,
            _ => {
                return Err(ImageError::UnsupportedColorSpace(
                    "bad Indexed lookup".to_string(),
                ));
            }
        };

        Ok(Self::Indexed {
            base: Box::new(base),
            hival,
            lookup,
        })
    }

    fn components(&self) -> usize {
        match self {
            Self::Gray | Self::Indexed { .. } => 1,
            Self::Rgb => 3,
            Self::Cmyk => 4,
        }
    }
}

/// Sample layout of an image stream.
#[derive(Debug, Clone, Copy)]
struct Raster {
    width: u32,
    height: u32,
    bits: u8,
    components: usize,
}

impl Raster {
    fn new(width: u32, height: u32, bits: u8, components: usize) -> Result<Self, ImageError> {
        if !matches!(bits, 1 | 2 | 4 | 8 | 16) {
            return Err(ImageError::UnsupportedBitDepth(bits));
        }
        Ok(Self {
            width,
            height,
            bits,
            components,
        })
    }

    /// Bytes per row; rows are padded to a byte boundary.
    fn row_bytes(&self) -> usize {
        (self.width as usize * self.components * self.bits as usize).div_ceil(8)
    }

    /// Unpack samples to one byte each, scaling to 0-255 unless `raw` is set.
    fn unpack(&self, data: &[u8], raw: bool) -> Result<Vec<u8>, ImageError> {
        let row_bytes = self.row_bytes();
        let expected = row_bytes * self.height as usize;
        if data.len() < expected {
            return Err(ImageError::MalformedRaster {
                expected,
                actual: data.len(),
            });
        }

        let per_row = self.width as usize * self.components;
        let mut samples = Vec::with_capacity(per_row * self.height as usize);

        for row in data[..expected].chunks_exact(row_bytes) {
            match self.bits {
                8 => samples.extend_from_slice(&row[..per_row]),
                16 => samples.extend(row.chunks_exact(2).take(per_row).map(|pair| pair[0])),
                bits => {
                    let max = (1u16 << bits) - 1;
                    let per_byte = 8 / bits as usize;
                    for i in 0..per_row {
                        let byte = row[i / per_byte];
                        let shift = 8 - bits as usize * (i % per_byte + 1);
                        let value = (u16::from(byte) >> shift) & max;
                        samples.push(if raw {
                            value as u8
                        } else {
                            (value * 255 / max) as u8
                        });
                    }
                }
            }
        }

        Ok(samples)
    }

    fn to_image(&self, data: &[u8], color_space: &ColorSpace) -> Result<DynamicImage, ImageError> {
        let (w, h) = (self.width, self.height);
        let malformed =
            |expected: usize, actual: usize| ImageError::MalformedRaster { expected, actual };

        match color_space {
            ColorSpace::Gray => {
                let samples = self.unpack(data, false)?;
                let len = samples.len();
                GrayImage::from_raw(w, h, samples)
                    .map(DynamicImage::ImageLuma8)
                    .ok_or_else(|| malformed((w * h) as usize, len))
            }
            ColorSpace::Rgb => {
                let samples = self.unpack(data, false)?;
                let len = samples.len();
                RgbImage::from_raw(w, h, samples)
                    .map(DynamicImage::ImageRgb8)
                    .ok_or_else(|| malformed((w * h * 3) as usize, len))
            }
            ColorSpace::Cmyk => {
                let rgb = cmyk_to_rgb(&self.unpack(data, false)?);
                let len = rgb.len();
                RgbImage::from_raw(w, h, rgb)
                    .map(DynamicImage::ImageRgb8)
                    .ok_or_else(|| malformed((w * h * 3) as usize, len))
            }
            ColorSpace::Indexed {
                base,
                hival,
                lookup,
            } => {
                let indices = self.unpack(data, true)?;
                let base_components = base.components();
                let needed = (*hival as usize + 1) * base_components;
                if lookup.len() < needed {
                    return Err(malformed(needed, lookup.len()));
                }

                let mut expanded = Vec::with_capacity(indices.len() * base_components);
                for index in indices {
                    let start = index.min(*hival) as usize * base_components;
                    expanded.extend_from_slice(&lookup[start..start + base_components]);
                }

                let flat = Raster {
                    bits: 8,
                    components: base_components,
                    ..*self
                };
                flat.to_image(&expanded, base)
            }
        }
    }
}

/// Convert CMYK bytes to RGB.
fn cmyk_to_rgb(cmyk: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity((cmyk.len() / 4) * 3);
    for chunk in cmyk.chunks_exact(4) {
        let k = 255 - u16::from(chunk[3]);
        for &c in &chunk[..3] {
            rgb.push(((255 - u16::from(c)) * k / 255) as u8);
        }
    }
    rgb
}

/// Gray samples of an `/SMask` matching the image size.
fn soft_mask(doc: &Document, dict: &Dictionary, width: u32, height: u32) -> Option<Vec<u8>> {
    let mask = dict
        .get(b"SMask")
        .ok()
        .and_then(|obj| doc.dereference(obj).ok())
        .and_then(|(_, obj)| obj.as_stream().ok())?;

    let mask_width = positive_int(&mask.dict, b"Width")?;
    let mask_height = positive_int(&mask.dict, b"Height")?;
    if (mask_width, mask_height) != (width, height) {
        debug!(
            "Ignoring {}x{} soft mask on {}x{} image",
            mask_width, mask_height, width, height
        );
        return None;
    }

    let bits = mask
        .dict
        .get(b"BitsPerComponent")
        .and_then(Object::as_i64)
        .unwrap_or(8) as u8;
    let samples = stream_samples(mask).ok()?;
    Raster::new(width, height, bits, 1)
        .and_then(|raster| raster.unpack(&samples, false))
        .map_err(|e| debug!("Ignoring unreadable soft mask: {}", e))
        .ok()
}

fn attach_alpha(image: DynamicImage, alpha: Vec<u8>) -> DynamicImage {
    let (w, h) = (image.width(), image.height());
    match image {
        DynamicImage::ImageLuma8(gray) => {
            let data = gray
                .as_raw()
                .iter()
                .zip(&alpha)
                .flat_map(|(&l, &a)| [l, a])
                .collect();
            GrayAlphaImage::from_raw(w, h, data)
                .map(DynamicImage::ImageLumaA8)
                .unwrap_or(DynamicImage::ImageLuma8(gray))
        }
        other => {
            let rgb = other.to_rgb8();
            let data = rgb
                .pixels()
                .zip(alpha)
                .flat_map(|(p, a)| [p[0], p[1], p[2], a])
                .collect();
            RgbaImage::from_raw(w, h, data)
                .map(DynamicImage::ImageRgba8)
                .unwrap_or(DynamicImage::ImageRgb8(rgb))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::{flate_jpeg_image, jpeg_bytes, PdfBuilder};
    use image::GenericImageView;
    use lopdf::dictionary;
    use pretty_assertions::assert_eq;

    fn image_ref(id: lopdf::ObjectId) -> ImageRef {
        ImageRef {
            xref: id.0,
            generation: id.1,
            name: "Im".to_string(),
        }
    }

    fn image_stream(dict: Dictionary, content: Vec<u8>) -> Stream {
        let mut base = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
        };
        for (key, value) in dict.iter() {
            base.set(key.clone(), value.clone());
        }
        Stream::new(base, content)
    }

    fn extract(
        builder: PdfBuilder,
        id: lopdf::ObjectId,
    ) -> Result<Option<ExtractedImage>, ImageError> {
        let doc = Document::load_mem(&builder.build()).unwrap();
        extract_image(&doc, &image_ref(id))
    }

    #[test]
    fn test_dct_passthrough() {
        let jpeg = jpeg_bytes(4, 3);
        let mut builder = PdfBuilder::new();
        let id = builder.add_image(image_stream(
            dictionary! {
                "Width" => 4, "Height" => 3, "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8, "Filter" => "DCTDecode",
            },
            jpeg.clone(),
        ));

        let extracted = extract(builder, id).unwrap().unwrap();
        assert_eq!(extracted.format, SourceFormat::Jpeg);
        assert_eq!(extracted.data, jpeg);
    }

    #[test]
    fn test_flate_wrapped_dct_unwrapped_to_jpeg() {
        let mut builder = PdfBuilder::new();
        let id = builder.add_image(flate_jpeg_image(128, 128));

        let extracted = extract(builder, id).unwrap().unwrap();
        assert_eq!(extracted.format, SourceFormat::Jpeg);
        assert_eq!(extracted.data, jpeg_bytes(128, 128));
    }

    #[test]
    fn test_dct_with_soft_mask_rebuilt_as_png() {
        let mut builder = PdfBuilder::new();
        let mask = builder.add_image(image_stream(
            dictionary! {
                "Width" => 4, "Height" => 3, "ColorSpace" => "DeviceGray", "BitsPerComponent" => 8,
            },
            vec![128; 12],
        ));
        let id = builder.add_image(image_stream(
            dictionary! {
                "Width" => 4, "Height" => 3, "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8, "Filter" => "DCTDecode", "SMask" => mask,
            },
            jpeg_bytes(4, 3),
        ));

        let extracted = extract(builder, id).unwrap().unwrap();
        assert_eq!(extracted.format, SourceFormat::Png);
        let decoded =
            image::load_from_memory_with_format(&extracted.data, ImageFormat::Png).unwrap();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert!(decoded.color().has_alpha());
        assert_eq!(decoded.to_rgba8().get_pixel(0, 0).0[3], 128);
    }

    #[test]
    fn test_short_alpha_keeps_gray_pixels() {
        let gray = GrayImage::from_raw(2, 1, vec![10, 20]).unwrap();
        let result = attach_alpha(DynamicImage::ImageLuma8(gray), vec![255]);
        assert!(!result.color().has_alpha());
        assert_eq!(result.to_luma8().into_raw(), vec![10, 20]);
    }

    #[test]
    fn test_raw_rgb_rebuilt_as_png() {
        let mut builder = PdfBuilder::new();
        let id = builder.add_image(image_stream(
            dictionary! {
                "Width" => 2, "Height" => 1, "ColorSpace" => "DeviceRGB", "BitsPerComponent" => 8,
            },
            vec![255, 0, 0, 0, 0, 255],
        ));

        let extracted = extract(builder, id).unwrap().unwrap();
        assert_eq!(extracted.format, SourceFormat::Png);
        let decoded = image::load_from_memory(&extracted.data).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(decoded.get_pixel(1, 0).0, [0, 0, 255]);
    }

    #[test]
    fn test_indexed_palette_expanded() {
        let mut builder = PdfBuilder::new();
        let palette = Object::String(vec![0, 0, 0, 0, 255, 0], lopdf::StringFormat::Hexadecimal);
        let id = builder.add_image(image_stream(
            dictionary! {
                "Width" => 4, "Height" => 1, "BitsPerComponent" => 1,
                "ColorSpace" => vec!["Indexed".into(), "DeviceRGB".into(), 1.into(), palette],
            },
            vec![0b0101_0000],
        ));

        let extracted = extract(builder, id).unwrap().unwrap();
        let decoded = image::load_from_memory(&extracted.data).unwrap();
        assert_eq!(decoded.dimensions(), (4, 1));
        let rgb = decoded.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(rgb.get_pixel(1, 0).0, [0, 255, 0]);
    }

    #[test]
    fn test_gray_with_soft_mask_has_alpha() {
        let mut builder = PdfBuilder::new();
        let mask = builder.add_image(image_stream(
            dictionary! {
                "Width" => 2, "Height" => 1, "ColorSpace" => "DeviceGray", "BitsPerComponent" => 8,
            },
            vec![0, 255],
        ));
        let id = builder.add_image(image_stream(
            dictionary! {
                "Width" => 2, "Height" => 1, "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8, "SMask" => mask,
            },
            vec![10, 20],
        ));

        let extracted = extract(builder, id).unwrap().unwrap();
        let decoded = image::load_from_memory(&extracted.data).unwrap();
        assert!(decoded.color().has_alpha());
        assert_eq!(decoded.to_luma_alpha8().get_pixel(0, 0).0, [10, 0]);
    }

    #[test]
    fn test_cmyk_converted() {
        let mut builder = PdfBuilder::new();
        let id = builder.add_image(image_stream(
            dictionary! {
                "Width" => 1, "Height" => 1, "ColorSpace" => "DeviceCMYK", "BitsPerComponent" => 8,
            },
            vec![0, 255, 255, 0],
        ));

        let extracted = extract(builder, id).unwrap().unwrap();
        let rgb = image::load_from_memory(&extracted.data).unwrap().to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 0, 0]);
    }

    #[test]
    fn test_stencil_mask_has_no_data() {
        let mut builder = PdfBuilder::new();
        let id = builder.add_image(image_stream(
            dictionary! { "Width" => 8, "Height" => 1, "ImageMask" => true },
            vec![0xff],
        ));
        assert!(extract(builder, id).unwrap().is_none());
    }

    #[test]
    fn test_unsupported_filter() {
        let mut builder = PdfBuilder::new();
        let id = builder.add_image(image_stream(
            dictionary! {
                "Width" => 1, "Height" => 1, "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8, "Filter" => "JPXDecode",
            },
            vec![1, 2, 3],
        ));
        assert!(matches!(
            extract(builder, id),
            Err(ImageError::UnsupportedFilter(f)) if f == "JPXDecode"
        ));
    }

    #[test]
    fn test_short_raster_is_malformed() {
        let mut builder = PdfBuilder::new();
        let id = builder.add_image(image_stream(
            dictionary! {
                "Width" => 10, "Height" => 10, "ColorSpace" => "DeviceRGB", "BitsPerComponent" => 8,
            },
            vec![0; 30],
        ));
        assert!(matches!(
            extract(builder, id),
            Err(ImageError::MalformedRaster { expected: 300, actual: 30 })
        ));
    }

    #[test]
    fn test_missing_object() {
        let builder = PdfBuilder::new();
        assert!(matches!(
            extract(builder, (999, 0)),
            Err(ImageError::MissingObject(999))
        ));
    }

    #[test]
    fn test_unpack_two_bit_gray() {
        let raster = Raster::new(4, 1, 2, 1).unwrap();
        assert_eq!(
            raster.unpack(&[0b00_01_10_11], false).unwrap(),
            vec![0, 85, 170, 255]
        );
        assert_eq!(raster.unpack(&[0b00_01_10_11], true).unwrap(), vec![0, 1, 2, 3]);
    }
}
