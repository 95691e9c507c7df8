//! Synthetic PDFs for tests.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

pub(crate) struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl PdfBuilder {
    pub(crate) fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub(crate) fn add_object(&mut self, object: impl Into<Object>) -> ObjectId {
        self.doc.add_object(object)
    }

    pub(crate) fn add_image(&mut self, stream: Stream) -> ObjectId {
        self.doc.add_object(stream)
    }

    /// Add a 600 x `height` page with the given XObjects and content operations.
    pub(crate) fn add_page(
        &mut self,
        height: f32,
        xobjects: &[(&str, ObjectId)],
        operations: Vec<Operation>,
    ) -> ObjectId {
        let mut xobject_dict = Dictionary::new();
        for (name, id) in xobjects {
            xobject_dict.set(*name, *id);
        }

        let content = Content { operations }.encode().unwrap();
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 600.into(), Object::Real(height)],
            "Contents" => content_id,
            "Resources" => dictionary! { "XObject" => xobject_dict },
        });
        self.kids.push(page_id.into());
        page_id
    }

    pub(crate) fn set_page_entry(&mut self, page_id: ObjectId, key: &str, value: Object) {
        if let Ok(Object::Dictionary(dict)) = self.doc.get_object_mut(page_id) {
            dict.set(key, value);
        }
    }

    pub(crate) fn set_trailer_entry(&mut self, key: &str, value: Object) {
        self.doc.trailer.set(key, value);
    }

    pub(crate) fn build(mut self) -> Vec<u8> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        self.doc.save_to(&mut buf).unwrap();
        buf
    }
}

/// Uncompressed DeviceRGB image filled with one color.
pub(crate) fn rgb_image(width: u32, height: u32, color: [u8; 3]) -> Stream {
    let data = color.repeat((width * height) as usize);
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        data,
    )
}

/// JPEG file bytes of a solid gray image.
pub(crate) fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 90, 90])));
    let mut data = Vec::new();
    img.write_to(&mut Cursor::new(&mut data), ImageFormat::Jpeg)
        .unwrap();
    data
}

/// DCT-encoded image XObject.
pub(crate) fn jpeg_image(width: u32, height: u32) -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg_bytes(width, height),
    )
}

/// DCT image stored under an outer FlateDecode, `/Filter [/FlateDecode /DCTDecode]`.
pub(crate) fn flate_jpeg_image(width: u32, height: u32) -> Stream {
    let mut stream = jpeg_image(width, height);
    stream.dict.remove(b"Filter");
    stream.compress().unwrap();
    assert_eq!(
        stream.dict.get(b"Filter").and_then(Object::as_name).ok(),
        Some(b"FlateDecode".as_slice()),
        "solid JPEG did not compress"
    );
    stream.dict.set(
        "Filter",
        vec![Object::from("FlateDecode"), Object::from("DCTDecode")],
    );
    stream
}

/// Paint XObject `name` into the PDF-space box at (`x`, `y`) of size `w` x `h`.
pub(crate) fn draw_image(name: &str, x: f32, y: f32, w: f32, h: f32) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                Object::Real(w),
                0.into(),
                0.into(),
                Object::Real(h),
                Object::Real(x),
                Object::Real(y),
            ],
        ),
        Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]
}
