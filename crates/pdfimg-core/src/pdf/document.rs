//! lopdf-backed document handle.

use std::collections::{BTreeMap, HashSet};

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, trace};

use super::placement::{Matrix, PageBox, PlacementScanner};
use super::{extractor, PageImageSource, Placements};
use crate::error::{DocumentError, ImageError, PageError};
use crate::models::image::{ExtractedImage, ImageRef};

/// Guard against malformed page trees with cyclic `Parent` links.
const MAX_TREE_DEPTH: usize = 64;

/// An opened PDF. The underlying document is released when this is dropped.
pub struct PdfDocument {
    document: Document,
    pages: BTreeMap<u32, ObjectId>,
}

impl PdfDocument {
    /// Parse a PDF from memory.
    pub fn load(data: &[u8]) -> Result<Self, DocumentError> {
        let mut document =
            Document::load_mem(data).map_err(|e| DocumentError::Open(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if document.is_encrypted() {
            if document.decrypt("").is_err() {
                return Err(DocumentError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");
        }

        let pages = document.get_pages();
        debug!("Loaded PDF with {} pages", pages.len());

        Ok(Self { document, pages })
    }

    /// Access the underlying lopdf document.
    pub fn inner(&self) -> &Document {
        &self.document
    }

    fn page_id(&self, page: u32) -> Result<ObjectId, PageError> {
        self.pages
            .get(&page)
            .copied()
            .ok_or(PageError::MissingPage(page))
    }

    /// Look up a page attribute, following `Parent` links for inherited values.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut node = Some(page_id);
        let mut depth = 0;

        while let Some(id) = node {
            let dict = self.document.get_dictionary(id).ok()?;
            if let Ok(value) = dict.get(key) {
                return self.document.dereference(value).ok().map(|(_, obj)| obj);
            }

            depth += 1;
            if depth > MAX_TREE_DEPTH {
                return None;
            }
            node = dict.get(b"Parent").and_then(Object::as_reference).ok();
        }
        None
    }

    /// Visible page box: CropBox if present, else MediaBox.
    fn page_box(&self, page_id: ObjectId) -> Result<PageBox, PageError> {
        let obj = self
            .inherited(page_id, b"CropBox")
            .or_else(|| self.inherited(page_id, b"MediaBox"))
            .ok_or_else(|| PageError::Geometry("no MediaBox on page or ancestors".to_string()))?;

        let array = obj
            .as_array()
            .map_err(|e| PageError::Geometry(format!("page box is not an array: {e}")))?;
        if array.len() != 4 {
            return Err(PageError::Geometry(format!(
                "page box has {} entries",
                array.len()
            )));
        }

        let mut coords = [0.0f32; 4];
        for (slot, value) in coords.iter_mut().zip(array) {
            *slot = self
                .document
                .dereference(value)
                .and_then(|(_, v)| v.as_float())
                .map_err(|e| PageError::Geometry(format!("non-numeric page box entry: {e}")))?;
        }

        Ok(PageBox::from_corners(coords))
    }

    fn page_resources(&self, page_id: ObjectId) -> Option<&Dictionary> {
        self.inherited(page_id, b"Resources")
            .and_then(|obj| obj.as_dict().ok())
    }

    /// The `/XObject` subdictionary of a resource dictionary.
    pub(crate) fn xobjects<'a>(
        &'a self,
        resources: &'a Dictionary,
    ) -> Result<Option<&'a Dictionary>, PageError> {
        let Ok(entry) = resources.get(b"XObject") else {
            return Ok(None);
        };

        match self.document.dereference(entry) {
            Ok((_, Object::Dictionary(dict))) => Ok(Some(dict)),
            Ok(_) => Err(PageError::Images(
                "XObject resource is not a dictionary".to_string(),
            )),
            Err(e) => Err(PageError::Images(format!("unresolvable XObject resource: {e}"))),
        }
    }

    fn collect_images(
        &self,
        xobjects: &Dictionary,
        images: &mut Vec<ImageRef>,
        visited_forms: &mut HashSet<ObjectId>,
    ) {
        for (name, entry) in xobjects.iter() {
            let name = String::from_utf8_lossy(name).to_string();

            let (id, object) = match entry {
                Object::Reference(id) => match self.document.get_object(*id) {
                    Ok(object) => (Some(*id), object),
                    Err(e) => {
                        debug!("Dangling XObject /{} ({:?}): {}", name, id, e);
                        continue;
                    }
                },
                direct => (None, direct),
            };

            let Ok(stream) = object.as_stream() else {
                continue;
            };

            match subtype(&stream.dict) {
                Some(b"Image") => {
                    let (xref, generation) = id.unwrap_or((0, 0));
                    images.push(ImageRef {
                        xref,
                        generation,
                        name,
                    });
                }
                Some(b"Form") => {
                    let Some(form_id) = id else { continue };
                    if !visited_forms.insert(form_id) {
                        continue;
                    }
                    trace!("Descending into form XObject /{} {:?}", name, form_id);
                    let nested = stream
                        .dict
                        .get(b"Resources")
                        .ok()
                        .and_then(|res| self.document.dereference(res).ok())
                        .and_then(|(_, res)| res.as_dict().ok())
                        .and_then(|res| self.xobjects(res).ok().flatten());
                    if let Some(nested) = nested {
                        self.collect_images(nested, images, visited_forms);
                    }
                }
                _ => {}
            }
        }
    }
}

pub(crate) fn subtype(dict: &Dictionary) -> Option<&[u8]> {
    dict.get(b"Subtype").and_then(Object::as_name).ok()
}

impl PageImageSource for PdfDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_height(&self, page: u32) -> Result<f32, PageError> {
        let page_id = self.page_id(page)?;
        Ok(self.page_box(page_id)?.height())
    }

    fn page_images(&self, page: u32) -> Result<Vec<ImageRef>, PageError> {
        let page_id = self.page_id(page)?;
        let mut images = Vec::new();

        let Some(resources) = self.page_resources(page_id) else {
            return Ok(images);
        };
        if let Some(xobjects) = self.xobjects(resources)? {
            self.collect_images(xobjects, &mut images, &mut HashSet::new());
        }

        trace!("Page {} references {} images", page, images.len());
        Ok(images)
    }

    fn image_placements(&self, page: u32) -> Result<Placements, PageError> {
        let page_id = self.page_id(page)?;
        let page_box = self.page_box(page_id)?;
        let content = self
            .document
            .get_page_content(page_id)
            .map_err(|e| PageError::Images(format!("unreadable content stream: {e}")))?;

        let mut scanner = PlacementScanner::new(self, page_box);
        scanner.scan(&content, self.page_resources(page_id), Matrix::identity())?;
        Ok(scanner.into_placements())
    }

    fn extract_image(&self, image: &ImageRef) -> Result<Option<ExtractedImage>, ImageError> {
        extractor::extract_image(&self.document, image)
    }
}

impl Drop for PdfDocument {
    fn drop(&mut self) {
        trace!("Released PDF document with {} pages", self.pages.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::{draw_image, rgb_image, PdfBuilder};
    use crate::models::image::Rect;
    use lopdf::{dictionary, Stream};
    use pretty_assertions::assert_eq;

    /// One-page PDF with a standard security handler and no user password check.
    fn encrypted_pdf(version: i64, revision: i64) -> Vec<u8> {
        let mut builder = PdfBuilder::new();
        builder.add_page(800.0, &[], vec![]);
        let encrypt = builder.add_object(dictionary! {
            "Filter" => "Standard",
            "V" => version,
            "R" => revision,
            "O" => Object::string_literal(vec![0x5a; 32]),
            "P" => -4,
            "CF" => dictionary! { "StdCF" => dictionary! { "CFM" => "V2" } },
        });
        builder.set_trailer_entry("Encrypt", encrypt.into());
        builder.set_trailer_entry(
            "ID",
            vec![
                Object::string_literal("0123456789abcdef"),
                Object::string_literal("0123456789abcdef"),
            ]
            .into(),
        );
        builder.build()
    }

    #[test]
    fn test_load_garbage_fails() {
        let result = PdfDocument::load(b"%PDF-1.5 this is not a document");
        assert!(matches!(result, Err(DocumentError::Open(_))));
    }

    #[test]
    fn test_empty_password_document_opens() {
        let doc = PdfDocument::load(&encrypted_pdf(2, 3)).unwrap();
        assert!(!doc.inner().is_encrypted());
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.page_height(1).unwrap(), 800.0);
    }

    #[test]
    fn test_unsupported_encryption_rejected() {
        let result = PdfDocument::load(&encrypted_pdf(5, 6));
        assert!(matches!(result, Err(DocumentError::Encrypted)));
    }

    #[test]
    fn test_page_geometry() {
        let mut builder = PdfBuilder::new();
        builder.add_page(1000.0, &[], vec![]);
        builder.add_page(842.0, &[], vec![]);
        let doc = PdfDocument::load(&builder.build()).unwrap();

        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.page_height(1).unwrap(), 1000.0);
        assert_eq!(doc.page_height(2).unwrap(), 842.0);
        assert!(matches!(doc.page_height(3), Err(PageError::MissingPage(3))));
    }

    #[test]
    fn test_crop_box_wins_over_media_box() {
        let mut builder = PdfBuilder::new();
        let page = builder.add_page(1000.0, &[], vec![]);
        builder.set_page_entry(
            page,
            "CropBox",
            vec![0.into(), 100.into(), 500.into(), 700.into()].into(),
        );
        let doc = PdfDocument::load(&builder.build()).unwrap();
        assert_eq!(doc.page_height(1).unwrap(), 600.0);
    }

    #[test]
    fn test_page_images_and_placements() {
        let mut builder = PdfBuilder::new();
        let logo = builder.add_image(rgb_image(2, 2, [0, 0, 255]));
        let photo = builder.add_image(rgb_image(4, 4, [255, 0, 0]));

        let mut ops = draw_image("Logo", 10.0, 950.0, 100.0, 40.0);
        ops.extend(draw_image("Photo", 100.0, 400.0, 200.0, 200.0));
        ops.extend(draw_image("Logo", 10.0, 5.0, 100.0, 40.0));
        builder.add_page(1000.0, &[("Logo", logo), ("Photo", photo)], ops);

        let doc = PdfDocument::load(&builder.build()).unwrap();
        let images = doc.page_images(1).unwrap();
        let xrefs: Vec<u32> = images.iter().map(|image| image.xref).collect();
        assert_eq!(xrefs, vec![logo.0, photo.0]);

        let placements = doc.image_placements(1).unwrap();
        assert_eq!(
            placements[&logo.0],
            vec![
                Rect::new(10.0, 10.0, 110.0, 50.0),
                Rect::new(10.0, 955.0, 110.0, 995.0)
            ]
        );
        assert_eq!(placements[&photo.0], vec![Rect::new(100.0, 400.0, 300.0, 600.0)]);
    }

    #[test]
    fn test_images_inside_forms() {
        let mut builder = PdfBuilder::new();
        let image = builder.add_image(rgb_image(2, 2, [0, 255, 0]));

        let form_content = lopdf::content::Content {
            operations: draw_image("Inner", 0.0, 0.0, 50.0, 50.0),
        }
        .encode()
        .unwrap();
        let form = builder.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 100.into(), 100.into()],
                "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), 20.into(), 900.into()],
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Inner" => image },
                },
            },
            form_content,
        ));
        builder.add_page(
            1000.0,
            &[("Banner", form)],
            vec![lopdf::content::Operation::new("Do", vec!["Banner".into()])],
        );

        let doc = PdfDocument::load(&builder.build()).unwrap();
        let images = doc.page_images(1).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].xref, image.0);

        let placements = doc.image_placements(1).unwrap();
        assert_eq!(placements[&image.0], vec![Rect::new(20.0, 50.0, 70.0, 100.0)]);
    }

    #[test]
    fn test_page_without_resources() {
        let mut builder = PdfBuilder::new();
        builder.add_page(500.0, &[], vec![]);
        let doc = PdfDocument::load(&builder.build()).unwrap();
        assert!(doc.page_images(1).unwrap().is_empty());
        assert!(doc.image_placements(1).unwrap().is_empty());
    }
}
