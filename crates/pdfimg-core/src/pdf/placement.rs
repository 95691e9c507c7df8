//! Image placement geometry from page content streams.
//!
//! Tracks the current transformation matrix through `q`/`Q`/`cm` and records the
//! bounding box of the unit square for every image painted with `Do`, following
//! form XObjects through their `/Matrix`.

use lopdf::content::Content;
use lopdf::{Dictionary, Object, ObjectId, Stream};
use tracing::{debug, trace};

use super::document::{subtype, PdfDocument};
use super::Placements;
use crate::error::PageError;
use crate::models::image::Rect;

/// Forms nested deeper than this are not followed.
const MAX_FORM_DEPTH: usize = 16;

/// PDF affine transform `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    /// `self × outer`: apply `self` first, then `outer`.
    pub fn concat(&self, outer: &Matrix) -> Matrix {
        Matrix {
            a: self.a * outer.a + self.b * outer.c,
            b: self.a * outer.b + self.b * outer.d,
            c: self.c * outer.a + self.d * outer.c,
            d: self.c * outer.b + self.d * outer.d,
            e: self.e * outer.a + self.f * outer.c + outer.e,
            f: self.e * outer.b + self.f * outer.d + outer.f,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    fn from_operands(operands: &[Object]) -> Option<Matrix> {
        if operands.len() != 6 {
            return None;
        }
        let mut values = [0.0f32; 6];
        for (slot, operand) in values.iter_mut().zip(operands) {
            *slot = operand.as_float().ok()?;
        }
        let [a, b, c, d, e, f] = values;
        Some(Matrix { a, b, c, d, e, f })
    }
}

/// Page box in PDF user space (y grows upward).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PageBox {
    left: f32,
    bottom: f32,
    top: f32,
}

impl PageBox {
    pub(crate) fn from_corners([x0, y0, x1, y1]: [f32; 4]) -> Self {
        Self {
            left: x0.min(x1),
            bottom: y0.min(y1),
            top: y0.max(y1),
        }
    }

    pub(crate) fn height(&self) -> f32 {
        self.top - self.bottom
    }

    /// Bounding box of the image unit square under `ctm`, flipped to top-down.
    fn image_rect(&self, ctm: &Matrix) -> Rect {
        let corners = [
            ctm.apply(0.0, 0.0),
            ctm.apply(1.0, 0.0),
            ctm.apply(0.0, 1.0),
            ctm.apply(1.0, 1.0),
        ];
        let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
        let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
        for (x, y) in corners {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }

        Rect::new(
            min_x - self.left,
            self.top - max_y,
            max_x - self.left,
            self.top - min_y,
        )
    }
}

pub(crate) struct PlacementScanner<'a> {
    pdf: &'a PdfDocument,
    page_box: PageBox,
    placements: Placements,
    form_stack: Vec<ObjectId>,
}

impl<'a> PlacementScanner<'a> {
    pub(crate) fn new(pdf: &'a PdfDocument, page_box: PageBox) -> Self {
        Self {
            pdf,
            page_box,
            placements: Placements::new(),
            form_stack: Vec::new(),
        }
    }

    pub(crate) fn into_placements(self) -> Placements {
        self.placements
    }

    /// Interpret one content stream under `ctm`.
    pub(crate) fn scan(
        &mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        ctm: Matrix,
    ) -> Result<(), PageError> {
        let content = Content::decode(content)
            .map_err(|e| PageError::Images(format!("failed to parse content stream: {e}")))?;
        let xobjects = match resources {
            Some(resources) => self.pdf.xobjects(resources)?,
            None => None,
        };

        let mut stack = vec![ctm];
        for op in &content.operations {
            match op.operator.as_str() {
                "q" => {
                    let current = stack.last().copied().unwrap_or(ctm);
                    stack.push(current);
                }
                "Q" => {
                    if stack.len() > 1 {
                        stack.pop();
                    }
                }
                "cm" => {
                    if let (Some(m), Some(current)) =
                        (Matrix::from_operands(&op.operands), stack.last_mut())
                    {
                        *current = m.concat(current);
                    }
                }
                "Do" => {
                    let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) else {
                        continue;
                    };
                    let Some(xobjects) = xobjects else { continue };
                    let current = stack.last().copied().unwrap_or(ctm);
                    self.paint(xobjects, name, resources, current);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn paint(
        &mut self,
        xobjects: &'a Dictionary,
        name: &[u8],
        parent_resources: Option<&'a Dictionary>,
        ctm: Matrix,
    ) {
        let Ok(Object::Reference(id)) = xobjects.get(name) else {
            trace!("XObject /{} is not an indirect reference", String::from_utf8_lossy(name));
            return;
        };
        let pdf = self.pdf;
        let Ok(stream) = pdf.inner().get_object(*id).and_then(Object::as_stream) else {
            return;
        };

        match subtype(&stream.dict) {
            Some(b"Image") => {
                let rect = self.page_box.image_rect(&ctm);
                self.placements.entry(id.0).or_default().push(rect);
            }
            Some(b"Form") => self.paint_form(*id, stream, parent_resources, ctm),
            _ => {}
        }
    }

    fn paint_form(
        &mut self,
        id: ObjectId,
        stream: &'a Stream,
        parent_resources: Option<&'a Dictionary>,
        ctm: Matrix,
    ) {
        if self.form_stack.contains(&id) || self.form_stack.len() >= MAX_FORM_DEPTH {
            debug!("Not following form XObject {:?}: recursion limit", id);
            return;
        }

        let form_matrix = stream
            .dict
            .get(b"Matrix")
            .and_then(Object::as_array)
            .ok()
            .and_then(|values| Matrix::from_operands(values))
            .unwrap_or_else(Matrix::identity);

        let pdf = self.pdf;
        let resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|res| pdf.inner().dereference(res).ok())
            .and_then(|(_, res)| res.as_dict().ok())
            .or(parent_resources);

        let content = if stream.dict.has(b"Filter") {
            match stream.decompressed_content() {
                Ok(content) => content,
                Err(e) => {
                    debug!("Skipping form XObject {:?}: {}", id, e);
                    return;
                }
            }
        } else {
            stream.content.clone()
        };

        self.form_stack.push(id);
        if let Err(e) = self.scan(&content, resources, form_matrix.concat(&ctm)) {
            debug!("Skipping form XObject {:?}: {}", id, e);
        }
        self.form_stack.pop();
    }
}
