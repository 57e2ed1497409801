// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF source — opens a PDF with `lopdf` and reduces each page's content
// stream to the boxes it paints: estimated text runs, filled or stroked
// paths, and placed images/forms.

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use randwerk_core::error::{RandwerkError, Result};
use tracing::{debug, instrument, warn};

use super::{ContentBox, OpenedDocument, PageRaster, VectorPage, page_out_of_range};

/// US Letter, used when a page has no usable `/MediaBox`.
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Average glyph advance in em, used to estimate the width of a text run.
const AVERAGE_GLYPH_WIDTH: f64 = 0.5;
/// Glyph box extent below and above the baseline, in em.
const DESCENT: f64 = 0.2;
const ASCENT: f64 = 0.8;

/// Largest page side PDF allows, in default user units.
const MAX_PAGE_EXTENT: f64 = 14_400.0;

/// Nesting limit for `/Parent` chains.
const MAX_INHERITANCE_DEPTH: usize = 32;

/// An opened PDF file.
pub struct PdfSource {
    document: Document,
    /// Page object IDs in page order.
    pages: Vec<ObjectId>,
}

impl PdfSource {
    /// Open a PDF from the filesystem.
    ///
    /// The file is read up front so that I/O failures surface as I/O errors
    /// (and stay retryable) rather than as parse errors.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes).map_err(|err| match err {
            RandwerkError::PdfError(detail) => {
                RandwerkError::PdfError(format!("{}: {detail}", path.display()))
            }
            RandwerkError::Encrypted(_) => RandwerkError::Encrypted(path.display().to_string()),
            other => other,
        })
    }

    /// Parse a PDF already in memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            let detail = err.to_string();
            if detail.to_ascii_lowercase().contains("crypt") {
                RandwerkError::Encrypted(detail)
            } else {
                RandwerkError::PdfError(format!("failed to parse PDF: {detail}"))
            }
        })?;

        if document.trailer.get(b"Encrypt").is_ok() {
            return Err(RandwerkError::Encrypted("decryption required".into()));
        }

        let pages: Vec<ObjectId> = document.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(RandwerkError::PdfError("document has no pages".into()));
        }
        debug!(pages = pages.len(), "PDF loaded");

        Ok(Self { document, pages })
    }

    fn page_id(&self, index: u32) -> Result<ObjectId> {
        self.pages
            .get(index as usize)
            .copied()
            .ok_or_else(|| page_out_of_range(index, self.page_count()))
    }

    /// Reduce one page to its displayed size and content boxes.
    fn scan_page(&self, page_id: ObjectId) -> Result<VectorPage> {
        let geometry = PageGeometry::for_page(&self.document, page_id)?;

        let raw = self.document.get_page_content(page_id).map_err(|err| {
            RandwerkError::PdfError(format!("cannot read content stream: {err}"))
        })?;
        let content = Content::decode(&raw).map_err(|err| {
            RandwerkError::PdfError(format!("cannot decode content stream: {err}"))
        })?;

        let resources = inherited(&self.document, page_id, b"Resources")
            .and_then(|obj| obj.as_dict().ok());
        let lookup = |name: &[u8]| xobject_kind(&self.document, resources, name);

        let boxes = scan_operations(&content.operations, &geometry, &lookup);
        debug!(boxes = boxes.len(), "Page content scanned");

        Ok(VectorPage {
            width: geometry.display_width(),
            height: geometry.display_height(),
            boxes,
        })
    }
}

impl OpenedDocument for PdfSource {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn rasterize(&mut self, index: u32) -> Result<PageRaster> {
        let page_id = self.page_id(index)?;
        Ok(PageRaster::Vector(self.scan_page(page_id)?))
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Affine matrix `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f64; 6]);

impl Matrix {
    const IDENTITY: Self = Self([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translate(tx: f64, ty: f64) -> Self {
        Self([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self × other`: apply `self` first, then `other`.
    fn then(&self, other: &Self) -> Self {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Self([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() < 6 {
            return None;
        }
        let mut values = [0.0; 6];
        for (slot, operand) in values.iter_mut().zip(operands) {
            *slot = number(operand)?;
        }
        Some(Self(values))
    }
}

/// Page box and rotation, mapping user space to top-left display space.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PageGeometry {
    media_box: [f64; 4],
    /// Clockwise display rotation: 0, 90, 180, or 270.
    rotate: i64,
}

impl PageGeometry {
    /// Read the page box and rotation, refusing pages larger than PDF allows.
    fn for_page(doc: &Document, page_id: ObjectId) -> Result<Self> {
        let media_box = inherited(doc, page_id, b"MediaBox")
            .and_then(|obj| obj.as_array().ok())
            .and_then(|arr| {
                let values: Vec<f64> = arr
                    .iter()
                    .filter_map(|o| number(resolve(doc, o)?))
                    .collect();
                (values.len() == 4).then(|| {
                    [
                        values[0].min(values[2]),
                        values[1].min(values[3]),
                        values[0].max(values[2]),
                        values[1].max(values[3]),
                    ]
                })
            })
            .filter(|b| b[2] > b[0] && b[3] > b[1])
            .unwrap_or_else(|| {
                warn!(?page_id, "missing or degenerate MediaBox, assuming Letter");
                DEFAULT_MEDIA_BOX
            });

        let rotate = inherited(doc, page_id, b"Rotate")
            .and_then(|obj| obj.as_i64().ok())
            .map(|r| r.rem_euclid(360))
            .filter(|r| r % 90 == 0)
            .unwrap_or(0);

        let user_unit = doc
            .get_dictionary(page_id)
            .ok()
            .and_then(|page| page.get(b"UserUnit").ok())
            .and_then(|obj| number(resolve(doc, obj)?))
            .filter(|unit| *unit > 0.0)
            .unwrap_or(1.0);

        let geometry = Self { media_box, rotate };
        let extent = geometry.width().max(geometry.height()) * user_unit;
        if !extent.is_finite() || extent > MAX_PAGE_EXTENT {
            return Err(RandwerkError::PdfError(format!(
                "page size {extent} units exceeds the {MAX_PAGE_EXTENT} unit limit"
            )));
        }
        Ok(geometry)
    }

    fn width(&self) -> f64 {
        self.media_box[2] - self.media_box[0]
    }

    fn height(&self) -> f64 {
        self.media_box[3] - self.media_box[1]
    }

    fn display_width(&self) -> f64 {
        if self.rotate % 180 == 0 { self.width() } else { self.height() }
    }

    fn display_height(&self) -> f64 {
        if self.rotate % 180 == 0 { self.height() } else { self.width() }
    }

    /// Map a device-space point (user space after the CTM) to display space.
    fn to_display(&self, x: f64, y: f64) -> (f64, f64) {
        let [llx, lly, urx, ury] = self.media_box;
        match self.rotate {
            90 => (y - lly, x - llx),
            180 => (urx - x, y - lly),
            270 => (ury - y, urx - x),
            _ => (x - llx, ury - y),
        }
    }

    /// Display-space box of a device-space bounding box, clipped to the page.
    fn display_box(&self, bounds: &Bounds) -> Option<ContentBox> {
        let (x0, y0) = self.to_display(bounds.min_x, bounds.min_y);
        let (x1, y1) = self.to_display(bounds.max_x, bounds.max_y);
        let content = ContentBox::new(
            x0.min(x1).max(0.0),
            y0.min(y1).max(0.0),
            x0.max(x1).min(self.display_width()),
            y0.max(y1).min(self.display_height()),
        );
        (!content.is_empty()).then_some(content)
    }
}

/// Running bounding box of transformed points.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Bounds {
    fn of(point: (f64, f64)) -> Self {
        Self {
            min_x: point.0,
            min_y: point.1,
            max_x: point.0,
            max_y: point.1,
        }
    }

    fn include(&mut self, point: (f64, f64)) {
        self.min_x = self.min_x.min(point.0);
        self.min_y = self.min_y.min(point.1);
        self.max_x = self.max_x.max(point.0);
        self.max_y = self.max_y.max(point.1);
    }

    fn of_quad(matrix: &Matrix, x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        let mut bounds = Self::of(matrix.apply(x0, y0));
        bounds.include(matrix.apply(x1, y0));
        bounds.include(matrix.apply(x0, y1));
        bounds.include(matrix.apply(x1, y1));
        bounds
    }

    fn inflate(&mut self, by: f64) {
        self.min_x -= by;
        self.min_y -= by;
        self.max_x += by;
        self.max_y += by;
    }
}

// ---------------------------------------------------------------------------
// Content stream scanning
// ---------------------------------------------------------------------------

/// What a named XObject paints, in its own coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
enum XObjectKind {
    /// Images occupy the unit square.
    Image,
    /// Forms occupy their `/BBox`, mapped by their `/Matrix`.
    Form { bbox: [f64; 4], matrix: Matrix },
}

#[derive(Debug, Clone, Copy)]
struct GraphicsState {
    ctm: Matrix,
    line_width: f64,
}

#[derive(Debug, Clone, Copy)]
struct TextState {
    matrix: Matrix,
    line_matrix: Matrix,
    font_size: f64,
    leading: f64,
    horizontal_scale: f64,
    rise: f64,
    render_mode: i64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            font_size: 12.0,
            leading: 0.0,
            horizontal_scale: 1.0,
            rise: 0.0,
            render_mode: 0,
        }
    }
}

impl TextState {
    fn move_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = Matrix::translate(tx, ty).then(&self.line_matrix);
        self.matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.leading;
        self.move_line(0.0, -leading);
    }

    /// Record a run `width_em` wide at the current position and advance.
    fn show(&mut self, width_em: f64, ctm: &Matrix) -> Option<Bounds> {
        let render = Matrix([
            self.font_size * self.horizontal_scale,
            0.0,
            0.0,
            self.font_size,
            0.0,
            self.rise,
        ])
        .then(&self.matrix)
        .then(ctm);

        let bounds = (width_em > 0.0 && self.render_mode != 3)
            .then(|| Bounds::of_quad(&render, 0.0, -DESCENT, width_em, ASCENT));

        let advance = width_em * self.font_size * self.horizontal_scale;
        self.matrix = Matrix::translate(advance, 0.0).then(&self.matrix);
        bounds
    }
}

/// Width in em of a text-showing operand (string or `TJ` array).
fn run_width(operand: &Object) -> f64 {
    match operand {
        Object::String(bytes, _) => bytes.len() as f64 * AVERAGE_GLYPH_WIDTH,
        Object::Array(items) => items
            .iter()
            .map(|item| match item {
                Object::String(bytes, _) => bytes.len() as f64 * AVERAGE_GLYPH_WIDTH,
                other => number(other).map(|adj| -adj / 1000.0).unwrap_or(0.0),
            })
            .sum::<f64>()
            .max(0.0),
        _ => 0.0,
    }
}

/// Walk a decoded content stream and collect the display boxes it paints.
fn scan_operations(
    operations: &[Operation],
    geometry: &PageGeometry,
    xobject: &dyn Fn(&[u8]) -> Option<XObjectKind>,
) -> Vec<ContentBox> {
    let mut boxes = Vec::new();
    let mut state = GraphicsState {
        ctm: Matrix::IDENTITY,
        line_width: 1.0,
    };
    let mut stack: Vec<GraphicsState> = Vec::new();
    let mut text = TextState::default();
    let mut path: Option<Bounds> = None;

    let push = |bounds: Option<Bounds>, boxes: &mut Vec<ContentBox>| {
        if let Some(content) = bounds.and_then(|b| geometry.display_box(&b)) {
            boxes.push(content);
        }
    };

    for op in operations {
        let operands = &op.operands;
        let num = |i: usize| operands.get(i).and_then(number);

        match op.operator.as_str() {
            // -- Graphics state ------------------------------------------------
            "q" => stack.push(state),
            "Q" => {
                if let Some(saved) = stack.pop() {
                    state = saved;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    state.ctm = m.then(&state.ctm);
                }
            }
            "w" => {
                if let Some(width) = num(0) {
                    state.line_width = width.abs();
                }
            }

            // -- Path construction ---------------------------------------------
            "m" | "l" => {
                if let (Some(x), Some(y)) = (num(0), num(1)) {
                    let point = state.ctm.apply(x, y);
                    match path.as_mut() {
                        Some(bounds) => bounds.include(point),
                        None => path = Some(Bounds::of(point)),
                    }
                }
            }
            "c" | "v" | "y" => {
                let pairs = operands.len() / 2;
                for i in 0..pairs {
                    if let (Some(x), Some(y)) = (num(2 * i), num(2 * i + 1)) {
                        let point = state.ctm.apply(x, y);
                        match path.as_mut() {
                            Some(bounds) => bounds.include(point),
                            None => path = Some(Bounds::of(point)),
                        }
                    }
                }
            }
            "re" => {
                if let (Some(x), Some(y), Some(w), Some(h)) = (num(0), num(1), num(2), num(3)) {
                    let rect = Bounds::of_quad(&state.ctm, x, y, x + w, y + h);
                    match path.as_mut() {
                        Some(bounds) => {
                            bounds.include((rect.min_x, rect.min_y));
                            bounds.include((rect.max_x, rect.max_y));
                        }
                        None => path = Some(rect),
                    }
                }
            }

            // -- Path painting -------------------------------------------------
            "f" | "F" | "f*" => push(path.take(), &mut boxes),
            "S" | "s" | "B" | "B*" | "b" | "b*" => {
                let half_width = (state.line_width * scale_of(&state.ctm) / 2.0).max(0.5);
                push(
                    path.take().map(|mut b| {
                        b.inflate(half_width);
                        b
                    }),
                    &mut boxes,
                );
            }
            "n" => path = None,

            // -- Text ------------------------------------------------------------
            "BT" => {
                text.matrix = Matrix::IDENTITY;
                text.line_matrix = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(size) = num(1) {
                    text.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = num(0) {
                    text.leading = leading;
                }
            }
            "Tz" => {
                if let Some(scale) = num(0) {
                    text.horizontal_scale = scale / 100.0;
                }
            }
            "Ts" => {
                if let Some(rise) = num(0) {
                    text.rise = rise;
                }
            }
            "Tr" => {
                if let Some(mode) = operands.first().and_then(|o| o.as_i64().ok()) {
                    text.render_mode = mode;
                }
            }
            "Td" => {
                if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                    text.move_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                    text.leading = -ty;
                    text.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    text.matrix = m;
                    text.line_matrix = m;
                }
            }
            "T*" => text.next_line(),
            "Tj" | "TJ" => {
                let width = operands.first().map(run_width).unwrap_or(0.0);
                let bounds = text.show(width, &state.ctm);
                push(bounds, &mut boxes);
            }
            "'" => {
                text.next_line();
                let width = operands.first().map(run_width).unwrap_or(0.0);
                let bounds = text.show(width, &state.ctm);
                push(bounds, &mut boxes);
            }
            "\"" => {
                text.next_line();
                let width = operands.get(2).map(run_width).unwrap_or(0.0);
                let bounds = text.show(width, &state.ctm);
                push(bounds, &mut boxes);
            }

            // -- External objects ---------------------------------------------
            "Do" => {
                let kind = operands
                    .first()
                    .and_then(|o| o.as_name().ok())
                    .and_then(|name| xobject(name))
                    .unwrap_or(XObjectKind::Image);
                let bounds = match kind {
                    XObjectKind::Image => Bounds::of_quad(&state.ctm, 0.0, 0.0, 1.0, 1.0),
                    XObjectKind::Form { bbox, matrix } => {
                        let to_device = matrix.then(&state.ctm);
                        Bounds::of_quad(&to_device, bbox[0], bbox[1], bbox[2], bbox[3])
                    }
                };
                push(Some(bounds), &mut boxes);
            }
            "EI" => push(
                Some(Bounds::of_quad(&state.ctm, 0.0, 0.0, 1.0, 1.0)),
                &mut boxes,
            ),

            _ => {}
        }
    }

    boxes
}

/// Approximate uniform scale factor of a matrix, for line widths.
fn scale_of(m: &Matrix) -> f64 {
    let [a, b, c, d, _, _] = m.0;
    ((a * d - b * c).abs()).sqrt()
}

// ---------------------------------------------------------------------------
// Object helpers
// ---------------------------------------------------------------------------

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Follow a single indirect reference.
fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Look up a page attribute, walking up the page tree for inherited keys.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = page_id;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        let dict = doc.get_dictionary(node).ok()?;
        if let Ok(value) = dict.get(key) {
            return resolve(doc, value);
        }
        node = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

/// Determine what the XObject `name` in the page resources paints.
fn xobject_kind(doc: &Document, resources: Option<&Dictionary>, name: &[u8]) -> Option<XObjectKind> {
    let xobjects = resolve(doc, resources?.get(b"XObject").ok()?)?.as_dict().ok()?;
    let stream = match resolve(doc, xobjects.get(name).ok()?)? {
        Object::Stream(stream) => stream,
        _ => return None,
    };

    let subtype = stream.dict.get(b"Subtype").ok()?.as_name().ok()?;
    if subtype != b"Form" {
        return Some(XObjectKind::Image);
    }

    let numbers = |key: &[u8]| -> Option<Vec<f64>> {
        let arr = resolve(doc, stream.dict.get(key).ok()?)?.as_array().ok()?;
        Some(arr.iter().filter_map(number).collect())
    };

    let bbox = numbers(b"BBox").filter(|v| v.len() == 4)?;
    let matrix = numbers(b"Matrix")
        .filter(|v| v.len() == 6)
        .map(|v| Matrix([v[0], v[1], v[2], v[3], v[4], v[5]]))
        .unwrap_or(Matrix::IDENTITY);

    Some(XObjectKind::Form {
        bbox: [bbox[0], bbox[1], bbox[2], bbox[3]],
        matrix,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};
    use randwerk_core::types::ErrorCategory;

    const LETTER: PageGeometry = PageGeometry {
        media_box: [0.0, 0.0, 612.0, 792.0],
        rotate: 0,
    };

    fn op(operator: &str, operands: Vec<Object>) -> Operation {
        Operation::new(operator, operands)
    }

    fn no_xobjects(_: &[u8]) -> Option<XObjectKind> {
        None
    }

    /// Build a one-page PDF whose content stream is `operations`.
    fn pdf_with_content(operations: Vec<Operation>, rotate: Option<i64>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if let Some(r) = rotate {
            page.set("Rotate", r);
        }
        let page_id = doc.add_object(page);
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("serialise PDF");
        bytes
    }

    #[test]
    fn matrix_composition_applies_left_first() {
        let scale = Matrix([2.0, 0.0, 0.0, 2.0, 0.0, 0.0]);
        let shift = Matrix::translate(10.0, 5.0);
        assert_eq!(scale.then(&shift).apply(1.0, 1.0), (12.0, 7.0));
        assert_eq!(shift.then(&scale).apply(1.0, 1.0), (22.0, 12.0));
    }

    #[test]
    fn filled_rectangle_maps_to_top_left_display_space() {
        let ops = vec![
            op("re", vec![100.into(), 742.into(), 50.into(), 20.into()]),
            op("f", vec![]),
        ];
        let boxes = scan_operations(&ops, &LETTER, &no_xobjects);
        assert_eq!(boxes, vec![ContentBox::new(100.0, 30.0, 150.0, 50.0)]);
    }

    #[test]
    fn unpainted_path_is_ignored() {
        let ops = vec![
            op("re", vec![0.into(), 0.into(), 612.into(), 792.into()]),
            op("W", vec![]),
            op("n", vec![]),
        ];
        assert!(scan_operations(&ops, &LETTER, &no_xobjects).is_empty());
    }

    #[test]
    fn text_run_sits_on_its_baseline() {
        let ops = vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), 10.into()]),
            op("Td", vec![72.into(), 20.into()]),
            op("Tj", vec![Object::string_literal("Page 1")]),
            op("ET", vec![]),
        ];
        let boxes = scan_operations(&ops, &LETTER, &no_xobjects);
        assert_eq!(boxes.len(), 1);
        let run = boxes[0];
        // Six glyphs at half an em each, 10pt font.
        assert!((run.right - run.left - 30.0).abs() < 1e-9);
        // Baseline at y=20 (display 772): 8pt above, 2pt below.
        assert!((run.top - 764.0).abs() < 1e-9);
        assert!((run.bottom - 774.0).abs() < 1e-9);
    }

    #[test]
    fn invisible_text_paints_nothing() {
        let ops = vec![
            op("BT", vec![]),
            op("Tr", vec![3.into()]),
            op("Tj", vec![Object::string_literal("hidden")]),
            op("ET", vec![]),
        ];
        assert!(scan_operations(&ops, &LETTER, &no_xobjects).is_empty());
    }

    #[test]
    fn image_placement_uses_ctm() {
        let ops = vec![
            op("q", vec![]),
            op(
                "cm",
                vec![200.into(), 0.into(), 0.into(), 100.into(), 0.into(), 0.into()],
            ),
            op("Do", vec![Object::Name(b"Im1".to_vec())]),
            op("Q", vec![]),
        ];
        let boxes = scan_operations(&ops, &LETTER, &no_xobjects);
        assert_eq!(boxes, vec![ContentBox::new(0.0, 692.0, 200.0, 792.0)]);
    }

    #[test]
    fn rotated_page_swaps_display_axes() {
        let geometry = PageGeometry {
            media_box: [0.0, 0.0, 612.0, 792.0],
            rotate: 90,
        };
        assert_eq!(geometry.display_width(), 792.0);
        assert_eq!(geometry.display_height(), 612.0);
        // The left edge of the unrotated page becomes the top edge.
        assert_eq!(geometry.to_display(0.0, 396.0), (396.0, 0.0));
    }

    #[test]
    fn opens_generated_pdf_and_scans_footer_text() {
        let bytes = pdf_with_content(
            vec![
                op("BT", vec![]),
                op("Tf", vec![Object::Name(b"F1".to_vec()), 9.into()]),
                op("Td", vec![300.into(), 4.into()]),
                op("Tj", vec![Object::string_literal("12")]),
                op("ET", vec![]),
            ],
            None,
        );

        let mut source = PdfSource::from_bytes(&bytes).unwrap();
        assert_eq!(source.page_count(), 1);
        match source.rasterize(0).unwrap() {
            PageRaster::Vector(page) => {
                assert_eq!((page.width, page.height), (612.0, 792.0));
                assert_eq!(page.boxes.len(), 1);
                assert!(page.boxes[0].bottom > 780.0);
            }
            PageRaster::Pixels(_) => panic!("PDF pages are vector"),
        }
        assert!(source.rasterize(1).is_err());
    }

    /// Set `key` on the first page of a saved PDF.
    fn with_page_entry(bytes: &[u8], key: &str, value: Object) -> Vec<u8> {
        let mut doc = Document::load_mem(bytes).unwrap();
        let page_id = doc.get_pages().into_values().next().unwrap();
        doc.get_dictionary_mut(page_id).unwrap().set(key, value);
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    fn huge_box() -> Object {
        Object::Array(vec![0.into(), 0.into(), 100_000_000.into(), 100_000_000.into()])
    }

    #[test]
    fn oversized_media_box_is_a_permanent_page_error() {
        let bytes = with_page_entry(&pdf_with_content(vec![], None), "MediaBox", huge_box());

        let mut source = PdfSource::from_bytes(&bytes).unwrap();
        let err = source.rasterize(0).unwrap_err();
        assert!(matches!(err, RandwerkError::PdfError(_)));
        assert_eq!(err.category(), ErrorCategory::Permanent);
    }

    #[test]
    fn user_unit_counts_towards_the_size_limit() {
        let square = Object::Array(vec![0.into(), 0.into(), 7200.into(), 7200.into()]);
        let bytes = with_page_entry(&pdf_with_content(vec![], None), "MediaBox", square);

        let at_limit = with_page_entry(&bytes, "UserUnit", Object::Real(2.0));
        assert!(PdfSource::from_bytes(&at_limit).unwrap().rasterize(0).is_ok());

        let over = with_page_entry(&bytes, "UserUnit", Object::Real(3.0));
        assert!(PdfSource::from_bytes(&over).unwrap().rasterize(0).is_err());
    }

    #[test]
    fn corrupt_pdf_is_permanent() {
        let err = PdfSource::from_bytes(b"%PDF-1.4 this is not really a pdf")
            .err()
            .expect("parse must fail");
        assert_eq!(err.category(), ErrorCategory::Permanent);
    }

    #[test]
    fn encrypted_trailer_is_rejected() {
        let bytes = pdf_with_content(vec![], None);
        let mut doc = Document::load_mem(&bytes).unwrap();
        let encrypt_id = doc.add_object(dictionary! {
            "Filter" => "Standard",
            "V" => 1,
            "R" => 2,
        });
        doc.trailer.set("Encrypt", encrypt_id);
        let mut encrypted = Vec::new();
        doc.save_to(&mut encrypted).unwrap();

        let err = PdfSource::from_bytes(&encrypted)
            .err()
            .expect("encrypted PDF must be refused");
        assert_eq!(err.category(), ErrorCategory::Permanent);
    }
}
