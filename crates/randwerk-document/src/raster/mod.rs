// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rasterizer seam — turns a document page into something the margin detector
// can measure.
//
// Raster images arrive as luma pixels. PDF pages are not rendered; their
// vector content (text runs, painted paths, placed XObjects) is reduced to
// bounding boxes whose covered cells on a pixel grid are counted band by
// band, so both kinds end up on the same pixel-density scale.

pub mod image;
pub mod pdf;

use std::ops::Range;

use ::image::GrayImage;
use randwerk_core::error::{RandwerkError, Result};
use randwerk_core::types::{Document, DocumentKind};

pub use self::image::ImageSource;
pub use self::pdf::PdfSource;

/// Opens documents for page-by-page analysis.
///
/// Implementations must be shareable across worker threads; the handle they
/// return is owned by a single worker.
pub trait Rasterizer: Send + Sync {
    fn open(&self, document: &Document) -> Result<Box<dyn OpenedDocument>>;
}

/// A document opened by a [`Rasterizer`].
pub trait OpenedDocument {
    /// Number of pages available.
    fn page_count(&self) -> u32;

    /// Produce page `index` (zero-based).
    fn rasterize(&mut self, index: u32) -> Result<PageRaster>;
}

/// A single page ready for measurement.
#[derive(Debug, Clone)]
pub enum PageRaster {
    /// Decoded pixels, converted to 8-bit luma.
    Pixels(GrayImage),
    /// Vector content boxes of a PDF page.
    Vector(VectorPage),
}

impl PageRaster {
    /// Page width in the rasterizer's unit (pixels or PDF points).
    pub fn width(&self) -> f64 {
        match self {
            Self::Pixels(img) => img.width() as f64,
            Self::Vector(page) => page.width,
        }
    }

    /// Page height in the rasterizer's unit (pixels or PDF points).
    pub fn height(&self) -> f64 {
        match self {
            Self::Pixels(img) => img.height() as f64,
            Self::Vector(page) => page.height,
        }
    }
}

/// Axis-aligned box in display coordinates: origin at the top-left corner,
/// y growing downwards, PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentBox {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl ContentBox {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left: left.min(right),
            top: top.min(bottom),
            right: left.max(right),
            bottom: top.max(bottom),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }
}

/// Pixels per PDF point of the grid vector coverage is counted on.
pub const VECTOR_MASK_SCALE: f64 = 2.0;

/// The measurable content of a PDF page.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorPage {
    /// Displayed width in points (after `/Rotate`).
    pub width: f64,
    /// Displayed height in points (after `/Rotate`).
    pub height: f64,
    pub boxes: Vec<ContentBox>,
}

impl VectorPage {
    /// Grid size in pixels (columns, rows) at `scale` pixels per point.
    pub fn grid_dimensions(&self, scale: f64) -> (u32, u32) {
        (
            ((self.width * scale).ceil() as u32).max(1),
            ((self.height * scale).ceil() as u32).max(1),
        )
    }

    /// Number of grid cells within `rows` covered by at least one content box.
    ///
    /// Nothing is allocated per pixel: the rows are cut into strips at box
    /// edges and the union of box spans is measured once per strip.
    pub fn covered_pixels(&self, scale: f64, rows: Range<u32>) -> u64 {
        let (columns, height) = self.grid_dimensions(scale);
        let first = rows.start.min(height);
        let last = rows.end.min(height);

        let cells: Vec<CellRect> = self
            .boxes
            .iter()
            .filter_map(|content| CellRect::of(content, scale, columns, height))
            .filter_map(|cell| cell.clip_rows(first, last))
            .collect();

        let mut edges: Vec<u32> = cells.iter().flat_map(|c| [c.top, c.bottom]).collect();
        edges.sort_unstable();
        edges.dedup();

        let mut covered = 0u64;
        let mut spans = Vec::with_capacity(cells.len());
        for strip in edges.windows(2) {
            let (top, bottom) = (strip[0], strip[1]);
            spans.clear();
            spans.extend(
                cells
                    .iter()
                    .filter(|c| c.top <= top && c.bottom >= bottom)
                    .map(|c| (c.left, c.right)),
            );
            covered += union_width(&mut spans) * u64::from(bottom - top);
        }
        covered
    }
}

/// A content box snapped outwards to whole grid cells, half-open.
#[derive(Debug, Clone, Copy)]
struct CellRect {
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

impl CellRect {
    fn of(content: &ContentBox, scale: f64, columns: u32, rows: u32) -> Option<Self> {
        let snap = |v: f64, limit: u32| v.clamp(0.0, limit as f64) as u32;
        let cell = Self {
            left: snap((content.left * scale).floor(), columns),
            top: snap((content.top * scale).floor(), rows),
            right: snap((content.right * scale).ceil(), columns),
            bottom: snap((content.bottom * scale).ceil(), rows),
        };
        (cell.right > cell.left && cell.bottom > cell.top).then_some(cell)
    }

    fn clip_rows(self, first: u32, last: u32) -> Option<Self> {
        let top = self.top.max(first);
        let bottom = self.bottom.min(last);
        (bottom > top).then_some(Self { top, bottom, ..self })
    }
}

/// Total length covered by half-open `(start, end)` spans.
fn union_width(spans: &mut [(u32, u32)]) -> u64 {
    spans.sort_unstable();
    let mut width = 0u64;
    let mut reach = 0u32;
    for &(start, end) in spans.iter() {
        let start = start.max(reach);
        if end > start {
            width += u64::from(end - start);
            reach = end;
        }
    }
    width
}

/// Rasterizer for files on disk, dispatching on the document kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileRasterizer;

impl Rasterizer for FileRasterizer {
    fn open(&self, document: &Document) -> Result<Box<dyn OpenedDocument>> {
        match document.kind {
            DocumentKind::Pdf => Ok(Box::new(PdfSource::open(&document.path)?)),
            DocumentKind::Jpeg | DocumentKind::Png | DocumentKind::Bmp | DocumentKind::Tiff => {
                Ok(Box::new(ImageSource::open(&document.path)?))
            }
        }
    }
}

/// Error for a page index past the end of the document.
pub(crate) fn page_out_of_range(index: u32, count: u32) -> RandwerkError {
    RandwerkError::PageOutOfRange { index, count }
}
