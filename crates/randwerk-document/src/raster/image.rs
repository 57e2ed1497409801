// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster image source — decodes JPEG, PNG, BMP, and TIFF files into a single
// luma page using the `image` crate.

use std::path::Path;

use image::{DynamicImage, GrayImage, ImageError, Luma};
use randwerk_core::error::{RandwerkError, Result};
use tracing::{debug, instrument};

use super::{OpenedDocument, PageRaster, page_out_of_range};

/// A decoded raster image, exposed as a one-page document.
pub struct ImageSource {
    page: GrayImage,
}

impl ImageSource {
    /// Decode an image from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|err| decode_error(path, err))?;
        debug!(width = img.width(), height = img.height(), "Image decoded");
        Self::from_dynamic(img)
    }

    /// Decode an image already in memory (JPEG, PNG, etc.).
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data)
            .map_err(|err| RandwerkError::ImageError(format!("failed to decode image: {err}")))?;
        Self::from_dynamic(img)
    }

    /// Wrap an already-decoded image.
    pub fn from_dynamic(image: DynamicImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(RandwerkError::ImageError("image has no pixels".into()));
        }
        Ok(Self {
            page: flatten_to_luma(&image),
        })
    }
}

impl OpenedDocument for ImageSource {
    fn page_count(&self) -> u32 {
        1
    }

    fn rasterize(&mut self, index: u32) -> Result<PageRaster> {
        if index != 0 {
            return Err(page_out_of_range(index, 1));
        }
        Ok(PageRaster::Pixels(self.page.clone()))
    }
}

/// Convert to 8-bit luma, compositing any transparency onto white so that
/// transparent regions read as background.
pub fn flatten_to_luma(image: &DynamicImage) -> GrayImage {
    if !image.color().has_alpha() {
        return image.to_luma8();
    }

    let rgba = image.to_rgba8();
    GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let image::Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        let alpha = a as f32 / 255.0;
        let composited = luma * alpha + 255.0 * (1.0 - alpha);
        Luma([composited.round().clamp(0.0, 255.0) as u8])
    })
}

/// I/O failures keep their kind so lock contention stays retryable; every
/// other decode failure is a content error.
fn decode_error(path: &Path, err: ImageError) -> RandwerkError {
    match err {
        ImageError::IoError(io_err) => RandwerkError::Io(io_err),
        ImageError::Unsupported(detail) => {
            RandwerkError::UnsupportedDocument(format!("{}: {detail}", path.display()))
        }
        other => RandwerkError::ImageError(format!("failed to open {}: {other}", path.display())),
    }
}
