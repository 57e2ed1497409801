// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Margin detector — scores the header and footer bands of a page.
//
// The threshold only sizes the bands. Whether a band holds content is decided
// by the fixed noise floor in `DetectorSettings`, so changing the threshold
// changes which rows are examined and never how much content counts.

use std::path::Path;

use image::GrayImage;
use randwerk_core::config::{DetectorSettings, validate_threshold};
use randwerk_core::error::Result;
use randwerk_core::types::{Page, PageFinding};
use tracing::debug;

use crate::raster::{PageRaster, VECTOR_MASK_SCALE, VectorPage};

/// Height of one margin band in the page's own unit.
pub fn band_height(page_height: f64, threshold_percent: f64) -> f64 {
    threshold_percent / 100.0 * page_height
}

/// Number of pixel rows in one margin band: at least one row, never more
/// than the whole image.
pub fn band_rows(rows: u32, threshold_percent: f64) -> u32 {
    if rows == 0 {
        return 0;
    }
    // Absorb float noise so that e.g. 1% of 1000 rows is 10 rows, not 11.
    let exact = (band_height(rows as f64, threshold_percent) - 1e-9).ceil();
    (exact.max(0.0) as u32).clamp(1, rows)
}

/// Raw content counts for the two bands of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandMeasurement {
    /// Rows in each band.
    pub band_rows: u32,
    /// Pixels per band (`band_rows × width`).
    pub band_area: u64,
    pub header_content: u64,
    pub footer_content: u64,
}

impl BandMeasurement {
    pub fn header_density(&self) -> f64 {
        ratio(self.header_content, self.band_area)
    }

    pub fn footer_density(&self) -> f64 {
        ratio(self.footer_content, self.band_area)
    }

    /// Content fraction over both bands taken together.
    pub fn total_density(&self) -> f64 {
        ratio(
            self.header_content + self.footer_content,
            self.band_area * 2,
        )
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Scores pages at a fixed threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginDetector {
    threshold_percent: f64,
    settings: DetectorSettings,
}

impl MarginDetector {
    /// Build a detector, rejecting thresholds outside `[0.1, 10.0]`.
    pub fn new(threshold_percent: f64, settings: DetectorSettings) -> Result<Self> {
        validate_threshold(threshold_percent)?;
        settings.validate()?;
        Ok(Self {
            threshold_percent,
            settings,
        })
    }

    pub fn threshold_percent(&self) -> f64 {
        self.threshold_percent
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    /// Count content pixels in the top and bottom bands.
    ///
    /// Vector pages are measured on a grid of `VECTOR_MASK_SCALE` pixels per
    /// point, where covered cells count as black, so both raster kinds share
    /// one density scale.
    pub fn measure(&self, raster: &PageRaster) -> BandMeasurement {
        match raster {
            PageRaster::Pixels(img) => self.measure_pixels(img),
            PageRaster::Vector(page) => self.measure_vector(page),
        }
    }

    fn measure_vector(&self, page: &VectorPage) -> BandMeasurement {
        let (width, rows) = page.grid_dimensions(VECTOR_MASK_SCALE);
        let band = band_rows(rows, self.threshold_percent);
        // Covered cells are luma 0; a zero cutoff treats even those as background.
        let count = |first_row: u32, last_row: u32| -> u64 {
            if self.settings.background_luma == 0 {
                0
            } else {
                page.covered_pixels(VECTOR_MASK_SCALE, first_row..last_row)
            }
        };

        BandMeasurement {
            band_rows: band,
            band_area: band as u64 * width as u64,
            header_content: count(0, band),
            footer_content: count(rows - band, rows),
        }
    }

    fn measure_pixels(&self, img: &GrayImage) -> BandMeasurement {
        let (width, rows) = img.dimensions();
        let band = band_rows(rows, self.threshold_percent);
        let cutoff = self.settings.background_luma;

        let row_len = width as usize;
        let raw = img.as_raw();
        let count = |first_row: u32, last_row: u32| -> u64 {
            let start = first_row as usize * row_len;
            let end = last_row as usize * row_len;
            raw[start..end].iter().filter(|&&luma| luma < cutoff).count() as u64
        };

        // The bands may overlap on very short pages; each is counted on its own.
        BandMeasurement {
            band_rows: band,
            band_area: band as u64 * width as u64,
            header_content: count(0, band),
            footer_content: count(rows - band, rows),
        }
    }

    /// Analyze one page and produce its finding.
    pub fn analyze(&self, document_path: &Path, page_index: u32, raster: &PageRaster) -> PageFinding {
        let measurement = self.measure(raster);
        let header_density = measurement.header_density();
        let footer_density = measurement.footer_density();

        let finding = PageFinding {
            page: Page {
                document_path: document_path.to_path_buf(),
                index: page_index,
                width: raster.width(),
                height: raster.height(),
            },
            header_flagged: header_density > self.settings.noise_floor,
            footer_flagged: footer_density > self.settings.noise_floor,
            header_density,
            footer_density,
            total_density: measurement.total_density(),
            threshold_used: self.threshold_percent,
        };

        debug!(
            path = %document_path.display(),
            page = page_index,
            band_rows = measurement.band_rows,
            header_density,
            footer_density,
            status = ?finding.status(),
            "Page analyzed"
        );

        finding
    }
}

/// Analyze a single page with the default detector settings.
pub fn analyze(
    document_path: &Path,
    page_index: u32,
    raster: &PageRaster,
    threshold_percent: f64,
) -> Result<PageFinding> {
    let detector = MarginDetector::new(threshold_percent, DetectorSettings::default())?;
    Ok(detector.analyze(document_path, page_index, raster))
}
