// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// randwerk-document — Page access and margin detection for Randwerk.
//
// Provides the rasterizer seam (open a document, hand out one page at a time
// as pixels or vector coverage), concrete adapters for raster images and PDF
// files, and the margin detector that scores the header and footer bands.

pub mod detector;
pub mod raster;

pub use detector::{BandMeasurement, MarginDetector};
pub use raster::{FileRasterizer, OpenedDocument, PageRaster, Rasterizer, VectorPage};
