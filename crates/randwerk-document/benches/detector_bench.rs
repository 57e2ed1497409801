// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the margin detector: a letter-size scan at 200 DPI
// and a vector page that has to be painted into a coverage mask first.

use std::path::Path;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use randwerk_core::config::DetectorSettings;
use randwerk_document::raster::ContentBox;
use randwerk_document::{MarginDetector, PageRaster, VectorPage};

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// 1700x2200 scan with body text and a page-number stamp in the footer.
fn bench_scanned_page(c: &mut Criterion) {
    let mut img = GrayImage::from_pixel(1700, 2200, Luma([255u8]));
    draw_filled_rect_mut(&mut img, Rect::at(200, 300).of_size(1300, 1600), Luma([20u8]));
    draw_filled_rect_mut(&mut img, Rect::at(820, 2170).of_size(60, 20), Luma([0u8]));
    let raster = PageRaster::Pixels(img);

    let detector = match MarginDetector::new(1.0, DetectorSettings::default()) {
        Ok(d) => d,
        Err(e) => panic!("detector: {e}"),
    };

    c.bench_function("analyze scanned page (1700x2200, 1%)", |b| {
        b.iter(|| black_box(detector.analyze(Path::new("scan.png"), 0, black_box(&raster))));
    });
}

/// US Letter vector page with a running head, 40 lines of text and a folio.
fn bench_vector_page(c: &mut Criterion) {
    let mut boxes = vec![
        ContentBox::new(72.0, 20.0, 540.0, 30.0),
        ContentBox::new(290.0, 770.0, 322.0, 780.0),
    ];
    for line in 0..40 {
        let top = 72.0 + line as f64 * 15.0;
        boxes.push(ContentBox::new(72.0, top, 540.0, top + 10.0));
    }
    let raster = PageRaster::Vector(VectorPage {
        width: 612.0,
        height: 792.0,
        boxes,
    });

    let detector = match MarginDetector::new(5.0, DetectorSettings::default()) {
        Ok(d) => d,
        Err(e) => panic!("detector: {e}"),
    };

    c.bench_function("analyze vector page (letter, 5%)", |b| {
        b.iter(|| black_box(detector.analyze(Path::new("report.pdf"), 0, black_box(&raster))));
    });
}

criterion_group!(benches, bench_scanned_page, bench_vector_page);
criterion_main!(benches);
