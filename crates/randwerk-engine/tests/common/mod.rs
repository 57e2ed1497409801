// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fixture builders shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use lopdf::content::{Content, Operation};
use lopdf::{Object, Stream, dictionary};
use randwerk_core::config::{AnalysisConfig, OutputFormat, RetrySettings};
use randwerk_core::types::Document;

pub const PAGE_PX: u32 = 1000;

/// A white 1000x1000 scan; `stamped` adds a 60x10 mark on the bottom edge,
/// inside the 10-row footer band of a 1% threshold.
pub fn scan(stamped: bool) -> GrayImage {
    let mut img = GrayImage::from_pixel(PAGE_PX, PAGE_PX, Luma([255u8]));
    // Body text block, never inside a band.
    draw_filled_rect_mut(&mut img, Rect::at(100, 200).of_size(800, 500), Luma([30u8]));
    if stamped {
        draw_filled_rect_mut(&mut img, Rect::at(470, 990).of_size(60, 10), Luma([0u8]));
    }
    img
}

pub fn write_scan(dir: &Path, name: &str, stamped: bool) -> PathBuf {
    let path = dir.join(name);
    scan(stamped).save(&path).unwrap();
    path
}

fn int(v: i64) -> Object {
    Object::Integer(v)
}

/// Filled rectangle in PDF user space (origin bottom-left).
pub fn filled_rect(x: i64, y: i64, w: i64, h: i64) -> Vec<Operation> {
    vec![
        Operation::new("re", vec![int(x), int(y), int(w), int(h)]),
        Operation::new("f", vec![]),
    ]
}

/// Body content only: a block in the middle of a Letter page.
pub fn body_page() -> Vec<Operation> {
    filled_rect(72, 300, 468, 200)
}

/// Body content plus a running header hugging the top edge.
pub fn header_page() -> Vec<Operation> {
    let mut ops = body_page();
    ops.extend(filled_rect(72, 786, 200, 6));
    ops
}

/// Serialize a Letter-sized PDF with one page per content stream.
pub fn pdf_bytes(pages: Vec<Vec<Operation>>) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![int(0), int(0), int(612), int(792)],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

pub fn write_pdf(dir: &Path, name: &str, pages: Vec<Vec<Operation>>) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, pdf_bytes(pages)).unwrap();
    path
}

/// A one-page PDF whose MediaBox is far past the largest page PDF allows.
pub fn write_oversized_pdf(dir: &Path, name: &str) -> PathBuf {
    let mut doc = lopdf::Document::load_mem(&pdf_bytes(vec![body_page()])).unwrap();
    let page_id = doc.get_pages().into_values().next().unwrap();
    doc.get_dictionary_mut(page_id).unwrap().set(
        "MediaBox",
        vec![int(0), int(0), int(100_000_000), int(100_000_000)],
    );
    let path = dir.join(name);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    std::fs::write(&path, bytes).unwrap();
    path
}

pub fn write_corrupt_pdf(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"%PDF-1.4\nthis is not a pdf body\n").unwrap();
    path
}

pub fn discover(paths: &[PathBuf]) -> Vec<Document> {
    paths.iter().map(|p| Document::discover(p).unwrap()).collect()
}

/// Configuration writing `format` to `<out>/results`, with fast retries.
pub fn config(out: &Path, format: OutputFormat) -> AnalysisConfig {
    AnalysisConfig {
        worker_count: Some(4),
        output_format: format,
        output_destination: out.join("results"),
        retry: RetrySettings {
            max_retries: 1,
            base_delay_ms: 1,
            max_delay_ms: 5,
        },
        ..AnalysisConfig::default()
    }
}
