// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end batches over real files on disk.

mod common;

use std::collections::BTreeSet;

use randwerk_core::config::{OutputFormat, SamplingPolicy};
use randwerk_core::types::{DocumentStatus, ErrorCategory};
use randwerk_document::FileRasterizer;
use randwerk_engine::{CancelToken, RunEvent, analyze_batch, event_channel};
use randwerk_output::{read_dataset, read_error_report};

use common::*;

#[test]
fn five_of_ten_scans_have_footer_stamps() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let paths: Vec<_> = (0..10)
        .map(|i| write_scan(input.path(), &format!("scan_{i:02}.png"), i % 2 == 0))
        .collect();

    let batch = analyze_batch(
        discover(&paths),
        &config(out.path(), OutputFormat::Tabular),
        &FileRasterizer,
        None,
        &CancelToken::new(),
    )
    .unwrap();

    let summary = &batch.outcome.summary;
    assert_eq!(summary.documents_done, 10);
    assert_eq!(summary.documents_completed, 10);
    assert_eq!(summary.pages_analyzed, 10);
    assert_eq!(summary.pages_flagged, 5);
    assert_eq!(summary.footer_flagged, 5);
    assert_eq!(summary.header_flagged, 0);
    assert!(!summary.cancelled);

    let rows = read_dataset(&batch.written.dataset, OutputFormat::Tabular).unwrap();
    assert_eq!(rows.len(), 10);
    assert_eq!(rows.iter().filter(|r| r.footer_flagged).count(), 5);
    assert!(rows.iter().all(|r| !r.header_flagged));
    assert!(rows.iter().all(|r| r.threshold_used == 1.0));
    assert!(batch.written.error_report.is_none());
}

#[test]
fn corrupt_pdf_is_isolated_from_valid_ones() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let mut paths: Vec<_> = (0..9)
        .map(|i| write_pdf(input.path(), &format!("doc_{i}.pdf"), vec![body_page()]))
        .collect();
    let corrupt = write_corrupt_pdf(input.path(), "broken.pdf");
    paths.push(corrupt.clone());

    let batch = analyze_batch(
        discover(&paths),
        &config(out.path(), OutputFormat::Tabular),
        &FileRasterizer,
        None,
        &CancelToken::new(),
    )
    .unwrap();

    let outcome = &batch.outcome;
    let completed: Vec<_> = outcome
        .results
        .iter()
        .filter(|r| r.status == DocumentStatus::Completed)
        .collect();
    assert_eq!(completed.len(), 9);
    assert_eq!(outcome.summary.documents_failed, 1);

    assert_eq!(outcome.errors.len(), 1);
    let record = &outcome.errors[0];
    assert_eq!(record.category, ErrorCategory::Permanent);
    assert_eq!(record.document_path, corrupt);
    assert!(!record.retried);

    let report = batch.written.error_report.as_ref().unwrap();
    let error_rows = read_error_report(report).unwrap();
    assert_eq!(error_rows.len(), 1);
    assert_eq!(error_rows[0].category, "permanent");

    let rows = read_dataset(&batch.written.dataset, OutputFormat::Tabular).unwrap();
    assert_eq!(rows.len(), 9);
    let corrupt_name = corrupt.display().to_string();
    assert!(rows.iter().all(|r| r.document_path != corrupt_name));
}

#[test]
fn oversized_page_fails_its_document_only() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let oversized = write_oversized_pdf(input.path(), "poster.pdf");
    let paths = vec![write_scan(input.path(), "scan.png", true), oversized.clone()];

    let batch = analyze_batch(
        discover(&paths),
        &config(out.path(), OutputFormat::Tabular),
        &FileRasterizer,
        None,
        &CancelToken::new(),
    )
    .unwrap();

    let outcome = &batch.outcome;
    assert_eq!(outcome.summary.documents_done, 2);
    assert_eq!(outcome.summary.documents_completed, 1);
    assert_eq!(outcome.summary.documents_failed, 1);

    assert_eq!(outcome.errors.len(), 1);
    let record = &outcome.errors[0];
    assert_eq!(record.document_path, oversized);
    assert_eq!(record.page_index, Some(0));
    assert_eq!(record.category, ErrorCategory::Permanent);

    let rows = read_dataset(&batch.written.dataset, OutputFormat::Tabular).unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].footer_flagged);
    assert_eq!(read_error_report(batch.written.error_report.as_ref().unwrap()).unwrap().len(), 1);
}

#[test]
fn every_format_persists_the_same_rows() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let paths = vec![
        write_pdf(
            input.path(),
            "report.pdf",
            vec![header_page(), body_page(), header_page()],
        ),
        write_scan(input.path(), "scan.png", true),
        write_scan(input.path(), "clean.png", false),
    ];

    let mut datasets = Vec::new();
    for format in [
        OutputFormat::Tabular,
        OutputFormat::Columnar,
        OutputFormat::EmbeddedDb,
    ] {
        let mut config = config(out.path(), format);
        config.output_destination = out.path().join(format!("run_{}", format.label()));
        let batch = analyze_batch(
            discover(&paths),
            &config,
            &FileRasterizer,
            None,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(batch.written.rows, 5);
        assert_eq!(batch.outcome.summary.header_flagged, 2);
        datasets.push(read_dataset(&batch.written.dataset, format).unwrap());
    }

    assert_eq!(datasets[0], datasets[1]);
    assert_eq!(datasets[1], datasets[2]);

    let pdf_rows: Vec<_> = datasets[0]
        .iter()
        .filter(|r| r.document_path.ends_with("report.pdf"))
        .map(|r| (r.page_index, r.header_flagged, r.footer_flagged))
        .collect();
    assert_eq!(
        pdf_rows,
        [(0, true, false), (1, false, false), (2, true, false)]
    );
}

#[test]
fn seeded_statistical_sample_is_reproducible() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let paths: Vec<_> = (0..60)
        .map(|i| write_scan(input.path(), &format!("page_{i:03}.png"), false))
        .collect();

    let sampled_paths = |seed: u64| {
        let mut config = config(out.path(), OutputFormat::Tabular);
        config.sampling = SamplingPolicy::Statistical {
            confidence: 95.0,
            margin_of_error: 10.0,
            seed: Some(seed),
        };
        let batch = analyze_batch(
            discover(&paths),
            &config,
            &FileRasterizer,
            None,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(batch.outcome.summary.sampling.population_size, 60);
        assert_eq!(batch.outcome.summary.sampling.seed, Some(seed));
        batch
            .outcome
            .results
            .iter()
            .map(|r| r.document.path.clone())
            .collect::<Vec<_>>()
    };

    let first = sampled_paths(7);
    let second = sampled_paths(7);
    assert_eq!(first, second);
    assert!(first.len() >= 30 && first.len() < 60);
}

#[test]
fn events_report_progress_results_and_errors() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let paths = vec![
        write_scan(input.path(), "a.png", true),
        write_scan(input.path(), "b.png", false),
        write_corrupt_pdf(input.path(), "c.pdf"),
    ];

    let (tx, rx) = event_channel();
    analyze_batch(
        discover(&paths),
        &config(out.path(), OutputFormat::Tabular),
        &FileRasterizer,
        Some(tx),
        &CancelToken::new(),
    )
    .unwrap();

    let events: Vec<RunEvent> = rx.try_iter().collect();
    let finished: BTreeSet<_> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::DocumentFinished(r) => Some(r.document.path.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(finished.len(), 3);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, RunEvent::Error(_)))
            .count(),
        1
    );

    let last_progress = events
        .iter()
        .rev()
        .find_map(|e| match e {
            RunEvent::Progress(p) => Some(*p),
            _ => None,
        })
        .unwrap();
    assert_eq!(last_progress.documents_done, 3);
    assert_eq!(last_progress.documents_total, 3);
    assert_eq!(last_progress.pages_flagged, 1);
    assert_eq!(last_progress.errors, 1);
}

#[test]
fn invalid_threshold_fails_before_anything_is_written() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let paths = vec![write_scan(input.path(), "a.png", true)];

    let mut config = config(out.path(), OutputFormat::Tabular);
    config.threshold_percent = 25.0;
    let err = analyze_batch(
        discover(&paths),
        &config,
        &FileRasterizer,
        None,
        &CancelToken::new(),
    )
    .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
}
