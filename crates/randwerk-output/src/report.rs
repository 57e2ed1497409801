// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable processing report and machine-readable run metadata.

use std::fmt::Write as _;

use randwerk_core::config::OutputFormat;
use randwerk_core::error::Result;
use randwerk_core::types::{DocumentResult, ErrorRecord, MarginStatus, PageFinding, RunSummary};
use serde::{Deserialize, Serialize};

use crate::schema::errors_by_category;

/// Bumped whenever the dataset schema or the metadata layout changes.
pub const FORMAT_VERSION: u32 = 1;

/// Contents of the `<stem>_metadata.json` sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub format_version: u32,
    pub output_format: String,
    pub dataset_file: String,
    pub rows: usize,
    pub summary: RunSummary,
}

impl RunMetadata {
    pub fn new(summary: &RunSummary, format: OutputFormat, dataset_file: &str, rows: usize) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            output_format: format.label().to_string(),
            dataset_file: dataset_file.to_string(),
            rows,
            summary: summary.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Flatten into key/value pairs for the database `run_metadata` table.
    ///
    /// Top-level scalars become plain strings; nested values are kept as
    /// JSON text under their own key.
    pub fn to_pairs(&self) -> Result<Vec<(String, String)>> {
        let mut pairs = Vec::new();
        let serde_json::Value::Object(top) = serde_json::to_value(self)? else {
            return Ok(pairs);
        };
        for (key, value) in top {
            match value {
                serde_json::Value::Object(inner) => {
                    for (inner_key, inner_value) in inner {
                        pairs.push((format!("{key}.{inner_key}"), scalar_text(&inner_value)));
                    }
                }
                other => pairs.push((key, scalar_text(&other))),
            }
        }
        Ok(pairs)
    }
}

fn scalar_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

/// Render the plain-text processing report.
pub fn processing_report(
    summary: &RunSummary,
    results: &[DocumentResult],
    errors: &[ErrorRecord],
    format: OutputFormat,
    dataset_file: &str,
) -> String {
    let mut out = String::new();
    let sampling = &summary.sampling;

    // `write!` into a String cannot fail.
    let _ = writeln!(out, "MARGIN ANALYSIS PROCESSING REPORT");
    let _ = writeln!(out, "=================================");
    let _ = writeln!(out);
    let _ = writeln!(out, "Run ID:              {}", summary.run_id);
    let _ = writeln!(out, "Started:             {}", summary.started_at.to_rfc3339());
    let _ = writeln!(out, "Finished:            {}", summary.finished_at.to_rfc3339());
    let _ = writeln!(
        out,
        "Elapsed:             {:.2} s",
        summary.elapsed_ms as f64 / 1000.0
    );
    if summary.cancelled {
        let _ = writeln!(out, "Status:              CANCELLED (partial results)");
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Configuration");
    let _ = writeln!(out, "-------------");
    let _ = writeln!(out, "Margin threshold:    {}% of page height", summary.threshold_percent);
    let _ = writeln!(out, "Workers:             {}", summary.worker_count);
    let _ = writeln!(out, "Output format:       {}", format.label());
    let _ = writeln!(out, "Dataset:             {dataset_file}");
    let _ = writeln!(out);

    let _ = writeln!(out, "Sampling");
    let _ = writeln!(out, "--------");
    let _ = writeln!(out, "Method:              {}", sampling.method);
    if let Some(confidence) = sampling.confidence {
        let _ = writeln!(out, "Confidence level:    {confidence}%");
    }
    if let Some(margin) = sampling.margin_of_error {
        let _ = writeln!(out, "Margin of error:     {margin}%");
    }
    if let Some(seed) = sampling.seed {
        let _ = writeln!(out, "Seed:                {seed}");
    }
    let _ = writeln!(out, "Population:          {} documents", sampling.population_size);
    let _ = writeln!(out, "Sample:              {} documents", sampling.sample_size);
    if let Some(achieved) = sampling.achieved_margin_of_error {
        let _ = writeln!(out, "Achieved margin:     {achieved:.2}%");
    }
    let _ = writeln!(
        out,
        "Corpus examined:     {}",
        percent(summary.examined_fraction())
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "Results");
    let _ = writeln!(out, "-------");
    let _ = writeln!(
        out,
        "Documents:           {} of {} processed ({} completed, {} partial, {} failed)",
        summary.documents_done,
        summary.documents_total,
        summary.documents_completed,
        summary.documents_partial,
        summary.documents_failed
    );
    let _ = writeln!(out, "Pages analyzed:      {}", summary.pages_analyzed);
    let _ = writeln!(out, "Pages flagged:       {}", summary.pages_flagged);
    let _ = writeln!(out, "  header content:    {}", summary.header_flagged);
    let _ = writeln!(out, "  footer content:    {}", summary.footer_flagged);

    let findings: Vec<_> = results.iter().flat_map(|r| r.findings.iter()).collect();
    if !findings.is_empty() {
        let n = findings.len() as f64;
        let mean = |f: fn(&PageFinding) -> f64| {
            findings.iter().map(|p| f(p)).sum::<f64>() / n
        };
        let _ = writeln!(out, "Mean header density: {}", percent(mean(|p| p.header_density)));
        let _ = writeln!(out, "Mean footer density: {}", percent(mean(|p| p.footer_density)));
        let _ = writeln!(out, "Mean total margin content: {}", percent(mean(|p| p.total_density)));

        let _ = writeln!(out);
        let _ = writeln!(out, "Page verdicts");
        let _ = writeln!(out, "-------------");
        for status in [
            MarginStatus::Clean,
            MarginStatus::Header,
            MarginStatus::Footer,
            MarginStatus::HeaderAndFooter,
        ] {
            let count = findings.iter().filter(|p| p.status() == status).count();
            let _ = writeln!(out, "{:<34} {count}", status.describe());
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Errors");
    let _ = writeln!(out, "------");
    if errors.is_empty() {
        let _ = writeln!(out, "None");
    } else {
        for (category, count) in errors_by_category(errors) {
            let _ = writeln!(out, "{:<20} {count}", category.as_str());
        }
        let retried = errors.iter().filter(|e| e.retried).count();
        let _ = writeln!(out, "Retried before failing: {retried}");
    }

    out
}
