// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Result aggregation — the single owner of all mutable run state.
//
// Workers never share a DocumentResult. They send page ticks, error records
// and finished results over a channel; the aggregator counts, forwards events
// to the front end, and seals everything into a sorted outcome at the end.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use randwerk_core::types::{
    DocumentResult, DocumentStatus, ErrorRecord, RunId, RunSummary, SamplingSummary,
};
use tracing::{debug, warn};

use crate::events::{Progress, RunEvent};

/// Messages from workers to the aggregator.
#[derive(Debug)]
pub(crate) enum WorkerMessage {
    /// A page produced a finding.
    PageAnalyzed { flagged: bool },
    /// A page or document was finalized with an error.
    Error(ErrorRecord),
    /// A work unit finished and hands over its sealed result.
    Finished(DocumentResult),
}

/// Everything a run produced, sorted by document path then page index.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub results: Vec<DocumentResult>,
    pub errors: Vec<ErrorRecord>,
}

impl RunOutcome {
    /// Number of page findings across all documents.
    pub fn finding_count(&self) -> usize {
        self.results.iter().map(|r| r.findings.len()).sum()
    }
}

/// Fixed facts about a run, recorded in its summary.
#[derive(Debug, Clone)]
pub(crate) struct RunContext {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub worker_count: usize,
    pub threshold_percent: f64,
    pub sampling: SamplingSummary,
}

pub(crate) struct Aggregator {
    documents_total: usize,
    documents_done: usize,
    pages_done: usize,
    pages_flagged: usize,
    results: Vec<DocumentResult>,
    errors: Vec<ErrorRecord>,
    events: Option<Sender<RunEvent>>,
    clock: Instant,
}

impl Aggregator {
    pub fn new(documents_total: usize, events: Option<Sender<RunEvent>>) -> Self {
        Self {
            documents_total,
            documents_done: 0,
            pages_done: 0,
            pages_flagged: 0,
            results: Vec::with_capacity(documents_total),
            errors: Vec::new(),
            events,
            clock: Instant::now(),
        }
    }

    pub fn handle(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::PageAnalyzed { flagged } => {
                self.pages_done += 1;
                if flagged {
                    self.pages_flagged += 1;
                }
                self.emit_progress();
            }
            WorkerMessage::Error(record) => {
                warn!(
                    path = %record.document_path.display(),
                    page = ?record.page_index,
                    category = %record.category,
                    retried = record.retried,
                    message = %record.message,
                    "Item failed"
                );
                self.emit(RunEvent::Error(record.clone()));
                self.errors.push(record);
                self.emit_progress();
            }
            WorkerMessage::Finished(result) => {
                self.documents_done += 1;
                debug!(
                    path = %result.document.path.display(),
                    status = result.status.as_str(),
                    findings = result.findings.len(),
                    elapsed_ms = result.elapsed_ms,
                    "Document finished"
                );
                self.emit(RunEvent::DocumentFinished(result.clone()));
                self.results.push(result);
                self.emit_progress();
            }
        }
    }

    fn progress(&self) -> Progress {
        Progress {
            documents_done: self.documents_done,
            documents_total: self.documents_total,
            pages_done: self.pages_done,
            pages_flagged: self.pages_flagged,
            errors: self.errors.len(),
            elapsed: self.clock.elapsed(),
        }
    }

    fn emit_progress(&self) {
        self.emit(RunEvent::Progress(self.progress()));
    }

    /// Best effort: a front end that went away must not stop the run.
    fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Sort everything into its stable order and compute the totals.
    pub fn finish(mut self, context: RunContext, cancelled: bool) -> RunOutcome {
        for result in &mut self.results {
            result.findings.sort_by_key(|f| f.page.index);
            result.failed_pages.sort_unstable();
        }
        self.results.sort_by(|a, b| a.document.path.cmp(&b.document.path));
        self.errors.sort_by(|a, b| {
            (&a.document_path, a.page_index).cmp(&(&b.document_path, b.page_index))
        });

        let summary = summarize(
            &context,
            &self.results,
            &self.errors,
            self.documents_total,
            cancelled,
            self.clock,
        );
        RunOutcome {
            summary,
            results: self.results,
            errors: self.errors,
        }
    }
}

fn summarize(
    context: &RunContext,
    results: &[DocumentResult],
    errors: &[ErrorRecord],
    documents_total: usize,
    cancelled: bool,
    clock: Instant,
) -> RunSummary {
    let count_status = |status: DocumentStatus| results.iter().filter(|r| r.status == status).count();
    let findings = || results.iter().flat_map(|r| r.findings.iter());

    let mut errors_by_category = BTreeMap::new();
    for record in errors {
        *errors_by_category.entry(record.category).or_insert(0) += 1;
    }

    RunSummary {
        run_id: context.run_id,
        started_at: context.started_at,
        finished_at: Utc::now(),
        elapsed_ms: clock.elapsed().as_millis() as u64,
        worker_count: context.worker_count,
        threshold_percent: context.threshold_percent,
        documents_total,
        documents_done: results.len(),
        documents_completed: count_status(DocumentStatus::Completed),
        documents_partial: count_status(DocumentStatus::Partial),
        documents_failed: count_status(DocumentStatus::Failed),
        pages_analyzed: findings().count(),
        pages_flagged: findings().filter(|f| f.is_flagged()).count(),
        header_flagged: findings().filter(|f| f.header_flagged).count(),
        footer_flagged: findings().filter(|f| f.footer_flagged).count(),
        errors: errors.len(),
        errors_by_category,
        cancelled,
        sampling: context.sampling.clone(),
    }
}
