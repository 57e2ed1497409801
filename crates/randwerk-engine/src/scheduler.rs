// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Worker pool — spreads a sampling plan across OS threads.
//
// Each document is one work unit. Units sit in a pre-filled queue; workers
// pull from it until it is empty or the run is cancelled. A worker owns the
// DocumentResult it is building and hands it to the aggregator exactly once.
// Panics are caught at the unit boundary so one bad file cannot take the
// pool down.

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender};
use randwerk_core::config::{AnalysisConfig, DetectorSettings, RetrySettings};
use randwerk_core::error::{RandwerkError, Result};
use randwerk_core::types::{
    Document, DocumentResult, DocumentStatus, ErrorCategory, ErrorRecord, PageFinding, RunId,
    SamplingPlan,
};
use randwerk_document::{MarginDetector, Rasterizer};
use tracing::{debug, error, info, instrument};

use crate::aggregate::{Aggregator, RunContext, RunOutcome, WorkerMessage};
use crate::events::{CancelToken, RunEvent};
use crate::retry::with_retry;

/// Settings the pool needs from the analysis configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerOptions {
    pub worker_count: usize,
    pub threshold_percent: f64,
    pub detector: DetectorSettings,
    pub retry: RetrySettings,
}

impl SchedulerOptions {
    /// Take the pool settings from a validated configuration, resolving the
    /// worker count against the available cores.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            worker_count: config.resolved_workers(),
            threshold_percent: config.threshold_percent,
            detector: config.detector,
            retry: config.retry,
        }
    }
}

/// Shared, read-only inputs of every worker.
struct WorkerContext<'a> {
    documents: &'a [Document],
    rasterizer: &'a dyn Rasterizer,
    detector: MarginDetector,
    retry: RetrySettings,
    cancel: &'a CancelToken,
}

/// Analyze every document in `plan`.
///
/// Events are sent to `events` while the run is in flight. Cancelling
/// `cancel` stops dispatch of new documents; documents already started stop
/// at the next page boundary and are reported as partial. Only invalid
/// settings make this return an error; per-document failures end up in the
/// outcome's error records.
#[instrument(skip_all, fields(documents = plan.documents.len(), workers = options.worker_count))]
pub fn run(
    plan: &SamplingPlan,
    rasterizer: &dyn Rasterizer,
    options: &SchedulerOptions,
    events: Option<Sender<RunEvent>>,
    cancel: &CancelToken,
) -> Result<RunOutcome> {
    if options.worker_count == 0 {
        return Err(RandwerkError::Config(
            "worker_count must be at least 1".into(),
        ));
    }
    let detector = MarginDetector::new(options.threshold_percent, options.detector)?;

    let total = plan.documents.len();
    let workers = options.worker_count.min(total.max(1));
    let context = RunContext {
        run_id: RunId::new(),
        started_at: Utc::now(),
        worker_count: workers,
        threshold_percent: options.threshold_percent,
        sampling: plan.summary(),
    };
    info!(run_id = %context.run_id, total, workers, "Run started");

    let (work_tx, work_rx) = crossbeam_channel::unbounded::<usize>();
    for index in 0..total {
        // The receiver is alive in this scope, so the send cannot fail.
        let _ = work_tx.send(index);
    }
    drop(work_tx);

    let (msg_tx, msg_rx) = crossbeam_channel::unbounded::<WorkerMessage>();
    let mut aggregator = Aggregator::new(total, events);

    let shared = WorkerContext {
        documents: &plan.documents,
        rasterizer,
        detector,
        retry: options.retry,
        cancel,
    };

    std::thread::scope(|scope| {
        for worker_id in 0..workers {
            let work_rx = work_rx.clone();
            let msg_tx = msg_tx.clone();
            let shared = &shared;
            scope.spawn(move || worker_loop(worker_id, shared, work_rx, msg_tx));
        }
        drop(msg_tx);

        for message in msg_rx.iter() {
            aggregator.handle(message);
        }
    });

    let cancelled = cancel.is_cancelled();
    let outcome = aggregator.finish(context, cancelled);
    info!(
        run_id = %outcome.summary.run_id,
        documents_done = outcome.summary.documents_done,
        pages_flagged = outcome.summary.pages_flagged,
        errors = outcome.summary.errors,
        cancelled,
        elapsed_ms = outcome.summary.elapsed_ms,
        "Run finished"
    );
    Ok(outcome)
}

fn worker_loop(
    worker_id: usize,
    shared: &WorkerContext<'_>,
    work_rx: Receiver<usize>,
    msg_tx: Sender<WorkerMessage>,
) {
    debug!(worker_id, "Worker started");
    while !shared.cancel.is_cancelled() {
        let Ok(index) = work_rx.recv() else {
            break;
        };
        let Some(document) = shared.documents.get(index) else {
            continue;
        };

        let mut unit = UnitBuilder::new(document);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            process_document(shared, &mut unit, &msg_tx);
        }));

        if let Err(payload) = outcome {
            let message = panic_message(payload.as_ref());
            error!(
                worker_id,
                path = %document.path.display(),
                page = ?unit.current_page,
                %message,
                "Work unit panicked"
            );
            let record = ErrorRecord {
                document_path: document.path.clone(),
                page_index: unit.current_page,
                category: ErrorCategory::Internal,
                message: format!("internal fault: {message}"),
                retried: false,
            };
            let _ = msg_tx.send(WorkerMessage::Error(record));
            if let Some(page) = unit.current_page.take() {
                unit.failed_pages.push(page);
            }
            unit.faulted = true;
        }

        let _ = msg_tx.send(WorkerMessage::Finished(unit.seal()));
    }
    debug!(worker_id, "Worker stopped");
}

/// Open one document and analyze its pages in index order.
fn process_document(
    shared: &WorkerContext<'_>,
    unit: &mut UnitBuilder,
    msg_tx: &Sender<WorkerMessage>,
) {
    let document = unit.document.clone();
    let path = &document.path;

    let (opened, retried) = with_retry(&shared.retry, || shared.rasterizer.open(&document));
    let mut opened = match opened {
        Ok(opened) => opened,
        Err(err) => {
            let _ = msg_tx.send(WorkerMessage::Error(ErrorRecord::from_error(
                path, None, &err, retried,
            )));
            unit.open_failed = true;
            return;
        }
    };

    let page_count = opened.page_count();
    unit.planned_pages = Some(page_count);

    for index in 0..page_count {
        if shared.cancel.is_cancelled() {
            debug!(path = %path.display(), page = index, "Cancelled mid-document");
            break;
        }
        unit.current_page = Some(index);

        let (raster, retried) = with_retry(&shared.retry, || opened.rasterize(index));
        match raster {
            Ok(raster) => {
                let finding = shared.detector.analyze(path, index, &raster);
                let _ = msg_tx.send(WorkerMessage::PageAnalyzed {
                    flagged: finding.is_flagged(),
                });
                unit.findings.push(finding);
            }
            Err(err) => {
                let _ = msg_tx.send(WorkerMessage::Error(ErrorRecord::from_error(
                    path,
                    Some(index),
                    &err,
                    retried,
                )));
                unit.failed_pages.push(index);
            }
        }
    }
    unit.current_page = None;
}

/// A DocumentResult under construction, owned by one worker.
struct UnitBuilder {
    document: Document,
    planned_pages: Option<u32>,
    findings: Vec<PageFinding>,
    failed_pages: Vec<u32>,
    current_page: Option<u32>,
    open_failed: bool,
    faulted: bool,
    started_at: DateTime<Utc>,
    clock: Instant,
}

impl UnitBuilder {
    fn new(document: &Document) -> Self {
        Self {
            document: document.clone(),
            planned_pages: None,
            findings: Vec::new(),
            failed_pages: Vec::new(),
            current_page: None,
            open_failed: false,
            faulted: false,
            started_at: Utc::now(),
            clock: Instant::now(),
        }
    }

    fn status(&self) -> DocumentStatus {
        let finalized = self.findings.len() + self.failed_pages.len();
        let planned = self.planned_pages.map(|p| p as usize);

        if self.open_failed || (self.findings.is_empty() && (self.faulted || finalized > 0)) {
            return DocumentStatus::Failed;
        }
        match planned {
            Some(planned) if finalized >= planned && !self.faulted => DocumentStatus::Completed,
            Some(_) => DocumentStatus::Partial,
            None => DocumentStatus::Failed,
        }
    }

    fn seal(self) -> DocumentResult {
        let status = self.status();
        let mut document = self.document;
        if document.page_count.is_none() {
            document.page_count = self.planned_pages;
        }
        DocumentResult {
            document,
            status,
            planned_pages: self.planned_pages,
            findings: self.findings,
            failed_pages: self.failed_pages,
            started_at: self.started_at,
            elapsed_ms: self.clock.elapsed().as_millis() as u64,
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
