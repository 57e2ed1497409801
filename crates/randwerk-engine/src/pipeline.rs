// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch pipeline — validate, plan, analyze, persist.

use crossbeam_channel::Sender;
use randwerk_core::config::AnalysisConfig;
use randwerk_core::error::Result;
use randwerk_core::types::Document;
use randwerk_document::Rasterizer;
use randwerk_output::WriteReport;
use tracing::{error, info, instrument};

use crate::aggregate::RunOutcome;
use crate::events::{CancelToken, RunEvent};
use crate::sampling;
use crate::scheduler::{self, SchedulerOptions};

/// A finished batch: what was analyzed and where it was written.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub outcome: RunOutcome,
    pub written: WriteReport,
}

/// Run one full analysis over `documents`.
///
/// Configuration errors are returned before any document is opened.
/// Per-document failures are recorded in the outcome and never abort the
/// batch. A cancelled run still persists what it collected. A failure to
/// write the results is returned as a destination error and leaves nothing
/// at the destination.
#[instrument(skip_all, fields(population = documents.len()))]
pub fn analyze_batch(
    documents: Vec<Document>,
    config: &AnalysisConfig,
    rasterizer: &dyn Rasterizer,
    events: Option<Sender<RunEvent>>,
    cancel: &CancelToken,
) -> Result<BatchOutcome> {
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(e);
    }

    let plan = sampling::plan(documents, &config.sampling)?;
    let options = SchedulerOptions::from_config(config);
    let outcome = scheduler::run(&plan, rasterizer, &options, events, cancel)?;

    let written = randwerk_output::write(
        &outcome.results,
        &outcome.errors,
        &outcome.summary,
        config.output_format,
        &config.output_destination,
    )
    .inspect_err(|e| error!(error = %e, "Could not write results"))?;

    info!(
        dataset = %written.dataset.display(),
        rows = written.rows,
        cancelled = outcome.summary.cancelled,
        "Batch complete"
    );
    Ok(BatchOutcome { outcome, written })
}
