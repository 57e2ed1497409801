// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Run events and cancellation — the only coupling between the engine and
// whatever front end drives it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use randwerk_core::types::{DocumentResult, ErrorRecord};

/// Snapshot of run progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub documents_done: usize,
    pub documents_total: usize,
    pub pages_done: usize,
    pub pages_flagged: usize,
    /// Error records so far, page and document level.
    pub errors: usize,
    pub elapsed: Duration,
}

impl Progress {
    /// Documents finished per second so far.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            0.0
        } else {
            self.documents_done as f64 / secs
        }
    }

    /// Estimated time to finish the remaining documents at the current rate.
    pub fn eta(&self) -> Option<Duration> {
        let rate = self.rate();
        if rate <= 0.0 {
            return None;
        }
        let remaining = self.documents_total.saturating_sub(self.documents_done);
        Some(Duration::from_secs_f64(remaining as f64 / rate))
    }
}

/// Something the front end may want to show while a run is in flight.
#[derive(Debug, Clone)]
pub enum RunEvent {
    Progress(Progress),
    DocumentFinished(DocumentResult),
    Error(ErrorRecord),
}

/// Channel for run events. Unbounded so that a slow consumer never stalls
/// the aggregator.
pub fn event_channel() -> (Sender<RunEvent>, Receiver<RunEvent>) {
    crossbeam_channel::unbounded()
}

/// Cooperative cancellation flag shared between the caller and the workers.
///
/// Workers check it before taking a new document and between pages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
