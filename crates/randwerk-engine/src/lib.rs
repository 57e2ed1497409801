// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// randwerk-engine — Sampling, the parallel worker pool, and the batch
// pipeline that ties planning, analysis and persistence together.

mod aggregate;
pub mod events;
pub mod pipeline;
pub mod retry;
pub mod sampling;
pub mod scheduler;

pub use aggregate::RunOutcome;
pub use events::{CancelToken, Progress, RunEvent, event_channel};
pub use pipeline::{BatchOutcome, analyze_batch};
pub use scheduler::{SchedulerOptions, run};
