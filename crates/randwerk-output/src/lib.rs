// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// randwerk-output — Result persistence for Randwerk.
//
// One logical schema, three encodings (CSV, Parquet, SQLite), plus the
// processing report, the error report and a JSON metadata sidecar. Every
// artifact is staged in a temporary file beside the destination and renamed
// into place only when all of them were written.

pub mod columnar;
pub mod database;
pub mod report;
pub mod schema;
pub mod tabular;
pub mod writer;

pub use schema::{DatasetRow, ErrorRow};
pub use report::RunMetadata;
pub use writer::{ArtifactPaths, WriteReport, read_dataset, read_error_report, write};
