// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The dataset schema shared by every encoder.
//
// Column order, names and types live here once. The CSV header, the Parquet
// message type and the SQLite table definition are all generated from it.

use randwerk_core::types::{DocumentResult, ErrorCategory, ErrorRecord, PageFinding};
use serde::{Deserialize, Serialize};

/// Logical column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Boolean,
    Float,
}

impl ColumnType {
    fn parquet_physical(&self) -> &'static str {
        match self {
            Self::Text => "BYTE_ARRAY",
            Self::Integer => "INT64",
            Self::Boolean => "BOOLEAN",
            Self::Float => "DOUBLE",
        }
    }

    fn sqlite_affinity(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer | Self::Boolean => "INTEGER",
            Self::Float => "REAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnType,
    pub nullable: bool,
}

const fn required(name: &'static str, kind: ColumnType) -> Column {
    Column {
        name,
        kind,
        nullable: false,
    }
}

/// Per-page results, one row per analyzed page.
pub const RESULT_COLUMNS: [Column; 7] = [
    required("document_path", ColumnType::Text),
    required("page_index", ColumnType::Integer),
    required("header_flagged", ColumnType::Boolean),
    required("footer_flagged", ColumnType::Boolean),
    required("header_density", ColumnType::Float),
    required("footer_density", ColumnType::Float),
    required("threshold_used", ColumnType::Float),
];

/// Error report rows.
pub const ERROR_COLUMNS: [Column; 5] = [
    required("document_path", ColumnType::Text),
    Column {
        name: "page_index",
        kind: ColumnType::Integer,
        nullable: true,
    },
    required("category", ColumnType::Text),
    required("message", ColumnType::Text),
    required("retried", ColumnType::Boolean),
];

pub fn column_names(columns: &[Column]) -> Vec<&'static str> {
    columns.iter().map(|c| c.name).collect()
}

/// Parquet message type for `columns`, e.g. `message results { ... }`.
pub fn parquet_message_type(message: &str, columns: &[Column]) -> String {
    let mut out = format!("message {message} {{\n");
    for column in columns {
        let repetition = if column.nullable { "OPTIONAL" } else { "REQUIRED" };
        let annotation = if column.kind == ColumnType::Text { " (UTF8)" } else { "" };
        out.push_str(&format!(
            "  {repetition} {} {}{annotation};\n",
            column.kind.parquet_physical(),
            column.name
        ));
    }
    out.push('}');
    out
}

/// `CREATE TABLE` statement for `columns`.
pub fn sqlite_create_table(table: &str, columns: &[Column]) -> String {
    let body: Vec<String> = columns
        .iter()
        .map(|c| {
            let null = if c.nullable { "" } else { " NOT NULL" };
            format!("    {} {}{null}", c.name, c.kind.sqlite_affinity())
        })
        .collect();
    format!("CREATE TABLE {table} (\n{}\n)", body.join(",\n"))
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// One dataset row. Field order matches [`RESULT_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub document_path: String,
    pub page_index: u32,
    pub header_flagged: bool,
    pub footer_flagged: bool,
    pub header_density: f64,
    pub footer_density: f64,
    pub threshold_used: f64,
}

impl From<&PageFinding> for DatasetRow {
    fn from(finding: &PageFinding) -> Self {
        Self {
            document_path: finding.page.document_path.display().to_string(),
            page_index: finding.page.index,
            header_flagged: finding.header_flagged,
            footer_flagged: finding.footer_flagged,
            header_density: finding.header_density,
            footer_density: finding.footer_density,
            threshold_used: finding.threshold_used,
        }
    }
}

/// Dataset rows for `results`, sorted by document path then page index.
pub fn dataset_rows(results: &[DocumentResult]) -> Vec<DatasetRow> {
    let mut rows: Vec<DatasetRow> = results
        .iter()
        .flat_map(|r| r.findings.iter().map(DatasetRow::from))
        .collect();
    rows.sort_by(|a, b| {
        (a.document_path.as_str(), a.page_index).cmp(&(b.document_path.as_str(), b.page_index))
    });
    rows
}

/// One error report row. Field order matches [`ERROR_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRow {
    pub document_path: String,
    pub page_index: Option<u32>,
    pub category: String,
    pub message: String,
    pub retried: bool,
}

impl From<&ErrorRecord> for ErrorRow {
    fn from(record: &ErrorRecord) -> Self {
        Self {
            document_path: record.document_path.display().to_string(),
            page_index: record.page_index,
            category: record.category.as_str().to_string(),
            message: record.message.clone(),
            retried: record.retried,
        }
    }
}

/// Error rows grouped by category, then sorted by path and page.
pub fn error_rows(errors: &[ErrorRecord]) -> Vec<ErrorRow> {
    let mut sorted: Vec<&ErrorRecord> = errors.iter().collect();
    sorted.sort_by(|a, b| {
        (a.category, &a.document_path, a.page_index).cmp(&(
            b.category,
            &b.document_path,
            b.page_index,
        ))
    });
    sorted.into_iter().map(ErrorRow::from).collect()
}

/// Count errors per category, in category order.
pub fn errors_by_category(errors: &[ErrorRecord]) -> Vec<(ErrorCategory, usize)> {
    let mut counts = std::collections::BTreeMap::new();
    for record in errors {
        *counts.entry(record.category).or_insert(0usize) += 1;
    }
    counts.into_iter().collect()
}
