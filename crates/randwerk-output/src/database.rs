// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Embedded-database encoding (SQLite).
//
// Schema:
//   results(document_path, page_index, header_flagged, footer_flagged,
//           header_density, footer_density, threshold_used)
//   errors(document_path, page_index?, category, message, retried)
//   run_metadata(key TEXT PRIMARY KEY, value TEXT)
//
// Everything is written inside one transaction, so a failure leaves no
// half-filled tables behind.

use std::path::Path;

use randwerk_core::error::{RandwerkError, Result};
use rusqlite::{Connection, OpenFlags, params};
use tracing::{debug, instrument};

use crate::schema::{DatasetRow, ERROR_COLUMNS, ErrorRow, RESULT_COLUMNS, sqlite_create_table};

pub const RESULTS_TABLE: &str = "results";
pub const ERRORS_TABLE: &str = "errors";
pub const METADATA_TABLE: &str = "run_metadata";

/// Convert a `rusqlite::Error` into a `RandwerkError::Database`.
fn db_err(e: rusqlite::Error) -> RandwerkError {
    RandwerkError::Database(e.to_string())
}

/// Write the dataset, error rows and run metadata into a fresh database at
/// `path`.
#[instrument(skip_all, fields(path = %path.display(), rows = rows.len()))]
pub fn write_database(
    path: &Path,
    rows: &[DatasetRow],
    errors: &[ErrorRow],
    metadata: &[(String, String)],
) -> Result<()> {
    let mut conn = Connection::open(path).map_err(db_err)?;
    let tx = conn.transaction().map_err(db_err)?;

    tx.execute_batch(&format!(
        "{};\n{};\nCREATE TABLE {METADATA_TABLE} (key TEXT PRIMARY KEY, value TEXT NOT NULL);",
        sqlite_create_table(RESULTS_TABLE, &RESULT_COLUMNS),
        sqlite_create_table(ERRORS_TABLE, &ERROR_COLUMNS),
    ))
    .map_err(db_err)?;

    {
        let mut insert = tx
            .prepare(&format!(
                "INSERT INTO {RESULTS_TABLE} VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            ))
            .map_err(db_err)?;
        for row in rows {
            insert
                .execute(params![
                    row.document_path,
                    row.page_index,
                    row.header_flagged,
                    row.footer_flagged,
                    row.header_density,
                    row.footer_density,
                    row.threshold_used,
                ])
                .map_err(db_err)?;
        }

        let mut insert = tx
            .prepare(&format!("INSERT INTO {ERRORS_TABLE} VALUES (?1, ?2, ?3, ?4, ?5)"))
            .map_err(db_err)?;
        for row in errors {
            insert
                .execute(params![
                    row.document_path,
                    row.page_index,
                    row.category,
                    row.message,
                    row.retried,
                ])
                .map_err(db_err)?;
        }

        let mut insert = tx
            .prepare(&format!("INSERT INTO {METADATA_TABLE} (key, value) VALUES (?1, ?2)"))
            .map_err(db_err)?;
        for (key, value) in metadata {
            insert.execute(params![key, value]).map_err(db_err)?;
        }
    }

    tx.commit().map_err(db_err)?;
    conn.close().map_err(|(_, e)| db_err(e))?;
    debug!(errors = errors.len(), "SQLite dataset written");
    Ok(())
}

fn open_read_only(path: &Path) -> Result<Connection> {
    Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(db_err)
}

/// Read the dataset rows, sorted by document path and page index.
pub fn read_rows(path: &Path) -> Result<Vec<DatasetRow>> {
    let conn = open_read_only(path)?;
    let mut stmt = conn
        .prepare(&format!(
            "SELECT document_path, page_index, header_flagged, footer_flagged,
                    header_density, footer_density, threshold_used
             FROM {RESULTS_TABLE} ORDER BY document_path, page_index"
        ))
        .map_err(db_err)?;

    let rows = stmt
        .query_map([], |row| {
            Ok(DatasetRow {
                document_path: row.get(0)?,
                page_index: row.get(1)?,
                header_flagged: row.get(2)?,
                footer_flagged: row.get(3)?,
                header_density: row.get(4)?,
                footer_density: row.get(5)?,
                threshold_used: row.get(6)?,
            })
        })
        .map_err(db_err)?;

    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
}

/// Read the error table in stored order.
pub fn read_errors(path: &Path) -> Result<Vec<ErrorRow>> {
    let conn = open_read_only(path)?;
    let mut stmt = conn
        .prepare(&format!(
            "SELECT document_path, page_index, category, message, retried
             FROM {ERRORS_TABLE} ORDER BY rowid"
        ))
        .map_err(db_err)?;

    let rows = stmt
        .query_map([], |row| {
            Ok(ErrorRow {
                document_path: row.get(0)?,
                page_index: row.get(1)?,
                category: row.get(2)?,
                message: row.get(3)?,
                retried: row.get(4)?,
            })
        })
        .map_err(db_err)?;

    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
}

/// Look up one run metadata entry.
pub fn read_metadata(path: &Path, key: &str) -> Result<Option<String>> {
    let conn = open_read_only(path)?;
    let mut stmt = conn
        .prepare(&format!("SELECT value FROM {METADATA_TABLE} WHERE key = ?1"))
        .map_err(db_err)?;
    let mut rows = stmt.query(params![key]).map_err(db_err)?;
    match rows.next().map_err(db_err)? {
        Some(row) => Ok(Some(row.get(0).map_err(db_err)?)),
        None => Ok(None),
    }
}
