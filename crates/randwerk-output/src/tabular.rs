// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Delimited-text encoding (CSV) of the dataset and the error report.

use std::io::{Read, Write};

use randwerk_core::error::{RandwerkError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::schema::{Column, DatasetRow, ERROR_COLUMNS, ErrorRow, RESULT_COLUMNS, column_names};

fn csv_err(e: csv::Error) -> RandwerkError {
    RandwerkError::Tabular(e.to_string())
}

fn write_table<W: Write, R: Serialize>(sink: W, columns: &[Column], rows: &[R]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(sink);
    writer.write_record(column_names(columns)).map_err(csv_err)?;
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer
        .flush()
        .map_err(|e| RandwerkError::Tabular(e.to_string()))
}

fn read_table<R: Read, T: DeserializeOwned>(source: R, columns: &[Column]) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_reader(source);
    let headers = reader.headers().map_err(csv_err)?.clone();
    let expected = column_names(columns);
    if headers.iter().ne(expected.iter().copied()) {
        return Err(RandwerkError::Tabular(format!(
            "unexpected header {:?}, expected {:?}",
            headers.iter().collect::<Vec<_>>(),
            expected
        )));
    }
    reader
        .deserialize()
        .map(|row| row.map_err(csv_err))
        .collect()
}

/// Write dataset rows with a header line.
pub fn write_rows<W: Write>(sink: W, rows: &[DatasetRow]) -> Result<()> {
    write_table(sink, &RESULT_COLUMNS, rows)
}

pub fn read_rows<R: Read>(source: R) -> Result<Vec<DatasetRow>> {
    read_table(source, &RESULT_COLUMNS)
}

/// Write the error report. A missing page index is an empty field.
pub fn write_errors<W: Write>(sink: W, rows: &[ErrorRow]) -> Result<()> {
    write_table(sink, &ERROR_COLUMNS, rows)
}

pub fn read_errors<R: Read>(source: R) -> Result<Vec<ErrorRow>> {
    read_table(source, &ERROR_COLUMNS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(path: &str, page: u32, footer: bool) -> DatasetRow {
        DatasetRow {
            document_path: path.into(),
            page_index: page,
            header_flagged: false,
            footer_flagged: footer,
            header_density: 0.0,
            footer_density: if footer { 0.0634 } else { 0.0 },
            threshold_used: 1.0,
        }
    }

    #[test]
    fn dataset_has_schema_header() {
        let mut out = Vec::new();
        write_rows(&mut out, &[row("/scans/a.png", 0, true)]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("document_path,page_index,header_flagged,footer_flagged,header_density,footer_density,threshold_used")
        );
        assert_eq!(lines.next(), Some("/scans/a.png,0,false,true,0.0,0.0634,1.0"));
    }

    #[test]
    fn empty_dataset_still_has_header() {
        let mut out = Vec::new();
        write_rows(&mut out, &[]).unwrap();
        assert_eq!(read_rows(out.as_slice()).unwrap(), vec![]);
        assert!(String::from_utf8(out).unwrap().starts_with("document_path,"));
    }

    #[test]
    fn paths_with_commas_are_quoted() {
        let rows = vec![row("/scans/smith, j/letter.pdf", 3, false)];
        let mut out = Vec::new();
        write_rows(&mut out, &rows).unwrap();
        assert_eq!(read_rows(out.as_slice()).unwrap(), rows);
    }

    #[test]
    fn error_report_leaves_missing_page_empty() {
        let rows = vec![ErrorRow {
            document_path: "/in/broken.pdf".into(),
            page_index: None,
            category: "permanent".into(),
            message: "PDF operation failed: bad xref".into(),
            retried: false,
        }];
        let mut out = Vec::new();
        write_errors(&mut out, &rows).unwrap();
        let text = String::from_utf8(out.clone()).unwrap();
        assert!(text.contains("/in/broken.pdf,,permanent,"));
        assert_eq!(read_errors(out.as_slice()).unwrap(), rows);
    }

    #[test]
    fn foreign_header_rejected() {
        let err = read_rows("a,b,c\n1,2,3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, RandwerkError::Tabular(_)));
    }
}
