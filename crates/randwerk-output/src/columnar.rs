// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Columnar encoding (Parquet) of the dataset.
//
// All rows go into a single Snappy-compressed row group. Columns are written
// in schema order, each from its own typed buffer.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use parquet::basic::Compression;
use parquet::data_type::{BoolType, ByteArray, ByteArrayType, DoubleType, Int64Type};
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::writer::{SerializedColumnWriter, SerializedFileWriter};
use parquet::record::RowAccessor;
use parquet::schema::parser::parse_message_type;
use randwerk_core::error::{RandwerkError, Result};
use tracing::debug;

use crate::schema::{ColumnType, DatasetRow, RESULT_COLUMNS, parquet_message_type};

const MESSAGE_NAME: &str = "margin_findings";

fn pq_err(e: ParquetError) -> RandwerkError {
    RandwerkError::Columnar(e.to_string())
}

/// One column's values, in row order.
enum ColumnValues {
    Text(Vec<ByteArray>),
    Integer(Vec<i64>),
    Boolean(Vec<bool>),
    Float(Vec<f64>),
}

impl ColumnValues {
    fn collect(name: &str, kind: ColumnType, rows: &[DatasetRow]) -> Result<Self> {
        let values = match (name, kind) {
            ("document_path", ColumnType::Text) => Self::Text(
                rows.iter()
                    .map(|r| ByteArray::from(r.document_path.as_str()))
                    .collect(),
            ),
            ("page_index", ColumnType::Integer) => {
                Self::Integer(rows.iter().map(|r| r.page_index as i64).collect())
            }
            ("header_flagged", ColumnType::Boolean) => {
                Self::Boolean(rows.iter().map(|r| r.header_flagged).collect())
            }
            ("footer_flagged", ColumnType::Boolean) => {
                Self::Boolean(rows.iter().map(|r| r.footer_flagged).collect())
            }
            ("header_density", ColumnType::Float) => {
                Self::Float(rows.iter().map(|r| r.header_density).collect())
            }
            ("footer_density", ColumnType::Float) => {
                Self::Float(rows.iter().map(|r| r.footer_density).collect())
            }
            ("threshold_used", ColumnType::Float) => {
                Self::Float(rows.iter().map(|r| r.threshold_used).collect())
            }
            (other, kind) => {
                return Err(RandwerkError::Internal(format!(
                    "no columnar encoder for column {other} ({kind:?})"
                )));
            }
        };
        Ok(values)
    }

    fn write(&self, column: &mut SerializedColumnWriter<'_>) -> Result<usize> {
        let written = match self {
            Self::Text(v) => column.typed::<ByteArrayType>().write_batch(v, None, None),
            Self::Integer(v) => column.typed::<Int64Type>().write_batch(v, None, None),
            Self::Boolean(v) => column.typed::<BoolType>().write_batch(v, None, None),
            Self::Float(v) => column.typed::<DoubleType>().write_batch(v, None, None),
        };
        written.map_err(pq_err)
    }
}

/// Write `rows` as a Parquet file into `sink`.
pub fn write_rows<W: Write + Send>(sink: W, rows: &[DatasetRow]) -> Result<()> {
    let message = parquet_message_type(MESSAGE_NAME, &RESULT_COLUMNS);
    let schema = Arc::new(parse_message_type(&message).map_err(pq_err)?);
    let props = Arc::new(
        WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .set_created_by(format!("randwerk {}", env!("CARGO_PKG_VERSION")))
            .build(),
    );

    let mut writer = SerializedFileWriter::new(sink, schema, props).map_err(pq_err)?;

    if !rows.is_empty() {
        let mut row_group = writer.next_row_group().map_err(pq_err)?;
        for column in &RESULT_COLUMNS {
            let values = ColumnValues::collect(column.name, column.kind, rows)?;
            let Some(mut col_writer) = row_group.next_column().map_err(pq_err)? else {
                return Err(RandwerkError::Columnar(format!(
                    "schema ended before column {}",
                    column.name
                )));
            };
            values.write(&mut col_writer)?;
            col_writer.close().map_err(pq_err)?;
        }
        row_group.close().map_err(pq_err)?;
    }

    writer.close().map_err(pq_err)?;
    debug!(rows = rows.len(), "Parquet dataset encoded");
    Ok(())
}

/// Read every row of a Parquet dataset written by [`write_rows`].
pub fn read_rows(path: &Path) -> Result<Vec<DatasetRow>> {
    let file = File::open(path)?;
    let reader = SerializedFileReader::new(file).map_err(pq_err)?;

    let mut rows = Vec::new();
    for record in reader.get_row_iter(None).map_err(pq_err)? {
        let record = record.map_err(pq_err)?;
        let page_index = record.get_long(1).map_err(pq_err)?;
        rows.push(DatasetRow {
            document_path: record.get_string(0).map_err(pq_err)?.clone(),
            page_index: u32::try_from(page_index).map_err(|_| {
                RandwerkError::Columnar(format!("page index {page_index} out of range"))
            })?,
            header_flagged: record.get_bool(2).map_err(pq_err)?,
            footer_flagged: record.get_bool(3).map_err(pq_err)?,
            header_density: record.get_double(4).map_err(pq_err)?,
            footer_density: record.get_double(5).map_err(pq_err)?,
            threshold_used: record.get_double(6).map_err(pq_err)?,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<DatasetRow> {
        vec![
            DatasetRow {
                document_path: "/corpus/a.pdf".into(),
                page_index: 0,
                header_flagged: true,
                footer_flagged: false,
                header_density: 0.186_274_509_803_921_57,
                footer_density: 0.0,
                threshold_used: 2.5,
            },
            DatasetRow {
                document_path: "/corpus/a.pdf".into(),
                page_index: 1,
                header_flagged: false,
                footer_flagged: true,
                header_density: 0.0,
                footer_density: 1.0 / 3.0,
                threshold_used: 2.5,
            },
        ]
    }

    #[test]
    fn values_survive_bit_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.parquet");
        write_rows(File::create(&path).unwrap(), &rows()).unwrap();
        assert_eq!(read_rows(&path).unwrap(), rows());
    }

    #[test]
    fn empty_dataset_is_a_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.parquet");
        write_rows(File::create(&path).unwrap(), &[]).unwrap();
        assert!(read_rows(&path).unwrap().is_empty());
    }

    #[test]
    fn garbage_file_is_columnar_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not.parquet");
        std::fs::write(&path, b"plain text").unwrap();
        assert!(matches!(read_rows(&path), Err(RandwerkError::Columnar(_))));
    }
}
