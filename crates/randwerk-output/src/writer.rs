// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Atomic persistence of a run's artifacts.
//
// Artifacts for a dataset `<dir>/<stem>.<ext>`:
//   <stem>.<ext>             results dataset (csv / parquet / db)
//   <stem>_report.txt        processing report
//   <stem>_metadata.json     run metadata
//   <stem>_errors.csv        error report, only when errors exist
//
// Each artifact is encoded into a temporary file in <dir> and renamed into
// place only after every artifact encoded successfully.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use randwerk_core::config::OutputFormat;
use randwerk_core::error::{RandwerkError, Result};
use randwerk_core::types::{DocumentResult, ErrorRecord, RunSummary};
use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, info, instrument, warn};

use crate::report::{RunMetadata, processing_report};
use crate::schema::{DatasetRow, ErrorRow, dataset_rows, error_rows};
use crate::{columnar, database, tabular};

/// Stem used when the destination is an existing directory.
pub const DEFAULT_STEM: &str = "margin_analysis";

/// Where each artifact of a run ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub dataset: PathBuf,
    pub report: PathBuf,
    pub metadata: PathBuf,
    pub errors: PathBuf,
}

impl ArtifactPaths {
    /// Resolve the artifact set for `destination`.
    ///
    /// An existing directory receives `margin_analysis.<ext>`; a path without
    /// an extension gets the format's extension appended.
    pub fn resolve(destination: &Path, format: OutputFormat) -> Self {
        let dataset = if destination.is_dir() {
            destination.join(format!("{DEFAULT_STEM}.{}", format.extension()))
        } else if destination.extension().is_none() {
            destination.with_extension(format.extension())
        } else {
            destination.to_path_buf()
        };

        let stem = dataset
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_STEM.to_string());
        let sibling = |suffix: &str| dataset.with_file_name(format!("{stem}{suffix}"));

        Self {
            report: sibling("_report.txt"),
            metadata: sibling("_metadata.json"),
            errors: sibling("_errors.csv"),
            dataset,
        }
    }

    /// Directory holding every artifact.
    pub fn directory(&self) -> PathBuf {
        self.dataset
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// What [`write`] produced.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteReport {
    pub format: OutputFormat,
    pub dataset: PathBuf,
    pub report: PathBuf,
    pub metadata: PathBuf,
    /// Present only when the run recorded errors.
    pub error_report: Option<PathBuf>,
    pub rows: usize,
    pub error_rows: usize,
}

/// An encoded artifact waiting to be renamed onto its target.
struct Staged {
    temp: TempPath,
    target: PathBuf,
}

/// Persist a run: dataset, processing report, metadata sidecar and, when
/// `errors` is non-empty, the error report.
///
/// Every failure is a destination error and leaves none of this run's
/// artifacts behind.
#[instrument(skip_all, fields(destination = %destination.display(), format = format.label()))]
pub fn write(
    documents: &[DocumentResult],
    errors: &[ErrorRecord],
    summary: &RunSummary,
    format: OutputFormat,
    destination: &Path,
) -> Result<WriteReport> {
    let paths = ArtifactPaths::resolve(destination, format);
    let dir = paths.directory();
    std::fs::create_dir_all(&dir).map_err(|e| RandwerkError::destination(&dir, e))?;

    let rows = dataset_rows(documents);
    let error_rows = error_rows(errors);
    let dataset_name = paths
        .dataset
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let metadata = RunMetadata::new(summary, format, &dataset_name, rows.len());

    let mut staged = vec![stage_dataset(
        &dir,
        &paths.dataset,
        format,
        &rows,
        &error_rows,
        &metadata,
    )?];

    let report_text = processing_report(summary, documents, errors, format, &dataset_name);
    staged.push(stage(&dir, &paths.report, |file| {
        write_text(file, &report_text)
    })?);

    let metadata_json = metadata.to_json()?;
    staged.push(stage(&dir, &paths.metadata, |file| {
        write_text(file, &metadata_json)
    })?);

    if !error_rows.is_empty() {
        staged.push(stage(&dir, &paths.errors, |file| {
            tabular::write_errors(BufWriter::new(file), &error_rows)
        })?);
    }

    commit(staged)?;

    if error_rows.is_empty() {
        remove_stale(&paths.errors);
    }

    info!(
        dataset = %paths.dataset.display(),
        rows = rows.len(),
        errors = error_rows.len(),
        "Results written"
    );

    Ok(WriteReport {
        format,
        dataset: paths.dataset,
        report: paths.report,
        metadata: paths.metadata,
        error_report: (!error_rows.is_empty()).then_some(paths.errors),
        rows: rows.len(),
        error_rows: error_rows.len(),
    })
}

fn stage_dataset(
    dir: &Path,
    target: &Path,
    format: OutputFormat,
    rows: &[DatasetRow],
    errors: &[ErrorRow],
    metadata: &RunMetadata,
) -> Result<Staged> {
    match format {
        OutputFormat::Tabular => stage(dir, target, |file| {
            tabular::write_rows(BufWriter::new(file), rows)
        }),
        OutputFormat::Columnar => stage(dir, target, |file| {
            columnar::write_rows(file, rows)
        }),
        OutputFormat::EmbeddedDb => {
            // SQLite needs a path, not a handle: close the temp file and let
            // the connection open it.
            let temp = NamedTempFile::new_in(dir)
                .map_err(|e| RandwerkError::destination(target, e))?
                .into_temp_path();
            database::write_database(&temp, rows, errors, &metadata.to_pairs()?)?;
            Ok(Staged {
                temp,
                target: target.to_path_buf(),
            })
        }
    }
}

/// Encode one artifact into a fresh temporary file in `dir`.
fn stage(
    dir: &Path,
    target: &Path,
    encode: impl FnOnce(&mut File) -> Result<()>,
) -> Result<Staged> {
    let mut temp = NamedTempFile::new_in(dir).map_err(|e| RandwerkError::destination(target, e))?;
    encode(temp.as_file_mut()).map_err(|e| match e {
        RandwerkError::Io(io) => RandwerkError::destination(target, io),
        other => other,
    })?;
    temp.as_file()
        .sync_all()
        .map_err(|e| RandwerkError::destination(target, e))?;
    debug!(artifact = %target.display(), "Artifact staged");
    Ok(Staged {
        temp: temp.into_temp_path(),
        target: target.to_path_buf(),
    })
}

fn write_text(file: &mut File, text: &str) -> Result<()> {
    let mut out = BufWriter::new(file);
    out.write_all(text.as_bytes())?;
    out.flush()?;
    Ok(())
}

/// Rename every staged artifact into place. On the first failure the
/// artifacts already moved are removed and the rest are discarded.
fn commit(staged: Vec<Staged>) -> Result<()> {
    let mut placed: Vec<PathBuf> = Vec::with_capacity(staged.len());
    for Staged { temp, target } in staged {
        if let Err(e) = temp.persist(&target) {
            for path in &placed {
                if let Err(remove_err) = std::fs::remove_file(path) {
                    warn!(path = %path.display(), error = %remove_err, "Could not roll back artifact");
                }
            }
            return Err(RandwerkError::destination(&target, e.error));
        }
        placed.push(target);
    }
    Ok(())
}

/// Drop an error report left by an earlier run to the same destination.
fn remove_stale(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed stale error report"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Could not remove stale error report"),
    }
}

/// Read the rows of a dataset written by [`write`].
pub fn read_dataset(path: &Path, format: OutputFormat) -> Result<Vec<DatasetRow>> {
    match format {
        OutputFormat::Tabular => tabular::read_rows(BufReader::new(File::open(path)?)),
        OutputFormat::Columnar => columnar::read_rows(path),
        OutputFormat::EmbeddedDb => database::read_rows(path),
    }
}

/// Read an error report written by [`write`].
pub fn read_error_report(path: &Path) -> Result<Vec<ErrorRow>> {
    tabular::read_errors(BufReader::new(File::open(path)?))
}
