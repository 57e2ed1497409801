// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Randwerk margin inspector.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SamplingPolicy;
use crate::error::{RandwerkError, Result};

/// Unique identifier for one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Documents and pages
// ---------------------------------------------------------------------------

/// Supported input document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    Pdf,
    Jpeg,
    Png,
    Bmp,
    Tiff,
}

impl DocumentKind {
    /// Infer document type from file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "bmp" => Some(Self::Bmp),
            "tif" | "tiff" => Some(Self::Tiff),
            _ => None,
        }
    }

    /// Infer document type from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn is_image(&self) -> bool {
        !matches!(self, Self::Pdf)
    }

    /// Short label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Bmp => "BMP",
            Self::Tiff => "TIFF",
        }
    }
}

/// A source file selected for inspection. Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub path: PathBuf,
    pub kind: DocumentKind,
    pub size_bytes: u64,
    /// Known page count. Raster images always have one page; PDFs are only
    /// counted once a worker opens them.
    pub page_count: Option<u32>,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>, kind: DocumentKind, size_bytes: u64) -> Self {
        let page_count = if kind.is_image() { Some(1) } else { None };
        Self {
            path: path.into(),
            kind,
            size_bytes,
            page_count,
        }
    }

    /// Describe a file on disk: infer its kind from the extension and read
    /// its size.
    pub fn discover(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let kind = DocumentKind::from_path(path).ok_or_else(|| {
            RandwerkError::UnsupportedDocument(path.display().to_string())
        })?;
        let size_bytes = std::fs::metadata(path)?.len();
        Ok(Self::new(path, kind, size_bytes))
    }
}

/// One page of a document, in the rasterizer's unit (pixels for images,
/// PDF points for PDF pages).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub document_path: PathBuf,
    /// Zero-based page index.
    pub index: u32,
    pub width: f64,
    pub height: f64,
}

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

/// Header/footer verdict for a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginStatus {
    Clean,
    Header,
    Footer,
    HeaderAndFooter,
}

impl MarginStatus {
    pub fn from_flags(header: bool, footer: bool) -> Self {
        match (header, footer) {
            (false, false) => Self::Clean,
            (true, false) => Self::Header,
            (false, true) => Self::Footer,
            (true, true) => Self::HeaderAndFooter,
        }
    }

    pub fn is_flagged(&self) -> bool {
        !matches!(self, Self::Clean)
    }

    /// Plain-language description used in the processing report.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Clean => "All content within margins",
            Self::Header => "Content found in header",
            Self::Footer => "Content found in footer",
            Self::HeaderAndFooter => "Content found in header and footer",
        }
    }
}

/// Result of analyzing one page. Produced once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageFinding {
    pub page: Page,
    pub header_flagged: bool,
    pub footer_flagged: bool,
    /// Fraction of the top band covered by content, in `[0, 1]`.
    pub header_density: f64,
    /// Fraction of the bottom band covered by content, in `[0, 1]`.
    pub footer_density: f64,
    /// Content fraction over both bands combined.
    pub total_density: f64,
    pub threshold_used: f64,
}

impl PageFinding {
    pub fn status(&self) -> MarginStatus {
        MarginStatus::from_flags(self.header_flagged, self.footer_flagged)
    }

    pub fn is_flagged(&self) -> bool {
        self.header_flagged || self.footer_flagged
    }
}

// ---------------------------------------------------------------------------
// Per-document results
// ---------------------------------------------------------------------------

/// Final state of a document's work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentStatus {
    /// Every planned page has a finding or an error record.
    Completed,
    /// The unit stopped early (cancellation) with pages left unanalyzed.
    Partial,
    /// Nothing could be analyzed.
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

/// All findings for one document plus its final status and timing.
///
/// Built by exactly one worker and handed to the aggregator once, sealed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentResult {
    pub document: Document,
    pub status: DocumentStatus,
    /// Page count discovered when the document was opened.
    pub planned_pages: Option<u32>,
    pub findings: Vec<PageFinding>,
    /// Pages finalized with an error record instead of a finding.
    pub failed_pages: Vec<u32>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl DocumentResult {
    pub fn pages_flagged(&self) -> usize {
        self.findings.iter().filter(|f| f.is_flagged()).count()
    }

    /// Number of planned pages that have neither a finding nor an error.
    pub fn pages_outstanding(&self) -> u32 {
        let finalized = (self.findings.len() + self.failed_pages.len()) as u32;
        self.planned_pages
            .map(|planned| planned.saturating_sub(finalized))
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Errors recorded during a run
// ---------------------------------------------------------------------------

/// Classification of errors for retry logic and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Invalid settings: fail before any work starts.
    Configuration,
    /// File locked, temporary read failure: retried once.
    Transient,
    /// Corrupt, unsupported, or encrypted input: never retried.
    Permanent,
    /// Output cannot be written: fatal for the run.
    Destination,
    /// Unexpected fault inside a work unit.
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Transient => "transient",
            Self::Permanent => "permanent",
            Self::Destination => "destination",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorCategory {
    type Err = RandwerkError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "configuration" => Ok(Self::Configuration),
            "transient" => Ok(Self::Transient),
            "permanent" => Ok(Self::Permanent),
            "destination" => Ok(Self::Destination),
            "internal" => Ok(Self::Internal),
            other => Err(RandwerkError::Internal(format!(
                "unknown error category {other:?}"
            ))),
        }
    }
}

/// A document- or page-level failure. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub document_path: PathBuf,
    /// `None` when the whole document failed before any page was reached.
    pub page_index: Option<u32>,
    pub category: ErrorCategory,
    pub message: String,
    pub retried: bool,
}

impl ErrorRecord {
    pub fn from_error(
        document_path: impl Into<PathBuf>,
        page_index: Option<u32>,
        err: &RandwerkError,
        retried: bool,
    ) -> Self {
        Self {
            document_path: document_path.into(),
            page_index,
            category: err.category(),
            message: err.to_string(),
            retried,
        }
    }
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

/// The documents selected for analysis. Computed once, then read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingPlan {
    pub policy: SamplingPolicy,
    /// Selected documents, in population order.
    pub documents: Vec<Document>,
    pub population_size: usize,
    /// Sample size before clamping to the population (statistical formula
    /// result or requested N).
    pub requested_size: usize,
    /// Seed actually used for the draw, when the policy draws at random.
    pub seed: Option<u64>,
    /// Estimated margin of error the selected sample achieves, in percent.
    pub achieved_margin_of_error: Option<f64>,
}

impl SamplingPlan {
    pub fn sample_size(&self) -> usize {
        self.documents.len()
    }

    pub fn summary(&self) -> SamplingSummary {
        SamplingSummary {
            method: self.policy.method_name().to_string(),
            confidence: self.policy.confidence(),
            margin_of_error: self.policy.margin_of_error(),
            requested_size: self.requested_size,
            seed: self.seed,
            population_size: self.population_size,
            sample_size: self.sample_size(),
            achieved_margin_of_error: self.achieved_margin_of_error,
        }
    }
}

/// Sampling metadata without the selected documents, for reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingSummary {
    pub method: String,
    pub confidence: Option<f64>,
    pub margin_of_error: Option<f64>,
    pub requested_size: usize,
    pub seed: Option<u64>,
    pub population_size: usize,
    pub sample_size: usize,
    pub achieved_margin_of_error: Option<f64>,
}

impl SamplingSummary {
    /// Fraction of the population that was selected, in `[0, 1]`.
    pub fn selected_fraction(&self) -> f64 {
        if self.population_size == 0 {
            return 0.0;
        }
        self.sample_size as f64 / self.population_size as f64
    }
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

/// Totals for a finished (or cancelled) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub worker_count: usize,
    pub threshold_percent: f64,
    pub documents_total: usize,
    pub documents_done: usize,
    pub documents_completed: usize,
    pub documents_partial: usize,
    pub documents_failed: usize,
    pub pages_analyzed: usize,
    pub pages_flagged: usize,
    pub header_flagged: usize,
    pub footer_flagged: usize,
    pub errors: usize,
    pub errors_by_category: BTreeMap<ErrorCategory, usize>,
    pub cancelled: bool,
    pub sampling: SamplingSummary,
}

impl RunSummary {
    /// Fraction of the whole corpus whose documents were actually examined.
    pub fn examined_fraction(&self) -> f64 {
        if self.sampling.population_size == 0 {
            return 0.0;
        }
        self.documents_done as f64 / self.sampling.population_size as f64
    }
}
