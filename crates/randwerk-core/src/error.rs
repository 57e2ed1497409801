// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Randwerk.

use thiserror::Error;

use crate::types::ErrorCategory;

/// Top-level error type for all Randwerk operations.
#[derive(Debug, Error)]
pub enum RandwerkError {
    // -- Configuration --
    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Document errors --
    #[error("unsupported document type: {0}")]
    UnsupportedDocument(String),

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("document is encrypted: {0}")]
    Encrypted(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("page {index} out of range (document has {count} pages)")]
    PageOutOfRange { index: u32, count: u32 },

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("columnar encoding error: {0}")]
    Columnar(String),

    #[error("tabular encoding error: {0}")]
    Tabular(String),

    #[error("cannot write output to {path}: {reason}")]
    Destination { path: String, reason: String },

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Faults --
    #[error("internal fault: {0}")]
    Internal(String),
}

impl RandwerkError {
    /// Shorthand for a destination failure on `path`.
    pub fn destination(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        Self::Destination {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Where this error sits in the run's error taxonomy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Configuration,

            Self::UnsupportedDocument(_)
            | Self::PdfError(_)
            | Self::Encrypted(_)
            | Self::ImageError(_)
            | Self::PageOutOfRange { .. } => ErrorCategory::Permanent,

            Self::Database(_) | Self::Columnar(_) | Self::Tabular(_) | Self::Destination { .. } => {
                ErrorCategory::Destination
            }

            Self::Io(io_err) => classify_io(io_err),

            Self::Serialization(_) | Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Whether the error ends the whole run rather than a single item.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Configuration | ErrorCategory::Destination
        )
    }
}

/// Classify an I/O error raised while reading a source document.
///
/// Lock and contention conditions are transient; everything else (missing
/// file, no permission, truncated data) will fail the same way again.
pub fn classify_io(err: &std::io::Error) -> ErrorCategory {
    use std::io::ErrorKind;

    match err.kind() {
        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut => {
            return ErrorCategory::Transient;
        }
        _ => {}
    }

    match err.raw_os_error() {
        // Windows ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION.
        #[cfg(windows)]
        Some(32) | Some(33) => ErrorCategory::Transient,
        // POSIX EAGAIN / EBUSY / ETXTBSY.
        #[cfg(unix)]
        Some(11) | Some(16) | Some(26) => ErrorCategory::Transient,
        _ => ErrorCategory::Permanent,
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RandwerkError>;
