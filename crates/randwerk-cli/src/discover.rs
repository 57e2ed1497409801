// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Input enumeration: turns a folder into the sorted document population.

use std::path::{Path, PathBuf};

use randwerk_core::error::{RandwerkError, Result};
use randwerk_core::types::{Document, DocumentKind};
use tracing::{debug, warn};

/// Which document kinds to pick up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFilter {
    pub pdf: bool,
    pub images: bool,
}

impl FileFilter {
    /// Match on the file extension, ignoring case.
    pub fn accepts(&self, path: &Path) -> bool {
        match DocumentKind::from_path(path) {
            Some(DocumentKind::Pdf) => self.pdf,
            Some(_) => self.images,
            None => false,
        }
    }
}

/// List every accepted file under `folder`, sorted by path.
///
/// Unreadable subdirectories are skipped with a warning; an unreadable or
/// missing `folder` is a configuration error.
pub fn enumerate(folder: &Path, recursive: bool, filter: FileFilter) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Err(RandwerkError::Config(format!(
            "input folder {} does not exist or is not a directory",
            folder.display()
        )));
    }
    if !filter.pdf && !filter.images {
        return Err(RandwerkError::Config(
            "both PDF and image files are excluded, nothing to analyze".into(),
        ));
    }

    let mut found = Vec::new();
    let mut pending = vec![folder.to_path_buf()];
    let mut is_root = true;

    while let Some(dir) = pending.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if is_root => {
                return Err(RandwerkError::Config(format!(
                    "cannot read input folder {}: {e}",
                    dir.display()
                )));
            }
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
                continue;
            }
        };
        is_root = false;

        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                if recursive {
                    pending.push(path);
                }
            } else if filter.accepts(&path) {
                found.push(path);
            }
        }
    }

    found.sort();
    debug!(count = found.len(), "Input files enumerated");
    Ok(found)
}

/// Describe each file, dropping those whose metadata cannot be read.
pub fn documents(paths: &[PathBuf]) -> Vec<Document> {
    paths
        .iter()
        .filter_map(|path| match Document::discover(path) {
            Ok(document) => Some(document),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                None
            }
        })
        .collect()
}
