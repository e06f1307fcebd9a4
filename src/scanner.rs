// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Discovery of pending uploads in a queue folder and of the changes files inside an upload.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

const CHANGES_SUFFIX: &str = ".changes";
const SOURCE_CHANGES_SUFFIX: &str = "_source.changes";

pub type ScanResult<T> = std::result::Result<T, ScanError>;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Failed to read directory: {path:?}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to walk upload directory: {path:?}")]
    WalkDir {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Leaf names of the immediate subdirectories of `queue_root`, sorted.
///
/// # Errors
/// Returns an error if `queue_root` cannot be listed.
pub fn locate_pending_uploads(queue_root: &Path) -> ScanResult<Vec<String>> {
    let read_dir_failed = |e: std::io::Error| ScanError::ReadDir {
        path: queue_root.to_path_buf(),
        source: e,
    };
    let mut leaves = Vec::new();
    for entry in fs::read_dir(queue_root).map_err(read_dir_failed)? {
        let entry = entry.map_err(read_dir_failed)?;
        // Follows symlinks, so a linked upload directory counts.
        if entry.path().is_dir() {
            leaves.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    leaves.sort();
    Ok(leaves)
}

fn is_source_changes(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(SOURCE_CHANGES_SUFFIX))
}

/// Source changes files first, then plain string order of the whole path.
fn changes_file_order(a: &PathBuf, b: &PathBuf) -> Ordering {
    is_source_changes(b)
        .cmp(&is_source_changes(a))
        .then_with(|| a.as_os_str().cmp(b.as_os_str()))
}

/// Paths, relative to `upload_root`, of every `.changes` file below it.
///
/// # Errors
/// Returns an error if the upload directory cannot be walked.
pub fn locate_changes_files(upload_root: &Path) -> ScanResult<Vec<PathBuf>> {
    let mut changes_files = Vec::new();
    for entry in WalkDir::new(upload_root).follow_links(true) {
        let entry = entry.map_err(|e| ScanError::WalkDir {
            path: upload_root.to_path_buf(),
            source: e,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_changes = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(CHANGES_SUFFIX));
        if !is_changes {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(upload_root) {
            changes_files.push(relative.to_path_buf());
        }
    }
    changes_files.sort_by(changes_file_order);
    Ok(changes_files)
}
