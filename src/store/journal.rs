// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Store that appends committed changes to a JSON-lines journal.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use super::{Change, Store, StoreError};

#[derive(Debug)]
pub struct JournalStore {
    path: PathBuf,
    staged: Vec<Change>,
    accepted: HashSet<(u64, String, String)>,
}

impl JournalStore {
    /// Open (or create) the journal at `path` and index the uploads it already accepted.
    ///
    /// # Errors
    /// Returns an error if the journal cannot be read or holds a malformed entry.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let mut accepted = HashSet::new();
        if path.exists() {
            let file = File::open(path).map_err(|e| StoreError::OpenFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
            for (index, line) in BufReader::new(file).lines().enumerate() {
                let line = line.map_err(|e| StoreError::OpenFailed {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                if line.trim().is_empty() {
                    continue;
                }
                let change: Change =
                    serde_json::from_str(&line).map_err(|e| StoreError::CorruptJournal {
                        path: path.to_path_buf(),
                        line: index + 1,
                        source: e,
                    })?;
                if let Some(key) = accepted_key(&change) {
                    accepted.insert(key);
                }
            }
        } else if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::OpenFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        log::debug!(
            "Opened journal {}: {} accepted upload(s)",
            path.display(),
            accepted.len()
        );
        Ok(Self {
            path: path.to_path_buf(),
            staged: Vec::new(),
            accepted,
        })
    }
}

fn accepted_key(change: &Change) -> Option<(u64, String, String)> {
    match change {
        Change::UploadAccepted {
            archive_id,
            source,
            version,
            ..
        } => Some((*archive_id, source.clone(), version.clone())),
        _ => None,
    }
}

/// Run `write` against the end of `file`, cutting the file back to its old length when it
/// fails so no partial line is left behind.
fn append_with(
    file: &mut File,
    write: impl FnOnce(&mut File) -> std::io::Result<()>,
) -> std::io::Result<()> {
    let len = file.metadata()?.len();
    let Err(e) = write(file) else {
        return Ok(());
    };
    if let Err(truncate) = file.set_len(len) {
        log::error!("Failed to truncate the journal back to {len} bytes: {truncate}");
    }
    Err(e)
}

impl Store for JournalStore {
    fn stage(&mut self, change: Change) {
        self.staged.push(change);
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        if self.staged.is_empty() {
            return Ok(());
        }
        let mut buffer = String::new();
        for change in &self.staged {
            let line = serde_json::to_string(change)
                .map_err(|e| StoreError::SerializeFailed { source: e })?;
            buffer.push_str(&line);
            buffer.push('\n');
        }
        let write_failed = |e: std::io::Error| StoreError::WriteFailed {
            path: self.path.clone(),
            source: e,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(write_failed)?;
        append_with(&mut file, |file| {
            file.write_all(buffer.as_bytes())?;
            file.sync_data()
        })
        .map_err(write_failed)?;

        for change in self.staged.drain(..) {
            if let Some(key) = accepted_key(&change) {
                self.accepted.insert(key);
            }
        }
        Ok(())
    }

    fn abort(&mut self) {
        self.staged.clear();
    }

    fn pending(&self) -> usize {
        self.staged.len()
    }

    fn has_accepted(&self, archive_id: u64, source: &str, version: &str) -> bool {
        self.accepted
            .contains(&(archive_id, source.to_string(), version.to_string()))
    }
}
