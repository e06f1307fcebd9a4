// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Upload dispositions and the filesystem relocation they lead to.

use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Terminal classification of a changes file, and of a whole upload.
///
/// Ordered from best to worst so that aggregation picks the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Accepted,
    Rejected,
    Failed,
}

impl UploadStatus {
    pub const ALL: [UploadStatus; 3] = [
        UploadStatus::Accepted,
        UploadStatus::Rejected,
        UploadStatus::Failed,
    ];

    /// Name of the queue directory uploads with this status end up in.
    #[must_use]
    pub fn directory_name(self) -> &'static str {
        match self {
            UploadStatus::Accepted => "accepted",
            UploadStatus::Rejected => "rejected",
            UploadStatus::Failed => "failed",
        }
    }

    /// The worst of `statuses`; `Failed` when there are none.
    pub fn aggregate(statuses: impl IntoIterator<Item = UploadStatus>) -> UploadStatus {
        statuses.into_iter().max().unwrap_or(UploadStatus::Failed)
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.directory_name().to_uppercase())
    }
}

/// Locations of one pending upload inside the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPaths {
    pub fsroot: PathBuf,
    pub leaf: String,
}

impl UploadPaths {
    pub const INCOMING: &'static str = "incoming";

    #[must_use]
    pub fn new(fsroot: &Path, leaf: &str) -> Self {
        Self {
            fsroot: fsroot.to_path_buf(),
            leaf: leaf.to_string(),
        }
    }

    /// `incoming/<leaf>`.
    #[must_use]
    pub fn upload_path(&self) -> PathBuf {
        self.fsroot.join(Self::INCOMING).join(&self.leaf)
    }

    /// `incoming/<leaf>.distro`, left next to some uploads by the upload frontend.
    #[must_use]
    pub fn sidecar_path(&self) -> PathBuf {
        self.fsroot
            .join(Self::INCOMING)
            .join(format!("{}.distro", self.leaf))
    }

    #[must_use]
    pub fn destination(&self, status: UploadStatus) -> PathBuf {
        self.fsroot.join(status.directory_name()).join(&self.leaf)
    }
}

#[derive(Debug, Error)]
pub enum RelocateError {
    #[error("Failed to remove upload {path:?}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to move upload {from:?} to {to:?}")]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What happens to an upload directory once its disposition is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relocation {
    Remove,
    MoveTo(UploadStatus),
    Keep,
}

impl Relocation {
    /// Decide the relocation; `retain` is set for keep and dry-run passes.
    #[must_use]
    pub fn plan(status: UploadStatus, retain: bool) -> Self {
        match status {
            _ if retain => Relocation::Keep,
            UploadStatus::Accepted => Relocation::Remove,
            other => Relocation::MoveTo(other),
        }
    }

    /// Carry out the relocation, including the `.distro` sidecar.
    ///
    /// # Errors
    /// Returns an error if a rename or removal fails.
    pub fn apply(self, paths: &UploadPaths) -> Result<(), RelocateError> {
        let upload = paths.upload_path();
        let sidecar = paths.sidecar_path();
        match self {
            Relocation::Keep => {
                log::debug!("Keeping contents untouched: {}", upload.display());
            }
            Relocation::Remove => {
                log::debug!("Removing upload directory {}", upload.display());
                fs::remove_dir_all(&upload).map_err(|e| RelocateError::RemoveFailed {
                    path: upload.clone(),
                    source: e,
                })?;
                if sidecar.is_file() {
                    fs::remove_file(&sidecar).map_err(|e| RelocateError::RemoveFailed {
                        path: sidecar.clone(),
                        source: e,
                    })?;
                }
            }
            Relocation::MoveTo(status) => {
                let target = paths.destination(status);
                log::debug!(
                    "Moving upload directory {} to {}",
                    upload.display(),
                    status.directory_name()
                );
                rename(&upload, &target)?;
                if sidecar.is_file() {
                    let target = paths
                        .fsroot
                        .join(status.directory_name())
                        .join(format!("{}.distro", paths.leaf));
                    rename(&sidecar, &target)?;
                }
            }
        }
        Ok(())
    }
}

fn rename(from: &Path, to: &Path) -> Result<(), RelocateError> {
    fs::rename(from, to).map_err(|e| RelocateError::MoveFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source: e,
    })
}
