// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Uploaders for builds that produce image artifacts instead of a changes file.

use std::path::Path;
use walkdir::WalkDir;

use super::{BuildRecord, BuildStatus};
use crate::changes::UploadError;
use crate::store::TransactionScope;

/// Processes the files a live filesystem or snap build uploaded.
pub trait ArtifactUploader {
    /// Attach the artifacts under `upload_path` to `build`.
    ///
    /// # Errors
    /// Returns an error if the upload directory cannot be read or holds no artifacts.
    fn process(
        &self,
        build: &mut BuildRecord,
        upload_path: &Path,
        txn: &mut TransactionScope<'_>,
    ) -> Result<(), UploadError>;
}

/// Records every regular file of the upload directory as a build artifact.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryArtifactUploader;

impl ArtifactUploader for DirectoryArtifactUploader {
    fn process(
        &self,
        build: &mut BuildRecord,
        upload_path: &Path,
        txn: &mut TransactionScope<'_>,
    ) -> Result<(), UploadError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(upload_path).sort_by_file_name() {
            let entry = entry.map_err(|e| UploadError::Walk {
                path: upload_path.to_path_buf(),
                source: e,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(upload_path) {
                files.push(relative.to_string_lossy().into_owned());
            }
        }
        if files.is_empty() {
            return Err(UploadError::NoArtifacts {
                path: upload_path.to_path_buf(),
            });
        }

        log::info!(
            "Processing {} upload for build {}: {} file(s)",
            build.kind,
            build.id,
            files.len()
        );
        build.record_uploaded_files(files, txn);
        build.update_status(BuildStatus::FullyBuilt, txn);
        Ok(())
    }
}
