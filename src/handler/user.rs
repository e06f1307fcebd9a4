// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

use super::{ChangesFileOutcome, HandlerError, HandlerOutcome, UploadPaths, UploadStatus};
use crate::changes::{ChangesFileError, ChangesFileProcessor};
use crate::context::Context;
use crate::scanner::locate_changes_files;
use crate::store::Store;
use crate::upload_log::UploadLog;

/// Handles an upload made by a person through the upload frontend.
pub struct UserUploadHandler<'a> {
    ctx: Context<'a>,
    paths: UploadPaths,
}

impl<'a> UserUploadHandler<'a> {
    #[must_use]
    pub fn new(ctx: Context<'a>, paths: UploadPaths) -> Self {
        Self { ctx, paths }
    }

    #[must_use]
    pub fn paths(&self) -> &UploadPaths {
        &self.paths
    }

    /// Process every changes file of the upload, then relocate it by the worst result.
    ///
    /// A changes file whose processing fails outright counts as `Failed`; the other
    /// changes files are still processed.
    ///
    /// # Errors
    /// Returns an error on interruption or when the upload cannot be relocated.
    pub fn process(&self, store: &mut dyn Store) -> Result<HandlerOutcome, HandlerError> {
        let upload_path = self.paths.upload_path();
        let leaf = self.paths.leaf.as_str();
        let changes_files = match locate_changes_files(&upload_path) {
            Ok(files) => files,
            Err(e) => {
                let oops_id = self.ctx.oops.raising(&e, &[("upload", leaf)]);
                log::error!("Failed to scan upload {leaf} ({oops_id}): {e}");
                return HandlerOutcome::finish(
                    self.ctx,
                    &self.paths,
                    UploadStatus::Failed,
                    Vec::new(),
                    Some(oops_id),
                );
            }
        };
        if changes_files.is_empty() {
            log::warn!("No changes files found in upload {leaf}");
        }

        let log = UploadLog::new();
        let processor = ChangesFileProcessor::new(self.ctx, &upload_path, &log);
        let mut results = Vec::with_capacity(changes_files.len());
        let mut oops_id = None;
        for changes_file in changes_files {
            let status = match processor.process(&changes_file, None, store) {
                Ok(status) => status,
                Err(ChangesFileError::Interrupted(interrupted)) => return Err(interrupted.into()),
                Err(e) => {
                    let name = changes_file.to_string_lossy();
                    let id = self
                        .ctx
                        .oops
                        .raising(&e, &[("upload", leaf), ("changes_file", name.as_ref())]);
                    log::error!("Exception while processing {name} in {leaf} ({id}): {e}");
                    oops_id = Some(id);
                    UploadStatus::Failed
                }
            };
            results.push(ChangesFileOutcome {
                path: changes_file,
                status,
            });
        }

        let status = UploadStatus::aggregate(results.iter().map(|result| result.status));
        log::info!("Upload {leaf} processed: {status}");
        HandlerOutcome::finish(self.ctx, &self.paths, status, results, oops_id)
    }
}
