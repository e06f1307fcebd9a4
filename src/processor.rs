// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! One pass over the upload queue.

use std::fs;
use std::path::PathBuf;
use thiserror::Error;

use crate::context::Context;
use crate::handler::{HandlerError, RelocateError, UploadHandler, UploadPaths, UploadStatus};
use crate::interrupt::Interrupted;
use crate::report::RunReport;
use crate::scanner::{locate_pending_uploads, ScanError};
use crate::store::Store;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Failed to create queue directory {path:?}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("Failed to relocate upload {leaf}")]
    Relocate {
        leaf: String,
        #[source]
        source: RelocateError,
    },
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

/// Drives every pending upload of a queue through its handler.
pub struct UploadProcessor<'a, 's> {
    ctx: Context<'a>,
    store: &'s mut dyn Store,
}

impl<'a, 's> UploadProcessor<'a, 's> {
    #[must_use]
    pub fn new(ctx: Context<'a>, store: &'s mut dyn Store) -> Self {
        Self { ctx, store }
    }

    /// Process the pending uploads of the queue, or only `leaf` when given.
    ///
    /// The store is aborted once the pass is over, whether it succeeded or not.
    ///
    /// # Errors
    /// Returns an error if the queue cannot be prepared or listed, if an upload
    /// cannot be relocated, or on interruption.
    pub fn process_upload_queue(&mut self, leaf: Option<&str>) -> Result<RunReport, QueueError> {
        let result = self.process_queue(leaf);
        self.store.abort();
        result
    }

    fn process_queue(&mut self, leaf: Option<&str>) -> Result<RunReport, QueueError> {
        let fsroot = &self.ctx.config.base_fsroot;
        let directories = std::iter::once(UploadPaths::INCOMING)
            .chain(UploadStatus::ALL.iter().map(|status| status.directory_name()));
        for name in directories {
            let path = fsroot.join(name);
            fs::create_dir_all(&path).map_err(|e| QueueError::CreateDir { path, source: e })?;
        }

        let incoming = fsroot.join(UploadPaths::INCOMING);
        let mut leaves = locate_pending_uploads(&incoming)?;
        if let Some(leaf) = leaf {
            if leaves.iter().any(|pending| pending == leaf) {
                leaves = vec![leaf.to_string()];
            } else {
                log::warn!("Upload {leaf} is not pending in {}", incoming.display());
                leaves.clear();
            }
        }
        log::info!(
            "Found {} pending upload(s) in {}",
            leaves.len(),
            incoming.display()
        );

        let mut report = RunReport::new(fsroot);
        for leaf in leaves {
            let mut handler = match UploadHandler::for_processor(self.ctx, fsroot, &leaf) {
                Ok(handler) => handler,
                Err(e) => {
                    log::warn!("{e}");
                    report.record_skipped(&leaf, e.to_string());
                    continue;
                }
            };
            log::debug!("Processing upload {leaf}");
            let outcome = handler.process(&mut *self.store).map_err(|e| match e {
                HandlerError::Interrupted(interrupted) => QueueError::Interrupted(interrupted),
                HandlerError::Relocate(source) => QueueError::Relocate {
                    leaf: leaf.clone(),
                    source,
                },
            })?;
            report.record_outcome(&leaf, outcome);
        }

        let skipped = report.totals().skipped;
        if skipped > 0 {
            log::warn!("Skipped {skipped} upload(s) whose build could not be resolved.");
        }
        Ok(report)
    }
}
