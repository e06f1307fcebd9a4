// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Report of one processing pass over the upload queue.

mod console;
mod totals;

pub use console::summarize_run;
pub use totals::RunTotals;

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use crate::handler::{Disposition, HandlerOutcome, UploadStatus};

/// What happened to one pending upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum UploadReport {
    Handled(HandlerOutcome),
    /// No handler could be built; the upload was left untouched.
    Skipped { reason: String },
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    queue: String,
    totals: RunTotals,
    // Use BTreeMap to ensure alphabetical order of uploads when serializing to JSON.
    uploads: BTreeMap<String, UploadReport>,
}

impl RunReport {
    #[must_use]
    pub fn new(queue: &Path) -> Self {
        Self {
            queue: queue
                .canonicalize()
                .unwrap_or_else(|_| queue.to_path_buf())
                .to_string_lossy()
                .to_string(),
            totals: RunTotals::default(),
            uploads: BTreeMap::new(),
        }
    }

    pub fn record_outcome(&mut self, leaf: &str, outcome: HandlerOutcome) {
        match outcome.disposition {
            Disposition::Done(UploadStatus::Accepted) => self.totals.accepted += 1,
            Disposition::Done(UploadStatus::Rejected) => self.totals.rejected += 1,
            Disposition::Done(UploadStatus::Failed) => self.totals.failed += 1,
            Disposition::Deferred => self.totals.deferred += 1,
        }
        self.uploads
            .insert(leaf.to_string(), UploadReport::Handled(outcome));
    }

    pub fn record_skipped(&mut self, leaf: &str, reason: String) {
        self.totals.skipped += 1;
        self.uploads
            .insert(leaf.to_string(), UploadReport::Skipped { reason });
    }

    #[must_use]
    pub fn queue(&self) -> &str {
        &self.queue
    }

    #[must_use]
    pub fn totals(&self) -> &RunTotals {
        &self.totals
    }

    #[must_use]
    pub fn uploads(&self) -> &BTreeMap<String, UploadReport> {
        &self.uploads
    }

    /// Write the report as pretty-printed JSON to `dest`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or the report cannot be serialized.
    pub fn write_to_file(&self, dest: &Path) -> Result<()> {
        log::info!("Writing report to file: file={}", dest.display());
        let file = File::create(dest)
            .with_context(|| format!("Failed to create JSON output file: {}", dest.display()))?;
        serde_json::to_writer_pretty(file, self)
            .with_context(|| format!("Failed to serialize report to JSON: {}", dest.display()))?;
        Ok(())
    }
}
