// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Interface of the parse/verify/accept service a changes file is driven through.

use std::path::{Path, PathBuf};
use thiserror::Error;

use super::policy::{PolicyError, UploadPolicy};
use crate::build::BuildRecord;
use crate::interrupt::Interrupted;
use crate::store::TransactionScope;

/// An upload could not be read at all.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Failed to read {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed changes file {path:?}: {reason}")]
    Malformed { path: PathBuf, reason: String },
    #[error("Build did not produce any files: {path:?}")]
    NoArtifacts { path: PathBuf },
    #[error("Failed to walk upload directory: {path:?}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Why `NascentUpload::process` stopped early.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Policy(#[from] PolicyError),
    /// A critical error was already recorded as a rejection.
    #[error("Further error processing not possible because of a critical previous error.")]
    EarlyReturn,
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// A changes file being verified for acceptance.
pub trait NascentUpload {
    fn changes_filename(&self) -> &str;

    /// Run every check, recording rejections.
    ///
    /// # Errors
    /// See `ProcessError`; only `Interrupted` must not be turned into a rejection.
    fn process(&mut self) -> Result<(), ProcessError>;

    fn reject(&mut self, reason: String);

    fn is_rejected(&self) -> bool;

    fn rejections(&self) -> &[String];

    /// Whether the upload was signed by a known key.
    fn has_signing_key(&self) -> bool;

    /// Whether enough of the changes file was parsed to address a notification.
    fn has_parsed_content(&self) -> bool;

    fn do_reject(&mut self, notify: bool);

    /// Stage the acceptance of the upload.
    ///
    /// Returns `false`, after recording a rejection, if acceptance failed.
    fn do_accept(
        &mut self,
        notify: bool,
        build: Option<&mut BuildRecord>,
        txn: &mut TransactionScope<'_>,
    ) -> bool;
}

/// Builds a `NascentUpload` from a changes file on disk.
pub trait UploadFactory {
    /// # Errors
    /// Returns an error if the changes file cannot be read or parsed.
    fn from_changes_file<'f>(
        &'f self,
        changes_path: &Path,
        policy: UploadPolicy,
    ) -> Result<Box<dyn NascentUpload + 'f>, UploadError>;
}
