// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Handlers taking one pending upload directory to its final disposition.

mod build;
mod disposition;
mod user;

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use build::BuildUploadHandler;
pub use disposition::{RelocateError, Relocation, UploadPaths, UploadStatus};
pub use user::UserUploadHandler;

use crate::build::CannotGetBuild;
use crate::context::Context;
use crate::interrupt::Interrupted;
use crate::store::Store;

/// Where a handled upload ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Done(UploadStatus),
    /// Left in `incoming/` for a later pass.
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangesFileOutcome {
    pub path: PathBuf,
    pub status: UploadStatus,
}

/// Result of handling one upload directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerOutcome {
    pub disposition: Disposition,
    pub changes_files: Vec<ChangesFileOutcome>,
    pub relocation: Option<Relocation>,
    /// Reference of the error report filed while handling the upload, if any.
    pub oops_id: Option<String>,
}

impl HandlerOutcome {
    pub(crate) fn deferred() -> Self {
        Self {
            disposition: Disposition::Deferred,
            changes_files: Vec::new(),
            relocation: None,
            oops_id: None,
        }
    }

    /// Relocate the upload according to `status` and record the outcome.
    pub(crate) fn finish(
        ctx: Context<'_>,
        paths: &UploadPaths,
        status: UploadStatus,
        changes_files: Vec<ChangesFileOutcome>,
        oops_id: Option<String>,
    ) -> Result<Self, HandlerError> {
        let relocation = Relocation::plan(status, ctx.config.retains_uploads());
        relocation.apply(paths)?;
        Ok(Self {
            disposition: Disposition::Done(status),
            changes_files,
            relocation: Some(relocation),
            oops_id,
        })
    }
}

/// Errors that end the handling of an upload without a disposition.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
    #[error(transparent)]
    Relocate(#[from] RelocateError),
}

/// Handler for one pending upload, user or build driven.
pub enum UploadHandler<'a> {
    User(UserUploadHandler<'a>),
    Build(BuildUploadHandler<'a>),
}

impl<'a> UploadHandler<'a> {
    /// Pick the handler variant for `incoming/<leaf>` under `fsroot`.
    ///
    /// # Errors
    /// Returns `CannotGetBuild` for build uploads whose build cannot be resolved.
    pub fn for_processor(
        ctx: Context<'a>,
        fsroot: &Path,
        leaf: &str,
    ) -> Result<Self, CannotGetBuild> {
        let paths = UploadPaths::new(fsroot, leaf);
        if ctx.config.builds {
            BuildUploadHandler::new(ctx, paths).map(UploadHandler::Build)
        } else {
            Ok(UploadHandler::User(UserUploadHandler::new(ctx, paths)))
        }
    }

    #[must_use]
    pub fn paths(&self) -> &UploadPaths {
        match self {
            UploadHandler::User(handler) => handler.paths(),
            UploadHandler::Build(handler) => handler.paths(),
        }
    }

    /// # Errors
    /// Returns an error on interruption or when the upload cannot be relocated.
    pub fn process(&mut self, store: &mut dyn Store) -> Result<HandlerOutcome, HandlerError> {
        match self {
            UploadHandler::User(handler) => handler.process(store),
            UploadHandler::Build(handler) => handler.process(store),
        }
    }
}
