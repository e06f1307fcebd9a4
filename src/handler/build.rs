// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

use thiserror::Error;

use super::{ChangesFileOutcome, HandlerError, HandlerOutcome, UploadPaths, UploadStatus};
use crate::build::{BuildRecord, BuildStatus, BuildUploadContext, CannotGetBuild};
use crate::changes::{ChangesFileError, ChangesFileProcessor, UploadError};
use crate::context::Context;
use crate::interrupt::Interrupted;
use crate::notify::{self, Notification};
use crate::scanner::{locate_changes_files, ScanError};
use crate::store::{Store, StoreError, TransactionScope};
use crate::upload_log::UploadLog;

/// Why dispatching a build upload failed; everything but `Interrupted` fails the upload.
#[derive(Debug, Error)]
enum DispatchError {
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("Expected exactly one changes file in a build upload, found {count}")]
    ChangesFileCount { count: usize },
    #[error(transparent)]
    ChangesFile(ChangesFileError),
    #[error(transparent)]
    Artifacts(#[from] UploadError),
    #[error("Failed to commit build artifacts")]
    Commit(#[from] StoreError),
}

impl From<ChangesFileError> for DispatchError {
    fn from(error: ChangesFileError) -> Self {
        match error {
            ChangesFileError::Interrupted(interrupted) => DispatchError::Interrupted(interrupted),
            other => DispatchError::ChangesFile(other),
        }
    }
}

/// Handles an upload made by the build farm on behalf of one build.
pub struct BuildUploadHandler<'a> {
    ctx: Context<'a>,
    paths: UploadPaths,
    /// `None` when the build has been deleted since it uploaded.
    build: Option<BuildRecord>,
    log: UploadLog,
}

impl<'a> BuildUploadHandler<'a> {
    /// Resolve the build named by the leaf, `<anything>-<job_type>-<job_id>`.
    ///
    /// # Errors
    /// Returns `CannotGetBuild` if the leaf name does not name a known build.
    pub fn new(ctx: Context<'a>, paths: UploadPaths) -> Result<Self, CannotGetBuild> {
        let reference = BuildUploadContext::from_leaf_name(&paths.leaf)?;
        let build = ctx
            .builds
            .build_by_job(&reference.job_type, reference.job_id)?;
        Ok(Self {
            ctx,
            paths,
            build,
            log: UploadLog::new(),
        })
    }

    #[must_use]
    pub fn paths(&self) -> &UploadPaths {
        &self.paths
    }

    /// The build as left by the last `process` call.
    #[must_use]
    pub fn build(&self) -> Option<&BuildRecord> {
        self.build.as_ref()
    }

    /// # Errors
    /// Returns an error on interruption or when the upload cannot be relocated.
    pub fn process(&mut self, store: &mut dyn Store) -> Result<HandlerOutcome, HandlerError> {
        let leaf = self.paths.leaf.clone();
        let Some(mut build) = self.build.clone() else {
            self.log
                .warn(format_args!("Build for upload {leaf} was deleted, moving to failed."));
            return HandlerOutcome::finish(
                self.ctx,
                &self.paths,
                UploadStatus::Failed,
                Vec::new(),
                None,
            );
        };
        match build.status {
            BuildStatus::Uploading => {}
            BuildStatus::Building => {
                self.log.info(format_args!(
                    "Build {} is still building, leaving {leaf} for a later pass.",
                    build.id
                ));
                return Ok(HandlerOutcome::deferred());
            }
            other => {
                self.log.warn(format_args!(
                    "Expected build status to be UPLOADING or BUILDING, was {other}. Moving to failed."
                ));
                return HandlerOutcome::finish(
                    self.ctx,
                    &self.paths,
                    UploadStatus::Failed,
                    Vec::new(),
                    None,
                );
            }
        }

        let mut results = Vec::new();
        let dispatched = if build.has_deleted_recipe() {
            self.log.info(format_args!(
                "Recipe of build {} has been deleted, failing the upload.",
                build.id
            ));
            Ok(UploadStatus::Failed)
        } else if build.kind.uploads_artifacts() {
            self.upload_artifacts(&mut build, store)
        } else {
            self.process_changes_file(&mut build, store, &mut results)
        };
        let mut oops_id = None;
        let status = match dispatched {
            Ok(status) => status,
            Err(DispatchError::Interrupted(interrupted)) => return Err(interrupted.into()),
            Err(e) => {
                let title = build.title();
                let id = self
                    .ctx
                    .oops
                    .raising(&e, &[("upload", leaf.as_str()), ("build", title.as_str())]);
                self.log
                    .error(format_args!("Exception while processing upload {leaf} ({id}): {e}"));
                oops_id = Some(id);
                UploadStatus::Failed
            }
        };

        let cleanup = self.cleanup(&mut build, status, oops_id.as_deref(), store);
        let build_id = build.id;
        self.build = Some(build);
        if let Err(e) = cleanup {
            let id = self.ctx.oops.raising(&e, &[("upload", leaf.as_str())]);
            self.log.error(format_args!(
                "Failed to commit the outcome of build {build_id} ({id}), leaving {leaf} in place: {e}"
            ));
            return Ok(HandlerOutcome {
                changes_files: results,
                oops_id: Some(id),
                ..HandlerOutcome::deferred()
            });
        }
        HandlerOutcome::finish(self.ctx, &self.paths, status, results, oops_id)
    }

    fn upload_artifacts(
        &self,
        build: &mut BuildRecord,
        store: &mut dyn Store,
    ) -> Result<UploadStatus, DispatchError> {
        let mut txn = TransactionScope::begin(store);
        self.ctx
            .artifacts
            .process(build, &self.paths.upload_path(), &mut txn)?;
        if self.ctx.config.dry_run {
            txn.abort();
        } else {
            txn.commit()?;
        }
        Ok(UploadStatus::Accepted)
    }

    fn process_changes_file(
        &self,
        build: &mut BuildRecord,
        store: &mut dyn Store,
        results: &mut Vec<ChangesFileOutcome>,
    ) -> Result<UploadStatus, DispatchError> {
        let upload_path = self.paths.upload_path();
        let changes_files = locate_changes_files(&upload_path)?;
        let [changes_file] = changes_files.as_slice() else {
            return Err(DispatchError::ChangesFileCount {
                count: changes_files.len(),
            });
        };
        let processor = ChangesFileProcessor::new(self.ctx, &upload_path, &self.log);
        let status = processor.process(changes_file, Some(build), store)?;
        results.push(ChangesFileOutcome {
            path: changes_file.clone(),
            status,
        });
        Ok(status)
    }

    /// Settle the build record and notify its owner, whatever happened to the upload.
    fn cleanup(
        &self,
        build: &mut BuildRecord,
        status: UploadStatus,
        oops_id: Option<&str>,
        store: &mut dyn Store,
    ) -> Result<(), StoreError> {
        let mut txn = TransactionScope::begin(store);
        if status != UploadStatus::Accepted || !build.verify_successful_upload() {
            self.log.warn(format_args!(
                "Upload of build {} failed ({status}), marking it as failed to upload.",
                build.id
            ));
            build.update_status(BuildStatus::FailedToUpload, &mut txn);
        }

        let notify = self.ctx.config.notify();
        if build.status == BuildStatus::FullyBuilt {
            if notify {
                txn.notify_on_commit(Notification::BuildSucceeded {
                    build_id: build.id,
                    title: build.title(),
                });
            }
        } else {
            build.store_upload_log(self.log.contents(), &mut txn);
            if build.has_deleted_recipe() {
                self.log.info(format_args!(
                    "Not sending a failure notice for build {}: its recipe was deleted.",
                    build.id
                ));
            } else if notify {
                txn.notify_on_commit(Notification::BuildFailed {
                    build_id: build.id,
                    title: build.title(),
                    extra_info: oops_id.map(|id| format!("Error report: {id}")),
                });
            }
        }

        if self.ctx.config.dry_run {
            self.log.info("Dry run, aborting the build transaction.");
            txn.abort();
        } else {
            let notifications = txn.commit()?;
            notify::deliver(self.ctx.notifier, notifications);
        }
        Ok(())
    }
}
