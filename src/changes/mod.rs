// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Processing of a single changes file: classify its path, build a policy, drive the
//! upload through verification and acceptance, and commit or abort the outcome.

mod nascent;
mod policy;

use std::path::{Path, PathBuf};
use thiserror::Error;

pub use nascent::{NascentUpload, ProcessError, UploadError, UploadFactory};
pub use policy::{PolicyError, PolicyKind, Target, UnknownPolicy, UploadPolicy, UploadType};

use crate::build::BuildRecord;
use crate::context::Context;
use crate::handler::UploadStatus;
use crate::interrupt::Interrupted;
use crate::location::{self, LocationError, UploadLocation, DEFAULT_DISTRIBUTION};
use crate::notify;
use crate::store::{Store, StoreError, TransactionScope};
use crate::upload_log::UploadLog;

#[derive(Debug, Error)]
pub enum ChangesFileError {
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
    #[error("Failed to commit the outcome of {changes_file:?}")]
    Commit {
        changes_file: PathBuf,
        #[source]
        source: StoreError,
    },
    #[error("No fallback target in distribution '{distribution}' for an unclassifiable upload path")]
    NoFallback { distribution: String },
}

/// Processes the changes files of one upload directory.
pub struct ChangesFileProcessor<'a> {
    ctx: Context<'a>,
    upload_path: &'a Path,
    log: &'a UploadLog,
}

impl<'a> ChangesFileProcessor<'a> {
    #[must_use]
    pub fn new(ctx: Context<'a>, upload_path: &'a Path, log: &'a UploadLog) -> Self {
        Self {
            ctx,
            upload_path,
            log,
        }
    }

    /// Context used to route a rejection when the upload path cannot be classified.
    ///
    /// Different malformed paths can end up with the same fallback target.
    fn fallback_location(&self, error: &LocationError) -> Result<UploadLocation, ChangesFileError> {
        let no_fallback = || ChangesFileError::NoFallback {
            distribution: DEFAULT_DISTRIBUTION.to_string(),
        };
        let archives = self.ctx.archives;
        let distribution = archives
            .distribution_by_name(DEFAULT_DISTRIBUTION)
            .ok_or_else(no_fallback)?;
        let archive = match error {
            LocationError::Upload(_) => archives.main_archive(&distribution),
            LocationError::Ppa(_) => archives.all_ppas(&distribution).into_iter().next(),
        }
        .ok_or_else(no_fallback)?;
        Ok(UploadLocation {
            distribution,
            suite: None,
            archive,
        })
    }

    /// Process `changes_file`, a path relative to the upload directory.
    ///
    /// Every outcome is committed or aborted before this returns.
    ///
    /// # Errors
    /// Returns an error only on interruption, when no fallback target exists for an
    /// unclassifiable path, or when committing an accepted upload fails.
    pub fn process(
        &self,
        changes_file: &Path,
        mut build: Option<&mut BuildRecord>,
        store: &mut dyn Store,
    ) -> Result<UploadStatus, ChangesFileError> {
        let config = self.ctx.config;
        let relative_path = changes_file
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let changes_path = self.upload_path.join(changes_file);

        let (location, path_error) = match location::classify(&relative_path, self.ctx.archives) {
            Ok(location) => (location, None),
            Err(e) => {
                self.log.debug(format_args!(
                    "Upload path '{relative_path}' could not be classified: {e}"
                ));
                let fallback = self.fallback_location(&e)?;
                (fallback, Some(e.rejection_text(&relative_path)))
            }
        };
        self.log.info(format_args!(
            "Processing changes file {} for {} ({})",
            changes_file.display(),
            location.distribution.name,
            location.archive.display_name()
        ));

        let suite = config.suite_override.clone().or(location.suite);
        let policy = UploadPolicy::new(
            config.policy,
            location.distribution,
            location.archive,
            suite,
            build.as_deref(),
        );
        let policy_name = policy.name();

        let mut txn = TransactionScope::begin(store);
        let mut upload = match self.ctx.uploads.from_changes_file(&changes_path, policy) {
            Ok(upload) => upload,
            Err(e) => {
                self.log.warn(format_args!(
                    "Failed to parse changes file '{}': {e}",
                    changes_path.display()
                ));
                txn.abort();
                return Ok(UploadStatus::Rejected);
            }
        };

        let first_segment = relative_path.split('/').next().unwrap_or_default();
        if !first_segment.is_empty()
            && first_segment.bytes().all(|b| b.is_ascii_digit())
            && config.policy != PolicyKind::BuildDaemon
        {
            let message =
                format!("Invalid upload path ({relative_path}) for this policy ({policy_name})");
            self.log.error(&message);
            upload.reject(message);
        }
        if let Some(text) = path_error {
            upload.reject(text);
        }

        match upload.process() {
            Ok(()) => {}
            Err(ProcessError::Interrupted(interrupted)) => return Err(interrupted.into()),
            Err(ProcessError::Policy(e)) => {
                self.log.debug(format_args!("UploadPolicyError escaped upload.process: {e}"));
                upload.reject(format!("UploadPolicyError escaped upload.process: {e}"));
            }
            Err(e @ ProcessError::EarlyReturn) => upload.reject(e.to_string()),
            Err(ProcessError::Unexpected(e)) => {
                let name = changes_file.to_string_lossy();
                let oops_id = self
                    .ctx
                    .oops
                    .raising(&*e, &[("changes_file", name.as_ref())]);
                self.log.error(format_args!(
                    "Unhandled exception processing upload ({oops_id}): {e:#}"
                ));
                upload.reject(format!("Unhandled exception processing upload: {e}"));
            }
        }

        let notify = config.notify();
        let status = if upload.is_rejected() {
            let reachable = upload.has_signing_key() || upload.has_parsed_content();
            if !reachable {
                self.log.info(
                    "Not sending rejection notice without a signing key or parsed content.",
                );
            }
            upload.do_reject(notify && reachable);
            UploadStatus::Rejected
        } else if upload.do_accept(notify, build.as_deref_mut(), &mut txn) {
            UploadStatus::Accepted
        } else {
            self.log.info("Rejection during accept. Aborting partial accept.");
            UploadStatus::Rejected
        };

        if upload.is_rejected() {
            self.log.info("Upload was rejected:");
            for reason in upload.rejections() {
                self.log.info(format_args!("\t{reason}"));
            }
        }
        drop(upload);

        if status != UploadStatus::Accepted {
            txn.abort();
        } else if config.dry_run {
            self.log.info("Dry run, aborting transaction.");
            txn.abort();
        } else {
            self.log.info("Committing the transaction.");
            let notifications = txn.commit().map_err(|e| ChangesFileError::Commit {
                changes_file: changes_file.to_path_buf(),
                source: e,
            })?;
            notify::deliver(self.ctx.notifier, notifications);
        }
        Ok(status)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::build::{BuildKind, BuildStatus, DirectoryArtifactUploader};
    use crate::config::ProcessorConfig;
    use crate::notify::{Notification, Notifier};
    use crate::store::{Change, MemoryStore};
    use crate::handler::tests::BrokenStore;
    use crate::testing::{
        changes_text, sample_registry, signed, write_payload, RecordingNotifier, RecordingReporter,
    };
    use crate::upload::ChangesUploadFactory;
    use anyhow::anyhow;
    use std::cell::RefCell;

    /// How a fake upload behaves when processed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum Outcome {
        Clean,
        PolicyError,
        EarlyReturn,
        Unexpected,
        Interrupted,
        RejectedByChecks,
        AcceptFails,
        Unparseable,
    }

    /// Factory producing fake uploads with a fixed outcome, recording what happened.
    pub(crate) struct FakeFactory<'n> {
        pub(crate) outcome: Outcome,
        pub(crate) signing_key: bool,
        pub(crate) notifier: &'n RecordingNotifier,
        pub(crate) policies: RefCell<Vec<UploadPolicy>>,
        pub(crate) rejections: RefCell<Vec<Vec<String>>>,
    }

    impl<'n> FakeFactory<'n> {
        pub(crate) fn new(outcome: Outcome, notifier: &'n RecordingNotifier) -> Self {
            Self {
                outcome,
                signing_key: true,
                notifier,
                policies: RefCell::new(Vec::new()),
                rejections: RefCell::new(Vec::new()),
            }
        }
    }

    struct FakeUpload<'f, 'n> {
        factory: &'f FakeFactory<'n>,
        filename: String,
        policy: UploadPolicy,
        rejections: Vec<String>,
    }

    impl Drop for FakeUpload<'_, '_> {
        fn drop(&mut self) {
            self.factory
                .rejections
                .borrow_mut()
                .push(self.rejections.clone());
        }
    }

    impl NascentUpload for FakeUpload<'_, '_> {
        fn changes_filename(&self) -> &str {
            &self.filename
        }

        fn process(&mut self) -> Result<(), ProcessError> {
            match self.factory.outcome {
                Outcome::PolicyError => Err(PolicyError::UnknownSuite {
                    distribution: "ubuntu".to_string(),
                    suite: "nonexistent".to_string(),
                }
                .into()),
                Outcome::EarlyReturn => {
                    self.reject("Missing mandatory field Version".to_string());
                    Err(ProcessError::EarlyReturn)
                }
                Outcome::Unexpected => Err(anyhow!("database went away").into()),
                Outcome::Interrupted => Err(Interrupted.into()),
                Outcome::RejectedByChecks => {
                    self.reject("File foo_1.0.dsc has the wrong size".to_string());
                    Ok(())
                }
                _ => Ok(()),
            }
        }

        fn reject(&mut self, reason: String) {
            self.rejections.push(reason);
        }

        fn is_rejected(&self) -> bool {
            !self.rejections.is_empty()
        }

        fn rejections(&self) -> &[String] {
            &self.rejections
        }

        fn has_signing_key(&self) -> bool {
            self.factory.signing_key
        }

        fn has_parsed_content(&self) -> bool {
            false
        }

        fn do_reject(&mut self, notify: bool) {
            if notify {
                let notification = Notification::UploadRejected {
                    recipient: "Foo Bar <foo.bar@canonical.com>".to_string(),
                    changes_file: self.filename.clone(),
                    archive: self.policy.archive().display_name(),
                    reasons: self.rejections.clone(),
                };
                let _ = self.factory.notifier.send(&notification);
            }
        }

        fn do_accept(
            &mut self,
            notify: bool,
            build: Option<&mut BuildRecord>,
            txn: &mut TransactionScope<'_>,
        ) -> bool {
            if self.factory.outcome == Outcome::AcceptFails {
                self.reject("foo 1.0-1 is already accepted".to_string());
                return false;
            }
            txn.stage(Change::UploadAccepted {
                archive_id: self.policy.archive().id,
                source: "foo".to_string(),
                version: "1.0-1".to_string(),
                suite: self.policy.suite().unwrap_or("breezy").to_string(),
                changes_file: self.filename.clone(),
            });
            if let Some(build) = build {
                build.record_uploaded_files(vec!["foo_1.0-1_i386.deb".to_string()], txn);
                build.update_status(BuildStatus::FullyBuilt, txn);
            }
            if notify {
                txn.notify_on_commit(Notification::UploadAccepted {
                    recipient: "Foo Bar <foo.bar@canonical.com>".to_string(),
                    changes_file: self.filename.clone(),
                    archive: self.policy.archive().display_name(),
                    suite: "breezy".to_string(),
                });
            }
            true
        }
    }

    impl UploadFactory for FakeFactory<'_> {
        fn from_changes_file<'f>(
            &'f self,
            changes_path: &Path,
            policy: UploadPolicy,
        ) -> Result<Box<dyn NascentUpload + 'f>, UploadError> {
            if self.outcome == Outcome::Unparseable {
                return Err(UploadError::Malformed {
                    path: changes_path.to_path_buf(),
                    reason: "empty paragraph".to_string(),
                });
            }
            self.policies.borrow_mut().push(policy.clone());
            Ok(Box::new(FakeUpload {
                factory: self,
                filename: changes_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                policy,
                rejections: Vec::new(),
            }))
        }
    }

    struct Harness {
        config: ProcessorConfig,
        registry: crate::archive::Registry,
        notifier: RecordingNotifier,
        reporter: RecordingReporter,
        log: UploadLog,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                config: ProcessorConfig::new(PathBuf::from("/queue")),
                registry: sample_registry(),
                notifier: RecordingNotifier::default(),
                reporter: RecordingReporter::default(),
                log: UploadLog::new(),
            }
        }

        fn run(
            &self,
            factory: &FakeFactory<'_>,
            changes_file: &str,
            build: Option<&mut BuildRecord>,
            store: &mut MemoryStore,
        ) -> Result<UploadStatus, ChangesFileError> {
            let ctx = Context {
                config: &self.config,
                archives: &self.registry,
                builds: &self.registry,
                uploads: factory,
                artifacts: &DirectoryArtifactUploader,
                notifier: &self.notifier,
                oops: &self.reporter,
            };
            let upload_path = PathBuf::from("/queue/incoming/upload");
            ChangesFileProcessor::new(ctx, &upload_path, &self.log).process(
                Path::new(changes_file),
                build,
                store,
            )
        }
    }

    #[test]
    fn test_clean_upload_is_accepted_and_committed() {
        let harness = Harness::new();
        let factory = FakeFactory::new(Outcome::Clean, &harness.notifier);
        let mut store = MemoryStore::default();

        let status = harness
            .run(&factory, "ubuntu/breezy/foo_1.0-1_source.changes", None, &mut store)
            .unwrap();

        assert_eq!(status, UploadStatus::Accepted);
        assert_eq!(store.commits(), 1);
        assert!(store.has_accepted(1, "foo", "1.0-1"));
        let policies = factory.policies.borrow();
        assert_eq!(policies[0].archive().id, 1);
        assert_eq!(policies[0].suite(), Some("breezy"));
        assert_eq!(harness.notifier.sent().len(), 1);
    }

    #[test]
    fn test_caller_suite_overrides_path_suite() {
        let mut harness = Harness::new();
        harness.config.suite_override = Some("hoary-updates".to_string());
        let factory = FakeFactory::new(Outcome::Clean, &harness.notifier);
        let mut store = MemoryStore::default();

        harness
            .run(&factory, "ubuntu/breezy/foo_source.changes", None, &mut store)
            .unwrap();
        assert_eq!(factory.policies.borrow()[0].suite(), Some("hoary-updates"));
    }

    #[test]
    fn test_ppa_path_error_is_rejected_with_notice() {
        let harness = Harness::new();
        let factory = FakeFactory::new(Outcome::Clean, &harness.notifier);
        let mut store = MemoryStore::default();

        let status = harness
            .run(&factory, "~nonexistent-user/ppa/foo_source.changes", None, &mut store)
            .unwrap();

        assert_eq!(status, UploadStatus::Rejected);
        assert_eq!(store.commits(), 0);
        assert_eq!(store.pending(), 0);
        // Fallback context is the first ubuntu PPA.
        assert_eq!(factory.policies.borrow()[0].archive().id, 10);
        let sent = harness.notifier.sent();
        assert_eq!(sent.len(), 1);
        let Notification::UploadRejected { reasons, .. } = &sent[0] else {
            panic!("expected a rejection, got {:?}", sent[0]);
        };
        assert!(reasons[0].contains("Could not find person or team named 'nonexistent-user'."));
    }

    #[test]
    fn test_upload_path_error_falls_back_to_main_archive() {
        let harness = Harness::new();
        let factory = FakeFactory::new(Outcome::Clean, &harness.notifier);
        let mut store = MemoryStore::default();

        let status = harness
            .run(&factory, "nonexistent/foo_source.changes", None, &mut store)
            .unwrap();
        assert_eq!(status, UploadStatus::Rejected);
        assert_eq!(factory.policies.borrow()[0].archive().id, 1);
        assert!(factory.rejections.borrow()[0][0]
            .contains("Could not find distribution 'nonexistent'."));
    }

    #[test]
    fn test_build_path_requires_buildd_policy() {
        let harness = Harness::new();
        let factory = FakeFactory::new(Outcome::Clean, &harness.notifier);
        let mut store = MemoryStore::default();

        let status = harness
            .run(&factory, "1/ubuntu/foo_source.changes", None, &mut store)
            .unwrap();
        assert_eq!(status, UploadStatus::Rejected);
        assert_eq!(
            factory.rejections.borrow()[0],
            vec!["Invalid upload path (1/ubuntu) for this policy (insecure)"]
        );
    }

    #[test]
    fn test_process_errors_become_rejections() {
        for (outcome, expected) in [
            (
                Outcome::PolicyError,
                "UploadPolicyError escaped upload.process: Unable to find distroseries: nonexistent in ubuntu",
            ),
            (
                Outcome::EarlyReturn,
                "Further error processing not possible because of a critical previous error.",
            ),
            (
                Outcome::Unexpected,
                "Unhandled exception processing upload: database went away",
            ),
        ] {
            let harness = Harness::new();
            let factory = FakeFactory::new(outcome, &harness.notifier);
            let mut store = MemoryStore::default();

            let status = harness
                .run(&factory, "ubuntu/foo_source.changes", None, &mut store)
                .unwrap();
            assert_eq!(status, UploadStatus::Rejected, "{outcome:?}");
            let rejections = factory.rejections.borrow();
            assert_eq!(rejections[0].last().unwrap(), expected);
            assert_eq!(store.pending(), 0);
        }
    }

    #[test]
    fn test_unexpected_error_is_reported() {
        let harness = Harness::new();
        let factory = FakeFactory::new(Outcome::Unexpected, &harness.notifier);
        let mut store = MemoryStore::default();

        harness
            .run(&factory, "ubuntu/foo_source.changes", None, &mut store)
            .unwrap();
        assert_eq!(harness.reporter.reports(), vec!["database went away"]);
        assert!(harness.log.contents().contains("OOPS-TEST1"));
    }

    #[test]
    fn test_interruption_propagates_and_aborts() {
        let harness = Harness::new();
        let factory = FakeFactory::new(Outcome::Interrupted, &harness.notifier);
        let mut store = MemoryStore::default();

        let result = harness.run(&factory, "ubuntu/foo_source.changes", None, &mut store);
        assert!(matches!(result, Err(ChangesFileError::Interrupted(_))));
        assert_eq!(store.aborts(), 1);
        assert_eq!(store.commits(), 0);
    }

    #[test]
    fn test_unparseable_changes_file_is_rejected() {
        let harness = Harness::new();
        let factory = FakeFactory::new(Outcome::Unparseable, &harness.notifier);
        let mut store = MemoryStore::default();

        let status = harness
            .run(&factory, "ubuntu/foo_source.changes", None, &mut store)
            .unwrap();
        assert_eq!(status, UploadStatus::Rejected);
        assert!(harness.log.contents().contains("Failed to parse changes file"));
        assert!(harness.notifier.sent().is_empty());
        assert_eq!(store.aborts(), 1);
    }

    #[test]
    fn test_rejection_without_signing_key_sends_nothing() {
        let harness = Harness::new();
        let mut factory = FakeFactory::new(Outcome::RejectedByChecks, &harness.notifier);
        factory.signing_key = false;
        let mut store = MemoryStore::default();

        let status = harness
            .run(&factory, "ubuntu/foo_source.changes", None, &mut store)
            .unwrap();
        assert_eq!(status, UploadStatus::Rejected);
        assert!(harness.notifier.sent().is_empty());
    }

    #[test]
    fn test_no_mails_suppresses_rejection_notice() {
        let mut harness = Harness::new();
        harness.config.no_mails = true;
        let factory = FakeFactory::new(Outcome::RejectedByChecks, &harness.notifier);
        let mut store = MemoryStore::default();

        harness
            .run(&factory, "ubuntu/foo_source.changes", None, &mut store)
            .unwrap();
        assert!(harness.notifier.sent().is_empty());
    }

    #[test]
    fn test_failed_acceptance_is_rejected() {
        let harness = Harness::new();
        let factory = FakeFactory::new(Outcome::AcceptFails, &harness.notifier);
        let mut store = MemoryStore::default();

        let status = harness
            .run(&factory, "ubuntu/foo_source.changes", None, &mut store)
            .unwrap();
        assert_eq!(status, UploadStatus::Rejected);
        assert_eq!(store.commits(), 0);
        assert!(harness
            .log
            .contents()
            .contains("Rejection during accept. Aborting partial accept."));
    }

    #[test]
    fn test_dry_run_aborts_accepted_upload() {
        let mut harness = Harness::new();
        harness.config.dry_run = true;
        let factory = FakeFactory::new(Outcome::Clean, &harness.notifier);
        let mut store = MemoryStore::default();

        let status = harness
            .run(&factory, "ubuntu/foo_source.changes", None, &mut store)
            .unwrap();
        assert_eq!(status, UploadStatus::Accepted);
        assert_eq!(store.commits(), 0);
        assert!(store.committed().is_empty());
        assert!(harness.notifier.sent().is_empty());
    }

    #[test]
    fn test_failed_commit_sends_no_acceptance() {
        let harness = Harness::new();
        let queue = tempfile::TempDir::new().unwrap();
        let upload_path = queue.path().join("upload");
        let dir = upload_path.join("ubuntu");
        std::fs::create_dir_all(&dir).unwrap();
        let lines = [write_payload(&dir, "foo_1.0-1.dsc", b"Format: 3.0 (quilt)\n")];
        let changes_file = dir.join("foo_1.0-1_source.changes");
        std::fs::write(
            &changes_file,
            signed(&changes_text("foo", "source", "breezy", &lines)),
        )
        .unwrap();
        let uploads = ChangesUploadFactory::new(&harness.notifier, None);
        let ctx = Context {
            config: &harness.config,
            archives: &harness.registry,
            builds: &harness.registry,
            uploads: &uploads,
            artifacts: &DirectoryArtifactUploader,
            notifier: &harness.notifier,
            oops: &harness.reporter,
        };
        let mut store = BrokenStore::default();

        let result = ChangesFileProcessor::new(ctx, &upload_path, &harness.log).process(
            Path::new("ubuntu/foo_1.0-1_source.changes"),
            None,
            &mut store,
        );

        assert!(matches!(result, Err(ChangesFileError::Commit { .. })));
        assert!(harness.notifier.sent().is_empty());
        assert!(store.0.committed().is_empty());
    }

    #[test]
    fn test_build_is_passed_to_acceptance() {
        let mut harness = Harness::new();
        harness.config.policy = PolicyKind::BuildDaemon;
        let factory = FakeFactory::new(Outcome::Clean, &harness.notifier);
        let mut store = MemoryStore::default();
        let mut build = BuildRecord {
            id: 100,
            kind: BuildKind::BinaryPackage,
            status: BuildStatus::Uploading,
            archive_id: 1,
            title: None,
            upload_log: None,
            uploaded_files: vec![],
        };

        let status = harness
            .run(&factory, "1/ubuntu/foo_i386.changes", Some(&mut build), &mut store)
            .unwrap();
        assert_eq!(status, UploadStatus::Accepted);
        assert_eq!(build.status, BuildStatus::FullyBuilt);
        assert_eq!(factory.policies.borrow()[0].build_id(), Some(100));
    }
}
