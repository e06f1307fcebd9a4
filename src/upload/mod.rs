// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! The bundled changes-file upload: parse, verify against the policy and the files on
//! disk, then stage the acceptance.

mod checksums;
mod control;
mod signature;

use std::fs;
use std::path::{Path, PathBuf};

pub use checksums::{parse_checksums, verify_checksums, ChecksumEntry};
pub use control::ControlFile;
pub use signature::{CommandError, SignatureVerifier};

use crate::build::{BuildRecord, BuildStatus};
use crate::changes::{
    NascentUpload, ProcessError, Target, UploadError, UploadFactory, UploadPolicy, UploadType,
};
use crate::notify::{Notification, Notifier};
use crate::store::{Change, TransactionScope};

/// Fields a changes file cannot be processed without.
const MANDATORY_FIELDS: [&str; 6] = [
    "Source",
    "Version",
    "Architecture",
    "Distribution",
    "Changed-By",
    "Checksums-Sha256",
];

/// Creates `ChangesUpload`s sharing one notifier and signature verifier.
pub struct ChangesUploadFactory<'a> {
    notifier: &'a dyn Notifier,
    verifier: Option<SignatureVerifier>,
}

impl<'a> ChangesUploadFactory<'a> {
    /// Without a `verifier`, signed changes files are trusted as they are.
    #[must_use]
    pub fn new(notifier: &'a dyn Notifier, verifier: Option<SignatureVerifier>) -> Self {
        Self { notifier, verifier }
    }
}

impl UploadFactory for ChangesUploadFactory<'_> {
    fn from_changes_file<'f>(
        &'f self,
        changes_path: &Path,
        policy: UploadPolicy,
    ) -> Result<Box<dyn NascentUpload + 'f>, UploadError> {
        let upload =
            ChangesUpload::open(changes_path, policy, self.notifier, self.verifier.as_ref())?;
        Ok(Box::new(upload))
    }
}

/// A parsed changes file on its way to acceptance or rejection.
pub struct ChangesUpload<'a> {
    path: PathBuf,
    filename: String,
    control: ControlFile,
    policy: UploadPolicy,
    notifier: &'a dyn Notifier,
    verifier: Option<&'a SignatureVerifier>,
    signing_key: bool,
    target: Option<Target>,
    files: Vec<ChecksumEntry>,
    rejections: Vec<String>,
}

impl<'a> ChangesUpload<'a> {
    /// Read and parse the changes file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not a single deb822 paragraph,
    /// lacks a mandatory field or carries an invalid Debian version.
    pub fn open(
        path: &Path,
        policy: UploadPolicy,
        notifier: &'a dyn Notifier,
        verifier: Option<&'a SignatureVerifier>,
    ) -> Result<Self, UploadError> {
        let text = fs::read_to_string(path).map_err(|e| UploadError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let malformed = |reason: String| UploadError::Malformed {
            path: path.to_path_buf(),
            reason,
        };
        let control = ControlFile::parse(&text).map_err(malformed)?;
        if let Some(missing) = MANDATORY_FIELDS
            .iter()
            .find(|name| control.get(name).is_none_or(str::is_empty))
        {
            return Err(malformed(format!("Missing mandatory field {missing}")));
        }
        let version = control.get("Version").unwrap_or_default();
        if let Err(e) = version.parse::<debversion::Version>() {
            return Err(malformed(format!("Invalid Version {version:?}: {e:?}")));
        }

        Ok(Self {
            path: path.to_path_buf(),
            filename: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            control,
            policy,
            notifier,
            verifier,
            signing_key: false,
            target: None,
            files: Vec::new(),
            rejections: Vec::new(),
        })
    }

    fn field(&self, name: &str) -> &str {
        self.control.get(name).unwrap_or_default()
    }

    fn recipient(&self) -> String {
        self.field("Changed-By").to_string()
    }

    /// The suite named by the `Distribution` field; only the first one counts.
    fn declared_suite(&self) -> &str {
        self.field("Distribution")
            .split_whitespace()
            .next()
            .unwrap_or_default()
    }

    fn verify_signature(&mut self) -> Result<(), ProcessError> {
        if !self.control.is_signed() {
            if !self.policy.kind().unsigned_changes_ok() {
                self.reject("Changes file must be signed.".to_string());
            }
            return Ok(());
        }
        let Some(verifier) = self.verifier else {
            log::debug!("No keyring configured, trusting signature of {}", self.filename);
            self.signing_key = true;
            return Ok(());
        };
        if verifier.verify(&self.path)? {
            self.signing_key = true;
        } else {
            self.reject(format!("GPG verification of {} failed.", self.filename));
        }
        Ok(())
    }

    fn send(&self, notification: &Notification) {
        if let Err(e) = self.notifier.send(notification) {
            log::warn!("Failed to send notification for {}: {e}", self.filename);
        }
    }
}

impl NascentUpload for ChangesUpload<'_> {
    fn changes_filename(&self) -> &str {
        &self.filename
    }

    fn process(&mut self) -> Result<(), ProcessError> {
        self.verify_signature()?;

        let declared = self.declared_suite().to_string();
        let target = self.policy.resolve_target(&declared)?;
        for reason in self.policy.check_target(&target) {
            self.reject(reason);
        }
        let upload_type =
            UploadType::from_architectures(self.field("Architecture").split_whitespace());
        if let Some(reason) = self.policy.check_upload_type(upload_type) {
            self.reject(reason);
        }
        self.target = Some(target);

        self.files = match parse_checksums(self.field("Checksums-Sha256")) {
            Ok(files) => files,
            Err(reason) => {
                self.reject(reason);
                return Err(ProcessError::EarlyReturn);
            }
        };
        let directory = self.path.parent().unwrap_or_else(|| Path::new("."));
        let reasons = verify_checksums(directory, &self.files)?;
        for reason in reasons {
            self.reject(reason);
        }
        Ok(())
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
        self.signing_key
    }

    fn has_parsed_content(&self) -> bool {
        !self.field("Changed-By").trim().is_empty()
    }

    fn do_reject(&mut self, notify: bool) {
        if !notify {
            return;
        }
        self.send(&Notification::UploadRejected {
            recipient: self.recipient(),
            changes_file: self.filename.clone(),
            archive: self.policy.archive().display_name(),
            reasons: self.rejections.clone(),
        });
    }

    fn do_accept(
        &mut self,
        notify: bool,
        build: Option<&mut BuildRecord>,
        txn: &mut TransactionScope<'_>,
    ) -> bool {
        let source = self.field("Source").to_string();
        let version = self.field("Version").to_string();
        let archive_id = self.policy.archive().id;
        let archive_name = self.policy.archive().display_name();
        if txn.has_accepted(archive_id, &source, &version) {
            self.reject(format!(
                "{source}_{version} has already been accepted into the {archive_name}."
            ));
            return false;
        }

        let suite = match &self.target {
            Some(target) => target.suite.clone(),
            None => self.declared_suite().to_string(),
        };
        txn.stage(Change::UploadAccepted {
            archive_id,
            source,
            version,
            suite: suite.clone(),
            changes_file: self.filename.clone(),
        });
        if let Some(build) = build {
            let files = self.files.iter().map(|file| file.name.clone()).collect();
            build.record_uploaded_files(files, txn);
            build.update_status(BuildStatus::FullyBuilt, txn);
        }
        if notify {
            txn.notify_on_commit(Notification::UploadAccepted {
                recipient: self.recipient(),
                changes_file: self.filename.clone(),
                archive: archive_name,
                suite,
            });
        }
        true
    }
}
