// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.
#![allow(dead_code)]

use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use upload_processor::archive::Registry;
use upload_processor::notify::{Notification, Notifier, NotifyError};
use upload_processor::oops::ErrorReporter;

pub const REGISTRY: &str = r#"{
  "distributions": [
    {
      "name": "ubuntu",
      "display_name": "Ubuntu",
      "series": [
        {"name": "hoary", "status": "current"},
        {"name": "breezy", "status": "development"}
      ]
    }
  ],
  "archives": [
    {"id": 1, "name": "primary", "distribution": "ubuntu", "purpose": "primary"},
    {"id": 10, "name": "ppa", "distribution": "ubuntu", "purpose": "ppa", "owner": "name16"}
  ],
  "people": [
    {"name": "name16", "display_name": "Foo Bar"}
  ],
  "builds": [
    {"id": 100, "kind": "binary_package", "status": "uploading", "archive_id": 1},
    {"id": 101, "kind": "binary_package", "status": "building", "archive_id": 1}
  ]
}"#;

/// An empty upload queue in a temporary directory.
pub struct Queue {
    pub dir: TempDir,
}

impl Queue {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Should create queue directory"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path(relative).exists()
    }

    /// Write a signed source upload of `foo` for `distribution` to
    /// `incoming/<leaf>/<upload_path>`.
    pub fn add_source_upload(&self, leaf: &str, upload_path: &str, distribution: &str) {
        let dir = self.path("incoming").join(leaf).join(upload_path);
        fs::create_dir_all(&dir).expect("Should create upload directory");
        let dsc = b"Format: 3.0 (quilt)\nSource: foo\n";
        fs::write(dir.join("foo_1.0-1.dsc"), dsc).expect("Should write payload");
        let changes = format!(
            "-----BEGIN PGP SIGNED MESSAGE-----\n\
             Hash: SHA256\n\
             \n\
             Format: 1.8\n\
             Source: foo\n\
             Architecture: source\n\
             Version: 1.0-1\n\
             Distribution: {distribution}\n\
             Maintainer: Foo Bar <foo.bar@canonical.com>\n\
             Changed-By: Foo Bar <foo.bar@canonical.com>\n\
             Checksums-Sha256:\n {:x} {} foo_1.0-1.dsc\n\
             -----BEGIN PGP SIGNATURE-----\n\
             \n\
             iQEzBAEBCAAdFiEE\n\
             =abcd\n\
             -----END PGP SIGNATURE-----\n",
            Sha256::digest(dsc),
            dsc.len()
        );
        fs::write(dir.join("foo_1.0-1_source.changes"), changes)
            .expect("Should write changes file");
    }
}

pub fn registry() -> Registry {
    Registry::from_json(REGISTRY).expect("Should parse registry")
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: RefCell<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.borrow().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.borrow_mut().push(notification.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    reports: RefCell<Vec<String>>,
}

impl RecordingReporter {
    pub fn reports(&self) -> Vec<String> {
        self.reports.borrow().clone()
    }
}

impl ErrorReporter for RecordingReporter {
    fn raising(&self, error: &dyn std::error::Error, _context: &[(&str, &str)]) -> String {
        let mut reports = self.reports.borrow_mut();
        reports.push(error.to_string());
        format!("OOPS-TEST{}", reports.len())
    }
}
