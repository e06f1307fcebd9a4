// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Shared fixtures for unit tests.

use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::fs;
use std::path::Path;

use crate::archive::Registry;
use crate::notify::{Notification, Notifier, NotifyError};
use crate::oops::ErrorReporter;

pub(crate) const SAMPLE_REGISTRY: &str = r#"{
  "distributions": [
    {
      "name": "ubuntu",
      "display_name": "Ubuntu",
      "series": [
        {"name": "warty", "status": "obsolete"},
        {"name": "hoary", "status": "current"},
        {"name": "breezy", "status": "development"}
      ],
      "development_series_alias": "devel"
    },
    {
      "name": "debian",
      "display_name": "Debian",
      "series": [
        {"name": "bookworm", "status": "current"},
        {"name": "sid", "status": "development"}
      ]
    }
  ],
  "archives": [
    {"id": 1, "name": "primary", "distribution": "ubuntu", "purpose": "primary"},
    {"id": 2, "name": "primary", "distribution": "debian", "purpose": "primary"},
    {"id": 3, "name": "partner", "distribution": "ubuntu", "purpose": "partner"},
    {"id": 10, "name": "ppa", "distribution": "ubuntu", "purpose": "ppa", "owner": "name16"},
    {"id": 11, "name": "ppa", "distribution": "ubuntu", "purpose": "ppa", "owner": "cprov"},
    {"id": 12, "name": "ppa", "distribution": "debian", "purpose": "ppa", "owner": "name16"},
    {"id": 13, "name": "testing", "distribution": "ubuntu", "purpose": "ppa", "owner": "name16"},
    {"id": 14, "name": "frozen", "distribution": "ubuntu", "purpose": "ppa", "owner": "name16", "enabled": false}
  ],
  "people": [
    {"name": "name16", "display_name": "Foo Bar"},
    {"name": "cprov", "display_name": "Celso Providelo"},
    {"name": "nobody-with-ppas"}
  ],
  "builds": [
    {"id": 100, "kind": "binary_package", "status": "uploading", "archive_id": 1},
    {"id": 101, "kind": "binary_package", "status": "building", "archive_id": 1},
    {"id": 102, "kind": "binary_package", "status": "fully_built", "archive_id": 1},
    {"id": 103, "kind": {"source_package_recipe": {"recipe": null}}, "status": "uploading", "archive_id": 10},
    {"id": 104, "kind": "live_fs", "status": "uploading", "archive_id": 1},
    {"id": 105, "kind": "snap", "status": "uploading", "archive_id": 10},
    {"id": 106, "kind": {"source_package_recipe": {"recipe": "foo-daily"}}, "status": "uploading", "archive_id": 10}
  ],
  "deleted_builds": [
    {"job_type": "PACKAGEBUILD", "id": 99}
  ]
}"#;

pub(crate) fn sample_registry() -> Registry {
    Registry::from_json(SAMPLE_REGISTRY).unwrap()
}

/// Notifier recording every notification instead of delivering it.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    sent: RefCell<Vec<Notification>>,
}

impl RecordingNotifier {
    pub(crate) fn sent(&self) -> Vec<Notification> {
        self.sent.borrow().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.borrow_mut().push(notification.clone());
        Ok(())
    }
}

/// Error reporter handing out sequential reference ids.
#[derive(Default)]
pub(crate) struct RecordingReporter {
    reports: RefCell<Vec<String>>,
}

impl RecordingReporter {
    pub(crate) fn reports(&self) -> Vec<String> {
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

/// Write `content` to `dir/name` and return its sha256 and size as a `Checksums-Sha256` line.
pub(crate) fn write_payload(dir: &Path, name: &str, content: &[u8]) -> String {
    fs::write(dir.join(name), content).unwrap();
    format!(
        " {:x} {} {}",
        Sha256::digest(content),
        content.len(),
        name
    )
}

/// Render an unsigned changes file for `source`.
pub(crate) fn changes_text(
    source: &str,
    architecture: &str,
    distribution: &str,
    checksum_lines: &[String],
) -> String {
    format!(
        "Format: 1.8\n\
         Source: {source}\n\
         Binary: {source}\n\
         Architecture: {architecture}\n\
         Version: 1.0-1\n\
         Distribution: {distribution}\n\
         Urgency: low\n\
         Maintainer: Foo Bar <foo.bar@canonical.com>\n\
         Changed-By: Foo Bar <foo.bar@canonical.com>\n\
         Description:\n {source} - test package\n\
         Changes:\n {source} (1.0-1) {distribution}; urgency=low\n .\n   * Initial release.\n\
         Checksums-Sha256:\n{}\n",
        checksum_lines.join("\n")
    )
}

/// Wrap a changes body in an inline PGP armor.
pub(crate) fn signed(body: &str) -> String {
    format!(
        "-----BEGIN PGP SIGNED MESSAGE-----\nHash: SHA256\n\n{body}\n\
         -----BEGIN PGP SIGNATURE-----\n\niQEzBAEBCAAdFiEE\n=abcd\n-----END PGP SIGNATURE-----\n"
    )
}
