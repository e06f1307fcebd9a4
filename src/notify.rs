// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Notifications to uploaders and build owners.

use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    UploadRejected {
        recipient: String,
        changes_file: String,
        archive: String,
        reasons: Vec<String>,
    },
    UploadAccepted {
        recipient: String,
        changes_file: String,
        archive: String,
        suite: String,
    },
    BuildSucceeded {
        build_id: u64,
        title: String,
    },
    BuildFailed {
        build_id: u64,
        title: String,
        extra_info: Option<String>,
    },
}

impl Notification {
    #[must_use]
    pub fn subject(&self) -> String {
        match self {
            Notification::UploadRejected { changes_file, .. } => {
                format!("[{changes_file}] Rejected upload")
            }
            Notification::UploadAccepted {
                changes_file,
                suite,
                ..
            } => format!("[{changes_file}] Accepted into {suite}"),
            Notification::BuildSucceeded { title, .. } => format!("[build] {title}: uploaded"),
            Notification::BuildFailed { title, .. } => format!("[build] {title}: failed to upload"),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Failed to serialize notification")]
    SerializeFailed {
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to write notification to {path:?}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub trait Notifier {
    /// Deliver a notification.
    ///
    /// # Errors
    /// Returns an error if the notification could not be handed off.
    fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Send the notifications a committed transaction released. Failures are only logged.
pub fn deliver(notifier: &dyn Notifier, notifications: Vec<Notification>) {
    for notification in notifications {
        if let Err(e) = notifier.send(&notification) {
            log::warn!("Failed to send \"{}\": {e}", notification.subject());
        }
    }
}

/// Logs notifications and, with an outbox configured, drops each one there as a JSON file.
#[derive(Debug, Default, Clone)]
pub struct OutboxNotifier {
    outbox: Option<PathBuf>,
}

impl OutboxNotifier {
    #[must_use]
    pub fn new(outbox: Option<PathBuf>) -> Self {
        Self { outbox }
    }
}

impl Notifier for OutboxNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        log::info!("Notification: {}", notification.subject());
        let Some(outbox) = &self.outbox else {
            return Ok(());
        };
        let path = outbox.join(format!("{}.json", Uuid::new_v4().simple()));
        let content = serde_json::to_string_pretty(notification)
            .map_err(|e| NotifyError::SerializeFailed { source: e })?;
        fs::create_dir_all(outbox)
            .and_then(|()| fs::write(&path, content))
            .map_err(|e| NotifyError::WriteFailed { path, source: e })
    }
}
