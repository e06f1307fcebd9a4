// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! The transactional store shared by a queue pass, and the scope guard every decision runs in.

mod journal;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub use journal::JournalStore;

use crate::build::BuildStatus;
use crate::notify::Notification;

/// A change staged in the store, applied on commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum Change {
    UploadAccepted {
        archive_id: u64,
        source: String,
        version: String,
        suite: String,
        changes_file: String,
    },
    BuildStatusChanged {
        build_id: u64,
        status: BuildStatus,
    },
    BuildLogStored {
        build_id: u64,
        log: String,
    },
    BuildArtifacts {
        build_id: u64,
        files: Vec<String>,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to open journal: {path:?}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to read journal entry {line} in {path:?}")]
    CorruptJournal {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to write journal: {path:?}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize change")]
    SerializeFailed {
        #[source]
        source: serde_json::Error,
    },
}

/// A store with a single pending transaction.
pub trait Store {
    fn stage(&mut self, change: Change);

    /// Apply every staged change.
    ///
    /// # Errors
    /// Returns an error if the changes cannot be persisted; they stay staged.
    fn commit(&mut self) -> Result<(), StoreError>;

    /// Discard every staged change.
    fn abort(&mut self);

    /// Number of staged changes.
    fn pending(&self) -> usize;

    /// Whether `source` at `version` has already been committed into the archive.
    fn has_accepted(&self, archive_id: u64, source: &str, version: &str) -> bool;
}

/// Scope around one transactional decision. Dropping it without committing aborts.
///
/// Notifications queued on the scope belong to the decision: they are handed back by
/// a successful commit and dropped otherwise.
pub struct TransactionScope<'s> {
    store: &'s mut dyn Store,
    finished: bool,
    notifications: Vec<Notification>,
}

impl<'s> TransactionScope<'s> {
    /// Open a scope, discarding anything a previous caller left staged.
    pub fn begin(store: &'s mut dyn Store) -> Self {
        if store.pending() > 0 {
            log::warn!(
                "Discarding {} change(s) left over from a previous transaction",
                store.pending()
            );
            store.abort();
        }
        Self {
            store,
            finished: false,
            notifications: Vec::new(),
        }
    }

    pub fn stage(&mut self, change: Change) {
        self.store.stage(change);
    }

    /// Queue `notification` for delivery once the scope has committed.
    pub fn notify_on_commit(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    #[must_use]
    pub fn has_accepted(&self, archive_id: u64, source: &str, version: &str) -> bool {
        self.store.has_accepted(archive_id, source, version)
    }

    /// Commit the staged changes and return the notifications that are now due.
    ///
    /// # Errors
    /// Returns the store error of a failed commit; the staged changes and queued
    /// notifications are discarded.
    pub fn commit(mut self) -> Result<Vec<Notification>, StoreError> {
        self.finished = true;
        match self.store.commit() {
            Ok(()) => Ok(std::mem::take(&mut self.notifications)),
            Err(e) => {
                self.store.abort();
                Err(e)
            }
        }
    }

    pub fn abort(mut self) {
        self.finished = true;
        if !self.notifications.is_empty() {
            log::debug!(
                "Dropping {} notification(s) of an aborted transaction",
                self.notifications.len()
            );
        }
        self.store.abort();
    }
}

impl Drop for TransactionScope<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.store.abort();
        }
    }
}

/// Store keeping committed changes in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    committed: Vec<Change>,
    staged: Vec<Change>,
    commits: usize,
    aborts: usize,
}

impl MemoryStore {
    #[must_use]
    pub fn committed(&self) -> &[Change] {
        &self.committed
    }

    #[must_use]
    pub fn commits(&self) -> usize {
        self.commits
    }

    #[must_use]
    pub fn aborts(&self) -> usize {
        self.aborts
    }
}

impl Store for MemoryStore {
    fn stage(&mut self, change: Change) {
        self.staged.push(change);
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.commits += 1;
        self.committed.append(&mut self.staged);
        Ok(())
    }

    fn abort(&mut self) {
        self.aborts += 1;
        self.staged.clear();
    }

    fn pending(&self) -> usize {
        self.staged.len()
    }

    fn has_accepted(&self, archive_id: u64, source: &str, version: &str) -> bool {
        self.committed.iter().any(|change| {
            matches!(
                change,
                Change::UploadAccepted { archive_id: a, source: s, version: v, .. }
                    if *a == archive_id && s == source && v == version
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepted(source: &str) -> Change {
        Change::UploadAccepted {
            archive_id: 1,
            source: source.to_string(),
            version: "1.0-1".to_string(),
            suite: "hoary".to_string(),
            changes_file: format!("{source}_1.0-1_source.changes"),
        }
    }

    #[test]
    fn test_commit_applies_staged_changes() {
        let mut store = MemoryStore::default();
        let mut txn = TransactionScope::begin(&mut store);
        txn.stage(accepted("foo"));
        txn.commit().unwrap();

        assert_eq!(store.commits(), 1);
        assert_eq!(store.pending(), 0);
        assert!(store.has_accepted(1, "foo", "1.0-1"));
        assert!(!store.has_accepted(2, "foo", "1.0-1"));
    }

    fn success_notice() -> Notification {
        Notification::BuildSucceeded {
            build_id: 100,
            title: "PACKAGEBUILD 100".to_string(),
        }
    }

    #[test]
    fn test_commit_hands_back_queued_notifications() {
        let mut store = MemoryStore::default();
        let mut txn = TransactionScope::begin(&mut store);
        txn.stage(accepted("foo"));
        txn.notify_on_commit(success_notice());
        assert_eq!(txn.commit().unwrap(), vec![success_notice()]);
    }

    #[test]
    fn test_aborted_transaction_has_no_notifications() {
        let mut store = MemoryStore::default();
        let mut txn = TransactionScope::begin(&mut store);
        txn.notify_on_commit(success_notice());
        txn.abort();
        let txn = TransactionScope::begin(&mut store);
        assert!(txn.commit().unwrap().is_empty());
    }

    #[test]
    fn test_drop_aborts() {
        let mut store = MemoryStore::default();
        {
            let mut txn = TransactionScope::begin(&mut store);
            txn.stage(accepted("foo"));
        }
        assert_eq!(store.aborts(), 1);
        assert!(store.committed().is_empty());
        assert!(!store.has_accepted(1, "foo", "1.0-1"));
    }

    #[test]
    fn test_begin_discards_leftovers() {
        let mut store = MemoryStore::default();
        store.stage(accepted("stale"));
        let txn = TransactionScope::begin(&mut store);
        txn.commit().unwrap();

        assert!(store.committed().is_empty());
        assert_eq!(store.aborts(), 1);
    }

    #[test]
    fn test_explicit_abort_counts_once() {
        let mut store = MemoryStore::default();
        let mut txn = TransactionScope::begin(&mut store);
        txn.stage(accepted("foo"));
        txn.abort();
        assert_eq!(store.aborts(), 1);
        assert_eq!(store.commits(), 0);
    }

    #[test]
    fn test_change_serialization_is_tagged() {
        let json = serde_json::to_string(&Change::BuildStatusChanged {
            build_id: 7,
            status: BuildStatus::FailedToUpload,
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"change":"build_status_changed","build_id":7,"status":"failed_to_upload"}"#
        );
    }
}
