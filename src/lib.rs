// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Processing of an archive upload queue.
//!
//! This crate provides functionality to:
//! - Classify upload paths into a distribution, suite and target archive
//! - Scan pending upload directories for changes files
//! - Verify, accept or reject each changes file under an upload policy
//! - Complete build uploads and update the state of their builds
//! - Relocate every upload by its outcome and report on the pass

pub mod archive;
pub mod build;
pub mod changes;
pub mod config;
pub mod context;
pub mod handler;
pub mod interrupt;
pub mod location;
pub mod notify;
pub mod oops;
pub mod processor;
pub mod report;
pub mod scanner;
pub mod store;
pub mod upload;
pub mod upload_log;

#[cfg(test)]
mod testing;

// Re-export key types for convenience
pub use context::Context;
pub use handler::{UploadHandler, UploadStatus};
pub use processor::{QueueError, UploadProcessor};
pub use report::{summarize_run, RunReport};
