// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Build-farm jobs whose results arrive as build uploads, and the lookup used to find them.

mod artifacts;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use artifacts::{ArtifactUploader, DirectoryArtifactUploader};

use crate::store::{Change, TransactionScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    NeedsBuild,
    Building,
    Uploading,
    FullyBuilt,
    FailedToBuild,
    FailedToUpload,
    Superseded,
    Cancelled,
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildStatus::NeedsBuild => "NEEDSBUILD",
            BuildStatus::Building => "BUILDING",
            BuildStatus::Uploading => "UPLOADING",
            BuildStatus::FullyBuilt => "FULLYBUILT",
            BuildStatus::FailedToBuild => "FAILEDTOBUILD",
            BuildStatus::FailedToUpload => "FAILEDTOUPLOAD",
            BuildStatus::Superseded => "SUPERSEDED",
            BuildStatus::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

/// The kind of build-farm job, which decides how its upload is processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildKind {
    BinaryPackage,
    /// `recipe` is `None` once the recipe has been deleted.
    SourcePackageRecipe { recipe: Option<String> },
    LiveFs,
    Snap,
}

impl BuildKind {
    const JOB_TYPES: [&'static str; 4] = ["PACKAGEBUILD", "RECIPEBRANCHBUILD", "LIVEFSBUILD", "SNAPBUILD"];

    /// Job type name used in build upload leaf names.
    #[must_use]
    pub fn job_type(&self) -> &'static str {
        match self {
            BuildKind::BinaryPackage => Self::JOB_TYPES[0],
            BuildKind::SourcePackageRecipe { .. } => Self::JOB_TYPES[1],
            BuildKind::LiveFs => Self::JOB_TYPES[2],
            BuildKind::Snap => Self::JOB_TYPES[3],
        }
    }

    /// Canonical spelling of a job type parsed from a leaf name, if it is a known one.
    #[must_use]
    pub fn canonical_job_type(job_type: &str) -> Option<&'static str> {
        Self::JOB_TYPES
            .iter()
            .copied()
            .find(|known| known.eq_ignore_ascii_case(job_type))
    }

    /// Kinds whose uploads are image artifacts rather than a changes file.
    #[must_use]
    pub fn uploads_artifacts(&self) -> bool {
        matches!(self, BuildKind::LiveFs | BuildKind::Snap)
    }
}

impl fmt::Display for BuildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildKind::BinaryPackage => "binary package",
            BuildKind::SourcePackageRecipe { .. } => "source package recipe",
            BuildKind::LiveFs => "live filesystem",
            BuildKind::Snap => "snap package",
        };
        f.write_str(name)
    }
}

/// A build-farm job as seen by the upload processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub id: u64,
    pub kind: BuildKind,
    pub status: BuildStatus,
    pub archive_id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub upload_log: Option<String>,
    #[serde(default)]
    pub uploaded_files: Vec<String>,
}

impl BuildRecord {
    #[must_use]
    pub fn job_type(&self) -> &'static str {
        self.kind.job_type()
    }

    #[must_use]
    pub fn title(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| format!("{} {}", self.job_type(), self.id))
    }

    #[must_use]
    pub fn has_deleted_recipe(&self) -> bool {
        matches!(self.kind, BuildKind::SourcePackageRecipe { recipe: None })
    }

    /// Whether the upload actually produced something for this build.
    #[must_use]
    pub fn verify_successful_upload(&self) -> bool {
        !self.uploaded_files.is_empty()
    }

    pub fn update_status(&mut self, status: BuildStatus, txn: &mut TransactionScope<'_>) {
        self.status = status;
        txn.stage(Change::BuildStatusChanged {
            build_id: self.id,
            status,
        });
    }

    pub fn store_upload_log(&mut self, log: String, txn: &mut TransactionScope<'_>) {
        txn.stage(Change::BuildLogStored {
            build_id: self.id,
            log: log.clone(),
        });
        self.upload_log = Some(log);
    }

    pub fn record_uploaded_files(&mut self, files: Vec<String>, txn: &mut TransactionScope<'_>) {
        txn.stage(Change::BuildArtifacts {
            build_id: self.id,
            files: files.clone(),
        });
        self.uploaded_files = files;
    }
}

/// The build reference encoded in a build upload's leaf directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildUploadContext {
    pub job_type: String,
    pub job_id: u64,
}

impl BuildUploadContext {
    /// Parse `<anything>-<job_type>-<job_id>`.
    ///
    /// # Errors
    /// Returns `CannotGetBuild::BadLeafName` if the name has fewer than two
    /// `-`-separated tokens or the last token is not a base-10 integer.
    pub fn from_leaf_name(leaf: &str) -> Result<Self, CannotGetBuild> {
        let bad_leaf = || CannotGetBuild::BadLeafName {
            leaf: leaf.to_string(),
        };
        let mut tokens = leaf.rsplit('-');
        let job_id = tokens.next().ok_or_else(bad_leaf)?;
        let job_type = tokens.next().ok_or_else(bad_leaf)?;
        if job_id.is_empty() || !job_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad_leaf());
        }
        let job_id = job_id.parse::<u64>().map_err(|_| bad_leaf())?;
        Ok(Self {
            job_type: job_type.to_string(),
            job_id,
        })
    }
}

/// The build behind a build upload could not be resolved; the upload is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CannotGetBuild {
    #[error("Unable to extract build id from leaf name {leaf}, skipping.")]
    BadLeafName { leaf: String },
    #[error("Unable to find {job_type} with id {id}. Skipping.")]
    NotFound { job_type: String, id: u64 },
}

/// Lookup service for build-farm jobs.
pub trait BuildLookup {
    /// Resolve a build by job type and id.
    ///
    /// Returns `Ok(None)` for a build that existed but has been deleted.
    ///
    /// # Errors
    /// Returns `CannotGetBuild` if no such build is known.
    fn build_by_job(&self, job_type: &str, id: u64) -> Result<Option<BuildRecord>, CannotGetBuild>;
}
