// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Upload policies: which uploads a target accepts, built once per changes file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::archive::{Archive, DistroSeries, Distribution, Pocket};
use crate::build::BuildRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    /// Signed uploads from people.
    #[default]
    Insecure,
    /// Uploads from the build farm.
    #[serde(rename = "buildd")]
    BuildDaemon,
    /// Source copies from another distribution.
    Sync,
    AbsolutelyAnything,
}

impl PolicyKind {
    const ALL: [PolicyKind; 4] = [
        PolicyKind::Insecure,
        PolicyKind::BuildDaemon,
        PolicyKind::Sync,
        PolicyKind::AbsolutelyAnything,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            PolicyKind::Insecure => "insecure",
            PolicyKind::BuildDaemon => "buildd",
            PolicyKind::Sync => "sync",
            PolicyKind::AbsolutelyAnything => "absolutely-anything",
        }
    }

    /// Policies trusting the transport instead of an uploader signature.
    #[must_use]
    pub fn unsigned_changes_ok(self) -> bool {
        matches!(self, PolicyKind::BuildDaemon | PolicyKind::AbsolutelyAnything)
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown upload policy: {0}")]
pub struct UnknownPolicy(String);

impl FromStr for PolicyKind {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| UnknownPolicy(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("Unable to find distroseries: {suite} in {distribution}")]
    UnknownSuite { distribution: String, suite: String },
}

/// What an upload carries, derived from its `Architecture` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadType {
    Source,
    Binary,
    Mixed,
}

impl UploadType {
    #[must_use]
    pub fn from_architectures<'s>(architectures: impl IntoIterator<Item = &'s str>) -> Self {
        let (mut source, mut binary) = (false, false);
        for architecture in architectures {
            if architecture == "source" {
                source = true;
            } else {
                binary = true;
            }
        }
        match (source, binary) {
            (true, false) => UploadType::Source,
            (true, true) => UploadType::Mixed,
            _ => UploadType::Binary,
        }
    }
}

/// The series and pocket an upload lands in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub series: DistroSeries,
    pub pocket: Pocket,
    pub suite: String,
}

/// Immutable policy for one changes file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    kind: PolicyKind,
    distribution: Distribution,
    archive: Archive,
    suite: Option<String>,
    build_id: Option<u64>,
    recipe_build: bool,
}

impl UploadPolicy {
    /// `suite` is the caller override or the suite named by the upload path; when
    /// present it wins over the changes file's own `Distribution` field.
    #[must_use]
    pub fn new(
        kind: PolicyKind,
        distribution: Distribution,
        archive: Archive,
        suite: Option<String>,
        build: Option<&BuildRecord>,
    ) -> Self {
        Self {
            kind,
            distribution,
            archive,
            suite,
            build_id: build.map(|b| b.id),
            recipe_build: build.is_some_and(|b| {
                matches!(b.kind, crate::build::BuildKind::SourcePackageRecipe { .. })
            }),
        }
    }

    #[must_use]
    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    #[must_use]
    pub fn distribution(&self) -> &Distribution {
        &self.distribution
    }

    #[must_use]
    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    #[must_use]
    pub fn suite(&self) -> Option<&str> {
        self.suite.as_deref()
    }

    #[must_use]
    pub fn build_id(&self) -> Option<u64> {
        self.build_id
    }

    /// Resolve the target suite, preferring the policy suite over `declared`.
    ///
    /// # Errors
    /// Returns `PolicyError::UnknownSuite` if the suite is not one of the distribution's.
    pub fn resolve_target(&self, declared: &str) -> Result<Target, PolicyError> {
        let suite = self.suite.as_deref().unwrap_or(declared);
        let (series, pocket) =
            self.distribution
                .resolve_suite(suite)
                .map_err(|e| PolicyError::UnknownSuite {
                    distribution: e.distribution,
                    suite: e.suite,
                })?;
        Ok(Target {
            series: series.clone(),
            pocket,
            suite: suite.to_string(),
        })
    }

    /// Rejection reasons for uploading into `target`.
    #[must_use]
    pub fn check_target(&self, target: &Target) -> Vec<String> {
        let mut reasons = Vec::new();
        if self.archive.is_ppa() {
            if target.pocket != Pocket::Release {
                reasons.push("PPA uploads must be for the RELEASE pocket.".to_string());
            }
            return reasons;
        }
        if !matches!(self.kind, PolicyKind::Insecure | PolicyKind::Sync) {
            return reasons;
        }
        let pre_release = target.series.status.is_pre_release();
        if target.pocket == Pocket::Release && !pre_release {
            reasons.push(format!(
                "Not permitted to upload to the RELEASE pocket in a series in the '{}' state.",
                target.series.status
            ));
        } else if pre_release && !matches!(target.pocket, Pocket::Release | Pocket::Proposed) {
            reasons.push(format!(
                "Not permitted to upload to the {} pocket in a series in the '{}' state.",
                target.pocket, target.series.status
            ));
        }
        reasons
    }

    /// Rejection reason if this policy does not take uploads of `upload_type`.
    #[must_use]
    pub fn check_upload_type(&self, upload_type: UploadType) -> Option<String> {
        let (source_ok, binary_ok, mixed_ok) = match self.kind {
            PolicyKind::Insecure | PolicyKind::Sync => (true, false, false),
            PolicyKind::BuildDaemon => (self.recipe_build, true, false),
            PolicyKind::AbsolutelyAnything => (true, true, true),
        };
        match upload_type {
            UploadType::Source if !source_ok => {
                Some(format!("Source uploads are not accepted by the {} policy.", self.name()))
            }
            UploadType::Binary if !binary_ok => Some(
                "Upload rejected because it contains binary packages. Ensure you are using \
                 `debuild -S`, or an equivalent command, to generate only the source package \
                 before re-uploading."
                    .to_string(),
            ),
            UploadType::Mixed if !mixed_ok => {
                Some("Source/binary (i.e. mixed) uploads are not allowed.".to_string())
            }
            _ => None,
        }
    }
}
