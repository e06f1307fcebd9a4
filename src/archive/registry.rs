// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! JSON-backed registry of distributions, archives, people and build-farm jobs.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::{Archive, ArchiveLookup, ArchivePurpose, Distribution, Person};
use crate::build::{BuildKind, BuildLookup, BuildRecord, CannotGetBuild};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to read registry file: {path:?}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse registry file: {path:?}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A build known to have existed but since deleted.
#[derive(Debug, Clone, Deserialize)]
struct DeletedBuild {
    job_type: String,
    id: u64,
}

/// In-memory lookup service loaded from a JSON document.
#[derive(Debug, Default, Deserialize)]
pub struct Registry {
    #[serde(default)]
    distributions: Vec<Distribution>,
    #[serde(default)]
    archives: Vec<Archive>,
    #[serde(default)]
    people: Vec<Person>,
    #[serde(default)]
    builds: Vec<BuildRecord>,
    #[serde(default)]
    deleted_builds: Vec<DeletedBuild>,
}

impl Registry {
    /// Load a registry from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a valid registry document.
    pub fn from_file(path: &Path) -> Result<Self, RegistryError> {
        let content = fs::read_to_string(path).map_err(|e| RegistryError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| RegistryError::ParseFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Parse a registry from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the document is not a valid registry.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl ArchiveLookup for Registry {
    fn distribution_by_name(&self, name: &str) -> Option<Distribution> {
        self.distributions.iter().find(|d| d.name == name).cloned()
    }

    fn archive_by_id(&self, id: u64) -> Option<Archive> {
        self.archives.iter().find(|a| a.id == id).cloned()
    }

    fn person_by_name(&self, name: &str) -> Option<Person> {
        self.people.iter().find(|p| p.name == name).cloned()
    }

    fn ppa_by_owner_distribution_name(
        &self,
        owner: &Person,
        distribution: &Distribution,
        name: &str,
    ) -> Option<Archive> {
        self.archives
            .iter()
            .find(|a| {
                a.purpose == ArchivePurpose::Ppa
                    && a.owner.as_deref() == Some(owner.name.as_str())
                    && a.distribution == distribution.name
                    && a.name == name
            })
            .cloned()
    }

    fn main_archive(&self, distribution: &Distribution) -> Option<Archive> {
        self.archives
            .iter()
            .find(|a| a.purpose == ArchivePurpose::Primary && a.distribution == distribution.name)
            .cloned()
    }

    fn all_ppas(&self, distribution: &Distribution) -> Vec<Archive> {
        let mut ppas: Vec<Archive> = self
            .archives
            .iter()
            .filter(|a| a.purpose == ArchivePurpose::Ppa && a.distribution == distribution.name)
            .cloned()
            .collect();
        ppas.sort_by_key(|a| a.id);
        ppas
    }
}

impl BuildLookup for Registry {
    fn build_by_job(&self, job_type: &str, id: u64) -> Result<Option<BuildRecord>, CannotGetBuild> {
        if self
            .deleted_builds
            .iter()
            .any(|b| b.id == id && b.job_type.eq_ignore_ascii_case(job_type))
        {
            return Ok(None);
        }
        self.builds
            .iter()
            .find(|b| b.id == id && b.job_type().eq_ignore_ascii_case(job_type))
            .cloned()
            .map(Some)
            .ok_or_else(|| CannotGetBuild::NotFound {
                job_type: BuildKind::canonical_job_type(job_type)
                    .unwrap_or(job_type)
                    .to_string(),
                id,
            })
    }
}
