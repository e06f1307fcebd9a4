// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Distribution, archive and person model, plus the lookup interface upload paths are resolved against.

mod registry;
mod suite;

use serde::{Deserialize, Serialize};

pub use registry::{Registry, RegistryError};
pub use suite::{DistroSeries, Pocket, SeriesStatus, SuiteNotFound};

/// A distribution such as `ubuntu`, with its series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub series: Vec<DistroSeries>,
    /// Alias (e.g. `devel`) resolving to the series currently under development.
    #[serde(default)]
    pub development_series_alias: Option<String>,
}

impl Distribution {
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchivePurpose {
    Primary,
    Ppa,
    Partner,
    Copy,
}

/// A package archive belonging to exactly one distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archive {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Name of the distribution the archive publishes into.
    pub distribution: String,
    pub purpose: ArchivePurpose,
    /// Owning person or team (PPAs only).
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Archive {
    #[must_use]
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.display_name {
            return name.clone();
        }
        match (self.purpose, &self.owner) {
            (ArchivePurpose::Ppa, Some(owner)) => format!("PPA {} for ~{owner}", self.name),
            (ArchivePurpose::Primary, _) => format!("Primary Archive for {}", self.distribution),
            _ => format!("{} archive for {}", self.name, self.distribution),
        }
    }

    #[must_use]
    pub fn is_ppa(&self) -> bool {
        self.purpose == ArchivePurpose::Ppa
    }
}

/// A person or team that may own PPAs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Person {
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// Lookup service for distributions, archives and people.
///
/// Lookups return owned values: the pipeline holds them for the duration of one
/// changes file and never writes through them.
pub trait ArchiveLookup {
    fn distribution_by_name(&self, name: &str) -> Option<Distribution>;

    fn archive_by_id(&self, id: u64) -> Option<Archive>;

    fn person_by_name(&self, name: &str) -> Option<Person>;

    fn ppa_by_owner_distribution_name(
        &self,
        owner: &Person,
        distribution: &Distribution,
        name: &str,
    ) -> Option<Archive>;

    /// The primary archive of a distribution.
    fn main_archive(&self, distribution: &Distribution) -> Option<Archive>;

    /// All PPAs targeting a distribution, ordered by archive id.
    fn all_ppas(&self, distribution: &Distribution) -> Vec<Archive>;
}
