// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Suite names (`<series>[-<pocket>]`) and their resolution against a distribution.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::Distribution;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pocket {
    Release,
    Security,
    Updates,
    Proposed,
    Backports,
}

impl Pocket {
    const SUFFIXED: [Pocket; 4] = [
        Pocket::Security,
        Pocket::Updates,
        Pocket::Proposed,
        Pocket::Backports,
    ];

    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Pocket::Release => "",
            Pocket::Security => "-security",
            Pocket::Updates => "-updates",
            Pocket::Proposed => "-proposed",
            Pocket::Backports => "-backports",
        }
    }

    /// Split a suite name into its series name and pocket.
    #[must_use]
    pub fn split_suite(suite: &str) -> (&str, Pocket) {
        Self::SUFFIXED
            .iter()
            .find_map(|pocket| {
                suite
                    .strip_suffix(pocket.suffix())
                    .filter(|series| !series.is_empty())
                    .map(|series| (series, *pocket))
            })
            .unwrap_or((suite, Pocket::Release))
    }
}

impl fmt::Display for Pocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Pocket::Release => "RELEASE",
            Pocket::Security => "SECURITY",
            Pocket::Updates => "UPDATES",
            Pocket::Proposed => "PROPOSED",
            Pocket::Backports => "BACKPORTS",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesStatus {
    Experimental,
    Development,
    Frozen,
    #[default]
    Current,
    Supported,
    Obsolete,
}

impl SeriesStatus {
    /// Series that have not been released yet only take uploads to the release pocket.
    #[must_use]
    pub fn is_pre_release(self) -> bool {
        matches!(
            self,
            SeriesStatus::Experimental | SeriesStatus::Development | SeriesStatus::Frozen
        )
    }
}

impl fmt::Display for SeriesStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SeriesStatus::Experimental => "EXPERIMENTAL",
            SeriesStatus::Development => "DEVELOPMENT",
            SeriesStatus::Frozen => "FROZEN",
            SeriesStatus::Current => "CURRENT",
            SeriesStatus::Supported => "SUPPORTED",
            SeriesStatus::Obsolete => "OBSOLETE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistroSeries {
    pub name: String,
    #[serde(default)]
    pub status: SeriesStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Could not find suite '{suite}' in distribution '{distribution}'")]
pub struct SuiteNotFound {
    pub distribution: String,
    pub suite: String,
}

impl Distribution {
    /// Look up a series by name, optionally following the development series alias.
    #[must_use]
    pub fn series_by_name(&self, name: &str, follow_aliases: bool) -> Option<&DistroSeries> {
        if let Some(series) = self.series.iter().find(|series| series.name == name) {
            return Some(series);
        }
        if follow_aliases && self.development_series_alias.as_deref() == Some(name) {
            return self.development_series();
        }
        None
    }

    #[must_use]
    pub fn development_series(&self) -> Option<&DistroSeries> {
        self.series.iter().find(|series| {
            matches!(
                series.status,
                SeriesStatus::Development | SeriesStatus::Experimental
            )
        })
    }

    /// Resolve a suite name to a series and pocket, following aliases.
    ///
    /// # Errors
    /// Returns `SuiteNotFound` if the series part does not name a series of this distribution.
    pub fn resolve_suite(&self, suite: &str) -> Result<(&DistroSeries, Pocket), SuiteNotFound> {
        let (series_name, pocket) = Pocket::split_suite(suite);
        self.series_by_name(series_name, true)
            .map(|series| (series, pocket))
            .ok_or_else(|| SuiteNotFound {
                distribution: self.name.clone(),
                suite: suite.to_string(),
            })
    }
}
