// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Classification of upload paths into a distribution, optional suite and target archive.
//!
//! Accepted shapes, relative to `incoming/<leaf>/`:
//! - `<archive id>[/<distro>[/<suite>]]` (build uploads)
//! - `[<distro>[/<suite>]]` (primary archive)
//! - `~<owner>/<distro>/<ppa>[/<suite>]`, plus the legacy `~<owner>/<ppa>`,
//!   `~<owner>/ubuntu` and `~<owner>/<ppa>/ubuntu[/<suite>]` forms

mod errors;

pub use errors::{LocationError, PpaUploadPathError, UploadPathError};

use errors::{ppa_upload_path_error, upload_path_error, PathErrorKind};

use crate::archive::{Archive, ArchiveLookup, Distribution};

/// Distribution used when the path does not name one.
pub const DEFAULT_DISTRIBUTION: &str = "ubuntu";

/// PPA name used by the legacy nameless PPA layout.
pub const DEFAULT_PPA_NAME: &str = "ppa";

pub type LocationResult<T> = std::result::Result<T, LocationError>;

/// Where an upload is headed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLocation {
    pub distribution: Distribution,
    pub suite: Option<String>,
    pub archive: Archive,
}

fn is_all_digits(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Resolve 0 to 2 path parts into a distribution and an optional suite name.
fn distribution_and_suite(
    parts: &[&str],
    lookup: &dyn ArchiveLookup,
    error: PathErrorKind,
) -> LocationResult<(Distribution, Option<String>)> {
    let (name, suite) = match parts {
        [] | ["", ..] => (DEFAULT_DISTRIBUTION, None),
        [name] => (*name, None),
        [name, suite] => (*name, Some(*suite)),
        _ => return Err(upload_path_error("Path format mismatch.".to_string())),
    };
    let distribution = lookup
        .distribution_by_name(name)
        .ok_or_else(|| error(format!("Could not find distribution '{name}'.")))?;
    let Some(suite) = suite else {
        return Ok((distribution, None));
    };
    if distribution.resolve_suite(suite).is_err() {
        return Err(error(format!("Could not find suite '{suite}'.")));
    }
    Ok((distribution, Some(suite.to_string())))
}

fn classify_ppa(
    parts: &[&str],
    lookup: &dyn ArchiveLookup,
) -> LocationResult<(Distribution, Option<String>, Archive)> {
    let owner_name = parts[0].strip_prefix('~').unwrap_or(parts[0]);
    let owner = lookup.person_by_name(owner_name).ok_or_else(|| {
        ppa_upload_path_error(format!(
            "Could not find person or team named '{owner_name}'."
        ))
    })?;

    let (ppa_name, distro_parts): (&str, Vec<&str>) = match parts {
        [_, second] if *second == DEFAULT_DISTRIBUTION => {
            (DEFAULT_PPA_NAME, vec![DEFAULT_DISTRIBUTION])
        }
        [_, name] => (*name, vec![DEFAULT_DISTRIBUTION]),
        [_, name, distro, rest @ ..] if *distro == DEFAULT_DISTRIBUTION => {
            let mut distro_parts = vec![*distro];
            distro_parts.extend_from_slice(rest);
            (*name, distro_parts)
        }
        [_, distro, name, rest @ ..] => {
            let mut distro_parts = vec![*distro];
            distro_parts.extend_from_slice(rest);
            (*name, distro_parts)
        }
        _ => return Err(upload_path_error("Path format mismatch.".to_string())),
    };

    let (distribution, suite) = distribution_and_suite(&distro_parts, lookup, ppa_upload_path_error)?;
    let archive = lookup
        .ppa_by_owner_distribution_name(&owner, &distribution, ppa_name)
        .ok_or_else(|| {
            ppa_upload_path_error(format!(
                "Could not find a PPA owned by '{}' for '{}' named '{ppa_name}'.",
                owner.display_name(),
                distribution.name
            ))
        })?;
    Ok((distribution, suite, archive))
}

/// Classify the directory part of a changes file path.
///
/// # Errors
/// Returns `LocationError::Upload` for unknown archives, distributions or suites and
/// unrecognised shapes, and `LocationError::Ppa` for unknown owners or PPAs and for
/// targets that are disabled or belong to another distribution.
pub fn classify(relative_path: &str, lookup: &dyn ArchiveLookup) -> LocationResult<UploadLocation> {
    let parts: Vec<&str> = relative_path.split('/').collect();
    let first = parts[0];

    let (distribution, suite, archive) = if is_all_digits(first) {
        let archive_id: u64 = first
            .parse()
            .map_err(|_| upload_path_error(format!("Could not find archive with id={first}.")))?;
        let archive = lookup.archive_by_id(archive_id).ok_or_else(|| {
            upload_path_error(format!("Could not find archive with id={archive_id}."))
        })?;
        let (distribution, suite) = distribution_and_suite(&parts[1..], lookup, upload_path_error)?;
        (distribution, suite, archive)
    } else if !first.starts_with('~') && parts.len() <= 2 {
        let (distribution, suite) = distribution_and_suite(&parts, lookup, upload_path_error)?;
        let archive = lookup.main_archive(&distribution).ok_or_else(|| {
            upload_path_error(format!(
                "Could not find the main archive of '{}'.",
                distribution.name
            ))
        })?;
        (distribution, suite, archive)
    } else if first.starts_with('~') && (2..=4).contains(&parts.len()) {
        classify_ppa(&parts, lookup)?
    } else {
        return Err(upload_path_error("Path format mismatch.".to_string()));
    };

    if !archive.enabled {
        return Err(ppa_upload_path_error(format!(
            "{} is disabled.",
            archive.display_name()
        )));
    }
    if archive.distribution != distribution.name {
        return Err(ppa_upload_path_error(format!(
            "{} only supports uploads to '{}' distribution.",
            archive.display_name(),
            archive.distribution
        )));
    }

    Ok(UploadLocation {
        distribution,
        suite,
        archive,
    })
}
