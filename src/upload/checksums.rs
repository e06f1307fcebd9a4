// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! `Checksums-Sha256` entries and their verification against the uploaded files.

use anyhow::{Context, Result};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumEntry {
    pub sha256: String,
    pub size: u64,
    pub name: String,
}

/// Parse the lines of a `Checksums-Sha256` field.
///
/// # Errors
/// Returns the rejection text for the first malformed line.
pub fn parse_checksums(field: &str) -> Result<Vec<ChecksumEntry>, String> {
    field
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let malformed = || format!("Wrong number of fields in Checksums-Sha256 line: {line:?}");
            let mut tokens = line.split_whitespace();
            let (Some(sha256), Some(size), Some(name), None) =
                (tokens.next(), tokens.next(), tokens.next(), tokens.next())
            else {
                return Err(malformed());
            };
            if sha256.len() != 64 || !sha256.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(format!("Invalid SHA256 checksum for {name}: {sha256:?}"));
            }
            let size = size
                .parse()
                .map_err(|_| format!("Invalid size for {name}: {size:?}"))?;
            Ok(ChecksumEntry {
                sha256: sha256.to_ascii_lowercase(),
                size,
                name: name.to_string(),
            })
        })
        .collect()
}

fn verify_entry(directory: &Path, entry: &ChecksumEntry) -> Result<Option<String>> {
    if entry.name.contains('/') || entry.name == ".." {
        return Ok(Some(format!("{}: invalid filename", entry.name)));
    }
    let path = directory.join(&entry.name);
    let mut file = match File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(Some(format!(
                "File {} mentioned in the changes file was not found.",
                entry.name
            )));
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to open {}", path.display()));
        }
    };
    let mut hasher = Sha256::new();
    let size = io::copy(&mut file, &mut hasher)
        .with_context(|| format!("Failed to hash {}", path.display()))?;
    if size != entry.size {
        return Ok(Some(format!(
            "File {} mentioned in the changes has a size mismatch. {size} != {}",
            entry.name, entry.size
        )));
    }
    let digest = format!("{:x}", hasher.finalize());
    if digest != entry.sha256 {
        return Ok(Some(format!(
            "File {} mentioned in the changes has a SHA256 mismatch. {digest} != {}",
            entry.name, entry.sha256
        )));
    }
    Ok(None)
}

/// Check every entry against the files in `directory`, hashing in parallel.
///
/// Returns one rejection reason per bad file, in entry order.
///
/// # Errors
/// Returns an error if an existing file cannot be read.
pub fn verify_checksums(directory: &Path, entries: &[ChecksumEntry]) -> Result<Vec<String>> {
    let results = entries
        .par_iter()
        .map(|entry| verify_entry(directory, entry))
        .collect::<Result<Vec<_>>>()?;
    Ok(results.into_iter().flatten().collect())
}
