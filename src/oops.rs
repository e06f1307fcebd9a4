// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Error reports ("OOPSes") for unexpected failures, referenced by id in the logs.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

/// Records an unexpected error and hands back a reference id for operators.
pub trait ErrorReporter {
    fn raising(&self, error: &dyn std::error::Error, context: &[(&str, &str)]) -> String;
}

#[derive(Serialize)]
struct OopsReport<'a> {
    id: &'a str,
    error: String,
    causes: Vec<String>,
    context: BTreeMap<&'a str, &'a str>,
}

/// Reporter producing `OOPS-<uuid>` ids, optionally writing one JSON report per OOPS.
#[derive(Debug, Default, Clone)]
pub struct OopsReporter {
    directory: Option<PathBuf>,
}

impl OopsReporter {
    #[must_use]
    pub fn new(directory: Option<PathBuf>) -> Self {
        Self { directory }
    }
}

impl ErrorReporter for OopsReporter {
    fn raising(&self, error: &dyn std::error::Error, context: &[(&str, &str)]) -> String {
        let id = format!("OOPS-{}", Uuid::new_v4().simple());
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        if let Some(directory) = &self.directory {
            let report = OopsReport {
                id: &id,
                error: error.to_string(),
                causes,
                context: context.iter().copied().collect(),
            };
            let path = directory.join(format!("{id}.json"));
            // Losing the report must not mask the original error.
            let written = serde_json::to_string_pretty(&report)
                .map_err(std::io::Error::other)
                .and_then(|content| {
                    fs::create_dir_all(directory)?;
                    fs::write(&path, content)
                });
            if let Err(e) = written {
                log::warn!("Failed to write {}: {e}", path.display());
            }
        }
        id
    }
}
