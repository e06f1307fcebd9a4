// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Processor settings: the caller-level flags of a queue pass and the optional TOML file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::changes::PolicyKind;

/// Default time `gpgv` may take to check one signature.
pub const DEFAULT_GPGV_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Queue root is not a directory: {0:?}")]
    NotADirectory(PathBuf),
    #[error("Build uploads require the 'buildd' policy context, got '{0}'")]
    BuildsRequireBuilddPolicy(String),
    #[error("The series override must not be empty")]
    EmptySeries,
}

/// Flags controlling one queue pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorConfig {
    pub base_fsroot: PathBuf,
    /// Abort every transaction and leave uploads in place.
    pub dry_run: bool,
    pub no_mails: bool,
    /// Leave processed uploads in `incoming/`.
    pub keep: bool,
    /// Treat leaves as build-farm uploads.
    pub builds: bool,
    pub policy: PolicyKind,
    /// Suite overriding anything derived from the path or the changes file.
    pub suite_override: Option<String>,
}

impl ProcessorConfig {
    #[must_use]
    pub fn new(base_fsroot: PathBuf) -> Self {
        Self {
            base_fsroot,
            dry_run: false,
            no_mails: false,
            keep: false,
            builds: false,
            policy: PolicyKind::default(),
            suite_override: None,
        }
    }

    /// Whether notifications go out for this pass.
    #[must_use]
    pub fn notify(&self) -> bool {
        !(self.no_mails || self.dry_run)
    }

    /// Whether processed uploads stay where they are.
    #[must_use]
    pub fn retains_uploads(&self) -> bool {
        self.keep || self.dry_run
    }

    /// # Errors
    /// Returns the first inconsistency found in the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_fsroot.is_dir() {
            return Err(ConfigError::NotADirectory(self.base_fsroot.clone()));
        }
        if self.builds && self.policy != PolicyKind::BuildDaemon {
            return Err(ConfigError::BuildsRequireBuilddPolicy(
                self.policy.name().to_string(),
            ));
        }
        if self
            .suite_override
            .as_deref()
            .is_some_and(|suite| suite.trim().is_empty())
        {
            return Err(ConfigError::EmptySeries);
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessorSection {
    pub base_fsroot: Option<PathBuf>,
    pub dry_run: Option<bool>,
    pub no_mails: Option<bool>,
    pub keep: Option<bool>,
    pub builds: Option<bool>,
    pub context: Option<PolicyKind>,
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrySection {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SigningSection {
    /// Keyring handed to `gpgv`; signatures are not checked without one.
    pub keyring: Option<PathBuf>,
    pub gpgv_timeout_secs: Option<u64>,
}

impl SigningSection {
    #[must_use]
    pub fn gpgv_timeout(&self) -> Duration {
        self.gpgv_timeout_secs
            .map_or(DEFAULT_GPGV_TIMEOUT, Duration::from_secs)
    }
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct NotificationsSection {
    pub outbox: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct OopsSection {
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct JournalSection {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub level: Option<String>,
}

/// Contents of the TOML configuration file. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub processor: ProcessorSection,
    pub registry: RegistrySection,
    pub signing: SigningSection,
    pub notifications: NotificationsSection,
    pub oops: OopsSection,
    pub journal: JournalSection,
    pub logging: LoggingSection,
}

impl FileConfig {
    /// Load the configuration file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid TOML for this schema.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}
