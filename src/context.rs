// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

use crate::archive::ArchiveLookup;
use crate::build::{ArtifactUploader, BuildLookup};
use crate::changes::UploadFactory;
use crate::config::ProcessorConfig;
use crate::notify::Notifier;
use crate::oops::ErrorReporter;

/// Settings and collaborators shared by every stage of a queue pass.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub config: &'a ProcessorConfig,
    pub archives: &'a dyn ArchiveLookup,
    pub builds: &'a dyn BuildLookup,
    pub uploads: &'a dyn UploadFactory,
    pub artifacts: &'a dyn ArtifactUploader,
    pub notifier: &'a dyn Notifier,
    pub oops: &'a dyn ErrorReporter,
}
