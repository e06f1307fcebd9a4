// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

use thiserror::Error;

/// The upload path does not name a distribution upload target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct UploadPathError(pub String);

/// The upload path names a PPA target that cannot take the upload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PpaUploadPathError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error(transparent)]
    Upload(#[from] UploadPathError),
    #[error(transparent)]
    Ppa(#[from] PpaUploadPathError),
}

impl LocationError {
    /// Operator hint appended to the rejection text.
    #[must_use]
    pub fn hint(&self) -> &'static str {
        match self {
            LocationError::Upload(_) => "Please update your dput/dupload configuration and then re-upload.",
            LocationError::Ppa(_) => {
                "Please check the PPA upload documentation and update your configuration."
            }
        }
    }

    /// Rejection text for an upload whose path could not be classified.
    #[must_use]
    pub fn rejection_text(&self, upload_path: &str) -> String {
        format!(
            "Failed to process the upload path '{upload_path}':\n\n\
             {self}\n\n\
             It is likely that you have a configuration problem with dput/dupload.\n\
             {}\n",
            self.hint()
        )
    }
}

/// Error constructor for the failure kind a path shape reports.
pub(crate) type PathErrorKind = fn(String) -> LocationError;

pub(crate) fn upload_path_error(message: String) -> LocationError {
    LocationError::Upload(UploadPathError(message))
}

pub(crate) fn ppa_upload_path_error(message: String) -> LocationError {
    LocationError::Ppa(PpaUploadPathError(message))
}
