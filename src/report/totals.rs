// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

use serde::Serialize;

/// Number of uploads per disposition in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    pub accepted: usize,
    pub rejected: usize,
    pub failed: usize,
    pub deferred: usize,
    pub skipped: usize,
}

impl RunTotals {
    #[must_use]
    pub fn total(&self) -> usize {
        self.accepted + self.rejected + self.failed + self.deferred + self.skipped
    }
}
