// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Operator-requested shutdown.
//!
//! Every boundary that converts failures into an upload disposition passes this
//! error through untouched, so an interrupted run never reports a half-processed
//! upload as rejected or failed.

use thiserror::Error;

/// Processing was interrupted by the operator (SIGINT/SIGTERM).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Processing interrupted by operator")]
pub struct Interrupted;
