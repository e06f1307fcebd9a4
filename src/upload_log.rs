// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Per-upload log that forwards to `log` and keeps a copy of every line.

use log::Level;
use std::cell::RefCell;
use std::fmt::Display;

/// Buffered log of one upload. Build uploads store the text against the build.
#[derive(Debug, Default)]
pub struct UploadLog {
    lines: RefCell<Vec<String>>,
}

impl UploadLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, level: Level, message: impl Display) {
        let line = message.to_string();
        log::log!(level, "{line}");
        self.lines.borrow_mut().push(format!("{level}: {line}"));
    }

    pub fn debug(&self, message: impl Display) {
        self.record(Level::Debug, message);
    }

    pub fn info(&self, message: impl Display) {
        self.record(Level::Info, message);
    }

    pub fn warn(&self, message: impl Display) {
        self.record(Level::Warn, message);
    }

    pub fn error(&self, message: impl Display) {
        self.record(Level::Error, message);
    }

    /// Everything logged so far, one line per message.
    #[must_use]
    pub fn contents(&self) -> String {
        let lines = self.lines.borrow();
        let mut text = lines.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contents_keeps_order_and_level() {
        let log = UploadLog::new();
        log.info("Processing upload foo");
        log.warn(format_args!("Build {} is in an unexpected state", 7));
        assert_eq!(
            log.contents(),
            "INFO: Processing upload foo\nWARN: Build 7 is in an unexpected state\n"
        );
    }

    #[test]
    fn test_empty() {
        assert_eq!(UploadLog::new().contents(), "");
    }
}
