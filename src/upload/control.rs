// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! The deb822 paragraph of a changes file, read through `deb822-lossless`.

use deb822_lossless::pgp::strip_pgp_signature;
use deb822_lossless::Deb822;
use std::str::FromStr;

const SIGNED_HEADER: &str = "-----BEGIN PGP SIGNED MESSAGE-----";

/// Fields of a changes file, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlFile {
    fields: Vec<(String, String)>,
    signed: bool,
}

impl ControlFile {
    /// Value of a field, matched case-insensitively. Continuation lines are joined with `\n`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Whether the paragraph was wrapped in a PGP signed message.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// Parse `text`. Only the first paragraph is kept.
    ///
    /// # Errors
    /// Returns a description of the problem for broken armor, malformed lines,
    /// duplicate fields and empty paragraphs.
    pub fn parse(text: &str) -> Result<Self, String> {
        let signed = text.trim_start().starts_with(SIGNED_HEADER);
        let body = if signed {
            let (body, signature) = strip_pgp_signature(text.trim_start())
                .map_err(|e| format!("Invalid PGP armor: {e:?}"))?;
            if signature.is_none() {
                return Err("Unterminated PGP signature".to_string());
            }
            unescape(&body)
        } else {
            text.to_string()
        };

        let body = body.trim_start_matches(['\r', '\n']);
        if body.trim().is_empty() {
            return Err("empty paragraph".to_string());
        }
        let document =
            Deb822::from_str(body).map_err(|e| format!("Invalid control data: {e:?}"))?;
        let Some(paragraph) = document.paragraphs().next() else {
            return Err("empty paragraph".to_string());
        };

        let mut fields: Vec<(String, String)> = Vec::new();
        for (name, value) in paragraph.items() {
            if fields.iter().any(|(key, _)| key.eq_ignore_ascii_case(&name)) {
                return Err(format!("Duplicate field {name}"));
            }
            fields.push((name, normalize(&value)));
        }
        if fields.is_empty() {
            return Err("empty paragraph".to_string());
        }
        Ok(Self { fields, signed })
    }
}

/// Undo the dash-escaping of a clearsigned body.
fn unescape(body: &str) -> String {
    body.lines()
        .map(|line| line.strip_prefix("- ").unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Trim every line of a field value and drop the empty first line of multiline fields.
fn normalize(value: &str) -> String {
    value
        .lines()
        .map(str::trim)
        .skip_while(|line| line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{changes_text, signed};

    #[test]
    fn test_unsigned_paragraph() {
        let control = ControlFile::parse("Source: foo\nVersion: 1.0-1\n").unwrap();
        assert_eq!(control.get("source"), Some("foo"));
        assert_eq!(control.get("Version"), Some("1.0-1"));
        assert!(!control.is_signed());
    }

    #[test]
    fn test_continuation_lines() {
        let text = changes_text("foo", "source", "breezy", &[" abc 3 foo.dsc".to_string()]);
        let control = ControlFile::parse(&text).unwrap();
        assert_eq!(control.get("Checksums-Sha256"), Some("abc 3 foo.dsc"));
        assert_eq!(
            control.get("Changes"),
            Some("foo (1.0-1) breezy; urgency=low\n.\n* Initial release.")
        );
    }

    #[test]
    fn test_signed_paragraph() {
        let text = signed("Source: foo\n- Version: 1.0-1\n");
        let control = ControlFile::parse(&text).unwrap();
        assert!(control.is_signed());
        assert_eq!(control.get("Source"), Some("foo"));
        assert_eq!(control.get("Version"), Some("1.0-1"));
        assert!(control.get("Hash").is_none());
    }

    #[test]
    fn test_unterminated_signature() {
        let text = "-----BEGIN PGP SIGNED MESSAGE-----\nHash: SHA256\n\nSource: foo\n";
        assert!(ControlFile::parse(text).is_err());
    }

    #[test]
    fn test_empty() {
        assert_eq!(ControlFile::parse("\n\n").unwrap_err(), "empty paragraph");
    }

    #[test]
    fn test_malformed_line() {
        assert!(ControlFile::parse("Source: foo\nnot a field\n")
            .unwrap_err()
            .starts_with("Invalid control data"));
    }

    #[test]
    fn test_duplicate_field() {
        assert_eq!(
            ControlFile::parse("Source: foo\nsource: bar\n").unwrap_err(),
            "Duplicate field source"
        );
    }

    #[test]
    fn test_second_paragraph_ignored() {
        let control = ControlFile::parse("Source: foo\n\nSource: bar\n").unwrap();
        assert_eq!(control.get("Source"), Some("foo"));
    }
}
