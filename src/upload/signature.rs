// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Checks inline signatures of changes files with `gpgv`.

use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use wait_timeout::ChildExt;

use crate::changes::ProcessError;
use crate::interrupt::Interrupted;

const SIGINT: i32 = 2;
const SIGTERM: i32 = 15;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Command not found: {command} (changes file: {path:?})")]
    NotFound { command: String, path: PathBuf },
    #[error("Command failed: {command} (changes file: {path:?})")]
    Failed {
        command: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Command timed out after {timeout:?}: {command} (changes file: {path:?})")]
    Timeout {
        command: String,
        path: PathBuf,
        timeout: Duration,
    },
    #[error("Command terminated by signal {signal}: {command} (changes file: {path:?})")]
    Signalled {
        command: String,
        path: PathBuf,
        signal: i32,
    },
}

/// Wait for `child`, killing it once `timeout` has passed.
fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
    command: &str,
    path: &Path,
) -> Result<ExitStatus, CommandError> {
    let status = child
        .wait_timeout(timeout)
        .map_err(|e| CommandError::Failed {
            command: command.to_string(),
            path: path.to_path_buf(),
            source: e,
        })?;
    let Some(status) = status else {
        let _ = child.kill();
        let _ = child.wait();
        return Err(CommandError::Timeout {
            command: command.to_string(),
            path: path.to_path_buf(),
            timeout,
        });
    };
    match (status.code(), status.signal()) {
        (Some(_), _) => Ok(status),
        (None, Some(signal)) => Err(CommandError::Signalled {
            command: command.to_string(),
            path: path.to_path_buf(),
            signal,
        }),
        (None, None) => Err(CommandError::Failed {
            command: command.to_string(),
            path: path.to_path_buf(),
            source: std::io::Error::other("Unknown process termination"),
        }),
    }
}

/// Runs `gpgv` against a fixed keyring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureVerifier {
    program: String,
    leading_args: Vec<String>,
    keyring: PathBuf,
    timeout: Duration,
}

impl SignatureVerifier {
    #[must_use]
    pub fn new(keyring: PathBuf, timeout: Duration) -> Self {
        Self {
            program: "gpgv".to_string(),
            leading_args: Vec::new(),
            keyring,
            timeout,
        }
    }

    /// Run `program` with `leading_args` in place of `gpgv`; the keyring and file
    /// arguments follow.
    #[must_use]
    pub fn with_command(mut self, program: impl Into<String>, leading_args: &[&str]) -> Self {
        self.program = program.into();
        self.leading_args = leading_args.iter().map(ToString::to_string).collect();
        self
    }

    /// Whether `path` carries a good signature from a key in the keyring.
    ///
    /// # Errors
    /// Returns `ProcessError::Interrupted` if the checker was stopped by SIGINT or
    /// SIGTERM, and `ProcessError::Unexpected` if it could not be run at all.
    pub fn verify(&self, path: &Path) -> Result<bool, ProcessError> {
        log::debug!("Verifying signature of {} with {}", path.display(), self.program);
        let status = self.run(path).map_err(|e| match e {
            CommandError::Signalled { signal, .. } if matches!(signal, SIGINT | SIGTERM) => {
                ProcessError::Interrupted(Interrupted)
            }
            other => ProcessError::Unexpected(other.into()),
        })?;
        Ok(status.success())
    }

    fn run(&self, path: &Path) -> Result<ExitStatus, CommandError> {
        let mut child = Command::new(&self.program)
            .args(&self.leading_args)
            .arg("--keyring")
            .arg(&self.keyring)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    CommandError::NotFound {
                        command: self.program.clone(),
                        path: path.to_path_buf(),
                    }
                } else {
                    CommandError::Failed {
                        command: self.program.clone(),
                        path: path.to_path_buf(),
                        source: e,
                    }
                }
            })?;
        wait_with_timeout(&mut child, self.timeout, &self.program, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(body: &str, timeout: Duration) -> SignatureVerifier {
        SignatureVerifier::new(PathBuf::from("/nonexistent/keyring.gpg"), timeout)
            .with_command("sh", &["-c", body, "fake-gpgv"])
    }

    #[test]
    fn test_exit_status_decides() {
        let changes = Path::new("foo.changes");
        assert!(shell("exit 0", Duration::from_secs(5)).verify(changes).unwrap());
        assert!(!shell("exit 1", Duration::from_secs(5)).verify(changes).unwrap());
    }

    #[test]
    fn test_arguments() {
        let check = r#"[ "$1" = --keyring ] && [ "$2" = /nonexistent/keyring.gpg ] && [ "$3" = foo.changes ]"#;
        assert!(shell(check, Duration::from_secs(5))
            .verify(Path::new("foo.changes"))
            .unwrap());
    }

    #[test]
    fn test_missing_program_is_unexpected() {
        let verifier = SignatureVerifier::new(PathBuf::from("keyring.gpg"), Duration::from_secs(5))
            .with_command("/nonexistent/gpgv", &[]);
        let result = verifier.verify(Path::new("foo.changes"));
        let Err(ProcessError::Unexpected(error)) = result else {
            panic!("expected an unexpected error");
        };
        assert!(error.to_string().starts_with("Command not found"));
    }

    #[test]
    fn test_sigterm_is_interruption() {
        let result = shell("kill -TERM $$", Duration::from_secs(5)).verify(Path::new("foo.changes"));
        assert!(matches!(result, Err(ProcessError::Interrupted(_))));
    }

    #[test]
    fn test_other_signals_are_unexpected() {
        let result = shell("kill -KILL $$", Duration::from_secs(5)).verify(Path::new("foo.changes"));
        assert!(matches!(result, Err(ProcessError::Unexpected(_))));
    }

    #[test]
    fn test_timeout_is_unexpected() {
        let result = shell("exec sleep 10", Duration::from_millis(100)).verify(Path::new("foo.changes"));
        let Err(ProcessError::Unexpected(error)) = result else {
            panic!("expected a timeout");
        };
        assert!(error.to_string().starts_with("Command timed out"));
    }
}
