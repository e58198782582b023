use std::path::PathBuf;

use regex::Regex;
use thiserror::Error;

use crate::command::ProcessError;
use crate::retry::classifier::Classify;

/// Last `HTTP/x.y NNN` status line printed by the verbose CLI.
const HTTP_STATUS_PATTERN: &str = r"HTTP/\d(?:\.\d)?\s+(\d{3})";
/// Application error codes such as `KAFKAS-MGMT-24` or `SRS-MGMT-2`.
const ERROR_CODE_PATTERN: &str = r"\b([A-Z]+-MGMT-\d+)\b";

#[derive(Error, Debug)]
pub enum CliError {
    #[error("invalid cli binary path `{0}`")]
    InvalidBinary(PathBuf),

    #[error(transparent)]
    Process(ProcessError),

    #[error(
        "`{command}` failed with exit code {}, status {}, code {}\nstdout: {stdout}\nstderr: {stderr}",
        or_unknown(.exit_code), or_unknown(.status), or_unknown(.code)
    )]
    Command {
        command: String,
        exit_code: Option<i32>,
        status: Option<u16>,
        code: Option<String>,
        stdout: String,
        stderr: String,
    },

    #[error("decoding cli output: {0}")]
    Json(#[from] serde_json::Error),
}

fn or_unknown<T: ToString>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unknown".to_string())
}

impl From<ProcessError> for CliError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Failed {
                command,
                exit_code,
                stdout,
                stderr,
            } => {
                let verbose = format!("{stdout}\n{stderr}");
                Self::Command {
                    command,
                    exit_code,
                    status: last_capture(HTTP_STATUS_PATTERN, &verbose)
                        .and_then(|status| status.parse().ok()),
                    code: last_capture(ERROR_CODE_PATTERN, &verbose),
                    stdout,
                    stderr,
                }
            }
            err => Self::Process(err),
        }
    }
}

fn last_capture(pattern: &str, text: &str) -> Option<String> {
    let regex = Regex::new(pattern).ok()?;
    regex
        .captures_iter(text)
        .last()
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

impl CliError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Process(err) if err.is_timeout())
    }
}

impl Classify for CliError {
    fn status_code(&self) -> Option<u16> {
        match self {
            Self::Command { status, .. } => *status,
            _ => None,
        }
    }

    fn error_code(&self) -> Option<&str> {
        match self {
            Self::Command { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
