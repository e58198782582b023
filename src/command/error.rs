use std::fmt::Debug;
use std::io;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("could not start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("{0} not piped")]
    StreamPipeError(String),

    #[error("stdin of `{0}` is already closed")]
    StdinClosed(String),

    #[error("{0}")]
    IOError(#[from] io::Error),

    #[error("`{command}` did not complete within {timeout:?}\nstdout: {stdout}\nstderr: {stderr}")]
    Timeout {
        command: String,
        timeout: Duration,
        stdout: String,
        stderr: String,
    },

    #[error("`{command}` exited with code {exit_code:?}\nstdout: {stdout}\nstderr: {stderr}")]
    Failed {
        command: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

impl ProcessError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Output captured before the failure, as `(stdout, stderr)`.
    pub fn output(&self) -> Option<(&str, &str)> {
        match self {
            Self::Timeout { stdout, stderr, .. } | Self::Failed { stdout, stderr, .. } => {
                Some((stdout, stderr))
            }
            _ => None,
        }
    }
}
