use std::str::FromStr;

use thiserror::Error;
use tracing::metadata::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::PrettyFields;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("invalid log level `{0}`")]
    InvalidLevel(String),

    #[error("init logging error: `{0}`")]
    TryInitError(String),
}

pub struct Logging;

impl Logging {
    /// Installs the global subscriber. `level` is the default directive, `RUST_LOG` still
    /// takes precedence for the targets it names.
    pub fn try_init(level: &str) -> Result<(), LoggingError> {
        let level = parse_level(level)?;
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::builder()
                    .with_default_directive(level.into())
                    .from_env_lossy(),
            )
            .fmt_fields(PrettyFields::new())
            .try_init()
            .map_err(|_| {
                LoggingError::TryInitError("unable to set global logging subscriber".to_string())
            })
    }
}

fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    LevelFilter::from_str(level.trim()).map_err(|_| LoggingError::InvalidLevel(level.to_string()))
}
