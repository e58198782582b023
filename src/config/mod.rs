//! Layered configuration: an optional YAML file overridden by `MAS_E2E_` environment variables.
use std::path::{Path, PathBuf};
use std::time::Duration;

use ::config::{Config, Environment, File, FileFormat};
use duration_str::deserialize_duration;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::cli::DEFAULT_CLI_TIMEOUT;
use crate::client::token::{DEFAULT_SSO_CLIENT_ID, DEFAULT_SSO_TOKEN_URL};

/// Eg. `MAS_E2E_SSO__CLIENT_ID=cli` sets `sso.client_id`. Keys are snake_case, so nesting
/// uses a double underscore.
pub const ENV_VAR_PREFIX: &str = "MAS_E2E";

pub const DEFAULT_OPENSHIFT_API_URI: &str = "https://api.openshift.com";
pub const DEFAULT_CLOUD_PROVIDER: &str = "aws";
pub const DEFAULT_KAFKA_REGION: &str = "us-east-1";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Error, Debug)]
pub enum E2eConfigError {
    #[error("loading configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("invalid url `{value}` for `{key}`: {reason}")]
    InvalidUrl {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("`offline_token` is not configured")]
    MissingOfflineToken,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SsoConfig {
    pub token_url: String,
    pub client_id: String,
}

impl Default for SsoConfig {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_SSO_TOKEN_URL.to_string(),
            client_id: DEFAULT_SSO_CLIENT_ID.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct E2eConfig {
    pub offline_token: Option<String>,
    pub openshift_api_uri: String,
    pub sso: SsoConfig,
    pub cloud_provider: String,
    pub default_kafka_region: String,
    pub skip_kafka_teardown: bool,
    pub cli_binary: Option<PathBuf>,
    #[serde(deserialize_with = "deserialize_duration")]
    pub cli_timeout: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub http_timeout: Duration,
    pub log_level: String,
}

impl Default for E2eConfig {
    fn default() -> Self {
        Self {
            offline_token: None,
            openshift_api_uri: DEFAULT_OPENSHIFT_API_URI.to_string(),
            sso: SsoConfig::default(),
            cloud_provider: DEFAULT_CLOUD_PROVIDER.to_string(),
            default_kafka_region: DEFAULT_KAFKA_REGION.to_string(),
            skip_kafka_teardown: false,
            cli_binary: None,
            cli_timeout: DEFAULT_CLI_TIMEOUT,
            http_timeout: Duration::from_secs(30),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl E2eConfig {
    pub fn api_url(&self) -> Result<Url, E2eConfigError> {
        parse_url("openshift_api_uri", &self.openshift_api_uri)
    }

    pub fn sso_token_url(&self) -> Result<Url, E2eConfigError> {
        parse_url("sso.token_url", &self.sso.token_url)
    }

    pub fn offline_token(&self) -> Result<&str, E2eConfigError> {
        self.offline_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or(E2eConfigError::MissingOfflineToken)
    }
}

fn parse_url(key: &'static str, value: &str) -> Result<Url, E2eConfigError> {
    Url::parse(value).map_err(|err| E2eConfigError::InvalidUrl {
        key,
        value: value.to_string(),
        reason: err.to_string(),
    })
}

/// Loads the configuration from `path`, when given, and the environment.
pub fn load(path: Option<&Path>) -> Result<E2eConfig, E2eConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).format(FileFormat::Yaml).required(true));
    }

    Ok(builder
        .add_source(
            Environment::with_prefix(ENV_VAR_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize::<E2eConfig>()?)
}
