use std::fmt;

use serde::Deserialize;
use thiserror::Error;

use super::token::TokenError;
use crate::retry::classifier::Classify;

/// Category of an API failure, derived from the HTTP status of the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    NotFound,
    Unauthorized,
    Forbidden,
    TooManyRequests,
    Conflict,
    Locked,
    Generic,
}

impl From<u16> for ApiErrorKind {
    fn from(status: u16) -> Self {
        match status {
            404 => Self::NotFound,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            429 => Self::TooManyRequests,
            409 => Self::Conflict,
            423 => Self::Locked,
            _ => Self::Generic,
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::NotFound => "not found",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::TooManyRequests => "too many requests",
            Self::Conflict => "conflict",
            Self::Locked => "locked",
            Self::Generic => "api error",
        };
        f.write_str(kind)
    }
}

/// Error body returned by the managed services APIs on non 2xx responses.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    id: Option<String>,
    href: Option<String>,
    code: Option<String>,
    reason: Option<String>,
    operation_id: Option<String>,
}

/// Failure answered by a remote API, decoded once from the status and the response body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} (status {status}{}): {}", code_suffix(.code), reason_or_default(.reason))]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub status: u16,
    pub code: Option<String>,
    pub reason: Option<String>,
    pub href: Option<String>,
    pub id: Option<String>,
    pub operation_id: Option<String>,
}

impl ApiError {
    pub fn new(status: u16) -> Self {
        Self {
            kind: status.into(),
            status,
            code: None,
            reason: None,
            href: None,
            id: None,
            operation_id: None,
        }
    }

    pub fn with_code(self, code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..self
        }
    }

    pub fn with_reason(self, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..self
        }
    }

    /// Decodes the error from a response. Bodies that are not a JSON error document are kept
    /// as the reason.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorBody>(body).ok();
        let Some(parsed) = parsed else {
            let error = Self::new(status);
            let body = body.trim();
            return if body.is_empty() {
                error
            } else {
                error.with_reason(body)
            };
        };
        Self {
            kind: status.into(),
            status,
            code: parsed.code,
            reason: parsed.reason,
            href: parsed.href,
            id: parsed.id,
            operation_id: parsed.operation_id,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ApiErrorKind::NotFound
    }
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref()
        .map(|code| format!(", code {code}"))
        .unwrap_or_default()
}

fn reason_or_default(reason: &Option<String>) -> &str {
    reason.as_deref().unwrap_or("no reason")
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("decoding response: {0}")]
    Decode(String),

    #[error("retrieving access token: {0}")]
    Token(#[from] TokenError),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("could not build the http client: {0}")]
    HttpBuild(String),
}

impl ClientError {
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.api().is_some_and(ApiError::is_not_found)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl Classify for ApiError {
    fn status_code(&self) -> Option<u16> {
        Some(self.status)
    }

    fn error_code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

impl Classify for ClientError {
    fn status_code(&self) -> Option<u16> {
        self.api().map(|err| err.status)
    }

    fn error_code(&self) -> Option<&str> {
        self.api().and_then(|err| err.code.as_deref())
    }

    fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
