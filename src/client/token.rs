use std::sync::{Mutex, PoisonError};

use reqwest::blocking::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const DEFAULT_SSO_TOKEN_URL: &str =
    "https://sso.redhat.com/auth/realms/redhat-external/protocol/openid-connect/token";
pub const DEFAULT_SSO_CLIENT_ID: &str = "rhsm-api";

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("requesting token: {0}")]
    Request(String),

    #[error("token endpoint answered {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("decoding token response: {0}")]
    Decode(String),
}

/// Exchanges a long lived credential for a short lived access token.
#[cfg_attr(test, mockall::automock)]
pub trait TokenRetriever {
    fn retrieve(&self) -> Result<String, TokenError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Obtains access tokens from the SSO server with the `refresh_token` grant.
pub struct SsoTokenRetriever {
    client: Client,
    token_url: Url,
    client_id: String,
    offline_token: String,
}

impl SsoTokenRetriever {
    pub fn new(
        client: Client,
        token_url: Url,
        client_id: impl Into<String>,
        offline_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token_url,
            client_id: client_id.into(),
            offline_token: offline_token.into(),
        }
    }
}

impl TokenRetriever for SsoTokenRetriever {
    fn retrieve(&self) -> Result<String, TokenError> {
        debug!(token_url = %self.token_url, "requesting a new access token");
        let response = self
            .client
            .post(self.token_url.clone())
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("refresh_token", self.offline_token.as_str()),
            ])
            .send()
            .map_err(|err| TokenError::Request(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|err| TokenError::Request(err.to_string()))?;
        if !status.is_success() {
            return Err(TokenError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|err| TokenError::Decode(err.to_string()))?;
        Ok(token.access_token)
    }
}

/// Holds the current access token and hands it out until it is invalidated.
///
/// The cache is owned by one API client. A token is only renewed after
/// [TokenCache::invalidate], which the client calls when the server answers 401.
pub struct TokenCache<R> {
    retriever: R,
    token: Mutex<Option<String>>,
}

impl<R: TokenRetriever> TokenCache<R> {
    pub fn new(retriever: R) -> Self {
        Self {
            retriever,
            token: Mutex::new(None),
        }
    }

    pub fn get(&self) -> Result<String, TokenError> {
        let mut token = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = token.as_ref() {
            return Ok(token.clone());
        }
        let fresh = self.retriever.retrieve()?;
        *token = Some(fresh.clone());
        Ok(fresh)
    }

    pub fn invalidate(&self) {
        debug!("invalidating cached access token");
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
