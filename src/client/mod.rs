//! # Blocking REST client shared by the management and data plane APIs
//!
//! Every call is authenticated with a cached bearer token, non 2xx answers are decoded into
//! [ApiError] and transient failures are retried once.
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, ClientBuilder, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::retry::classifier::is_retryable;
use crate::retry::{DEFAULT_MAX_RETRIES, retry};

pub mod error;
pub mod token;

pub use error::{ApiError, ApiErrorKind, ClientError};
use token::{SsoTokenRetriever, TokenCache, TokenRetriever};

const DEFAULT_CONN_TIMEOUT: Duration = Duration::from_secs(10);

/// Returns a reqwest [ClientBuilder] with the default setup and the provided timeout.
pub fn reqwest_builder_with_timeout(timeout: Duration) -> ClientBuilder {
    Client::builder()
        .use_rustls_tls()
        .timeout(timeout)
        .connect_timeout(DEFAULT_CONN_TIMEOUT.min(timeout))
}

pub fn try_build_http_client(timeout: Duration) -> Result<Client, ClientError> {
    reqwest_builder_with_timeout(timeout)
        .build()
        .map_err(|err| ClientError::HttpBuild(err.to_string()))
}

pub struct ApiClient<R = SsoTokenRetriever> {
    http: Client,
    base_url: Url,
    tokens: TokenCache<R>,
    max_retries: usize,
}

impl<R: TokenRetriever> ApiClient<R> {
    pub fn new(http: Client, base_url: Url, retriever: R) -> Self {
        Self {
            http,
            base_url,
            tokens: TokenCache::new(retriever),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(self, max_retries: usize) -> Self {
        Self {
            max_retries,
            ..self
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends the percent-encoded `segments` to the base url path.
    pub fn endpoint<I, S>(&self, segments: I) -> Result<Url, ClientError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends the request built by `build` and returns the response body.
    ///
    /// A 401 answer invalidates the cached token and the request is sent once more with a
    /// fresh one. Server errors, request timeouts and transport failures are retried.
    pub fn execute<F>(&self, build: F) -> Result<String, ClientError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        retry(
            self.max_retries,
            || self.send_authenticated(&build),
            is_retryable,
        )
    }

    fn send_authenticated<F>(&self, build: &F) -> Result<String, ClientError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut response = self.send(build)?;
        if response.status() == StatusCode::UNAUTHORIZED {
            debug!("renew access token");
            self.tokens.invalidate();
            response = self.send(build)?;
        }

        let status = response.status();
        let body = response.text()?;
        trace!(%status, %body, "response received");
        if !status.is_success() {
            return Err(ApiError::from_response(status.as_u16(), &body).into());
        }
        Ok(body)
    }

    fn send<F>(&self, build: &F) -> Result<Response, ClientError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.tokens.get()?;
        Ok(build(&self.http).bearer_auth(token).send()?)
    }

    pub fn get<T>(&self, url: &Url, query: &[(&str, String)]) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        let body = self.execute(|http| http.get(url.clone()).query(query))?;
        Ok(serde_json::from_str(&body)?)
    }

    pub fn get_text(&self, url: &Url) -> Result<String, ClientError> {
        self.execute(|http| http.get(url.clone()))
    }

    pub fn post<B, T>(&self, url: &Url, query: &[(&str, String)], body: &B) -> Result<T, ClientError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let body = self.execute(|http| http.post(url.clone()).query(query).json(body))?;
        Ok(serde_json::from_str(&body)?)
    }

    pub fn patch<B, T>(&self, url: &Url, body: &B) -> Result<T, ClientError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let body = self.execute(|http| http.patch(url.clone()).json(body))?;
        Ok(serde_json::from_str(&body)?)
    }

    pub fn delete(&self, url: &Url, query: &[(&str, String)]) -> Result<(), ClientError> {
        self.execute(|http| http.delete(url.clone()).query(query))
            .map(|_| ())
    }
}
