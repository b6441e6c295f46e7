//! The HTTP boundary the [`crate::client::Client`] drives: a single `get` and
//! a single `authenticate` operation, behind a trait so tests can substitute
//! a deterministic fake for the live [`reqwest`]-backed implementation.

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::ScanError;
use crate::request::Request;

/// The raw result of dispatching a single HTTP GET, before any decoding.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code returned by the server.
    pub status: u16,
    /// Raw response body bytes.
    pub body: Vec<u8>,
}

/// Represents the access token response at the OAuth token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenResponse {
    /// The bearer token used to authenticate subsequent API calls.
    pub access_token: String,
}

/// The transport boundary between the [`crate::client::Client`] and the network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Dispatches an authenticated GET for `request`, binding `token` as a
    /// bearer credential. Transport-level failures (connection reset, DNS,
    /// timeout) are surfaced as [`ScanError::Transport`]; HTTP-level failures
    /// (404, 429, 5xx) are reported via [`RawResponse::status`], not as errors.
    async fn get(&self, request: &Request, token: &str) -> Result<RawResponse, ScanError>;

    /// Exchanges client credentials for a fresh bearer token.
    async fn authenticate(
        &self,
        token_url: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<AccessTokenResponse, ScanError>;
}

/// The live [`Transport`], backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// Constructs a transport from an already-configured reqwest client,
    /// e.g. one with a timeout set via [`reqwest::ClientBuilder`].
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, request: &Request, token: &str) -> Result<RawResponse, ScanError> {
        let response = self
            .http
            .get(request.url())
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(RawResponse { status, body })
    }

    async fn authenticate(
        &self,
        token_url: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<AccessTokenResponse, ScanError> {
        let response = self
            .http
            .post(token_url)
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ScanError::Authentication(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        response
            .json::<AccessTokenResponse>()
            .await
            .map_err(|e| ScanError::Authentication(e.to_string()))
    }
}

/// A [`Transport`] that performs no network I/O: every `get` returns a stable
/// 404, and `authenticate` returns a fixed placeholder token. Used when a
/// scanner is configured for offline replay against an already-warm cache.
#[derive(Debug, Clone, Default)]
pub struct OfflineTransport;

#[async_trait]
impl Transport for OfflineTransport {
    async fn get(&self, _request: &Request, _token: &str) -> Result<RawResponse, ScanError> {
        Ok(RawResponse {
            status: 404,
            body: b"{}".to_vec(),
        })
    }

    async fn authenticate(
        &self,
        _token_url: &str,
        _client_id: &str,
        _client_secret: &str,
    ) -> Result<AccessTokenResponse, ScanError> {
        Ok(AccessTokenResponse {
            access_token: "offline".to_string(),
        })
    }
}
