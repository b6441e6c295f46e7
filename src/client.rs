//! Authenticated, rate-limited GET with retry-on-429 and single-flight
//! re-auth on 403, driving the HTTP boundary described in [`crate::transport`].

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::errors::ScanError;
use crate::rate_limiter::RateLimiter;
use crate::request::Request;
use crate::transport::Transport;

struct AuthState {
    token: Option<String>,
}

/// The result of a single [`Client::get`] call: the response body, its HTTP
/// status, and the number of attempts the call required (including any
/// 429-triggered retries, but not the internal 403 re-auth retry).
#[derive(Debug, Clone)]
pub struct Response {
    /// Raw response body bytes.
    pub body: Vec<u8>,
    /// Final HTTP status code (always non-429 on return).
    pub status: u16,
    /// Number of GET attempts made, including retries after a 429.
    pub attempts: u32,
}

/// A rate-limited, authenticated, retrying API client.
///
/// [`Client::authenticate`] must be called once before [`Client::get`] is used.
pub struct Client<T: Transport> {
    transport: Arc<T>,
    limiter: Option<RateLimiter>,
    token_url: String,
    client_id: String,
    client_secret: String,
    auth: RwLock<AuthState>,
}

impl<T: Transport> Client<T> {
    /// Constructs a client targeting `token_url` with the given client
    /// credentials. Pass `None` for `limiter` to disable rate limiting
    /// entirely (used in tests).
    pub fn new(
        transport: Arc<T>,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        limiter: Option<RateLimiter>,
    ) -> Self {
        Self {
            transport,
            limiter,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth: RwLock::new(AuthState { token: None }),
        }
    }

    /// Requests an initial access token from the OAuth token endpoint using
    /// client credentials. Must be called before [`Client::get`].
    pub async fn authenticate(&self) -> Result<(), ScanError> {
        let response = self
            .transport
            .authenticate(&self.token_url, &self.client_id, &self.client_secret)
            .await?;
        let mut state = self.auth.write().await;
        state.token = Some(response.access_token);
        Ok(())
    }

    /// Performs a single authenticated, rate-limited GET, retrying on 429 and
    /// transparently re-authenticating (single-flight) on 403. Any other
    /// status, including 404, is returned as-is for the caller to interpret.
    pub async fn get(&self, request: &Request) -> Result<Response, ScanError> {
        let mut attempts: u32 = 0;
        let raw = loop {
            if let Some(limiter) = &self.limiter {
                limiter.wait().await;
            }

            let response = self.authenticated_get(request).await?;
            attempts += 1;

            if response.status == 429 {
                tracing::warn!(request = %request, "rate limited, backing off");
                if let Some(limiter) = &self.limiter {
                    limiter.backoff();
                }
                continue;
            }

            break response;
        };

        if attempts <= 1 {
            if let Some(limiter) = &self.limiter {
                limiter.ease_backoff();
            }
        }

        Ok(Response {
            body: raw.body,
            status: raw.status,
            attempts,
        })
    }

    async fn authenticated_get(
        &self,
        request: &Request,
    ) -> Result<crate::transport::RawResponse, ScanError> {
        loop {
            let token = self.current_token().await?;
            let response = self.transport.get(request, &token).await?;

            if response.status == 403 {
                self.refresh_if_unchanged(&token).await?;
                continue;
            }

            return Ok(response);
        }
    }

    async fn current_token(&self) -> Result<String, ScanError> {
        let state = self.auth.read().await;
        state.token.clone().ok_or(ScanError::AccessTokenNotFound)
    }

    /// Refreshes the access token iff it still matches `previous`, enforcing
    /// single-flight refresh under concurrent 403s: the first caller through
    /// the write lock performs the token-endpoint call, everyone after it
    /// observes the already-updated token and skips the call entirely.
    async fn refresh_if_unchanged(&self, previous: &str) -> Result<(), ScanError> {
        let mut state = self.auth.write().await;
        if state.token.as_deref() == Some(previous) {
            tracing::info!("access token rejected, refreshing");
            let response = self
                .transport
                .authenticate(&self.token_url, &self.client_id, &self.client_secret)
                .await?;
            state.token = Some(response.access_token);
        } else {
            tracing::debug!("access token already refreshed by another caller");
        }
        Ok(())
    }
}
