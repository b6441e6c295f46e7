//! External configuration surface consumed from a CLI or other runtime
//! collaborator: credentials, the OAuth endpoint, the cache path, and a
//! single `offline` switch that composes two independent lower-level knobs.

use std::sync::Arc;

use async_trait::async_trait;

use crate::client::Client;
use crate::errors::ScanError;
use crate::rate_limiter::RateLimiter;
use crate::request::Request;
use crate::storage::SqliteStorage;
use crate::transport::{AccessTokenResponse, OfflineTransport, RawResponse, ReqwestTransport, Transport};

/// The external inputs a caller supplies to assemble a scanner: OAuth
/// credentials, the cache file path, and whether to run entirely offline.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Blizzard OAuth client ID.
    pub client_id: String,
    /// Blizzard OAuth client secret.
    pub client_secret: String,
    /// Token endpoint, e.g. `https://us.battle.net/oauth/token`.
    pub oauth_token_url: String,
    /// Sqlite cache file path; `:memory:` is valid.
    pub cache_path: String,
    /// Disables network access and cache expiry simultaneously, for replay
    /// against an already-warm cache.
    pub offline: bool,
}

impl ScannerConfig {
    /// Constructs a live (non-offline) configuration.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        oauth_token_url: impl Into<String>,
        cache_path: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            oauth_token_url: oauth_token_url.into(),
            cache_path: cache_path.into(),
            offline: false,
        }
    }

    /// Marks this configuration as offline: network calls are replaced with
    /// a stub 404, and cache entries never expire.
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    /// Builds the client half of the pair, wiring [`AnyTransport::Offline`]
    /// in place of the live reqwest transport when `offline` is set.
    pub fn build_client(&self) -> Client<AnyTransport> {
        let transport = if self.offline {
            AnyTransport::Offline(OfflineTransport)
        } else {
            AnyTransport::Live(ReqwestTransport::default())
        };

        Client::new(
            Arc::new(transport),
            self.oauth_token_url.clone(),
            self.client_id.clone(),
            self.client_secret.clone(),
            Some(RateLimiter::default()),
        )
    }

    /// Builds the storage half of the pair, setting `no_expire` whenever
    /// `offline` is set.
    pub fn build_storage(&self) -> Result<SqliteStorage, ScanError> {
        SqliteStorage::open(&self.cache_path, self.offline)
    }
}

/// Either the live [`ReqwestTransport`] or the stub [`OfflineTransport`],
/// selected once at construction by [`ScannerConfig::build_client`] so the
/// rest of the crate stays generic over a single concrete transport type.
#[derive(Debug, Clone)]
pub enum AnyTransport {
    /// Dispatches real HTTP requests.
    Live(ReqwestTransport),
    /// Returns a stable 404 for every request, performing no network I/O.
    Offline(OfflineTransport),
}

#[async_trait]
impl Transport for AnyTransport {
    async fn get(&self, request: &Request, token: &str) -> Result<RawResponse, ScanError> {
        match self {
            AnyTransport::Live(transport) => transport.get(request, token).await,
            AnyTransport::Offline(transport) => transport.get(request, token).await,
        }
    }

    async fn authenticate(
        &self,
        token_url: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<AccessTokenResponse, ScanError> {
        match self {
            AnyTransport::Live(transport) => {
                transport.authenticate(token_url, client_id, client_secret).await
            }
            AnyTransport::Offline(transport) => {
                transport.authenticate(token_url, client_id, client_secret).await
            }
        }
    }
}
