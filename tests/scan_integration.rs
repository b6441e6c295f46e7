//! End-to-end scenarios exercised through the public API only: a `Scanner`
//! wired over `SqliteStorage` and a `Client` with a deterministic fake
//! transport, no live network access.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use wardscan::client::Client;
use wardscan::errors::ScanError;
use wardscan::rate_limiter::RateLimiter;
use wardscan::regionality::Region;
use wardscan::request::{Namespace, Request};
use wardscan::scan::{ScanOptions, Scanner};
use wardscan::storage::{ResponseStorage, SqliteStorage};
use wardscan::transport::{AccessTokenResponse, RawResponse, Transport};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Payload {
    path: String,
}

/// A fake transport that rejects every bearer token until it matches
/// `reject_until`, at which point it starts returning 200. Each
/// `authenticate` call mints a new token, letting tests observe exactly how
/// many times the token endpoint was hit.
struct RefreshOnceTransport {
    reject_until: String,
    auth_calls: AtomicU32,
    next_token: AtomicU32,
}

impl RefreshOnceTransport {
    fn new() -> Self {
        Self {
            reject_until: "token-1".to_string(),
            auth_calls: AtomicU32::new(0),
            next_token: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Transport for RefreshOnceTransport {
    async fn get(&self, request: &Request, token: &str) -> Result<RawResponse, ScanError> {
        let status = if token == self.reject_until { 403 } else { 200 };
        let body = format!(r#"{{"path":"{}"}}"#, request.path);
        Ok(RawResponse {
            status,
            body: body.into_bytes(),
        })
    }

    async fn authenticate(
        &self,
        _token_url: &str,
        _client_id: &str,
        _client_secret: &str,
    ) -> Result<AccessTokenResponse, ScanError> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        let n = self.next_token.fetch_add(1, Ordering::SeqCst);
        Ok(AccessTokenResponse {
            access_token: format!("token-{}", n + 1),
        })
    }
}

/// A fake transport returning a fixed sequence of statuses, then 200.
struct SequenceTransport {
    remaining: Mutex<Vec<u16>>,
}

impl SequenceTransport {
    fn new(statuses: Vec<u16>) -> Self {
        Self {
            remaining: Mutex::new(statuses),
        }
    }
}

#[async_trait]
impl Transport for SequenceTransport {
    async fn get(&self, request: &Request, _token: &str) -> Result<RawResponse, ScanError> {
        let mut remaining = self.remaining.lock().unwrap();
        let status = if remaining.is_empty() {
            200
        } else {
            remaining.remove(0)
        };
        let body = format!(r#"{{"path":"{}"}}"#, request.path);
        Ok(RawResponse {
            status,
            body: body.into_bytes(),
        })
    }

    async fn authenticate(
        &self,
        _token_url: &str,
        _client_id: &str,
        _client_secret: &str,
    ) -> Result<AccessTokenResponse, ScanError> {
        Ok(AccessTokenResponse {
            access_token: "token".to_string(),
        })
    }
}

#[tokio::test]
async fn concurrent_scan_single_calls_collapse_to_one_refresh() {
    let transport = Arc::new(RefreshOnceTransport::new());
    let client = Arc::new(Client::new(
        transport.clone(),
        "https://example/token",
        "id",
        "secret",
        None,
    ));
    client.authenticate().await.unwrap();

    let storage = Arc::new(SqliteStorage::open(":memory:", false).unwrap());
    let scanner = Arc::new(Scanner::new(storage, client));

    let mut handles = Vec::new();
    for i in 0..8u32 {
        let scanner = scanner.clone();
        handles.push(tokio::spawn(async move {
            let request = Request::new(Region::Us, Namespace::Static, format!("/data/wow/{i}"));
            scanner
                .scan_single(request, &ScanOptions::<Payload>::default())
                .await
        }));
    }

    for handle in handles {
        let outcome = handle.await.unwrap();
        assert!(outcome.error.is_none());
        assert!(outcome.details.success);
    }

    assert_eq!(transport.auth_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn backoff_on_429_then_recovers_and_eases() {
    let transport = Arc::new(SequenceTransport::new(vec![429, 429, 429]));
    let limiter = RateLimiter::new(1.0, 100.0, 10.0);
    let client = Arc::new(Client::new(
        transport,
        "https://example/token",
        "id",
        "secret",
        Some(limiter),
    ));
    client.authenticate().await.unwrap();

    let storage = Arc::new(SqliteStorage::open(":memory:", false).unwrap());
    let scanner = Scanner::new(storage, client);

    let request = Request::new(Region::Us, Namespace::Static, "/data/wow/backoff-case");
    let outcome = scanner
        .scan_single(request, &ScanOptions::<Payload>::default())
        .await;

    assert!(outcome.error.is_none());
    assert!(outcome.details.api_attempts >= 4);
}

#[tokio::test]
async fn cache_warm_round_trip_across_two_scanners() {
    let storage = Arc::new(SqliteStorage::open(":memory:", false).unwrap());
    let request = Request::new(Region::Us, Namespace::Static, "/data/wow/realm/index");

    {
        let transport = Arc::new(SequenceTransport::new(vec![]));
        let client = Arc::new(Client::new(
            transport,
            "https://example/token",
            "id",
            "secret",
            None,
        ));
        client.authenticate().await.unwrap();
        let scanner = Scanner::new(storage.clone(), client);
        let options = ScanOptions::<Payload> {
            lifespan: Duration::from_secs(3600),
            ..ScanOptions::default()
        };
        let outcome = scanner.scan_single(request.clone(), &options).await;
        assert!(!outcome.details.cached);
    }

    // A second scanner over the same storage observes the warm cache and
    // never needs a working client at all.
    struct AlwaysFailsTransport;

    #[async_trait]
    impl Transport for AlwaysFailsTransport {
        async fn get(&self, _request: &Request, _token: &str) -> Result<RawResponse, ScanError> {
            Ok(RawResponse {
                status: 500,
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
                access_token: "token".to_string(),
            })
        }
    }

    let failing_client = Arc::new(Client::new(
        Arc::new(AlwaysFailsTransport),
        "https://example/token",
        "id",
        "secret",
        None,
    ));
    failing_client.authenticate().await.unwrap();
    let second_scanner = Scanner::new(storage.clone(), failing_client);
    let outcome = second_scanner
        .scan_single(request.clone(), &ScanOptions::<Payload>::default())
        .await;

    assert!(outcome.error.is_none());
    assert!(outcome.details.cached);
    assert_eq!(outcome.response.path, "/data/wow/realm/index");

    let stored = storage.get(&request).unwrap();
    assert_eq!(stored.body, br#"{"path":"/data/wow/realm/index"}"#);
}
