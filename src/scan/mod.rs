//! The cache-first dispatcher tying together [`crate::storage`],
//! [`crate::client`], and the [`crate::validate`]/[`crate::repair`]/
//! [`crate::filter`] pipeline into a single typed entry point.

pub mod metrics;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};

use crate::client::Client;
use crate::errors::ScanError;
use crate::filter::FilterChain;
use crate::repair::RepairChain;
use crate::request::Request;
use crate::storage::ResponseStorage;
use crate::transport::Transport;
use crate::validate::Validator;

use self::metrics::{NoopMetrics, ScanMetrics};

const DEFAULT_MAX_RETRIES: u32 = 10;

/// Per-call configuration for a single typed scan.
pub struct ScanOptions<T> {
    /// Validates every decoded payload, cached or freshly fetched.
    pub validator: Option<Arc<dyn Validator<T>>>,
    /// Applied only after the first validation attempt fails.
    pub repairs: RepairChain<T>,
    /// Applied after every successful validation, cached or freshly fetched.
    pub filters: FilterChain<T>,
    /// How long a freshly fetched response stays fresh in storage.
    pub lifespan: std::time::Duration,
}

impl<T> Default for ScanOptions<T> {
    fn default() -> Self {
        Self {
            validator: None,
            repairs: RepairChain::new(),
            filters: FilterChain::new(),
            lifespan: std::time::Duration::default(),
        }
    }
}

/// Diagnostics describing how a [`ScanOutcome`] was produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanDetails {
    /// True when the result was served entirely from storage.
    pub cached: bool,
    /// True when a repair was invoked (cached or freshly fetched path).
    pub repaired: bool,
    /// Total API attempts made across all scanner-level retries.
    pub api_attempts: u32,
    /// Count of non-success HTTP outcomes observed (including 404).
    pub api_errors: u32,
    /// True when the result was ultimately produced without a terminal error.
    pub success: bool,
}

/// The result of scanning a single [`Request`]: the decoded payload, the
/// originating request, its submission-order index, an optional terminal
/// error, and [`ScanDetails`] describing how it was produced.
///
/// `index` is meaningless (always `0`) for [`Scanner::scan_single`]; it only
/// carries submission order for results emitted by [`Scanner::scan`].
pub struct ScanOutcome<T> {
    /// The decoded payload, or `T::default()` when `error` is set.
    pub response: T,
    /// The request this outcome corresponds to.
    pub request: Request,
    /// Submission-order index, for correlating out-of-order bulk results.
    pub index: u64,
    /// The terminal error, if any. `response` is the zero value when set.
    pub error: Option<ScanError>,
    /// Diagnostics describing how this outcome was produced.
    pub details: ScanDetails,
}

/// Cache-first dispatcher over a [`ResponseStorage`] and a [`Client`],
/// generic over the decoded payload type per call.
pub struct Scanner<S: ResponseStorage, C: Transport> {
    storage: Arc<S>,
    client: Arc<Client<C>>,
    max_retries: u32,
    metrics: Arc<dyn ScanMetrics>,
}

impl<S, C> Scanner<S, C>
where
    S: ResponseStorage + 'static,
    C: Transport + 'static,
{
    /// Constructs a scanner over the given storage and client, with
    /// `max_retries=10` and a no-op metrics sink.
    pub fn new(storage: Arc<S>, client: Arc<Client<C>>) -> Self {
        Self {
            storage,
            client,
            max_retries: DEFAULT_MAX_RETRIES,
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Overrides the default API retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Replaces the default no-op metrics sink.
    pub fn with_metrics(mut self, metrics: Arc<dyn ScanMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Tries storage first, then the API. Never returns a cache-miss as an
    /// error: a cache miss or a cache-decode failure silently escalates to
    /// an API fetch.
    pub async fn scan_single<T>(&self, request: Request, options: &ScanOptions<T>) -> ScanOutcome<T>
    where
        T: DeserializeOwned + Serialize + Send + Sync + Default,
    {
        self.metrics.count_request();
        let mut details = ScanDetails::default();

        if let Some(value) = self.build_from_cache(&request, options).await {
            details.cached = true;
            details.success = true;
            self.metrics.count_cache_hit();
            self.metrics.count_success();
            return ScanOutcome {
                response: value,
                request,
                index: 0,
                error: None,
                details,
            };
        }

        match self.build_from_api(&request, options, &mut details).await {
            Ok(value) => {
                details.success = true;
                self.metrics.count_success();
                ScanOutcome {
                    response: value,
                    request,
                    index: 0,
                    error: None,
                    details,
                }
            }
            Err(error) => ScanOutcome {
                response: T::default(),
                request,
                index: 0,
                error: Some(error),
                details,
            },
        }
    }

    /// Bulk entry point: returns a sender to feed requests in and a receiver
    /// that yields [`ScanOutcome`]s in arrival order (not submission order).
    ///
    /// `capacity` sizes every internal channel and, per
    /// `min(max(1, capacity), 100)`, the worker pool — concurrency is an
    /// explicit parameter rather than an incidental property of whatever
    /// channel the caller happens to construct.
    pub fn scan<T>(
        self: Arc<Self>,
        capacity: usize,
        options: ScanOptions<T>,
    ) -> (mpsc::Sender<Request>, mpsc::Receiver<ScanOutcome<T>>)
    where
        T: DeserializeOwned + Serialize + Send + Sync + Default + 'static,
    {
        let bound = capacity.max(1);
        let worker_count = bound.min(100);
        let options = Arc::new(options);

        let (request_tx, request_rx) = mpsc::channel(bound);
        let (api_tx, api_rx) = mpsc::channel::<(u64, Request)>(bound);
        let (result_tx, result_rx) = mpsc::channel(bound);

        let producer = self.clone();
        let producer_options = options.clone();
        let producer_results = result_tx.clone();
        let producer_handle = tokio::spawn(async move {
            producer
                .run_producer(request_rx, api_tx, producer_results, producer_options)
                .await;
        });

        let api_rx = Arc::new(Mutex::new(api_rx));
        let mut worker_handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let worker = self.clone();
            let worker_api_rx = api_rx.clone();
            let worker_options = options.clone();
            let worker_results = result_tx.clone();
            worker_handles.push(tokio::spawn(async move {
                worker
                    .run_worker(worker_api_rx, worker_results, worker_options)
                    .await;
            }));
        }

        // Drop this scan()'s own sender; the channel closes once the
        // producer's and every worker's clone also drop, which happens only
        // after the producer has closed `api_requests` and every worker has
        // drained it — pinning close-upstream -> drain -> close-downstream.
        drop(result_tx);

        tokio::spawn(async move {
            if let Err(error) = producer_handle.await {
                tracing::error!(%error, "scan producer task panicked");
            }
            for handle in worker_handles {
                if let Err(error) = handle.await {
                    tracing::error!(%error, "scan worker task panicked");
                }
            }
        });

        (request_tx, result_rx)
    }

    async fn run_producer<T>(
        self: Arc<Self>,
        mut requests: mpsc::Receiver<Request>,
        api_tx: mpsc::Sender<(u64, Request)>,
        results: mpsc::Sender<ScanOutcome<T>>,
        options: Arc<ScanOptions<T>>,
    ) where
        T: DeserializeOwned + Serialize + Send + Sync + Default,
    {
        let mut next_index: u64 = 0;
        while let Some(request) = requests.recv().await {
            self.metrics.count_request();
            let index = next_index;
            next_index += 1;

            match self.build_from_cache(&request, &options).await {
                Some(value) => {
                    self.metrics.count_cache_hit();
                    self.metrics.count_success();
                    let outcome = ScanOutcome {
                        response: value,
                        request,
                        index,
                        error: None,
                        details: ScanDetails {
                            cached: true,
                            success: true,
                            ..ScanDetails::default()
                        },
                    };
                    if results.send(outcome).await.is_err() {
                        return;
                    }
                }
                None => {
                    if api_tx.send((index, request)).await.is_err() {
                        return;
                    }
                }
            }
        }
        // `api_tx` drops here, closing the channel for the worker pool.
    }

    async fn run_worker<T>(
        self: Arc<Self>,
        api_rx: Arc<Mutex<mpsc::Receiver<(u64, Request)>>>,
        results: mpsc::Sender<ScanOutcome<T>>,
        options: Arc<ScanOptions<T>>,
    ) where
        T: DeserializeOwned + Serialize + Send + Sync + Default,
    {
        loop {
            let next = {
                let mut api_rx = api_rx.lock().await;
                api_rx.recv().await
            };

            let Some((index, request)) = next else {
                break;
            };

            let mut details = ScanDetails::default();
            let outcome = match self.build_from_api(&request, &options, &mut details).await {
                Ok(value) => {
                    details.success = true;
                    self.metrics.count_success();
                    ScanOutcome {
                        response: value,
                        request,
                        index,
                        error: None,
                        details,
                    }
                }
                Err(error) => ScanOutcome {
                    response: T::default(),
                    request,
                    index,
                    error: Some(error),
                    details,
                },
            };

            if results.send(outcome).await.is_err() {
                break;
            }
        }
    }

    /// Decodes and validates a cached body. Returns `None` on a cache miss
    /// *or* any decode/validation/repair/filter failure — both cases
    /// escalate identically to an API fetch.
    async fn build_from_cache<T>(&self, request: &Request, options: &ScanOptions<T>) -> Option<T>
    where
        T: DeserializeOwned + Serialize + Send + Sync,
    {
        let stored = self.storage.get(request).ok()?;
        let mut value: T = serde_json::from_slice(&stored.body).ok()?;

        if let Some(validator) = &options.validator {
            if validator.validate(&value).is_err() {
                if options.repairs.is_empty() {
                    return None;
                }
                options.repairs.apply(&mut value).ok()?;
                validator.validate(&value).ok()?;
            }
        }

        options.filters.apply(&mut value).ok()?;
        Some(value)
    }

    /// Fetches, decodes, validates, repairs, filters, and persists a fresh
    /// response, retrying up to `max_retries` on transport errors and
    /// non-2xx statuses other than 404.
    async fn build_from_api<T>(
        &self,
        request: &Request,
        options: &ScanOptions<T>,
        details: &mut ScanDetails,
    ) -> Result<T, ScanError>
    where
        T: DeserializeOwned + Serialize + Send + Sync,
    {
        let mut last_error = None;

        for _ in 0..self.max_retries {
            let response = match self.client.get(request).await {
                Ok(response) => response,
                Err(error) => {
                    last_error = Some(error);
                    continue;
                }
            };

            details.api_attempts += response.attempts;

            if response.status == 404 {
                details.api_errors += 1;
                self.metrics.count_api_error();
                return Err(ScanError::NotFound);
            }

            if !(200..300).contains(&response.status) {
                details.api_errors += 1;
                self.metrics.count_api_error();
                last_error = Some(ScanError::Http(response.status));
                continue;
            }

            self.metrics.count_api_hit(response.attempts);

            let mut value: T = serde_json::from_slice(&response.body)?;

            if let Some(validator) = &options.validator {
                if let Err(validation_error) = validator.validate(&value) {
                    if options.repairs.is_empty() {
                        return Err(validation_error);
                    }
                    options.repairs.apply(&mut value)?;
                    details.repaired = true;
                    validator.validate(&value)?;
                }
            }

            options.filters.apply(&mut value)?;

            self.storage.store(request, &response.body, options.lifespan)?;

            return Ok(value);
        }

        Err(last_error.unwrap_or(ScanError::Http(0)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use serde::Deserialize;

    use super::*;
    use crate::regionality::Region;
    use crate::request::Namespace;
    use crate::storage::SqliteStorage;
    use crate::transport::{AccessTokenResponse, RawResponse};
    use crate::validate::tag::TagValidator;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Payload {
        path: String,
    }

    struct FakeTransport {
        status_sequence: StdMutex<Vec<u16>>,
        body: Vec<u8>,
        auth_calls: AtomicU32,
    }

    impl FakeTransport {
        fn always_ok(body: &str) -> Self {
            Self {
                status_sequence: StdMutex::new(vec![]),
                body: body.as_bytes().to_vec(),
                auth_calls: AtomicU32::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                status_sequence: StdMutex::new(vec![500, 500, 500, 500, 500, 500, 500, 500, 500, 500]),
                body: b"{}".to_vec(),
                auth_calls: AtomicU32::new(0),
            }
        }

        fn sequence(statuses: Vec<u16>, body: &str) -> Self {
            Self {
                status_sequence: StdMutex::new(statuses),
                body: body.as_bytes().to_vec(),
                auth_calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn get(&self, _request: &Request, _token: &str) -> Result<RawResponse, ScanError> {
            let mut sequence = self.status_sequence.lock().unwrap();
            let status = if sequence.is_empty() {
                200
            } else {
                sequence.remove(0)
            };
            Ok(RawResponse {
                status,
                body: self.body.clone(),
            })
        }

        async fn authenticate(
            &self,
            _token_url: &str,
            _client_id: &str,
            _client_secret: &str,
        ) -> Result<AccessTokenResponse, ScanError> {
            self.auth_calls.fetch_add(1, Ordering::SeqCst);
            Ok(AccessTokenResponse {
                access_token: "token".to_string(),
            })
        }
    }

    fn request() -> Request {
        Request::new(Region::Us, Namespace::Static, "/data/wow/mock/path")
    }

    async fn scanner_with(transport: FakeTransport) -> Scanner<SqliteStorage, FakeTransport> {
        let storage = Arc::new(SqliteStorage::open(":memory:", false).unwrap());
        let client = Arc::new(Client::new(
            Arc::new(transport),
            "https://example/token",
            "id",
            "secret",
            None,
        ));
        client.authenticate().await.unwrap();
        Scanner::new(storage, client)
    }

    #[tokio::test]
    async fn cache_hit_never_touches_the_client() {
        let storage = Arc::new(SqliteStorage::open(":memory:", false).unwrap());
        storage
            .store(&request(), br#"{"path":"/data/wow/mock/path"}"#, std::time::Duration::from_secs(3600))
            .unwrap();
        let client = Arc::new(Client::new(
            Arc::new(FakeTransport::failing()),
            "https://example/token",
            "id",
            "secret",
            None,
        ));
        client.authenticate().await.unwrap();
        let scanner = Scanner::new(storage, client);

        let options = ScanOptions::<Payload>::default();
        let outcome = scanner.scan_single(request(), &options).await;

        assert!(outcome.error.is_none());
        assert!(outcome.details.cached);
        assert!(outcome.details.success);
        assert_eq!(outcome.response.path, "/data/wow/mock/path");
    }

    #[tokio::test]
    async fn cache_miss_fetches_then_caches() {
        let scanner = scanner_with(FakeTransport::always_ok(r#"{"path":"/x"}"#)).await;
        let options = ScanOptions::<Payload>::default();

        let first = scanner
            .scan_single(
                Request::new(Region::Us, Namespace::Static, "/x"),
                &options,
            )
            .await;
        assert!(first.error.is_none());
        assert!(!first.details.cached);
        assert_eq!(first.response.path, "/x");

        let second = scanner
            .scan_single(
                Request::new(Region::Us, Namespace::Static, "/x"),
                &options,
            )
            .await;
        assert!(second.details.cached);
        assert_eq!(second.response.path, "/x");
    }

    #[tokio::test]
    async fn not_found_is_terminal_with_a_single_attempt() {
        let scanner = scanner_with(FakeTransport::sequence(vec![404], "{}")).await;
        let options = ScanOptions::<Payload>::default();
        let outcome = scanner.scan_single(request(), &options).await;

        assert!(matches!(outcome.error, Some(ScanError::NotFound)));
        assert_eq!(outcome.details.api_attempts, 1);
    }

    #[tokio::test]
    async fn repair_fixes_the_decoded_value_but_not_the_cached_bytes() {
        let scanner = scanner_with(FakeTransport::always_ok(r#"{"path":"/"}"#)).await;
        let storage = scanner.storage.clone();

        let validator: Arc<dyn Validator<Payload>> = Arc::new(
            TagValidator::new().rule("path", |p: &Payload| {
                if p.path.len() >= 5 {
                    Ok(())
                } else {
                    Err("too short".to_string())
                }
            }),
        );
        let options = ScanOptions::<Payload> {
            validator: Some(validator),
            repairs: RepairChain::new().push(|value: &mut Payload| {
                value.path = "/data/wow/mock/path".to_string();
                Ok(())
            }),
            filters: FilterChain::new(),
            lifespan: std::time::Duration::from_secs(3600),
        };

        let outcome = scanner.scan_single(request(), &options).await;
        assert!(outcome.error.is_none());
        assert!(outcome.details.repaired);
        assert_eq!(outcome.response.path, "/data/wow/mock/path");

        let stored = storage.get(&request()).unwrap();
        assert_eq!(stored.body, br#"{"path":"/"}"#);
    }

    #[tokio::test]
    async fn bulk_scan_returns_every_submitted_index_exactly_once() {
        let scanner = Arc::new(scanner_with(FakeTransport::always_ok(r#"{"path":"/x"}"#)).await);
        let options = ScanOptions::<Payload>::default();

        let (request_tx, mut result_rx) = scanner.clone().scan(4, options);

        for i in 0..10u32 {
            request_tx
                .send(Request::new(
                    Region::Us,
                    Namespace::Static,
                    format!("/x/{i}"),
                ))
                .await
                .unwrap();
        }
        drop(request_tx);

        let mut indices = Vec::new();
        while let Some(outcome) = result_rx.recv().await {
            indices.push(outcome.index);
        }
        indices.sort();
        assert_eq!(indices, (0..10u64).collect::<Vec<_>>());
    }
}
