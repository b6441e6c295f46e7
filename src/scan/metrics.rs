//! Counter sinks for scanner outcomes. A no-op sink is the crate default;
//! [`TracingMetrics`] emits structured events instead of exporting to a
//! metrics backend, since no observability export is in scope here.

/// Per-result counters a [`crate::scan::Scanner`] reports to.
pub trait ScanMetrics: Send + Sync {
    /// Called once per request submitted to a scan.
    fn count_request(&self);
    /// Called when a result was served entirely from cache.
    fn count_cache_hit(&self);
    /// Called when a result required an API round trip, with the total attempts made.
    fn count_api_hit(&self, attempts: u32);
    /// Called once per non-2xx (including 404) HTTP outcome encountered.
    fn count_api_error(&self);
    /// Called once per request that ultimately succeeded.
    fn count_success(&self);
}

/// The default [`ScanMetrics`] sink: counts nothing, costs nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl ScanMetrics for NoopMetrics {
    fn count_request(&self) {}
    fn count_cache_hit(&self) {}
    fn count_api_hit(&self, _attempts: u32) {}
    fn count_api_error(&self) {}
    fn count_success(&self) {}
}

/// A [`ScanMetrics`] sink that emits `tracing` events instead of exporting
/// counters to a metrics backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMetrics;

impl ScanMetrics for TracingMetrics {
    fn count_request(&self) {
        tracing::debug!(counter = "scan_requests", "request submitted");
    }

    fn count_cache_hit(&self) {
        tracing::debug!(cached = true, "served from cache");
    }

    fn count_api_hit(&self, attempts: u32) {
        tracing::debug!(counter = "scan_api_attempts", attempts, "served from api");
    }

    fn count_api_error(&self) {
        tracing::warn!(counter = "scan_api_errors", "non-success api outcome");
    }

    fn count_success(&self) {
        tracing::debug!(success = true, "scan result succeeded");
    }
}
