use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// Metric names used across the pipeline.
pub mod names {
    pub const SEARCHES: &str = "sourcing_searches_total";
    pub const SEARCH_FAILURES: &str = "sourcing_search_failures_total";
    pub const PROVIDER_ATTEMPTS: &str = "sourcing_provider_attempts_total";
    pub const RECORDS_DROPPED: &str = "sourcing_records_dropped_total";
    pub const CLASSIFY_CACHE_HITS: &str = "sourcing_classification_cache_hits_total";
    pub const CLASSIFY_FALLBACKS: &str = "sourcing_classification_fallbacks_total";
    pub const SEARCH_DURATION_MS: &str = "sourcing_search_duration_ms";
    pub const CACHE_ENTRIES: &str = "sourcing_cache_entries";
    pub const CACHE_EVICTIONS: &str = "sourcing_cache_evictions_total";
}

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(names::SEARCHES, "Searches started.");
        describe_counter!(names::SEARCH_FAILURES, "Searches aborted with a search-level error.");
        describe_counter!(
            names::PROVIDER_ATTEMPTS,
            "Provider calls by provider and outcome."
        );
        describe_counter!(
            names::RECORDS_DROPPED,
            "Provider records dropped during normalization."
        );
        describe_counter!(
            names::CLASSIFY_CACHE_HITS,
            "Classifications served from the memo cache."
        );
        describe_counter!(
            names::CLASSIFY_FALLBACKS,
            "Classifications produced by the heuristic fallback."
        );
        describe_histogram!(names::SEARCH_DURATION_MS, "End-to-end search time in milliseconds.");
        describe_gauge!(names::CACHE_ENTRIES, "Live entries in the search cache.");
        describe_counter!(names::CACHE_EVICTIONS, "Search cache entries removed on expiry.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and publish the configured cache TTL.
    pub fn init(cache_ttl_secs: u64) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;

        ensure_described();
        gauge!("sourcing_cache_ttl_seconds").set(cache_ttl_secs as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
