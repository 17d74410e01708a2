//! Manufacturer sourcing service: binary entrypoint.
//! Loads configuration, builds the search pipeline, starts the cache sweeper
//! and serves the Axum router (plus `/metrics`) on Shuttle.

use std::sync::Arc;
use std::time::Duration;

use manufacturer_sourcing::cache::spawn_sweeper;
use manufacturer_sourcing::config::{LlmConfig, SourcingConfig};
use manufacturer_sourcing::metrics::Metrics;
use manufacturer_sourcing::{router, AppState, SearchPipeline};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default, JSON lines with `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("manufacturer_sourcing=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // Shuttle may already have installed a subscriber; keep theirs if so.
    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already set");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let sourcing = SourcingConfig::load_default()?;
    let llm = LlmConfig::load_default()?;

    let pipeline = Arc::new(SearchPipeline::from_config(&sourcing, &llm));
    tracing::info!(
        providers = ?pipeline.provider_names(),
        cache_ttl_secs = sourcing.cache.ttl_secs,
        "search pipeline ready"
    );

    spawn_sweeper(
        pipeline.search_cache(),
        Duration::from_secs(sourcing.cache.sweep_interval_secs),
    );

    let mut app = router(AppState::new(pipeline));
    match Metrics::init(sourcing.cache.ttl_secs) {
        Ok(m) => app = app.merge(m.router()),
        Err(e) => tracing::warn!(error = %e, "metrics exporter disabled"),
    }

    Ok(app.into())
}
