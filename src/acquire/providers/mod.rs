// src/acquire/providers/mod.rs
pub mod actor;
pub mod synthetic;
pub mod web_scrape;

use std::sync::Arc;

use crate::acquire::poll::PollPolicy;
use crate::acquire::types::SupplierProvider;
use crate::config::sourcing::SourcingConfig;
use crate::config::resolve_secret;

pub use actor::ActorProvider;
pub use synthetic::SyntheticProvider;
pub use web_scrape::WebScrapeProvider;

/// Build the provider chain in priority order: actor, web scrape, synthetic.
/// Disabled providers are left out.
pub fn build_chain(cfg: &SourcingConfig) -> Vec<Arc<dyn SupplierProvider>> {
    let policy = PollPolicy {
        interval: cfg.acquire.poll_interval(),
        max_wait: cfg.acquire.max_wait(),
    };
    let p = &cfg.providers;
    let mut chain: Vec<Arc<dyn SupplierProvider>> = Vec::new();

    if p.actor.enabled {
        chain.push(Arc::new(ActorProvider::new(
            &p.actor.base_url,
            resolve_secret(&p.actor.token, "APIFY_TOKEN"),
            p.actor.actor_id.clone(),
            policy,
        )));
    }
    if p.web_scrape.enabled {
        chain.push(Arc::new(WebScrapeProvider::new(
            &p.web_scrape.base_url,
            resolve_secret(&p.web_scrape.api_key, "FIRECRAWL_API_KEY"),
            p.web_scrape.search_url_template.clone(),
            policy,
        )));
    }
    if p.synthetic.enabled {
        chain.push(Arc::new(SyntheticProvider::new(p.synthetic.count)));
    }

    tracing::info!(
        target: "acquire",
        providers = ?chain.iter().map(|p| p.name()).collect::<Vec<_>>(),
        "provider chain built"
    );
    chain
}
