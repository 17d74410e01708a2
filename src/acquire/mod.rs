// src/acquire/mod.rs
//! Acquisition Manager: walks the provider chain strictly in order and stops
//! at the first provider that returns rows.

pub mod poll;
pub mod providers;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use thiserror::Error;
use tokio::time::Instant;

use crate::metrics::names;
use crate::model::{AttemptOutcome, ProviderAttempt, ProviderKind, RawProviderRecord};
use types::{FetchOptions, ProviderError, SupplierProvider};

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("no provider chain configured")]
    NoProviders,
}

#[derive(Debug, Clone)]
pub struct Acquisition {
    pub records: Vec<RawProviderRecord>,
    pub provider_used: ProviderKind,
    pub provider_name: &'static str,
    pub raw_count: usize,
    pub incremental: bool,
    pub attempts: Vec<ProviderAttempt>,
}

pub struct AcquisitionManager {
    chain: Vec<Arc<dyn SupplierProvider>>,
    timeout: Duration,
    max_items: usize,
}

impl AcquisitionManager {
    pub fn new(chain: Vec<Arc<dyn SupplierProvider>>, timeout: Duration, max_items: usize) -> Self {
        Self {
            chain,
            timeout,
            max_items,
        }
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.chain.iter().map(|p| p.name()).collect()
    }

    /// Try providers in priority order. Errors and empty results both fall
    /// through to the next provider; only an empty chain is fatal. When the
    /// whole chain comes up empty, the last provider tried is reported.
    pub async fn acquire(
        &self,
        query: &str,
        location: Option<&str>,
    ) -> Result<Acquisition, AcquireError> {
        let last = self.chain.last().ok_or(AcquireError::NoProviders)?;
        let opts = FetchOptions {
            location: location.map(str::to_string),
            max_items: self.max_items,
        };

        let mut attempts = Vec::with_capacity(self.chain.len());
        for p in &self.chain {
            let t0 = Instant::now();
            let res = match tokio::time::timeout(self.timeout, p.fetch(query, &opts)).await {
                Ok(r) => r,
                Err(_) => Err(ProviderError::Timeout),
            };
            let elapsed_ms = t0.elapsed().as_millis() as u64;

            let (outcome, records, error) = match res {
                Ok(rows) if !rows.is_empty() => (AttemptOutcome::Records, rows, None),
                Ok(_) => {
                    tracing::info!(target: "acquire", provider = p.name(), "provider returned no records");
                    (AttemptOutcome::Empty, Vec::new(), None)
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(target: "acquire", provider = p.name(), error = %e, "provider unavailable, falling back");
                    (AttemptOutcome::Recoverable, Vec::new(), Some(e.to_string()))
                }
                Err(e) => {
                    tracing::error!(target: "acquire", provider = p.name(), error = %e, "unexpected provider error, falling back");
                    (AttemptOutcome::Unexpected, Vec::new(), Some(e.to_string()))
                }
            };

            counter!(names::PROVIDER_ATTEMPTS, "provider" => p.name(), "outcome" => outcome_label(outcome))
                .increment(1);
            attempts.push(ProviderAttempt {
                provider: p.name().to_string(),
                kind: p.kind(),
                outcome,
                records: records.len(),
                elapsed_ms,
                error,
            });

            if !records.is_empty() {
                tracing::info!(target: "acquire", provider = p.name(), rows = records.len(), elapsed_ms, "provider succeeded");
                return Ok(Acquisition {
                    raw_count: records.len(),
                    records,
                    provider_used: p.kind(),
                    provider_name: p.name(),
                    incremental: p.incremental(),
                    attempts,
                });
            }
        }

        Ok(Acquisition {
            records: Vec::new(),
            provider_used: last.kind(),
            provider_name: last.name(),
            raw_count: 0,
            incremental: false,
            attempts,
        })
    }
}

fn outcome_label(o: AttemptOutcome) -> &'static str {
    match o {
        AttemptOutcome::Records => "records",
        AttemptOutcome::Empty => "empty",
        AttemptOutcome::Recoverable => "recoverable",
        AttemptOutcome::Unexpected => "unexpected",
    }
}
