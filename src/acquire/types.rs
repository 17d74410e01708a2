// src/acquire/types.rs
use async_trait::async_trait;
use thiserror::Error;

use crate::model::{ProviderKind, RawProviderRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub location: Option<String>,
    pub max_items: usize,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("payment required / quota exceeded: {0}")]
    PaymentRequired(String),
    #[error("timed out")]
    Timeout,
    #[error("remote job ended as {0}")]
    JobFailed(String),
    #[error("http {status}: {message}")]
    Http { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Quota, not-found and timeouts are expected in normal operation.
    /// Everything else is logged as unexpected; both kinds drive fallback.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProviderError::NotFound(_) | ProviderError::PaymentRequired(_) | ProviderError::Timeout
        )
    }

    /// Map a non-success HTTP status into the taxonomy.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            404 => ProviderError::NotFound(body),
            402 | 429 => ProviderError::PaymentRequired(body),
            408 | 504 => ProviderError::Timeout,
            _ => ProviderError::Http {
                status,
                message: body,
            },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_decode() {
            ProviderError::Parse(e.to_string())
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

/// Uniform interface over heterogeneous supplier data sources.
#[async_trait]
pub trait SupplierProvider: Send + Sync {
    async fn fetch(
        &self,
        query: &str,
        opts: &FetchOptions,
    ) -> Result<Vec<RawProviderRecord>, ProviderError>;

    fn name(&self) -> &'static str;

    fn kind(&self) -> ProviderKind;

    /// Providers that surface rows as they arrive get per-record progress events.
    fn incremental(&self) -> bool {
        false
    }
}
