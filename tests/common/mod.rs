// tests/common/mod.rs
// Scripted collaborators shared by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use manufacturer_sourcing::acquire::providers::SyntheticProvider;
use manufacturer_sourcing::acquire::types::{FetchOptions, ProviderError, SupplierProvider};
use manufacturer_sourcing::acquire::AcquisitionManager;
use manufacturer_sourcing::cache::TtlCache;
use manufacturer_sourcing::classify::{Classifier, NARROW_PRODUCT_RANGE_MAX};
use manufacturer_sourcing::llm::{ChatClient, ChatMessage, ChatOptions, ChatReply, DisabledChat, LlmError};
use manufacturer_sourcing::model::{ProviderKind, RawProviderRecord};
use manufacturer_sourcing::query::QueryParser;
use manufacturer_sourcing::SearchPipeline;

pub const SYNTHETIC_COUNT: usize = 5;

/// Provider that replays a fixed outcome and counts its calls.
pub struct Scripted {
    pub kind: ProviderKind,
    pub rows: Vec<Value>,
    pub error: Option<fn() -> ProviderError>,
    pub incremental: bool,
    pub calls: AtomicUsize,
}

impl Scripted {
    pub fn rows(kind: ProviderKind, rows: Vec<Value>) -> Self {
        Self {
            kind,
            rows,
            error: None,
            incremental: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(kind: ProviderKind, error: fn() -> ProviderError) -> Self {
        Self {
            error: Some(error),
            ..Self::rows(kind, vec![])
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SupplierProvider for Scripted {
    async fn fetch(&self, _q: &str, _o: &FetchOptions) -> Result<Vec<RawProviderRecord>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.error {
            return Err(e());
        }
        Ok(self
            .rows
            .iter()
            .filter_map(|v| v.as_object().cloned())
            .collect())
    }

    fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn incremental(&self) -> bool {
        self.incremental
    }
}

/// Chat client that answers every call with the same text.
pub struct CannedChat(pub &'static str);

#[async_trait]
impl ChatClient for CannedChat {
    async fn chat(&self, _m: &[ChatMessage], _o: ChatOptions) -> Result<ChatReply, LlmError> {
        Ok(ChatReply {
            content: self.0.to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "canned"
    }
}

pub fn pipeline_with(chain: Vec<Arc<dyn SupplierProvider>>, cache_ttl: Duration) -> SearchPipeline {
    SearchPipeline::new(
        QueryParser::new(Arc::new(DisabledChat)),
        AcquisitionManager::new(chain, Duration::from_secs(2), 20),
        Classifier::new(Arc::new(DisabledChat), NARROW_PRODUCT_RANGE_MAX),
        Arc::new(TtlCache::new(cache_ttl)),
    )
}

/// Offline pipeline: synthetic provider only, model disabled.
pub fn offline_pipeline() -> SearchPipeline {
    pipeline_with(
        vec![Arc::new(SyntheticProvider::new(SYNTHETIC_COUNT))],
        Duration::from_secs(3600),
    )
}

pub fn supplier(name: &str, address: &str, factory: bool) -> Value {
    json!({
        "companyName": name,
        "address": address,
        "mainProducts": ["Ball Valves"],
        "hasFactory": factory,
        "contactPhone": "+86 577 8888 0000",
        "email": "sales@example.com",
    })
}
