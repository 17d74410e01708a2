// src/lib.rs
// Public library surface for the server binary and integration tests.

pub mod acquire;
pub mod api;
pub mod cache;
pub mod classify;
pub mod config;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod llm;
pub mod metrics;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod progress;
pub mod query;
pub mod scoring;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::error::SearchError;
pub use crate::model::{
    CachedPage, CachedQuery, ManufacturerResult, SearchFilters, SearchRequest, SearchResponse,
};
pub use crate::pipeline::SearchPipeline;
pub use crate::progress::{ProgressEvent, ProgressSink};
