use thiserror::Error;

use crate::acquire::AcquireError;
use crate::cache::CacheError;

/// The only errors a caller of the pipeline ever sees.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("search not found: {0}")]
    NotFound(String),
    #[error("search failed: {0}")]
    Fatal(String),
}

impl SearchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SearchError::NotFound(_))
    }
}

impl From<AcquireError> for SearchError {
    fn from(e: AcquireError) -> Self {
        SearchError::Fatal(e.to_string())
    }
}

impl From<CacheError> for SearchError {
    fn from(e: CacheError) -> Self {
        SearchError::Fatal(e.to_string())
    }
}
