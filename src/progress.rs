//! # Progress Emitter
//! Closed event vocabulary for streaming a search to a consumer, plus the
//! guard that lets exactly one terminal event (`complete` or `error`)
//! through.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::model::{ManufacturerResult, Observability, ParsedQuery, ProviderKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "lowercase")]
pub enum ProgressStep {
    Searching {
        #[serde(rename = "providerUsed")]
        provider_used: ProviderKind,
    },
    Deduplicating {
        #[serde(rename = "beforeCount")]
        before_count: usize,
        #[serde(rename = "afterCount")]
        after_count: usize,
    },
    Filtering {
        #[serde(rename = "beforeCount")]
        before_count: usize,
        #[serde(rename = "afterCount")]
        after_count: usize,
        #[serde(rename = "filtersApplied")]
        filters_applied: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    Parsed {
        #[serde(rename = "parsedQuery")]
        parsed_query: ParsedQuery,
    },
    Progress(ProgressStep),
    Result {
        manufacturer: ManufacturerResult,
    },
    Complete {
        #[serde(rename = "searchId")]
        search_id: String,
        #[serde(rename = "totalResults")]
        total_results: usize,
        observability: Observability,
    },
    Error {
        message: String,
    },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Complete { .. } | ProgressEvent::Error { .. })
    }
}

/// Consumer side. Delivery is best-effort; a gone consumer never fails the
/// search.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl ProgressSink for UnboundedSender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        if self.send(event).is_err() {
            tracing::debug!(target: "pipeline", "progress receiver dropped");
        }
    }
}

/// Buffers events in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl ProgressSink for CollectingSink {
    fn emit(&self, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(event);
    }
}

/// Wraps an optional sink for one search.
pub struct ProgressEmitter<'a> {
    sink: Option<&'a dyn ProgressSink>,
    finished: AtomicBool,
}

impl<'a> ProgressEmitter<'a> {
    pub fn new(sink: Option<&'a dyn ProgressSink>) -> Self {
        Self {
            sink,
            finished: AtomicBool::new(false),
        }
    }

    /// Forward `event` unless a terminal event already went out.
    pub fn emit(&self, event: ProgressEvent) {
        let Some(sink) = self.sink else { return };
        if event.is_terminal() {
            if self.finished.swap(true, Ordering::SeqCst) {
                tracing::warn!(target: "pipeline", "second terminal progress event suppressed");
                return;
            }
        } else if self.finished.load(Ordering::SeqCst) {
            return;
        }
        sink.emit(event);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(m: &str) -> ProgressEvent {
        ProgressEvent::Error { message: m.into() }
    }

    #[test]
    fn only_first_terminal_event_is_delivered() {
        let sink = CollectingSink::new();
        let em = ProgressEmitter::new(Some(&sink));
        em.emit(ProgressEvent::Progress(ProgressStep::Searching {
            provider_used: ProviderKind::Synthetic,
        }));
        em.emit(err("boom"));
        em.emit(err("again"));
        em.emit(ProgressEvent::Progress(ProgressStep::Deduplicating {
            before_count: 1,
            after_count: 1,
        }));
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], err("boom"));
        assert!(em.is_finished());
    }

    #[test]
    fn no_sink_is_a_no_op() {
        let em = ProgressEmitter::new(None);
        em.emit(err("x"));
        assert!(!em.is_finished());
    }

    #[test]
    fn events_serialize_with_type_and_step_tags() {
        let v = serde_json::to_value(ProgressEvent::Progress(ProgressStep::Filtering {
            before_count: 4,
            after_count: 2,
            filters_applied: vec!["minConfidence".into()],
        }))
        .unwrap();
        assert_eq!(v["type"], "progress");
        assert_eq!(v["step"], "filtering");
        assert_eq!(v["beforeCount"], 4);
        assert_eq!(v["filtersApplied"][0], "minConfidence");
    }

    #[tokio::test]
    async fn channel_sink_delivers_in_order() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let em = ProgressEmitter::new(Some(&tx));
        em.emit(ProgressEvent::Progress(ProgressStep::Searching {
            provider_used: ProviderKind::Primary,
        }));
        em.emit(err("done"));
        drop(em);
        drop(tx);
        let mut got = Vec::new();
        while let Some(e) = rx.recv().await {
            got.push(e);
        }
        assert_eq!(got.len(), 2);
        assert!(got[1].is_terminal());
    }
}
