//! # Search Pipeline
//! Composition root. Owns the parser, the acquisition manager, the
//! classifier (with its memo) and the search cache, and runs one search end
//! to end:
//!
//! parse → acquire → normalize → classify + score → dedupe → filter → cache
//!
//! Per-record failures are absorbed and counted; only search-level failures
//! reach the caller as `SearchError`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use sha2::{Digest, Sha256};

use crate::acquire::providers::build_chain;
use crate::acquire::AcquisitionManager;
use crate::cache::TtlCache;
use crate::classify::Classifier;
use crate::config::{LlmConfig, SourcingConfig};
use crate::dedup::dedupe;
use crate::error::SearchError;
use crate::filter::{self, FilterSpec};
use crate::llm::build_chat_client;
use crate::metrics::{ensure_described, names};
use crate::model::{
    CachedPage, CachedQuery, CanonicalManufacturerRecord, ClassificationResult, ManufacturerResult,
    Observability, RawProviderRecord, ResultLinks, SearchRequest, SearchResponse, StageTimings,
};
use crate::normalize::{display_location, normalize};
use crate::progress::{ProgressEmitter, ProgressEvent, ProgressSink, ProgressStep};
use crate::query::QueryParser;

pub type SearchCache = TtlCache<Arc<SearchResponse>>;

/// Upper bound on `limit` for cached pages.
pub const MAX_PAGE_LIMIT: usize = 20;

/// Address shown when nothing about the location is known.
pub const UNKNOWN_ADDRESS: &str = "China";

pub struct SearchPipeline {
    parser: QueryParser,
    acquisition: AcquisitionManager,
    classifier: Classifier,
    cache: Arc<SearchCache>,
}

impl SearchPipeline {
    pub fn new(
        parser: QueryParser,
        acquisition: AcquisitionManager,
        classifier: Classifier,
        cache: Arc<SearchCache>,
    ) -> Self {
        ensure_described();
        Self {
            parser,
            acquisition,
            classifier,
            cache,
        }
    }

    pub fn from_config(cfg: &SourcingConfig, llm: &LlmConfig) -> Self {
        let chat = build_chat_client(llm);
        let acquisition = AcquisitionManager::new(
            build_chain(cfg),
            cfg.acquire.provider_timeout(),
            cfg.acquire.max_items,
        );
        Self::new(
            QueryParser::new(chat.clone()),
            acquisition,
            Classifier::new(chat, cfg.classifier.narrow_range_max),
            Arc::new(TtlCache::new(Duration::from_secs(cfg.cache.ttl_secs))),
        )
    }

    /// Shared handle for the background sweeper.
    pub fn search_cache(&self) -> Arc<SearchCache> {
        self.cache.clone()
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.acquisition.provider_names()
    }

    /// Run one search. Exactly one terminal progress event is emitted.
    pub async fn search(
        &self,
        request: SearchRequest,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<SearchResponse, SearchError> {
        let emitter = ProgressEmitter::new(progress);
        counter!(names::SEARCHES).increment(1);
        let started = Instant::now();

        match self.run(request, &emitter, started).await {
            Ok(resp) => {
                histogram!(names::SEARCH_DURATION_MS).record(started.elapsed().as_millis() as f64);
                emitter.emit(ProgressEvent::Complete {
                    search_id: resp.search_id.clone(),
                    total_results: resp.total_results,
                    observability: resp.observability.clone(),
                });
                Ok(resp)
            }
            Err(e) => {
                counter!(names::SEARCH_FAILURES).increment(1);
                tracing::error!(target: "pipeline", error = %e, "search failed");
                emitter.emit(ProgressEvent::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        request: SearchRequest,
        emitter: &ProgressEmitter<'_>,
        started: Instant,
    ) -> Result<SearchResponse, SearchError> {
        let filters = request.filters.clone().unwrap_or_default();
        if let Some(min) = filters.min_confidence {
            if !(0.0..=1.0).contains(&min) {
                return Err(SearchError::InvalidRequest(format!(
                    "minConfidence must be within [0, 1], got {min}"
                )));
            }
        }

        // 1) Parse (image first when there is no text).
        let t_parse = Instant::now();
        let query = self.resolve_query(&request).await?;
        let qid = fingerprint(&query);
        tracing::info!(target: "pipeline", query_id = %qid, "search started");
        tracing::debug!(target: "pipeline", query_id = %qid, query = %query, "raw query");

        let (parsed, parse_fallback) = self.parser.parse(&query).await;
        let parse_ms = ms(t_parse);
        emitter.emit(ProgressEvent::Parsed {
            parsed_query: parsed.clone(),
        });

        // 2) Acquire.
        let t_acquire = Instant::now();
        let search_term = if parsed.product.trim().is_empty() {
            query.as_str()
        } else {
            parsed.product.as_str()
        };
        let location_hint = filters
            .location
            .iter()
            .chain(parsed.locations.iter())
            .map(|l| l.trim())
            .find(|l| !l.is_empty());
        let acquisition = self.acquisition.acquire(search_term, location_hint).await?;
        let acquire_ms = ms(t_acquire);
        emitter.emit(ProgressEvent::Progress(ProgressStep::Searching {
            provider_used: acquisition.provider_used,
        }));

        // 3) Normalize, classify, score. Sequential on purpose.
        let t_classify = Instant::now();
        let mut dropped = 0usize;
        let mut cache_hits = 0usize;
        let mut fallbacks = 0usize;
        let mut scored = Vec::with_capacity(acquisition.records.len());
        for (idx, raw) in acquisition.records.iter().enumerate() {
            let seller_id = seller_id(acquisition.provider_name, idx, raw);
            let record = match normalize(raw, &seller_id) {
                Ok(r) => r,
                Err(e) => {
                    dropped += 1;
                    tracing::warn!(target: "normalize", query_id = %qid, seller_id = %seller_id, error = %e, "dropping record");
                    continue;
                }
            };
            let c = self.classifier.classify_traced(&seller_id, &record).await;
            if c.from_cache {
                cache_hits += 1;
            } else if c.result.fallback {
                fallbacks += 1;
            }
            let row = to_result(&record, &c.result);
            if acquisition.incremental {
                emitter.emit(ProgressEvent::Result {
                    manufacturer: row.clone(),
                });
            }
            scored.push(row);
        }
        if dropped > 0 {
            counter!(names::RECORDS_DROPPED).increment(dropped as u64);
        }
        let normalized_count = acquisition.raw_count - dropped;
        let classify_ms = ms(t_classify);

        // 4) Dedupe.
        let dedup_before = scored.len();
        let deduped = dedupe(scored);
        let dedup_after = deduped.len();
        emitter.emit(ProgressEvent::Progress(ProgressStep::Deduplicating {
            before_count: dedup_before,
            after_count: dedup_after,
        }));

        // 5) Filter + sort.
        let spec = FilterSpec {
            min_confidence: filters.min_confidence,
            locations: filters.location.clone(),
            manufacturer_type: filters.manufacturer_type,
            ..Default::default()
        };
        let filtered = filter::apply(deduped, &spec);
        emitter.emit(ProgressEvent::Progress(ProgressStep::Filtering {
            before_count: dedup_after,
            after_count: filtered.results.len(),
            filters_applied: filtered.filters_applied.clone(),
        }));

        // 6) Assemble + cache.
        let search_id = uuid::Uuid::new_v4().to_string();
        let total_results = filtered.results.len();
        let observability = Observability {
            provider_used: acquisition.provider_used,
            raw_count: acquisition.raw_count,
            normalized_count,
            dropped_records: dropped,
            classification_cache_hits: cache_hits,
            classification_fallbacks: fallbacks,
            dedup_before,
            dedup_after,
            filtered_count: total_results,
            filters_applied: filtered.filters_applied,
            query_parse_fallback: parse_fallback,
            provider_attempts: acquisition.attempts,
            stage_timings_ms: StageTimings {
                parse_ms,
                acquire_ms,
                classify_ms,
                total_ms: ms(started),
            },
        };
        let response = SearchResponse {
            search_id: search_id.clone(),
            query,
            parsed_query: parsed,
            results: filtered.results,
            total_results,
            search_time_seconds: started.elapsed().as_secs_f64(),
            observability,
        };
        self.cache.put(&search_id, Arc::new(response.clone()))?;

        tracing::info!(
            target: "pipeline",
            query_id = %qid,
            search_id = %search_id,
            provider = acquisition.provider_name,
            raw = acquisition.raw_count,
            dropped,
            results = total_results,
            elapsed_ms = ms(started),
            "search complete"
        );
        Ok(response)
    }

    async fn resolve_query(&self, request: &SearchRequest) -> Result<String, SearchError> {
        let text = request.query.trim();
        if !text.is_empty() {
            return Ok(text.to_string());
        }
        let image = request
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| SearchError::InvalidRequest("query or imageUrl is required".into()))?;
        self.parser.describe_image(image).await.map_err(|e| {
            tracing::warn!(target: "pipeline", error = %e, "image description failed");
            SearchError::InvalidRequest(format!("could not derive a query from the image: {e}"))
        })
    }

    /// Read a cached search, re-filtered and re-sorted for display.
    pub fn get_cached(&self, search_id: &str, q: &CachedQuery) -> Result<CachedPage, SearchError> {
        let resp = self
            .cache
            .get(search_id)?
            .ok_or_else(|| SearchError::NotFound(search_id.to_string()))?;

        let spec = FilterSpec {
            min_confidence: q.min_confidence.map(|m| m.clamp(0.0, 1.0)),
            locations: q.location.iter().cloned().collect(),
            manufacturer_type: None,
            sort_by: q.sort_by,
            order: q.order,
            limit: None,
        };
        let mut rows = filter::apply(resp.results.clone(), &spec).results;
        let total = rows.len();
        rows.truncate(q.limit.unwrap_or(MAX_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT));

        Ok(CachedPage {
            manufacturers: rows,
            sort_by: q.sort_by,
            order: q.order,
            total,
        })
    }
}

fn ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

/// Short SHA-256 prefix; keeps raw queries out of info-level logs.
pub fn fingerprint(text: &str) -> String {
    use std::fmt::Write as _;
    let digest = Sha256::digest(text.trim().to_lowercase().as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

/// Seller id for one acquired record: provider, position in the
/// acquisition and a fingerprint of the whole raw record. Unique within an
/// acquisition; a later search only shares an id (and so a memoized
/// verdict) when the same provider returns identical content at the same
/// position.
pub fn seller_id(provider: &str, idx: usize, raw: &RawProviderRecord) -> String {
    let content = serde_json::to_string(raw).unwrap_or_default();
    format!("{provider}-{idx}-{}", fingerprint(&content))
}

/// Output row from a canonical record and its classification.
pub fn to_result(record: &CanonicalManufacturerRecord, c: &ClassificationResult) -> ManufacturerResult {
    let contact = &record.contact;
    let links = (!record.external_links.is_empty()).then(|| ResultLinks {
        product_url: record.external_links.product_url.clone(),
        company_url: record.external_links.company_url.clone(),
    });
    ManufacturerResult {
        id: record.seller_id.clone(),
        name: record.company_name.clone(),
        kind: c.label.into(),
        confidence: crate::scoring::score(record, c.confidence),
        address: display_location(&record.location).unwrap_or_else(|| UNKNOWN_ADDRESS.to_string()),
        contact: contact
            .person
            .clone()
            .or_else(|| contact.phone.clone())
            .or_else(|| contact.email.clone()),
        email: contact.email.clone(),
        phone: contact.phone.clone(),
        products: record.products.clone(),
        links,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Contact, ExternalLinks, Label, Location, ManufacturerType};
    use serde_json::json;

    fn record() -> CanonicalManufacturerRecord {
        CanonicalManufacturerRecord {
            seller_id: "synthetic-1".into(),
            company_name: "Acme Co.".into(),
            description: None,
            products: vec!["General Products".into()],
            contact: Contact {
                person: None,
                phone: Some("+86 574 1234".into()),
                email: Some("a@acme.example.com".into()),
                wechat: None,
            },
            location: Location::default(),
            factory_info: None,
            certifications: vec![],
            pricing: None,
            external_links: ExternalLinks::default(),
        }
    }

    fn verdict(label: Label, confidence: f64) -> ClassificationResult {
        ClassificationResult {
            seller_id: "synthetic-1".into(),
            label,
            confidence,
            factors: Default::default(),
            explanation: String::new(),
            fallback: false,
        }
    }

    #[test]
    fn result_row_falls_back_for_address_and_contact() {
        let row = to_result(&record(), &verdict(Label::Trading, 0.5));
        assert_eq!(row.kind, ManufacturerType::TradingCompany);
        assert_eq!(row.address, UNKNOWN_ADDRESS);
        assert_eq!(row.contact.as_deref(), Some("+86 574 1234"));
        assert_eq!(row.confidence, 55);
        assert!(row.links.is_none());
    }

    #[test]
    fn contact_prefers_person() {
        let mut r = record();
        r.contact.person = Some("Lily Wang".into());
        let row = to_result(&r, &verdict(Label::Factory, 0.9));
        assert_eq!(row.contact.as_deref(), Some("Lily Wang"));
    }

    #[test]
    fn seller_id_is_unique_per_position_and_content() {
        let a = json!({ "companyName": "Acme", "address": "Ningbo" }).as_object().cloned().unwrap();
        let b = json!({ "companyName": "Acme", "address": "Shenzhen" }).as_object().cloned().unwrap();
        assert_ne!(seller_id("primary", 0, &a), seller_id("primary", 1, &a));
        assert_ne!(seller_id("primary", 0, &a), seller_id("primary", 0, &b));
        assert_ne!(seller_id("primary", 0, &a), seller_id("secondary", 0, &a));
        assert_eq!(seller_id("primary", 0, &a), seller_id("primary", 0, &a.clone()));
        assert!(seller_id("primary", 3, &a).starts_with("primary-3-"));
    }

    #[test]
    fn fingerprint_is_short_and_case_insensitive() {
        let f = fingerprint("LED strip");
        assert_eq!(f.len(), 12);
        assert_eq!(f, fingerprint(" led strip "));
    }
}
