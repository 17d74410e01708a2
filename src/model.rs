//! # Data Model
//! Shapes shared by every pipeline stage: the parsed intent, the canonical
//! manufacturer record, classification output, the emitted result row and
//! the cached search response.
//!
//! Wire format is camelCase JSON; `api` serializes these
//! types as-is.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw record as returned by a provider. No shared schema.
pub type RawProviderRecord = serde_json::Map<String, serde_json::Value>;

/// Fallback company name when a provider record has none.
pub const UNKNOWN_COMPANY: &str = "Unknown Company";

/// Fallback product label when a provider record lists no products.
pub const GENERAL_PRODUCTS: &str = "General Products";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    #[default]
    Manufacturer,
    Product,
}

/// Structured intent extracted from the buyer's query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedQuery {
    pub product: String,
    pub locations: Vec<String>,
    pub query_type: QueryType,
    pub specifications: BTreeMap<String, String>,
}

impl ParsedQuery {
    /// Degraded intent used when the language model is unavailable or
    /// returns something unusable. `product` is the query exactly as given;
    /// the pipeline trims request text before it gets here.
    pub fn fallback(raw_query: &str) -> Self {
        Self {
            product: raw_query.to_string(),
            locations: Vec::new(),
            query_type: QueryType::Manufacturer,
            specifications: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wechat: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Location {
    /// True when address, city and province are all known.
    pub fn is_complete(&self) -> bool {
        self.address.is_some() && self.city.is_some() && self.province.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactoryInfo {
    pub has_factory: bool,
    pub production_equipment: Vec<String>,
    /// Free-text factory description, when the provider supplies one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl FactoryInfo {
    /// Whether the provider gave any factory evidence at all.
    pub fn has_evidence(&self) -> bool {
        self.has_factory || self.details.is_some() || !self.production_equipment.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub currency: String,
    pub price_range: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalLinks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_url: Option<String>,
}

impl ExternalLinks {
    pub fn is_empty(&self) -> bool {
        self.product_url.is_none() && self.company_url.is_none()
    }
}

/// Normalized manufacturer shape every provider is mapped into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalManufacturerRecord {
    pub seller_id: String,
    pub company_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Insertion-ordered, duplicate-free.
    pub products: Vec<String>,
    pub contact: Contact,
    pub location: Location,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factory_info: Option<FactoryInfo>,
    pub certifications: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<Pricing>,
    pub external_links: ExternalLinks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Factory,
    Trading,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub seller_id: String,
    pub label: Label,
    /// Always within `[0.0, 1.0]`.
    pub confidence: f64,
    pub factors: serde_json::Map<String, serde_json::Value>,
    pub explanation: String,
    /// Set when the heuristic produced this result instead of the model.
    #[serde(default)]
    pub fallback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManufacturerType {
    Factory,
    #[serde(rename = "Trading Company")]
    TradingCompany,
}

impl From<Label> for ManufacturerType {
    fn from(label: Label) -> Self {
        match label {
            Label::Factory => ManufacturerType::Factory,
            Label::Trading => ManufacturerType::TradingCompany,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultLinks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_url: Option<String>,
}

/// One output row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManufacturerResult {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ManufacturerType,
    /// Integer percentage in `[0, 100]`.
    pub confidence: u8,
    pub address: String,
    pub contact: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub products: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<ResultLinks>,
}

/// Which link of the provider chain produced the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Primary,
    Secondary,
    Synthetic,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Primary => "primary",
            ProviderKind::Secondary => "secondary",
            ProviderKind::Synthetic => "synthetic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Records,
    Empty,
    Recoverable,
    Unexpected,
}

/// Ledger line for one provider call inside an acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAttempt {
    pub provider: String,
    pub kind: ProviderKind,
    pub outcome: AttemptOutcome,
    pub records: usize,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTimings {
    pub parse_ms: u64,
    pub acquire_ms: u64,
    pub classify_ms: u64,
    pub total_ms: u64,
}

/// Counters describing what happened inside one search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observability {
    pub provider_used: ProviderKind,
    pub raw_count: usize,
    pub normalized_count: usize,
    pub dropped_records: usize,
    pub classification_cache_hits: usize,
    pub classification_fallbacks: usize,
    pub dedup_before: usize,
    pub dedup_after: usize,
    pub filtered_count: usize,
    pub filters_applied: Vec<String>,
    pub query_parse_fallback: bool,
    pub provider_attempts: Vec<ProviderAttempt>,
    pub stage_timings_ms: StageTimings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TypeFilter {
    Factory,
    Trading,
    #[default]
    Both,
}

/// Caller-specified constraints on a search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    #[serde(default)]
    pub location: Vec<String>,
    #[serde(default)]
    pub min_confidence: Option<f64>,
    #[serde(default)]
    pub manufacturer_type: Option<TypeFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub filters: Option<SearchFilters>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Full result of one search session. Immutable once cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub search_id: String,
    pub query: String,
    pub parsed_query: ParsedQuery,
    pub results: Vec<ManufacturerResult>,
    pub total_results: usize,
    pub search_time_seconds: f64,
    pub observability: Observability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Confidence,
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Read-side view over a cached search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedQuery {
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub order: SortOrder,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub min_confidence: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedPage {
    pub manufacturers: Vec<ManufacturerResult>,
    pub sort_by: SortBy,
    pub order: SortOrder,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manufacturer_type_serializes_with_display_names() {
        let f = serde_json::to_string(&ManufacturerType::Factory).unwrap();
        let t = serde_json::to_string(&ManufacturerType::TradingCompany).unwrap();
        assert_eq!(f, r#""Factory""#);
        assert_eq!(t, r#""Trading Company""#);
    }

    #[test]
    fn fallback_query_uses_raw_text() {
        let p = ParsedQuery::fallback("LED strip lights, 12V ");
        assert_eq!(p.product, "LED strip lights, 12V ");
        assert!(p.locations.is_empty());
        assert_eq!(p.query_type, QueryType::Manufacturer);
    }

    #[test]
    fn search_request_accepts_minimal_json() {
        let req: SearchRequest = serde_json::from_str(r#"{"query":"bike frames"}"#).unwrap();
        assert_eq!(req.query, "bike frames");
        assert!(req.filters.is_none());
        assert!(req.image_url.is_none());
    }
}
