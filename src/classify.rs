//! # Classifier
//! Factory vs trading-company labelling. One chat call per seller, memoized
//! by seller id; a deterministic heuristic takes over whenever the model is
//! unavailable or its answer cannot be parsed.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use metrics::counter;
use serde_json::{json, Map, Value};

use crate::llm::{strip_code_fences, ChatMessage, ChatOptions, DynChatClient};
use crate::metrics::names;
use crate::model::{CanonicalManufacturerRecord, ClassificationResult, Label};

/// Product lists at or below this size count as a "narrow" range in the
/// heuristic fallback. Overridable through `[classifier] narrow_range_max`.
pub const NARROW_PRODUCT_RANGE_MAX: usize = 3;

/// Confidence assigned by the heuristic fallback.
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

const CLASSIFY_INSTRUCTION: &str = "You are a sourcing analyst who decides whether a Chinese supplier is a genuine \
factory (owns production) or a trading company (resells). Reply with ONLY a JSON object: \
{\"label\": \"factory\" | \"trading\", \"confidence\": number between 0 and 1, \
\"factors\": {\"ownsProduction\": boolean, \"productFocus\": \"narrow\" | \"wide\", \"evidence\": string[]}, \
\"explanation\": string}.";

const CLASSIFY_OPTS: ChatOptions = ChatOptions {
    temperature: 0.2,
    max_tokens: 400,
};

/// Memo of classification results keyed by seller id.
#[derive(Debug, Default)]
pub struct ClassificationCache {
    inner: Mutex<HashMap<String, ClassificationResult>>,
}

impl ClassificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    // Entries are written once and never mutated, so a poisoned lock still
    // guards consistent data.
    fn map(&self) -> MutexGuard<'_, HashMap<String, ClassificationResult>> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn get(&self, seller_id: &str) -> Option<ClassificationResult> {
        self.map().get(seller_id).cloned()
    }

    /// First write wins; a later put for the same id is ignored.
    pub fn put(&self, result: ClassificationResult) {
        self.map().entry(result.seller_id.clone()).or_insert(result);
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.map().clear();
    }
}

/// A classification plus where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub result: ClassificationResult,
    pub from_cache: bool,
}

pub struct Classifier {
    chat: DynChatClient,
    memo: ClassificationCache,
    narrow_range_max: usize,
}

impl Classifier {
    pub fn new(chat: DynChatClient, narrow_range_max: usize) -> Self {
        Self {
            chat,
            memo: ClassificationCache::new(),
            narrow_range_max,
        }
    }

    pub fn memo(&self) -> &ClassificationCache {
        &self.memo
    }

    pub async fn classify(&self, seller_id: &str, record: &CanonicalManufacturerRecord) -> ClassificationResult {
        self.classify_traced(seller_id, record).await.result
    }

    pub async fn classify_traced(
        &self,
        seller_id: &str,
        record: &CanonicalManufacturerRecord,
    ) -> Classification {
        if let Some(hit) = self.memo.get(seller_id) {
            counter!(names::CLASSIFY_CACHE_HITS).increment(1);
            return Classification {
                result: hit,
                from_cache: true,
            };
        }

        let messages = [
            ChatMessage::system(CLASSIFY_INSTRUCTION),
            ChatMessage::user(build_prompt(record)),
        ];
        let result = match self.chat.chat(&messages, CLASSIFY_OPTS).await {
            Ok(reply) => match parse_verdict(seller_id, &reply.content) {
                Some(r) => r,
                None => {
                    tracing::warn!(target: "classify", seller_id, "unparsable classification, using heuristic");
                    self.heuristic(seller_id, record)
                }
            },
            Err(e) => {
                tracing::warn!(target: "classify", seller_id, error = %e, "classification call failed, using heuristic");
                self.heuristic(seller_id, record)
            }
        };
        if result.fallback {
            counter!(names::CLASSIFY_FALLBACKS).increment(1);
        }

        self.memo.put(result.clone());
        Classification {
            result,
            from_cache: false,
        }
    }

    /// Factory when there is factory evidence and a narrow product range.
    pub fn heuristic(&self, seller_id: &str, record: &CanonicalManufacturerRecord) -> ClassificationResult {
        let has_factory_info = record
            .factory_info
            .as_ref()
            .map(|f| f.has_evidence())
            .unwrap_or(false);
        let product_count = record.products.len();
        let narrow = product_count <= self.narrow_range_max;
        let label = if has_factory_info && narrow {
            Label::Factory
        } else {
            Label::Trading
        };

        let mut factors = Map::new();
        factors.insert("hasFactoryInfo".into(), json!(has_factory_info));
        factors.insert("productCount".into(), json!(product_count));
        factors.insert("narrowRange".into(), json!(narrow));

        ClassificationResult {
            seller_id: seller_id.to_string(),
            label,
            confidence: FALLBACK_CONFIDENCE,
            factors,
            explanation: format!(
                "heuristic fallback: factory info {}, {product_count} product(s)",
                if has_factory_info { "present" } else { "absent" }
            ),
            fallback: true,
        }
    }
}

fn build_prompt(r: &CanonicalManufacturerRecord) -> String {
    let factory = match &r.factory_info {
        Some(f) => {
            let mut s = format!("has factory: {}", f.has_factory);
            if !f.production_equipment.is_empty() {
                s.push_str(&format!("; equipment: {}", f.production_equipment.join(", ")));
            }
            if let Some(d) = &f.details {
                s.push_str(&format!("; details: {d}"));
            }
            s
        }
        None => "not provided".to_string(),
    };
    let certs = if r.certifications.is_empty() {
        "none".to_string()
    } else {
        r.certifications.join(", ")
    };
    format!(
        "Company name: {}\nDescription: {}\nProducts: {}\nFactory info: {}\nCertifications: {}",
        r.company_name,
        r.description.as_deref().unwrap_or("not provided"),
        r.products.join(", "),
        factory,
        certs,
    )
}

/// Defensive parse of the model's verdict. `None` means use the heuristic.
pub fn parse_verdict(seller_id: &str, content: &str) -> Option<ClassificationResult> {
    let v: Value = serde_json::from_str(strip_code_fences(content)).ok()?;
    let obj = v.as_object()?;

    let label = match obj
        .get("label")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_ascii_lowercase())
        .as_deref()
    {
        Some("factory") | Some("manufacturer") => Label::Factory,
        _ => Label::Trading,
    };
    let confidence = obj
        .get("confidence")
        .and_then(|c| match c {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .filter(|c: &f64| c.is_finite())
        .unwrap_or(FALLBACK_CONFIDENCE)
        .clamp(0.0, 1.0);
    let factors = obj
        .get("factors")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let explanation = obj
        .get("explanation")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();

    Some(ClassificationResult {
        seller_id: seller_id.to_string(),
        label,
        confidence,
        factors,
        explanation,
        fallback: false,
    })
}
