//! # Filter/Sort Engine
//! Confidence floor, manufacturer-type and location filters followed by a
//! stable sort and an optional limit.
//!
//! Location queries are resolved against the gazetteer:
//! - a city matches its aliases as a standalone place token
//!   ("Ningbo," / "Ningbo City" / ", Ningbo"), never a street name;
//! - a province matches its own name or any of its cities;
//! - anything else falls back to a plain word-bounded match.

use std::cmp::Ordering;

use regex::Regex;

use crate::model::{ManufacturerResult, ManufacturerType, SortBy, SortOrder, TypeFilter};
use crate::normalize::gazetteer::{self, City};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    /// Fraction in `[0, 1]`; compared against `confidence / 100`.
    pub min_confidence: Option<f64>,
    /// A row is kept when any entry matches its address.
    pub locations: Vec<String>,
    pub manufacturer_type: Option<TypeFilter>,
    pub sort_by: SortBy,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filtered {
    pub results: Vec<ManufacturerResult>,
    pub filters_applied: Vec<String>,
}

fn city_pattern(c: &City) -> String {
    let aliases = c
        .aliases
        .iter()
        .map(|a| regex::escape(a))
        .collect::<Vec<_>>()
        .join("|");
    let provinces = gazetteer::province(c.province)
        .map(|p| p.aliases.to_vec())
        .unwrap_or_else(|| vec![c.province])
        .iter()
        .map(|a| regex::escape(a))
        .collect::<Vec<_>>()
        .join("|");
    format!(r"\b(?:{aliases})(?:\s+city)?\s*(?:,|$|\s+(?:{provinces}|china)\b)")
}

/// Compiled matcher for one location query.
#[derive(Debug)]
pub struct LocationMatcher {
    patterns: Vec<Regex>,
}

impl LocationMatcher {
    pub fn new(query: &str) -> Self {
        let q = query.trim();
        let mut sources = Vec::new();
        if q.is_empty() {
            return Self { patterns: Vec::new() };
        }
        if let Some(c) = gazetteer::city(q) {
            sources.push(city_pattern(c));
        } else if let Some(p) = gazetteer::province(q) {
            let aliases = p
                .aliases
                .iter()
                .map(|a| regex::escape(a))
                .collect::<Vec<_>>()
                .join("|");
            sources.push(format!(r"\b(?:{aliases})(?:\s+province)?\s*(?:,|$|\s+china\b)"));
            sources.extend(gazetteer::cities_in(p.name).map(city_pattern));
        } else {
            sources.push(format!(r"\b{}\b", regex::escape(q)));
        }

        let patterns = sources
            .iter()
            .filter_map(|s| match Regex::new(&format!("(?i){s}")) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(target: "filter", error = %e, "skipping location pattern");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn matches(&self, address: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(address.trim()))
    }
}

/// Convenience wrapper compiling a one-off matcher.
pub fn location_matches(address: &str, query: &str) -> bool {
    LocationMatcher::new(query).matches(address)
}

fn type_allows(filter: TypeFilter, kind: ManufacturerType) -> bool {
    match filter {
        TypeFilter::Both => true,
        TypeFilter::Factory => kind == ManufacturerType::Factory,
        TypeFilter::Trading => kind == ManufacturerType::TradingCompany,
    }
}

fn compare(a: &ManufacturerResult, b: &ManufacturerResult, by: SortBy) -> Ordering {
    match by {
        SortBy::Confidence => a.confidence.cmp(&b.confidence),
        SortBy::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
    }
}

/// Filter, stable-sort and truncate. Ties keep their incoming order.
pub fn apply(results: Vec<ManufacturerResult>, spec: &FilterSpec) -> Filtered {
    let mut filters_applied = Vec::new();
    let mut rows = results;

    if let Some(min) = spec.min_confidence {
        // Confidence is integral; absorb float noise such as 0.29 * 100.
        let floor = (min.clamp(0.0, 1.0) * 100.0 - 1e-9).ceil();
        rows.retain(|r| f64::from(r.confidence) >= floor);
        filters_applied.push("minConfidence".to_string());
    }

    if let Some(t) = spec.manufacturer_type.filter(|t| *t != TypeFilter::Both) {
        rows.retain(|r| type_allows(t, r.kind));
        filters_applied.push("manufacturerType".to_string());
    }

    let wanted: Vec<_> = spec
        .locations
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| LocationMatcher::new(l))
        .collect();
    if !wanted.is_empty() {
        rows.retain(|r| wanted.iter().any(|m| m.matches(&r.address)));
        filters_applied.push("location".to_string());
    }

    match spec.order {
        SortOrder::Asc => rows.sort_by(|a, b| compare(a, b, spec.sort_by)),
        SortOrder::Desc => rows.sort_by(|a, b| compare(b, a, spec.sort_by)),
    }

    if let Some(n) = spec.limit {
        rows.truncate(n);
    }

    Filtered {
        results: rows,
        filters_applied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, conf: u8, kind: ManufacturerType, address: &str) -> ManufacturerResult {
        ManufacturerResult {
            id: id.into(),
            name: id.into(),
            kind,
            confidence: conf,
            address: address.into(),
            contact: None,
            email: None,
            phone: None,
            products: vec![],
            links: None,
        }
    }

    #[test]
    fn province_matches_its_cities_but_not_street_names() {
        assert!(location_matches("Ningbo, Zhejiang", "Zhejiang"));
        assert!(!location_matches("Ningbo Road, Shanghai", "Zhejiang"));
        assert!(location_matches("No. 8 Jiangbei Road, Cixi", "Zhejiang"));
        assert!(location_matches("Zhejiang Province, China", "zhejiang"));
    }

    #[test]
    fn city_alias_forms() {
        assert!(location_matches("Ningbo, China", "Ningbo"));
        assert!(location_matches("Ningbo City", "Ningbo"));
        assert!(location_matches("Beilun District, Ningbo", "ningbo"));
        assert!(location_matches("Ningpo Zhejiang", "Ningbo"));
        assert!(!location_matches("Ningbo Road, Shanghai", "Ningbo"));
        assert!(!location_matches("Shenzhen, Guangdong", "Ningbo"));
    }

    #[test]
    fn unknown_place_uses_word_boundary() {
        assert!(location_matches("Anji County, Huzhou", "Anji"));
        assert!(!location_matches("Anjiang Road", "Anji"));
    }

    #[test]
    fn factory_filter_never_returns_trading() {
        let rows = vec![
            row("a", 90, ManufacturerType::TradingCompany, ""),
            row("b", 80, ManufacturerType::Factory, ""),
            row("c", 70, ManufacturerType::TradingCompany, ""),
        ];
        let out = apply(
            rows,
            &FilterSpec {
                manufacturer_type: Some(TypeFilter::Factory),
                ..Default::default()
            },
        );
        assert_eq!(out.results.len(), 1);
        assert!(out.results.iter().all(|r| r.kind == ManufacturerType::Factory));
        assert_eq!(out.filters_applied, vec!["manufacturerType"]);
    }

    #[test]
    fn min_confidence_is_monotonic() {
        let rows: Vec<_> = [95u8, 81, 80, 79, 60, 59, 10]
            .iter()
            .enumerate()
            .map(|(i, c)| row(&i.to_string(), *c, ManufacturerType::Factory, ""))
            .collect();
        let hi = apply(rows.clone(), &FilterSpec { min_confidence: Some(0.8), ..Default::default() });
        let lo = apply(rows, &FilterSpec { min_confidence: Some(0.6), ..Default::default() });
        assert_eq!(hi.results.len(), 3);
        assert_eq!(lo.results.len(), 5);
        assert!(hi.results.iter().all(|r| lo.results.contains(r)));
    }

    #[test]
    fn stable_descending_sort_then_limit() {
        let rows = vec![
            row("first", 70, ManufacturerType::Factory, ""),
            row("top", 90, ManufacturerType::Factory, ""),
            row("second", 70, ManufacturerType::Factory, ""),
            row("low", 10, ManufacturerType::Factory, ""),
        ];
        let out = apply(rows, &FilterSpec { limit: Some(3), ..Default::default() });
        let ids: Vec<_> = out.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["top", "first", "second"]);
        assert!(out.filters_applied.is_empty());
    }

    #[test]
    fn name_sort_ascending() {
        let rows = vec![
            row("beta", 1, ManufacturerType::Factory, ""),
            row("Alpha", 2, ManufacturerType::Factory, ""),
        ];
        let out = apply(
            rows,
            &FilterSpec {
                sort_by: SortBy::Name,
                order: SortOrder::Asc,
                ..Default::default()
            },
        );
        assert_eq!(out.results[0].id, "Alpha");
    }
}
