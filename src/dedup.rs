//! Deduplicator: collapses rows that refer to the same company.

use std::collections::HashMap;

use crate::model::ManufacturerResult;

/// Legal-entity suffixes stripped from the end of a company name, repeatedly.
const LEGAL_SUFFIXES: &[&str] = &[
    "co.,ltd",
    "co.,ltd.",
    "co ltd",
    "ltd.",
    "ltd",
    "limited",
    "co.",
    "co",
    "inc.",
    "inc",
    "corp.",
    "corp",
    "corporation",
    "company",
    "llc",
    "l.l.c.",
    "gmbh",
];

fn is_trailing_punct(c: char) -> bool {
    matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | '-' | '_' | '&' | '/' | '(' | ')') || c.is_whitespace()
}

/// Lowercase, trim, drop trailing punctuation and legal suffixes.
/// ("Acme Industrial Co., Ltd." -> "acme industrial")
pub fn normalize_company_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let mut s = lowered.trim_end_matches(is_trailing_punct);

    loop {
        let stripped = LEGAL_SUFFIXES.iter().find_map(|suf| {
            let rest = s.strip_suffix(suf)?;
            // Suffix must be a whole word and must not eat the entire name.
            let boundary = rest.chars().last().map(|c| !c.is_alphanumeric())?;
            boundary.then(|| rest.trim_end_matches(is_trailing_punct))
        });
        match stripped {
            Some(rest) if !rest.is_empty() => s = rest,
            _ => break,
        }
    }

    if s.is_empty() {
        lowered
    } else {
        s.to_string()
    }
}

/// Normalized name, joined with the company URL when there is one.
pub fn dedup_key(r: &ManufacturerResult) -> String {
    let name = normalize_company_name(&r.name);
    match r.links.as_ref().and_then(|l| l.company_url.as_deref()) {
        Some(url) if !url.trim().is_empty() => format!("{name}|{}", url.trim().to_lowercase()),
        _ => name,
    }
}

fn merge_products(into: &mut Vec<String>, extra: &[String]) {
    for p in extra {
        if !into.iter().any(|q| q.eq_ignore_ascii_case(p)) {
            into.push(p.clone());
        }
    }
}

/// Keep one row per key. The higher-confidence row is the representative
/// (ties keep the earlier one); products are the union of every duplicate.
/// Output keeps first-occurrence order.
pub fn dedupe(results: Vec<ManufacturerResult>) -> Vec<ManufacturerResult> {
    let mut slot_of: HashMap<String, usize> = HashMap::with_capacity(results.len());
    let mut out: Vec<ManufacturerResult> = Vec::with_capacity(results.len());

    for r in results {
        let key = dedup_key(&r);
        match slot_of.get(&key) {
            Some(&i) => {
                let existing = &mut out[i];
                let mut products = std::mem::take(&mut existing.products);
                merge_products(&mut products, &r.products);
                if r.confidence > existing.confidence {
                    *existing = r;
                }
                existing.products = products;
            }
            None => {
                slot_of.insert(key, out.len());
                out.push(r);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ManufacturerType, ResultLinks};

    fn row(name: &str, conf: u8, kind: ManufacturerType, products: &[&str]) -> ManufacturerResult {
        ManufacturerResult {
            id: name.to_string(),
            name: name.to_string(),
            kind,
            confidence: conf,
            address: "China".into(),
            contact: None,
            email: None,
            phone: None,
            products: products.iter().map(|s| s.to_string()).collect(),
            links: None,
        }
    }

    #[test]
    fn strips_legal_suffixes() {
        assert_eq!(normalize_company_name("Acme Industrial Co., Ltd."), "acme industrial");
        assert_eq!(normalize_company_name("  ACME Inc. "), "acme");
        assert_eq!(normalize_company_name("Acme Limited"), "acme");
        assert_eq!(normalize_company_name("Acme Co."), "acme");
        assert_eq!(normalize_company_name("Tesco"), "tesco");
        assert_eq!(normalize_company_name("Company"), "company");
    }

    #[test]
    fn higher_confidence_wins_products_union() {
        let a = row("Acme Co., Ltd.", 60, ManufacturerType::TradingCompany, &["Pumps", "Valves"]);
        let b = row("ACME co", 85, ManufacturerType::Factory, &["valves", "Hoses"]);
        let out = dedupe(vec![a, b]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, ManufacturerType::Factory);
        assert_eq!(out[0].confidence, 85);
        assert_eq!(out[0].products, vec!["Pumps", "Valves", "Hoses"]);
    }

    #[test]
    fn tie_keeps_first_seen() {
        let a = row("Acme", 70, ManufacturerType::Factory, &["A"]);
        let b = row("Acme Ltd", 70, ManufacturerType::TradingCompany, &["B"]);
        let out = dedupe(vec![a, b]);
        assert_eq!(out[0].kind, ManufacturerType::Factory);
        assert_eq!(out[0].products, vec!["A", "B"]);
    }

    #[test]
    fn company_url_separates_same_names() {
        let mut a = row("Acme", 70, ManufacturerType::Factory, &["A"]);
        let mut b = row("Acme", 70, ManufacturerType::Factory, &["B"]);
        a.links = Some(ResultLinks {
            product_url: None,
            company_url: Some("https://a.example.com".into()),
        });
        b.links = Some(ResultLinks {
            product_url: None,
            company_url: Some("https://b.example.com".into()),
        });
        assert_eq!(dedupe(vec![a, b]).len(), 2);
    }

    #[test]
    fn first_occurrence_order_and_idempotence() {
        let rows = vec![
            row("Beta", 50, ManufacturerType::Factory, &["x"]),
            row("Alpha", 90, ManufacturerType::Factory, &["y"]),
            row("Beta Inc", 95, ManufacturerType::TradingCompany, &["z"]),
            row("Gamma", 10, ManufacturerType::Factory, &[]),
        ];
        let once = dedupe(rows);
        let names: Vec<_> = once.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Beta Inc", "Alpha", "Gamma"]);
        assert_eq!(dedupe(once.clone()), once);
    }
}
