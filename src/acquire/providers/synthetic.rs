//! Synthetic fallback: deterministically fabricates placeholder supplier rows
//! from the query so downstream stages stay exercised when every live
//! provider is down or out of quota.
//!
//! The same query (and location hint) always yields the same rows. Field
//! naming alternates between camelCase and snake_case on purpose so the
//! normalizer sees both shapes.

use async_trait::async_trait;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::acquire::types::{FetchOptions, ProviderError, SupplierProvider};
use crate::model::{ProviderKind, RawProviderRecord};
use crate::normalize::gazetteer::{self, City};

/// Cities used when the query carries no usable location hint.
const DEFAULT_HUBS: &[&str] = &[
    "Shenzhen", "Ningbo", "Dongguan", "Yiwu", "Guangzhou", "Suzhou", "Xiamen", "Qingdao", "Foshan",
    "Wenzhou",
];

const FACTORY_SUFFIXES: &[&str] = &[
    "Manufacturing Co., Ltd.",
    "Industrial Co., Ltd.",
    "Technology Co., Ltd.",
];

const TRADING_SUFFIXES: &[&str] = &["Trading Co., Ltd.", "Import & Export Co., Ltd."];

const CERTS: &[&str] = &["ISO 9001", "CE", "RoHS", "FCC", "BSCI", "SGS"];

const EQUIPMENT: &[&str] = &[
    "CNC machining centers",
    "Injection molding machines",
    "Automated assembly lines",
    "Stamping presses",
    "Quality inspection lab",
];

pub struct SyntheticProvider {
    count: usize,
}

impl SyntheticProvider {
    pub fn new(count: usize) -> Self {
        Self {
            count: count.max(1),
        }
    }

    /// Pure generator behind `fetch`.
    pub fn generate(&self, query: &str, opts: &FetchOptions) -> Vec<RawProviderRecord> {
        let product = title_case(query);
        if product.is_empty() {
            return Vec::new();
        }
        let digest = seed(query, opts.location.as_deref());
        let cities = candidate_cities(opts.location.as_deref());
        let n = if opts.max_items > 0 {
            self.count.min(opts.max_items)
        } else {
            self.count
        };

        (0..n)
            .map(|i| {
                let b = |k: usize| digest[(i * 7 + k) % digest.len()] as usize;
                let city = cities[b(0) % cities.len()];
                let is_factory = b(1) % 3 != 0;
                record(i, &product, city, is_factory, b)
            })
            .collect()
    }
}

fn seed(query: &str, location: Option<&str>) -> Vec<u8> {
    let mut h = Sha256::new();
    h.update(query.trim().to_lowercase().as_bytes());
    if let Some(loc) = location {
        h.update(b"|");
        h.update(loc.trim().to_lowercase().as_bytes());
    }
    h.finalize().to_vec()
}

fn candidate_cities(location: Option<&str>) -> Vec<&'static City> {
    if let Some(loc) = location {
        if let Some(c) = gazetteer::city(loc) {
            return vec![c];
        }
        if let Some(p) = gazetteer::province(loc) {
            let in_prov: Vec<_> = gazetteer::cities_in(p.name).collect();
            if !in_prov.is_empty() {
                return in_prov;
            }
        }
    }
    DEFAULT_HUBS.iter().filter_map(|n| gazetteer::city(n)).collect()
}

fn record(
    i: usize,
    product: &str,
    city: &City,
    is_factory: bool,
    b: impl Fn(usize) -> usize,
) -> RawProviderRecord {
    let suffixes = if is_factory { FACTORY_SUFFIXES } else { TRADING_SUFFIXES };
    let name = format!("{} {} {}", city.name, product, suffixes[b(2) % suffixes.len()]);
    let handle = format!("{}{}{}", city.name.to_lowercase(), b(3) % 90 + 10, i);
    let phone = format!("+86 {}{} {:04} {:04}", 5 + b(4) % 4, b(5) % 90 + 10, b(6) * 37 % 10_000, b(7) * 53 % 10_000);
    let certs: Vec<&str> = (0..b(8) % 3).map(|k| CERTS[(b(9) + k) % CERTS.len()]).collect();
    let min = (b(10) % 50 + 1) as f64;

    let v: Value = if i % 2 == 0 {
        let mut products = vec![product.to_string()];
        if !is_factory {
            products.extend(["Home Goods", "Hardware", "Gift Items"].map(String::from));
        }
        json!({
            "companyName": name,
            "description": format!("Placeholder supplier profile for {product}; live sourcing data was unavailable."),
            "mainProducts": products,
            "address": format!("No. {} Industrial Road, {}, {}", b(11) % 300 + 1, city.name, city.province),
            "contactPhone": phone,
            "email": format!("sales@{handle}.example.com"),
            "hasFactory": is_factory,
            "productionEquipment": if is_factory { vec![EQUIPMENT[b(12) % EQUIPMENT.len()]] } else { vec![] },
            "certifications": certs,
            "minPrice": min,
            "maxPrice": min * 3.0,
            "currency": "USD",
            "companyUrl": format!("https://{handle}.example.com"),
            "synthetic": true,
        })
    } else {
        json!({
            "supplier_name": name,
            "main_products": if is_factory { product.to_string() } else { format!("{product}, Accessories, Packaging, Tools") },
            "city": city.name,
            "province": city.province,
            "phone": phone,
            "factory_description": if is_factory { Value::from(format!("Own plant in {} producing {product}", city.name)) } else { Value::Null },
            "certificates": certs.join(", "),
            "price": format!("{}", min as i64),
            "supplier_url": format!("https://{handle}.example.com"),
            "synthetic": true,
        })
    };
    v.as_object().cloned().unwrap_or_default()
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut cs = w.chars();
            match cs.next() {
                Some(f) => f.to_uppercase().chain(cs).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl SupplierProvider for SyntheticProvider {
    async fn fetch(
        &self,
        query: &str,
        opts: &FetchOptions,
    ) -> Result<Vec<RawProviderRecord>, ProviderError> {
        let rows = self.generate(query, opts);
        tracing::info!(target: "acquire", rows = rows.len(), "synthetic records generated");
        Ok(rows)
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Synthetic
    }
}
