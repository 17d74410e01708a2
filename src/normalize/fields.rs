//! Field-candidate table and the "first non-empty match" resolver.
//!
//! Providers name the same attribute differently (`companyName`,
//! `supplier_name`, `contact.phone`, ...). Each logical attribute has an
//! ordered candidate list; the first candidate holding a usable value wins.
//! Values are never merged across candidates.

use serde_json::Value;

use crate::model::RawProviderRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attr {
    CompanyName,
    Description,
    Products,
    ContactPerson,
    Phone,
    Email,
    Wechat,
    Address,
    City,
    Province,
    HasFactory,
    Equipment,
    FactoryDetails,
    Certifications,
    PriceRange,
    MinPrice,
    MaxPrice,
    Currency,
    Price,
    ProductUrl,
    CompanyUrl,
}

/// Ordered candidates per attribute. Dotted names address nested objects.
pub const FIELD_MAP: &[(Attr, &[&str])] = &[
    (
        Attr::CompanyName,
        &[
            "companyName",
            "company_name",
            "supplierName",
            "supplier_name",
            "sellerName",
            "seller_name",
            "company.name",
            "supplier.name",
            "company",
            "name",
            "title",
        ],
    ),
    (
        Attr::Description,
        &["description", "companyDescription", "company_description", "summary", "about", "introduction"],
    ),
    (
        Attr::Products,
        &[
            "products",
            "mainProducts",
            "main_products",
            "productList",
            "product_list",
            "productNames",
            "product_names",
            "productName",
            "product_name",
            "product",
        ],
    ),
    (
        Attr::ContactPerson,
        &["contactPerson", "contact_person", "contactName", "contact_name", "contact.name", "contact.person"],
    ),
    (
        Attr::Phone,
        &["phone", "telephone", "tel", "mobile", "contact.phone", "contactPhone", "contact_phone", "phoneNumber", "phone_number"],
    ),
    (
        Attr::Email,
        &["email", "contact.email", "contactEmail", "contact_email", "mail"],
    ),
    (
        Attr::Wechat,
        &["wechat", "weChat", "wechat_id", "wechatId", "contact.wechat"],
    ),
    (
        Attr::Address,
        &[
            "address",
            "companyAddress",
            "company_address",
            "fullAddress",
            "full_address",
            "location.address",
            "location",
            "supplierLocation",
            "supplier_location",
        ],
    ),
    (Attr::City, &["city", "location.city", "address.city"]),
    (
        Attr::Province,
        &["province", "location.province", "address.province", "state", "region"],
    ),
    (
        Attr::HasFactory,
        &["hasFactory", "has_factory", "factoryInfo.hasFactory", "factory_info.has_factory", "isManufacturer", "is_manufacturer"],
    ),
    (
        Attr::Equipment,
        &[
            "productionEquipment",
            "production_equipment",
            "factoryInfo.productionEquipment",
            "factory_info.production_equipment",
            "equipment",
        ],
    ),
    (
        Attr::FactoryDetails,
        &["factoryInfo", "factory_info", "factoryDescription", "factory_description", "factory"],
    ),
    (
        Attr::Certifications,
        &["certifications", "certificates", "certs", "certification"],
    ),
    (
        Attr::PriceRange,
        &["priceRange", "price_range", "priceRangeText", "price_range_text"],
    ),
    (Attr::MinPrice, &["minPrice", "min_price", "priceMin", "price_min", "price.min"]),
    (Attr::MaxPrice, &["maxPrice", "max_price", "priceMax", "price_max", "price.max"]),
    (Attr::Currency, &["currency", "priceCurrency", "price_currency", "price.currency"]),
    (Attr::Price, &["price", "unitPrice", "unit_price"]),
    (
        Attr::ProductUrl,
        &["productUrl", "product_url", "url", "link", "productLink", "product_link"],
    ),
    (
        Attr::CompanyUrl,
        &["companyUrl", "company_url", "supplierUrl", "supplier_url", "storeUrl", "store_url", "shopUrl", "profileUrl"],
    ),
];

pub fn candidates(attr: Attr) -> &'static [&'static str] {
    FIELD_MAP
        .iter()
        .find(|(a, _)| *a == attr)
        .map(|(_, c)| *c)
        .unwrap_or(&[])
}

/// Look up a possibly dotted path in a raw record.
pub fn lookup<'a>(raw: &'a RawProviderRecord, path: &str) -> Option<&'a Value> {
    // Literal keys containing dots take precedence over nesting.
    if let Some(v) = raw.get(path) {
        return Some(v);
    }
    let mut parts = path.split('.');
    let mut cur = raw.get(parts.next()?)?;
    for p in parts {
        cur = cur.as_object()?.get(p)?;
    }
    Some(cur)
}

/// Whether a value carries anything usable.
pub fn is_present(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => a.iter().any(is_present),
        Value::Object(o) => o.values().any(is_present),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Generic first-match resolver: walk candidates in order and return the
/// first one `extract` accepts.
pub fn first_match<T>(
    raw: &RawProviderRecord,
    attr: Attr,
    extract: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    candidates(attr)
        .iter()
        .filter_map(|c| lookup(raw, c))
        .filter(|v| is_present(v))
        .find_map(extract)
}

pub fn resolve_text(raw: &RawProviderRecord, attr: Attr) -> Option<String> {
    first_match(raw, attr, value_as_text)
}

pub fn resolve_list(raw: &RawProviderRecord, attr: Attr) -> Vec<String> {
    first_match(raw, attr, |v| {
        let items = value_as_list(v);
        (!items.is_empty()).then_some(items)
    })
    .unwrap_or_default()
}

pub fn resolve_bool(raw: &RawProviderRecord, attr: Attr) -> Option<bool> {
    first_match(raw, attr, value_as_bool)
}

pub fn resolve_number(raw: &RawProviderRecord, attr: Attr) -> Option<f64> {
    first_match(raw, attr, value_as_number)
}

/// Strings are cleaned; numbers are rendered. Anything else is not text.
pub fn value_as_text(v: &Value) -> Option<String> {
    let s = match v {
        Value::String(s) => super::clean_text(s),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

/// Arrays of strings/objects, or a delimited string, become a clean list
/// with case-insensitive duplicates removed.
pub fn value_as_list(v: &Value) -> Vec<String> {
    let raw_items: Vec<String> = match v {
        Value::Array(items) => items.iter().filter_map(list_item_text).collect(),
        Value::String(s) => s
            .split([',', ';', '|', '\n', '、', '，'])
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    let mut out: Vec<String> = Vec::with_capacity(raw_items.len());
    for it in raw_items {
        let t = super::clean_text(&it);
        if t.is_empty() || out.iter().any(|o| o.eq_ignore_ascii_case(&t)) {
            continue;
        }
        out.push(t);
    }
    out
}

fn list_item_text(v: &Value) -> Option<String> {
    match v {
        Value::Object(o) => ["name", "title", "productName", "product_name"]
            .iter()
            .filter_map(|k| o.get(*k))
            .find_map(value_as_text),
        other => value_as_text(other),
    }
}

pub fn value_as_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|x| x != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub fn value_as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Parse a plain numeric string, tolerating thousands separators.
pub fn parse_number(s: &str) -> Option<f64> {
    let t = s.trim().replace(',', "");
    if t.is_empty() {
        return None;
    }
    t.parse::<f64>().ok().filter(|x| x.is_finite())
}
