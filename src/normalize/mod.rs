// src/normalize/mod.rs
//! Maps provider records into `CanonicalManufacturerRecord`.

pub mod fields;
pub mod gazetteer;

use once_cell::sync::OnceCell;
use regex::Regex;
use thiserror::Error;

use crate::model::{
    CanonicalManufacturerRecord, Contact, ExternalLinks, FactoryInfo, Location, Pricing,
    RawProviderRecord, GENERAL_PRODUCTS, UNKNOWN_COMPANY,
};
use fields::{
    resolve_bool, resolve_list, resolve_number, resolve_text, value_as_number, Attr,
};

pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("record has no usable fields")]
    Empty,
}

/// Decode entities, strip tags, collapse whitespace.
pub fn clean_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Collapse whitespace (incl. nbsp)
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"[\s\u{00A0}]+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Normalize one provider record. Fails only when the record carries no
/// usable field at all.
pub fn normalize(
    raw: &RawProviderRecord,
    seller_id: &str,
) -> Result<CanonicalManufacturerRecord, NormalizeError> {
    if !raw.values().any(fields::is_present) {
        return Err(NormalizeError::Empty);
    }

    let company_name =
        resolve_text(raw, Attr::CompanyName).unwrap_or_else(|| UNKNOWN_COMPANY.to_string());
    let description = resolve_text(raw, Attr::Description);

    let mut products = resolve_list(raw, Attr::Products);
    if products.is_empty() {
        products.push(GENERAL_PRODUCTS.to_string());
    }

    let contact = Contact {
        person: resolve_text(raw, Attr::ContactPerson),
        phone: resolve_text(raw, Attr::Phone),
        email: resolve_text(raw, Attr::Email),
        wechat: resolve_text(raw, Attr::Wechat),
    };

    let location = normalize_location(raw, &company_name);

    Ok(CanonicalManufacturerRecord {
        seller_id: seller_id.to_string(),
        company_name,
        description,
        products,
        contact,
        location,
        factory_info: normalize_factory(raw),
        certifications: resolve_list(raw, Attr::Certifications),
        pricing: normalize_pricing(raw),
        external_links: ExternalLinks {
            product_url: resolve_text(raw, Attr::ProductUrl),
            company_url: resolve_text(raw, Attr::CompanyUrl),
        },
    })
}

/// Structured fields first; otherwise derive city/province from the
/// address text and finally from the company name.
pub fn normalize_location(raw: &RawProviderRecord, company_name: &str) -> Location {
    let address = resolve_text(raw, Attr::Address);
    let explicit_city = resolve_text(raw, Attr::City);
    let explicit_province = resolve_text(raw, Attr::Province);

    let scanned_city = address
        .as_deref()
        .and_then(gazetteer::city_in_address)
        .or_else(|| gazetteer::find_city(company_name));

    let city = explicit_city
        .clone()
        .or_else(|| scanned_city.map(|c| c.name.to_string()));

    let province = explicit_province
        .or_else(|| explicit_city.as_deref().and_then(gazetteer::province_of).map(str::to_string))
        .or_else(|| scanned_city.map(|c| c.province.to_string()))
        .or_else(|| {
            address
                .as_deref()
                .and_then(gazetteer::find_province)
                .or_else(|| gazetteer::find_province(company_name))
                .map(|p| p.name.to_string())
        });

    Location {
        city,
        province,
        address,
    }
}

/// Human-readable location line: address, city, province with repeated
/// comma-separated tokens removed.
pub fn display_location(loc: &Location) -> Option<String> {
    let joined = [&loc.address, &loc.city, &loc.province]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let collapsed = collapse_location_tokens(&joined);
    (!collapsed.is_empty()).then_some(collapsed)
}

/// Collapse duplicate comma-separated tokens (case-insensitive), keeping
/// first-seen order and spelling.
pub fn collapse_location_tokens(s: &str) -> String {
    let mut seen: Vec<String> = Vec::new();
    let mut out: Vec<&str> = Vec::new();
    for tok in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let key = tok.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(tok);
    }
    out.join(", ")
}

fn normalize_factory(raw: &RawProviderRecord) -> Option<FactoryInfo> {
    let flag = resolve_bool(raw, Attr::HasFactory);
    let production_equipment = resolve_list(raw, Attr::Equipment);
    let details = resolve_text(raw, Attr::FactoryDetails);

    if flag.is_none() && production_equipment.is_empty() && details.is_none() {
        return None;
    }
    let has_factory = flag.unwrap_or(details.is_some() || !production_equipment.is_empty());
    Some(FactoryInfo {
        has_factory,
        production_equipment,
        details,
    })
}

/// Range string first, then min/max with currency, then a single price.
pub fn normalize_pricing(raw: &RawProviderRecord) -> Option<Pricing> {
    let currency = resolve_text(raw, Attr::Currency).unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    if let Some(range) = resolve_text(raw, Attr::PriceRange) {
        return Some(Pricing {
            currency,
            price_range: range,
        });
    }

    let min = resolve_number(raw, Attr::MinPrice);
    let max = resolve_number(raw, Attr::MaxPrice);
    let combined = match (min, max) {
        (Some(lo), Some(hi)) => Some(format!("{currency} {}-{}", fmt_amount(lo), fmt_amount(hi))),
        (Some(v), None) | (None, Some(v)) => Some(format!("{currency} {}", fmt_amount(v))),
        (None, None) => None,
    };
    if let Some(price_range) = combined {
        return Some(Pricing {
            currency,
            price_range,
        });
    }

    let price = fields::first_match(raw, Attr::Price, |v| {
        value_as_number(v)
            .map(|n| format!("{currency} {}", fmt_amount(n)))
            .or_else(|| fields::value_as_text(v))
    })?;
    Some(Pricing {
        currency,
        price_range: price,
    })
}

fn fmt_amount(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{v:.2}")
    }
}
