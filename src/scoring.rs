//! Confidence scorer: classification confidence plus completeness bonuses,
//! rounded and clamped to an integer percentage.

use crate::model::CanonicalManufacturerRecord;

pub const FACTORY_FLAG_BONUS: f64 = 10.0;
pub const EQUIPMENT_BONUS: f64 = 5.0;
pub const PER_CERTIFICATION_BONUS: f64 = 2.0;
pub const FULL_CONTACT_BONUS: f64 = 5.0;
pub const FULL_LOCATION_BONUS: f64 = 5.0;

/// Bonuses are independent; only the final clamp bounds them.
pub fn score(record: &CanonicalManufacturerRecord, classification_confidence: f64) -> u8 {
    let base = if classification_confidence.is_finite() {
        classification_confidence * 100.0
    } else {
        0.0
    };
    let mut total = base;

    if let Some(f) = &record.factory_info {
        if f.has_factory {
            total += FACTORY_FLAG_BONUS;
        }
        if !f.production_equipment.is_empty() {
            total += EQUIPMENT_BONUS;
        }
    }
    total += PER_CERTIFICATION_BONUS * record.certifications.len() as f64;
    if record.contact.phone.is_some() && record.contact.email.is_some() {
        total += FULL_CONTACT_BONUS;
    }
    if record.location.is_complete() {
        total += FULL_LOCATION_BONUS;
    }

    total.round().clamp(0.0, 100.0) as u8
}
