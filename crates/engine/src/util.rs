//! Internal helpers for validation and conversion.
//!
//! These utilities are **not** part of the public API.

use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Trimmed, NFC-normalized text that must not be empty.
pub(crate) fn normalize_required_text(value: &str, label: &str) -> ResultEngine<String> {
    let normalized: String = value.trim().nfc().collect();
    if normalized.is_empty() {
        return Err(EngineError::Validation(format!("{label} must not be empty")));
    }
    Ok(normalized)
}

/// Trimmed, NFC-normalized text; may be empty.
pub(crate) fn normalize_text(value: &str) -> String {
    value.trim().nfc().collect()
}

/// Optional blob reference: blank means none.
pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

pub(crate) fn validate_amount(amount: f64) -> ResultEngine<f64> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(EngineError::Validation(
            "amount must be a positive number".to_string(),
        ));
    }
    Ok(amount)
}

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::NotFound(format!("invalid {label} id")))
}

/// Amount rounded to cents, without trailing zeros (`12.5`, `30`).
pub(crate) fn format_amount(amount: f64) -> String {
    let cents = (amount * 100.0).round() / 100.0;
    format!("{cents}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_text_is_trimmed_and_checked() {
        assert_eq!(normalize_required_text("  Trip ", "name").unwrap(), "Trip");
        assert!(normalize_required_text("   ", "name").is_err());
    }

    #[test]
    fn required_text_is_nfc_normalized() {
        let decomposed = "Cafe\u{301}";
        assert_eq!(
            normalize_required_text(decomposed, "label").unwrap(),
            "Caf\u{e9}"
        );
    }

    #[test]
    fn amounts_must_be_positive_and_finite() {
        assert!(validate_amount(0.0).is_err());
        assert!(validate_amount(-1.0).is_err());
        assert!(validate_amount(f64::NAN).is_err());
        assert!(validate_amount(f64::INFINITY).is_err());
        assert_eq!(validate_amount(12.5).unwrap(), 12.5);
    }

    #[test]
    fn formats_amounts_to_cents() {
        assert_eq!(format_amount(30.0), "30");
        assert_eq!(format_amount(12.5), "12.5");
        assert_eq!(format_amount(0.1 + 0.2), "0.3");
        assert_eq!(format_amount(10.0 / 3.0), "3.33");
    }
}
