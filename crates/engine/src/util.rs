//! Internal helpers for validation and conversion.
//!
//! These utilities are **not** part of the public API.

use chrono::Utc;
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

pub(crate) const PURCHASE_PREFIX: &str = "epwr";
pub(crate) const TOPUP_PREFIX: &str = "epay";

/// Build an external reference: `<prefix>_<unix millis>_<8 hex>`.
///
/// The random suffix keeps two references minted in the same millisecond
/// apart.
pub(crate) fn new_reference(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{millis}_{}", &suffix[..8])
}

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::InvalidState(format!("invalid {label} id")))
}

pub(crate) fn normalize_email(value: &str) -> ResultEngine<String> {
    let email = value.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(EngineError::InvalidState(format!("invalid email: {value}")));
    }
    Ok(email)
}

pub(crate) fn normalize_required(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidState(format!("{label} must not be empty")));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_carry_prefix_and_differ() {
        let a = new_reference(PURCHASE_PREFIX);
        let b = new_reference(PURCHASE_PREFIX);
        assert!(a.starts_with("epwr_"));
        assert_eq!(a.split('_').count(), 3);
        assert_ne!(a, b);
    }

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(
            normalize_email("  Ada@Example.COM ").unwrap(),
            "ada@example.com"
        );
        assert!(normalize_email("nobody").is_err());
    }
}
