//! Field validation rules applied before anything is written

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{DirectoryError, DirectoryResult};
use crate::tax_id;

/// Maximum length of free-text columns
pub const MAX_TEXT_LEN: usize = 255;

/// Maximum length of a phone number
pub const MAX_PHONE_LEN: usize = 31;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles")
});

/// Trimmed, non-blank text no longer than `max` characters
pub fn required_text(field: &str, value: &str, max: usize) -> DirectoryResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DirectoryError::validation(field, "is required"));
    }
    if value.chars().count() > max {
        return Err(DirectoryError::validation(
            field,
            format!("may not be greater than {max} characters"),
        ));
    }
    Ok(value.to_string())
}

/// Optional text: blank collapses to `None`
pub fn optional_text(field: &str, value: Option<&str>, max: usize) -> DirectoryResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => required_text(field, value, max).map(Some),
    }
}

pub fn tax_id(field: &str, value: &str) -> DirectoryResult<String> {
    let value = required_text(field, value, MAX_TEXT_LEN)?;
    if !tax_id::is_valid(&value) {
        return Err(DirectoryError::validation(
            field,
            "must be a valid tax identifier",
        ));
    }
    Ok(value)
}

pub fn email(field: &str, value: &str) -> DirectoryResult<String> {
    let value = required_text(field, value, MAX_TEXT_LEN)?;
    if !EMAIL_RE.is_match(&value) {
        return Err(DirectoryError::validation(
            field,
            "must be a valid email address",
        ));
    }
    Ok(value)
}

/// Deduplicate an id list, rejecting non-positive ids outright
pub fn id_set(field: &str, ids: &[i64]) -> DirectoryResult<BTreeSet<i64>> {
    let invalid: Vec<i64> = ids.iter().copied().filter(|id| *id <= 0).collect();
    if !invalid.is_empty() {
        return Err(DirectoryError::validation(
            field,
            format!("unknown ids: {}", crate::error::join_ids(&invalid)),
        ));
    }
    Ok(ids.iter().copied().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text_trims() {
        assert_eq!(required_text("name", "  Acme  ", 255).unwrap(), "Acme");
        assert!(required_text("name", "   ", 255).is_err());
    }

    #[test]
    fn test_required_text_counts_characters() {
        let value = "ż".repeat(255);
        assert!(required_text("name", &value, 255).is_ok());
        assert!(required_text("name", &format!("{value}a"), 255).is_err());
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text("phone", None, 31).unwrap(), None);
        assert_eq!(optional_text("phone", Some(" "), 31).unwrap(), None);
        assert_eq!(
            optional_text("phone", Some("+48 600 700 800"), 31).unwrap(),
            Some("+48 600 700 800".to_string())
        );
        assert!(optional_text("phone", Some(&"1".repeat(32)), 31).is_err());
    }

    #[test]
    fn test_tax_id_rule() {
        assert_eq!(tax_id("tax_id", " 5260250021 ").unwrap(), "5260250021");
        let err = tax_id("tax_id", "1234567890").unwrap_err();
        assert_eq!(err.to_string(), "tax_id: must be a valid tax identifier");
    }

    #[test]
    fn test_email_rule() {
        assert!(email("email", "jan.kowalski@example.com").is_ok());
        assert!(email("email", "not-an-email").is_err());
        assert!(email("email", "a@b").is_err());
    }

    #[test]
    fn test_id_set() {
        assert_eq!(
            id_set("people", &[3, 1, 3]).unwrap().into_iter().collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert!(id_set("people", &[1, 0]).is_err());
    }
}
