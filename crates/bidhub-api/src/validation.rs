//! Field-level validation errors, collected in one pass so the caller can
//! report every problem with a submission at once.

use std::fmt;
use std::ops::RangeInclusive;

use bidhub_types::api::FieldErrorBody;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldErrorKind {
    Required,
    TooLong,
    TooShort,
    NotPositive,
    OutOfRange,
    Invalid,
    Mismatch,
    /// Neither a buy-it-now price nor a starting bid was given.
    MissingPrice,
}

impl FieldErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::TooLong => "too_long",
            Self::TooShort => "too_short",
            Self::NotPositive => "not_positive",
            Self::OutOfRange => "out_of_range",
            Self::Invalid => "invalid",
            Self::Mismatch => "mismatch",
            Self::MissingPrice => "missing_price",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub kind: FieldErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, kind: FieldErrorKind, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            kind,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// Errors recorded against `field`.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldError> {
        self.0.iter().filter(move |e| e.field == field)
    }

    pub fn has(&self, field: &str, kind: FieldErrorKind) -> bool {
        self.for_field(field).any(|e| e.kind == kind)
    }

    /// `Ok(value)` when nothing was recorded, otherwise the collected errors.
    pub fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, Self> {
        if self.is_empty() { Ok(value()) } else { Err(self) }
    }

    pub fn to_bodies(&self) -> Vec<FieldErrorBody> {
        self.0
            .iter()
            .map(|e| FieldErrorBody {
                field: e.field.clone(),
                code: e.kind.code().to_string(),
                message: e.message.clone(),
            })
            .collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.iter().map(|e| e.field.as_str()).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

/// Trim a required text field and check it against `max` characters.
/// Returns the trimmed value when it is acceptable.
pub fn required_text(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
    max: usize,
    missing_message: &str,
) -> Option<String> {
    let trimmed = value.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        errors.push(field, FieldErrorKind::Required, missing_message);
        return None;
    }
    optional_text(errors, field, Some(trimmed), max)
}

/// Like [`required_text`] but absent or blank values are simply `None`.
pub fn optional_text(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
    max: usize,
) -> Option<String> {
    let trimmed = value.map(str::trim).filter(|v| !v.is_empty())?;
    if trimmed.chars().count() > max {
        errors.push(
            field,
            FieldErrorKind::TooLong,
            format!("Must be at most {max} characters"),
        );
        return None;
    }
    Some(trimmed.to_string())
}

pub const USERNAME_LEN: RangeInclusive<usize> = 3..=32;

/// Trimmed username, if it has an acceptable length.
pub fn check_username(errors: &mut ValidationErrors, value: &str) -> Option<String> {
    let username = value.trim();
    if !USERNAME_LEN.contains(&username.chars().count()) {
        errors.push(
            "username",
            FieldErrorKind::Invalid,
            "Username must be between 3 and 32 characters",
        );
        return None;
    }
    Some(username.to_string())
}

/// Very small sanity check; deliverability is proven by the reset email itself.
pub fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@') && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_text_trims_and_bounds() {
        let mut errors = ValidationErrors::new();
        assert_eq!(
            required_text(&mut errors, "title", Some("  Bike "), 10, "Please enter a title"),
            Some("Bike".to_string())
        );
        assert_eq!(required_text(&mut errors, "title", Some("   "), 10, "Please enter a title"), None);
        assert_eq!(required_text(&mut errors, "name", None, 10, "Please enter a name"), None);
        assert_eq!(required_text(&mut errors, "long", Some("abcdefghijk"), 10, "x"), None);

        assert!(errors.has("title", FieldErrorKind::Required));
        assert!(errors.has("name", FieldErrorKind::Required));
        assert!(errors.has("long", FieldErrorKind::TooLong));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn length_is_counted_in_characters() {
        let mut errors = ValidationErrors::new();
        let value = "é".repeat(10);
        assert!(optional_text(&mut errors, "title", Some(&value), 10).is_some());
        assert!(errors.is_empty());
    }

    #[test]
    fn username_bounds() {
        let mut errors = ValidationErrors::new();
        assert_eq!(check_username(&mut errors, "  bob "), Some("bob".to_string()));
        assert_eq!(check_username(&mut errors, &"x".repeat(32)).map(|u| u.len()), Some(32));
        assert!(errors.is_empty());

        assert_eq!(check_username(&mut errors, "ab"), None);
        assert_eq!(check_username(&mut errors, &"x".repeat(33)), None);
        assert_eq!(errors.for_field("username").count(), 2);
    }

    #[test]
    fn email_sanity_check() {
        assert!(looks_like_email("a@b.com"));
        assert!(!looks_like_email("ab.com"));
        assert!(!looks_like_email("@b.com"));
        assert!(!looks_like_email("a@"));
        assert!(!looks_like_email("a b@c.com"));
        assert_eq!(normalize_email("  A@B.com "), "a@b.com");
    }

    #[test]
    fn bodies_carry_codes() {
        let mut errors = ValidationErrors::new();
        errors.push("quantity", FieldErrorKind::OutOfRange, "Quantity must be at most 100");
        let bodies = errors.to_bodies();
        assert_eq!(bodies[0].code, "out_of_range");
        assert_eq!(bodies[0].field, "quantity");
    }
}
