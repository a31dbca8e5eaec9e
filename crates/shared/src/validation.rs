//! Common validation utilities for registration input.

use validator::{ValidateEmail, ValidationError};

/// Maximum length accepted for a phone number.
pub const MAX_PHONE_LENGTH: usize = 40;

/// Lowercases and trims an email address so that lookups are stable.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validates that an email address is present and well formed.
pub fn validate_email_address(email: &str) -> Result<(), ValidationError> {
    let normalized = normalize_email(email);
    if normalized.is_empty() {
        let mut err = ValidationError::new("email_required");
        err.message = Some("Email address is required".into());
        return Err(err);
    }
    if !normalized.validate_email() {
        let mut err = ValidationError::new("email_invalid");
        err.message = Some("Please provide a valid email address".into());
        return Err(err);
    }
    Ok(())
}

/// Validates that a phone number only contains dialable characters.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let trimmed = phone.trim();
    let allowed = |c: char| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')' | '.');
    if trimmed.len() > MAX_PHONE_LENGTH || !trimmed.chars().all(allowed) {
        let mut err = ValidationError::new("phone_invalid");
        err.message = Some("Phone number contains invalid characters".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::faker::internet::en::SafeEmail;
    use fake::Fake;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
        assert_eq!(normalize_email(""), "");
    }

    #[test]
    fn test_validate_email_address() {
        assert!(validate_email_address("a@x.com").is_ok());
        assert!(validate_email_address(" A@X.com ").is_ok());
        assert!(validate_email_address("not-an-email").is_err());
    }

    #[test]
    fn test_validate_email_address_generated() {
        for _ in 0..20 {
            let email: String = SafeEmail().fake();
            assert!(validate_email_address(&email).is_ok(), "{}", email);
        }
    }

    #[test]
    fn test_validate_email_address_empty_message() {
        let err = validate_email_address("   ").unwrap_err();
        assert_eq!(
            err.message.unwrap().to_string(),
            "Email address is required"
        );
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+49 (0) 30-1234.567").is_ok());
        assert!(validate_phone("").is_ok());
        assert!(validate_phone("call me").is_err());
        assert!(validate_phone(&"1".repeat(41)).is_err());
    }
}
