use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ApiError;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        // Fixed provider and TLD allow-lists; anything else is rejected.
        static ref EMAIL_RE: Regex = Regex::new(
            r"^[a-zA-Z0-9._%+-]+@(gmail|outlook|hotmail|yahoo|proton|zoho|mail|aol|yandex)\.(com|org|net|gov|edu|mil|co|info|de|co\.uk|ca|me|tr|com\.tr)$"
        )
        .unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// At least 8 chars, one digit, one lowercase and one uppercase letter.
pub(crate) fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= 8
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
}

/// Registration field checks, in fixed precedence: presence, username length,
/// email format, password strength. Pure, no store access.
pub(crate) fn validate_registration(
    username: &str,
    email: &str,
    password: &str,
) -> Result<(), ApiError> {
    if username.is_empty() || email.is_empty() || password.is_empty() {
        return Err(ApiError::MissingFields);
    }
    if username.chars().count() < 4 {
        return Err(ApiError::Validation(
            "Username is required and must be at least 4 characters long.".into(),
        ));
    }
    if !is_valid_email(email) {
        return Err(ApiError::Validation("Please enter a valid email.".into()));
    }
    if !is_strong_password(password) {
        return Err(ApiError::Validation(
            "Password needs to have at least 8 chars and must contain at least one number, one lowercase and one uppercase letter.".into(),
        ));
    }
    Ok(())
}

/// Login only checks the email shape before delegating to credential
/// verification.
pub(crate) fn validate_login_email(email: &str) -> Result<(), ApiError> {
    if !is_valid_email(email) {
        return Err(ApiError::Validation("Please enter a valid email.".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_allowed_provider_and_tld() {
        assert!(is_valid_email("newuser@gmail.com"));
        assert!(is_valid_email("a.b+c@outlook.co.uk"));
        assert!(is_valid_email("x_y%z@yandex.org"));
    }

    #[test]
    fn rejects_unknown_provider_or_tld() {
        assert!(!is_valid_email("user@example.com"));
        assert!(!is_valid_email("user@gmail.xyz"));
        assert!(!is_valid_email("invalid-email"));
        assert!(!is_valid_email("user@gmail"));
    }

    #[test]
    fn password_strength_requires_all_classes() {
        assert!(is_strong_password("ValidPass123."));
        assert!(!is_strong_password("short1A"));
        assert!(!is_strong_password("alllowercase1"));
        assert!(!is_strong_password("ALLUPPERCASE1"));
        assert!(!is_strong_password("NoDigitsHere"));
    }

    #[test]
    fn empty_field_wins_over_everything_else() {
        let err = validate_registration("", "", "").unwrap_err();
        assert!(matches!(err, ApiError::MissingFields));

        // Even with an otherwise invalid username, presence is checked first.
        let err = validate_registration("x", "", "weak").unwrap_err();
        assert!(matches!(err, ApiError::MissingFields));
    }

    #[test]
    fn short_username_wins_over_bad_email() {
        let err = validate_registration("abc", "not-an-email", "weak").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Username is required and must be at least 4 characters long."
        );
    }

    #[test]
    fn bad_email_wins_over_weak_password() {
        let err = validate_registration("validUser", "not-an-email", "weak").unwrap_err();
        assert_eq!(err.to_string(), "Please enter a valid email.");
    }

    #[test]
    fn weak_password_is_last() {
        let err = validate_registration("validUser", "validuser@gmail.com", "weak").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Password needs to have at least 8 chars and must contain at least one number, one lowercase and one uppercase letter."
        );
    }

    #[test]
    fn valid_registration_passes() {
        assert!(validate_registration("newUser", "newuser@gmail.com", "ValidPass123.").is_ok());
    }
}
