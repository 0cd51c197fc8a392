use crate::error::ApiError;
use std::str::FromStr;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Loose shape check: one `@`, non-empty local part, dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.split('.').count() >= 2
        && domain.split('.').all(|part| !part.is_empty())
}

/// `#rgb` or `#rrggbb`.
pub fn is_hex_color(value: &str) -> bool {
    value
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Rejects blank values, returning the trimmed text.
pub fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ApiError::bad_request(format!("{field} is required")))
    } else {
        Ok(trimmed)
    }
}

pub fn email(field: &str, value: &str) -> Result<(), ApiError> {
    if is_valid_email(value.trim()) {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!("{field} must be a valid email address")))
    }
}

/// Parses one of a fixed set of values, listing the allowed ones on failure.
pub fn one_of<T: FromStr>(field: &str, value: &str, allowed: &[&str]) -> Result<T, ApiError> {
    T::from_str(value).map_err(|_| {
        ApiError::bad_request(format!("Invalid {field}. Allowed: {}", allowed.join(", ")))
    })
}

pub fn new_password(password: &str, confirm: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if password != confirm {
        return Err(ApiError::bad_request("Passwords do not match"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::leave::LeaveType;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("john.doe@company.com"));
        assert!(!is_valid_email("john.doe"));
        assert!(!is_valid_email("@company.com"));
        assert!(!is_valid_email("john@localhost"));
        assert!(!is_valid_email("john@company."));
        assert!(!is_valid_email("jo hn@company.com"));
        assert!(!is_valid_email("a@b@company.com"));
    }

    #[test]
    fn hex_colors() {
        assert!(is_hex_color("#1e40af"));
        assert!(is_hex_color("#FFF"));
        assert!(!is_hex_color("1e40af"));
        assert!(!is_hex_color("#12345"));
        assert!(!is_hex_color("#gggggg"));
    }

    #[test]
    fn required_trims() {
        assert_eq!(required("title", "  Q1 plan ").unwrap(), "Q1 plan");
        assert!(required("title", "   ").is_err());
    }

    #[test]
    fn password_rules() {
        assert!(new_password("secret1", "secret1").is_ok());
        assert!(new_password("short", "short").is_err());
        assert!(new_password("secret1", "secret2").is_err());
    }

    #[test]
    fn one_of_lists_allowed_values() {
        let err = one_of::<LeaveType>("leave type", "vacation", &["annual", "sick", "unpaid"]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid leave type. Allowed: annual, sick, unpaid");
        assert_eq!(one_of::<LeaveType>("leave type", "sick", &[]).unwrap(), LeaveType::Sick);
    }
}
