//! Input checks shared by the API handlers.

use thiserror::Error;

pub const HANDLE_MIN_LEN: usize = 3;
pub const HANDLE_MAX_LEN: usize = 20;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const DESCRIPTION_MAX_LEN: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct InvalidInput(pub String);

impl InvalidInput {
    fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Trim and lowercase a handle, then check length and alphabet (`a-z`, `0-9`, `_`).
pub fn normalize_handle(raw: &str) -> Result<String, InvalidInput> {
    let handle = raw.trim().to_lowercase();
    if handle.is_empty() {
        return Err(InvalidInput::new("Handle is required"));
    }

    let len = handle.chars().count();
    if !(HANDLE_MIN_LEN..=HANDLE_MAX_LEN).contains(&len) {
        return Err(InvalidInput::new(format!(
            "Handle must be between {} and {} characters",
            HANDLE_MIN_LEN, HANDLE_MAX_LEN
        )));
    }

    if !handle
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(InvalidInput::new(
            "Handle may only contain lowercase letters, digits and underscores",
        ));
    }

    Ok(handle)
}

pub fn normalize_email(raw: &str) -> Result<String, InvalidInput> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(email)
        }
        _ => Err(InvalidInput::new("The email address is not valid")),
    }
}

pub fn check_password(password: &str) -> Result<(), InvalidInput> {
    if password.len() < PASSWORD_MIN_LEN {
        return Err(InvalidInput::new(format!(
            "Password must be at least {} characters",
            PASSWORD_MIN_LEN
        )));
    }
    Ok(())
}

/// Scores arrive signed so negative input is reported as a validation
/// failure instead of a deserialization error.
pub fn check_scores(reporter: i64, opponent: i64) -> Result<(u32, u32), InvalidInput> {
    if reporter < 0 || opponent < 0 {
        return Err(InvalidInput::new("Scores must be non-negative numbers"));
    }
    let (Ok(reporter), Ok(opponent)) = (u32::try_from(reporter), u32::try_from(opponent)) else {
        return Err(InvalidInput::new(format!("Scores must be at most {}", u32::MAX)));
    };
    if reporter == opponent {
        return Err(InvalidInput::new("Scores cannot be tied. One player must win"));
    }
    Ok((reporter, opponent))
}

pub fn check_description(description: &str) -> Result<(), InvalidInput> {
    if description.chars().count() > DESCRIPTION_MAX_LEN {
        return Err(InvalidInput::new(format!(
            "Description must be at most {} characters",
            DESCRIPTION_MAX_LEN
        )));
    }
    Ok(())
}

/// Empty or whitespace-only values clear the field.
pub fn optional_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_is_trimmed_and_lowercased() {
        assert_eq!(normalize_handle("  Hooper_23 ").unwrap(), "hooper_23");
    }

    #[test]
    fn handle_length_bounds() {
        assert!(normalize_handle("ab").is_err());
        assert!(normalize_handle("abc").is_ok());
        assert!(normalize_handle(&"a".repeat(20)).is_ok());
        assert!(normalize_handle(&"a".repeat(21)).is_err());
        assert!(normalize_handle("   ").is_err());
    }

    #[test]
    fn handle_alphabet() {
        assert!(normalize_handle("bad-handle").is_err());
        assert!(normalize_handle("space man").is_err());
        assert!(normalize_handle("ñandú").is_err());
    }

    #[test]
    fn tied_or_negative_scores_rejected() {
        assert!(check_scores(7, 7).is_err());
        assert!(check_scores(-1, 7).is_err());
        assert!(check_scores(7, -3).is_err());
        assert_eq!(check_scores(11, 7).unwrap(), (11, 7));
        assert_eq!(check_scores(0, 1).unwrap(), (0, 1));
    }

    #[test]
    fn oversized_scores_name_the_limit() {
        let too_big = i64::from(u32::MAX) + 1;
        let err = check_scores(too_big, 3).unwrap_err();
        assert!(err.0.contains("at most"), "{}", err.0);
        let err = check_scores(-1, too_big).unwrap_err();
        assert!(err.0.contains("non-negative"), "{}", err.0);
        assert_eq!(check_scores(i64::from(u32::MAX), 0).unwrap(), (u32::MAX, 0));
    }

    #[test]
    fn email_shape() {
        assert_eq!(normalize_email(" Ana@Example.com ").unwrap(), "ana@example.com");
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("a@b@c").is_err());
    }

    #[test]
    fn blank_text_clears() {
        assert_eq!(optional_text("   "), None);
        assert_eq!(optional_text(" x "), Some("x".into()));
    }
}
