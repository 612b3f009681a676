//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::battle::room_code;

/// Longest display name accepted.
pub const MAX_USERNAME_CHARS: usize = 64;

/// Validates a room code as typed by a user. Case and surrounding spaces are ignored.
///
/// ```ignore
/// validate_room_code("ab3kq9")  // Ok
/// validate_room_code("AB1KQ9")  // Err - `1` is never generated
/// ```
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    let normalized = room_code::normalize_room_code(code);
    if normalized.is_empty() || normalized.len() > 16 {
        let mut err = ValidationError::new("room_code_length");
        err.message = Some(
            format!(
                "Room code must be between 1 and 16 characters (got {})",
                normalized.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !room_code::is_well_formed(&normalized) {
        let mut err = ValidationError::new("room_code_format");
        err.message = Some("Room code contains characters that are never generated".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a display name: not blank and at most [`MAX_USERNAME_CHARS`] characters.
pub fn validate_username(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("username_empty");
        err.message = Some("Username must not be blank".into());
        return Err(err);
    }

    if trimmed.chars().count() > MAX_USERNAME_CHARS {
        let mut err = ValidationError::new("username_length");
        err.message = Some(format!("Username must be at most {MAX_USERNAME_CHARS} characters").into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_room_code_valid() {
        assert!(validate_room_code("AB3KQ9").is_ok());
        assert!(validate_room_code(" ab3kq9 ").is_ok());
    }

    #[test]
    fn test_validate_room_code_invalid() {
        assert!(validate_room_code("").is_err());
        assert!(validate_room_code("   ").is_err());
        assert!(validate_room_code("AB0KQ9").is_err()); // zero is ambiguous
        assert!(validate_room_code("AB-KQ9").is_err());
        assert!(validate_room_code("ABCDEFGHJKLMNPQRS").is_err()); // too long
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("Ada").is_ok());
        assert!(validate_username("  ").is_err());
        assert!(validate_username(&"x".repeat(65)).is_err());
    }
}
