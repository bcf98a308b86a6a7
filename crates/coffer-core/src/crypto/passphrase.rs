//! Password validation.
//!
//! Enforces minimum requirements for the login passwords that protect
//! per-user private keys.

use crate::error::{CofferError, Result};

/// Minimum password length in characters.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Validate a password meets minimum requirements.
///
/// # Requirements
///
/// - At least 8 characters long
/// - Not empty or only whitespace
pub fn validate_password(password: &str) -> Result<()> {
    if password.trim().is_empty() {
        return Err(CofferError::InvalidInput(
            "Password cannot be empty".to_string(),
        ));
    }

    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(CofferError::InvalidInput(format!(
            "Password must be at least {} characters (got {})",
            MIN_PASSWORD_LENGTH,
            password.len()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_password() {
        assert!(validate_password("my-secure-password-123").is_ok());
        assert!(validate_password("exactly8").is_ok());
    }

    #[test]
    fn test_password_too_short() {
        let result = validate_password("short");
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("at least 8 characters"));
    }

    #[test]
    fn test_password_empty_or_blank() {
        assert!(validate_password("").is_err());
        assert!(validate_password("   ").is_err());
        assert!(validate_password("\n\t").is_err());
    }
}
