//! Password prompting.
//!
//! Every secret can arrive through an environment variable for scripted
//! use; the interactive prompt is the fallback. Passwords that protect a
//! freshly generated key pair are confirmed twice.

use dialoguer::Password;

use coffer_core::SystemKey;

/// Environment variable carrying the acting member's password.
pub const PASSWORD_ENV: &str = "COFFER_PASSWORD";
/// Environment variable carrying a newly-set password.
pub const NEW_PASSWORD_ENV: &str = "COFFER_NEW_PASSWORD";
/// Environment variable carrying an operator-chosen system key.
pub const SYSTEM_KEY_ENV: &str = "COFFER_SYSTEM_KEY";
/// Environment variable carrying the replacement key for a rotation.
pub const NEW_SYSTEM_KEY_ENV: &str = "COFFER_NEW_SYSTEM_KEY";

fn env_value(var: &str) -> Option<String> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

/// Read an existing password from `COFFER_PASSWORD` or prompt for it.
pub fn prompt_password(prompt: &str) -> anyhow::Result<String> {
    if let Some(value) = env_value(PASSWORD_ENV) {
        return Ok(value);
    }
    Password::new()
        .with_prompt(prompt)
        .interact()
        .map_err(|e| anyhow::anyhow!("Failed to read password: {}", e))
}

/// Read a new password from `COFFER_NEW_PASSWORD` or prompt with
/// confirmation.
pub fn prompt_new_password(prompt: &str) -> anyhow::Result<String> {
    if let Some(value) = env_value(NEW_PASSWORD_ENV) {
        return Ok(value);
    }
    Password::new()
        .with_prompt(prompt)
        .with_confirmation(format!("Confirm {}", prompt.to_lowercase()), "Passwords do not match")
        .interact()
        .map_err(|e| anyhow::anyhow!("Failed to read password: {}", e))
}

/// An operator-chosen system key from the given environment variable, if
/// one is set. Human-chosen passphrases are valid keys; the cipher pads
/// them to size.
pub fn system_key_from_env(var: &str) -> Option<SystemKey> {
    env_value(var).map(SystemKey::new)
}
