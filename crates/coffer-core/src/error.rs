//! Error types for Coffer core operations.
//!
//! This module defines the error hierarchy for all core operations.
//! Errors are descriptive at the core level; the CLI layer will map these
//! to user-friendly messages.
//!
//! Expected decode failures (a legacy or unencrypted row that does not carry
//! a valid envelope) surface as the recoverable `Integrity` kind so callers
//! can degrade gracefully. Corrupt key material and crypto backend failures
//! use the fatal `Crypto` kind.

use thiserror::Error;

/// Result type alias for Coffer operations.
pub type Result<T> = std::result::Result<T, CofferError>;

/// Core error type for Coffer operations.
#[derive(Debug, Error)]
pub enum CofferError {
    /// Crypto backend failure during key-pair creation
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// Password cannot decrypt the stored private key
    #[error("Incorrect password")]
    IncorrectPassword,

    /// Checksum or length mismatch on decrypt (recoverable)
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// Candidate system key fails the self-check
    #[error("System key failed verification")]
    Verification,

    /// A wrap step or a column rewrite failed during rotation
    #[error("Rotation failed: {0}")]
    Rotation(String),

    /// Unrecoverable cryptographic failure (corrupt key material, backend)
    #[error("Encryption error: {0}")]
    Crypto(String),

    /// Preference store backend error (generic)
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite-specific storage error
    #[error("SQLite error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl CofferError {
    /// Whether this error is an expected, recoverable decode failure.
    ///
    /// Legacy or unencrypted rows decode to `Integrity`; callers that read
    /// mixed data may treat such values as plaintext instead of failing.
    pub fn is_integrity(&self) -> bool {
        matches!(self, CofferError::Integrity(_))
    }
}
