//! # Coffer Core
//!
//! Core library for Coffer: group-shared encryption for sensitive
//! configuration values and whitelisted database columns.
//!
//! One symmetric system key serves a closed group of authenticated users.
//! It is never persisted in clear: each member holds it wrapped under their
//! own public key, so it survives any single member's password change and
//! can be rotated, with bulk re-encryption of everything it protects,
//! without a central key-escrow service.
//!
//! ## Architecture
//!
//! - **crypto::value**: symmetric value cipher with integrity framing
//!   (preserved legacy format)
//! - **crypto::keypair**: per-user key pairs, private half password-protected
//! - **session**: session-scoped cache for decrypted key material
//! - **distributor**: per-member wrapping, self-check verification, rotation
//! - **reencrypt**: bulk re-encryption of registered columns on rotation
//! - **storage**: the user and app preference stores everything persists to
//!
//! ## Host integration
//!
//! On login call [`KeyDistributor::establish_session`]; on logout
//! [`SessionContext::clear`]; on password change
//! [`KeyDistributor::rewrap_after_password_change`]. Everything takes its
//! stores and session explicitly; there is no process-wide state.

pub mod crypto;
pub mod distributor;
pub mod error;
pub mod reencrypt;
pub mod session;
pub mod storage;

pub use crypto::key::SystemKey;
pub use crypto::keypair::{KeyPairService, PrivateKeyHandle, UserKeyPair};
pub use crypto::passphrase::validate_password;
pub use distributor::{KeyDistributor, RotationReport};
pub use error::{CofferError, Result};
pub use reencrypt::{EncryptedTable, ReencryptReport};
pub use session::{SessionContext, SessionLifetime};
pub use storage::prefs::{AppPrefStore, MemoryPrefStore, SqlitePrefStore, UserPrefStore};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
