//! Cryptographic operations for Coffer.
//!
//! This module provides the value cipher, the shared system key, and the
//! per-user key pairs, using well-audited libraries:
//! - **Age**: X25519 recipient encryption and scrypt passphrase encryption
//! - **AES** (RustCrypto): the preserved legacy value-envelope cipher
//!
//! ## Security Model
//!
//! - One symmetric system key shared by the closed group, never persisted in
//!   clear; each member holds it wrapped under their own public key
//! - Private keys encrypted under the member's login password
//! - Key material zeroized from memory on drop
//!
//! ## Threat Model
//!
//! We defend against:
//! - Theft of the database file (values and wrapped keys only)
//! - A former member holding old wrapped keys after a rotation
//!
//! We do NOT defend against:
//! - Compromised OS / keylogger
//! - Access to an unlocked session / memory
//!
//! The value-envelope framing (fixed-mode AES, MD5 checksum) is a preserved
//! legacy format with known weaknesses; see `crypto::value`.

pub mod key;
pub mod keypair;
pub mod passphrase;
pub mod value;

pub use key::SystemKey;
pub use keypair::{KeyPairService, PrivateKeyHandle, UserKeyPair};
pub use passphrase::validate_password;
