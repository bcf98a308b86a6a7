//! Storage abstraction for Coffer.
//!
//! The preference stores are the only persistence this subsystem touches
//! directly: an opaque per-user key-value store (public key, encrypted
//! private key, wrapped system key) and an app-wide key-value store (the
//! self-check artifacts and plaintext bootstrap settings).
//!
//! Hosts implement the traits against whatever backs their user accounts;
//! [`prefs::SqlitePrefStore`] is the bundled implementation and
//! [`prefs::MemoryPrefStore`] serves embedded hosts and tests.

pub mod prefs;

pub use prefs::{AppPrefStore, MemoryPrefStore, SqlitePrefStore, UserPrefStore};
