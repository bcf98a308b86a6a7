//! The shared system encryption key.
//!
//! One symmetric key is shared by every authorized group member. It lives
//! either in a session cache or wrapped under a member's public key, never
//! in clear form in persistent storage.

use zeroize::Zeroizing;

use crate::crypto::value::pad_key;
use crate::error::{CofferError, Result};

/// Number of random bytes drawn for a generated key (hex-encoded to 32
/// characters, which pads to a full 256-bit cipher key).
const GENERATED_KEY_BYTES: usize = 16;

/// The group-wide symmetric encryption key.
///
/// Held as the ASCII key string the legacy format works with (operators may
/// supply human-chosen passphrases); `pad_key` maps it onto a cipher key
/// size. Zeroized on drop.
#[derive(Clone)]
pub struct SystemKey {
    value: Zeroizing<String>,
}

impl SystemKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Zeroizing::new(value.into()),
        }
    }

    /// The explicit no-encryption key for unconfigured installs.
    pub fn empty() -> Self {
        Self::new("")
    }

    /// Generate a fresh random key from the OS RNG.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; GENERATED_KEY_BYTES];
        getrandom::getrandom(&mut bytes)
            .map_err(|e| CofferError::KeyGeneration(format!("failed to draw key bytes: {}", e)))?;
        Ok(Self::new(hex::encode(bytes)))
    }

    pub fn expose(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// The key bytes padded to a size the cipher accepts.
    pub fn padded_bytes(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(pad_key(self.value.as_bytes()))
    }
}

impl PartialEq for SystemKey {
    fn eq(&self, other: &Self) -> bool {
        *self.value == *other.value
    }
}

impl Eq for SystemKey {}

impl std::fmt::Debug for SystemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemKey")
            .field("value", &"[REDACTED]")
            .finish()
    }
}
