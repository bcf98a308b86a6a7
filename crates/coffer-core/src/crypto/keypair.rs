//! Per-user asymmetric key pairs.
//!
//! Each group member owns an age X25519 key pair. The public half is stored
//! in clear as its Bech32 recipient string; the private half is stored as
//! the Bech32 identity string encrypted under the member's login password
//! (age passphrase encryption) and base64-encoded for a text column.
//!
//! A pair is created on first authenticated use and regenerated whenever the
//! member's login password changes. Raw identity material leaves this module
//! only inside an opaque [`PrivateKeyHandle`], destined for the session
//! cache.

use std::io::{Read, Write};
use std::iter;

use age::secrecy::{ExposeSecret, SecretString};
use age::x25519::{Identity, Recipient};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

use crate::crypto::passphrase::validate_password;
use crate::error::{CofferError, Result};
use crate::storage::prefs::UserPrefStore;

/// User preference key holding the clear public key.
pub const PUBLIC_KEY_PREF: &str = "publickey";
/// User preference key holding the password-encrypted private key.
pub const PRIVATE_KEY_PREF: &str = "privatekey";

/// A member's key pair as persisted in the user preference store.
#[derive(Debug, Clone)]
pub struct UserKeyPair {
    pub login: String,
    /// Bech32 recipient string, stored in clear.
    pub public_key: String,
    /// Password-encrypted identity, base64-encoded.
    pub private_key_encrypted: String,
}

/// Opaque handle to a decrypted private key.
#[derive(Clone)]
pub struct PrivateKeyHandle {
    identity: Identity,
}

impl PrivateKeyHandle {
    fn new(identity: Identity) -> Self {
        Self { identity }
    }

    /// The matching public key.
    pub fn recipient(&self) -> Recipient {
        self.identity.to_public()
    }

    pub(crate) fn identity(&self) -> &Identity {
        &self.identity
    }
}

impl std::fmt::Debug for PrivateKeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKeyHandle")
            .field("identity", &"[REDACTED]")
            .finish()
    }
}

/// Generates and loads per-user key pairs against a user preference store.
pub struct KeyPairService<'a> {
    users: &'a dyn UserPrefStore,
}

impl<'a> KeyPairService<'a> {
    pub fn new(users: &'a dyn UserPrefStore) -> Self {
        Self { users }
    }

    /// Create a fresh key pair for `login` and persist both halves.
    ///
    /// The two preference writes are atomic: both land or neither does.
    /// An existing pair is replaced (the password-change path).
    pub fn generate_key_pair(&self, login: &str, password: &str) -> Result<UserKeyPair> {
        validate_password(password)?;

        let identity = Identity::generate();
        let public_key = identity.to_public().to_string();
        let encrypted = encrypt_with_password(
            identity.to_string().expose_secret().as_bytes(),
            password,
        )?;
        let private_key_encrypted = STANDARD.encode(&encrypted);

        self.users.set_many(
            login,
            &[
                (PUBLIC_KEY_PREF, &public_key),
                (PRIVATE_KEY_PREF, &private_key_encrypted),
            ],
        )?;
        debug!(login, "generated key pair");

        Ok(UserKeyPair {
            login: login.to_string(),
            public_key,
            private_key_encrypted,
        })
    }

    /// Load and decrypt the stored private key for `login`.
    ///
    /// If no pair exists yet it is generated first (first authenticated
    /// use). A password that cannot decrypt the stored key is
    /// `IncorrectPassword`.
    pub fn load_private_key(&self, login: &str, password: &str) -> Result<PrivateKeyHandle> {
        let stored = match self.users.get(login, PRIVATE_KEY_PREF)? {
            Some(value) => value,
            None => {
                debug!(login, "no key pair on record, generating");
                self.generate_key_pair(login, password)?.private_key_encrypted
            }
        };

        let blob = STANDARD
            .decode(stored.trim())
            .map_err(|_| CofferError::Crypto("stored private key is not valid base64".into()))?;
        let decrypted = decrypt_with_password(&blob, password)?;
        let encoded = String::from_utf8(decrypted)
            .map_err(|_| CofferError::Crypto("stored private key is corrupt".into()))?;
        let identity: Identity = encoded
            .trim()
            .parse()
            .map_err(|e| CofferError::Crypto(format!("stored private key is corrupt: {}", e)))?;

        Ok(PrivateKeyHandle::new(identity))
    }

    /// The stored public key for `login`, parsed.
    pub fn public_key(&self, login: &str) -> Result<Recipient> {
        let stored = self
            .users
            .get(login, PUBLIC_KEY_PREF)?
            .ok_or_else(|| CofferError::NotFound(format!("no public key for {}", login)))?;
        stored
            .trim()
            .parse()
            .map_err(|e| CofferError::Crypto(format!("stored public key is corrupt: {}", e)))
    }
}

fn encrypt_with_password(data: &[u8], password: &str) -> Result<Vec<u8>> {
    let encryptor =
        age::Encryptor::with_user_passphrase(SecretString::from(password.to_string()));

    let mut encrypted = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut encrypted)
        .map_err(|e| CofferError::KeyGeneration(format!("failed to create encryptor: {}", e)))?;
    writer
        .write_all(data)
        .map_err(|e| CofferError::KeyGeneration(format!("encryption write failed: {}", e)))?;
    writer
        .finish()
        .map_err(|e| CofferError::KeyGeneration(format!("encryption finish failed: {}", e)))?;

    Ok(encrypted)
}

fn decrypt_with_password(encrypted: &[u8], password: &str) -> Result<Vec<u8>> {
    let decryptor = age::Decryptor::new(encrypted)
        .map_err(|e| CofferError::Crypto(format!("failed to create decryptor: {}", e)))?;

    let identity = age::scrypt::Identity::new(SecretString::from(password.to_string()));
    let mut reader = decryptor
        .decrypt(iter::once(&identity as &dyn age::Identity))
        .map_err(|e| match e {
            age::DecryptError::NoMatchingKeys
            | age::DecryptError::DecryptionFailed
            | age::DecryptError::KeyDecryptionFailed => CofferError::IncorrectPassword,
            _ => CofferError::Crypto(format!("decryption failed: {}", e)),
        })?;

    let mut decrypted = Vec::new();
    reader
        .read_to_end(&mut decrypted)
        .map_err(|e| CofferError::Crypto(format!("failed to read decrypted key: {}", e)))?;

    Ok(decrypted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::prefs::MemoryPrefStore;

    #[test]
    fn test_generate_persists_both_halves() {
        let store = MemoryPrefStore::default();
        let service = KeyPairService::new(&store);

        let pair = service
            .generate_key_pair("alice", "alice-password")
            .unwrap();

        assert!(pair.public_key.starts_with("age1"));
        assert_eq!(
            store.get("alice", PUBLIC_KEY_PREF).unwrap().as_deref(),
            Some(pair.public_key.as_str())
        );
        assert!(store.get("alice", PRIVATE_KEY_PREF).unwrap().is_some());
    }

    #[test]
    fn test_load_round_trips_public_key() {
        let store = MemoryPrefStore::default();
        let service = KeyPairService::new(&store);

        let pair = service
            .generate_key_pair("alice", "alice-password")
            .unwrap();
        let handle = service
            .load_private_key("alice", "alice-password")
            .unwrap();

        assert_eq!(handle.recipient().to_string(), pair.public_key);
    }

    #[test]
    fn test_load_generates_on_first_use() {
        let store = MemoryPrefStore::default();
        let service = KeyPairService::new(&store);

        assert!(store.get("bob", PRIVATE_KEY_PREF).unwrap().is_none());
        let handle = service
            .load_private_key("bob", "bob-password-1")
            .unwrap();
        assert_eq!(
            service.public_key("bob").unwrap().to_string(),
            handle.recipient().to_string()
        );
    }

    #[test]
    fn test_wrong_password_is_auth_error() {
        let store = MemoryPrefStore::default();
        let service = KeyPairService::new(&store);

        service
            .generate_key_pair("alice", "correct-password")
            .unwrap();
        let result = service.load_private_key("alice", "wrong-password");
        assert!(matches!(result, Err(CofferError::IncorrectPassword)));
    }

    #[test]
    fn test_regeneration_replaces_pair() {
        let store = MemoryPrefStore::default();
        let service = KeyPairService::new(&store);

        let first = service
            .generate_key_pair("alice", "old-password-1")
            .unwrap();
        let second = service
            .generate_key_pair("alice", "new-password-2")
            .unwrap();

        assert_ne!(first.public_key, second.public_key);
        // Old password no longer opens the stored key.
        let result = service.load_private_key("alice", "old-password-1");
        assert!(matches!(result, Err(CofferError::IncorrectPassword)));
    }

    #[test]
    fn test_short_password_rejected() {
        let store = MemoryPrefStore::default();
        let service = KeyPairService::new(&store);

        let result = service.generate_key_pair("alice", "short");
        assert!(matches!(result, Err(CofferError::InvalidInput(_))));
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let store = MemoryPrefStore::default();
        let service = KeyPairService::new(&store);
        let handle = service
            .load_private_key("alice", "alice-password")
            .unwrap();
        assert!(format!("{:?}", handle).contains("REDACTED"));
    }
}
