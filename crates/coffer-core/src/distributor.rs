//! System key distribution.
//!
//! Wraps and unwraps the shared system key per member, verifies candidate
//! keys against the app-wide self-check artifact, and orchestrates rotation.
//!
//! The self-check is the legacy scheme preserved bit-for-bit: the system key
//! encrypted under itself. The key verifying itself is an inherent weakness
//! of that scheme; it is kept for compatibility with already-persisted
//! installations. A second artifact (an HMAC of a fixed constant keyed by
//! the padded system key) is written alongside and additionally checked when
//! present.

use std::io::{Read, Write};
use std::iter;

use age::x25519::Recipient;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rusqlite::Connection;
use sha2::Sha256;
use tracing::{debug, info, warn};

use crate::crypto::key::SystemKey;
use crate::crypto::keypair::{KeyPairService, PUBLIC_KEY_PREF};
use crate::crypto::value;
use crate::error::{CofferError, Result};
use crate::reencrypt::{self, EncryptedTable, ReencryptReport};
use crate::session::SessionContext;
use crate::storage::prefs::{AppPrefStore, UserPrefStore};

/// User preference key holding the member's wrapped system key.
pub const WRAPPED_KEY_PREF: &str = "encryptionkey";
/// App-wide preference key holding the legacy self-check artifact.
pub const SELF_CHECK_PREF: &str = "systemkey_check";
/// App-wide preference key holding the modern HMAC check artifact.
pub const HMAC_CHECK_PREF: &str = "systemkey_check_hmac";

/// Fixed constant the modern check artifact authenticates.
const HMAC_CHECK_DOMAIN: &[u8] = b"coffer system key check v2";

type HmacSha256 = Hmac<Sha256>;

/// What a completed rotation touched.
#[derive(Debug, Clone, Copy)]
pub struct RotationReport {
    pub members_rewrapped: usize,
    pub reencrypted: ReencryptReport,
}

/// Distributes the system key across the member group.
pub struct KeyDistributor<'a> {
    users: &'a dyn UserPrefStore,
    app: &'a dyn AppPrefStore,
}

impl<'a> KeyDistributor<'a> {
    pub fn new(users: &'a dyn UserPrefStore, app: &'a dyn AppPrefStore) -> Self {
        Self { users, app }
    }

    /// Current group membership: every login holding a public key, sorted.
    pub fn members(&self) -> Result<Vec<String>> {
        self.users.logins_with(PUBLIC_KEY_PREF)
    }

    /// Encrypt the system key to one member's public key.
    ///
    /// The returned base64 string is what gets persisted as that member's
    /// wrapped key.
    pub fn wrap_system_key(&self, key: &SystemKey, recipient: &Recipient) -> Result<String> {
        let encryptor =
            age::Encryptor::with_recipients(iter::once(recipient as &dyn age::Recipient))
                .map_err(|e| CofferError::Crypto(format!("failed to create encryptor: {}", e)))?;

        let mut ciphertext = Vec::new();
        let mut writer = encryptor
            .wrap_output(&mut ciphertext)
            .map_err(|e| CofferError::Crypto(format!("failed to wrap system key: {}", e)))?;
        writer
            .write_all(key.expose().as_bytes())
            .map_err(|e| CofferError::Crypto(format!("failed to wrap system key: {}", e)))?;
        writer
            .finish()
            .map_err(|e| CofferError::Crypto(format!("failed to wrap system key: {}", e)))?;

        Ok(STANDARD.encode(&ciphertext))
    }

    /// Decrypt the stored wrapped key for `login` with the private key in
    /// the session cache.
    ///
    /// Establishes no trust by itself; callers must verify the result
    /// before treating it as the canonical system key.
    pub fn unwrap_system_key(
        &self,
        login: &str,
        session: &SessionContext,
    ) -> Result<SystemKey> {
        let private_key = session.private_key().ok_or_else(|| {
            CofferError::NotFound("session holds no decrypted private key".to_string())
        })?;
        let stored = self.users.get(login, WRAPPED_KEY_PREF)?.ok_or_else(|| {
            CofferError::NotFound(format!("no wrapped system key for {}", login))
        })?;

        let blob = STANDARD
            .decode(stored.trim())
            .map_err(|_| CofferError::Crypto("wrapped key is not valid base64".to_string()))?;
        let decryptor = age::Decryptor::new(&blob[..])
            .map_err(|e| CofferError::Crypto(format!("failed to create decryptor: {}", e)))?;
        let mut reader = decryptor
            .decrypt(iter::once(private_key.identity() as &dyn age::Identity))
            .map_err(|e| CofferError::Crypto(format!("failed to unwrap system key: {}", e)))?;

        let mut key_bytes = Vec::new();
        reader
            .read_to_end(&mut key_bytes)
            .map_err(|e| CofferError::Crypto(format!("failed to read unwrapped key: {}", e)))?;
        let key = String::from_utf8(key_bytes)
            .map_err(|_| CofferError::Crypto("unwrapped key is not valid UTF-8".to_string()))?;

        Ok(SystemKey::new(key))
    }

    /// Check a candidate key against the stored self-check artifacts.
    ///
    /// Legacy check: decrypt the stored self-check value with the candidate
    /// and compare byte-for-byte to the candidate itself. The modern HMAC
    /// artifact, when present, must agree as well.
    pub fn verify_system_key(&self, candidate: &SystemKey) -> Result<bool> {
        let stored = self.app.get(SELF_CHECK_PREF)?.ok_or_else(|| {
            CofferError::NotFound("system key self-check has not been published".to_string())
        })?;

        let decrypted = match value::decrypt(&stored, candidate) {
            Ok(plaintext) => plaintext,
            Err(e) if e.is_integrity() => return Ok(false),
            Err(e) => return Err(e),
        };
        if decrypted != candidate.expose() {
            return Ok(false);
        }

        if let Some(expected) = self.app.get(HMAC_CHECK_PREF)? {
            let computed = hmac_check_value(candidate);
            if !expected.eq_ignore_ascii_case(&computed) {
                warn!("legacy self-check passed but HMAC artifact disagrees");
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Install `candidate` into the session cache, but only on an exact
    /// self-check match.
    pub fn install_verified_key(
        &self,
        candidate: SystemKey,
        session: &mut SessionContext,
    ) -> Result<bool> {
        if self.verify_system_key(&candidate)? {
            session.set_system_key(candidate);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Write both self-check artifacts for `key`.
    pub fn publish_self_check(&self, key: &SystemKey) -> Result<()> {
        let legacy = value::encrypt(key.expose(), key)?;
        self.app.set(SELF_CHECK_PREF, &legacy)?;
        self.app.set(HMAC_CHECK_PREF, &hmac_check_value(key))?;
        Ok(())
    }

    /// The login-time hook: load the private key, unwrap the member's copy
    /// of the system key, verify it, and populate the session cache.
    pub fn establish_session(
        &self,
        keys: &KeyPairService<'_>,
        login: &str,
        password: &str,
    ) -> Result<SessionContext> {
        let private_key = keys.load_private_key(login, password)?;
        let mut session = SessionContext::new(login);
        session.set_private_key(private_key);

        let candidate = self.unwrap_system_key(login, &session)?;
        if !self.install_verified_key(candidate, &mut session)? {
            return Err(CofferError::Verification);
        }

        info!(login, "session established");
        Ok(session)
    }

    /// Give a (new or existing) member access to the current system key:
    /// generate their key pair and persist their wrapped copy.
    pub fn enroll_member(
        &self,
        keys: &KeyPairService<'_>,
        login: &str,
        password: &str,
        system_key: &SystemKey,
    ) -> Result<()> {
        let pair = keys.generate_key_pair(login, password)?;
        let recipient: Recipient = pair
            .public_key
            .parse()
            .map_err(|e| CofferError::Crypto(format!("generated public key is corrupt: {}", e)))?;
        let wrapped = self.wrap_system_key(system_key, &recipient)?;
        self.users.set(login, WRAPPED_KEY_PREF, &wrapped)?;
        info!(login, "member enrolled");
        Ok(())
    }

    /// The password-change hook: prove the old password still opens the
    /// key, regenerate the pair under the new password, and re-wrap the
    /// still-valid system key under the new public key.
    pub fn rewrap_after_password_change(
        &self,
        keys: &KeyPairService<'_>,
        login: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let mut session = self.establish_session(keys, login, old_password)?;
        let system_key = session
            .system_key()
            .cloned()
            .ok_or(CofferError::Verification)?;
        session.clear();

        self.enroll_member(keys, login, new_password, &system_key)?;
        info!(login, "key pair regenerated after password change");
        Ok(())
    }

    /// Rotate the system key for the whole group.
    ///
    /// Every member in `members` gets the new key wrapped and persisted,
    /// all registered columns are re-encrypted, and the self-check
    /// artifacts are replaced. A failure anywhere reports `Rotation` and
    /// leaves the old key authoritative; wrap steps already persisted are
    /// not rolled back, a known limitation of the legacy design. The
    /// column pass itself is transactional and leaves no partial state.
    pub fn rotate_system_key(
        &self,
        old_key: &SystemKey,
        new_key: &SystemKey,
        members: &[String],
        conn: &mut Connection,
        registry: &[EncryptedTable],
    ) -> Result<RotationReport> {
        if new_key.is_empty() {
            return Err(CofferError::InvalidInput(
                "new system key must not be empty".to_string(),
            ));
        }

        let mut rewrapped = 0usize;
        for login in members {
            let stored = self.users.get(login, PUBLIC_KEY_PREF)?.ok_or_else(|| {
                CofferError::Rotation(format!("member {} has no public key", login))
            })?;
            let recipient: Recipient = stored.trim().parse().map_err(|e| {
                CofferError::Rotation(format!("member {} has a corrupt public key: {}", login, e))
            })?;
            let wrapped = self.wrap_system_key(new_key, &recipient)?;
            self.users.set(login, WRAPPED_KEY_PREF, &wrapped)?;
            rewrapped += 1;
            debug!(login, "re-wrapped system key");
        }

        let reencrypted = reencrypt::run(conn, registry, old_key, new_key).map_err(|e| match e {
            rotation @ CofferError::Rotation(_) => rotation,
            other => CofferError::Rotation(other.to_string()),
        })?;

        self.publish_self_check(new_key)?;
        info!(
            members = rewrapped,
            tables = reencrypted.tables,
            "system key rotation complete"
        );

        Ok(RotationReport {
            members_rewrapped: rewrapped,
            reencrypted,
        })
    }
}

fn hmac_check_value(key: &SystemKey) -> String {
    // HMAC-SHA-256 accepts keys of any length, so this cannot fail.
    let mut mac = HmacSha256::new_from_slice(&key.padded_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(HMAC_CHECK_DOMAIN);
    hex::encode(mac.finalize().into_bytes())
}
