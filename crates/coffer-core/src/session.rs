//! Session-scoped key cache.
//!
//! A [`SessionContext`] holds the decrypted private key and the decrypted
//! system key for exactly one authenticated session, and is threaded
//! explicitly through every call; there is no ambient session state.
//! Key material crosses session boundaries only through the wrap/unwrap
//! protocol, never by sharing a context.

use crate::crypto::key::SystemKey;
use crate::crypto::keypair::PrivateKeyHandle;

/// How long a session's cached keys are meant to live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionLifetime {
    /// Tied to one authenticated request/login; cleared on logout.
    #[default]
    Login,
    /// Explicit opt-in for short-lived background tasks that must survive
    /// across requests within the same logical session. Never the default.
    Background,
}

/// Per-session holder of the decrypted private key and system key.
#[derive(Debug)]
pub struct SessionContext {
    login: String,
    lifetime: SessionLifetime,
    private_key: Option<PrivateKeyHandle>,
    system_key: Option<SystemKey>,
}

impl SessionContext {
    /// A login-scoped session for `login`.
    pub fn new(login: impl Into<String>) -> Self {
        Self::with_lifetime(login, SessionLifetime::Login)
    }

    /// A session for a background task. Opt-in only.
    pub fn background(login: impl Into<String>) -> Self {
        Self::with_lifetime(login, SessionLifetime::Background)
    }

    pub fn with_lifetime(login: impl Into<String>, lifetime: SessionLifetime) -> Self {
        Self {
            login: login.into(),
            lifetime,
            private_key: None,
            system_key: None,
        }
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn lifetime(&self) -> SessionLifetime {
        self.lifetime
    }

    pub fn set_private_key(&mut self, handle: PrivateKeyHandle) {
        self.private_key = Some(handle);
    }

    pub fn private_key(&self) -> Option<&PrivateKeyHandle> {
        self.private_key.as_ref()
    }

    pub fn set_system_key(&mut self, key: SystemKey) {
        self.system_key = Some(key);
    }

    pub fn system_key(&self) -> Option<&SystemKey> {
        self.system_key.as_ref()
    }

    /// Wipe both cached keys (logout). Key material zeroizes on drop.
    pub fn clear(&mut self) {
        self.private_key = None;
        self.system_key = None;
    }
}
