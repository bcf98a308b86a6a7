//! Preference stores.
//!
//! Two narrow key-value interfaces: per-user preferences and app-wide
//! preferences. The SQLite implementation keeps both in one database so a
//! host can co-locate them with its own tables.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{CofferError, Result};

/// Opaque per-user key-value store.
pub trait UserPrefStore {
    fn get(&self, login: &str, key: &str) -> Result<Option<String>>;

    fn set(&self, login: &str, key: &str, value: &str) -> Result<()>;

    /// Write several preferences for one user atomically: all land or none.
    fn set_many(&self, login: &str, pairs: &[(&str, &str)]) -> Result<()>;

    /// Logins that currently hold the given preference key, sorted.
    fn logins_with(&self, key: &str) -> Result<Vec<String>>;
}

/// App-wide key-value store.
pub trait AppPrefStore {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// SQLite-backed preference store.
pub struct SqlitePrefStore {
    conn: Mutex<Connection>,
}

impl SqlitePrefStore {
    /// Open (or create) the store at `path` and ensure its schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// In-memory store, mainly for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS user_prefs (
                login TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,

                PRIMARY KEY (login, key)
            );

            CREATE TABLE IF NOT EXISTS app_prefs (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CofferError::Storage("SQLite connection poisoned".to_string()))
    }
}

impl UserPrefStore for SqlitePrefStore {
    fn get(&self, login: &str, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM user_prefs WHERE login = ?1 AND key = ?2",
                params![login, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, login: &str, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO user_prefs (login, key, value) VALUES (?1, ?2, ?3)",
            params![login, key, value],
        )?;
        Ok(())
    }

    fn set_many(&self, login: &str, pairs: &[(&str, &str)]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for (key, value) in pairs {
            tx.execute(
                "INSERT OR REPLACE INTO user_prefs (login, key, value) VALUES (?1, ?2, ?3)",
                params![login, key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn logins_with(&self, key: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT login FROM user_prefs WHERE key = ?1 ORDER BY login")?;
        let rows = stmt.query_map([key], |row| row.get(0))?;

        let mut logins = Vec::new();
        for login in rows {
            logins.push(login?);
        }
        Ok(logins)
    }
}

impl AppPrefStore for SqlitePrefStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM app_prefs WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO app_prefs (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

/// In-memory preference store for embedded hosts and tests.
#[derive(Default)]
pub struct MemoryPrefStore {
    user: Mutex<BTreeMap<(String, String), String>>,
    app: Mutex<BTreeMap<String, String>>,
}

impl MemoryPrefStore {
    fn user_map(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<(String, String), String>>> {
        self.user
            .lock()
            .map_err(|_| CofferError::Storage("preference map poisoned".to_string()))
    }

    fn app_map(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.app
            .lock()
            .map_err(|_| CofferError::Storage("preference map poisoned".to_string()))
    }
}

impl UserPrefStore for MemoryPrefStore {
    fn get(&self, login: &str, key: &str) -> Result<Option<String>> {
        Ok(self
            .user_map()?
            .get(&(login.to_string(), key.to_string()))
            .cloned())
    }

    fn set(&self, login: &str, key: &str, value: &str) -> Result<()> {
        self.user_map()?
            .insert((login.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    fn set_many(&self, login: &str, pairs: &[(&str, &str)]) -> Result<()> {
        let mut user = self.user_map()?;
        for (key, value) in pairs {
            user.insert((login.to_string(), key.to_string()), value.to_string());
        }
        Ok(())
    }

    fn logins_with(&self, key: &str) -> Result<Vec<String>> {
        Ok(self
            .user_map()?
            .keys()
            .filter(|(_, k)| k == key)
            .map(|(login, _)| login.clone())
            .collect())
    }
}

impl AppPrefStore for MemoryPrefStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.app_map()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.app_map()?.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
