//! Application-level utilities for the Coffer CLI.
//!
//! Provides path resolution and a context that bundles CLI arguments with
//! the loaded configuration, so handlers do not re-thread the same
//! parameters.

use std::path::PathBuf;

use coffer_core::SqlitePrefStore;

use crate::cli::Cli;
use crate::config::{default_config_path, read_config, CofferConfig};

/// Resolve the config file path from CLI arguments or XDG defaults.
pub fn resolve_config_path(cli: &Cli) -> anyhow::Result<PathBuf> {
    match cli.config {
        Some(ref value) => Ok(PathBuf::from(value)),
        None => default_config_path(),
    }
}

/// Application context that bundles CLI args with the loaded config.
pub struct AppContext<'a> {
    cli: &'a Cli,
}

impl<'a> AppContext<'a> {
    pub fn new(cli: &'a Cli) -> Self {
        Self { cli }
    }

    pub fn cli(&self) -> &Cli {
        self.cli
    }

    pub fn quiet(&self) -> bool {
        self.cli.quiet
    }

    /// Load the config file, with a hint when it does not exist yet.
    pub fn config(&self) -> anyhow::Result<CofferConfig> {
        let path = resolve_config_path(self.cli)?;
        if !path.exists() {
            return Err(anyhow::anyhow!(
                "No config found at {}. Run `coffer init` first.",
                path.display()
            ));
        }
        read_config(&path)
    }

    /// Open the preference store at the configured database path.
    pub fn open_store(&self) -> anyhow::Result<(SqlitePrefStore, CofferConfig)> {
        let config = self.config()?;
        let store = SqlitePrefStore::open(&config.database_path())
            .map_err(|e| anyhow::anyhow!("Failed to open database: {}", e))?;
        Ok((store, config))
    }
}
