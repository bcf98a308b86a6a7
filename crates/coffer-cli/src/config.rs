use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use coffer_core::EncryptedTable;

#[derive(Debug, Serialize, Deserialize)]
pub struct CofferConfig {
    pub database: DatabaseSection,
    /// Registry of tables whose columns are encrypted under the system key.
    /// Consumed read-only by rotation; owned by the operator.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<EncryptedTable>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub path: String,
}

impl CofferConfig {
    pub fn new(database_path: PathBuf) -> Self {
        Self {
            database: DatabaseSection {
                path: database_path.to_string_lossy().to_string(),
            },
            tables: Vec::new(),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.database.path)
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("config.toml"))
}

pub fn default_database_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_data_dir()?.join("coffer.db"))
}

pub fn read_config(path: &Path) -> anyhow::Result<CofferConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}

pub fn write_config(path: &Path, config: &CofferConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!(
                "Failed to create config directory {}: {}",
                parent.display(),
                e
            )
        })?;
    }
    let contents =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {}", e))?;
    std::fs::write(path, contents)
        .map_err(|e| anyhow::anyhow!("Failed to write config {}: {}", path.display(), e))?;
    Ok(())
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("coffer"));
        }
    }
    Ok(home_dir()?.join(".config").join("coffer"))
}

pub fn xdg_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_DATA_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("coffer"));
        }
    }
    Ok(home_dir()?.join(".local").join("share").join("coffer"))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; cannot resolve default paths"))?;
    Ok(PathBuf::from(home))
}
