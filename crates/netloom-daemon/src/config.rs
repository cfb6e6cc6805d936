//! Configuration loading

use anyhow::Result;
use netloom_discovery::EngineConfig;
use netloom_snmp::{Credentials, SessionConfig, SnmpVersion};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub snmp: SnmpConfig,
    #[serde(default)]
    pub discovery: EngineConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnmpConfig {
    #[serde(flatten)]
    pub session: SessionConfig,
    #[serde(default)]
    pub version: SnmpVersion,
    #[serde(default = "default_community")]
    pub community: String,
}

impl Default for SnmpConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            version: SnmpVersion::default(),
            community: default_community(),
        }
    }
}

impl SnmpConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            version: self.version,
            community: self.community.clone(),
        }
    }
}

fn default_community() -> String {
    "public".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// JSON file the inventory is loaded from and saved to
    #[serde(default = "default_inventory_path")]
    pub path: PathBuf,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            path: default_inventory_path(),
        }
    }
}

fn default_inventory_path() -> PathBuf {
    PathBuf::from("./netloom-inventory.json")
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.discovery.validate()?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}
