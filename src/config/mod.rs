use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};


#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Registry location bundles are published to when none is given
    pub default_destination: Option<String>,

    /// Registries reached over plain HTTP (e.g. localhost:5000)
    #[serde(default)]
    pub insecure_registries: Vec<String>,

    /// Registry credentials, keyed by registry host
    #[serde(default)]
    pub registries: HashMap<String, RegistryCredentials>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryCredentials {
    pub username: Option<String>,
    pub password: Option<String>,
    /// base64 of `username:password`, as in Docker config files
    pub auth: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("stowage").join("config.toml");
            if config_path.exists() {
                return Self::load_from(&config_path);
            }
        }
        Ok(Config::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    pub fn is_insecure(&self, registry: &str) -> bool {
        self.insecure_registries.iter().any(|r| r == registry)
    }
}
