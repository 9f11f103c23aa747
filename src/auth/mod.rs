//! Credential lookup for registries.
//!
//! Credentials come from the stowage config file first, then from Docker
//! config files (`$DOCKER_CONFIG/config.json`, `$REGISTRY_AUTH_FILE`,
//! `$XDG_RUNTIME_DIR/containers/auth.json`, `~/.docker/config.json`).
//! Anything else is anonymous.

use base64::Engine;
use oci_distribution::secrets::RegistryAuth;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::{Config, RegistryCredentials};


/// Docker config file structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DockerConfig {
    #[serde(default)]
    pub auths: HashMap<String, DockerAuthEntry>,
}

/// Entry in the Docker config auths section
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DockerAuthEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl DockerAuthEntry {
    pub fn to_registry_auth(&self) -> RegistryAuth {
        basic_auth(
            self.username.as_deref(),
            self.password.as_deref(),
            self.auth.as_deref(),
        )
    }
}

impl RegistryCredentials {
    pub fn to_registry_auth(&self) -> RegistryAuth {
        basic_auth(
            self.username.as_deref(),
            self.password.as_deref(),
            self.auth.as_deref(),
        )
    }
}

fn basic_auth(username: Option<&str>, password: Option<&str>, auth: Option<&str>) -> RegistryAuth {
    if let (Some(username), Some(password)) = (username, password) {
        return RegistryAuth::Basic(username.to_string(), password.to_string());
    }

    let decoded = auth
        .and_then(|a| base64::engine::general_purpose::STANDARD.decode(a).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok());
    if let Some((user, pass)) = decoded.as_deref().and_then(|d| d.split_once(':')) {
        return RegistryAuth::Basic(user.to_string(), pass.to_string());
    }

    RegistryAuth::Anonymous
}

/// Resolve credentials for `registry` (a host such as `ghcr.io`)
pub fn resolve_auth(registry: &str, config: &Config) -> RegistryAuth {
    if let Some(credentials) = config.registries.get(registry) {
        debug!("Using configured credentials for {}", registry);
        return credentials.to_registry_auth();
    }

    docker_config_paths()
        .iter()
        .filter(|path| path.exists())
        .find_map(|path| load_docker_config(path))
        .and_then(|docker| find_auth_entry(&docker, registry))
        .map(|entry| {
            debug!("Using Docker config credentials for {}", registry);
            entry.to_registry_auth()
        })
        .unwrap_or(RegistryAuth::Anonymous)
}

fn docker_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(docker_config) = std::env::var("DOCKER_CONFIG") {
        paths.push(PathBuf::from(docker_config).join("config.json"));
    }
    if let Ok(auth_file) = std::env::var("REGISTRY_AUTH_FILE") {
        paths.push(PathBuf::from(auth_file));
    }
    if let Ok(xdg_runtime) = std::env::var("XDG_RUNTIME_DIR") {
        paths.push(PathBuf::from(xdg_runtime).join("containers/auth.json"));
    }
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".docker/config.json"));
    }

    paths
}

fn load_docker_config(path: &Path) -> Option<DockerConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Failed to read Docker config at {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("Failed to parse Docker config at {}: {}", path.display(), e);
            None
        }
    }
}

/// Keys a registry may be stored under in a Docker config file
fn registry_variants(registry: &str) -> Vec<String> {
    if registry == "docker.io" || registry == "index.docker.io" {
        return vec![
            "docker.io".to_string(),
            "index.docker.io".to_string(),
            "https://index.docker.io/v1/".to_string(),
        ];
    }
    vec![
        registry.to_string(),
        format!("https://{}", registry),
        format!("http://{}", registry),
        format!("https://{}/v1/", registry),
        format!("https://{}/v2/", registry),
    ]
}

fn find_auth_entry(config: &DockerConfig, registry: &str) -> Option<DockerAuthEntry> {
    registry_variants(registry)
        .iter()
        .find_map(|variant| config.auths.get(variant).cloned())
}
