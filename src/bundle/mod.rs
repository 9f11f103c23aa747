//! Bundle definition as loaded from a bundle file.
//!
//! A bundle file is YAML:
//!
//! ```yaml
//! kind: Bundle
//! metadata:
//!   name: core
//!   version: 0.1.0
//!   architecture: amd64
//! packages:
//!   - name: init
//!     repository: ghcr.io/example/packages/init
//!     ref: 1.0.0
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::constants::BUNDLE_KIND;
use crate::error::{Error, Result};


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    #[serde(default = "default_kind")]
    pub kind: String,
    pub metadata: Metadata,
    #[serde(default)]
    pub build: BuildData,
    #[serde(default)]
    pub packages: Vec<Package>,
}

/// Bundle identity, surfaced in registry annotations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub authors: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub documentation: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vendor: String,
}

/// Provenance of the bundle build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildData {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub platform: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub architecture: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

/// A package hosted in its own OCI repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub repository: String,
    #[serde(rename = "ref")]
    pub reference: String,
}

impl Package {
    /// Source location of the package as `repository:ref`
    pub fn source_reference(&self) -> String {
        format!("{}:{}", self.repository, self.reference)
    }
}

fn default_kind() -> String {
    BUNDLE_KIND.to_string()
}

impl Bundle {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let bundle: Bundle =
            serde_yaml::from_str(&content).map_err(|source| Error::BundleParse {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(
            "Loaded bundle {} with {} package(s) from {}",
            bundle.metadata.name,
            bundle.packages.len(),
            path.display()
        );
        Ok(bundle)
    }

    /// Canonical YAML form pushed as the bundle metadata layer
    pub fn to_yaml(&self) -> Result<Vec<u8>> {
        Ok(serde_yaml::to_string(self)?.into_bytes())
    }

    /// Fill in build provenance that the bundle file did not record
    pub fn stamp_build(&mut self, tool_version: &str) {
        let build = &mut self.build;
        if build.timestamp.is_empty() {
            build.timestamp = chrono::Utc::now().to_rfc3339();
        }
        if build.version.is_empty() {
            build.version = tool_version.to_string();
        }
        if build.architecture.is_empty() {
            build.architecture = self.metadata.architecture.clone();
        }
        if build.user.is_empty() {
            if let Ok(user) = std::env::var("USER") {
                build.user = user;
            }
        }
    }
}
