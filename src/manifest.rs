//! OCI content model used by bundles.
//!
//! Descriptors and image manifests are `oci_distribution`'s own types. The
//! image index is modelled here, carrying every field it does not interpret
//! so that a read-modify-write leaves other platforms' entries intact.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use oci_distribution::manifest::{OciDescriptor, OciImageManifest};

use crate::constants::{annotation, media_type};
use crate::error::Result;

pub type Annotations = BTreeMap<String, String>;

/// Fields of an index document that are passed through untouched
pub type Extra = serde_json::Map<String, serde_json::Value>;

/// Describe `data` as it will be stored under `media_type`
pub fn content_descriptor(data: &[u8], media_type: &str) -> OciDescriptor {
    OciDescriptor {
        media_type: media_type.to_string(),
        digest: digest_of(data),
        size: data.len() as i64,
        urls: None,
        annotations: None,
    }
}

/// Image manifest with the OCI media type and no annotations
pub fn image_manifest(config: OciDescriptor, layers: Vec<OciDescriptor>) -> OciImageManifest {
    OciImageManifest {
        schema_version: 2,
        media_type: Some(media_type::OCI_MANIFEST.to_string()),
        artifact_type: None,
        config,
        layers,
        annotations: None,
    }
}

/// Title annotation, as shown by registry UIs
pub trait Titled {
    fn with_title(self, title: &str) -> Self;

    fn title(&self) -> Option<&str>;
}

impl Titled for OciDescriptor {
    fn with_title(mut self, title: &str) -> Self {
        self.annotations
            .get_or_insert_with(Default::default)
            .insert(annotation::TITLE.to_string(), title.to_string());
        self
    }

    fn title(&self) -> Option<&str> {
        self.annotations
            .as_ref()
            .and_then(|a| a.get(annotation::TITLE))
            .map(String::as_str)
    }
}

/// Platform information for an index entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub architecture: String,
    pub os: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// `os.version`, `os.features`, `features` and the like
    #[serde(flatten)]
    pub extra: Extra,
}

impl Platform {
    pub fn new(architecture: &str, os: &str) -> Self {
        Self {
            architecture: architecture.to_string(),
            os: os.to_string(),
            variant: None,
            extra: Extra::new(),
        }
    }

    /// Index entries are keyed by architecture and OS; the variant is not
    /// part of the key.
    pub fn matches(&self, other: &Platform) -> bool {
        self.architecture == other.architecture && self.os == other.os
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if let Some(variant) = &self.variant {
            write!(f, "/{}", variant)?;
        }
        Ok(())
    }
}

/// OCI Image Index mapping platforms to manifests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageIndex {
    #[serde(rename = "schemaVersion")]
    pub schema_version: i32,
    #[serde(rename = "mediaType", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default)]
    pub manifests: Vec<IndexEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
    /// `artifactType`, `subject` and anything newer
    #[serde(flatten)]
    pub extra: Extra,
}

/// Descriptor for a platform-specific manifest in the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub digest: String,
    pub size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
    /// `artifactType`, `urls` and anything newer
    #[serde(flatten)]
    pub extra: Extra,
}

impl IndexEntry {
    pub fn new(descriptor: &OciDescriptor, platform: Platform) -> Self {
        Self {
            media_type: media_type::OCI_MANIFEST.to_string(),
            digest: descriptor.digest.clone(),
            size: descriptor.size,
            platform: Some(platform),
            annotations: descriptor
                .annotations
                .clone()
                .map(|a| a.into_iter().collect()),
            extra: Extra::new(),
        }
    }
}

impl ImageIndex {
    pub fn new(manifests: Vec<IndexEntry>) -> Self {
        Self {
            schema_version: 2,
            media_type: Some(media_type::OCI_INDEX.to_string()),
            manifests,
            annotations: None,
            extra: Extra::new(),
        }
    }

    pub fn find(&self, platform: &Platform) -> Option<&IndexEntry> {
        self.manifests
            .iter()
            .find(|m| m.platform.as_ref().is_some_and(|p| p.matches(platform)))
    }

    /// Point the entry for `platform` at `descriptor`, appending a new entry
    /// if the platform is not listed yet. Other entries are left as they are.
    ///
    /// A replaced entry keeps its platform object and loses everything else.
    pub fn upsert(&mut self, platform: &Platform, descriptor: &OciDescriptor) {
        let existing = self
            .manifests
            .iter_mut()
            .find(|m| m.platform.as_ref().is_some_and(|p| p.matches(platform)));

        match existing {
            Some(entry) => {
                let kept = entry.platform.take().unwrap_or_else(|| platform.clone());
                *entry = IndexEntry::new(descriptor, kept);
            }
            None => self
                .manifests
                .push(IndexEntry::new(descriptor, platform.clone())),
        }
    }
}

/// A manifest as pulled from a registry, before the caller knows which
/// shape it has.
#[derive(Debug, Clone)]
pub enum PulledManifest {
    Image(OciImageManifest),
    Index(ImageIndex),
}

/// An image manifest along with the exact bytes the registry served
#[derive(Debug, Clone)]
pub struct FetchedManifest {
    pub manifest: OciImageManifest,
    pub body: Vec<u8>,
    /// Digest the registry reported for `body`
    pub digest: String,
}

impl FetchedManifest {
    /// Media type the manifest should be pushed under
    pub fn content_type(&self) -> &str {
        self.manifest
            .media_type
            .as_deref()
            .unwrap_or(media_type::OCI_MANIFEST)
    }
}

#[derive(Deserialize)]
struct ManifestProbe {
    #[serde(rename = "mediaType")]
    media_type: Option<String>,
    manifests: Option<serde_json::Value>,
}

/// Decode raw manifest bytes into an image manifest or an index.
///
/// `content_type` is the type reported by the registry, if any; the
/// document's own `mediaType` wins, and documents without one are told
/// apart by the presence of a `manifests` array.
pub fn decode_manifest(body: &[u8], content_type: Option<&str>) -> Result<PulledManifest> {
    let probe: ManifestProbe = serde_json::from_slice(body)?;
    let kind = probe.media_type.as_deref().or(content_type);

    let is_index = match kind {
        Some(media_type::OCI_INDEX) | Some(media_type::DOCKER_MANIFEST_LIST) => true,
        Some(media_type::OCI_MANIFEST) | Some(media_type::DOCKER_MANIFEST) => false,
        _ => probe.manifests.is_some(),
    };

    if is_index {
        Ok(PulledManifest::Index(serde_json::from_slice(body)?))
    } else {
        Ok(PulledManifest::Image(serde_json::from_slice(body)?))
    }
}

/// sha256 content digest in `algorithm:hex` form
pub fn digest_of(data: &[u8]) -> String {
    format!("sha256:{}", sha256::digest(data))
}
