//! In-memory registry used as a test double for the publish pipeline.

use async_trait::async_trait;
use oci_distribution::Reference;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use super::{parse_reference, Connector, Remote};
use crate::constants::media_type;
use crate::error::{Error, Result};
use crate::manifest::{
    content_descriptor, decode_manifest, digest_of, image_manifest, FetchedManifest, ImageIndex,
    OciDescriptor, OciImageManifest, Platform, PulledManifest,
};

#[derive(Default)]
struct State {
    /// (repository, digest) -> content
    blobs: HashMap<(String, String), Vec<u8>>,
    /// (repository, digest) -> manifest body
    manifests: HashMap<(String, String), Vec<u8>>,
    /// (repository, tag) -> digest
    tags: HashMap<(String, String), String>,
    connects: Vec<String>,
    pushed_manifests: Vec<(String, Vec<u8>)>,
    failing_fetches: HashSet<String>,
    failing_pushes: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct MemoryRegistry {
    state: Arc<Mutex<State>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a package manifest with a config and one layer per entry of
    /// `layers` at `reference` (`registry/repo:tag`). Returns the manifest.
    pub fn seed_package(&self, reference: &str, layers: &[&[u8]]) -> OciImageManifest {
        let parsed = parse_reference(reference).unwrap();
        let config_data = format!("{{\"package\":\"{}\"}}", parsed.repository()).into_bytes();
        let config = self.seed_blob(
            reference,
            &config_data,
            "application/vnd.test.config.v1+json",
        );
        let layers = layers
            .iter()
            .map(|data| self.seed_blob(reference, data, media_type::LAYER_BLOB))
            .collect();

        let manifest = image_manifest(config, layers);
        self.seed_manifest(reference, &serde_json::to_vec(&manifest).unwrap());
        manifest
    }

    /// Store a blob in the repository of `reference`
    pub fn seed_blob(&self, reference: &str, data: &[u8], media_type: &str) -> OciDescriptor {
        let reference = parse_reference(reference).unwrap();
        let descriptor = content_descriptor(data, media_type);
        self.state.lock().unwrap().blobs.insert(
            (repository_key(&reference), descriptor.digest.clone()),
            data.to_vec(),
        );
        descriptor
    }

    /// Store manifest bytes verbatim and tag them with `reference`'s tag.
    /// Returns the digest.
    pub fn seed_manifest(&self, reference: &str, body: &[u8]) -> String {
        let reference = parse_reference(reference).unwrap();
        let repo = repository_key(&reference);
        let digest = digest_of(body);
        let mut state = self.state.lock().unwrap();
        state
            .manifests
            .insert((repo.clone(), digest.clone()), body.to_vec());
        if let Some(tag) = reference.tag() {
            state.tags.insert((repo, tag.to_string()), digest.clone());
        }
        digest
    }

    /// Store an index at `reference` directly, as a previous publish would have
    pub fn seed_index(&self, reference: &str, index: &ImageIndex) {
        self.seed_manifest(reference, &serde_json::to_vec(index).unwrap());
    }

    /// Make every fetch against `reference` fail
    pub fn fail_fetch(&self, reference: &str) {
        let key = parse_reference(reference).unwrap().whole();
        self.state.lock().unwrap().failing_fetches.insert(key);
    }

    /// Make every push of content with `media_type` fail
    pub fn fail_push(&self, media_type: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_pushes
            .insert(media_type.to_string());
    }

    pub fn connect_count(&self) -> usize {
        self.state.lock().unwrap().connects.len()
    }

    /// Index stored under `reference`'s tag, if any
    pub fn index(&self, reference: &str) -> Option<ImageIndex> {
        let reference = parse_reference(reference).unwrap();
        let body = self.tagged(&reference)?;
        match decode_manifest(&body, None).unwrap() {
            PulledManifest::Index(index) => Some(index),
            PulledManifest::Image(_) => None,
        }
    }

    /// Manifest stored by digest in the repository of `reference`
    pub fn manifest(&self, reference: &str, digest: &str) -> Option<OciImageManifest> {
        serde_json::from_slice(&self.manifest_body(reference, digest)?).ok()
    }

    /// Raw bytes of the manifest stored by digest
    pub fn manifest_body(&self, reference: &str, digest: &str) -> Option<Vec<u8>> {
        let reference = parse_reference(reference).unwrap();
        let state = self.state.lock().unwrap();
        state
            .manifests
            .get(&(repository_key(&reference), digest.to_string()))
            .cloned()
    }

    /// Raw bytes of the document tagged at `reference`
    pub fn tagged_body(&self, reference: &str) -> Option<Vec<u8>> {
        self.tagged(&parse_reference(reference).unwrap())
    }

    pub fn blob(&self, reference: &str, digest: &str) -> Option<Vec<u8>> {
        let reference = parse_reference(reference).unwrap();
        let state = self.state.lock().unwrap();
        state
            .blobs
            .get(&(repository_key(&reference), digest.to_string()))
            .cloned()
    }

    /// Media types of every manifest pushed so far, in push order
    pub fn pushed_manifest_types(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .pushed_manifests
            .iter()
            .map(|(media_type, _)| media_type.clone())
            .collect()
    }

    fn tagged(&self, reference: &Reference) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        let repo = repository_key(reference);
        let digest = match reference.digest() {
            Some(digest) => digest.to_string(),
            None => state
                .tags
                .get(&(repo.clone(), reference.tag()?.to_string()))?
                .clone(),
        };
        state.manifests.get(&(repo, digest)).cloned()
    }
}

fn repository_key(reference: &Reference) -> String {
    format!("{}/{}", reference.registry(), reference.repository())
}

impl Connector for MemoryRegistry {
    type Remote = MemoryRemote;

    fn connect(&self, reference: &str, platform: &Platform) -> Result<MemoryRemote> {
        let reference = parse_reference(reference)?;
        self.state
            .lock()
            .unwrap()
            .connects
            .push(reference.whole());
        Ok(MemoryRemote {
            registry: self.clone(),
            reference,
            platform: platform.clone(),
        })
    }
}

pub struct MemoryRemote {
    registry: MemoryRegistry,
    reference: Reference,
    platform: Platform,
}

impl MemoryRemote {
    fn check_fetch(&self) -> Result<()> {
        let state = self.registry.state.lock().unwrap();
        if state.failing_fetches.contains(&self.reference.whole()) {
            return Err(Error::Transport {
                reference: self.reference.whole(),
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    fn check_push(&self, media_type: &str) -> Result<()> {
        let state = self.registry.state.lock().unwrap();
        if state.failing_pushes.contains(media_type) {
            return Err(Error::Transport {
                reference: self.reference.whole(),
                message: format!("push of {} rejected", media_type),
            });
        }
        Ok(())
    }

    fn store_manifest(&self, body: Vec<u8>, media_type: &str, tag: Option<&str>) -> OciDescriptor {
        let descriptor = content_descriptor(&body, media_type);
        let repo = repository_key(&self.reference);
        let mut state = self.registry.state.lock().unwrap();
        state
            .pushed_manifests
            .push((media_type.to_string(), body.clone()));
        state
            .manifests
            .insert((repo.clone(), descriptor.digest.clone()), body);
        if let Some(tag) = tag {
            state
                .tags
                .insert((repo, tag.to_string()), descriptor.digest.clone());
        }
        descriptor
    }
}

#[async_trait]
impl Remote for MemoryRemote {
    fn reference(&self) -> &Reference {
        &self.reference
    }

    fn platform(&self) -> &Platform {
        &self.platform
    }

    async fn fetch_root(&self) -> Result<FetchedManifest> {
        self.check_fetch()?;
        let not_found = || Error::NotFound {
            reference: self.reference.whole(),
        };
        let body = self.registry.tagged(&self.reference).ok_or_else(not_found)?;
        match decode_manifest(&body, None)? {
            PulledManifest::Image(manifest) => Ok(FetchedManifest {
                manifest,
                digest: digest_of(&body),
                body,
            }),
            PulledManifest::Index(index) => {
                let entry = index.find(&self.platform).ok_or_else(|| Error::PlatformNotFound {
                    reference: self.reference.whole(),
                    platform: self.platform.to_string(),
                })?;
                let reference = Reference::with_digest(
                    self.reference.registry().to_string(),
                    self.reference.repository().to_string(),
                    entry.digest.clone(),
                );
                let body = self.registry.tagged(&reference).ok_or_else(not_found)?;
                Ok(FetchedManifest {
                    manifest: serde_json::from_slice(&body)?,
                    digest: entry.digest.clone(),
                    body,
                })
            }
        }
    }

    async fn fetch_index(&self) -> Result<Option<ImageIndex>> {
        self.check_fetch()?;
        match self.registry.tagged(&self.reference) {
            Some(body) => match decode_manifest(&body, None)? {
                PulledManifest::Index(index) => Ok(Some(index)),
                PulledManifest::Image(_) => Ok(None),
            },
            None => Ok(None),
        }
    }

    async fn fetch_blob(&self, descriptor: &OciDescriptor) -> Result<Vec<u8>> {
        self.check_fetch()?;
        let state = self.registry.state.lock().unwrap();
        state
            .blobs
            .get(&(repository_key(&self.reference), descriptor.digest.clone()))
            .cloned()
            .ok_or_else(|| Error::NotFound {
                reference: format!("{}@{}", self.reference.whole(), descriptor.digest),
            })
    }

    async fn push_layer(&self, data: Vec<u8>, media_type: &str) -> Result<OciDescriptor> {
        self.check_push(media_type)?;
        let descriptor = content_descriptor(&data, media_type);
        let mut state = self.registry.state.lock().unwrap();
        state.blobs.insert(
            (repository_key(&self.reference), descriptor.digest.clone()),
            data,
        );
        Ok(descriptor)
    }

    async fn push_manifest(&self, body: Vec<u8>, media_type: &str) -> Result<OciDescriptor> {
        self.check_push(media_type)?;
        Ok(self.store_manifest(body, media_type, None))
    }

    async fn push_index(&self, index: &ImageIndex) -> Result<OciDescriptor> {
        self.check_push(media_type::OCI_INDEX)?;
        let body = serde_json::to_vec(index)?;
        Ok(self.store_manifest(body, media_type::OCI_INDEX, self.reference.tag()))
    }
}
