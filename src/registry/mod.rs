use async_trait::async_trait;
use hyper::header::HeaderValue;
use oci_distribution::client::{ClientConfig, ClientProtocol};
use oci_distribution::errors::{OciDistributionError, OciErrorCode};
use oci_distribution::secrets::RegistryAuth;
use oci_distribution::{Client, Reference, RegistryOperation};
use std::str::FromStr;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::auth::resolve_auth;
use crate::config::Config;
use crate::constants::media_type;
use crate::error::{Error, Result};
use crate::manifest::{
    content_descriptor, decode_manifest, digest_of, FetchedManifest, ImageIndex, OciDescriptor,
    Platform, PulledManifest,
};

#[cfg(test)]
pub(crate) mod memory;

/// Creates registry handles bound to one reference and platform
pub trait Connector: Send + Sync {
    type Remote: Remote;

    fn connect(&self, reference: &str, platform: &Platform) -> Result<Self::Remote>;
}

/// A registry handle bound to one (reference, platform) pair
#[async_trait]
pub trait Remote: Send + Sync {
    fn reference(&self) -> &Reference;

    fn platform(&self) -> &Platform;

    /// Fetch the manifest at the reference, following an index to the entry
    /// for the bound platform. The body is returned exactly as served.
    async fn fetch_root(&self) -> Result<FetchedManifest>;

    /// Fetch the index stored at the reference. `None` when nothing is stored
    /// there yet or the tag holds a plain manifest.
    async fn fetch_index(&self) -> Result<Option<ImageIndex>>;

    async fn fetch_blob(&self, descriptor: &OciDescriptor) -> Result<Vec<u8>>;

    async fn push_layer(&self, data: Vec<u8>, media_type: &str) -> Result<OciDescriptor>;

    /// Push a manifest by digest, without tagging it
    async fn push_manifest(&self, body: Vec<u8>, media_type: &str) -> Result<OciDescriptor>;

    /// Push an index under the reference's tag
    async fn push_index(&self, index: &ImageIndex) -> Result<OciDescriptor>;
}

/// Connector backed by an `oci-distribution` client shared by all remotes
pub struct OciConnector {
    client: Client,
    config: Config,
}

impl OciConnector {
    pub fn new(config: Config, insecure: bool) -> Self {
        let protocol = if insecure {
            ClientProtocol::Http
        } else {
            ClientProtocol::HttpsExcept(config.insecure_registries.clone())
        };
        let client = Client::new(ClientConfig {
            protocol,
            accept_invalid_certificates: insecure,
            ..Default::default()
        });
        Self { client, config }
    }
}

impl Connector for OciConnector {
    type Remote = OciRemote;

    fn connect(&self, reference: &str, platform: &Platform) -> Result<OciRemote> {
        let reference = parse_reference(reference)?;
        let auth = resolve_auth(reference.registry(), &self.config);
        if self.config.is_insecure(reference.registry()) {
            debug!("Using plain HTTP for {}", reference.registry());
        }
        Ok(OciRemote {
            client: self.client.clone(),
            reference,
            platform: platform.clone(),
            auth,
            push_auth: OnceCell::new(),
        })
    }
}

pub struct OciRemote {
    client: Client,
    reference: Reference,
    platform: Platform,
    auth: RegistryAuth,
    push_auth: OnceCell<()>,
}

impl OciRemote {
    fn registry_error(&self, source: OciDistributionError) -> Error {
        Error::Registry {
            reference: self.reference.whole(),
            source,
        }
    }

    fn digest_reference(&self, digest: &str) -> Reference {
        Reference::with_digest(
            self.reference.registry().to_string(),
            self.reference.repository().to_string(),
            digest.to_string(),
        )
    }

    async fn authenticate_push(&self) -> Result<()> {
        self.push_auth
            .get_or_try_init(|| async {
                debug!("Authenticating for push to {}", self.reference);
                self.client
                    .auth(&self.reference, &self.auth, RegistryOperation::Push)
                    .await
                    .map(|_| ())
                    .map_err(|e| self.registry_error(e))
            })
            .await?;
        Ok(())
    }

    /// Pull and decode the manifest at `reference`, keeping the raw body
    /// and the digest the registry reported for it.
    async fn pull(&self, reference: &Reference) -> Result<(PulledManifest, Vec<u8>, String)> {
        let (body, digest) = self
            .client
            .pull_manifest_raw(reference, &self.auth, media_type::ACCEPTED_MANIFESTS)
            .await
            .map_err(|e| self.registry_error(e))?;
        debug!("Pulled manifest {} ({})", reference, digest);
        let body = body.to_vec();
        Ok((decode_manifest(&body, None)?, body, digest))
    }

    async fn put_manifest(
        &self,
        reference: &Reference,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<OciDescriptor> {
        self.authenticate_push().await?;

        let descriptor = content_descriptor(&body, content_type);
        let header = HeaderValue::from_str(content_type).map_err(|e| Error::Transport {
            reference: reference.whole(),
            message: format!("invalid content type {}: {}", content_type, e),
        })?;
        let url = self
            .client
            .push_manifest_raw(reference, body, header)
            .await
            .map_err(|e| self.registry_error(e))?;
        debug!("Pushed manifest {} to {}", descriptor.digest, url);
        Ok(descriptor)
    }
}

#[async_trait]
impl Remote for OciRemote {
    fn reference(&self) -> &Reference {
        &self.reference
    }

    fn platform(&self) -> &Platform {
        &self.platform
    }

    async fn fetch_root(&self) -> Result<FetchedManifest> {
        match self.pull(&self.reference).await? {
            (PulledManifest::Image(manifest), body, digest) => Ok(FetchedManifest {
                manifest,
                body,
                digest,
            }),
            (PulledManifest::Index(index), _, _) => {
                let entry = index.find(&self.platform).ok_or_else(|| Error::PlatformNotFound {
                    reference: self.reference.whole(),
                    platform: self.platform.to_string(),
                })?;
                let by_digest = self.digest_reference(&entry.digest);
                match self.pull(&by_digest).await? {
                    (PulledManifest::Image(manifest), body, digest) => Ok(FetchedManifest {
                        manifest,
                        body,
                        digest,
                    }),
                    (PulledManifest::Index(_), _, _) => Err(Error::Transport {
                        reference: by_digest.whole(),
                        message: "nested index where a manifest was expected".to_string(),
                    }),
                }
            }
        }
    }

    async fn fetch_index(&self) -> Result<Option<ImageIndex>> {
        match self.pull(&self.reference).await {
            Ok((PulledManifest::Index(index), _, _)) => Ok(Some(index)),
            Ok((PulledManifest::Image(_), _, _)) => {
                warn!(
                    "{} holds a manifest rather than an index; it will be replaced",
                    self.reference
                );
                Ok(None)
            }
            Err(Error::Registry { source, .. }) if is_not_found(&source) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn fetch_blob(&self, descriptor: &OciDescriptor) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.client
            .pull_blob(&self.reference, descriptor, &mut data)
            .await
            .map_err(|e| self.registry_error(e))?;
        Ok(data)
    }

    async fn push_layer(&self, data: Vec<u8>, media_type: &str) -> Result<OciDescriptor> {
        self.authenticate_push().await?;

        let descriptor = content_descriptor(&data, media_type);
        debug!("Pushing blob: {}", descriptor.digest);
        self.client
            .push_blob(&self.reference, &data, &descriptor.digest)
            .await
            .map_err(|e| self.registry_error(e))?;
        Ok(descriptor)
    }

    async fn push_manifest(&self, body: Vec<u8>, media_type: &str) -> Result<OciDescriptor> {
        let digest = digest_of(&body);
        let by_digest = self.digest_reference(&digest);
        self.put_manifest(&by_digest, body, media_type).await
    }

    async fn push_index(&self, index: &ImageIndex) -> Result<OciDescriptor> {
        let body = serde_json::to_vec(index)?;
        debug!(
            "Pushing index with {} manifest(s) to {}",
            index.manifests.len(),
            self.reference
        );
        for m in &index.manifests {
            if let Some(platform) = &m.platform {
                debug!("  - Platform: {}, digest: {}", platform, m.digest);
            }
        }
        let descriptor = self
            .put_manifest(&self.reference, body, media_type::OCI_INDEX)
            .await?;
        info!("Pushed index to {}", self.reference);
        Ok(descriptor)
    }
}

pub fn parse_reference(reference: &str) -> Result<Reference> {
    let trimmed = reference
        .strip_prefix(crate::constants::OCI_SCHEME)
        .unwrap_or(reference);
    Reference::from_str(trimmed).map_err(|e| Error::InvalidReference {
        reference: reference.to_string(),
        reason: e.to_string(),
    })
}

fn is_not_found(error: &OciDistributionError) -> bool {
    match error {
        OciDistributionError::ImageManifestNotFoundError(_) => true,
        OciDistributionError::RegistryError { envelope, .. } => envelope.errors.iter().any(|e| {
            matches!(
                e.code,
                OciErrorCode::ManifestUnknown | OciErrorCode::NameUnknown
            )
        }),
        _ => false,
    }
}
