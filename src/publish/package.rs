//! Re-publication of a single package under the bundle's repository.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::bundle::{Bundle, Package};
use crate::error::{Error, Result};
use crate::manifest::{FetchedManifest, OciDescriptor, Titled};
use crate::registry::Remote;

/// Where a package sits in the bundle's package list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub index: usize,
    pub total: usize,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.index + 1, self.total)
    }
}

/// Everything a package publisher gets to work with
pub struct PushContext<'a, R: Remote> {
    pub bundle: &'a Bundle,
    pub destination: &'a R,
    pub source: &'a R,
    pub root_manifest: &'a FetchedManifest,
    pub position: Position,
}

/// Republishes one package into the destination repository.
///
/// Implementations push at most once per call and return a descriptor that
/// is resolvable in the destination as soon as the call returns.
#[async_trait]
pub trait PackagePublisher<R: Remote>: Send + Sync {
    async fn publish(&self, package: &Package, ctx: PushContext<'_, R>) -> Result<OciDescriptor>;
}

/// Copies the package's config and layer blobs, then its manifest bytes as
/// served, so the package keeps its source digest
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyPublisher;

impl CopyPublisher {
    async fn copy_blob<R: Remote>(
        &self,
        ctx: &PushContext<'_, R>,
        blob: &OciDescriptor,
    ) -> Result<()> {
        let data = ctx.source.fetch_blob(blob).await?;
        let pushed = ctx.destination.push_layer(data, &blob.media_type).await?;
        if pushed.digest != blob.digest {
            return Err(Error::DigestMismatch {
                reference: ctx.source.reference().whole(),
                expected: blob.digest.clone(),
                actual: pushed.digest,
            });
        }
        debug!("Copied blob {} ({} bytes)", blob.digest, blob.size);
        Ok(())
    }
}

#[async_trait]
impl<R: Remote> PackagePublisher<R> for CopyPublisher {
    async fn publish(&self, package: &Package, ctx: PushContext<'_, R>) -> Result<OciDescriptor> {
        info!(
            "[{}] Publishing package {} from {}",
            ctx.position,
            package.name,
            ctx.source.reference()
        );

        let root = ctx.root_manifest;
        self.copy_blob(&ctx, &root.manifest.config).await?;
        for layer in &root.manifest.layers {
            self.copy_blob(&ctx, layer).await?;
        }

        let descriptor = ctx
            .destination
            .push_manifest(root.body.clone(), root.content_type())
            .await?;
        if descriptor.digest != root.digest {
            return Err(Error::DigestMismatch {
                reference: ctx.source.reference().whole(),
                expected: root.digest.clone(),
                actual: descriptor.digest,
            });
        }

        info!(
            "[{}] Published package {} as {}",
            ctx.position, package.name, descriptor.digest
        );
        Ok(descriptor.with_title(&package.name))
    }
}
