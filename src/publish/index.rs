//! The per-platform index stored at the bundle tag.

use tracing::debug;

use crate::bundle::Bundle;
use crate::constants::platform::MULTI_OS;
use crate::error::Result;
use crate::manifest::{ImageIndex, OciDescriptor, Platform};
use crate::registry::Remote;

/// Fetch the index at the remote's reference; `None` on first publish
pub async fn get_index<R: Remote>(remote: &R) -> Result<Option<ImageIndex>> {
    let index = remote.fetch_index().await?;
    match &index {
        Some(index) => debug!(
            "Found existing index at {} with {} manifest(s)",
            remote.reference(),
            index.manifests.len()
        ),
        None => debug!("No index at {} yet", remote.reference()),
    }
    Ok(index)
}

/// Point the bundle's platform entry at `root` and push the index.
///
/// Entries for other platforms are carried over unchanged.
pub async fn update_index<R: Remote>(
    index: Option<ImageIndex>,
    remote: &R,
    bundle: &Bundle,
    root: &OciDescriptor,
) -> Result<OciDescriptor> {
    let platform = Platform::new(&bundle.metadata.architecture, MULTI_OS);
    let mut index = index.unwrap_or_else(|| ImageIndex::new(Vec::new()));
    index.upsert(&platform, root);
    remote.push_index(&index).await
}
