//! Retrieval of a published bundle's own content.
//!
//! Only the root manifest and the titled blob layers (metadata and
//! signature) are written out. Package layers point at manifests that stay
//! in the registry.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::constants::filename;
use crate::error::{Error, Result};
use crate::manifest::{digest_of, Titled};
use crate::registry::Remote;

#[cfg(test)]
mod tests;

/// File the root manifest is written to
pub const ROOT_MANIFEST_FILE: &str = "manifest.json";

/// Pull the bundle at the remote's reference into `output`, creating it if
/// needed. Returns the files written, root manifest first.
pub async fn pull_bundle<R: Remote>(remote: &R, output: &Path) -> Result<Vec<PathBuf>> {
    let root = remote.fetch_root().await?;
    debug!(
        "Pulled root manifest {} for {} with {} layer(s)",
        root.digest,
        remote.platform(),
        root.manifest.layers.len()
    );

    std::fs::create_dir_all(output).map_err(|source| Error::FileWrite {
        path: output.to_path_buf(),
        source,
    })?;

    let mut written = vec![write_file(output, ROOT_MANIFEST_FILE, &root.body)?];

    for layer in &root.manifest.layers {
        let Some(name) = layer
            .title()
            .filter(|t| *t == filename::BUNDLE_YAML || *t == filename::BUNDLE_YAML_SIGNATURE)
        else {
            continue;
        };

        let data = remote.fetch_blob(layer).await?;
        let actual = digest_of(&data);
        if actual != layer.digest {
            return Err(Error::DigestMismatch {
                reference: remote.reference().whole(),
                expected: layer.digest.clone(),
                actual,
            });
        }
        written.push(write_file(output, name, &data)?);
    }

    info!("Pulled {} into {}", remote.reference(), output.display());
    Ok(written)
}

fn write_file(dir: &Path, name: &str, data: &[u8]) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, data).map_err(|source| Error::FileWrite {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}
