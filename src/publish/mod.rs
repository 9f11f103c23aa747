//! Bundle assembly and publication.
//!
//! A published bundle is an OCI image index at `<destination>/<name>:<version>`
//! with one entry per architecture. Each entry points at a root manifest
//! whose layers are, in order:
//!
//! 1. one manifest descriptor per package, in bundle order
//! 2. the bundle metadata (`bundle.yaml`)
//! 3. the detached signature (`bundle.yaml.sig`), only for signed bundles

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::bundle::{Bundle, BuildData, Metadata, Package};
use crate::constants::{annotation, filename, media_type, platform::MULTI_OS, OCI_VERSION};
use crate::error::{Error, Result};
use crate::manifest::{image_manifest, Annotations, OciDescriptor, Platform, Titled};
use crate::reference::{ensure_oci_prefix, reference_from_metadata};
use crate::registry::{Connector, Remote};

mod index;
mod package;

pub use index::{get_index, update_index};
pub use package::{CopyPublisher, PackagePublisher, Position, PushContext};


/// Detached signature over the bundle metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signature {
    Unsigned,
    Signed(Vec<u8>),
}

impl From<Vec<u8>> for Signature {
    fn from(bytes: Vec<u8>) -> Self {
        if bytes.is_empty() {
            Signature::Unsigned
        } else {
            Signature::Signed(bytes)
        }
    }
}

impl Signature {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => std::fs::read(path)
                .map(Signature::from)
                .map_err(|source| Error::FileRead {
                    path: path.to_path_buf(),
                    source,
                }),
            None => Ok(Signature::Unsigned),
        }
    }
}

/// Config blob of a bundle root manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleConfig {
    pub architecture: String,
    #[serde(rename = "ociVersion")]
    pub oci_version: String,
    #[serde(default)]
    pub annotations: Annotations,
}

impl BundleConfig {
    pub fn new(metadata: &Metadata, build: &BuildData) -> Self {
        let architecture = if build.architecture.is_empty() {
            metadata.architecture.clone()
        } else {
            build.architecture.clone()
        };
        let mut annotations = Annotations::new();
        annotations.insert(annotation::TITLE.to_string(), metadata.name.clone());
        annotations.insert(
            annotation::DESCRIPTION.to_string(),
            metadata.description.clone(),
        );
        Self {
            architecture,
            oci_version: OCI_VERSION.to_string(),
            annotations,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.annotations.get(annotation::TITLE).map(String::as_str)
    }
}

/// Root manifest annotations shown by registry UIs
pub fn manifest_annotations(metadata: &Metadata) -> Annotations {
    let mut annotations = Annotations::new();
    annotations.insert(annotation::TITLE.to_string(), metadata.name.clone());
    annotations.insert(annotation::VERSION.to_string(), metadata.version.clone());
    annotations.insert(
        annotation::DESCRIPTION.to_string(),
        metadata.description.clone(),
    );

    let optional = [
        (annotation::URL, &metadata.url),
        (annotation::AUTHORS, &metadata.authors),
        (annotation::DOCUMENTATION, &metadata.documentation),
        (annotation::SOURCE, &metadata.source),
        (annotation::VENDOR, &metadata.vendor),
    ];
    for (key, value) in optional {
        if !value.is_empty() {
            annotations.insert(key.to_string(), value.clone());
        }
    }
    annotations
}

/// Publishes bundles through a registry connector, delegating each package
/// to a [`PackagePublisher`].
pub struct Publisher<C, P> {
    connector: C,
    packages: P,
}

impl<C> Publisher<C, CopyPublisher>
where
    C: Connector,
{
    pub fn new(connector: C) -> Self {
        Self::with_package_publisher(connector, CopyPublisher)
    }
}

impl<C, P> Publisher<C, P>
where
    C: Connector,
    P: PackagePublisher<C::Remote>,
{
    pub fn with_package_publisher(connector: C, packages: P) -> Self {
        Self {
            connector,
            packages,
        }
    }

    /// Publish `bundle` under `output` (a registry location, with or without
    /// the `oci://` scheme).
    ///
    /// Nothing manifest-level is written unless every package publishes:
    /// the root manifest and index are pushed last. Blobs pushed before a
    /// failure stay in the registry.
    pub async fn publish(&self, bundle: &Bundle, output: &str, signature: Signature) -> Result<()> {
        let metadata = &bundle.metadata;
        if metadata.architecture.is_empty() {
            return Err(Error::MissingArchitecture);
        }

        let output = ensure_oci_prefix(output);
        let reference = reference_from_metadata(&output, metadata)?;
        let platform = Platform::new(&metadata.architecture, MULTI_OS);
        let destination = self.connector.connect(&reference.whole(), &platform)?;
        debug!("Bundling {} to {}", metadata.name, destination.reference());

        let mut layers = self.publish_packages(bundle, &destination).await?;

        let bundle_yaml = push_titled_layer(&destination, bundle.to_yaml()?, filename::BUNDLE_YAML)
            .await?;
        debug!("Pushed {}: {:?}", filename::BUNDLE_YAML, bundle_yaml);
        layers.push(bundle_yaml);

        if let Signature::Signed(bytes) = signature {
            let signature = push_titled_layer(&destination, bytes, filename::BUNDLE_YAML_SIGNATURE)
                .await?;
            debug!("Pushed {}: {:?}", filename::BUNDLE_YAML_SIGNATURE, signature);
            layers.push(signature);
        }

        let config = push_config(&destination, metadata, &bundle.build).await?;
        debug!("Pushed config: {:?}", config);

        let index = get_index(&destination).await?;

        let mut root = image_manifest(config, layers);
        root.annotations = Some(manifest_annotations(metadata).into_iter().collect());
        let root_descriptor = destination
            .push_manifest(serde_json::to_vec(&root)?, media_type::OCI_MANIFEST)
            .await?;
        debug!("Pushed root manifest: {:?}", root_descriptor);

        update_index(index, &destination, bundle, &root_descriptor).await?;

        info!(
            "Published {} ({}) to {}",
            metadata.name,
            platform,
            destination.reference()
        );
        Ok(())
    }

    /// Run fetch -> publish -> collect for every package, in bundle order.
    ///
    /// The returned descriptors are in declaration order; the first failure
    /// stops the loop.
    async fn publish_packages(
        &self,
        bundle: &Bundle,
        destination: &C::Remote,
    ) -> Result<Vec<OciDescriptor>> {
        let total = bundle.packages.len();
        let mut descriptors = Vec::with_capacity(total);

        for (index, package) in bundle.packages.iter().enumerate() {
            let position = Position { index, total };
            let descriptor = self
                .publish_package(bundle, package, destination, position)
                .await?;
            descriptors.push(descriptor);
        }

        Ok(descriptors)
    }

    async fn publish_package(
        &self,
        bundle: &Bundle,
        package: &Package,
        destination: &C::Remote,
        position: Position,
    ) -> Result<OciDescriptor> {
        let source = self
            .connector
            .connect(&package.source_reference(), destination.platform())?;
        let root_manifest = source.fetch_root().await?;

        let ctx = PushContext {
            bundle,
            destination,
            source: &source,
            root_manifest: &root_manifest,
            position,
        };
        self.packages.publish(package, ctx).await
    }
}

async fn push_titled_layer<R: Remote>(
    remote: &R,
    data: Vec<u8>,
    title: &str,
) -> Result<OciDescriptor> {
    let descriptor = remote.push_layer(data, media_type::LAYER_BLOB).await?;
    Ok(descriptor.with_title(title))
}

async fn push_config<R: Remote>(
    remote: &R,
    metadata: &Metadata,
    build: &BuildData,
) -> Result<OciDescriptor> {
    let config = BundleConfig::new(metadata, build);
    let body = serde_json::to_vec(&config)?;
    remote.push_layer(body, media_type::CONFIG).await
}
