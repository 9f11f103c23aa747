/// Media type constants for the artifacts a bundle is made of
pub mod media_type {
    /// OCI image manifest, used for the bundle root manifest
    pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";

    /// OCI image index, used for the per-platform index at the bundle tag
    pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";

    /// Docker schema 2 manifest, accepted when fetching package sources
    pub const DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";

    /// Docker manifest list, accepted when fetching package sources
    pub const DOCKER_MANIFEST_LIST: &str =
        "application/vnd.docker.distribution.manifest.list.v2+json";

    /// Opaque blob layer (bundle metadata, signature)
    pub const LAYER_BLOB: &str = "application/vnd.stowage.layer.v1.blob";

    /// Bundle config blob
    pub const CONFIG: &str = "application/vnd.stowage.config.v1+json";

    /// Manifest media types accepted on pull
    pub const ACCEPTED_MANIFESTS: &[&str] = &[
        OCI_MANIFEST,
        OCI_INDEX,
        DOCKER_MANIFEST,
        DOCKER_MANIFEST_LIST,
    ];
}

/// Well-known annotation keys read by registry UIs
pub mod annotation {
    pub const TITLE: &str = "org.opencontainers.image.title";
    pub const DESCRIPTION: &str = "org.opencontainers.image.description";
    pub const VERSION: &str = "org.opencontainers.image.version";
    pub const URL: &str = "org.opencontainers.image.url";
    pub const AUTHORS: &str = "org.opencontainers.image.authors";
    pub const DOCUMENTATION: &str = "org.opencontainers.image.documentation";
    pub const SOURCE: &str = "org.opencontainers.image.source";
    pub const VENDOR: &str = "org.opencontainers.image.vendor";
}

/// Conventional layer filenames inside a bundle
pub mod filename {
    /// Title of the bundle metadata layer
    pub const BUNDLE_YAML: &str = "bundle.yaml";

    /// Title of the detached signature layer
    pub const BUNDLE_YAML_SIGNATURE: &str = "bundle.yaml.sig";
}

/// Platform constants for bundle indexes
pub mod platform {
    /// OS marker for bundles, which are not tied to one operating system
    pub const MULTI_OS: &str = "multi";
}

/// Scheme prefix for registry locations
pub const OCI_SCHEME: &str = "oci://";

/// OCI runtime spec version recorded in the bundle config blob
pub const OCI_VERSION: &str = "1.0.1";

/// Kind written into bundle files that omit it
pub const BUNDLE_KIND: &str = "Bundle";
