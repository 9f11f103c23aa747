#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::bundle::{Bundle, BuildData, Metadata, Package};
    use crate::constants::platform::MULTI_OS;
    use crate::manifest::Platform;
    use crate::publish::{Publisher, Signature};
    use crate::registry::memory::MemoryRegistry;
    use crate::registry::Connector;
    use std::fs;
    use tempfile::tempdir;

    const BUNDLE_REF: &str = "localhost:5000/bundles/core:0.1.0";

    fn bundle() -> Bundle {
        Bundle {
            kind: "Bundle".to_string(),
            metadata: Metadata {
                name: "core".to_string(),
                version: "0.1.0".to_string(),
                architecture: "amd64".to_string(),
                ..Default::default()
            },
            build: BuildData::default(),
            packages: vec![Package {
                name: "init".to_string(),
                repository: "localhost:5000/pkgs/init".to_string(),
                reference: "1.0.0".to_string(),
            }],
        }
    }

    async fn published(signature: Signature) -> MemoryRegistry {
        let registry = MemoryRegistry::new();
        let bundle = bundle();
        registry.seed_package(&bundle.packages[0].source_reference(), &[b"init-layer"]);
        Publisher::new(registry.clone())
            .publish(&bundle, "localhost:5000/bundles", signature)
            .await
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_pull_writes_metadata_and_signature() {
        let registry = published(Signature::from(b"sig".to_vec())).await;
        let remote = registry
            .connect(BUNDLE_REF, &Platform::new("amd64", MULTI_OS))
            .unwrap();
        let dir = tempdir().unwrap();

        let written = pull_bundle(&remote, dir.path()).await.unwrap();

        assert_eq!(written.len(), 3);
        assert_eq!(written[0], dir.path().join(ROOT_MANIFEST_FILE));
        let pulled = Bundle::load(&dir.path().join(filename::BUNDLE_YAML)).unwrap();
        assert_eq!(pulled, bundle());
        assert_eq!(
            fs::read(dir.path().join(filename::BUNDLE_YAML_SIGNATURE)).unwrap(),
            b"sig".to_vec()
        );

        let index = registry.index(BUNDLE_REF).unwrap();
        let entry = index.find(&Platform::new("amd64", MULTI_OS)).unwrap();
        let manifest = fs::read(&written[0]).unwrap();
        assert_eq!(digest_of(&manifest), entry.digest);
    }

    #[tokio::test]
    async fn test_pull_unsigned_skips_signature() {
        let registry = published(Signature::Unsigned).await;
        let remote = registry
            .connect(BUNDLE_REF, &Platform::new("amd64", MULTI_OS))
            .unwrap();
        let dir = tempdir().unwrap();

        let written = pull_bundle(&remote, &dir.path().join("out")).await.unwrap();

        assert_eq!(written.len(), 2);
        assert!(dir.path().join("out").join(filename::BUNDLE_YAML).exists());
        assert!(!dir
            .path()
            .join("out")
            .join(filename::BUNDLE_YAML_SIGNATURE)
            .exists());
    }

    #[tokio::test]
    async fn test_pull_missing_platform() {
        let registry = published(Signature::Unsigned).await;
        let remote = registry
            .connect(BUNDLE_REF, &Platform::new("arm64", MULTI_OS))
            .unwrap();
        let dir = tempdir().unwrap();

        let err = pull_bundle(&remote, dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::PlatformNotFound { .. }));
        assert!(!dir.path().join(ROOT_MANIFEST_FILE).exists());
    }
}
