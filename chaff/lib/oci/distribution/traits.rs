use bytes::Bytes;
use futures::stream::BoxStream;
use oci_spec::image::{Descriptor, Digest, ImageIndex, ImageManifest, Platform};

use crate::{ChaffError, ChaffResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A document returned from a manifest endpoint.
///
/// Tags of multi-platform images resolve to an index (or Docker manifest list); single-platform
/// tags and platform digests resolve to an image manifest.
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestDocument {
    /// An image index listing per-platform manifests.
    Index(ImageIndex),

    /// A single image manifest.
    Image(ImageManifest),
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Trait for establishing authentication necessary for a registry client.
#[async_trait::async_trait]
pub trait AuthProvider {
    /// The type of the authentication material.
    type AuthMaterial;

    /// Runs the authentication process for `repository` with the given action scopes.
    async fn get_auth_material(
        &self,
        repository: &str,
        scopes: &[&str],
    ) -> ChaffResult<Self::AuthMaterial>;
}

/// Trait defining the read-only operations needed to inspect an image in an OCI-compliant
/// registry.
#[async_trait::async_trait]
pub trait OciRegistryPull {
    /// Fetches the manifest document for a tag or digest.
    async fn fetch_manifest_document(
        &self,
        repository: &str,
        reference: &str,
    ) -> ChaffResult<ManifestDocument>;

    /// Fetches a blob by digest as a byte stream.
    async fn fetch_image_blob(
        &self,
        repository: &str,
        digest: &Digest,
    ) -> ChaffResult<BoxStream<'static, ChaffResult<Bytes>>>;

    /// Resolves a tag or digest to the image manifest for `platform`.
    ///
    /// If the reference names an index, the matching platform entry is fetched; when no entry
    /// matches, the first runnable entry is used.
    async fn fetch_image_manifest(
        &self,
        repository: &str,
        reference: &str,
        platform: &Platform,
    ) -> ChaffResult<ImageManifest> {
        match self.fetch_manifest_document(repository, reference).await? {
            ManifestDocument::Image(manifest) => Ok(manifest),
            ManifestDocument::Index(index) => {
                let descriptor = select_platform_manifest(&index, platform).ok_or_else(|| {
                    ChaffError::ManifestNotFound(format!("{repository}:{reference}"))
                })?;

                tracing::info!(
                    "selected manifest {} for {}/{}",
                    descriptor.digest(),
                    descriptor
                        .platform()
                        .as_ref()
                        .map(|p| p.os().to_string())
                        .unwrap_or_default(),
                    descriptor
                        .platform()
                        .as_ref()
                        .map(|p| p.architecture().to_string())
                        .unwrap_or_default(),
                );

                let digest = descriptor.digest().to_string();
                match self.fetch_manifest_document(repository, &digest).await? {
                    ManifestDocument::Image(manifest) => Ok(manifest),
                    ManifestDocument::Index(_) => Err(ChaffError::ManifestNotFound(format!(
                        "{repository}@{digest} is a nested index"
                    ))),
                }
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Picks the index entry for `platform`.
///
/// The os and architecture must match; the variant must match only when both sides name one.
/// Falls back to the first entry that is not an attestation (`unknown/unknown`).
pub fn select_platform_manifest<'a>(
    index: &'a ImageIndex,
    platform: &Platform,
) -> Option<&'a Descriptor> {
    let manifests = index.manifests();

    let exact = manifests.iter().find(|m| {
        m.platform().as_ref().is_some_and(|p| {
            p.os() == platform.os()
                && p.architecture() == platform.architecture()
                && match (p.variant(), platform.variant()) {
                    (Some(a), Some(b)) => a == b,
                    _ => true,
                }
        })
    });

    exact.or_else(|| {
        manifests.iter().find(|m| {
            m.platform()
                .as_ref()
                .map_or(true, |p| p.os().to_string() != "unknown")
        })
    })
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use oci_spec::image::{Arch, Os, PlatformBuilder};

    use super::*;

    const INDEX: &str = r#"{
        "schemaVersion": 2,
        "mediaType": "application/vnd.oci.image.index.v1+json",
        "manifests": [
            {
                "mediaType": "application/vnd.oci.image.manifest.v1+json",
                "digest": "sha256:1111111111111111111111111111111111111111111111111111111111111111",
                "size": 100,
                "platform": { "architecture": "unknown", "os": "unknown" }
            },
            {
                "mediaType": "application/vnd.oci.image.manifest.v1+json",
                "digest": "sha256:2222222222222222222222222222222222222222222222222222222222222222",
                "size": 100,
                "platform": { "architecture": "amd64", "os": "linux" }
            },
            {
                "mediaType": "application/vnd.oci.image.manifest.v1+json",
                "digest": "sha256:3333333333333333333333333333333333333333333333333333333333333333",
                "size": 100,
                "platform": { "architecture": "arm64", "os": "linux", "variant": "v8" }
            }
        ]
    }"#;

    fn platform(arch: &str, variant: Option<&str>) -> Platform {
        let mut builder = PlatformBuilder::default()
            .os(Os::from("linux"))
            .architecture(Arch::from(arch));
        if let Some(variant) = variant {
            builder = builder.variant(variant.to_string());
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_select_platform_manifest_exact_match() {
        let index: ImageIndex = serde_json::from_str(INDEX).unwrap();

        let selected = select_platform_manifest(&index, &platform("arm64", Some("v8"))).unwrap();
        assert!(selected.digest().to_string().ends_with("3333"));

        let selected = select_platform_manifest(&index, &platform("arm64", None)).unwrap();
        assert!(selected.digest().to_string().ends_with("3333"));

        let selected = select_platform_manifest(&index, &platform("amd64", None)).unwrap();
        assert!(selected.digest().to_string().ends_with("2222"));
    }

    #[test]
    fn test_select_platform_manifest_falls_back_past_attestations() {
        let index: ImageIndex = serde_json::from_str(INDEX).unwrap();
        let selected = select_platform_manifest(&index, &platform("s390x", None)).unwrap();
        assert!(selected.digest().to_string().ends_with("2222"));
    }
}
