use std::{fmt, str::FromStr, sync::LazyLock};

use getset::Getters;
use oci_spec::image::Digest;
use regex::Regex;

use crate::{
    config::{
        DEFAULT_OCI_REFERENCE_REPO_NAMESPACE, DEFAULT_OCI_REFERENCE_TAG, DEFAULT_OCI_REGISTRY,
        DOCKER_HUB_REGISTRY_HOST,
    },
    utils::env::get_oci_registry,
    ChaffError,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

static REGISTRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9.-]+(:[0-9]+)?$").expect("registry pattern"));

static REPOSITORY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z0-9]+(?:[._-][a-z0-9]+)*)(/[a-z0-9]+(?:[._-][a-z0-9]+)*)*$")
        .expect("repository pattern")
});

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w[\w.-]{0,127}$").expect("tag pattern"));

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Represents an OCI-compliant image reference.
///
/// Includes the registry, repository, and a selector that is either a tag (optionally pinned
/// by digest) or a bare digest. Missing registry and tag fall back to defaults.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub with_prefix")]
pub struct Reference {
    /// The registry where the image is hosted.
    registry: String,

    /// The repository name of the image.
    repository: String,

    /// The selector specifying the manifest to fetch.
    selector: ReferenceSelector,
}

/// Represents the selector part of an OCI image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceSelector {
    /// Tag variant containing the image tag and an optional digest.
    Tag {
        /// The image tag.
        tag: String,

        /// The optional digest pinning the tag.
        digest: Option<Digest>,
    },

    /// Digest variant containing only a digest.
    Digest(Digest),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ReferenceSelector {
    /// Creates a new ReferenceSelector with the specified tag and no digest.
    pub fn tag(tag: impl Into<String>) -> Self {
        Self::Tag {
            tag: tag.into(),
            digest: None,
        }
    }

    /// Returns the string used in a manifest URL. A digest always wins over a tag.
    pub fn manifest_reference(&self) -> String {
        match self {
            Self::Tag {
                digest: Some(digest),
                ..
            }
            | Self::Digest(digest) => digest.to_string(),
            Self::Tag { tag, digest: None } => tag.clone(),
        }
    }
}

impl Reference {
    /// Returns the host serving the registry API.
    ///
    /// Docker Hub is addressed as `docker.io` but served from `registry-1.docker.io`.
    pub fn registry_host(&self) -> &str {
        if self.registry == DEFAULT_OCI_REGISTRY || self.registry == "index.docker.io" {
            DOCKER_HUB_REGISTRY_HOST
        } else {
            &self.registry
        }
    }

    /// Returns the base URL of the registry API. Local registries are reached over plain HTTP.
    pub fn registry_url(&self) -> String {
        let host = self.registry_host();
        let is_local = ["localhost", "127.0.0.1"]
            .iter()
            .any(|local| host == *local || host.starts_with(&format!("{local}:")));

        if is_local {
            format!("http://{host}")
        } else {
            format!("https://{host}")
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl FromStr for Reference {
    type Err = ChaffError;

    /// Parses a string slice into an OCI image Reference.
    ///
    /// Supported formats include:
    /// - "registry/repository:tag"
    /// - "repository:tag"
    /// - "repository"
    /// - "registry/repository@digest"
    /// - "registry/repository:tag@digest"
    ///
    /// If the registry is omitted, it defaults to the value from [`get_oci_registry`].
    /// If the tag is omitted, it defaults to [`DEFAULT_OCI_REFERENCE_TAG`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let default_registry = get_oci_registry();

        if s.is_empty() {
            return Err(ChaffError::ImageReference("input string is empty".into()));
        }

        let (name, digest) = match s.split_once('@') {
            Some((name, digest_str)) => {
                let digest = digest_str.parse::<Digest>().map_err(|e| {
                    ChaffError::ImageReference(format!("invalid digest {digest_str}: {e}"))
                })?;
                (name, Some(digest))
            }
            None => (s, None),
        };

        let (registry, remainder) = extract_registry_and_path(name, &default_registry);
        let (repository, tag) = extract_repository_and_tag(remainder, &registry)?;

        validate_registry(&registry)?;
        validate_repository(&repository)?;

        let selector = match (tag, digest) {
            (Some(tag), digest) => {
                validate_tag(&tag)?;
                ReferenceSelector::Tag { tag, digest }
            }
            (None, Some(digest)) => ReferenceSelector::Digest(digest),
            (None, None) => ReferenceSelector::tag(DEFAULT_OCI_REFERENCE_TAG),
        };

        Ok(Reference {
            registry,
            repository,
            selector,
        })
    }
}

impl fmt::Display for Reference {
    /// Formats the OCI image Reference into a string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)?;
        match &self.selector {
            ReferenceSelector::Tag {
                tag,
                digest: Some(d),
            } => write!(f, ":{}@{}", tag, d),
            ReferenceSelector::Tag { tag, digest: None } => write!(f, ":{}", tag),
            ReferenceSelector::Digest(d) => write!(f, "@{}", d),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Validates the registry: alphanumerics, dashes and dots, with an optional port.
fn validate_registry(registry: &str) -> Result<(), ChaffError> {
    if REGISTRY_RE.is_match(registry) {
        Ok(())
    } else {
        Err(ChaffError::ImageReference(format!(
            "invalid registry: {}",
            registry
        )))
    }
}

/// Validates the repository name: lowercase components separated by slashes.
fn validate_repository(repository: &str) -> Result<(), ChaffError> {
    if REPOSITORY_RE.is_match(repository) {
        Ok(())
    } else {
        Err(ChaffError::ImageReference(format!(
            "invalid repository: {}",
            repository
        )))
    }
}

/// Validates the tag: a word character followed by up to 127 word characters, dots or dashes.
fn validate_tag(tag: &str) -> Result<(), ChaffError> {
    if TAG_RE.is_match(tag) {
        Ok(())
    } else {
        Err(ChaffError::ImageReference(format!("invalid tag: {}", tag)))
    }
}

/// Extracts the registry and the remaining path from the reference string.
/// If the first segment does not look like a host, the default registry is used.
fn extract_registry_and_path<'a>(reference: &'a str, default_registry: &str) -> (String, &'a str) {
    match reference.split_once('/') {
        Some((first, rest))
            if first.contains('.') || first.contains(':') || first == "localhost" =>
        {
            (first.to_string(), rest)
        }
        _ => (default_registry.to_string(), reference),
    }
}

/// Extracts the repository and the optional tag from the given path string.
/// Single-component repositories on Docker Hub get the default namespace.
fn extract_repository_and_tag(
    path: &str,
    registry: &str,
) -> Result<(String, Option<String>), ChaffError> {
    let (repo_part, tag) = match path.rsplit_once(':') {
        Some((repo, tag)) => (repo, Some(tag.to_string())),
        None => (path, None),
    };

    if repo_part.is_empty() {
        return Err(ChaffError::ImageReference("repository is empty".into()));
    }

    let is_docker_hub = registry == DEFAULT_OCI_REGISTRY || registry == "index.docker.io";
    let repository = if is_docker_hub && !repo_part.contains('/') {
        format!("{}/{}", DEFAULT_OCI_REFERENCE_REPO_NAMESPACE, repo_part)
    } else {
        repo_part.to_string()
    };

    Ok((repository, tag))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    const DIGEST: &str = "sha256:deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef";

    #[test]
    #[serial]
    fn test_reference_defaults() {
        let reference = "alpine".parse::<Reference>().unwrap();
        assert_eq!(reference.get_registry(), DEFAULT_OCI_REGISTRY);
        assert_eq!(reference.get_repository(), "library/alpine");
        assert_eq!(
            reference.get_selector(),
            &ReferenceSelector::tag(DEFAULT_OCI_REFERENCE_TAG)
        );
        assert_eq!(reference.to_string(), "docker.io/library/alpine:latest");
        assert_eq!(reference.registry_host(), DOCKER_HUB_REGISTRY_HOST);
        assert_eq!(reference.registry_url(), "https://registry-1.docker.io");
    }

    #[test]
    #[serial]
    fn test_reference_with_registry_and_tag() {
        let reference = "ghcr.io/org/tool:1.2.3".parse::<Reference>().unwrap();
        assert_eq!(reference.get_registry(), "ghcr.io");
        assert_eq!(reference.get_repository(), "org/tool");
        assert_eq!(reference.get_selector().manifest_reference(), "1.2.3");
        assert_eq!(reference.registry_url(), "https://ghcr.io");
    }

    #[test]
    #[serial]
    fn test_reference_non_hub_single_segment_keeps_name() {
        let reference = "quay.io/busybox".parse::<Reference>().unwrap();
        assert_eq!(reference.get_repository(), "busybox");
    }

    #[test]
    #[serial]
    fn test_reference_registry_with_port() {
        let reference = "localhost:5000/myrepo:1.0".parse::<Reference>().unwrap();
        assert_eq!(reference.get_registry(), "localhost:5000");
        assert_eq!(reference.get_repository(), "myrepo");
        assert_eq!(reference.registry_url(), "http://localhost:5000");
        assert_eq!(reference.to_string(), "localhost:5000/myrepo:1.0");
    }

    #[test]
    #[serial]
    fn test_reference_digest_only() {
        let reference = format!("docker.io/alpine@{DIGEST}")
            .parse::<Reference>()
            .unwrap();
        match reference.get_selector() {
            ReferenceSelector::Digest(d) => assert_eq!(d.to_string(), DIGEST),
            other => panic!("expected digest selector, got {other:?}"),
        }
        assert_eq!(reference.get_selector().manifest_reference(), DIGEST);
        assert_eq!(
            reference.to_string(),
            format!("docker.io/library/alpine@{DIGEST}")
        );
    }

    #[test]
    #[serial]
    fn test_reference_tag_with_digest_prefers_digest() {
        let reference = format!("myorg/myrepo:stable@{DIGEST}")
            .parse::<Reference>()
            .unwrap();
        assert_eq!(reference.get_repository(), "myorg/myrepo");
        assert_eq!(reference.get_selector().manifest_reference(), DIGEST);
        assert_eq!(
            reference.to_string(),
            format!("docker.io/myorg/myrepo:stable@{DIGEST}")
        );
    }

    #[test]
    #[serial]
    fn test_reference_invalid_inputs() {
        assert!("".parse::<Reference>().is_err());
        assert!("   ".parse::<Reference>().is_err());
        assert!("Alpine".parse::<Reference>().is_err());
        assert!(":latest".parse::<Reference>().is_err());
        assert!("alpine:-bad".parse::<Reference>().is_err());
        assert!("alpine@notadigest".parse::<Reference>().is_err());
    }
}
