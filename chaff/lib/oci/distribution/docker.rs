use std::{collections::HashMap, sync::LazyLock};

use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt};
use getset::Getters;
use oci_spec::image::{Digest, ImageIndex, ImageManifest};
use regex::Regex;
use reqwest::{header, Client, Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{
    oci::Reference,
    utils::{get_max_retries, get_registry_credentials},
    ChaffError, ChaffResult,
};

use super::{AuthProvider, ManifestDocument, OciRegistryPull};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The MIME type for OCI image indexes.
const OCI_INDEX_MIME_TYPE: &str = "application/vnd.oci.image.index.v1+json";

/// The MIME type for OCI image manifests.
const OCI_MANIFEST_MIME_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";

/// The MIME type for Docker Registry v2 manifest lists.
const DOCKER_MANIFEST_LIST_MIME_TYPE: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";

/// The MIME type for Docker Registry v2 manifests.
const DOCKER_MANIFEST_MIME_TYPE: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// Matches `key="value"` pairs in a `WWW-Authenticate` challenge.
static CHALLENGE_PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\w+)="([^"]*)""#).expect("challenge pattern"));

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A client for the read side of the OCI distribution API (Docker Registry HTTP API v2).
///
/// Authentication follows the registry's `WWW-Authenticate` challenge. Bearer tokens are
/// requested anonymously unless credentials are configured through the environment or stored by
/// `docker login`, and are cached per repository for the lifetime of the client.
///
/// [See OCI distribution specification for more details][OCI Distribution Spec]
///
/// [OCI Distribution Spec]: https://github.com/opencontainers/distribution-spec/blob/main/spec.md
#[derive(Debug, Getters)]
#[getset(get = "pub with_prefix")]
pub struct DockerRegistry {
    /// The HTTP client used to make requests to the registry.
    client: ClientWithMiddleware,

    /// The base URL of the registry API.
    base_url: String,

    /// Basic credentials, if configured.
    #[getset(skip)]
    credentials: Option<(String, String)>,

    /// Auth material cached per repository.
    #[getset(skip)]
    auth_cache: Mutex<HashMap<String, RegistryAuth>>,
}

/// Authentication to attach to registry requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryAuth {
    /// The registry does not require authentication.
    Anonymous,

    /// HTTP basic authentication.
    Basic {
        /// The username.
        username: String,

        /// The password or token.
        password: String,
    },

    /// A bearer token from the registry's token service.
    Bearer(String),
}

/// A parsed `WWW-Authenticate` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChallenge {
    /// A token-service challenge.
    Bearer {
        /// The token endpoint.
        realm: String,

        /// The service name to request a token for.
        service: Option<String>,
    },

    /// A basic-auth challenge.
    Basic,
}

/// The token service response. Registries return either `token` or `access_token`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DockerAuthMaterial {
    /// The token used to authenticate requests.
    #[serde(default)]
    token: Option<String>,

    /// The OAuth2-compatible alias of `token`.
    #[serde(default)]
    access_token: Option<String>,

    /// The lifetime of the token in seconds.
    #[serde(default)]
    expires_in: Option<u32>,
}

/// Represents an error response from the registry, including detailed error messages.
#[derive(Debug, Serialize, Deserialize, Error)]
#[error("docker registry error: {errors}")]
pub struct DockerRegistryResponseError {
    /// The errors returned by the registry.
    errors: serde_json::Value,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl DockerRegistry {
    /// Creates a client for the registry that serves `reference`, with retries for transient
    /// errors.
    pub fn new(reference: &Reference) -> Self {
        Self::with_base_url(reference.registry_url())
    }

    /// Creates a client for the registry API at `base_url`, picking up any credentials stored for
    /// its host.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(get_max_retries());
        let client_builder = ClientBuilder::new(Client::new());
        let client = client_builder
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        let base_url = base_url.into().trim_end_matches('/').to_string();
        let credentials = get_registry_credentials(&base_url);

        Self {
            client,
            base_url,
            credentials,
            auth_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached auth material for `repository`, authenticating on first use.
    async fn pull_auth(&self, repository: &str) -> ChaffResult<RegistryAuth> {
        let mut cache = self.auth_cache.lock().await;
        if let Some(auth) = cache.get(repository) {
            return Ok(auth.clone());
        }

        let auth = self.get_auth_material(repository, &["pull"]).await?;
        cache.insert(repository.to_string(), auth.clone());
        Ok(auth)
    }

    /// Sends an authorized GET request and checks the response status.
    async fn get(
        &self,
        repository: &str,
        url: String,
        accept: Option<&str>,
    ) -> ChaffResult<Response> {
        let auth = self.pull_auth(repository).await?;

        let mut request = self.client.get(&url);
        if let Some(accept) = accept {
            request = request.header(header::ACCEPT, accept);
        }

        let response = authorize(request, &auth).send().await?;
        check_response(response, &url).await
    }
}

impl AuthChallenge {
    /// Parses a `WWW-Authenticate` header value.
    pub fn parse(value: &str) -> Option<Self> {
        let (scheme, params) = value.trim().split_once(' ').unwrap_or((value.trim(), ""));

        if scheme.eq_ignore_ascii_case("basic") {
            return Some(Self::Basic);
        }

        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let params: HashMap<_, _> = CHALLENGE_PARAM_RE
            .captures_iter(params)
            .map(|c| (c[1].to_ascii_lowercase(), c[2].to_string()))
            .collect();

        Some(Self::Bearer {
            realm: params.get("realm")?.clone(),
            service: params.get("service").cloned(),
        })
    }
}

impl DockerAuthMaterial {
    /// Returns the issued token, preferring `token` over `access_token`.
    pub fn into_token(self) -> Option<String> {
        self.token
            .filter(|t| !t.is_empty())
            .or(self.access_token.filter(|t| !t.is_empty()))
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for RegistryAuth {
    fn default() -> Self {
        Self::Anonymous
    }
}

#[async_trait::async_trait]
impl AuthProvider for DockerRegistry {
    type AuthMaterial = RegistryAuth;

    /// Probes `/v2/` and answers whatever challenge the registry returns.
    async fn get_auth_material(
        &self,
        repository: &str,
        scopes: &[&str],
    ) -> ChaffResult<Self::AuthMaterial> {
        let ping_url = format!("{}/v2/", self.base_url);
        let ping = self.client.get(&ping_url).send().await?;

        if ping.status().is_success() {
            tracing::debug!("registry {} allows anonymous access", self.base_url);
            return Ok(RegistryAuth::Anonymous);
        }

        if ping.status() != StatusCode::UNAUTHORIZED {
            return Err(ChaffError::UnexpectedResponse {
                status: ping.status(),
                url: ping_url,
            });
        }

        let challenge = ping
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .and_then(AuthChallenge::parse)
            .ok_or_else(|| {
                ChaffError::Authentication(format!(
                    "{} returned 401 without a supported challenge",
                    self.base_url
                ))
            })?;

        match challenge {
            AuthChallenge::Basic => {
                let (username, password) = self.credentials.clone().ok_or_else(|| {
                    ChaffError::Authentication(format!(
                        "{} requires basic credentials",
                        self.base_url
                    ))
                })?;
                Ok(RegistryAuth::Basic { username, password })
            }
            AuthChallenge::Bearer { realm, service } => {
                let scope = format!("repository:{}:{}", repository, scopes.join(","));
                tracing::debug!("requesting token from {realm} for {scope}");

                let mut query = vec![("scope", scope)];
                if let Some(service) = service {
                    query.push(("service", service));
                }

                let mut request = self.client.get(&realm).query(&query);
                if let Some((username, password)) = &self.credentials {
                    request = request.basic_auth(username, Some(password));
                }

                let response = check_response(request.send().await?, &realm).await?;
                let material = response.json::<DockerAuthMaterial>().await?;
                let token = material.into_token().ok_or_else(|| {
                    ChaffError::Authentication(format!("{realm} returned no token"))
                })?;

                Ok(RegistryAuth::Bearer(token))
            }
        }
    }
}

#[async_trait::async_trait]
impl OciRegistryPull for DockerRegistry {
    async fn fetch_manifest_document(
        &self,
        repository: &str,
        reference: &str,
    ) -> ChaffResult<ManifestDocument> {
        let accept = [
            OCI_INDEX_MIME_TYPE,
            OCI_MANIFEST_MIME_TYPE,
            DOCKER_MANIFEST_LIST_MIME_TYPE,
            DOCKER_MANIFEST_MIME_TYPE,
        ]
        .join(", ");

        let url = format!("{}/v2/{}/manifests/{}", self.base_url, repository, reference);
        tracing::info!("fetching manifest: {repository}:{reference}");

        let response = self.get(repository, url, Some(&accept)).await?;
        let body = response.bytes().await?;

        parse_manifest_document(&body)
    }

    async fn fetch_image_blob(
        &self,
        repository: &str,
        digest: &Digest,
    ) -> ChaffResult<BoxStream<'static, ChaffResult<Bytes>>> {
        tracing::info!("fetching blob: {repository} {digest}");

        let url = format!("{}/v2/{}/blobs/{}", self.base_url, repository, digest);
        let response = self.get(repository, url, None).await?;
        let stream = response
            .bytes_stream()
            .map(|item| item.map_err(ChaffError::from));

        Ok(stream.boxed())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Attaches auth material to a request.
fn authorize(request: RequestBuilder, auth: &RegistryAuth) -> RequestBuilder {
    match auth {
        RegistryAuth::Anonymous => request,
        RegistryAuth::Basic { username, password } => request.basic_auth(username, Some(password)),
        RegistryAuth::Bearer(token) => request.bearer_auth(token),
    }
}

/// Turns a non-success response into an error, decoding the registry error envelope if present.
async fn check_response(response: Response, url: &str) -> ChaffResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.bytes().await.unwrap_or_default();
    match serde_json::from_slice::<DockerRegistryResponseError>(&body) {
        Ok(err) => Err(err.into()),
        Err(_) => Err(ChaffError::UnexpectedResponse {
            status,
            url: url.to_string(),
        }),
    }
}

/// Decodes a manifest endpoint body into an index or an image manifest.
///
/// The `mediaType` field is optional in OCI documents, so the shape decides: anything with a
/// `manifests` array is an index.
pub fn parse_manifest_document(body: &[u8]) -> ChaffResult<ManifestDocument> {
    let value: serde_json::Value = serde_json::from_slice(body)?;

    if value.get("errors").is_some() {
        let err: DockerRegistryResponseError = serde_json::from_value(value)?;
        return Err(err.into());
    }

    if value.get("manifests").is_some_and(|m| m.is_array()) {
        let index: ImageIndex = serde_json::from_value(value)?;
        return Ok(ManifestDocument::Index(index));
    }

    let manifest: ImageManifest = serde_json::from_value(value)?;
    Ok(ManifestDocument::Image(manifest))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "schemaVersion": 2,
        "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
        "config": {
            "mediaType": "application/vnd.docker.container.image.v1+json",
            "size": 1469,
            "digest": "sha256:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
        },
        "layers": [
            {
                "mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip",
                "size": 3408729,
                "digest": "sha256:bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"
            }
        ]
    }"#;

    const MANIFEST_LIST: &str = r#"{
        "schemaVersion": 2,
        "mediaType": "application/vnd.docker.distribution.manifest.list.v2+json",
        "manifests": [
            {
                "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
                "size": 528,
                "digest": "sha256:cccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccc",
                "platform": { "architecture": "amd64", "os": "linux" }
            }
        ]
    }"#;

    #[test]
    fn test_parse_manifest_document_image() {
        match parse_manifest_document(MANIFEST.as_bytes()).unwrap() {
            ManifestDocument::Image(manifest) => {
                assert_eq!(manifest.layers().len(), 1);
                assert_eq!(manifest.layers()[0].size(), 3408729);
            }
            other => panic!("expected image manifest, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_manifest_document_index() {
        match parse_manifest_document(MANIFEST_LIST.as_bytes()).unwrap() {
            ManifestDocument::Index(index) => assert_eq!(index.manifests().len(), 1),
            other => panic!("expected index, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_manifest_document_error_envelope() {
        let body = r#"{"errors":[{"code":"MANIFEST_UNKNOWN","message":"manifest unknown"}]}"#;
        let err = parse_manifest_document(body.as_bytes()).unwrap_err();
        assert!(matches!(err, ChaffError::DockerRegistry(_)));
    }

    #[test]
    fn test_auth_challenge_parse() {
        let challenge = AuthChallenge::parse(
            r#"Bearer realm="https://auth.docker.io/token",service="registry.docker.io""#,
        );
        assert_eq!(
            challenge,
            Some(AuthChallenge::Bearer {
                realm: "https://auth.docker.io/token".into(),
                service: Some("registry.docker.io".into()),
            })
        );

        let challenge = AuthChallenge::parse(r#"Bearer realm="https://ghcr.io/token""#);
        assert_eq!(
            challenge,
            Some(AuthChallenge::Bearer {
                realm: "https://ghcr.io/token".into(),
                service: None,
            })
        );

        assert_eq!(
            AuthChallenge::parse(r#"Basic realm="Registry""#),
            Some(AuthChallenge::Basic)
        );
        assert_eq!(AuthChallenge::parse("Bearer service=\"x\""), None);
        assert_eq!(AuthChallenge::parse("Negotiate"), None);
    }

    #[test]
    fn test_auth_material_token_preference() {
        let material: DockerAuthMaterial =
            serde_json::from_str(r#"{"token":"a","access_token":"b"}"#).unwrap();
        assert_eq!(material.into_token().as_deref(), Some("a"));

        let material: DockerAuthMaterial =
            serde_json::from_str(r#"{"access_token":"b","expires_in":300}"#).unwrap();
        assert_eq!(material.into_token().as_deref(), Some("b"));

        let material: DockerAuthMaterial = serde_json::from_str("{}").unwrap();
        assert_eq!(material.into_token(), None);
    }

    #[ignore = "requires Docker Hub access"]
    #[test_log::test(tokio::test)]
    async fn test_authenticate() -> anyhow::Result<()> {
        let registry = DockerRegistry::new(&"library/alpine".parse()?);
        let auth = registry
            .get_auth_material("library/alpine", &["pull"])
            .await?;

        assert!(matches!(auth, RegistryAuth::Bearer(_)));

        Ok(())
    }
}
