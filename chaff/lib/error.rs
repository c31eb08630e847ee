use std::{
    error::Error,
    fmt::{self, Display},
};
use thiserror::Error;

use crate::oci::distribution::DockerRegistryResponseError;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a chaff-related operation.
pub type ChaffResult<T> = Result<T, ChaffError>;

/// An error that occurred while fetching or reading an image.
///
/// Classification itself never fails; every variant here originates in a collaborator of the
/// overlay engine (registry access, blob download, archive decoding, argument parsing).
#[derive(Debug, Error)]
pub enum ChaffError {
    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An error that can represent any error.
    #[error(transparent)]
    Custom(#[from] AnyError),

    /// An error that occurred during an HTTP request.
    #[error("http request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// An error that occurred during an HTTP middleware operation.
    #[error("http middleware error: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    /// An error returned by a registry in its JSON error envelope.
    #[error("docker registry error: {0}")]
    DockerRegistry(#[from] DockerRegistryResponseError),

    /// An error that occurred while decoding JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An error that occurred while parsing an OCI document.
    #[error("oci spec error: {0}")]
    OciSpec(#[from] oci_spec::OciSpecError),

    /// An error that occurred when a join handle returned an error.
    #[error("join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    /// The image reference could not be parsed.
    #[error("image reference error: {0}")]
    ImageReference(String),

    /// No manifest was found for the requested reference or platform.
    #[error("manifest not found: {0}")]
    ManifestNotFound(String),

    /// The registry rejected or could not complete authentication.
    #[error("registry authentication failed: {0}")]
    Authentication(String),

    /// The registry answered with an unexpected status.
    #[error("unexpected registry response ({status}) for {url}")]
    UnexpectedResponse {
        /// The HTTP status returned.
        status: reqwest::StatusCode,

        /// The URL that was requested.
        url: String,
    },

    /// A layer uses a media type whose compression is not supported.
    #[error("unsupported layer media type: {0}")]
    UnsupportedLayerMediaType(String),

    /// A layer archive could not be read.
    #[error("failed to read layer {layer}: {source}")]
    LayerHandling {
        /// The underlying I/O error.
        source: std::io::Error,

        /// The layer digest or path.
        layer: String,
    },

    /// A platform string could not be parsed.
    #[error("invalid platform: {0}")]
    InvalidPlatform(String),

    /// An invalid argument was provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// An error that can represent any error.
#[derive(Debug)]
pub struct AnyError {
    error: anyhow::Error,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ChaffError {
    /// Creates a new `Err` result.
    pub fn custom(error: impl Into<anyhow::Error>) -> ChaffError {
        ChaffError::Custom(AnyError {
            error: error.into(),
        })
    }
}

impl AnyError {
    /// Downcasts the error to a `T`.
    pub fn downcast<T>(&self) -> Option<&T>
    where
        T: Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error.downcast_ref::<T>()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Creates an `Ok` `ChaffResult`.
#[allow(non_snake_case)]
pub fn Ok<T>(value: T) -> ChaffResult<T> {
    Result::Ok(value)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl PartialEq for AnyError {
    fn eq(&self, other: &Self) -> bool {
        self.error.to_string() == other.error.to_string()
    }
}

impl Display for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Error for AnyError {}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
