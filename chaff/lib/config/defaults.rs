//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The registry used when an image reference does not name one.
pub const DEFAULT_OCI_REGISTRY: &str = "docker.io";

/// The tag used when an image reference does not name one.
pub const DEFAULT_OCI_REFERENCE_TAG: &str = "latest";

/// The namespace prepended to single-component repositories on the default registry.
pub const DEFAULT_OCI_REFERENCE_REPO_NAMESPACE: &str = "library";

/// The host that actually serves the Docker Hub registry API.
pub const DOCKER_HUB_REGISTRY_HOST: &str = "registry-1.docker.io";

/// The operating system selected from multi-platform images when none is requested.
pub const DEFAULT_PLATFORM_OS: &str = "linux";

/// The architecture selected from multi-platform images when none is requested.
pub const DEFAULT_PLATFORM_ARCH: &str = "amd64";

/// The number of times a transient registry failure is retried.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// The default log filter when neither `--verbose` nor `RUST_LOG` is given.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// The log filter used with `--verbose`.
pub const VERBOSE_LOG_FILTER: &str = "chaff=debug,info";
