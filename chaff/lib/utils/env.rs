use std::{collections::HashMap, env, fs, path::PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use crate::config::{DEFAULT_MAX_RETRIES, DEFAULT_OCI_REGISTRY};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Environment variable overriding the default registry.
pub const CHAFF_OCI_REGISTRY_ENV_VAR: &str = "CHAFF_OCI_REGISTRY";

/// Environment variable overriding the number of retries for transient registry failures.
pub const CHAFF_MAX_RETRIES_ENV_VAR: &str = "CHAFF_MAX_RETRIES";

/// Environment variable holding the registry username.
pub const CHAFF_REGISTRY_USERNAME_ENV_VAR: &str = "CHAFF_REGISTRY_USERNAME";

/// Environment variable holding the registry password or token.
pub const CHAFF_REGISTRY_PASSWORD_ENV_VAR: &str = "CHAFF_REGISTRY_PASSWORD";

/// Environment variable naming the directory that holds Docker's `config.json`.
pub const DOCKER_CONFIG_ENV_VAR: &str = "DOCKER_CONFIG";

/// The filename of Docker's client configuration.
pub const DOCKER_CONFIG_FILENAME: &str = "config.json";

/// Names Docker Hub is known by in `config.json` keys and image references.
const DOCKER_HUB_ALIASES: &[&str] = &["docker.io", "index.docker.io", "registry-1.docker.io"];

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The subset of Docker's `config.json` that holds stored logins.
#[derive(Debug, Default, Deserialize)]
struct DockerConfig {
    #[serde(default)]
    auths: HashMap<String, DockerConfigAuth>,
}

/// A stored login. `docker login` writes `auth` as base64 `username:password`.
#[derive(Debug, Default, Deserialize)]
struct DockerConfigAuth {
    #[serde(default)]
    auth: Option<String>,

    #[serde(default)]
    username: Option<String>,

    #[serde(default)]
    password: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl DockerConfigAuth {
    fn credentials(&self) -> Option<(String, String)> {
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            return Some((username.clone(), password.clone()));
        }

        let decoded = STANDARD.decode(self.auth.as_deref()?.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        Some((username.to_string(), password.to_string()))
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns the registry to use for references that do not name one.
pub fn get_oci_registry() -> String {
    match env::var(CHAFF_OCI_REGISTRY_ENV_VAR) {
        Ok(registry) if !registry.trim().is_empty() => registry.trim().to_string(),
        _ => DEFAULT_OCI_REGISTRY.to_string(),
    }
}

/// Returns the number of retries for transient registry failures.
pub fn get_max_retries() -> u32 {
    match env::var(CHAFF_MAX_RETRIES_ENV_VAR) {
        Ok(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(
                "ignoring invalid {CHAFF_MAX_RETRIES_ENV_VAR}={value}, using {DEFAULT_MAX_RETRIES}"
            );
            DEFAULT_MAX_RETRIES
        }),
        Err(_) => DEFAULT_MAX_RETRIES,
    }
}

/// Returns the credentials for `registry`.
///
/// `CHAFF_REGISTRY_USERNAME` and `CHAFF_REGISTRY_PASSWORD` win when both are set. Otherwise the
/// login stored by `docker login` is used, if any. `registry` may be a bare host or a URL.
pub fn get_registry_credentials(registry: &str) -> Option<(String, String)> {
    if let (Ok(username), Ok(password)) = (
        env::var(CHAFF_REGISTRY_USERNAME_ENV_VAR),
        env::var(CHAFF_REGISTRY_PASSWORD_ENV_VAR),
    ) {
        return Some((username, password));
    }

    get_docker_config_credentials(registry)
}

/// Returns the path of Docker's `config.json`: under `DOCKER_CONFIG` if set, else `~/.docker`.
pub fn get_docker_config_path() -> Option<PathBuf> {
    match env::var_os(DOCKER_CONFIG_ENV_VAR) {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir).join(DOCKER_CONFIG_FILENAME)),
        _ => dirs::home_dir().map(|home| home.join(".docker").join(DOCKER_CONFIG_FILENAME)),
    }
}

fn get_docker_config_credentials(registry: &str) -> Option<(String, String)> {
    let path = get_docker_config_path()?;
    let contents = fs::read_to_string(&path).ok()?;
    let config: DockerConfig = match serde_json::from_str(&contents) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("ignoring unreadable docker config {}: {e}", path.display());
            return None;
        }
    };

    let wanted = registry_key(registry);
    let (key, auth) = config
        .auths
        .iter()
        .find(|(key, _)| registry_key(key) == wanted)?;

    let credentials = auth.credentials();
    if credentials.is_none() {
        tracing::debug!("docker config entry {key} has no usable credentials");
    }

    credentials
}

/// Reduces a registry name, URL or `config.json` key to its host. Docker Hub aliases collapse to
/// `docker.io`.
fn registry_key(registry: &str) -> &str {
    let host = registry
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let host = host.split('/').next().unwrap_or(host);

    if DOCKER_HUB_ALIASES.contains(&host) {
        DEFAULT_OCI_REGISTRY
    } else {
        host
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use tempfile::TempDir;

    use super::*;

    fn docker_config_dir(config: &serde_json::Value) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(DOCKER_CONFIG_FILENAME),
            serde_json::to_vec(config).unwrap(),
        )
        .unwrap();
        dir
    }

    #[test]
    #[serial]
    fn test_env_oci_registry_override() {
        env::remove_var(CHAFF_OCI_REGISTRY_ENV_VAR);
        assert_eq!(get_oci_registry(), DEFAULT_OCI_REGISTRY);

        env::set_var(CHAFF_OCI_REGISTRY_ENV_VAR, " ghcr.io ");
        assert_eq!(get_oci_registry(), "ghcr.io");

        env::set_var(CHAFF_OCI_REGISTRY_ENV_VAR, "");
        assert_eq!(get_oci_registry(), DEFAULT_OCI_REGISTRY);

        env::remove_var(CHAFF_OCI_REGISTRY_ENV_VAR);
    }

    #[test]
    #[serial]
    fn test_env_max_retries() {
        env::remove_var(CHAFF_MAX_RETRIES_ENV_VAR);
        assert_eq!(get_max_retries(), DEFAULT_MAX_RETRIES);

        env::set_var(CHAFF_MAX_RETRIES_ENV_VAR, "7");
        assert_eq!(get_max_retries(), 7);

        env::set_var(CHAFF_MAX_RETRIES_ENV_VAR, "many");
        assert_eq!(get_max_retries(), DEFAULT_MAX_RETRIES);

        env::remove_var(CHAFF_MAX_RETRIES_ENV_VAR);
    }

    #[test]
    #[serial]
    fn test_env_registry_credentials_require_both() {
        let empty = tempfile::tempdir().unwrap();
        env::set_var(DOCKER_CONFIG_ENV_VAR, empty.path());
        env::remove_var(CHAFF_REGISTRY_USERNAME_ENV_VAR);
        env::remove_var(CHAFF_REGISTRY_PASSWORD_ENV_VAR);
        assert!(get_registry_credentials("ghcr.io").is_none());

        env::set_var(CHAFF_REGISTRY_USERNAME_ENV_VAR, "user");
        assert!(get_registry_credentials("ghcr.io").is_none());

        env::set_var(CHAFF_REGISTRY_PASSWORD_ENV_VAR, "secret");
        assert_eq!(
            get_registry_credentials("ghcr.io"),
            Some(("user".to_string(), "secret".to_string()))
        );

        env::remove_var(CHAFF_REGISTRY_USERNAME_ENV_VAR);
        env::remove_var(CHAFF_REGISTRY_PASSWORD_ENV_VAR);
        env::remove_var(DOCKER_CONFIG_ENV_VAR);
    }

    #[test]
    #[serial]
    fn test_env_registry_credentials_from_docker_config() {
        let dir = docker_config_dir(&serde_json::json!({
            "auths": {
                "ghcr.io": { "auth": STANDARD.encode("octo:hunter2") },
                "https://index.docker.io/v1/": { "auth": STANDARD.encode("whale:p:ss") },
                "quay.io": { "username": "robot", "password": "token" },
                "registry.example.com": { "auth": "not base64!" }
            },
            "credsStore": "desktop"
        }));

        env::remove_var(CHAFF_REGISTRY_USERNAME_ENV_VAR);
        env::remove_var(CHAFF_REGISTRY_PASSWORD_ENV_VAR);
        env::set_var(DOCKER_CONFIG_ENV_VAR, dir.path());

        assert_eq!(
            get_docker_config_path(),
            Some(dir.path().join(DOCKER_CONFIG_FILENAME))
        );
        assert_eq!(
            get_registry_credentials("ghcr.io"),
            Some(("octo".to_string(), "hunter2".to_string()))
        );
        assert_eq!(
            get_registry_credentials("https://ghcr.io"),
            Some(("octo".to_string(), "hunter2".to_string()))
        );

        // Docker Hub is stored under its legacy index URL but served from registry-1.
        let hub = Some(("whale".to_string(), "p:ss".to_string()));
        assert_eq!(get_registry_credentials("docker.io"), hub);
        assert_eq!(get_registry_credentials("https://registry-1.docker.io"), hub);

        assert_eq!(
            get_registry_credentials("quay.io"),
            Some(("robot".to_string(), "token".to_string()))
        );
        assert!(get_registry_credentials("registry.example.com").is_none());
        assert!(get_registry_credentials("gcr.io").is_none());

        // Explicit credentials take precedence over stored logins.
        env::set_var(CHAFF_REGISTRY_USERNAME_ENV_VAR, "user");
        env::set_var(CHAFF_REGISTRY_PASSWORD_ENV_VAR, "secret");
        assert_eq!(
            get_registry_credentials("ghcr.io"),
            Some(("user".to_string(), "secret".to_string()))
        );

        env::remove_var(CHAFF_REGISTRY_USERNAME_ENV_VAR);
        env::remove_var(CHAFF_REGISTRY_PASSWORD_ENV_VAR);
        env::remove_var(DOCKER_CONFIG_ENV_VAR);
    }

    #[test]
    #[serial]
    fn test_env_registry_credentials_ignore_malformed_docker_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(DOCKER_CONFIG_FILENAME), "{ not json").unwrap();

        env::remove_var(CHAFF_REGISTRY_USERNAME_ENV_VAR);
        env::remove_var(CHAFF_REGISTRY_PASSWORD_ENV_VAR);
        env::set_var(DOCKER_CONFIG_ENV_VAR, dir.path());
        assert!(get_registry_credentials("ghcr.io").is_none());

        env::remove_var(DOCKER_CONFIG_ENV_VAR);
    }
}
