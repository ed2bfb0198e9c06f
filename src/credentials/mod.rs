//! Registry credential resolution
//!
//! Credentials come from the Docker CLI config file (`config.json`) or from
//! external `docker-credential-*` helper programs, in the order implemented by
//! [`CredentialResolver::resolve`].

pub mod docker_config;
pub mod helper;
pub mod resolver;

pub use docker_config::{AuthEntry, DockerConfig};
pub use helper::CredentialHelper;
pub use resolver::CredentialResolver;

use std::fmt;

/// Canonical key for the default public registry
pub const DOCKER_HUB_KEY: &str = "https://index.docker.io/v1/";

/// Username/password pair for one registry.
///
/// An empty `username` with a non-empty `password` means the password is an
/// identity token, to be exchanged for access tokens rather than sent as-is.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn identity_token(token: impl Into<String>) -> Self {
        Self::new("", token)
    }

    /// Anonymous access
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }

    pub fn is_identity_token(&self) -> bool {
        self.username.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}

/// Map the historical Docker Hub host names onto the key the Docker CLI
/// stores them under. Every other host is returned unchanged.
pub fn resolve_registry_host(host: &str) -> &str {
    match host {
        "index.docker.io" | "docker.io" | DOCKER_HUB_KEY | "registry-1.docker.io" => DOCKER_HUB_KEY,
        other => other,
    }
}
