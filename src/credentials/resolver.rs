//! Credential resolution for one registry host

use crate::credentials::docker_config::DockerConfig;
use crate::credentials::helper::{CredentialHelper, default_helper_name};
use crate::credentials::{Credential, resolve_registry_host};
use crate::error::{RegistryError, Result};
use std::ffi::OsString;

/// Resolves registry credentials from a loaded Docker config and helpers.
///
/// Order, first match wins:
/// 1. a per-host entry in `credHelpers`
/// 2. the global `credsStore`
/// 3. an inline `auths` entry (identity token, then username/password,
///    then the legacy base64 `auth` field)
/// 4. the platform default helper, if any
#[derive(Debug, Clone, Default)]
pub struct CredentialResolver {
    config: Option<DockerConfig>,
    default_helper: Option<String>,
    search_path: Option<OsString>,
}

impl CredentialResolver {
    /// Resolver over an already loaded config; `None` means no config file
    pub fn new(config: Option<DockerConfig>) -> Self {
        Self {
            config,
            default_helper: default_helper_name(),
            search_path: None,
        }
    }

    /// Resolver over the config at the default location
    pub fn load_default() -> Result<Self> {
        Ok(Self::new(DockerConfig::load_default()?))
    }

    /// Override the platform default helper (`None` disables the fallback)
    pub fn with_default_helper(mut self, helper: Option<String>) -> Self {
        self.default_helper = helper;
        self
    }

    /// Search `paths` for helper programs instead of `PATH`
    pub fn with_search_path(mut self, paths: Option<OsString>) -> Self {
        self.search_path = paths;
        self
    }

    pub fn config(&self) -> Option<&DockerConfig> {
        self.config.as_ref()
    }

    /// Credentials for `host`.
    ///
    /// Returns an empty credential (anonymous access) when no source has
    /// anything for the host.
    pub async fn resolve(&self, host: &str) -> Result<Credential> {
        let host = resolve_registry_host(host);

        let Some(config) = &self.config else {
            tracing::debug!(host, "no docker config, trying default credential helper");
            return self.from_default_helper(host).await;
        };

        if let Some(helper) = config.helper_for(host) {
            tracing::debug!(host, helper, "using configured credential helper");
            return self.helper(helper).get(host).await;
        }

        if let Some(entry) = config.auths.get(host) {
            tracing::debug!(host, "using inline docker config entry");
            return entry.credential(host);
        }

        self.from_default_helper(host).await
    }

    /// Like [`resolve`](Self::resolve) but fails with `NotFound` when the
    /// result would be anonymous
    pub async fn resolve_required(&self, host: &str) -> Result<Credential> {
        let credential = self.resolve(host).await?;
        if credential.is_empty() {
            return Err(RegistryError::NotFound(format!(
                "no credentials configured for {}",
                host
            )));
        }
        Ok(credential)
    }

    async fn from_default_helper(&self, host: &str) -> Result<Credential> {
        match &self.default_helper {
            Some(helper) => self.helper(helper).get(host).await,
            None => Ok(Credential::empty()),
        }
    }

    fn helper(&self, name: &str) -> CredentialHelper {
        CredentialHelper::new(name).with_search_path(self.search_path.clone())
    }
}
