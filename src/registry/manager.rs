//! Registry manager: the capability surface used by the image workflow
//!
//! [`RegistryManager`] is the seam tests substitute; [`Registry`] is the one
//! implementation, talking to a live registry through a
//! [`ChallengeTransport`].

use crate::config::{CatalogQuery, RegistryConfig};
use crate::credentials::Credential;
use crate::error::handlers::HttpErrorHandler;
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::registry::catalog::{CatalogSource, RegistryCatalog, RepositoryPage};
use crate::registry::manifest::{Descriptor, ManifestResolver};
use crate::registry::next_link;
use crate::registry::repository::{Repository, RepositoryService};
use crate::registry::transport::{ChallengeTransport, Scope, cancellable};
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait RegistryManager: Send + Sync {
    /// Catalog names matching `query`
    async fn list_repos_like(
        &self,
        query: &CatalogQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>>;

    /// Handle on one repository; no network traffic
    fn get_repo(&self, name: &str) -> Result<Box<dyn RepositoryService>>;

    /// Descriptor of the manifest tagged `tag` in `repository`
    async fn describe(
        &self,
        repository: &str,
        tag: &str,
        cancel: &CancellationToken,
    ) -> Result<Descriptor>;
}

/// Connection parameters for [`Registry`]
#[derive(Debug, Clone)]
pub struct RegistryInit {
    pub username: String,
    pub password: String,
    pub url: String,
    pub timeout: u64,
    pub skip_tls: bool,
}

impl RegistryInit {
    pub fn new(url: impl Into<String>, credential: Credential) -> Self {
        let defaults = RegistryConfig::default();
        Self {
            username: credential.username,
            password: credential.password,
            url: url.into(),
            timeout: defaults.timeout,
            skip_tls: defaults.skip_tls,
        }
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_skip_tls(mut self, skip_tls: bool) -> Self {
        self.skip_tls = skip_tls;
        self
    }

    pub fn config(&self) -> RegistryConfig {
        RegistryConfig::new(self.url.as_str())
            .with_timeout(self.timeout)
            .with_skip_tls(self.skip_tls)
    }

    /// Probe the registry and return a manager bound to it
    pub async fn connect(self, output: Logger, cancel: &CancellationToken) -> Result<Registry> {
        let config = self.config();
        let credential = Credential::new(self.username, self.password);

        output.verbose(&format!("Probing registry at {}", config.address));
        let transport = ChallengeTransport::build(credential, &config, cancel).await?;

        match transport.challenges().first() {
            Some(challenge) => output.verbose(&format!(
                "Registry requires {} authentication",
                challenge.scheme
            )),
            None => output.verbose("Registry allows anonymous access"),
        }

        Ok(Registry::new(Arc::new(transport), output))
    }
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    repositories: Option<Vec<String>>,
}

/// [`RegistryManager`] over the registry HTTP API
#[derive(Debug, Clone)]
pub struct Registry {
    transport: Arc<ChallengeTransport>,
    output: Logger,
}

impl Registry {
    pub fn new(transport: Arc<ChallengeTransport>, output: Logger) -> Self {
        Self { transport, output }
    }

    pub fn transport(&self) -> &ChallengeTransport {
        &self.transport
    }
}

#[async_trait]
impl CatalogSource for Registry {
    async fn repositories(
        &self,
        n: usize,
        last: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<RepositoryPage> {
        let mut url = self.transport.endpoint(["_catalog"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("n", &n.to_string());
            if let Some(last) = last {
                query.append_pair("last", last);
            }
        }

        let request = self.transport.request(Method::GET, url.clone());
        let response = self
            .transport
            .send(request, &Scope::Catalog, "catalog listing", cancel)
            .await?;

        let status = response.status();
        tracing::debug!(%url, %status, "catalog page");
        if !status.is_success() {
            let err = cancellable(cancel, async {
                Ok(HttpErrorHandler::from_response(response, "catalog listing").await)
            })
            .await?;
            return Err(err);
        }

        let end_of_catalog = next_link(response.headers()).is_none();
        let body: CatalogResponse = cancellable(cancel, async {
            response.json().await.map_err(|e| {
                RegistryError::MalformedResponse(format!("Failed to parse catalog response: {}", e))
            })
        })
        .await?;

        Ok(RepositoryPage {
            names: body.repositories.unwrap_or_default(),
            end_of_catalog,
        })
    }
}

#[async_trait]
impl RegistryManager for Registry {
    async fn list_repos_like(
        &self,
        query: &CatalogQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        RegistryCatalog::new(self, &self.output)
            .list(query, cancel)
            .await
    }

    fn get_repo(&self, name: &str) -> Result<Box<dyn RepositoryService>> {
        let repository = Repository::new(name, Arc::clone(&self.transport), self.output.clone())?;
        Ok(Box::new(repository))
    }

    async fn describe(
        &self,
        repository: &str,
        tag: &str,
        cancel: &CancellationToken,
    ) -> Result<Descriptor> {
        ManifestResolver::new(&self.transport)
            .describe(repository, tag, cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_carries_settings_into_config() {
        let init = RegistryInit::new("https://registry.example.com/", Credential::new("u", "p"))
            .with_timeout(5)
            .with_skip_tls(true);

        let config = init.config();
        assert_eq!(config.address, "https://registry.example.com");
        assert_eq!(config.timeout, 5);
        assert!(config.skip_tls);
        assert_eq!(init.username, "u");
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let err = RegistryInit::new("ftp://registry", Credential::empty())
            .connect(Logger::new_quiet(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Config(_)));
    }
}
