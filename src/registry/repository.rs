//! Repository-level operations: tag listing and manifest deletion
//!
//! Implements:
//! - Tag listing (GET /v2/{name}/tags/list, following `Link` pagination)
//! - Manifest deletion (DELETE /v2/{name}/manifests/{digest})

use crate::digest::Digest;
use crate::error::handlers::HttpErrorHandler;
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::reference::validate_repository_name;
use crate::registry::next_link;
use crate::registry::transport::{ChallengeTransport, Scope, cancellable};
use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One repository of a registry
#[async_trait]
pub trait RepositoryService: Send + Sync {
    fn name(&self) -> &str;

    /// Every tag of the repository, in registry order
    async fn tags(&self, cancel: &CancellationToken) -> Result<Vec<String>>;

    /// Manifest handle scoped to `tag`
    fn manifests(&self, tag: &str) -> Box<dyn ManifestService>;
}

/// Manifest operations for one tag of a repository
#[async_trait]
pub trait ManifestService: Send + Sync {
    fn tag(&self) -> &str;

    /// Delete the manifest stored under `digest`
    async fn delete(&self, digest: &Digest, cancel: &CancellationToken) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// [`RepositoryService`] backed by the registry HTTP API
#[derive(Debug, Clone)]
pub struct Repository {
    name: String,
    transport: Arc<ChallengeTransport>,
    output: Logger,
}

impl Repository {
    pub fn new(name: &str, transport: Arc<ChallengeTransport>, output: Logger) -> Result<Self> {
        validate_repository_name(name)?;
        Ok(Self {
            name: name.to_string(),
            transport,
            output,
        })
    }
}

#[async_trait]
impl RepositoryService for Repository {
    fn name(&self) -> &str {
        &self.name
    }

    async fn tags(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        self.output
            .verbose(&format!("Listing tags for repository: {}", self.name));

        let scope = Scope::Pull(self.name.clone());
        let mut url = self
            .transport
            .endpoint(self.name.split('/').chain(["tags", "list"]))?;
        let mut tags = Vec::new();

        loop {
            let request = self.transport.request(Method::GET, url.clone());
            let response = self
                .transport
                .send(request, &scope, "tag listing", cancel)
                .await?;

            let status = response.status();
            tracing::debug!(%url, %status, repository = %self.name, "tags page");
            if !status.is_success() {
                return Err(failure(response, "tag listing", cancel).await);
            }

            let next = next_link(response.headers());
            let page: TagList = cancellable(cancel, async {
                response.json().await.map_err(|e| {
                    RegistryError::MalformedResponse(format!(
                        "Failed to parse tags response for {}: {}",
                        self.name, e
                    ))
                })
            })
            .await?;
            tags.extend(page.tags.unwrap_or_default());

            let Some(next) = next else {
                break;
            };
            let next = self.transport.link(&next)?;
            if next == url {
                break;
            }
            url = next;
        }

        self.output.detail(&format!(
            "Found {} tags for repository {}",
            tags.len(),
            self.name
        ));

        Ok(tags)
    }

    fn manifests(&self, tag: &str) -> Box<dyn ManifestService> {
        Box::new(TaggedManifest {
            repository: self.name.clone(),
            tag: tag.to_string(),
            transport: Arc::clone(&self.transport),
        })
    }
}

/// [`ManifestService`] for `repository:tag`
#[derive(Debug)]
pub struct TaggedManifest {
    repository: String,
    tag: String,
    transport: Arc<ChallengeTransport>,
}

#[async_trait]
impl ManifestService for TaggedManifest {
    fn tag(&self) -> &str {
        &self.tag
    }

    async fn delete(&self, digest: &Digest, cancel: &CancellationToken) -> Result<()> {
        let reference = digest.to_string();
        let url = self.transport.endpoint(
            self.repository
                .split('/')
                .chain(["manifests", reference.as_str()]),
        )?;
        let scope = Scope::Delete(self.repository.clone());

        let request = self.transport.request(Method::DELETE, url.clone());
        let response = self
            .transport
            .send(request, &scope, "manifest deletion", cancel)
            .await?;

        let status = response.status();
        tracing::debug!(%url, %status, repository = %self.repository, tag = %self.tag, "manifest DELETE");

        match status {
            StatusCode::ACCEPTED | StatusCode::OK => Ok(()),
            _ => Err(failure(response, "manifest deletion", cancel).await),
        }
    }
}

/// Read a failed response into an error, unless cancellation wins
async fn failure(response: Response, operation: &str, cancel: &CancellationToken) -> RegistryError {
    cancellable(cancel, async {
        Ok(HttpErrorHandler::from_response(response, operation).await)
    })
    .await
    .unwrap_or_else(|cancelled| cancelled)
}
