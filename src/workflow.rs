//! Image-level use cases built on a [`RegistryManager`]

use crate::config::CatalogQuery;
use crate::digest::DigestUtils;
use crate::error::Result;
use crate::logging::Logger;
use crate::reference::ManifestRef;
use crate::registry::RegistryManager;
use tokio_util::sync::CancellationToken;

/// Listing and deletion of images, one request at a time
pub struct ImageWorkflow<'a, M: RegistryManager + ?Sized> {
    manager: &'a M,
    output: &'a Logger,
}

impl<'a, M: RegistryManager + ?Sized> ImageWorkflow<'a, M> {
    pub fn new(manager: &'a M, output: &'a Logger) -> Self {
        Self { manager, output }
    }

    pub async fn list_repos_like(
        &self,
        query: &CatalogQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        self.manager.list_repos_like(query, cancel).await
    }

    /// Expand repositories into `repo:tag` strings, repository order first
    pub async fn images_with_tags(
        &self,
        repos: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let mut images = Vec::new();
        for name in repos {
            let repository = self.manager.get_repo(name)?;
            let tags = repository.tags(cancel).await?;
            images.extend(tags.iter().map(|tag| format!("{}:{}", name, tag)));
        }
        Ok(images)
    }

    /// Delete each `repo:tag` in order, stopping at the first failure.
    ///
    /// Returns the references that were deleted.
    pub async fn delete_by_ref(
        &self,
        refs: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<ManifestRef>> {
        let mut deleted = Vec::with_capacity(refs.len());

        for raw in refs {
            let reference = ManifestRef::parse(raw)?;
            let repository = self.manager.get_repo(&reference.repository)?;
            let manifests = repository.manifests(&reference.tag);

            let descriptor = self
                .manager
                .describe(&reference.repository, &reference.tag, cancel)
                .await?;
            tracing::debug!(
                repository = %reference.repository,
                tag = %reference.tag,
                digest = %descriptor.digest,
                "deleting manifest"
            );

            manifests.delete(&descriptor.digest, cancel).await?;
            self.output.verbose(&format!(
                "Deleted {} ({})",
                reference,
                DigestUtils::format_digest_short(&descriptor.digest)
            ));
            deleted.push(reference);
        }

        Ok(deleted)
    }
}
