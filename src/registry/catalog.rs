//! Paginated traversal of the registry repository catalog

use crate::config::CatalogQuery;
use crate::error::Result;
use crate::logging::Logger;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Names requested per catalog page
pub const PAGE_STEP: usize = 50;

/// One page of `/v2/_catalog`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryPage {
    pub names: Vec<String>,
    /// The registry signalled there is nothing after this page
    pub end_of_catalog: bool,
}

impl RepositoryPage {
    /// Continuation cursor for the next request: the last name on this page
    pub fn cursor(&self) -> Option<&str> {
        self.names.last().map(String::as_str)
    }
}

/// Anything that can serve catalog pages
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch up to `n` names following `last`
    async fn repositories(
        &self,
        n: usize,
        last: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<RepositoryPage>;
}

/// Walks a [`CatalogSource`] page by page
pub struct RegistryCatalog<'a, S: CatalogSource + ?Sized> {
    source: &'a S,
    output: &'a Logger,
}

impl<'a, S: CatalogSource + ?Sized> RegistryCatalog<'a, S> {
    pub fn new(source: &'a S, output: &'a Logger) -> Self {
        Self { source, output }
    }

    /// Repository names, at most `query.max_entries` of them, filtered by
    /// `query.like`.
    ///
    /// Hitting the cap is not an error: the names gathered so far are kept
    /// and a warning is emitted. Any page failure aborts the listing.
    pub async fn list(
        &self,
        query: &CatalogQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let max_entries = query.max_entries;
        let mut names: Vec<String> = Vec::new();
        let mut last: Option<String> = None;

        loop {
            if names.len() >= max_entries {
                tracing::warn!(max_entries, fetched = names.len(), "catalog entry limit reached");
                self.output.warning(&format!(
                    "Reached the limit of {} repository entries; the catalog may hold more",
                    max_entries
                ));
                break;
            }

            let n = PAGE_STEP.min(max_entries - names.len());
            let page = self.source.repositories(n, last.as_deref(), cancel).await?;
            tracing::debug!(
                requested = n,
                received = page.names.len(),
                end = page.end_of_catalog,
                cursor = ?last,
                "catalog page"
            );

            if let Some(cursor) = page.cursor() {
                last = Some(cursor.to_string());
            }
            let end_of_catalog = page.end_of_catalog;
            let empty = page.names.is_empty();
            names.extend(page.names);

            if end_of_catalog {
                break;
            }
            if empty {
                // Without a new cursor the next request would repeat this one.
                tracing::debug!("empty catalog page without end marker, stopping");
                break;
            }
        }

        names.truncate(max_entries);

        if !query.like.is_empty() {
            names.retain(|name| name.contains(&query.like));
        }

        Ok(names)
    }
}
