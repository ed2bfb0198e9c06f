//! Registry module for Docker registry interactions
//!
//! This module provides authentication, catalog traversal, manifest
//! resolution and deletion against the Docker Registry HTTP API v2.

pub mod catalog;
pub mod challenge;
pub mod manager;
pub mod manifest;
pub mod repository;
pub mod transport;

pub use catalog::{CatalogSource, RegistryCatalog, RepositoryPage};
pub use challenge::{AuthChallenge, AuthScheme};
pub use manager::{Registry, RegistryInit, RegistryManager};
pub use manifest::{Descriptor, ManifestResolver};
pub use repository::{ManifestService, Repository, RepositoryService};
pub use transport::{ChallengeTransport, Scope};

use reqwest::header::{HeaderMap, LINK};

/// Target of the `rel="next"` entry of a `Link` header, if any.
///
/// Registries paginate `/v2/_catalog` and `/v2/<name>/tags/list` this way:
/// `Link: </v2/_catalog?last=b&n=2>; rel="next"`.
pub fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(|entry| {
            let (target, params) = entry.split_once(';')?;
            let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
            let is_next = params.split(';').any(|param| {
                param
                    .trim()
                    .strip_prefix("rel=")
                    .map(|rel| rel.trim_matches('"') == "next")
                    .unwrap_or(false)
            });
            is_next.then(|| target.to_string())
        })
}
