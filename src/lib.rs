//! Registry Sweeper Library
//!
//! Library root for the registry-sweeper crate: credential resolution,
//! challenge-based authentication, catalog traversal, manifest resolution and
//! deletion against a Docker Registry HTTP API v2 server.

pub mod cli;
pub mod config;
pub mod credentials;
pub mod digest;
pub mod error;
pub mod logging;
pub mod reference;
pub mod registry;
pub mod workflow;

pub use config::{CatalogQuery, RegistryConfig};
pub use credentials::{Credential, CredentialResolver};
pub use digest::Digest;
pub use error::{RegistryError, Result};
pub use logging::Logger;
pub use reference::ManifestRef;
pub use registry::{Registry, RegistryInit, RegistryManager};
pub use workflow::ImageWorkflow;
