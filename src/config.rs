//! Configuration values passed explicitly through the registry layer

use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Environment variable selecting the registry base URL
pub const REGISTRY_ENV: &str = "SWEEPER_REGISTRY";

/// Registry used when nothing else is configured
pub const DEFAULT_REGISTRY: &str = "http://127.0.0.1:5000";

/// Default cap on catalog entries
pub const DEFAULT_MAX_ENTRIES: usize = 500;

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub address: String,
    pub skip_tls: bool,
    pub timeout: u64,
}

impl RegistryConfig {
    pub fn new(address: impl Into<String>) -> Self {
        let address: String = address.into();
        Self {
            address: address.trim_end_matches('/').to_string(),
            skip_tls: false,
            timeout: 30,
        }
    }

    pub fn with_skip_tls(mut self, skip_tls: bool) -> Self {
        self.skip_tls = skip_tls;
        self
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn validate(&self) -> Result<()> {
        self.url()?;

        if self.timeout == 0 {
            return Err(RegistryError::Config(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Parsed base URL; only http and https with a host are accepted
    pub fn url(&self) -> Result<Url> {
        if self.address.is_empty() {
            return Err(RegistryError::Config(
                "Registry address cannot be empty".to_string(),
            ));
        }

        let url = Url::parse(&self.address)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RegistryError::Config(format!(
                "Invalid registry address: {}. Must start with http:// or https://",
                self.address
            )));
        }
        if url.host_str().is_none() {
            return Err(RegistryError::Config(format!(
                "Registry address has no host: {}",
                self.address
            )));
        }
        Ok(url)
    }

    /// `host[:port]`, the key used for credential lookup
    pub fn host(&self) -> Result<String> {
        let url = self.url()?;
        let host = url.host_str().unwrap_or_default();
        Ok(match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new(DEFAULT_REGISTRY)
    }
}

/// Catalog listing parameters, supplied per call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    /// Case-sensitive substring filter; empty keeps everything
    pub like: String,
    /// Upper bound on the number of names fetched
    pub max_entries: usize,
}

impl CatalogQuery {
    pub fn new(like: impl Into<String>, max_entries: usize) -> Self {
        Self {
            like: like.into(),
            max_entries,
        }
    }
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self::new("", DEFAULT_MAX_ENTRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let config = RegistryConfig::default();
        assert_eq!(config.address, "http://127.0.0.1:5000");
        assert_eq!(config.host().unwrap(), "127.0.0.1:5000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_host_without_port() {
        let config = RegistryConfig::new("https://registry.example.com/");
        assert_eq!(config.address, "https://registry.example.com");
        assert_eq!(config.host().unwrap(), "registry.example.com");
    }

    #[test]
    fn test_validate_rejects_bad_addresses() {
        assert!(RegistryConfig::new("").validate().is_err());
        assert!(RegistryConfig::new("ftp://registry").validate().is_err());
        assert!(RegistryConfig::new("registry:5000").validate().is_err());
        assert!(
            RegistryConfig::default()
                .with_timeout(0)
                .validate()
                .is_err()
        );
    }
}
