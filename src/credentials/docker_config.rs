//! Docker config.json authentication parser
//!
//! This module parses the config file format used by the Docker CLI to store
//! registry credentials, typically located at `~/.docker/config.json`.

use crate::credentials::Credential;
use crate::error::{RegistryError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Environment variable naming the directory that holds `config.json`
pub const DOCKER_CONFIG_ENV: &str = "DOCKER_CONFIG";

/// On-disk format of the Docker CLI config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Inline credentials per registry host
    #[serde(default)]
    pub auths: HashMap<String, AuthEntry>,

    /// Credential store used for every registry (e.g. "osxkeychain", "secretservice")
    #[serde(rename = "credsStore", default, skip_serializing_if = "Option::is_none")]
    pub creds_store: Option<String>,

    /// Per-registry credential helpers
    #[serde(rename = "credHelpers", default)]
    pub cred_helpers: HashMap<String, String>,
}

/// Authentication entry in Docker config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Base64-encoded "username:password"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,

    /// Deprecated by the Docker CLI, kept so round-trips don't lose it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(rename = "serveraddress", default, skip_serializing_if = "Option::is_none")]
    pub server_address: Option<String>,

    /// Token exchanged for access tokens instead of a password
    #[serde(rename = "identitytoken", default, skip_serializing_if = "Option::is_none")]
    pub identity_token: Option<String>,

    /// Bearer token sent to the registry as-is
    #[serde(rename = "registrytoken", default, skip_serializing_if = "Option::is_none")]
    pub registry_token: Option<String>,
}

impl DockerConfig {
    /// Load the config from [`DockerConfig::config_path`].
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn load_default() -> Result<Option<Self>> {
        let path = Self::config_path()?;
        Self::load_from_path(&path)
    }

    /// Load the config from a specific path, `Ok(None)` if it is missing
    pub fn load_from_path(path: &Path) -> Result<Option<Self>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RegistryError::Config(format!(
                    "Failed to read Docker config {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let config: DockerConfig = serde_json::from_str(&contents).map_err(|e| {
            RegistryError::Config(format!(
                "Failed to parse Docker config {}: {}",
                path.display(),
                e
            ))
        })?;

        tracing::debug!(
            path = %path.display(),
            auths = config.auths.len(),
            helpers = config.cred_helpers.len(),
            "loaded docker config"
        );

        Ok(Some(config))
    }

    /// `$DOCKER_CONFIG/config.json` when the variable is set, otherwise
    /// `~/.docker/config.json`
    pub fn config_path() -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(DOCKER_CONFIG_ENV).filter(|d| !d.is_empty()) {
            return Ok(PathBuf::from(dir).join("config.json"));
        }

        let home = dirs::home_dir().ok_or_else(|| {
            RegistryError::Config("Cannot determine home directory".to_string())
        })?;

        Ok(home.join(".docker").join("config.json"))
    }

    /// Helper configured for `host`, per-host entries first, then `credsStore`
    pub fn helper_for(&self, host: &str) -> Option<&str> {
        self.cred_helpers
            .get(host)
            .map(String::as_str)
            .or_else(|| self.creds_store.as_deref().filter(|s| !s.is_empty()))
    }
}

impl AuthEntry {
    /// Credential stored inline in this entry.
    ///
    /// An identity token wins over a username/password pair, which in turn
    /// wins over the legacy `auth` field.
    pub fn credential(&self, host: &str) -> Result<Credential> {
        if let Some(token) = self.identity_token.as_deref().filter(|t| !t.is_empty()) {
            return Ok(Credential::identity_token(token));
        }

        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                return Ok(Credential::new(username, password));
            }
            _ => {}
        }

        match self.auth.as_deref() {
            Some(auth) if !auth.is_empty() => decode_base64_auth(host, auth),
            _ => Ok(Credential::empty()),
        }
    }
}

/// Decode the legacy `auth` field into a username and password.
///
/// The value is base64 of `username:password`; trailing NUL padding on the
/// password is dropped.
pub fn decode_base64_auth(host: &str, auth: &str) -> Result<Credential> {
    let invalid = |message: String| RegistryError::InvalidAuthEncoding {
        host: host.to_string(),
        message,
    };

    let decoded = STANDARD
        .decode(auth.trim())
        .map_err(|e| invalid(format!("error decoding auth from file: {}", e)))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|e| invalid(format!("decoded auth is not UTF-8: {}", e)))?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| invalid("invalid auth string: missing ':' separator".to_string()))?;

    Ok(Credential::new(username, password.trim_end_matches('\0')))
}
