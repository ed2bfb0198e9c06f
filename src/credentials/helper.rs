//! `docker-credential-*` helper invocation
//!
//! A helper is an external program named `docker-credential-<name>`. The
//! `get` action reads a server URL on stdin and prints
//! `{"Username": ..., "Secret": ...}` on stdout.

use crate::credentials::Credential;
use crate::error::{RegistryError, Result};
use serde::Deserialize;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub const HELPER_PREFIX: &str = "docker-credential-";

/// Printed by helpers that have no entry for the server
pub const ERR_CREDENTIALS_NOT_FOUND: &str = "credentials not found in native keychain";

/// Printed by helpers when no server URL was given
pub const ERR_MISSING_SERVER_URL: &str = "no credentials server URL";

/// Username helpers report when `Secret` holds an identity token
const TOKEN_USERNAME: &str = "<token>";

#[derive(Debug, Deserialize)]
struct HelperOutput {
    #[serde(rename = "Username", default)]
    username: String,
    #[serde(rename = "Secret", default)]
    secret: String,
}

/// A credential helper program, located on `PATH` (or an explicit search path)
#[derive(Debug, Clone)]
pub struct CredentialHelper {
    name: String,
    search_path: Option<OsString>,
}

impl CredentialHelper {
    /// `name` is the suffix after `docker-credential-`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            search_path: None,
        }
    }

    /// Look the program up in `paths` instead of `PATH`
    pub fn with_search_path(mut self, paths: Option<OsString>) -> Self {
        self.search_path = paths;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> String {
        format!("{}{}", HELPER_PREFIX, self.name)
    }

    fn locate(&self) -> Option<PathBuf> {
        let program = self.program();
        let found = match &self.search_path {
            Some(paths) => {
                let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
                which::which_in(&program, Some(paths), cwd)
            }
            None => which::which(&program),
        };
        found.ok()
    }

    /// Run `<helper> get` for `host`.
    ///
    /// A helper that is not installed, or that reports no entry for the
    /// host, yields an empty credential so anonymous access still works.
    pub async fn get(&self, host: &str) -> Result<Credential> {
        let Some(path) = self.locate() else {
            tracing::debug!(helper = %self.program(), "credential helper not installed");
            return Ok(Credential::empty());
        };

        tracing::debug!(helper = %path.display(), host, "invoking credential helper");

        let mut child = Command::new(&path)
            .arg("get")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.error(host, format!("failed to start {}: {}", path.display(), e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A helper may exit without reading its input.
            if let Err(e) = stdin.write_all(host.as_bytes()).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(self.error(host, format!("failed to write to helper: {}", e)));
                }
            }
            // Dropping stdin closes the pipe so the helper sees EOF.
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.error(host, format!("failed to wait for helper: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            let message = stdout.trim();
            if message == ERR_CREDENTIALS_NOT_FOUND {
                tracing::debug!(helper = %self.name, host, "helper has no credentials for host");
                return Ok(Credential::empty());
            }
            if message == ERR_MISSING_SERVER_URL {
                return Err(self.error(host, ERR_MISSING_SERVER_URL));
            }

            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = [message, stderr.trim()]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(": ");
            return Err(self.error(host, format!("{} ({})", detail, output.status)));
        }

        let parsed: HelperOutput = serde_json::from_str(stdout.trim())
            .map_err(|e| self.error(host, format!("invalid helper output: {}", e)))?;

        if parsed.username == TOKEN_USERNAME {
            return Ok(Credential::identity_token(parsed.secret));
        }

        Ok(Credential::new(parsed.username, parsed.secret))
    }

    fn error(&self, host: &str, message: impl Into<String>) -> RegistryError {
        RegistryError::CredentialHelper {
            helper: self.name.clone(),
            host: host.to_string(),
            message: message.into(),
        }
    }
}

/// Default helper for the current platform, if there is one.
///
/// On Linux `pass` is preferred when the `pass` program is installed.
pub fn default_helper_name() -> Option<String> {
    if cfg!(target_os = "linux") {
        if which::which("pass").is_ok() {
            Some("pass".to_string())
        } else {
            Some("secretservice".to_string())
        }
    } else if cfg!(target_os = "macos") {
        Some("osxkeychain".to_string())
    } else if cfg!(target_os = "windows") {
        Some("wincred".to_string())
    } else {
        None
    }
}
