//! Content digests for registry manifests
//!
//! A digest is `algorithm:hex`, the form registries return in the
//! `Docker-Content-Digest` header and accept in manifest DELETE URLs.

use crate::error::{RegistryError, Result};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::str::FromStr;

pub const SHA256: &str = "sha256";
pub const SHA512: &str = "sha512";

/// A validated content-addressed digest
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: String,
    hex: String,
}

impl Digest {
    /// Parse and validate `algorithm:hex`
    pub fn parse(value: &str) -> Result<Self> {
        let (algorithm, hex) = value.split_once(':').ok_or_else(|| {
            RegistryError::MalformedResponse(format!("digest '{}' has no algorithm prefix", value))
        })?;

        let expected_len = match algorithm {
            SHA256 => 64,
            SHA512 => 128,
            other => {
                return Err(RegistryError::MalformedResponse(format!(
                    "unsupported digest algorithm '{}'",
                    other
                )));
            }
        };

        if !DigestUtils::is_valid_hex(hex, expected_len) {
            return Err(RegistryError::MalformedResponse(format!(
                "invalid {} digest '{}'",
                algorithm, value
            )));
        }

        Ok(Self {
            algorithm: algorithm.to_string(),
            hex: hex.to_string(),
        })
    }

    /// sha256 digest of raw content
    pub fn from_bytes(data: &[u8]) -> Self {
        Self {
            algorithm: SHA256.to_string(),
            hex: DigestUtils::compute_sha256(data),
        }
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl FromStr for Digest {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Utilities for working with SHA256 digests
pub struct DigestUtils;

impl DigestUtils {
    /// Compute SHA256 digest from byte data
    pub fn compute_sha256(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    /// Lowercase hex of exactly `len` characters
    pub fn is_valid_hex(value: &str, len: usize) -> bool {
        value.len() == len
            && value
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    }

    /// Format digest for display (truncated for readability)
    pub fn format_digest_short(digest: &Digest) -> String {
        let full = digest.to_string();
        if full.len() > 19 {
            format!("{}...", &full[..19])
        } else {
            full
        }
    }
}
