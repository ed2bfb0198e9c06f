//! Manifest descriptor resolution
//!
//! Resolves `repository:tag` to the digest the registry stores the manifest
//! under, using a HEAD request with the Docker v2 manifest `Accept` header.

use crate::digest::Digest;
use crate::error::handlers::HttpErrorHandler;
use crate::error::{RegistryError, Result};
use crate::reference::{validate_repository_name, validate_tag};
use crate::registry::transport::{ChallengeTransport, Scope, cancellable};
use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

pub const MEDIA_TYPE_DOCKER_MANIFEST_V2: &str =
    "application/vnd.docker.distribution.manifest.v2+json";

pub const DOCKER_CONTENT_DIGEST: &str = "Docker-Content-Digest";

/// Size and digest of a manifest as stored by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(rename = "mediaType")]
    pub media_type: String,
    #[serde(with = "digest_string")]
    pub digest: Digest,
    pub size: i64,
}

mod digest_string {
    use crate::digest::Digest;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(digest: &Digest, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(digest)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Digest, D::Error> {
        let value = String::deserialize(deserializer)?;
        Digest::parse(&value).map_err(serde::de::Error::custom)
    }
}

/// Build a descriptor from HEAD response headers.
///
/// Requires `Content-Type`, a valid `Docker-Content-Digest` and a numeric
/// `Content-Length`.
pub fn descriptor_from_headers(headers: &HeaderMap) -> Result<Descriptor> {
    let media_type = header_str(headers, CONTENT_TYPE.as_str())
        .ok_or_else(|| malformed("missing or empty Content-Type header"))?;

    let digest = header_str(headers, DOCKER_CONTENT_DIGEST)
        .ok_or_else(|| malformed("missing or empty Docker-Content-Digest header"))?;
    let digest = Digest::parse(digest)?;

    let length = header_str(headers, CONTENT_LENGTH.as_str())
        .ok_or_else(|| malformed("missing or empty Content-Length header"))?;
    let size = length
        .parse::<i64>()
        .map_err(|e| malformed(&format!("invalid Content-Length '{}': {}", length, e)))?;

    Ok(Descriptor {
        media_type: media_type.to_string(),
        digest,
        size,
    })
}

/// Build a descriptor from a manifest body.
///
/// The digest is the sha256 of the bytes exactly as served. The media type
/// comes from `content_type` when given, otherwise from the manifest's own
/// `mediaType` field.
pub fn descriptor_from_body(content_type: Option<&str>, body: &[u8]) -> Result<Descriptor> {
    #[derive(Deserialize)]
    struct ManifestHeader {
        #[serde(rename = "schemaVersion")]
        schema_version: Option<u32>,
        #[serde(rename = "mediaType")]
        media_type: Option<String>,
    }

    let header: ManifestHeader = serde_json::from_slice(body)
        .map_err(|e| malformed(&format!("manifest body is not a JSON manifest: {}", e)))?;
    if header.schema_version.is_none() {
        return Err(malformed("manifest body has no schemaVersion"));
    }

    let media_type = content_type
        .filter(|ct| !ct.is_empty())
        .map(str::to_string)
        .or(header.media_type)
        .ok_or_else(|| malformed("manifest media type is unknown"))?;

    Ok(Descriptor {
        media_type,
        digest: Digest::from_bytes(body),
        size: body.len() as i64,
    })
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn malformed(message: &str) -> RegistryError {
    RegistryError::MalformedResponse(message.to_string())
}

/// Resolves tags to manifest descriptors over a [`ChallengeTransport`]
pub struct ManifestResolver<'a> {
    transport: &'a ChallengeTransport,
}

impl<'a> ManifestResolver<'a> {
    pub fn new(transport: &'a ChallengeTransport) -> Self {
        Self { transport }
    }

    /// Descriptor of `repository:tag`.
    ///
    /// The name and tag are checked before any request is sent. Any status
    /// outside 2xx/3xx means the manifest is `NotFound`. When the
    /// registry answers the HEAD without a digest header, the manifest body
    /// is fetched and hashed instead.
    pub async fn describe(
        &self,
        repository: &str,
        tag: &str,
        cancel: &CancellationToken,
    ) -> Result<Descriptor> {
        validate_repository_name(repository)?;
        validate_tag(tag)?;

        let url = self
            .transport
            .endpoint(repository.split('/').chain(["manifests", tag]))?;
        let scope = Scope::Pull(repository.to_string());

        let request = self
            .transport
            .request(Method::HEAD, url.clone())
            .header(ACCEPT, MEDIA_TYPE_DOCKER_MANIFEST_V2);
        let response = self
            .transport
            .send(request, &scope, "manifest lookup", cancel)
            .await?;

        let status = response.status();
        tracing::debug!(%url, %status, repository, tag, "manifest HEAD");

        if !(status.is_success() || status.is_redirection()) {
            return Err(RegistryError::NotFound(format!(
                "can't retrieve description for {}:{} (status {})",
                repository, tag, status
            )));
        }

        if header_str(response.headers(), DOCKER_CONTENT_DIGEST).is_some() {
            return descriptor_from_headers(response.headers());
        }

        tracing::debug!(repository, tag, "no digest header, hashing manifest body");
        self.describe_from_body(url, &scope, repository, tag, cancel)
            .await
    }

    async fn describe_from_body(
        &self,
        url: url::Url,
        scope: &Scope,
        repository: &str,
        tag: &str,
        cancel: &CancellationToken,
    ) -> Result<Descriptor> {
        let request = self
            .transport
            .request(Method::GET, url)
            .header(ACCEPT, MEDIA_TYPE_DOCKER_MANIFEST_V2);
        let response = self
            .transport
            .send(request, scope, "manifest fetch", cancel)
            .await?;

        if !response.status().is_success() {
            let err = cancellable(cancel, async {
                Ok(HttpErrorHandler::from_response(response, "manifest fetch").await)
            })
            .await?;
            return Err(match err {
                RegistryError::NotFound(_) => RegistryError::NotFound(format!(
                    "manifest {}:{} disappeared while being described",
                    repository, tag
                )),
                other => other,
            });
        }

        let content_type = header_str(response.headers(), CONTENT_TYPE.as_str()).map(str::to_string);
        let body = cancellable(cancel, async {
            response
                .bytes()
                .await
                .map_err(|e| RegistryError::transport("manifest fetch", e.to_string()))
        })
        .await?;

        descriptor_from_body(content_type.as_deref(), &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    const MANIFEST: &str = r#"{
   "schemaVersion": 2,
   "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
   "config": {"mediaType": "application/vnd.docker.container.image.v1+json", "size": 7023, "digest": "sha256:b5b2b2c507a0944348e0303114d8d93aaaa081732b86451d9bce1f432a537bc7"},
   "layers": []
}"#;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_descriptor_from_headers() {
        let digest = Digest::from_bytes(MANIFEST.as_bytes()).to_string();
        let length = MANIFEST.len().to_string();
        let map = headers(&[
            ("content-type", MEDIA_TYPE_DOCKER_MANIFEST_V2),
            ("docker-content-digest", digest.as_str()),
            ("content-length", length.as_str()),
        ]);

        let desc = descriptor_from_headers(&map).unwrap();
        assert_eq!(desc.media_type, MEDIA_TYPE_DOCKER_MANIFEST_V2);
        assert_eq!(desc.digest.to_string(), digest);
        assert_eq!(desc.size, MANIFEST.len() as i64);
    }

    #[test]
    fn test_missing_headers_are_malformed() {
        let digest = Digest::from_bytes(b"x").to_string();

        let no_type = headers(&[("docker-content-digest", digest.as_str()), ("content-length", "1")]);
        assert!(matches!(
            descriptor_from_headers(&no_type),
            Err(RegistryError::MalformedResponse(_))
        ));

        let no_length = headers(&[
            ("content-type", MEDIA_TYPE_DOCKER_MANIFEST_V2),
            ("docker-content-digest", digest.as_str()),
        ]);
        assert!(matches!(
            descriptor_from_headers(&no_length),
            Err(RegistryError::MalformedResponse(_))
        ));

        let bad_length = headers(&[
            ("content-type", MEDIA_TYPE_DOCKER_MANIFEST_V2),
            ("docker-content-digest", digest.as_str()),
            ("content-length", "lots"),
        ]);
        assert!(matches!(
            descriptor_from_headers(&bad_length),
            Err(RegistryError::MalformedResponse(_))
        ));

        let bad_digest = headers(&[
            ("content-type", MEDIA_TYPE_DOCKER_MANIFEST_V2),
            ("docker-content-digest", "sha256:nothex"),
            ("content-length", "1"),
        ]);
        assert!(matches!(
            descriptor_from_headers(&bad_digest),
            Err(RegistryError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_body_digest_matches_header_digest() {
        let digest = Digest::from_bytes(MANIFEST.as_bytes()).to_string();
        let length = MANIFEST.len().to_string();
        let from_headers = descriptor_from_headers(&headers(&[
            ("content-type", MEDIA_TYPE_DOCKER_MANIFEST_V2),
            ("docker-content-digest", digest.as_str()),
            ("content-length", length.as_str()),
        ]))
        .unwrap();

        let from_body =
            descriptor_from_body(Some(MEDIA_TYPE_DOCKER_MANIFEST_V2), MANIFEST.as_bytes()).unwrap();

        assert_eq!(from_body, from_headers);
    }

    #[test]
    fn test_body_media_type_fallback() {
        let desc = descriptor_from_body(None, MANIFEST.as_bytes()).unwrap();
        assert_eq!(desc.media_type, MEDIA_TYPE_DOCKER_MANIFEST_V2);
    }

    #[test]
    fn test_body_must_be_manifest() {
        assert!(descriptor_from_body(None, b"<html>oops</html>").is_err());
        assert!(descriptor_from_body(Some("application/json"), br#"{"errors":[]}"#).is_err());
    }

    #[test]
    fn test_descriptor_json_shape() {
        let desc = descriptor_from_body(None, MANIFEST.as_bytes()).unwrap();
        let json = serde_json::to_value(&desc).unwrap();
        assert_eq!(json["mediaType"], MEDIA_TYPE_DOCKER_MANIFEST_V2);
        assert_eq!(json["digest"], desc.digest.to_string());
        let back: Descriptor = serde_json::from_value(json).unwrap();
        assert_eq!(back, desc);
    }
}
