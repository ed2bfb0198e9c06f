//! Challenge-driven HTTP transport for the registry API
//!
//! [`ChallengeTransport::build`] probes `GET /v2/` once, keeps the challenges
//! the registry answered with, and from then on authorizes every request:
//! Basic challenges get the username/password attached directly, Bearer
//! challenges get an access token obtained from the challenge realm.
//! Refresh tokens handed out by the token server are cached per service and
//! reused for later exchanges.

use crate::config::RegistryConfig;
use crate::credentials::Credential;
use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{RegistryError, Result};
use crate::registry::challenge::{AuthChallenge, AuthScheme, challenges_from_headers};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

/// `client_id` sent to token servers
pub const CLIENT_ID: &str = "registry-sweeper";

/// Lifetime assumed when the token server omits `expires_in`
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 60;

/// Cached access tokens are dropped this long before they actually expire
const TOKEN_EXPIRY_LEEWAY: Duration = Duration::from_secs(5);

/// Access a request needs, as a token-server scope
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Catalog,
    Pull(String),
    Delete(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Catalog => write!(f, "registry:catalog:*"),
            Scope::Pull(repository) => write!(f, "repository:{}:pull", repository),
            Scope::Delete(repository) => write!(f, "repository:{}:delete", repository),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    token: String,
    expires_at: Instant,
}

/// Run `fut` unless `cancel` fires first
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RegistryError::Cancelled),
        result = fut => result,
    }
}

/// Authenticated transport bound to one registry
pub struct ChallengeTransport {
    client: Client,
    base_url: Url,
    credential: Credential,
    challenges: Vec<AuthChallenge>,
    /// service -> last refresh token issued for it
    refresh_tokens: Mutex<HashMap<String, String>>,
    /// scope -> access token
    access_tokens: Mutex<HashMap<String, AccessToken>>,
}

impl fmt::Debug for ChallengeTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChallengeTransport")
            .field("base_url", &self.base_url.as_str())
            .field("credential", &self.credential)
            .field("challenges", &self.challenges)
            .finish_non_exhaustive()
    }
}

impl ChallengeTransport {
    /// Probe the registry and build a transport for it.
    ///
    /// Fails with `Probe` when `/v2/` cannot be reached or answers with an
    /// unexpected status, and with `NoChallenge` when it demands
    /// authentication without offering a supported scheme.
    pub async fn build(
        credential: Credential,
        config: &RegistryConfig,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        config.validate()?;

        let mut base_url = config.url()?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(config.skip_tls)
            .user_agent(concat!("registry-sweeper/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RegistryError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let challenges = probe(&client, &base_url, cancel).await?;

        Ok(Self {
            client,
            base_url,
            credential,
            challenges,
            refresh_tokens: Mutex::new(HashMap::new()),
            access_tokens: Mutex::new(HashMap::new()),
        })
    }

    pub fn challenges(&self) -> &[AuthChallenge] {
        &self.challenges
    }

    /// `/v2/` API URL made of `segments`, each escaped on its own
    pub fn endpoint<'s>(&self, segments: impl IntoIterator<Item = &'s str>) -> Result<Url> {
        api_url(&self.base_url, segments)
    }

    /// Resolve a `Link` target returned by the registry
    pub fn link(&self, target: &str) -> Result<Url> {
        Ok(self.base_url.join(target.trim_start_matches('/'))?)
    }

    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Last refresh token cached for `service`
    pub fn refresh_token(&self, service: &str) -> Option<String> {
        lock(&self.refresh_tokens).get(service).cloned()
    }

    /// Authorize and send `request`.
    ///
    /// The response is returned whatever its status; mapping statuses to
    /// errors is left to the caller.
    pub async fn send(
        &self,
        request: RequestBuilder,
        scope: &Scope,
        context: &str,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let request = self.authorize(request, scope, cancel).await?;
        cancellable(cancel, async {
            request
                .send()
                .await
                .map_err(|e| NetworkErrorHandler::handle_network_error(&e, context))
        })
        .await
    }

    fn active_challenge(&self) -> Option<&AuthChallenge> {
        self.challenges
            .iter()
            .find(|c| c.scheme == AuthScheme::Bearer)
            .or_else(|| self.challenges.iter().find(|c| c.scheme == AuthScheme::Basic))
    }

    async fn authorize(
        &self,
        request: RequestBuilder,
        scope: &Scope,
        cancel: &CancellationToken,
    ) -> Result<RequestBuilder> {
        let Some(challenge) = self.active_challenge() else {
            return Ok(request);
        };

        match challenge.scheme {
            AuthScheme::Bearer => {
                let token = self.access_token(challenge, scope, cancel).await?;
                Ok(request.bearer_auth(token))
            }
            AuthScheme::Basic if !self.credential.username.is_empty() => Ok(request
                .basic_auth(&self.credential.username, Some(&self.credential.password))),
            _ => Ok(request),
        }
    }

    async fn access_token(
        &self,
        challenge: &AuthChallenge,
        scope: &Scope,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let scope = scope.to_string();

        let cached = lock(&self.access_tokens)
            .get(&scope)
            .filter(|t| Instant::now() < t.expires_at)
            .map(|t| t.token.clone());
        if let Some(token) = cached {
            return Ok(token);
        }

        let (token, lifetime) = self.fetch_token(challenge, &scope, cancel).await?;
        let lifetime = lifetime.saturating_sub(TOKEN_EXPIRY_LEEWAY);
        lock(&self.access_tokens).insert(
            scope,
            AccessToken {
                token: token.clone(),
                expires_at: Instant::now() + lifetime,
            },
        );

        Ok(token)
    }

    /// Exchange credentials (or a refresh token) for an access token
    async fn fetch_token(
        &self,
        challenge: &AuthChallenge,
        scope: &str,
        cancel: &CancellationToken,
    ) -> Result<(String, Duration)> {
        let realm = challenge.realm().ok_or_else(|| RegistryError::NoChallenge {
            url: self.base_url.to_string(),
            message: "Bearer challenge has no realm".to_string(),
        })?;
        let realm = Url::parse(realm)
            .map_err(|e| RegistryError::Auth(format!("invalid token realm '{}': {}", realm, e)))?;
        let service = challenge.service().unwrap_or_default().to_string();

        let refresh_token = self.refresh_token(&service).or_else(|| {
            self.credential
                .is_identity_token()
                .then(|| self.credential.password.clone())
        });

        let request = match &refresh_token {
            Some(refresh_token) => {
                tracing::debug!(%realm, %service, scope, "exchanging refresh token");
                let mut form = vec![
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token.as_str()),
                    ("client_id", CLIENT_ID),
                    ("access_type", "offline"),
                ];
                if !service.is_empty() {
                    form.push(("service", service.as_str()));
                }
                if !scope.is_empty() {
                    form.push(("scope", scope));
                }
                self.client.post(realm.clone()).form(&form)
            }
            None => {
                tracing::debug!(%realm, %service, scope, "requesting access token");
                let mut query = vec![("client_id", CLIENT_ID)];
                if !service.is_empty() {
                    query.push(("service", service.as_str()));
                }
                if !scope.is_empty() {
                    query.push(("scope", scope));
                }
                let mut request = self.client.get(realm.clone());
                if !self.credential.username.is_empty() {
                    query.push(("offline_token", "true"));
                    request = request
                        .basic_auth(&self.credential.username, Some(&self.credential.password));
                }
                request.query(&query)
            }
        };

        let response = cancellable(cancel, async {
            request
                .send()
                .await
                .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "token request"))
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = cancellable(cancel, async {
                Ok(response.text().await.unwrap_or_default())
            })
            .await?;
            tracing::warn!(%realm, %status, "token request rejected");
            return Err(HttpErrorHandler::handle_auth_error(status, error_text.trim()));
        }

        let body: TokenResponse = cancellable(cancel, async {
            response.json().await.map_err(|e| {
                RegistryError::Auth(format!("Failed to parse token response: {}", e))
            })
        })
        .await?;

        let token = body
            .token
            .filter(|t| !t.is_empty())
            .or(body.access_token.filter(|t| !t.is_empty()))
            .ok_or_else(|| RegistryError::Auth("No token in token server response".to_string()))?;

        if let Some(refresh) = body.refresh_token.filter(|t| !t.is_empty()) {
            tracing::debug!(%service, "caching refresh token");
            lock(&self.refresh_tokens).insert(service, refresh);
        }

        let lifetime = body
            .expires_in
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);

        Ok((token, Duration::from_secs(lifetime)))
    }
}

fn api_url<'s>(base_url: &Url, segments: impl IntoIterator<Item = &'s str>) -> Result<Url> {
    let mut url = base_url.clone();
    url.path_segments_mut()
        .map_err(|_| RegistryError::Config(format!("{} cannot be a base URL", base_url)))?
        .pop_if_empty()
        .push("v2")
        .extend(segments);
    Ok(url)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Unauthenticated `GET /v2/`, returning the supported challenges
async fn probe(
    client: &Client,
    base_url: &Url,
    cancel: &CancellationToken,
) -> Result<Vec<AuthChallenge>> {
    let url = base_url.join("v2/")?;
    let probe_error = |message: String| RegistryError::Probe {
        url: url.to_string(),
        message,
    };

    tracing::debug!(%url, "probing registry");

    let response = cancellable(cancel, async {
        client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| probe_error(e.to_string()))
    })
    .await?;

    let status = response.status();
    let challenges = challenges_from_headers(response.headers());
    tracing::debug!(%url, %status, challenges = challenges.len(), "probe response");

    if status.is_success() {
        return Ok(Vec::new());
    }

    if status != StatusCode::UNAUTHORIZED {
        return Err(probe_error(format!("unexpected status {}", status)));
    }

    if challenges.is_empty() {
        return Err(RegistryError::NoChallenge {
            url: url.to_string(),
            message: "401 response without a WWW-Authenticate header".to_string(),
        });
    }

    let usable: Vec<AuthChallenge> = challenges
        .iter()
        .filter(|c| match c.scheme {
            AuthScheme::Basic => true,
            AuthScheme::Bearer => c.realm().is_some(),
            AuthScheme::Other(_) => false,
        })
        .cloned()
        .collect();

    if usable.is_empty() {
        let offered = challenges
            .iter()
            .map(|c| c.scheme.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(RegistryError::NoChallenge {
            url: url.to_string(),
            message: format!("unsupported authentication scheme(s): {}", offered),
        });
    }

    Ok(usable)
}
