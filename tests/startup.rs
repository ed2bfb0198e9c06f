//! Connection outcomes and command execution against a mock registry

mod common;

use common::{MockRegistry, MockResponse, RecordedRequest, catalog_page};
use registry_sweeper::cli::{Args, Runner};
use registry_sweeper::credentials::Credential;
use registry_sweeper::registry::{AuthScheme, RegistryInit};
use registry_sweeper::{Logger, RegistryError};
use tokio_util::sync::CancellationToken;

async fn connect(registry_url: String) -> Result<registry_sweeper::Registry, RegistryError> {
    RegistryInit::new(registry_url, Credential::empty())
        .with_timeout(5)
        .connect(Logger::new_quiet(), &CancellationToken::new())
        .await
}

type Handler = Box<dyn Fn(&RecordedRequest) -> MockResponse + Send + Sync>;

/// Answer every request, `GET /v2/` included, with `response`
fn answer_all(response: MockResponse) -> impl FnOnce(String) -> Handler {
    move |_| -> Handler { Box::new(move |_: &RecordedRequest| response.clone()) }
}

#[tokio::test]
async fn test_open_registry_needs_no_challenge() {
    let registry = MockRegistry::start(answer_all(MockResponse::new(200))).await;
    let manager = connect(registry.url()).await.unwrap();
    assert!(manager.transport().challenges().is_empty());
}

#[tokio::test]
async fn test_unexpected_status_on_connect() {
    let registry = MockRegistry::start(answer_all(MockResponse::new(500))).await;
    let err = connect(registry.url()).await.unwrap_err();
    assert!(matches!(err, RegistryError::Probe { .. }), "{err:?}");
}

#[tokio::test]
async fn test_unauthorized_without_challenge() {
    let registry = MockRegistry::start(answer_all(MockResponse::new(401))).await;
    let err = connect(registry.url()).await.unwrap_err();
    assert!(matches!(err, RegistryError::NoChallenge { .. }), "{err:?}");
}

#[tokio::test]
async fn test_unsupported_scheme() {
    let registry = MockRegistry::start(answer_all(
        MockResponse::new(401).header("WWW-Authenticate", "Negotiate"),
    ))
    .await;
    let err = connect(registry.url()).await.unwrap_err();
    match err {
        RegistryError::NoChallenge { message, .. } => assert!(message.contains("Negotiate")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_supported_challenges_are_kept() {
    let registry = MockRegistry::start(answer_all(
        MockResponse::new(401)
            .header("WWW-Authenticate", "Negotiate")
            .header(
                "WWW-Authenticate",
                "Bearer realm=\"https://auth.example.com/token\",service=\"registry\"",
            ),
    ))
    .await;

    let manager = connect(registry.url()).await.unwrap();
    let challenges = manager.transport().challenges();
    assert_eq!(challenges.len(), 1);
    assert_eq!(challenges[0].scheme, AuthScheme::Bearer);
    assert_eq!(challenges[0].service(), Some("registry"));
}

#[tokio::test]
async fn test_unreachable_registry() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = connect(url).await.unwrap_err();
    assert!(matches!(err, RegistryError::Probe { .. }), "{err:?}");
}

#[tokio::test]
async fn test_runner_executes_list_and_delete() {
    use clap::Parser;
    use registry_sweeper::Digest;

    let body = r#"{"schemaVersion":2,"mediaType":"application/vnd.docker.distribution.manifest.v2+json","layers":[]}"#;
    let digest = Digest::from_bytes(body.as_bytes()).to_string();
    let delete_path = format!("/v2/app-a/manifests/{}", digest);

    let registry = MockRegistry::start(move |_| {
        move |request: &RecordedRequest| match (request.method.as_str(), request.path()) {
            ("GET", "/v2/") => MockResponse::new(200),
            ("GET", "/v2/_catalog") => catalog_page(request, &["app-a", "app-b", "lib-x"]),
            ("GET", "/v2/app-a/tags/list") => {
                MockResponse::json(200, serde_json::json!({"name": "app-a", "tags": ["v1"]}))
            }
            ("GET", "/v2/app-b/tags/list") => {
                MockResponse::json(200, serde_json::json!({"name": "app-b", "tags": []}))
            }
            ("HEAD", "/v2/app-a/manifests/v1") => MockResponse::new(200)
                .header("Content-Type", "application/vnd.docker.distribution.manifest.v2+json")
                .header("Docker-Content-Digest", &digest)
                .body(body),
            ("DELETE", path) if path == delete_path => MockResponse::new(202),
            _ => MockResponse::new(404),
        }
    })
    .await;
    let url = registry.url();
    let manager = connect(url.clone()).await.unwrap();
    let cancel = CancellationToken::new();

    let list = Runner::new(Args::parse_from([
        "registry-sweeper", "-q", "-r", url.as_str(), "images", "ls", "--like", "app", "--tags",
    ]));
    list.execute(&manager, &cancel).await.unwrap();
    assert_eq!(registry.count("GET", "/v2/_catalog"), 1);
    assert_eq!(registry.count("GET", "/v2/app-a/tags/list"), 1);
    assert_eq!(registry.count("GET", "/v2/app-b/tags/list"), 1);
    assert_eq!(registry.count("GET", "/v2/lib-x/tags/list"), 0);

    let delete = Runner::new(Args::parse_from([
        "registry-sweeper", "-q", "-r", url.as_str(), "images", "delete", "app-a:v1",
    ]));
    delete.execute(&manager, &cancel).await.unwrap();
    assert_eq!(registry.count("DELETE", "/v2/app-a/manifests/sha256:"), 1);

    let announced = Runner::new(Args::parse_from([
        "registry-sweeper", "-r", url.as_str(), "images", "delete", "app-a:v1",
    ]));
    announced.execute(&manager, &cancel).await.unwrap();
    assert_eq!(registry.count("DELETE", "/v2/app-a/manifests/sha256:"), 2);

    let invalid = Runner::new(Args::parse_from([
        "registry-sweeper", "-q", "-r", url.as_str(), "images", "del", "app-b",
    ]));
    let err = invalid.execute(&manager, &cancel).await.unwrap_err();
    assert!(matches!(err, RegistryError::InvalidReference { .. }));
    assert_eq!(registry.count("HEAD", "/v2/app-b"), 0);
}
