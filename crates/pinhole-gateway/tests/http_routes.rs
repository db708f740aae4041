use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use pinhole_gateway::identity::DEFAULT_COOKIE_NAME;
use pinhole_gateway::{App, AppState, DynUrlService, Identity};
use pinhole_generator::{Generator, SeqGenerator};
use pinhole_shortener::{TaskPool, UrlService};
use pinhole_storage::{InMemoryRecordStore, StorageService};
use serde_json::{json, Value};
use tower::util::ServiceExt;

const BASE: &str = "http://short.test";
const SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
    service: Arc<DynUrlService>,
    identity: Identity,
}

impl TestApp {
    fn start(base_url: Option<&str>) -> Self {
        let storage = StorageService::new(InMemoryRecordStore::new());
        let pool = TaskPool::start(storage.clone(), 2);
        let generator: Arc<dyn Generator> = Arc::new(SeqGenerator::with_prefix("ph"));
        let service = Arc::new(UrlService::new(storage, pool, generator));
        let identity = Identity::new(DEFAULT_COOKIE_NAME, SECRET).unwrap();

        let mut state = AppState::new(service.clone(), identity.clone());
        if let Some(base_url) = base_url {
            state = state.with_base_url(base_url);
        }

        Self {
            router: App::router(state),
            service,
            identity,
        }
    }

    fn cookie(&self, user: &str) -> String {
        format!("{DEFAULT_COOKIE_NAME}={}", self.identity.cookie_value(user))
    }

    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn post_text(&self, user: &str, url: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri("/")
                .header(header::COOKIE, self.cookie(user))
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from(url.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn json(&self, method: &str, uri: &str, user: &str, body: Value) -> Response<Body> {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::COOKIE, self.cookie(user))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn get(&self, uri: &str, user: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .uri(uri)
                .header(header::COOKIE, self.cookie(user))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn shorten_text_and_detect_duplicate() {
    let app = TestApp::start(Some(BASE));

    let created = app.post_text("u1", "https://example.com").await;
    assert_eq!(created.status(), StatusCode::CREATED);
    assert_eq!(body_text(created).await, "http://short.test/ph000000");

    let duplicate = app.post_text("u2", "https://example.com").await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    assert_eq!(body_text(duplicate).await, "http://short.test/ph000000");
}

#[tokio::test]
async fn invalid_url_is_rejected_with_json_error() {
    let app = TestApp::start(Some(BASE));

    let response = app.post_text("u1", "not a url").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());

    let response = app.post_text("u1", "").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_utf8_text_body_is_rejected_with_json_error() {
    let app = TestApp::start(Some(BASE));

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/")
                .header(header::COOKIE, app.cookie("u1"))
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from(vec![0xff, 0xfe, 0xfd]))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
    assert!(app.service.fetch_user_urls(BASE, "u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_cookie_issues_signed_identity() {
    let app = TestApp::start(Some(BASE));

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/")
                .body(Body::from("https://example.com"))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with(&format!("{DEFAULT_COOKIE_NAME}=")));
    assert!(set_cookie.contains("Max-Age=86400"));

    let value = set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value)
        .unwrap();
    assert!(app.identity.verify(value).is_some());
}

#[tokio::test]
async fn valid_cookie_is_kept_and_forged_cookie_replaced() {
    let app = TestApp::start(Some(BASE));

    let response = app.get("/health", "u1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());

    let forged = app
        .send(
            Request::builder()
                .uri("/health")
                .header(header::COOKIE, format!("{DEFAULT_COOKIE_NAME}=u1:deadbeef"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert!(forged.headers().get(header::SET_COOKIE).is_some());
}

#[tokio::test]
async fn shorten_json() {
    let app = TestApp::start(Some(BASE));

    let created = app
        .json("POST", "/api/shorten", "u1", json!({"url": "https://example.com"}))
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    assert_eq!(
        body_json(created).await,
        json!({"result": "http://short.test/ph000000"})
    );

    let duplicate = app
        .json("POST", "/api/shorten", "u1", json!({"url": "https://example.com"}))
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    assert_eq!(
        body_json(duplicate).await,
        json!({"result": "http://short.test/ph000000"})
    );

    let malformed = app
        .json("POST", "/api/shorten", "u1", json!({"link": "https://example.com"}))
        .await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn shorten_batch_preserves_order() {
    let app = TestApp::start(Some(BASE));
    let batch = json!([
        {"original_url": "https://a.example", "correlation_id": "1"},
        {"original_url": "https://b.example", "correlation_id": "2"},
        {"original_url": "https://a.example", "correlation_id": "3"},
    ]);

    let first = app
        .json("POST", "/api/shorten/batch", "u1", batch.clone())
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let first = body_json(first).await;
    assert_eq!(
        first,
        json!([
            {"short_url": "http://short.test/ph000000", "correlation_id": "1"},
            {"short_url": "http://short.test/ph000001", "correlation_id": "2"},
            {"short_url": "http://short.test/ph000000", "correlation_id": "3"},
        ])
    );

    let second = app.json("POST", "/api/shorten/batch", "u1", batch).await;
    assert_eq!(body_json(second).await, first);

    let empty = app
        .json("POST", "/api/shorten/batch", "u1", json!([]))
        .await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn redirect_resolves_short_links() {
    let app = TestApp::start(Some(BASE));
    app.post_text("u1", "https://example.com/page").await;

    let response = app.get("/ph000000", "u1").await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "https://example.com/page"
    );

    let missing = app.get("/unknown", "u1").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_user_urls() {
    let app = TestApp::start(Some(BASE));

    let empty = app.get("/api/user/urls", "u1").await;
    assert_eq!(empty.status(), StatusCode::NO_CONTENT);

    app.post_text("u1", "https://a.example").await;
    app.post_text("u2", "https://b.example").await;

    let listed = app.get("/api/user/urls", "u1").await;
    assert_eq!(listed.status(), StatusCode::OK);
    assert_eq!(
        body_json(listed).await,
        json!([{"original_url": "https://a.example", "short_url": "http://short.test/ph000000"}])
    );
}

#[tokio::test]
async fn delete_is_accepted_and_applied_in_background() {
    let app = TestApp::start(Some(BASE));
    app.post_text("u1", "https://a.example").await;
    app.post_text("u1", "https://b.example").await;
    app.post_text("u2", "https://c.example").await;

    let accepted = app
        .json(
            "DELETE",
            "/api/user/urls",
            "u1",
            json!(["ph000000", "ph000002"]),
        )
        .await;
    assert_eq!(accepted.status(), StatusCode::ACCEPTED);

    app.service.shutdown().await.unwrap();

    let gone = app.get("/ph000000", "u1").await;
    assert_eq!(gone.status(), StatusCode::GONE);

    let foreign = app.get("/ph000002", "u1").await;
    assert_eq!(foreign.status(), StatusCode::TEMPORARY_REDIRECT);

    let listed = body_json(app.get("/api/user/urls", "u1").await).await;
    assert_eq!(
        listed,
        json!([{"original_url": "https://b.example", "short_url": "http://short.test/ph000001"}])
    );

    let closed = app
        .json("DELETE", "/api/user/urls", "u1", json!(["ph000001"]))
        .await;
    assert_eq!(closed.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn base_url_falls_back_to_host_header() {
    let app = TestApp::start(None);

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/")
                .header(header::HOST, "example.org:8080")
                .header(header::COOKIE, app.cookie("u1"))
                .body(Body::from("https://example.com"))
                .unwrap(),
        )
        .await;

    assert_eq!(body_text(response).await, "http://example.org:8080/ph000000");
}

#[tokio::test]
async fn ping_and_health() {
    let app = TestApp::start(Some(BASE));

    assert_eq!(app.get("/ping", "u1").await.status(), StatusCode::OK);

    let health = app.get("/health", "u1").await;
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(body_json(health).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn responses_are_gzipped_on_request() {
    let app = TestApp::start(Some(BASE));
    app.post_text("u1", "https://a.example/some/long/path").await;

    let response = app
        .send(
            Request::builder()
                .uri("/api/user/urls")
                .header(header::COOKIE, app.cookie("u1"))
                .header(header::ACCEPT_ENCODING, "gzip")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_ENCODING).unwrap(),
        "gzip"
    );
}
