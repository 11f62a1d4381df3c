//! Redirect integration tests
//!
//! Drives the router end to end: redirect statuses, cache hit/miss
//! behavior, TTL expiry and click/visit accounting.

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Request, StatusCode};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use tern::analytics::VisitRecord;
use tern::api::{create_router, AppState, RateLimiter};
use tern::cache::MappingCache;
use tern::models::NewMapping;
use tern::service::{Shortener, ShortenerSettings};
use tern::storage::{SqliteStorage, Storage};

async fn create_test_app(
    ttl: Duration,
    redirect_status: StatusCode,
) -> (Router, Arc<dyn Storage>) {
    let storage: Arc<dyn Storage> =
        Arc::new(SqliteStorage::new("sqlite::memory:", 1).await.unwrap());
    storage.init().await.unwrap();

    let cache = Arc::new(MappingCache::new(1_000, ttl));
    let shortener = Shortener::new(
        Arc::clone(&storage),
        cache,
        ShortenerSettings {
            title_backfill: false,
            ..ShortenerSettings::default()
        },
    )
    .unwrap();

    let state = Arc::new(AppState {
        shortener,
        rate_limiter: RateLimiter::new(10_000, 60),
        redirect_status,
    });

    let app = create_router(state)
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4321))));

    (app, storage)
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn seed(short_code: &str, original_url: &str) -> NewMapping {
    NewMapping {
        short_code: short_code.to_string(),
        original_url: original_url.to_string(),
        owner_id: None,
        created_at: now(),
        expires_at: None,
        title: None,
        description: None,
        tags: None,
    }
}

async fn get(app: &Router, uri: &str) -> axum::response::Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.clone().oneshot(request).await.unwrap()
}

#[tokio::test]
async fn redirects_to_original_url() {
    let (app, storage) = create_test_app(Duration::from_secs(300), StatusCode::FOUND).await;

    storage
        .insert(&seed("go", "https://example.com/destination"))
        .await
        .unwrap();

    let response = get(&app, "/go").await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "https://example.com/destination"
    );
    assert_eq!(response.headers().get("x-cache").unwrap(), "miss");
}

#[tokio::test]
async fn second_redirect_is_served_from_cache() {
    let (app, storage) = create_test_app(Duration::from_secs(300), StatusCode::FOUND).await;

    storage
        .insert(&seed("warm", "https://example.com"))
        .await
        .unwrap();

    let response = get(&app, "/warm").await;
    assert_eq!(response.headers().get("x-cache").unwrap(), "miss");

    let response = get(&app, "/warm").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers().get("x-cache").unwrap(), "hit");
}

#[tokio::test]
async fn unknown_code_is_not_found() {
    let (app, _storage) = create_test_app(Duration::from_secs(300), StatusCode::FOUND).await;

    let response = get(&app, "/nonexistent").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn soft_deleted_code_is_not_found() {
    let (app, storage) = create_test_app(Duration::from_secs(300), StatusCode::FOUND).await;

    storage
        .insert(&seed("dead", "https://example.com"))
        .await
        .unwrap();
    storage.soft_delete("dead", None).await.unwrap();

    let response = get(&app, "/dead").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn expired_code_is_not_found() {
    let (app, storage) = create_test_app(Duration::from_secs(300), StatusCode::FOUND).await;

    let mut mapping = seed("stale", "https://example.com");
    mapping.expires_at = Some(now() - 10);
    storage.insert(&mapping).await.unwrap();

    let response = get(&app, "/stale").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sequential_redirects_count_every_visit() {
    let (app, storage) = create_test_app(Duration::from_secs(300), StatusCode::FOUND).await;

    storage
        .insert(&seed("counted", "https://example.com"))
        .await
        .unwrap();

    for _ in 0..5 {
        let response = get(&app, "/counted").await;
        assert_eq!(response.status(), StatusCode::FOUND);
    }

    // Cache-hit visits are persisted off the critical path; give the
    // detached tasks a moment to drain.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let mapping = storage.find_by_code("counted").await.unwrap().unwrap();
    assert_eq!(mapping.clicks, 5);

    let visits = storage.visits_for_code("counted").await.unwrap();
    assert_eq!(visits.len(), 5);
}

#[tokio::test]
async fn expired_cache_entries_are_never_served() {
    let (app, storage) = create_test_app(Duration::from_millis(500), StatusCode::FOUND).await;

    storage
        .insert(&seed("shortlived", "https://example.com"))
        .await
        .unwrap();

    let response = get(&app, "/shortlived").await;
    assert_eq!(response.headers().get("x-cache").unwrap(), "miss");
    let response = get(&app, "/shortlived").await;
    assert_eq!(response.headers().get("x-cache").unwrap(), "hit");

    tokio::time::sleep(Duration::from_millis(700)).await;

    // Past the TTL the next resolution reads through to the store again.
    let response = get(&app, "/shortlived").await;
    assert_eq!(response.headers().get("x-cache").unwrap(), "miss");
}

#[tokio::test]
async fn cache_staleness_is_bounded_by_the_ttl() {
    let (app, storage) = create_test_app(Duration::from_millis(500), StatusCode::FOUND).await;

    storage
        .insert(&seed("mutable", "https://example.com"))
        .await
        .unwrap();

    // Warm the cache, then delete behind its back (no API-side invalidation).
    get(&app, "/mutable").await;
    storage.soft_delete("mutable", None).await.unwrap();

    // Within the TTL the stale entry may still serve; that staleness is the
    // documented tradeoff. After expiry the store is authoritative.
    tokio::time::sleep(Duration::from_millis(700)).await;

    let response = get(&app, "/mutable").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn redirect_status_is_configurable() {
    let statuses = [
        StatusCode::MOVED_PERMANENTLY,
        StatusCode::FOUND,
        StatusCode::SEE_OTHER,
        StatusCode::TEMPORARY_REDIRECT,
        StatusCode::PERMANENT_REDIRECT,
    ];

    for status in statuses {
        let (app, storage) = create_test_app(Duration::from_secs(300), status).await;
        storage
            .insert(&seed("status", "https://example.com"))
            .await
            .unwrap();

        let response = get(&app, "/status").await;
        assert_eq!(response.status(), status);
        assert!(response.headers().contains_key("location"));
    }
}

#[tokio::test]
async fn visits_carry_forwarded_request_metadata() {
    let (app, storage) = create_test_app(Duration::from_secs(300), StatusCode::FOUND).await;

    storage
        .insert(&seed("traced", "https://example.com"))
        .await
        .unwrap();

    let request = Request::builder()
        .uri("/traced")
        .header("x-forwarded-for", "203.0.113.20, 10.0.0.1")
        .header("user-agent", "curl/8.5.0")
        .header("referer", "https://news.example/page")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let visits: Vec<VisitRecord> = storage.visits_for_code("traced").await.unwrap();
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0].ip, "203.0.113.20");
    assert_eq!(visits[0].user_agent, "curl/8.5.0");
    assert_eq!(visits[0].referrer.as_deref(), Some("https://news.example/page"));
}

#[tokio::test]
async fn created_mapping_resolves_to_its_url() {
    let (app, _storage) = create_test_app(Duration::from_secs(300), StatusCode::FOUND).await;

    let body = serde_json::json!({ "original_url": "https://example.com/full/circle?q=1" });
    let request = Request::builder()
        .method("POST")
        .uri("/api/shorturl")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let bytes = http_body_util::BodyExt::collect(response.into_body())
        .await
        .unwrap()
        .to_bytes();
    let created: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let code = created["short_code"].as_str().unwrap();

    let response = get(&app, &format!("/{code}")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "https://example.com/full/circle?q=1"
    );
}

#[tokio::test]
async fn health_check_responds() {
    let (app, _storage) = create_test_app(Duration::from_secs(300), StatusCode::FOUND).await;

    let response = get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
}
