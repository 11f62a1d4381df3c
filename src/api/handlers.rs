use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use super::rate_limit::RateLimiter;
use crate::analytics::{request_meta, CodeStats, VisitRecord};
use crate::error::ServiceError;
use crate::models::{CreateUrlRequest, UrlMapping};
use crate::service::Shortener;

pub struct AppState {
    pub shortener: Shortener,
    pub rate_limiter: RateLimiter,
    pub redirect_status: StatusCode,
}

/// Requester identity, populated by a trusted upstream auth proxy.
fn owner_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-owner-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Serialize)]
pub struct ListResponse {
    pub results: usize,
    pub data: Vec<UrlMapping>,
}

/// Create a new shortened URL (or return the owner's existing mapping for
/// the same destination).
pub async fn create_url(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<CreateUrlRequest>,
) -> Result<Response, ServiceError> {
    if !state.rate_limiter.check(addr.ip(), now()) {
        return Err(ServiceError::RateLimited);
    }

    let owner = owner_id(&headers);
    let outcome = state.shortener.create(payload, owner.as_deref()).await?;

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(outcome.mapping)).into_response())
}

/// List mappings for the requesting owner, newest first.
pub async fn list_urls(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ServiceError> {
    let owner = owner_id(&headers);
    let data = state
        .shortener
        .list(owner.as_deref(), query.limit, query.offset)
        .await?;

    Ok(Json(ListResponse {
        results: data.len(),
        data,
    }))
}

/// Redirect to the original URL, recording the visit.
pub async fn redirect_url(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Response, ServiceError> {
    let visit = VisitRecord {
        visited_at: now(),
        ip: request_meta::client_ip(&headers, addr),
        user_agent: request_meta::user_agent(&headers),
        referrer: request_meta::referrer(&headers),
    };

    let (mapping, cache_hit) = state.shortener.resolve(&code, visit).await?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::LOCATION,
        HeaderValue::from_str(&mapping.original_url)
            .map_err(|err| ServiceError::Internal(err.into()))?,
    );
    response_headers.insert(
        "x-cache",
        HeaderValue::from_static(if cache_hit { "hit" } else { "miss" }),
    );

    Ok((state.redirect_status, response_headers).into_response())
}

/// Aggregated analytics for a code.
pub async fn code_stats(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<CodeStats>, ServiceError> {
    let stats = state.shortener.stats(&code).await?;
    Ok(Json(stats))
}

/// Soft-delete a mapping.
pub async fn delete_url(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ServiceError> {
    let owner = owner_id(&headers);
    state.shortener.delete(&code, owner.as_deref()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "OK" }))
}
