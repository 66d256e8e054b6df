//! REST API endpoints.
//!
//! Axum-based HTTP API for player profiles, stored matches, statistics,
//! rank history and the upstream leaderboard.

use axum::{
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::fetch::UpstreamError;
use crate::models::IdentityError;
use crate::storage::StorageError;

pub mod routes {
    pub mod leaderboard;
    pub mod matches;
    pub mod players;
}
pub mod state;

use state::AppState;

/// Largest page any list endpoint returns.
pub const MAX_PAGE_SIZE: usize = 100;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    #[error("Upstream provider error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited(secs) = self {
            response
                .headers_mut()
                .insert("retry-after", HeaderValue::from(secs));
        }
        response
    }
}

impl From<UpstreamError> for ApiError {
    fn from(e: UpstreamError) -> Self {
        match e {
            UpstreamError::NotFound(what) => ApiError::NotFound(what),
            UpstreamError::RateLimited { retry_after_secs } => {
                ApiError::RateLimited(retry_after_secs)
            }
            UpstreamError::InvalidUrl(url) => {
                error!("Upstream URL is invalid: {}", url);
                ApiError::Internal("upstream is misconfigured".to_string())
            }
            other => {
                warn!("Upstream failure: {}", other);
                let message = match other {
                    UpstreamError::Upstream { status, .. } => {
                        format!("match-data provider returned HTTP {}", status)
                    }
                    UpstreamError::Timeout(_) => "match-data provider timed out".to_string(),
                    UpstreamError::Decode(_) => {
                        "match-data provider sent an unexpected response".to_string()
                    }
                    _ => "match-data provider is unreachable".to_string(),
                };
                ApiError::Upstream(message)
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        error!("Storage failure: {}", e);
        ApiError::Internal("storage failure".to_string())
    }
}

impl From<IdentityError> for ApiError {
    fn from(e: IdentityError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

/// Clamp an optional `limit` query parameter.
pub fn page_limit(limit: Option<usize>, default: usize) -> usize {
    limit.unwrap_or(default).clamp(1, MAX_PAGE_SIZE)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods([Method::GET]);
    match origin {
        "*" => layer.allow_origin(Any),
        origin => match HeaderValue::from_str(origin) {
            Ok(value) => layer.allow_origin(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                layer
            }
        },
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.cors_origin);

    Router::new()
        .route("/health", get(health))
        .route("/api/players/:id/matches", get(routes::players::list_matches))
        .route("/api/players/:id/stats", get(routes::players::get_stats))
        .route("/api/players/:id/rank", get(routes::players::get_rank))
        .route(
            "/api/players/:id/rank/history",
            get(routes::players::rank_history),
        )
        .route("/api/players/:id/:tag", get(routes::players::get_profile))
        .route("/api/matches/:match_id", get(routes::matches::get_match))
        .route("/api/search", get(routes::players::search))
        .route(
            "/api/leaderboard/:region",
            get(routes::leaderboard::get_leaderboard),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::util::ServiceExt;

    use super::state::AppState;
    use crate::cache::ResponseCache;
    use crate::fetch::source::MockMatchSource;
    use crate::fetch::{RetryPolicy, UpstreamClient};
    use crate::models::Region;
    use crate::profile::{ProfileAssembler, UpstreamRankSource};
    use crate::storage::{MemoryStore, Store};

    pub fn state_with(source: MockMatchSource) -> (AppState, Arc<MemoryStore>) {
        let client = Arc::new(UpstreamClient::new(
            Arc::new(source),
            ResponseCache::new(Duration::from_secs(300), 256),
            RetryPolicy::none(),
        ));
        let store = Arc::new(MemoryStore::new());
        let shared: Arc<dyn Store> = store.clone();
        let assembler = ProfileAssembler::new(client.clone())
            .with_store(shared.clone())
            .with_rank_source(Arc::new(UpstreamRankSource::new(client.clone())));

        let state = AppState {
            client,
            assembler: Arc::new(assembler),
            store: shared,
            default_region: Region::Eu,
            cors_origin: "*".to_string(),
        };
        (state, store)
    }

    pub async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::fetch::source::MockMatchSource;
    use std::time::Duration;

    #[test]
    fn test_page_limit() {
        assert_eq!(page_limit(None, 20), 20);
        assert_eq!(page_limit(Some(0), 20), 1);
        assert_eq!(page_limit(Some(500), 20), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_upstream_error_mapping() {
        let status = |e: UpstreamError| ApiError::from(e).into_response().status();

        assert_eq!(
            status(UpstreamError::NotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(UpstreamError::RateLimited { retry_after_secs: 7 }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status(UpstreamError::from_status(503, None, "x")),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(UpstreamError::Timeout(Duration::from_secs(5))),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn test_upstream_error_message_hides_provider_url() {
        let transport = reqwest::Client::new()
            .get("http://127.0.0.1:1/valorant/v1/account/secret-endpoint")
            .send()
            .await
            .unwrap_err();

        let response = ApiError::from(UpstreamError::Http(transport)).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let message = json["error"]["message"].as_str().unwrap();
        assert_eq!(message, "match-data provider is unreachable");
        assert!(!message.contains("127.0.0.1"));
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited(12).into_response();
        assert_eq!(response.headers()["retry-after"], "12");
    }

    #[test]
    fn test_storage_error_is_internal() {
        let e = StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "/data/identities.jsonl",
        ));
        match ApiError::from(e) {
            ApiError::Internal(message) => assert_eq!(message, "storage failure"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _) = state_with(MockMatchSource::new());
        let (status, json) = get_json(build_router(state), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let (state, _) = state_with(MockMatchSource::new());
        let (status, json) = get_json(build_router(state), "/api/players/nobody/stats").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert!(json["error"]["message"].as_str().unwrap().contains("nobody"));
    }
}
