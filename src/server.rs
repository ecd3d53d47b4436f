//! HTTP API server.
//!
//! Exposes the [`Hub`] as a JSON API for dashboards and scripts.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/api/v2/data/platforms` | Enabled platforms in listing order |
//! | `GET`  | `/api/v2/data/keywords` | Distinct crawl keywords with their platforms |
//! | `GET`  | `/api/v2/data/list` | Canonical paginated listing for one platform |
//! | `GET`  | `/api/v2/data/detail/{platform}/{id}` | One raw content record |
//! | `GET`  | `/api/v2/data/stats` | Per-platform counts |
//! | `POST` | `/api/v2/crawler/start` | Start a crawl task |
//! | `GET`  | `/api/v2/crawler/status/{task_id}` | Status of one task |
//! | `GET`  | `/api/v2/crawler/tasks` | All tasks, most recent first |
//!
//! # Response Contract
//!
//! Successful responses wrap their payload as `{ "data": ... }`. Errors use:
//!
//! ```json
//! { "error": { "code": "invalid_platform", "message": "unsupported platform: 'myspace'" } }
//! ```
//!
//! Error codes: `invalid_platform` (400), `invalid_input` (400),
//! `not_found` (404), `conflict` (429), `persistence` (500), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser dashboards
//! can call the API directly.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::engine::CrawlerConfig;
use crate::error::Error;
use crate::hub::{Hub, QueryParams};

/// Starts the HTTP server on `[server].bind` and serves until the process
/// is terminated.
pub async fn run_server(hub: Arc<Hub>) -> anyhow::Result<()> {
    let bind_addr = hub.config().server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("API server listening on http://{}", bind_addr);
    serve(listener, hub).await
}

/// Serve on an already-bound listener.
pub async fn serve(listener: tokio::net::TcpListener, hub: Arc<Hub>) -> anyhow::Result<()> {
    axum::serve(listener, router(hub)).await?;
    Ok(())
}

pub fn router(hub: Arc<Hub>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/v2/data/platforms", get(handle_platforms))
        .route("/api/v2/data/keywords", get(handle_keywords))
        .route("/api/v2/data/list", get(handle_list))
        .route("/api/v2/data/detail/{platform}/{id}", get(handle_detail))
        .route("/api/v2/data/stats", get(handle_stats))
        .route("/api/v2/crawler/start", post(handle_start))
        .route("/api/v2/crawler/status/{task_id}", get(handle_status))
        .route("/api/v2/crawler/tasks", get(handle_tasks))
        .layer(cors)
        .with_state(hub)
}

// ============ Response envelopes ============

#[derive(Serialize)]
struct DataBody<T> {
    data: T,
}

fn ok<T: Serialize>(data: T) -> Json<DataBody<T>> {
    Json(DataBody { data })
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::InvalidPlatform(_) | Error::InvalidInput(_) | Error::Decode(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::Persistence(_) | Error::Schema(_) | Error::Io(_) => {
                error!(error = %err, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Malformed query strings and bodies share the `invalid_input` envelope.
fn invalid_input(message: String) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "invalid_input".to_string(),
        message,
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        invalid_input(rejection.body_text())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        invalid_input(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<DataBody<T>>, AppError>;

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Data ============

async fn handle_platforms(
    State(hub): State<Arc<Hub>>,
) -> ApiResult<Vec<crawl_harness_core::PlatformInfo>> {
    Ok(ok(hub.list_platforms()))
}

async fn handle_keywords(
    State(hub): State<Arc<Hub>>,
) -> ApiResult<Vec<crate::keywords::KeywordEntry>> {
    Ok(ok(hub.list_distinct_keywords().await?))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    platform: Option<String>,
    keyword: Option<String>,
    source_keyword: Option<String>,
    sort_by: Option<String>,
    page: Option<i64>,
    page_size: Option<i64>,
}

async fn handle_list(
    State(hub): State<Arc<Hub>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<crate::store::Page<crawl_harness_core::CanonicalRecord>> {
    let Query(params) = params?;
    let platform = params
        .platform
        .ok_or_else(|| Error::InvalidInput("platform is required".to_string()))?;
    let page = hub
        .query(QueryParams {
            platform,
            keyword: params.keyword,
            source_keyword: params.source_keyword,
            sort_by: params.sort_by,
            page: params.page,
            page_size: params.page_size,
        })
        .await?;
    Ok(ok(page))
}

async fn handle_detail(
    State(hub): State<Arc<Hub>>,
    Path((platform, id)): Path<(String, String)>,
) -> ApiResult<serde_json::Map<String, serde_json::Value>> {
    Ok(ok(hub.get_content(&platform, &id).await?))
}

async fn handle_stats(State(hub): State<Arc<Hub>>) -> ApiResult<crate::hub::Stats> {
    Ok(ok(hub.stats().await?))
}

// ============ Crawler ============

async fn handle_start(
    State(hub): State<Arc<Hub>>,
    request: Result<Json<CrawlerConfig>, JsonRejection>,
) -> ApiResult<crate::hub::StartedTask> {
    let Json(request) = request?;
    Ok(ok(hub.start_task(request)?))
}

async fn handle_status(
    State(hub): State<Arc<Hub>>,
    Path(task_id): Path<String>,
) -> ApiResult<crate::tasks::TaskRecord> {
    Ok(ok(hub.get_task(&task_id)?))
}

async fn handle_tasks(State(hub): State<Arc<Hub>>) -> ApiResult<Vec<crate::tasks::TaskRecord>> {
    Ok(ok(hub.list_tasks()))
}
