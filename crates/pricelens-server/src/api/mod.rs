mod search;
mod validate;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use pricelens_core::MerchantSource;
use pricelens_scraper::{QueryValidator, SearchOrchestrator};

use crate::geo::GeoResolver;
use crate::middleware::{enforce_rate_limit, request_id, RateLimitState, RequestId};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SearchOrchestrator>,
    pub validator: Arc<QueryValidator>,
    pub geo: Arc<GeoResolver>,
    pub sources: Arc<Vec<MerchantSource>>,
    pub validation_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "invalid_query" => StatusCode::BAD_REQUEST,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "all_merchants_failed" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
struct HealthData {
    status: &'static str,
    version: &'static str,
    merchants: Vec<MerchantHealth>,
}

#[derive(Debug, Serialize)]
struct MerchantHealth {
    name: String,
    enabled: bool,
    version: String,
}

#[derive(Debug, Serialize)]
struct MerchantCatalogEntry {
    name: String,
    enabled: bool,
    version: String,
    domain: String,
    mode: String,
    supports_barcode: bool,
    detects_out_of_stock: bool,
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
}

fn limited_router(rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/search", post(search::search))
        .route("/api/v1/validate", post(validate::validate))
        .route("/api/v1/merchants", get(merchants))
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn_with_state(
            rate_limit,
            enforce_rate_limit,
        )))
}

pub fn build_app(state: AppState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(limited_router(rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let merchants = state
        .sources
        .iter()
        .map(|source| MerchantHealth {
            name: source.name.clone(),
            enabled: source.enabled,
            version: source.version.clone(),
        })
        .collect();

    Json(ApiResponse {
        data: HealthData {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            merchants,
        },
        meta: ResponseMeta::new(req_id.0),
    })
}

async fn merchants(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let catalog: Vec<MerchantCatalogEntry> = state
        .sources
        .iter()
        .map(|source| MerchantCatalogEntry {
            name: source.name.clone(),
            enabled: source.enabled,
            version: source.version.clone(),
            domain: source.domain.clone(),
            mode: source.mode.to_string(),
            supports_barcode: source.supports_barcode,
            detects_out_of_stock: source.detects_out_of_stock(),
        })
        .collect();

    Json(ApiResponse {
        data: catalog,
        meta: ResponseMeta::new(req_id.0),
    })
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}
