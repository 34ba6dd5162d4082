use axum::{
    extract::State,
    http::HeaderMap,
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use pricelens_core::{
    LocationContext, MerchantStatusEntry, NormalizedListing, SearchFilters, SearchQuery,
};
use pricelens_scraper::OrchestratorError;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub merchants: Option<Vec<String>>,
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub min_price: Option<Decimal>,
    #[serde(default)]
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub include_out_of_stock: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SearchData {
    pub products: Vec<NormalizedListing>,
    pub total_results: usize,
    pub search_time: f64,
    pub cached: bool,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationContext>,
    pub merchants: MerchantsMeta,
}

#[derive(Debug, Serialize)]
pub struct MerchantsMeta {
    pub queried: usize,
    pub responded: usize,
    pub statuses: Vec<MerchantStatusEntry>,
}

pub(super) async fn search(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    Json(request): Json<SearchRequest>,
) -> Result<Json<ApiResponse<SearchData>>, ApiError> {
    let cancel = CancellationToken::new();

    // Advisory pre-validation: logged, never blocking.
    if state.validation_enabled && !request.query.trim().is_empty() {
        let verdict = state.validator.validate(&request.query, &cancel).await;
        if !verdict.is_valid {
            tracing::info!(query = %request.query, "query unlikely to return good results");
        }
    }

    let location = match client_ip(&headers) {
        Some(ip) => state.geo.resolve(&ip).await,
        None => None,
    };

    let query = SearchQuery {
        text: request.query,
        barcode: request.barcode,
        filters: SearchFilters {
            merchants: request.merchants.unwrap_or_default(),
            min_price: request.min_price,
            max_price: request.max_price,
            brand: request.brand,
            include_out_of_stock: request.include_out_of_stock.unwrap_or(true),
            max_results: request.max_results.unwrap_or(20).clamp(1, 100),
        },
    };

    let result = state
        .orchestrator
        .search(&query, location.as_ref(), &cancel)
        .await
        .map_err(|e| match e {
            OrchestratorError::InvalidQuery => {
                ApiError::new(req_id.0.clone(), "invalid_query", e.to_string())
            }
            OrchestratorError::AllMerchantsFailed => {
                ApiError::new(req_id.0.clone(), "all_merchants_failed", e.to_string())
            }
        })?;

    Ok(Json(ApiResponse {
        data: SearchData {
            products: result.products,
            total_results: result.total_results,
            search_time: result.search_time,
            cached: result.cached,
            degraded: result.degraded,
            location,
            merchants: MerchantsMeta {
                queried: result.merchants_queried,
                responded: result.merchants_responded,
                statuses: result.statuses,
            },
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}
