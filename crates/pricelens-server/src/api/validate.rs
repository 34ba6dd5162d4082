use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use pricelens_scraper::Validation;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub struct ValidationRequest {
    pub query: String,
}

pub(super) async fn validate(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<ValidationRequest>,
) -> Result<Json<ApiResponse<Validation>>, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "invalid_query",
            "query cannot be empty",
        ));
    }

    let verdict = if state.validation_enabled {
        let cancel = CancellationToken::new();
        state.validator.validate(&request.query, &cancel).await
    } else {
        Validation::permissive()
    };

    Ok(Json(ApiResponse {
        data: verdict,
        meta: ResponseMeta::new(req_id.0),
    }))
}
