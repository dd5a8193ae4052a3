use axum::{
    extract::{Query, State},
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cardtrack_db::ProductTypeFilter;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct StatisticsQuery {
    pub product_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct StatisticTotal {
    pub total: Decimal,
}

fn parse_filter(
    req_id: &RequestId,
    product_type: Option<&str>,
) -> Result<Option<ProductTypeFilter>, ApiError> {
    match product_type {
        None => Ok(None),
        Some(raw) => ProductTypeFilter::from_str_opt(raw).map(Some).ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "bad_request",
                "product_type must be \"Singles\" or \"Sealed\"",
            )
        }),
    }
}

/// Current market value of the owned collection, priced at each product's
/// canonical minimum.
pub(super) async fn collection_value(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<ApiResponse<StatisticTotal>>, ApiError> {
    let filter = parse_filter(&req_id, query.product_type.as_deref())?;
    let total = cardtrack_db::collection_value(&state.pool, filter)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: StatisticTotal { total },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// Total purchase cost of the owned collection.
pub(super) async fn collection_cost(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<ApiResponse<StatisticTotal>>, ApiError> {
    let filter = parse_filter(&req_id, query.product_type.as_deref())?;
    let total = cardtrack_db::collection_cost(&state.pool, filter)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: StatisticTotal { total },
        meta: ResponseMeta::new(req_id.0),
    }))
}
