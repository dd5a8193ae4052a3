use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cardtrack_db::{DbError, NewOwnedProduct};

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct OwnedProductCreate {
    pub product_id: String,
    pub owned_qty: i32,
    pub buy_price: Decimal,
    /// RFC 3339 timestamp of the purchase.
    pub buy_date: String,
    pub buy_availability: i32,
}

#[derive(Debug, Serialize)]
pub(super) struct OwnedProductData {
    pub message: String,
    pub owned_product: OwnedProductItem,
}

#[derive(Debug, Serialize)]
pub(super) struct OwnedProductItem {
    pub id: i64,
    pub product_id_url: String,
    pub owned_qty: i32,
    pub buy_price: Decimal,
    pub buy_date: DateTime<Utc>,
    pub buy_availability: i32,
}

/// Registers a purchase of a tracked product.
pub(super) async fn add_owned_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<OwnedProductCreate>,
) -> Result<Json<ApiResponse<OwnedProductData>>, ApiError> {
    let buy_date = DateTime::parse_from_rfc3339(&body.buy_date)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| {
            ApiError::new(
                req_id.0.clone(),
                "bad_request",
                "buy_date must be an RFC 3339 timestamp",
            )
        })?;

    let new = NewOwnedProduct {
        product_id_url: body.product_id,
        owned_qty: body.owned_qty,
        buy_price: body.buy_price,
        buy_date,
        buy_availability: body.buy_availability,
    };

    let row = cardtrack_db::insert_owned_product(&state.pool, &new)
        .await
        .map_err(|e| match e {
            DbError::NotFound => ApiError::new(
                req_id.0.clone(),
                "not_found",
                "product not found in the database",
            ),
            other => map_db_error(req_id.0.clone(), &other),
        })?;

    Ok(Json(ApiResponse {
        data: OwnedProductData {
            message: "Owned product successfully added".to_string(),
            owned_product: OwnedProductItem {
                id: row.id,
                product_id_url: row.product_id_url,
                owned_qty: row.owned_qty,
                buy_price: row.buy_price,
                buy_date: row.buy_date,
                buy_availability: row.buy_availability,
            },
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
