use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cardtrack_db::ProductTypeFilter;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct ListQuery {
    pub game: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct ProductSummaryItem {
    id_url: String,
    title: String,
    image_url: Option<String>,
    language: String,
    in_my_collection: bool,
    set_name: Option<String>,
    current_min_price: Decimal,
    current_availability: i32,
}

#[derive(Debug, Deserialize)]
pub(super) struct DetailQuery {
    pub id_url: String,
}

#[derive(Debug, Serialize)]
pub(super) struct SnapshotItem {
    scrape_date: DateTime<Utc>,
    avg_price: Decimal,
    min_price: Decimal,
    max_price: Decimal,
    detailed_availability: i32,
    total_availability: i32,
}

#[derive(Debug, Serialize)]
pub(super) struct ProductDetail {
    id_url: String,
    product_name: String,
    title: String,
    subtitle: Option<String>,
    image_url: Option<String>,
    product_type: String,
    set_name: Option<String>,
    card_number: Option<String>,
    language: String,
    condition: Option<String>,
    game: String,
    species: Option<String>,
    /// Latest scraped values; `None` for a product with no history yet.
    current_min_price: Option<Decimal>,
    current_availability: Option<i32>,
    in_my_collection: bool,
    historical_scrape_data: Vec<SnapshotItem>,
}

pub(super) async fn list_singles(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<ProductSummaryItem>>>, ApiError> {
    list_products(state, req_id, ProductTypeFilter::Singles, query.game).await
}

pub(super) async fn list_sealed(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<ProductSummaryItem>>>, ApiError> {
    list_products(state, req_id, ProductTypeFilter::Sealed, query.game).await
}

async fn list_products(
    state: AppState,
    req_id: RequestId,
    filter: ProductTypeFilter,
    game: Option<String>,
) -> Result<Json<ApiResponse<Vec<ProductSummaryItem>>>, ApiError> {
    let rows = cardtrack_db::list_products_latest(&state.pool, filter, game.as_deref())
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| ProductSummaryItem {
            id_url: row.id_url,
            title: row.title,
            image_url: row.image_url,
            language: row.language,
            in_my_collection: row.in_my_collection,
            set_name: row.set_name,
            current_min_price: row.current_min_price,
            current_availability: row.current_availability,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn product_detail(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<DetailQuery>,
) -> Result<Json<ApiResponse<ProductDetail>>, ApiError> {
    // The id doubles as a URL, so clients send it percent-encoded.
    let id_url = percent_decode_str(&query.id_url)
        .decode_utf8()
        .map_err(|_| ApiError::new(req_id.0.clone(), "bad_request", "id_url is not valid UTF-8"))?
        .into_owned();

    let product = cardtrack_db::get_product(&state.pool, &id_url)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "not_found", "product not found"))?;

    let history = cardtrack_db::list_snapshots(&state.pool, &id_url)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    // The newest history row defines the current view; the canonical cache on
    // the product row may be staler when the update gate declined a write.
    let latest = history.first();
    let current_min_price = latest.map(|s| s.min_price);
    let current_availability = latest.map(|s| s.detailed_availability);

    let data = ProductDetail {
        id_url: product.id_url,
        product_name: product.product_name,
        title: product.title,
        subtitle: product.subtitle,
        image_url: product.image_url,
        product_type: product.product_type,
        set_name: product.set_name,
        card_number: product.card_number,
        language: product.language,
        condition: product.condition,
        game: product.game,
        species: product.species,
        current_min_price,
        current_availability,
        in_my_collection: product.in_my_collection,
        historical_scrape_data: history
            .into_iter()
            .map(|s| SnapshotItem {
                scrape_date: s.scraped_at,
                avg_price: s.avg_price,
                min_price: s.min_price,
                max_price: s.max_price,
                detailed_availability: s.detailed_availability,
                total_availability: s.total_availability,
            })
            .collect(),
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
