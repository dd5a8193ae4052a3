use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use cardtrack_db::ProductTypeFilter;
use cardtrack_scraper::ScraperError;

use crate::middleware::RequestId;
use crate::scrape::{scrape_many, scrape_one, CycleError, CycleOutcome};

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct ScrapeQuery {
    pub product_url: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ScrapeAllQuery {
    pub product_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct ScrapeData {
    pub message: String,
}

fn map_cycle_error(request_id: String, error: &CycleError) -> ApiError {
    match error {
        CycleError::Scrape(ScraperError::InvalidProductUrl { reason, .. }) => ApiError::new(
            request_id,
            "bad_request",
            format!("invalid product URL: {reason}"),
        ),
        CycleError::Scrape(e) => {
            tracing::error!(error = %e, "scrape cycle failed");
            ApiError::new(request_id, "scrape_error", e.to_string())
        }
        CycleError::Storage(e) => {
            tracing::error!(error = %e, "scrape cycle failed to persist");
            ApiError::new(request_id, "storage_error", "failed to persist scrape data")
        }
    }
}

/// Scrapes a single product page and records the cycle.
pub(super) async fn scrape_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ScrapeQuery>,
) -> Result<Json<ApiResponse<ScrapeData>>, ApiError> {
    let report = scrape_one(&state.pool, &state.client, &query.product_url)
        .await
        .map_err(|e| map_cycle_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: ScrapeData {
            message: format!("Saved {} successfully", report.title),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// Scrapes an explicit list of product URLs, one outcome row per URL.
pub(super) async fn scrape_bulk(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(product_urls): Json<Vec<String>>,
) -> Result<Json<ApiResponse<Vec<CycleOutcome>>>, ApiError> {
    if product_urls.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "bad_request",
            "no product URLs given",
        ));
    }

    let outcomes = scrape_many(
        &state.pool,
        &state.client,
        state.config.scraper_inter_request_delay_ms,
        &product_urls,
    )
    .await;

    Ok(Json(ApiResponse {
        data: outcomes,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// Scrapes every tracked product, optionally restricted to one category.
pub(super) async fn scrape_all(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ScrapeAllQuery>,
) -> Result<Json<ApiResponse<Vec<CycleOutcome>>>, ApiError> {
    let filter = match query.product_type.as_deref() {
        None => None,
        Some(raw) => Some(ProductTypeFilter::from_str_opt(raw).ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "bad_request",
                "product_type must be \"Singles\" or \"Sealed\"",
            )
        })?),
    };

    let urls = cardtrack_db::list_product_urls(&state.pool, filter)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    if urls.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "not_found",
            "no product URLs found",
        ));
    }

    let outcomes = scrape_many(
        &state.pool,
        &state.client,
        state.config.scraper_inter_request_delay_ms,
        &urls,
    )
    .await;

    Ok(Json(ApiResponse {
        data: outcomes,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::tests::{body_json, test_app};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use sqlx::PgPool;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LISTING_PAGE: &str = r#"
        <html><body>
        <h1>Sylveon V <span>TG14</span></h1>
        <dl><dt>Available items</dt><dd>117</dd></dl>
        <div class="price-container"><span>10,00 €</span></div>
        <div class="amount-container"><span>3</span></div>
        <div class="price-container"><span>12,00 €</span></div>
        <div class="amount-container"><span>5</span></div>
        </body></html>
    "#;

    #[sqlx::test(migrations = "../../migrations")]
    async fn scrape_rejects_invalid_product_url(pool: PgPool) {
        let app = test_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/scraping/scrape?product_url=not-a-url")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn scrape_all_returns_404_when_nothing_is_tracked(pool: PgPool) {
        let app = test_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/scraping/scrape-all")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn scrape_all_rejects_unknown_product_type(pool: PgPool) {
        let app = test_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/scraping/scrape-all?product_type=Loose")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn scrape_runs_a_full_cycle_against_a_listing_page(pool: PgPool) {
        let market = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/it/Pokemon/Products/Singles/BS/Sylveon"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LISTING_PAGE))
            .mount(&market)
            .await;

        let product_url = format!(
            "{}/it/Pokemon/Products/Singles/BS/Sylveon?language=5&minCondition=2",
            market.uri()
        );

        let app = test_app(pool.clone());
        let encoded: String = url_encode(&product_url);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/scraping/scrape?product_url={encoded}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(
            json["data"]["message"].as_str(),
            Some("Saved Sylveon V successfully")
        );

        let product = cardtrack_db::get_product(&pool, &product_url)
            .await
            .expect("query")
            .expect("product recorded");
        assert_eq!(product.title, "Sylveon V");
        // min = mean of the two lowest listings (10, 12) = 11.00
        assert_eq!(product.current_min_price.to_string(), "11.00");
        assert_eq!(product.current_availability, 8);

        let history = cardtrack_db::list_snapshots(&pool, &product_url)
            .await
            .expect("query");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].total_availability, 117);
    }

    fn url_encode(raw: &str) -> String {
        percent_encoding::utf8_percent_encode(raw, percent_encoding::NON_ALPHANUMERIC).to_string()
    }
}
