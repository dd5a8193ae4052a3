//! Listing queries that read the "current" view from the latest history row.
//!
//! The canonical cache on `products` serves single-product lookups; these
//! list queries instead join each product to its latest `scrapes` row. The
//! two strategies agree except in the window where the both-must-differ gate
//! has declined a canonical update, in which case the history row is the
//! fresher reading.

use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::{DbError, ProductTypeFilter};

/// One product in a category listing, with its latest scraped values.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductSummaryRow {
    pub id_url: String,
    pub title: String,
    pub image_url: Option<String>,
    pub language: String,
    pub in_my_collection: bool,
    pub set_name: Option<String>,
    pub current_min_price: Decimal,
    pub current_availability: i32,
}

/// Lists products of a category with their latest min price and availability.
///
/// Singles come back ordered by min price descending (most valuable first),
/// sealed product ascending. Products with no scrape history yet are omitted —
/// they have no price to show.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_products_latest(
    pool: &PgPool,
    filter: ProductTypeFilter,
    game: Option<&str>,
) -> Result<Vec<ProductSummaryRow>, DbError> {
    let (type_predicate, order) = match filter {
        ProductTypeFilter::Singles => ("p.product_type = 'Singles'", "DESC"),
        ProductTypeFilter::Sealed => ("p.product_type <> 'Singles'", "ASC"),
    };

    let rows = sqlx::query_as::<_, ProductSummaryRow>(&format!(
        "SELECT p.id_url, p.title, p.image_url, p.language, p.in_my_collection, p.set_name, \
                s.min_price AS current_min_price, \
                s.detailed_availability AS current_availability \
         FROM products p \
         JOIN LATERAL ( \
             SELECT min_price, detailed_availability \
             FROM scrapes \
             WHERE product_id_url = p.id_url \
             ORDER BY scraped_at DESC, id DESC \
             LIMIT 1 \
         ) s ON TRUE \
         WHERE {type_predicate} AND ($1::text IS NULL OR p.game = $1) \
         ORDER BY s.min_price {order}"
    ))
    .bind(game)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
