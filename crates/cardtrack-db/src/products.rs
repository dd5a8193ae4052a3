//! Database operations for the `products` table.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `products` table.
///
/// `current_min_price` and `current_availability` are the canonical "current"
/// cache maintained by [`crate::snapshots::record_scrape`]; every other field
/// is catalog metadata captured on the product's first scrape.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id_url: String,
    pub product_name: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub image_url: Option<String>,
    pub product_type: String,
    pub set_name: Option<String>,
    pub card_number: Option<String>,
    pub language: String,
    pub condition: Option<String>,
    pub game: String,
    pub species: Option<String>,
    /// Canonical minimum price; `NUMERIC(10,2)` in the schema.
    pub current_min_price: Decimal,
    pub current_availability: i32,
    pub in_my_collection: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category filter used by list queries.
///
/// The marketplace distinguishes only singles from everything else: `Sealed`
/// matches every product whose `product_type` is not `"Singles"` (booster
/// boxes, elite trainer boxes, tins, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductTypeFilter {
    Singles,
    Sealed,
}

impl ProductTypeFilter {
    /// Parses the filter from its API/CLI spelling.
    #[must_use]
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "Singles" => Some(Self::Singles),
            "Sealed" => Some(Self::Sealed),
            _ => None,
        }
    }
}

const PRODUCT_COLUMNS: &str = "id_url, product_name, title, subtitle, image_url, product_type, \
     set_name, card_number, language, condition, game, species, \
     current_min_price, current_availability, in_my_collection, created_at, updated_at";

/// Fetches a product by its URL key, if tracked.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product(pool: &PgPool, id_url: &str) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id_url = $1"
    ))
    .bind(id_url)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Lists the URLs of all tracked products, optionally filtered by category.
///
/// Used by the bulk-scrape orchestrators to enumerate what to scrape.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_product_urls(
    pool: &PgPool,
    filter: Option<ProductTypeFilter>,
) -> Result<Vec<String>, DbError> {
    let urls = match filter {
        None => {
            sqlx::query_scalar::<_, String>("SELECT id_url FROM products ORDER BY id_url")
                .fetch_all(pool)
                .await?
        }
        Some(ProductTypeFilter::Singles) => {
            sqlx::query_scalar::<_, String>(
                "SELECT id_url FROM products WHERE product_type = 'Singles' ORDER BY id_url",
            )
            .fetch_all(pool)
            .await?
        }
        Some(ProductTypeFilter::Sealed) => {
            sqlx::query_scalar::<_, String>(
                "SELECT id_url FROM products WHERE product_type <> 'Singles' ORDER BY id_url",
            )
            .fetch_all(pool)
            .await?
        }
    };

    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_type_filter_parses_api_spellings() {
        assert_eq!(
            ProductTypeFilter::from_str_opt("Singles"),
            Some(ProductTypeFilter::Singles)
        );
        assert_eq!(
            ProductTypeFilter::from_str_opt("Sealed"),
            Some(ProductTypeFilter::Sealed)
        );
        assert_eq!(ProductTypeFilter::from_str_opt("singles"), None);
        assert_eq!(ProductTypeFilter::from_str_opt(""), None);
    }
}
