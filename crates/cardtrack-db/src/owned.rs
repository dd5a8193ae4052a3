//! Personal-collection operations: owned products and their aggregates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::{DbError, ProductTypeFilter};

/// A row from the `owned_products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OwnedProductRow {
    pub id: i64,
    pub product_id_url: String,
    pub owned_qty: i32,
    pub buy_price: Decimal,
    pub buy_date: DateTime<Utc>,
    pub buy_availability: i32,
}

/// Input for registering an owned product.
#[derive(Debug, Clone)]
pub struct NewOwnedProduct {
    pub product_id_url: String,
    pub owned_qty: i32,
    pub buy_price: Decimal,
    pub buy_date: DateTime<Utc>,
    /// The product's availability at purchase time, kept for later analysis
    /// of how scarcity correlated with the price paid.
    pub buy_availability: i32,
}

/// Registers a purchase of a tracked product.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the product is not tracked, or
/// [`DbError::Sqlx`] if the insert fails.
pub async fn insert_owned_product(
    pool: &PgPool,
    new: &NewOwnedProduct,
) -> Result<OwnedProductRow, DbError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id_url = $1)")
            .bind(&new.product_id_url)
            .fetch_one(pool)
            .await?;
    if !exists {
        return Err(DbError::NotFound);
    }

    let row = sqlx::query_as::<_, OwnedProductRow>(
        "INSERT INTO owned_products \
             (product_id_url, owned_qty, buy_price, buy_date, buy_availability) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id, product_id_url, owned_qty, buy_price, buy_date, buy_availability",
    )
    .bind(&new.product_id_url)
    .bind(new.owned_qty)
    .bind(new.buy_price)
    .bind(new.buy_date)
    .bind(new.buy_availability)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

fn type_predicate(filter: Option<ProductTypeFilter>) -> &'static str {
    match filter {
        None => "TRUE",
        Some(ProductTypeFilter::Singles) => "p.product_type = 'Singles'",
        Some(ProductTypeFilter::Sealed) => "p.product_type <> 'Singles'",
    }
}

/// Current market value of the owned collection:
/// `Σ current_min_price × owned_qty` over owned products of the given type.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn collection_value(
    pool: &PgPool,
    filter: Option<ProductTypeFilter>,
) -> Result<Decimal, DbError> {
    let total: Decimal = sqlx::query_scalar(&format!(
        "SELECT COALESCE(SUM(p.current_min_price * o.owned_qty), 0) \
         FROM owned_products o \
         JOIN products p ON p.id_url = o.product_id_url \
         WHERE {}",
        type_predicate(filter)
    ))
    .fetch_one(pool)
    .await?;

    Ok(total)
}

/// Total purchase cost of the owned collection:
/// `Σ buy_price × owned_qty` over owned products of the given type.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn collection_cost(
    pool: &PgPool,
    filter: Option<ProductTypeFilter>,
) -> Result<Decimal, DbError> {
    let total: Decimal = sqlx::query_scalar(&format!(
        "SELECT COALESCE(SUM(o.buy_price * o.owned_qty), 0) \
         FROM owned_products o \
         JOIN products p ON p.id_url = o.product_id_url \
         WHERE {}",
        type_predicate(filter)
    ))
    .fetch_one(pool)
    .await?;

    Ok(total)
}
