//! Scrape recording: canonical-state reconciliation plus append-only history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use cardtrack_core::{ProductMeta, ScrapeObservation};

use crate::DbError;

/// A row from the `scrapes` history table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SnapshotRow {
    pub id: i64,
    pub product_id_url: String,
    pub scraped_at: DateTime<Utc>,
    pub total_availability: i32,
    pub detailed_availability: i32,
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub avg_price: Decimal,
}

/// What [`record_scrape`] did to the canonical state for this cycle.
///
/// A history row is appended in every case, so the outcome only reports the
/// canonical side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    /// `true` when this cycle was the product's first scrape and created its row.
    pub product_created: bool,
    /// `true` when the canonical `current_min_price`/`current_availability`
    /// fields were replaced by this cycle's values.
    pub canonical_updated: bool,
}

/// Records one completed scrape cycle for one product.
///
/// Runs as a single transaction:
///
/// 1. Lock the product row. Concurrent cycles for the same product serialize
///    on this lock; cycles for different products never block each other.
/// 2. Unknown product: insert its full metadata with
///    `current_min_price = stats.minimum`, `current_availability` = the
///    detailed (table-sum) availability, and `in_my_collection = FALSE`.
/// 3. Known product: replace the two canonical fields only when **both** the
///    minimum price and the availability differ from the stored values. The
///    both-must-differ gate is preserved exactly as observed in production;
///    an either-differs gate would behave differently and must not be
///    substituted silently.
/// 4. Always append a history row. The stamp is `clock_timestamp()` — taken
///    while the row lock is held, so history order matches the order the
///    cycles actually applied, not the order their transactions began.
///
/// Any failure rolls the whole cycle back: canonical state and history can
/// never disagree about whether this cycle happened.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement or the commit fails.
pub async fn record_scrape(
    pool: &PgPool,
    meta: &ProductMeta,
    observation: &ScrapeObservation,
) -> Result<RecordOutcome, DbError> {
    let mut tx = pool.begin().await?;

    let locked: Option<String> =
        sqlx::query_scalar("SELECT id_url FROM products WHERE id_url = $1 FOR UPDATE")
            .bind(&meta.id_url)
            .fetch_optional(&mut *tx)
            .await?;

    let mut product_created = false;

    if locked.is_none() {
        // First scrape of this product. Two first-time cycles can race to
        // insert; the loser falls through to the locked update path below.
        let inserted = sqlx::query(
            "INSERT INTO products \
                 (id_url, product_name, title, subtitle, image_url, product_type, \
                  set_name, card_number, language, condition, game, species, \
                  current_min_price, current_availability, in_my_collection) \
             VALUES ($1, $2, $3, $4, $5, $6, \
                     $7, $8, $9, $10, $11, $12, \
                     $13::numeric(10,2), $14, FALSE) \
             ON CONFLICT (id_url) DO NOTHING",
        )
        .bind(&meta.id_url)
        .bind(&meta.product_name)
        .bind(&meta.title)
        .bind(&meta.subtitle)
        .bind(&meta.image_url)
        .bind(&meta.product_type)
        .bind(&meta.set_name)
        .bind(&meta.card_number)
        .bind(&meta.language)
        .bind(&meta.condition)
        .bind(&meta.game)
        .bind(&meta.species)
        .bind(observation.stats.minimum)
        .bind(observation.detailed_availability)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted > 0 {
            product_created = true;
        } else {
            // Lost the insert race; take the lock the winner released on commit.
            sqlx::query_scalar::<_, String>(
                "SELECT id_url FROM products WHERE id_url = $1 FOR UPDATE",
            )
            .bind(&meta.id_url)
            .fetch_one(&mut *tx)
            .await?;
        }
    }

    let canonical_updated = if product_created {
        false
    } else {
        let updated = sqlx::query(
            "UPDATE products SET \
                 current_min_price = $2::numeric(10,2), \
                 current_availability = $3, \
                 updated_at = NOW() \
             WHERE id_url = $1 \
               AND current_min_price <> $2::numeric(10,2) \
               AND current_availability <> $3",
        )
        .bind(&meta.id_url)
        .bind(observation.stats.minimum)
        .bind(observation.detailed_availability)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        updated > 0
    };

    sqlx::query(
        "INSERT INTO scrapes \
             (product_id_url, scraped_at, total_availability, detailed_availability, \
              min_price, max_price, avg_price) \
         VALUES ($1, clock_timestamp(), $2, $3, \
                 $4::numeric(10,2), $5::numeric(10,2), $6::numeric(10,2))",
    )
    .bind(&meta.id_url)
    .bind(observation.total_availability)
    .bind(observation.detailed_availability)
    .bind(observation.stats.minimum)
    .bind(observation.stats.maximum)
    .bind(observation.stats.average)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(RecordOutcome {
        product_created,
        canonical_updated,
    })
}

const SNAPSHOT_COLUMNS: &str = "id, product_id_url, scraped_at, total_availability, \
     detailed_availability, min_price, max_price, avg_price";

/// Lists a product's scrape history, newest first.
///
/// Ordered by `scraped_at DESC, id DESC` so that rows sharing a timestamp
/// still come back in insert order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_snapshots(pool: &PgPool, id_url: &str) -> Result<Vec<SnapshotRow>, DbError> {
    let rows = sqlx::query_as::<_, SnapshotRow>(&format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM scrapes \
         WHERE product_id_url = $1 \
         ORDER BY scraped_at DESC, id DESC"
    ))
    .bind(id_url)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the most recent history row for a product, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_latest_snapshot(
    pool: &PgPool,
    id_url: &str,
) -> Result<Option<SnapshotRow>, DbError> {
    let row = sqlx::query_as::<_, SnapshotRow>(&format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM scrapes \
         WHERE product_id_url = $1 \
         ORDER BY scraped_at DESC, id DESC \
         LIMIT 1"
    ))
    .bind(id_url)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardtrack_core::PriceStatistics;

    fn make_meta(id_url: &str) -> ProductMeta {
        ProductMeta {
            id_url: id_url.to_string(),
            product_name: "Brilliant-Stars/Sylveon-V-BRSTG14".to_string(),
            title: "Sylveon V (BRS TG14)".to_string(),
            subtitle: None,
            image_url: None,
            product_type: "Singles".to_string(),
            set_name: Some("Brilliant Stars".to_string()),
            card_number: Some("TG14".to_string()),
            language: "5".to_string(),
            condition: Some("2".to_string()),
            game: "Pokemon".to_string(),
            species: Some("Sylveon".to_string()),
        }
    }

    fn make_observation(minimum: f64, availability: i32) -> ScrapeObservation {
        ScrapeObservation {
            stats: PriceStatistics {
                average: minimum + 2.0,
                minimum,
                maximum: minimum + 5.0,
            },
            detailed_availability: availability,
            total_availability: availability + 10,
        }
    }

    fn decimal(units: i64) -> Decimal {
        Decimal::new(units * 100, 2)
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn first_scrape_creates_product_and_one_history_row(pool: PgPool) {
        let meta = make_meta("https://market.example/it/Pokemon/Products/Singles/BS/Sylveon");
        let outcome = record_scrape(&pool, &meta, &make_observation(10.0, 5))
            .await
            .expect("record should succeed");

        assert!(outcome.product_created);
        assert!(!outcome.canonical_updated);

        let product = crate::get_product(&pool, &meta.id_url)
            .await
            .expect("query should succeed")
            .expect("product should exist");
        assert_eq!(product.current_min_price, decimal(10));
        assert_eq!(product.current_availability, 5);
        assert!(!product.in_my_collection);

        let history = list_snapshots(&pool, &meta.id_url)
            .await
            .expect("query should succeed");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].min_price, decimal(10));
        assert_eq!(history[0].detailed_availability, 5);
        assert_eq!(history[0].total_availability, 15);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn availability_only_change_leaves_canonical_untouched(pool: PgPool) {
        let meta = make_meta("https://market.example/it/Pokemon/Products/Singles/BS/Sylveon");
        record_scrape(&pool, &meta, &make_observation(10.0, 5))
            .await
            .expect("seed should succeed");

        // Same min price, different availability: the both-must-differ gate
        // keeps the canonical fields as they were.
        let outcome = record_scrape(&pool, &meta, &make_observation(10.0, 7))
            .await
            .expect("record should succeed");
        assert!(!outcome.product_created);
        assert!(!outcome.canonical_updated);

        let product = crate::get_product(&pool, &meta.id_url)
            .await
            .expect("query should succeed")
            .expect("product should exist");
        assert_eq!(product.current_min_price, decimal(10));
        assert_eq!(product.current_availability, 5);

        // The cycle is still recorded faithfully in history.
        let history = list_snapshots(&pool, &meta.id_url)
            .await
            .expect("query should succeed");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].min_price, decimal(10));
        assert_eq!(history[0].detailed_availability, 7);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn price_only_change_leaves_canonical_untouched(pool: PgPool) {
        let meta = make_meta("https://market.example/it/Pokemon/Products/Singles/BS/Sylveon");
        record_scrape(&pool, &meta, &make_observation(10.0, 5))
            .await
            .expect("seed should succeed");

        let outcome = record_scrape(&pool, &meta, &make_observation(12.0, 5))
            .await
            .expect("record should succeed");
        assert!(!outcome.canonical_updated);

        let product = crate::get_product(&pool, &meta.id_url)
            .await
            .expect("query should succeed")
            .expect("product should exist");
        assert_eq!(product.current_min_price, decimal(10));
        assert_eq!(product.current_availability, 5);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn both_changed_updates_canonical(pool: PgPool) {
        let meta = make_meta("https://market.example/it/Pokemon/Products/Singles/BS/Sylveon");
        record_scrape(&pool, &meta, &make_observation(10.0, 5))
            .await
            .expect("seed should succeed");

        let outcome = record_scrape(&pool, &meta, &make_observation(12.0, 7))
            .await
            .expect("record should succeed");
        assert!(outcome.canonical_updated);

        let product = crate::get_product(&pool, &meta.id_url)
            .await
            .expect("query should succeed")
            .expect("product should exist");
        assert_eq!(product.current_min_price, decimal(12));
        assert_eq!(product.current_availability, 7);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn history_is_ordered_newest_first(pool: PgPool) {
        let meta = make_meta("https://market.example/it/Pokemon/Products/Singles/BS/Sylveon");
        for (min, avail) in [(10.0, 5), (12.0, 7), (9.0, 3)] {
            record_scrape(&pool, &meta, &make_observation(min, avail))
                .await
                .expect("record should succeed");
        }

        let history = list_snapshots(&pool, &meta.id_url)
            .await
            .expect("query should succeed");
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].min_price, decimal(9));
        assert_eq!(history[2].min_price, decimal(10));
        assert!(history[0].scraped_at >= history[1].scraped_at);
        assert!(history[1].scraped_at >= history[2].scraped_at);

        let latest = get_latest_snapshot(&pool, &meta.id_url)
            .await
            .expect("query should succeed")
            .expect("latest should exist");
        assert_eq!(latest.id, history[0].id);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn concurrent_cycles_for_same_product_serialize(pool: PgPool) {
        let meta = make_meta("https://market.example/it/Pokemon/Products/Singles/BS/Sylveon");

        let obs_first = make_observation(10.0, 5);
        let obs_second = make_observation(12.0, 7);
        let first = record_scrape(&pool, &meta, &obs_first);
        let second = record_scrape(&pool, &meta, &obs_second);
        let (a, b) = tokio::join!(first, second);
        a.expect("first cycle should succeed");
        b.expect("second cycle should succeed");

        let history = list_snapshots(&pool, &meta.id_url)
            .await
            .expect("query should succeed");
        assert_eq!(history.len(), 2, "each cycle appends exactly one row");

        // Whichever cycle applied last owns the canonical values: both carry
        // a changed (price, availability) pair, so no update can be lost.
        let product = crate::get_product(&pool, &meta.id_url)
            .await
            .expect("query should succeed")
            .expect("product should exist");
        assert_eq!(product.current_min_price, history[0].min_price);
        assert_eq!(product.current_availability, history[0].detailed_availability);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn zero_price_cycle_is_recorded_faithfully(pool: PgPool) {
        let meta = make_meta("https://market.example/it/Pokemon/Products/Singles/BS/Sylveon");
        let observation = ScrapeObservation {
            stats: PriceStatistics::zero(),
            detailed_availability: 0,
            total_availability: 0,
        };
        record_scrape(&pool, &meta, &observation)
            .await
            .expect("record should succeed");

        let latest = get_latest_snapshot(&pool, &meta.id_url)
            .await
            .expect("query should succeed")
            .expect("latest should exist");
        assert_eq!(latest.min_price, Decimal::ZERO);
        assert_eq!(latest.avg_price, Decimal::ZERO);
        assert_eq!(latest.max_price, Decimal::ZERO);
    }
}
