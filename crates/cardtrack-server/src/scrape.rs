//! The per-product scrape cycle and the sequential bulk runner shared by the
//! scraping API handlers and the nightly scheduler job.

use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use sqlx::PgPool;

use cardtrack_core::{ProductMeta, ScrapeObservation};
use cardtrack_db::RecordOutcome;
use cardtrack_scraper::{
    extract_listing, normalize_prices, parse_total_availability, sum_availability, ListingClient,
    ProductLocator,
};

/// Why a product's cycle failed: before the recording step (fetch/extract/URL)
/// or during it (storage). The distinction matters to callers only for error
/// mapping; both abort the product's cycle and nothing was persisted.
#[derive(Debug)]
pub(crate) enum CycleError {
    Scrape(cardtrack_scraper::ScraperError),
    Storage(cardtrack_db::DbError),
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleError::Scrape(e) => write!(f, "scrape failed: {e}"),
            CycleError::Storage(e) => write!(f, "storage failed: {e}"),
        }
    }
}

impl From<cardtrack_scraper::ScraperError> for CycleError {
    fn from(e: cardtrack_scraper::ScraperError) -> Self {
        CycleError::Scrape(e)
    }
}

impl From<cardtrack_db::DbError> for CycleError {
    fn from(e: cardtrack_db::DbError) -> Self {
        CycleError::Storage(e)
    }
}

/// What one successful cycle produced, for logging and response messages.
pub(crate) struct ScrapeReport {
    pub title: String,
    pub outcome: RecordOutcome,
}

/// Runs one full fetch → extract → normalize → record cycle for one product.
///
/// The normalization stage never fails — pages with no parsable listings
/// record an all-zero snapshot. Fetch, extraction, and storage failures abort
/// the cycle with nothing persisted.
pub(crate) async fn scrape_one(
    pool: &PgPool,
    client: &ListingClient,
    product_url: &str,
) -> Result<ScrapeReport, CycleError> {
    let locator = ProductLocator::parse(product_url)?;
    let html = client.fetch_listing(product_url).await?;
    let listing = extract_listing(product_url, &html)?;

    let stats = normalize_prices(&listing.price_texts);
    let detailed_availability = sum_availability(&listing.availability_texts);
    let total_availability = listing
        .total_availability_text
        .as_deref()
        .map_or(0, parse_total_availability);

    let meta = ProductMeta {
        id_url: product_url.to_owned(),
        product_name: locator.product_name,
        title: listing.title.clone(),
        subtitle: None,
        image_url: listing.image_url,
        product_type: locator.product_type,
        set_name: listing.set_name,
        card_number: listing.card_number,
        language: locator.language,
        condition: Some(locator.condition),
        game: locator.game,
        species: listing.species,
    };
    let observation = ScrapeObservation {
        stats,
        detailed_availability,
        total_availability,
    };

    let outcome = cardtrack_db::record_scrape(pool, &meta, &observation).await?;

    tracing::info!(
        product = %meta.id_url,
        min_price = stats.minimum,
        avg_price = stats.average,
        max_price = stats.maximum,
        availability = detailed_availability,
        created = outcome.product_created,
        canonical_updated = outcome.canonical_updated,
        "scrape cycle recorded"
    );

    Ok(ScrapeReport {
        title: listing.title,
        outcome,
    })
}

/// Per-product outcome row returned by the bulk endpoints.
#[derive(Debug, Serialize)]
pub(crate) struct CycleOutcome {
    pub product_url: String,
    pub status: &'static str,
    pub message: String,
}

/// Scrapes `urls` sequentially with a jittered delay between products.
///
/// A failed product is reported in its outcome row and the run continues with
/// the next one; the batch itself never fails.
pub(crate) async fn scrape_many(
    pool: &PgPool,
    client: &ListingClient,
    delay_ms: u64,
    urls: &[String],
) -> Vec<CycleOutcome> {
    let mut results = Vec::with_capacity(urls.len());

    for (idx, url) in urls.iter().enumerate() {
        match scrape_one(pool, client, url).await {
            Ok(report) => results.push(CycleOutcome {
                product_url: url.clone(),
                status: "success",
                message: format!("Saved {} successfully", report.title),
            }),
            Err(e) => {
                tracing::error!(product = %url, error = %e, "bulk scrape: product failed");
                results.push(CycleOutcome {
                    product_url: url.clone(),
                    status: "error",
                    message: e.to_string(),
                });
            }
        }

        // Jittered pause between page fetches; none needed after the last.
        if delay_ms > 0 && idx + 1 < urls.len() {
            let pause = rand::rng().random_range(delay_ms..=delay_ms * 2);
            tokio::time::sleep(Duration::from_millis(pause)).await;
        }
    }

    results
}
