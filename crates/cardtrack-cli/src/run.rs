//! Scrape-command orchestration: one product, or the full catalog with
//! bounded concurrency.

use std::time::Duration;

use futures::stream::{self, StreamExt};
use rand::Rng;
use sqlx::PgPool;

use cardtrack_core::{AppConfig, ProductMeta, ScrapeObservation};
use cardtrack_db::{ProductTypeFilter, RecordOutcome};
use cardtrack_scraper::{
    extract_listing, normalize_prices, parse_total_availability, sum_availability, ListingClient,
    ProductLocator,
};

struct CycleReport {
    title: String,
    observation: ScrapeObservation,
    outcome: RecordOutcome,
}

/// One fetch → extract → normalize → record cycle for one product URL.
async fn run_cycle(
    pool: &PgPool,
    client: &ListingClient,
    product_url: &str,
) -> anyhow::Result<CycleReport> {
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

    Ok(CycleReport {
        title: listing.title,
        observation,
        outcome,
    })
}

pub(crate) async fn scrape_single(
    pool: &PgPool,
    config: &AppConfig,
    product_url: &str,
) -> anyhow::Result<()> {
    let client = ListingClient::from_config(config)?;
    let report = run_cycle(pool, &client, product_url).await?;

    let stats = report.observation.stats;
    println!("Saved {} successfully", report.title);
    println!(
        "  min {:.2}  avg {:.2}  max {:.2}  availability {}",
        stats.minimum, stats.average, stats.maximum, report.observation.detailed_availability
    );
    if report.outcome.product_created {
        println!("  new product tracked");
    } else if report.outcome.canonical_updated {
        println!("  canonical price/availability updated");
    }

    Ok(())
}

pub(crate) async fn scrape_all(
    pool: &PgPool,
    config: &AppConfig,
    product_type: Option<&str>,
) -> anyhow::Result<()> {
    let filter = match product_type {
        None => None,
        Some(raw) => Some(
            ProductTypeFilter::from_str_opt(raw)
                .ok_or_else(|| anyhow::anyhow!("product type must be \"Singles\" or \"Sealed\""))?,
        ),
    };

    let urls = cardtrack_db::list_product_urls(pool, filter).await?;
    if urls.is_empty() {
        anyhow::bail!("no tracked products match");
    }

    let client = ListingClient::from_config(config)?;
    let max_concurrent = config.scraper_max_concurrent_products.max(1);
    let delay_ms = config.scraper_inter_request_delay_ms;
    let total = urls.len();

    tracing::info!(total, max_concurrent, "starting bulk scrape");

    let results: Vec<(String, anyhow::Result<CycleReport>)> = stream::iter(urls)
        .map(|url| {
            let client = &client;
            async move {
                // Jittered stagger so concurrent cycles don't hammer the
                // marketplace in lockstep.
                if delay_ms > 0 {
                    let pause = rand::rng().random_range(delay_ms..=delay_ms * 2);
                    tokio::time::sleep(Duration::from_millis(pause)).await;
                }
                let result = run_cycle(pool, client, &url).await;
                (url, result)
            }
        })
        .buffer_unordered(max_concurrent)
        .collect()
        .await;

    let mut failed = 0usize;
    for (url, result) in &results {
        match result {
            Ok(report) => println!("ok    {} ({})", url, report.title),
            Err(e) => {
                failed += 1;
                tracing::error!(product = %url, error = %e, "scrape cycle failed");
                println!("error {url}: {e:#}");
            }
        }
    }

    if failed == total {
        anyhow::bail!("all {failed} products failed to scrape");
    }
    if failed > 0 {
        tracing::warn!(failed, total, "some products failed during bulk scrape");
    }
    println!("{}/{} products scraped", total - failed, total);

    Ok(())
}
