//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring scrape job.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use cardtrack_scraper::ListingClient;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process — dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<cardtrack_core::AppConfig>,
    client: Arc<ListingClient>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_nightly_scrape_job(&scheduler, pool, config, client).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the nightly full-catalog scrape.
///
/// Runs every day at 03:00 UTC (`0 0 3 * * *`): every tracked product gets
/// one fetch-normalize-record cycle, sequentially with the configured
/// inter-request delay.
async fn register_nightly_scrape_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    config: Arc<cardtrack_core::AppConfig>,
    client: Arc<ListingClient>,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);

    let job = Job::new_async("0 0 3 * * *", move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let config = Arc::clone(&config);
        let client = Arc::clone(&client);

        Box::pin(async move {
            tracing::info!("scheduler: starting nightly scrape run");
            run_nightly_scrape(&pool, &config, &client).await;
            tracing::info!("scheduler: nightly scrape run complete");
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Drive one scrape cycle for every tracked product.
async fn run_nightly_scrape(
    pool: &PgPool,
    config: &cardtrack_core::AppConfig,
    client: &ListingClient,
) {
    let urls = match cardtrack_db::list_product_urls(pool, None).await {
        Ok(urls) => urls,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to load product URLs");
            return;
        }
    };

    if urls.is_empty() {
        tracing::info!("scheduler: no tracked products; skipping");
        return;
    }

    tracing::info!(count = urls.len(), "scheduler: scraping tracked products");

    let outcomes = crate::scrape::scrape_many(
        pool,
        client,
        config.scraper_inter_request_delay_ms,
        &urls,
    )
    .await;

    let failed = outcomes.iter().filter(|o| o.status == "error").count();
    if failed > 0 {
        tracing::warn!(
            failed,
            total = outcomes.len(),
            "scheduler: some products failed during the nightly scrape"
        );
    }
}
