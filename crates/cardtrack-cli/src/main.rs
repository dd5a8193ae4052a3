mod run;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "cardtrack-cli")]
#[command(about = "cardtrack command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape one product page and record the cycle.
    Scrape { product_url: String },
    /// Scrape every tracked product.
    ScrapeAll {
        /// Restrict to one category: "Singles" or "Sealed".
        #[arg(long)]
        product_type: Option<String>,
    },
    /// Apply pending database migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = cardtrack_core::load_app_config()?;
    let pool = cardtrack_db::connect_pool(
        &config.database_url,
        cardtrack_db::PoolConfig::from_app_config(&config),
    )
    .await?;

    match cli.command {
        Commands::Migrate => {
            cardtrack_db::run_migrations(&pool).await?;
            println!("migrations applied");
        }
        Commands::Scrape { product_url } => run::scrape_single(&pool, &config, &product_url).await?,
        Commands::ScrapeAll { product_type } => {
            run::scrape_all(&pool, &config, product_type.as_deref()).await?;
        }
    }

    Ok(())
}
