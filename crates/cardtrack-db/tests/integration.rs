//! Offline unit tests for cardtrack-db pool configuration and row types.
//! These tests do not require a live database connection.

use cardtrack_db::{PoolConfig, ProductRow, RecordOutcome, SnapshotRow};
use chrono::Utc;
use rust_decimal::Decimal;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = cardtrack_core::AppConfig {
        database_url: "postgres://example".to_string(),
        env: cardtrack_core::Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8000),
        log_level: "info".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        scraper_request_timeout_secs: 30,
        scraper_user_agent: "ua".to_string(),
        scraper_max_concurrent_products: 1,
        scraper_inter_request_delay_ms: 1500,
        scraper_max_retries: 3,
        scraper_retry_backoff_base_secs: 5,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

/// Compile-time smoke test: confirm that [`ProductRow`] carries the canonical
/// fields with the expected types. No database required.
#[test]
fn product_row_has_expected_canonical_fields() {
    let row = ProductRow {
        id_url: "https://market.example/it/Pokemon/Products/Singles/BS/Sylveon".to_string(),
        product_name: "BS/Sylveon".to_string(),
        title: "Sylveon V".to_string(),
        subtitle: None,
        image_url: None,
        product_type: "Singles".to_string(),
        set_name: Some("Brilliant Stars".to_string()),
        card_number: Some("TG14".to_string()),
        language: "5".to_string(),
        condition: Some("2".to_string()),
        game: "Pokemon".to_string(),
        species: Some("Sylveon".to_string()),
        current_min_price: Decimal::new(1050, 2),
        current_availability: 5,
        in_my_collection: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    assert_eq!(row.current_min_price, Decimal::new(1050, 2));
    assert_eq!(row.current_availability, 5);
    assert!(!row.in_my_collection);
}

#[test]
fn snapshot_row_has_expected_fields() {
    let row = SnapshotRow {
        id: 1,
        product_id_url: "https://market.example/p".to_string(),
        scraped_at: Utc::now(),
        total_availability: 117,
        detailed_availability: 42,
        min_price: Decimal::new(1000, 2),
        max_price: Decimal::new(100_000, 2),
        avg_price: Decimal::new(34_067, 2),
    };

    assert_eq!(row.total_availability, 117);
    assert_eq!(row.detailed_availability, 42);
    assert!(row.min_price <= row.avg_price && row.avg_price <= row.max_price);
}

#[test]
fn record_outcome_is_comparable() {
    let created = RecordOutcome {
        product_created: true,
        canonical_updated: false,
    };
    assert_eq!(
        created,
        RecordOutcome {
            product_created: true,
            canonical_updated: false,
        }
    );
}
