use serde::{Deserialize, Serialize};

/// Robust price statistics derived from one scrape of a product's listing
/// table, after locale parsing and outlier filtering.
///
/// All three values are rounded to two decimal places. When no listing row
/// survives parsing and filtering, all three are `0.0` — a legitimate
/// "no data" value, not an error.
///
/// Boundary note: these are scrape-time `f64` convenience values. Persistence
/// converts them to `NUMERIC(10,2)` in the DB layer, so the two-decimal
/// rounding applied here is what the database stores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceStatistics {
    pub average: f64,
    pub minimum: f64,
    pub maximum: f64,
}

impl PriceStatistics {
    /// The all-zero result returned when no valid price samples exist.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            average: 0.0,
            minimum: 0.0,
            maximum: 0.0,
        }
    }

    /// Returns `true` if this is the "no valid samples" result.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.average == 0.0 && self.minimum == 0.0 && self.maximum == 0.0
    }
}

/// Identity and catalog metadata for a tracked product, keyed by its
/// marketplace URL.
///
/// `id_url` is the full product page URL and serves as the primary key; the
/// marketplace has no other stable public identifier. The remaining fields
/// describe the product as scraped from the page and the URL itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductMeta {
    /// Full product page URL; primary key.
    pub id_url: String,
    /// URL path segment naming the product, e.g. `"Brilliant-Stars/Sylveon-V-BRSTG14"`.
    pub product_name: String,
    /// Listing page title, e.g. `"Sylveon V (BRS TG14)"`.
    pub title: String,
    pub subtitle: Option<String>,
    pub image_url: Option<String>,
    /// Marketplace category, e.g. `"Singles"` or `"Booster-Boxes"`.
    pub product_type: String,
    pub set_name: Option<String>,
    pub card_number: Option<String>,
    /// Language filter the listing was scraped with (marketplace code).
    pub language: String,
    /// Minimum-condition filter the listing was scraped with.
    pub condition: Option<String>,
    /// Trading-card game the product belongs to, e.g. `"Pokemon"`.
    pub game: String,
    pub species: Option<String>,
}

impl ProductMeta {
    /// Returns `true` for single-card products, as opposed to sealed product.
    #[must_use]
    pub fn is_singles(&self) -> bool {
        self.product_type == "Singles"
    }
}

/// Everything one scrape cycle observed about a product, reduced to numbers.
///
/// `detailed_availability` is the sum of the per-row availability figures in
/// the listing table; `total_availability` is the page's single aggregate
/// figure. Both are kept because they routinely disagree (the table is capped
/// at a page of listings, the aggregate is not).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScrapeObservation {
    pub stats: PriceStatistics,
    pub detailed_availability: i32,
    pub total_availability: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_meta(product_type: &str) -> ProductMeta {
        ProductMeta {
            id_url: "https://market.example/it/Pokemon/Products/Singles/Brilliant-Stars/Sylveon-V-BRSTG14?language=5&minCondition=2".to_string(),
            product_name: "Brilliant-Stars/Sylveon-V-BRSTG14".to_string(),
            title: "Sylveon V (BRS TG14)".to_string(),
            subtitle: None,
            image_url: Some("https://cdn.example/sylveon.png".to_string()),
            product_type: product_type.to_string(),
            set_name: Some("Brilliant Stars".to_string()),
            card_number: Some("TG14".to_string()),
            language: "5".to_string(),
            condition: Some("2".to_string()),
            game: "Pokemon".to_string(),
            species: Some("Sylveon".to_string()),
        }
    }

    #[test]
    fn zero_statistics_are_recognized() {
        assert!(PriceStatistics::zero().is_zero());
    }

    #[test]
    fn non_zero_statistics_are_not_zero() {
        let stats = PriceStatistics {
            average: 12.5,
            minimum: 10.0,
            maximum: 15.0,
        };
        assert!(!stats.is_zero());
    }

    #[test]
    fn is_singles_matches_product_type() {
        assert!(make_meta("Singles").is_singles());
        assert!(!make_meta("Booster-Boxes").is_singles());
    }

    #[test]
    fn serde_roundtrip_observation() {
        let observation = ScrapeObservation {
            stats: PriceStatistics {
                average: 340.67,
                minimum: 11.0,
                maximum: 1000.0,
            },
            detailed_availability: 42,
            total_availability: 117,
        };
        let json = serde_json::to_string(&observation).expect("serialization failed");
        let decoded: ScrapeObservation =
            serde_json::from_str(&json).expect("deserialization failed");
        assert_eq!(decoded.stats, observation.stats);
        assert_eq!(decoded.detailed_availability, 42);
        assert_eq!(decoded.total_availability, 117);
    }
}
