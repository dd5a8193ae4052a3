//! Marketplace product-URL parsing.
//!
//! Product pages live at
//! `/{locale}/{game}/Products/{category}/{name...}?language=..&minCondition=..`
//! where singles carry a two-segment name (`{set}/{card}`) and sealed product
//! a single segment. The parsed parts identify the product and the filters
//! the listing was scraped with.

use crate::error::ScraperError;

/// Identity parts parsed out of a marketplace product URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductLocator {
    /// The full URL as given; doubles as the product's stable identifier.
    pub url: String,
    /// Trading-card game segment, e.g. `"Pokemon"`.
    pub game: String,
    /// Marketplace category, e.g. `"Singles"` or `"Booster-Boxes"`.
    pub product_type: String,
    /// Product name path: `{set}/{card}` for singles, one segment otherwise.
    pub product_name: String,
    /// `language` query parameter; empty when absent.
    pub language: String,
    /// `minCondition` query parameter; `"2"` when absent.
    pub condition: String,
}

impl ProductLocator {
    /// Parses a marketplace product URL into its identity parts.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidProductUrl`] if the URL does not parse
    /// or its path does not have the expected product-page shape.
    pub fn parse(product_url: &str) -> Result<Self, ScraperError> {
        let invalid = |reason: &str| ScraperError::InvalidProductUrl {
            url: product_url.to_owned(),
            reason: reason.to_owned(),
        };

        let parsed =
            reqwest::Url::parse(product_url).map_err(|e| invalid(&format!("not a URL: {e}")))?;

        let parts: Vec<&str> = parsed
            .path()
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        // [locale, game, "Products", category, name...]
        if parts.len() < 5 {
            return Err(invalid("path too short for a product page"));
        }
        if parts[2] != "Products" {
            return Err(invalid("path is not a product page"));
        }

        let game = parts[1].to_owned();
        let product_type = parts[3].to_owned();

        let product_name = if product_type == "Singles" {
            // Singles name the set and the card: {set}/{card}.
            let card = parts.get(5).ok_or_else(|| invalid("singles URL is missing the card segment"))?;
            format!("{}/{card}", parts[4])
        } else {
            parts[4].to_owned()
        };

        let query_param = |name: &str| {
            parsed
                .query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
        };

        let language = query_param("language").unwrap_or_default();
        let condition = query_param("minCondition").unwrap_or_else(|| "2".to_owned());

        Ok(Self {
            url: product_url.to_owned(),
            game,
            product_type,
            product_name,
            language,
            condition,
        })
    }
}
