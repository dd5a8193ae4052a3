pub mod client;
pub mod error;
pub mod extract;
pub mod normalize;
mod retry;
pub mod url;

pub use client::ListingClient;
pub use error::ScraperError;
pub use extract::{extract_listing, RawListing};
pub use normalize::{normalize_prices, parse_total_availability, sum_availability};
pub use url::ProductLocator;
