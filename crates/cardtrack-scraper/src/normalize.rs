//! Reduction of raw listing-page text to trustworthy numbers.
//!
//! Listing tables contain junk rows: placeholder prices, damaged-card and
//! bundle outliers, decoy listings. A naive min/average over the raw cells
//! would be dominated by them, so prices go through a two-stage
//! average-then-filter pass before the final statistics are taken.
//! Availability counts are plain sums with no filtering.
//!
//! Everything here is pure and infallible: a cell that does not parse is
//! dropped from the sample set, never reported as an error.

use cardtrack_core::PriceStatistics;

/// Multiplier for the upper outlier bound: samples above `5 × mean` are dropped.
const FILTER_UPPER_FACTOR: f64 = 5.0;

/// Divisor for the lower outlier bound: samples below `mean / 9` are dropped.
const FILTER_LOWER_DIVISOR: f64 = 9.0;

/// Parses one listing price cell in the marketplace's European format,
/// e.g. `"1.234,56 €"` → `1234.56`.
///
/// The rule is: remove every `.` (thousands separator), replace `,` with `.`
/// (decimal separator), remove the currency symbol, trim, parse as `f64`.
/// Returns `None` for anything that does not survive that pipeline.
fn parse_price(raw: &str) -> Option<f64> {
    let cleaned = raw.replace('.', "").replace(',', ".").replace('€', "");
    cleaned.trim().parse::<f64>().ok()
}

/// Drops samples outside `[mean/9, 5·mean]` of the unfiltered mean.
///
/// The asymmetric bounds are preserved exactly as observed in production
/// scrape data; tightening or loosening them changes which listings count
/// toward the canonical price.
fn filter_prices(prices: Vec<f64>, initial_average: f64) -> Vec<f64> {
    prices
        .into_iter()
        .filter(|p| {
            initial_average / FILTER_LOWER_DIVISOR <= *p
                && *p <= FILTER_UPPER_FACTOR * initial_average
        })
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Derives `{average, minimum, maximum}` from one page's raw price cells.
///
/// Unparsable cells are skipped. If nothing parses, or nothing survives the
/// outlier filter, the all-zero statistics are returned — callers treat that
/// as "no data", not as a failure.
///
/// The minimum is the mean of the two lowest surviving prices when at least
/// two survive. A single mispriced listing would otherwise set the canonical
/// minimum for the whole product.
#[must_use]
pub fn normalize_prices<S: AsRef<str>>(raw_samples: &[S]) -> PriceStatistics {
    let prices: Vec<f64> = raw_samples
        .iter()
        .filter_map(|s| parse_price(s.as_ref()))
        .collect();

    if prices.is_empty() {
        return PriceStatistics::zero();
    }

    let initial_average = mean(&prices);
    let mut filtered = filter_prices(prices, initial_average);

    if filtered.is_empty() {
        return PriceStatistics::zero();
    }

    let average = round2(mean(&filtered));
    filtered.sort_by(f64::total_cmp);
    let maximum = round2(filtered[filtered.len() - 1]);
    let minimum = if filtered.len() >= 2 {
        round2((filtered[0] + filtered[1]) / 2.0)
    } else {
        round2(filtered[0])
    };

    PriceStatistics {
        average,
        minimum,
        maximum,
    }
}

/// Sums the per-row availability figures of a listing table.
///
/// Each fragment is trimmed and parsed as an integer; fragments that do not
/// parse are skipped. Returns `0` for empty or all-invalid input. Unlike
/// prices, availability counts carry no outlier filtering.
#[must_use]
pub fn sum_availability<S: AsRef<str>>(raw_fragments: &[S]) -> i32 {
    raw_fragments
        .iter()
        .filter_map(|f| f.as_ref().trim().parse::<i32>().ok())
        .fold(0i32, i32::saturating_add)
}

/// Parses the page's single aggregate availability figure.
///
/// Same skip-on-failure rule as [`sum_availability`]: anything that does not
/// parse yields `0`.
#[must_use]
pub fn parse_total_availability(raw: &str) -> i32 {
    raw.trim().parse::<i32>().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // parse_price
    // -----------------------------------------------------------------------

    #[test]
    fn parse_price_handles_plain_decimal_comma() {
        assert_eq!(parse_price("10,00 €"), Some(10.0));
    }

    #[test]
    fn parse_price_handles_thousands_separator() {
        assert_eq!(parse_price("1.234,56 €"), Some(1234.56));
    }

    #[test]
    fn parse_price_handles_repeated_thousands_separators() {
        assert_eq!(parse_price("1.234.567,89 €"), Some(1_234_567.89));
    }

    #[test]
    fn parse_price_tolerates_surrounding_whitespace() {
        assert_eq!(parse_price("   42,50 €  "), Some(42.5));
    }

    #[test]
    fn parse_price_rejects_non_numeric_text() {
        assert_eq!(parse_price("Sold out"), None);
        assert_eq!(parse_price(""), None);
    }

    // -----------------------------------------------------------------------
    // normalize_prices
    // -----------------------------------------------------------------------

    #[test]
    fn empty_input_yields_zero_statistics() {
        let stats = normalize_prices::<&str>(&[]);
        assert!(stats.is_zero());
    }

    #[test]
    fn all_unparsable_input_yields_zero_statistics() {
        let stats = normalize_prices(&["not a price", "n/a"]);
        assert!(stats.is_zero());
    }

    #[test]
    fn single_sample_is_its_own_min_avg_max() {
        let stats = normalize_prices(&["10,00 €"]);
        assert_eq!(stats.average, 10.0);
        assert_eq!(stats.minimum, 10.0);
        assert_eq!(stats.maximum, 10.0);
    }

    #[test]
    fn thousands_separated_sample_parses_exactly() {
        let stats = normalize_prices(&["1.234,56 €"]);
        assert_eq!(stats.average, 1234.56);
        assert_eq!(stats.minimum, 1234.56);
        assert_eq!(stats.maximum, 1234.56);
    }

    #[test]
    fn minimum_is_mean_of_two_lowest_when_all_in_bounds() {
        // mean = 14, bounds [1.56, 70]: everything survives.
        let stats = normalize_prices(&["10,00 €", "12,00 €", "20,00 €"]);
        assert_eq!(stats.average, 14.0);
        assert_eq!(stats.minimum, 11.0);
        assert_eq!(stats.maximum, 20.0);
    }

    #[test]
    fn low_decoys_below_ninth_of_mean_are_dropped() {
        // mean = 340.67, bounds [37.85, 1703.33]: the 10 and 12 decoys fall
        // below the lower bound and only the 1000 listing survives.
        let stats = normalize_prices(&["10,00 €", "12,00 €", "1000,00 €"]);
        assert_eq!(stats.average, 1000.0);
        assert_eq!(stats.minimum, 1000.0);
        assert_eq!(stats.maximum, 1000.0);
    }

    #[test]
    fn high_outlier_above_five_times_mean_is_dropped() {
        // Five 10s plus one 300: mean = 58.33, upper bound 291.67, so the
        // 300 bundle listing is excluded and the 10s carry the statistics.
        let samples = ["10,00 €", "10,00 €", "10,00 €", "10,00 €", "10,00 €", "300,00 €"];
        let stats = normalize_prices(&samples);
        assert_eq!(stats.average, 10.0);
        assert_eq!(stats.minimum, 10.0);
        assert_eq!(stats.maximum, 10.0);
    }

    #[test]
    fn tiny_decoy_is_dropped_but_real_listings_survive() {
        // mean = 7.51, lower bound 0.83: the 0.05 placeholder is excluded.
        let stats = normalize_prices(&["10,00 €", "10,00 €", "10,00 €", "0,05 €"]);
        assert_eq!(stats.average, 10.0);
        assert_eq!(stats.minimum, 10.0);
        assert_eq!(stats.maximum, 10.0);
    }

    #[test]
    fn unparsable_cells_are_skipped_not_fatal() {
        let stats = normalize_prices(&["10,00 €", "Sold out", "12,00 €"]);
        assert_eq!(stats.minimum, 11.0);
        assert_eq!(stats.average, 11.0);
        assert_eq!(stats.maximum, 12.0);
    }

    #[test]
    fn statistics_are_ordered_and_rounded_to_two_decimals() {
        let samples = ["3,30 €", "4,40 €", "5,50 €", "6,60 €"];
        let stats = normalize_prices(&samples);
        assert!(stats.minimum <= stats.average && stats.average <= stats.maximum);
        for value in [stats.average, stats.minimum, stats.maximum] {
            assert_eq!(round2(value), value, "value {value} not rounded to 2dp");
        }
        assert_eq!(stats.average, 4.95);
        assert_eq!(stats.minimum, 3.85);
        assert_eq!(stats.maximum, 6.6);
    }

    // -----------------------------------------------------------------------
    // sum_availability / parse_total_availability
    // -----------------------------------------------------------------------

    #[test]
    fn availability_sum_skips_invalid_fragments() {
        assert_eq!(sum_availability(&["3", "5", "x", "2"]), 10);
    }

    #[test]
    fn availability_sum_trims_whitespace() {
        assert_eq!(sum_availability(&[" 3 ", "\t5\n"]), 8);
    }

    #[test]
    fn availability_sum_of_empty_input_is_zero() {
        assert_eq!(sum_availability::<&str>(&[]), 0);
        assert_eq!(sum_availability(&["", "abc"]), 0);
    }

    #[test]
    fn total_availability_parses_plain_integer() {
        assert_eq!(parse_total_availability("117"), 117);
        assert_eq!(parse_total_availability("  42  "), 42);
    }

    #[test]
    fn total_availability_is_zero_on_parse_failure() {
        assert_eq!(parse_total_availability("n/a"), 0);
        assert_eq!(parse_total_availability(""), 0);
    }
}
