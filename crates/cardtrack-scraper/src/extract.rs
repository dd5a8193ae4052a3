//! Extraction of raw text fragments from a listing page.
//!
//! The listing markup is scanned directly with string primitives rather than
//! a full HTML parser: the handful of stable class-name markers the page
//! carries (`price-container` cells, `amount-container` spans, the info-list
//! `dt`/`dd` pairs) is all the structure the scraper needs, and the raw cell
//! texts go straight into [`crate::normalize`] which tolerates any junk that
//! slips through.

use crate::error::ScraperError;

/// Class token marking one listing row's price cell.
const PRICE_CLASS: &str = "price-container";

/// Class token marking one listing row's availability count.
const AVAILABILITY_CLASS: &str = "amount-container";

/// Info-list labels naming the page's aggregate availability figure.
const TOTAL_AVAILABILITY_LABELS: &[&str] = &["Available items", "Items available"];

/// Info-list labels for the product's set/expansion name.
const SET_LABELS: &[&str] = &["Expansion", "Set"];

/// Info-list labels for the card number within its set.
const CARD_NUMBER_LABELS: &[&str] = &["Number", "Card number"];

/// Info-list labels for the card's creature/species entry.
const SPECIES_LABELS: &[&str] = &["Pokémon", "Species"];

/// Raw text scraped from one product listing page, before any parsing.
///
/// `price_texts` and `availability_texts` hold one entry per listing-table
/// row; rows that fail to parse later are skipped there, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawListing {
    pub title: String,
    pub image_url: Option<String>,
    pub set_name: Option<String>,
    pub card_number: Option<String>,
    pub species: Option<String>,
    pub price_texts: Vec<String>,
    pub availability_texts: Vec<String>,
    pub total_availability_text: Option<String>,
}

/// Extracts the raw listing fragments from a product page's HTML.
///
/// # Errors
///
/// Returns [`ScraperError::Extraction`] if the page has no `<h1>` title —
/// that is the one element a product page always carries, and its absence
/// means we were served something other than a listing (consent wall,
/// interstitial, error page). Missing prices or availabilities are not
/// errors; they produce empty vectors and downstream zero statistics.
pub fn extract_listing(url: &str, html: &str) -> Result<RawListing, ScraperError> {
    let title = page_title(html).ok_or_else(|| ScraperError::Extraction {
        url: url.to_owned(),
        reason: "no <h1> title on page".to_owned(),
    })?;

    Ok(RawListing {
        title,
        image_url: image_src(html),
        set_name: labeled_dd(html, SET_LABELS),
        card_number: labeled_dd(html, CARD_NUMBER_LABELS),
        species: labeled_dd(html, SPECIES_LABELS),
        price_texts: class_blocks(html, PRICE_CLASS),
        availability_texts: class_blocks(html, AVAILABILITY_CLASS),
        total_availability_text: labeled_dd(html, TOTAL_AVAILABILITY_LABELS),
    })
}

/// Returns the inner text of every element whose `class` attribute contains
/// `marker` as a whole token, in document order.
fn class_blocks(html: &str, marker: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut search_from = 0usize;

    while let Some(rel) = html[search_from..].find("class=\"") {
        let attr_start = search_from + rel + "class=\"".len();
        let Some(attr_len) = html[attr_start..].find('"') else {
            break;
        };
        let attr_value = &html[attr_start..attr_start + attr_len];
        search_from = attr_start + attr_len;

        if !attr_value.split_whitespace().any(|token| token == marker) {
            continue;
        }

        let Some(tag_open) = html[..attr_start].rfind('<') else {
            continue;
        };
        let tag_name: String = html[tag_open + 1..]
            .chars()
            .take_while(char::is_ascii_alphanumeric)
            .collect();
        if tag_name.is_empty() {
            continue;
        }

        let Some(open_end_rel) = html[attr_start..].find('>') else {
            break;
        };
        let content_start = attr_start + open_end_rel + 1;
        // Self-closing tags have no inner text.
        if html[..content_start - 1].ends_with('/') {
            continue;
        }

        if let Some(inner) = capture_inner(html, content_start, &tag_name) {
            blocks.push(normalize_text(inner));
        }
    }

    blocks
}

/// Captures the inner markup of an element whose opening tag ends at
/// `content_start`, tracking nesting depth of the same tag name so that
/// nested containers close correctly.
fn capture_inner<'a>(html: &'a str, content_start: usize, tag: &str) -> Option<&'a str> {
    let open_pat = format!("<{tag}");
    let close_pat = format!("</{tag}");
    let mut depth = 1usize;
    let mut pos = content_start;

    while pos < html.len() {
        let rest = &html[pos..];
        let next_close = rest.find(&close_pat)?;
        if let Some(next_open) = rest.find(&open_pat) {
            if next_open < next_close {
                let after = pos + next_open + open_pat.len();
                // Word boundary: "<dd" must not count "<ddx" occurrences.
                if html[after..]
                    .chars()
                    .next()
                    .is_none_or(|c| !c.is_ascii_alphanumeric())
                {
                    depth += 1;
                }
                pos = after;
                continue;
            }
        }

        let after = pos + next_close + close_pat.len();
        if html[after..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_ascii_alphanumeric())
        {
            depth -= 1;
            if depth == 0 {
                return Some(&html[content_start..pos + next_close]);
            }
        }
        pos = after;
    }

    None
}

/// Extracts the page title: the first `<h1>`'s content, cut before any
/// nested `<span` (the page appends rarity/set badges there), tags stripped.
fn page_title(html: &str) -> Option<String> {
    let h1_start = html.find("<h1")?;
    let content_start = h1_start + html[h1_start..].find('>')? + 1;
    let inner = capture_inner(html, content_start, "h1")?;
    let before_span = inner.split("<span").next().unwrap_or(inner);
    let title = normalize_text(before_span);
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

/// Returns the inner text of the `<dd>` following the first `<dt>` whose
/// text contains one of `labels`.
fn labeled_dd(html: &str, labels: &[&str]) -> Option<String> {
    let mut search_from = 0usize;

    while let Some(rel) = html[search_from..].find("<dt") {
        let dt_start = search_from + rel;
        let content_start = dt_start + html[dt_start..].find('>')? + 1;
        search_from = content_start;

        let Some(inner) = capture_inner(html, content_start, "dt") else {
            continue;
        };
        let text = normalize_text(inner);
        if !labels.iter().any(|label| text.contains(label)) {
            continue;
        }

        let dd_start = content_start + html[content_start..].find("<dd")?;
        let dd_content = dd_start + html[dd_start..].find('>')? + 1;
        let dd_inner = capture_inner(html, dd_content, "dd")?;
        return Some(normalize_text(dd_inner));
    }

    None
}

/// Extracts the product image URL: the `src` of the first `<img>` inside the
/// element carrying `id="image"`.
fn image_src(html: &str) -> Option<String> {
    let anchor = html.find("id=\"image\"")?;
    let img_start = anchor + html[anchor..].find("<img")?;
    let tag_end = img_start + html[img_start..].find('>')?;
    let tag = &html[img_start..tag_end];
    let src_start = tag.find("src=\"")? + "src=\"".len();
    let src_len = tag[src_start..].find('"')?;
    Some(tag[src_start..src_start + src_len].to_owned())
}

/// Strips tags, decodes the common entities, and collapses whitespace.
fn normalize_text(fragment: &str) -> String {
    let mut text = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for c in fragment.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&euro;", "€")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
