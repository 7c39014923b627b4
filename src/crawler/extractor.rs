//! Listing and detail extraction from marketplace HTML
//!
//! Search-result pages are scanned for a repeated item container; each
//! container yields a title, a price, an image and a link. Detail pages
//! yield condition, description and seller.
//!
//! Extraction is tied to the markup of each site and breaks when that markup
//! changes. It therefore never fails: anything that does not match simply
//! produces no listings.

use crate::config::SelectorConfig;
use crate::model::{CrawlerSearchResult, ListingDetail};
use crate::ConfigError;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use url::Url;

/// Extraction strategy for one crawled site
pub trait Extractor: Send + Sync {
    /// Extracts up to `max_results` usable listings from a search page
    ///
    /// Listings lacking a non-empty title or a strictly positive price are
    /// skipped and do not count toward the limit.
    fn extract_listings(&self, html: &str, max_results: usize) -> Vec<CrawlerSearchResult>;

    /// Extracts condition, description and seller from an item page
    fn extract_detail(&self, html: &str) -> ListingDetail;
}

/// CSS-selector driven extractor configured per site
#[derive(Debug)]
pub struct SelectorExtractor {
    platform: String,
    currency: String,
    base_url: Url,
    item: Selector,
    title: Selector,
    price: Selector,
    image: Option<Selector>,
    link: Option<Selector>,
    condition: Option<Selector>,
    description: Option<Selector>,
    seller: Option<Selector>,
}

impl SelectorExtractor {
    /// Compiles the configured selectors
    ///
    /// # Arguments
    ///
    /// * `platform` - Source name stamped onto every listing
    /// * `currency` - Currency stamped onto every listing
    /// * `base_url` - Base for resolving relative links and images
    /// * `selectors` - Selector configuration for the site
    ///
    /// # Returns
    ///
    /// * `Ok(SelectorExtractor)` - All selectors compiled
    /// * `Err(ConfigError)` - A selector is not valid CSS
    pub fn new(
        platform: &str,
        currency: &str,
        base_url: Url,
        selectors: &SelectorConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            platform: platform.to_string(),
            currency: currency.to_string(),
            base_url,
            item: compile(&selectors.item)?,
            title: compile(&selectors.title)?,
            price: compile(&selectors.price)?,
            image: compile_optional(&selectors.image)?,
            link: compile_optional(&selectors.link)?,
            condition: compile_optional(&selectors.condition)?,
            description: compile_optional(&selectors.description)?,
            seller: compile_optional(&selectors.seller)?,
        })
    }

    fn parse_item(&self, item: &ElementRef) -> Option<CrawlerSearchResult> {
        let image = self.image.as_ref().and_then(|sel| item.select(sel).next());

        // Some sites only carry the title in the thumbnail's alt text
        let title = first_text(item, &self.title).or_else(|| {
            image
                .and_then(|img| img.value().attr("alt"))
                .map(clean_text)
                .filter(|t| !t.is_empty())
        })?;

        let price = first_text(item, &self.price).and_then(|text| parse_price(&text))?;
        if price <= 0.0 {
            return None;
        }

        let image_url = image
            .and_then(|img| img.value().attr("src").or_else(|| img.value().attr("data-src")))
            .and_then(|src| resolve_link(src, &self.base_url));

        let href = match &self.link {
            Some(sel) => item
                .select(sel)
                .next()
                .and_then(|a| a.value().attr("href")),
            None => item.value().attr("href"),
        };
        let item_url = href.and_then(|href| resolve_link(href, &self.base_url));

        Some(CrawlerSearchResult {
            title,
            price,
            currency: self.currency.clone(),
            image_url,
            item_url,
            platform: self.platform.clone(),
            condition: None,
            seller: None,
            description: None,
        })
    }
}

impl Extractor for SelectorExtractor {
    fn extract_listings(&self, html: &str, max_results: usize) -> Vec<CrawlerSearchResult> {
        let document = Html::parse_document(html);

        let listings: Vec<CrawlerSearchResult> = document
            .select(&self.item)
            .filter_map(|item| self.parse_item(&item))
            .take(max_results)
            .collect();

        tracing::debug!(
            "Extracted {} listings for {}",
            listings.len(),
            self.platform
        );

        listings
    }

    fn extract_detail(&self, html: &str) -> ListingDetail {
        let document = Html::parse_document(html);
        let root = document.root_element();

        let field = |selector: &Option<Selector>| {
            selector.as_ref().and_then(|sel| first_text(&root, sel))
        };

        ListingDetail {
            condition: field(&self.condition),
            description: field(&self.description),
            seller: field(&self.seller),
        }
    }
}

fn compile(css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css).map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", css, e)))
}

fn compile_optional(css: &Option<String>) -> Result<Option<Selector>, ConfigError> {
    css.as_deref().map(compile).transpose()
}

/// Text of the first match, tags stripped and whitespace collapsed
///
/// Entities are already decoded by the HTML parser.
fn first_text(element: &ElementRef, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .map(|el| clean_text(&el.text().collect::<Vec<_>>().join(" ")))
        .find(|text| !text.is_empty())
}

fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn glyph_price_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:[¥￥$€£]\s*([0-9][0-9,]*(?:\.[0-9]+)?))|(?:([0-9][0-9,]*(?:\.[0-9]+)?)\s*円)")
            .expect("price pattern is valid")
    })
}

fn bare_price_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*([0-9][0-9,]*(?:\.[0-9]+)?)\s*$").expect("price pattern is valid")
    })
}

/// Parses a price token such as "¥1,200", "$1,234.50" or "3,000円"
///
/// Thousands separators are stripped before parsing. Text without a currency
/// glyph is accepted only when it is a bare number.
pub fn parse_price(text: &str) -> Option<f64> {
    let digits = glyph_price_pattern()
        .captures(text)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .or_else(|| {
            bare_price_pattern()
                .captures(text)
                .and_then(|caps| caps.get(1))
        })?
        .as_str()
        .replace(',', "");

    digits.parse::<f64>().ok().filter(|p| p.is_finite())
}

/// Resolves a link href to an absolute http(s) URL
///
/// Returns None for empty hrefs, fragments, non-web schemes and unparsable
/// values.
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url.to_string())
        }
        _ => None,
    }
}
