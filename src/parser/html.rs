//! News listing extractor
//!
//! Walks every news item block on the listing page and reads title, link,
//! date, and author from each. Blocks without a usable title or link are
//! skipped; missing dates and authors fall back explicitly.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use scraper::{ElementRef, Html};
use url::Url;

use crate::config::ExtractorConfig;
use crate::models::ArticleRecord;
use crate::parser::sanitize::clean_line;
use crate::parser::selectors::SelectorSet;
use crate::utils::error::ParseError;
use crate::utils::resolve_url;

/// Extractor for the news listing page
#[derive(Debug, Clone)]
pub struct ListingExtractor {
    selectors: SelectorSet,
    base_url: Url,
    fallback_author: String,
    max_items: usize,
}

impl ListingExtractor {
    /// Build an extractor from the selector configuration and site origin
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidSelector` for a malformed selector and
    /// `ParseError::InvalidUrl` when `base_url` is not absolute.
    pub fn new(config: &ExtractorConfig, base_url: &str) -> Result<Self, ParseError> {
        let selectors = SelectorSet::from_config(config)?;
        let base_url =
            Url::parse(base_url).map_err(|_| ParseError::InvalidUrl(base_url.to_string()))?;

        Ok(Self {
            selectors,
            base_url,
            fallback_author: config.fallback_author.clone(),
            max_items: config.max_items,
        })
    }

    /// Extract up to `max_items` records, using the current time for fallbacks
    pub fn extract(&self, markup: &str) -> Vec<ArticleRecord> {
        self.extract_at(markup, Utc::now())
    }

    /// Extract up to `max_items` records with an explicit fallback instant
    pub fn extract_at(&self, markup: &str, now: DateTime<Utc>) -> Vec<ArticleRecord> {
        let document = Html::parse_document(markup);
        let records: Vec<ArticleRecord> =
            self.records(&document, now).take(self.max_items).collect();

        tracing::debug!(
            count = records.len(),
            estimated_dates = records.iter().filter(|r| r.date_estimated).count(),
            "Extracted listing records"
        );

        records
    }

    /// Lazily yield every qualifying record in document order
    ///
    /// The iterator is not truncated; callers decide how many to take.
    pub fn records<'a>(
        &'a self,
        document: &'a Html,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = ArticleRecord> + 'a {
        document
            .select(&self.selectors.container)
            .filter_map(move |block| self.read_block(block, now))
    }

    /// Read one news item block, or `None` when it lacks a title or link
    fn read_block(&self, block: ElementRef<'_>, now: DateTime<Utc>) -> Option<ArticleRecord> {
        let title = block
            .select(&self.selectors.title)
            .next()
            .map(|el| clean_line(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())?;

        let href = block
            .select(&self.selectors.link)
            .next()
            .and_then(|el| el.value().attr("href"))?;

        let Some(url) = resolve_url(&self.base_url, href) else {
            tracing::trace!(href = %href, "Skipping block with unresolvable link");
            return None;
        };

        let author = block
            .select(&self.selectors.author)
            .next()
            .map(|el| clean_line(&el.text().collect::<String>()))
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| self.fallback_author.clone());

        let parsed = block
            .select(&self.selectors.date)
            .next()
            .and_then(|el| self.date_value(el))
            .and_then(|raw| parse_date(&raw));

        let record = match parsed {
            Some(published_at) => ArticleRecord::new(title, url, published_at, author),
            None => ArticleRecord::new(title, url, now, author).with_estimated_date(),
        };

        Some(record)
    }

    /// Machine-readable date attribute, falling back to the element text
    fn date_value(&self, element: ElementRef<'_>) -> Option<String> {
        element
            .value()
            .attr(&self.selectors.date_attribute)
            .map(str::to_string)
            .or_else(|| Some(element.text().collect::<String>()))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

/// Parse a listing date into `DateTime<Utc>`
///
/// Offsets are honored; naive values are taken as UTC.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let date_str = date_str.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Some(dt.with_timezone(&Utc));
    }

    let offset_formats = [
        "%Y-%m-%dT%H:%M:%S%z", // 2024-03-01T14:35:00-0500
        "%Y-%m-%dT%H:%M%z",    // 2024-03-01T14:35-05:00
    ];
    for format in offset_formats {
        if let Ok(dt) = DateTime::parse_from_str(date_str, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let naive_formats = [
        "%Y-%m-%dT%H:%M:%S%.f", // 2024-03-01T14:35:00.000
        "%Y-%m-%dT%H:%M:%S",    // 2024-03-01T14:35:00
        "%Y-%m-%d %H:%M:%S",    // 2024-03-01 14:35:00
        "%Y-%m-%dT%H:%M",       // 2024-03-01T14:35
    ];
    for format in naive_formats {
        if let Ok(naive) = NaiveDateTime::parse_from_str(date_str, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
