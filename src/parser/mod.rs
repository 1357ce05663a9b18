//! HTML parsing and data extraction
//!
//! This module turns the raw listing markup into [`ArticleRecord`]s.
//!
//! [`ArticleRecord`]: crate::models::ArticleRecord

pub mod html;
pub mod sanitize;
pub mod selectors;

// Re-export main extractor and public types
pub use html::{parse_date, ListingExtractor};
pub use selectors::SelectorSet;
