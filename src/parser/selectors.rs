//! CSS selectors for the news listing page
//!
//! The selector set is compiled once from configuration. When the upstream
//! layout drifts, the selector strings are what gets updated.

use scraper::Selector;

use crate::config::ExtractorConfig;
use crate::utils::error::ParseError;

/// Compile one configured selector, naming the field on failure
fn compile(field: &'static str, selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|_| ParseError::InvalidSelector {
        field,
        selector: selector.to_string(),
    })
}

/// Compiled selectors for a news item block and its subfields
#[derive(Debug, Clone)]
pub struct SelectorSet {
    /// Repeated news item block
    pub container: Selector,
    pub title: Selector,
    pub link: Selector,
    pub date: Selector,
    pub author: Selector,
    /// Attribute on the date element holding a machine-readable timestamp
    pub date_attribute: String,
}

impl SelectorSet {
    /// Compile the selector set from configuration
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidSelector` naming the first selector that
    /// does not parse.
    pub fn from_config(config: &ExtractorConfig) -> Result<Self, ParseError> {
        Ok(Self {
            container: compile("container", &config.container)?,
            title: compile("title", &config.title)?,
            link: compile("link", &config.link)?,
            date: compile("date", &config.date)?,
            author: compile("author", &config.author)?,
            date_attribute: config.date_attribute.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_selectors_compile() {
        let selectors = SelectorSet::from_config(&ExtractorConfig::default()).unwrap();
        assert_eq!(selectors.date_attribute, "datetime");
    }

    #[test]
    fn test_invalid_selector_names_field() {
        let config = ExtractorConfig {
            author: String::from("div[[["),
            ..ExtractorConfig::default()
        };

        match SelectorSet::from_config(&config) {
            Err(ParseError::InvalidSelector { field, selector }) => {
                assert_eq!(field, "author");
                assert_eq!(selector, "div[[[");
            }
            other => panic!("expected InvalidSelector, got {other:?}"),
        }
    }

    #[test]
    fn test_custom_selectors() {
        let config = ExtractorConfig {
            container: String::from("article.news-item"),
            title: String::from("h2 > a"),
            ..ExtractorConfig::default()
        };

        let selectors = SelectorSet::from_config(&config).unwrap();
        let html = scraper::Html::parse_fragment(
            r#"<article class="news-item"><h2><a href="/x">X</a></h2></article>"#,
        );
        assert_eq!(html.select(&selectors.container).count(), 1);
        assert_eq!(html.select(&selectors.title).count(), 1);
    }
}
