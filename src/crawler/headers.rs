use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, USER_AGENT};

use crate::config::FetcherConfig;

/// Pool of realistic desktop User-Agent strings for rotation
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:122.0) Gecko/20100101 Firefox/122.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// Browser-like request identity shared by both fetch strategies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoofedHeaders {
    /// Fixed user agent, or `None` to rotate from [`USER_AGENTS`]
    pub user_agent: Option<String>,
    pub accept_language: String,
    pub referer: String,
}

impl SpoofedHeaders {
    pub fn from_config(config: &FetcherConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            accept_language: config.accept_language.clone(),
            referer: config.referer.clone(),
        }
    }

    /// User agent for the next request
    pub fn pick_user_agent(&self) -> String {
        match &self.user_agent {
            Some(ua) => ua.clone(),
            None => random_user_agent().to_string(),
        }
    }

    /// Build the full header map for a direct request
    ///
    /// Values that are not valid header text are left out rather than failing
    /// the request.
    pub fn header_map(&self, user_agent: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(value) = HeaderValue::from_str(user_agent) {
            headers.insert(USER_AGENT, value);
        }
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));

        for (name, value) in self.navigation_headers() {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                headers.insert(name, value);
            }
        }

        headers
    }

    /// Headers a real browser sends on top-level navigation, minus the user agent
    ///
    /// The rendered strategy applies these through the browser so that its own
    /// user agent override stays authoritative.
    pub fn navigation_headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("accept-language", self.accept_language.clone()),
            ("referer", self.referer.clone()),
            ("sec-fetch-dest", String::from("document")),
            ("sec-fetch-mode", String::from("navigate")),
            ("sec-fetch-site", String::from("cross-site")),
            ("upgrade-insecure-requests", String::from("1")),
        ]
    }
}

/// Get a random user agent from the pool
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{ACCEPT_LANGUAGE, REFERER};
    use std::collections::HashSet;

    fn spoofed() -> SpoofedHeaders {
        SpoofedHeaders::from_config(&FetcherConfig::default())
    }

    #[test]
    fn test_header_map_contents() {
        let headers = spoofed().header_map("Mozilla/5.0");

        assert_eq!(headers.get(USER_AGENT).unwrap(), "Mozilla/5.0");
        assert_eq!(headers.get(REFERER).unwrap(), "https://www.google.com/");
        assert_eq!(headers.get(ACCEPT_LANGUAGE).unwrap(), "en-US,en;q=0.9");
        assert!(headers.contains_key(ACCEPT));
        assert_eq!(headers.get("sec-fetch-dest").unwrap(), "document");
        assert_eq!(headers.get("sec-fetch-mode").unwrap(), "navigate");
        assert!(headers.contains_key("upgrade-insecure-requests"));
    }

    #[test]
    fn test_invalid_user_agent_is_skipped() {
        let headers = spoofed().header_map("bad\nagent");
        assert!(!headers.contains_key(USER_AGENT));
        assert!(headers.contains_key(REFERER));
    }

    #[test]
    fn test_fixed_user_agent() {
        let mut config = FetcherConfig::default();
        config.user_agent = Some(String::from("ann-news-test"));
        let spoofed = SpoofedHeaders::from_config(&config);
        assert_eq!(spoofed.pick_user_agent(), "ann-news-test");
    }

    #[test]
    fn test_user_agent_rotation() {
        let mut agents = HashSet::new();
        for _ in 0..100 {
            let agent = random_user_agent();
            assert!(USER_AGENTS.contains(&agent));
            agents.insert(agent);
        }

        // With 100 draws from 4 agents, more than one is all but certain
        assert!(agents.len() > 1, "User agents should rotate");
    }

    #[test]
    fn test_navigation_headers_exclude_user_agent() {
        let names: Vec<&str> = spoofed().navigation_headers().iter().map(|(n, _)| *n).collect();
        assert!(!names.contains(&"user-agent"));
        assert!(names.contains(&"referer"));
        assert!(names.contains(&"accept-language"));
    }
}
