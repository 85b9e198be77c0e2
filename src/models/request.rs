//! Scrape request and extraction result models
//!
//! These mirror the wire format nodes accept: a target URL plus optional
//! search-interaction, item-list, body-text, and screenshot directives.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Upstream proxy for the browser session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Search interaction to perform before extraction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDirectives {
    /// Whether to run the search interaction at all
    #[serde(default)]
    pub search: bool,
    /// Selector of the search input field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_input_selector: Option<String>,
    /// Selector of the search submit button
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_button_selector: Option<String>,
    /// Term typed into the input field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
}

/// Item-list extraction directives
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDirectives {
    #[serde(default)]
    pub enabled: bool,
    /// Selector matching each list item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_selector: Option<String>,
    /// Selector of the title within an item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_selector: Option<String>,
    /// Selector of the date within an item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_selector: Option<String>,
}

/// Free-text body extraction directives
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyDirectives {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub body_selectors: Vec<String>,
    #[serde(default)]
    pub title_selectors: Vec<String>,
    #[serde(default)]
    pub date_selectors: Vec<String>,
}

/// One page-scraping task as submitted to the hub and executed by a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeRequest {
    /// Target URL
    pub url: String,
    /// Browser engine to drive: "chromium", "firefox", or "webkit"
    #[serde(default = "default_browser")]
    pub browser: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
    /// Capture a full-page screenshot alongside the extraction
    #[serde(default)]
    pub screenshot: bool,
    #[serde(default)]
    pub search_in: SearchDirectives,
    #[serde(default)]
    pub items_config: ItemDirectives,
    #[serde(default)]
    pub body_config: BodyDirectives,
}

fn default_browser() -> String {
    "chromium".to_string()
}

impl ScrapeRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            browser: default_browser(),
            proxy: None,
            screenshot: false,
            search_in: SearchDirectives::default(),
            items_config: ItemDirectives::default(),
            body_config: BodyDirectives::default(),
        }
    }
}

/// One entry extracted via the item-list directives
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedItem {
    pub title: Option<String>,
    pub date: Option<String>,
}

/// Structured result a node produces for a scrape request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Final URL after navigation and redirects
    pub url: String,
    /// Entries matched by the item-list directives
    #[serde(default)]
    pub items: Vec<ExtractedItem>,
    /// Text captured per body/title/date selector
    #[serde(default)]
    pub body_content: HashMap<String, String>,
    /// Base64-encoded screenshot, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

impl ExtractionResult {
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Attach raw screenshot bytes, base64-encoded for the wire
    pub fn with_screenshot(mut self, bytes: &[u8]) -> Self {
        self.screenshot = Some(BASE64.encode(bytes));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_request_gets_defaults() {
        let request: ScrapeRequest =
            serde_json::from_str("{\"url\": \"http://example.com\"}").unwrap();

        assert_eq!(request.url, "http://example.com");
        assert_eq!(request.browser, "chromium");
        assert!(!request.screenshot);
        assert!(!request.search_in.search);
        assert!(!request.items_config.enabled);
        assert!(!request.body_config.enabled);
    }

    #[test]
    fn test_full_request_round_trip() {
        let request = ScrapeRequest {
            url: "http://example.com/news".to_string(),
            browser: "firefox".to_string(),
            proxy: Some(ProxyConfig {
                server: "http://proxy:3128".to_string(),
                username: Some("u".to_string()),
                password: None,
            }),
            screenshot: true,
            search_in: SearchDirectives {
                search: true,
                search_input_selector: Some("#q".to_string()),
                search_button_selector: Some("#go".to_string()),
                search_term: Some("rust".to_string()),
            },
            items_config: ItemDirectives {
                enabled: true,
                item_selector: Some(".item".to_string()),
                title_selector: Some(".title".to_string()),
                date_selector: None,
            },
            body_config: BodyDirectives::default(),
        };

        let json = serde_json::to_string(&request).unwrap();
        let back: ScrapeRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn test_screenshot_is_base64() {
        let result = ExtractionResult::for_url("http://example.com").with_screenshot(b"png-bytes");
        assert_eq!(result.screenshot.as_deref(), Some("cG5nLWJ5dGVz"));
    }
}
