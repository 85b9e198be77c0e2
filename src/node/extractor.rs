//! The extraction collaborator seam
//!
//! Everything about actually visiting a page — navigation, selectors,
//! screenshots — lives behind [`PageExtractor`]. The agent only knows how to
//! queue requests, call the extractor, and ship its outcome back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{ExtractionResult, ScrapeRequest};

/// Failure modes an extraction can report
///
/// These travel inside a normal `response` envelope as a structured payload;
/// they never tear down the node's connection.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionError {
    #[error("Page load timed out")]
    Timeout,

    #[error("Navigation failed: {reason}")]
    Navigation { reason: String },

    #[error("Selector not found: {selector}")]
    SelectorNotFound { selector: String },

    #[error("Extraction failed: {reason}")]
    Other { reason: String },
}

/// Drives a browser engine against one scrape request
#[async_trait]
pub trait PageExtractor: Send + Sync {
    /// Execute the request and produce its structured result
    async fn extract(&self, request: &ScrapeRequest)
        -> Result<ExtractionResult, ExtractionError>;
}

/// Extractor that performs no page visit and returns an empty result
///
/// Default wiring point for deployments that plug in a real browser-backed
/// extractor, and the collaborator used by the agent's tests.
pub struct NoopExtractor;

#[async_trait]
impl PageExtractor for NoopExtractor {
    async fn extract(
        &self,
        request: &ScrapeRequest,
    ) -> Result<ExtractionResult, ExtractionError> {
        Ok(ExtractionResult::for_url(&request.url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_extractor_echoes_url() {
        let request = ScrapeRequest::new("http://example.com");
        let result = NoopExtractor.extract(&request).await.unwrap();
        assert_eq!(result.url, "http://example.com");
        assert!(result.items.is_empty());
        assert!(result.body_content.is_empty());
    }

    #[test]
    fn test_error_payload_shape() {
        let error = ExtractionError::SelectorNotFound {
            selector: ".missing".to_string(),
        };
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["kind"], "selector_not_found");
        assert_eq!(json["selector"], ".missing");
    }
}
