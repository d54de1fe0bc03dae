use serde::{Deserialize, Serialize};

use crate::serialize::DomSerializationParams;

/// Input of [`ReadabilityTranscoder::transcode`](crate::ReadabilityTranscoder::transcode).
///
/// # Example
///
/// ```rust
/// use perlego_core::{DomSerializationParams, TranscodeRequest};
///
/// let request = TranscodeRequest::new("<p>Hello</p>")
///     .with_url("http://example.com/article")
///     .with_params(DomSerializationParams::plain());
/// assert_eq!(request.url.as_deref(), Some("http://example.com/article"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscodeRequest {
    pub html_content: String,
    /// Base URL for link resolution and next-page detection.
    pub url: Option<String>,
    pub dom_serialization_params: DomSerializationParams,
}

impl TranscodeRequest {
    pub fn new(html_content: impl Into<String>) -> Self {
        Self { html_content: html_content.into(), ..Default::default() }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_params(mut self, params: DomSerializationParams) -> Self {
        self.dom_serialization_params = params;
        self
    }
}

/// Input of the multi-page [`ReadabilityWebTranscoder`](crate::ReadabilityWebTranscoder).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebTranscodeRequest {
    pub url: String,
    pub dom_serialization_params: DomSerializationParams,
}

impl WebTranscodeRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), ..Default::default() }
    }

    pub fn with_params(mut self, params: DomSerializationParams) -> Self {
        self.dom_serialization_params = params;
        self
    }
}

/// Outcome of a transcode.
///
/// Finding nothing readable is not an error: `content_extracted` is false
/// and `content` holds whatever glue document could be produced, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeResult {
    pub content_extracted: bool,
    pub content: Option<String>,
    pub title: Option<String>,
    pub next_page_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_serializes_to_json() {
        let result = TranscodeResult {
            content_extracted: true,
            content: Some("<html></html>".into()),
            title: Some("Title".into()),
            next_page_url: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["content_extracted"], true);
        assert_eq!(json["title"], "Title");
        assert!(json["next_page_url"].is_null());

        let back: TranscodeResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_web_request_builder() {
        let request = WebTranscodeRequest::new("http://example.com").with_params(DomSerializationParams::plain());
        assert!(request.dom_serialization_params.pretty_print);
    }
}
