//! Markup retrieval from URLs, files and stdin.
//!
//! Everything is read as bytes and decoded with the SGML decoder, so a page's
//! byte-order mark, XML declaration or `<meta>` charset wins over guesses.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Duration;

use encoding_rs::Encoding;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use tracing::{debug, warn};
use url::Url;

use crate::sgml::decoder::{decode, encoding_for_label};
use crate::stitcher::UrlFetcher;
use crate::{PerlegoError, Result};

/// HTTP client configuration for fetching web pages.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Connect timeout in seconds.
    pub connect_timeout: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            connect_timeout: 5,
            user_agent: concat!("Mozilla/5.0 (compatible; Perlego/", env!("CARGO_PKG_VERSION"), ")").to_string(),
        }
    }
}

/// Charset parameter of the `Content-Type` header, when it names a known encoding
fn header_encoding(headers: &HeaderMap) -> Option<&'static Encoding> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    content_type.split(';').find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        encoding_for_label(value.trim().trim_matches(|c| c == '"' || c == '\''))
    })
}

fn build_client(config: &FetchConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout))
        .connect_timeout(Duration::from_secs(config.connect_timeout))
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(PerlegoError::HttpError)
}

/// Fetches a page and decodes its body.
///
/// Follows redirects. The `Content-Type` charset is only a default: markers in
/// the document itself take precedence.
///
/// # Errors
///
/// Returns [`PerlegoError::InvalidUrl`] for anything but an absolute
/// `http`/`https` URL, [`PerlegoError::Timeout`] when the request times out and
/// [`PerlegoError::HttpError`] for other transport failures or error statuses.
pub async fn fetch_url(url: &str, config: &FetchConfig) -> Result<String> {
    let parsed_url = Url::parse(url).map_err(|e| PerlegoError::InvalidUrl(format!("{url}: {e}")))?;
    if !matches!(parsed_url.scheme(), "http" | "https") {
        return Err(PerlegoError::InvalidUrl(format!("{url}: only http and https are supported")));
    }

    let timed_out = |e: reqwest::Error| {
        if e.is_timeout() { PerlegoError::Timeout { timeout: config.timeout } } else { PerlegoError::HttpError(e) }
    };

    let response = build_client(config)?
        .get(parsed_url)
        .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
        .header("Accept-Language", "en-US,en;q=0.9")
        .send()
        .await
        .map_err(timed_out)?
        .error_for_status()?;

    let default_encoding = header_encoding(response.headers());
    let bytes = response.bytes().await.map_err(timed_out)?;
    let (text, detected) = decode(&bytes, default_encoding);
    debug!(url, encoding = detected.name(), bytes = bytes.len(), "fetched page");

    Ok(text)
}

/// Reads and decodes a local file.
///
/// Callers should validate and sanitize the path when accepting user input.
pub fn fetch_file(path: &str) -> Result<String> {
    let path_buf = PathBuf::from(path);
    if !path_buf.exists() {
        return Err(PerlegoError::FileNotFound(path_buf));
    }
    let bytes = fs::read(&path_buf)?;
    Ok(decode(&bytes, None).0)
}

/// Reads all of standard input and decodes it.
pub fn fetch_stdin() -> Result<String> {
    let mut buffer = Vec::new();
    io::stdin().read_to_end(&mut buffer)?;
    Ok(decode(&buffer, None).0)
}

/// [`UrlFetcher`] over HTTP; failures are logged and reported as a missing page.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

impl UrlFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Option<String> {
        match fetch_url(url, &self.config).await {
            Ok(html) => Some(html),
            Err(err) => {
                warn!(url, error = %err, "failed to fetch page");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use rstest::rstest;
    use std::io::Write;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.timeout, 30);
        assert_eq!(config.connect_timeout, 5);
        assert!(config.user_agent.contains("Perlego"));
    }

    #[rstest]
    #[case("not-a-url")]
    #[case("ftp://example.com/file.html")]
    #[case("example.com")]
    fn test_fetch_url_invalid(#[case] url: &'static str) {
        let config = FetchConfig::default();
        let result = tokio::runtime::Runtime::new().unwrap().block_on(fetch_url(url, &config));
        assert!(matches!(result, Err(PerlegoError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_http_fetcher_maps_errors_to_none() {
        let fetcher = HttpFetcher::default();
        assert_eq!(fetcher.fetch("not-a-url").await, None);
    }

    #[rstest]
    #[case("text/html; charset=ISO-8859-2", Some("ISO-8859-2"))]
    #[case("text/html;charset=\"utf-8\"", Some("UTF-8"))]
    #[case("text/html", None)]
    #[case("text/html; charset=bogus", None)]
    fn test_header_encoding(#[case] content_type: &str, #[case] expected: Option<&str>) {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        assert_eq!(header_encoding(&headers).map(|e| e.name()), expected);
    }

    #[test]
    fn test_fetch_file_not_found() {
        let result = fetch_file("/nonexistent/path/file.html");
        assert!(matches!(result, Err(PerlegoError::FileNotFound(_))));
    }

    #[test]
    fn test_fetch_file_decodes_declared_charset() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"<html><head><meta charset=\"windows-1250\"></head><body><p>\xb9</p></body></html>")
            .unwrap();
        let html = fetch_file(file.path().to_str().unwrap()).unwrap();
        assert!(html.contains("<p>ą</p>"));
    }
}
