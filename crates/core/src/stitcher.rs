//! Multi-page article stitching.
//!
//! [`ReadabilityWebTranscoder`] fetches an article, follows its next-page
//! links one page at a time and appends every further page to the first
//! page's `#readInner` as `div#readability-page-N.page`.

use std::collections::HashSet;
use std::future::Future;

use tracing::{debug, info};

use crate::constants::INNER_DIV_ID;
use crate::dom_tree::{Document, NodeId};
use crate::pagination::normalize_page_url;
use crate::readability::ReadabilityTranscoder;
use crate::request::{TranscodeResult, WebTranscodeRequest};
use crate::serialize::DomSerializer;
use crate::{PerlegoError, Result};

const PAGE_ID_PREFIX: &str = "readability-page-";

/// Source of page markup for the web transcoder.
///
/// `None` (or an empty string) means the page could not be fetched; the
/// stitcher stops there and keeps what it has.
pub trait UrlFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Option<String>> + Send;
}

/// Pagination limits for [`ReadabilityWebTranscoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StitchConfig {
    /// Pages merged before a "View Next Page" link is emitted instead (default: 30).
    pub max_pages: usize,

    /// Text of the `p.page-separator` opening every appended page; `None` disables separators.
    pub page_separator: Option<String>,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self { max_pages: 30, page_separator: Some("§".to_string()) }
    }
}

impl StitchConfig {
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_page_separator(mut self, separator: Option<String>) -> Self {
        self.page_separator = separator;
        self
    }
}

/// Transcoder for articles that live at a URL and may span several pages.
///
/// # Example
///
/// ```rust,no_run
/// use perlego_core::{HttpFetcher, ReadabilityWebTranscoder, WebTranscodeRequest};
///
/// # async fn run() -> perlego_core::Result<()> {
/// let web = ReadabilityWebTranscoder::new(HttpFetcher::default());
/// let result = web.transcode(&WebTranscodeRequest::new("https://example.com/story")).await?;
/// println!("{:?}", result.title);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ReadabilityWebTranscoder<F> {
    transcoder: ReadabilityTranscoder,
    fetcher: F,
    config: StitchConfig,
}

impl<F: UrlFetcher> ReadabilityWebTranscoder<F> {
    pub fn new(fetcher: F) -> Self {
        Self { transcoder: ReadabilityTranscoder::default(), fetcher, config: StitchConfig::default() }
    }

    /// Uses a custom single-page transcoder for every page.
    pub fn with_transcoder(mut self, transcoder: ReadabilityTranscoder) -> Self {
        self.transcoder = transcoder;
        self
    }

    pub fn with_config(mut self, config: StitchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &StitchConfig {
        &self.config
    }

    /// Fetches `request.url`, follows its next-page links and serializes the merged article.
    ///
    /// Title and `content_extracted` describe the first page. When the page cap
    /// is hit, `next_page_url` holds the link that was not followed.
    ///
    /// # Errors
    ///
    /// Returns [`PerlegoError::EmptyInput`] for an empty URL, or a serializer
    /// error. Fetch failures are not errors.
    pub async fn transcode(&self, request: &WebTranscodeRequest) -> Result<TranscodeResult> {
        if request.url.is_empty() {
            return Err(PerlegoError::EmptyInput("url"));
        }

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(normalize_page_url(&request.url).to_string());

        let Some(html) = self.fetch_page(&request.url).await else {
            return Ok(TranscodeResult::default());
        };

        let first = self.transcoder.transcode_page(&html, Some(&request.url), &visited);
        let Some(mut doc) = first.document else {
            return Ok(TranscodeResult { title: first.title, ..Default::default() });
        };

        let mut unfollowed = None;
        if let Some(inner) = doc.element_by_id(INNER_DIV_ID) {
            let (pages, pending) = self.append_next_pages(&mut doc, inner, first.next_page_url, &mut visited).await;
            unfollowed = pending;
            if pages > 1 {
                if let Some(first_div) = doc.find_first_child_with_tag_name(inner, "div") {
                    doc.set_id(first_div, &format!("{PAGE_ID_PREFIX}1"));
                    doc.set_class(first_div, "page");
                }
            }
        }

        let content = DomSerializer::new().serialize_document(&doc, &request.dom_serialization_params)?;
        Ok(TranscodeResult {
            content_extracted: first.content_extracted,
            content: Some(content),
            title: first.title,
            next_page_url: unfollowed,
        })
    }

    /// Appends pages until a link repeats, a fetch fails or the cap is hit
    ///
    /// Returns the number of pages in the document and the next-page URL left
    /// behind by the cap, if any.
    async fn append_next_pages(
        &self, doc: &mut Document, inner: NodeId, mut next: Option<String>, visited: &mut HashSet<String>,
    ) -> (usize, Option<String>) {
        let mut current_page = 1;
        let mut merged = 1;

        while let Some(url) = next.take() {
            current_page += 1;

            if current_page > self.config.max_pages {
                append_view_next_page_link(doc, inner, &url);
                debug!(max_pages = self.config.max_pages, next = %url, "page limit reached");
                return (merged, Some(url));
            }

            let Some(html) = self.fetch_page(&url).await else { break };
            let page = self.transcoder.transcode_page(&html, Some(&url), visited);
            let Some(mut page_doc) = page.document else { break };
            let Some(page_inner) = page_doc.element_by_id(INNER_DIV_ID) else { break };

            if let Some(header) = page_doc.find_first_child_with_tag_name(page_inner, "h1") {
                page_doc.detach(header);
            }

            if is_duplicate_page(doc, inner, &page_doc, page_inner) {
                info!(page = current_page, url = %url, "skipping page that repeats earlier content");
                visited.insert(normalize_page_url(&url).to_string());
                break;
            }

            let page_div = self.page_container(doc, current_page);
            for &child in page_doc.children(page_inner) {
                let imported = doc.import_node(&page_doc, child);
                doc.append_child(page_div, imported);
            }
            doc.append_child(inner, page_div);
            merged += 1;
            info!(page = current_page, url = %url, "appended page");

            visited.insert(normalize_page_url(&url).to_string());
            next = page.next_page_url.filter(|link| !visited.contains(normalize_page_url(link)));
        }

        (merged, None)
    }

    async fn fetch_page(&self, url: &str) -> Option<String> {
        let html = self.fetcher.fetch(url).await.filter(|html| !html.is_empty());
        if html.is_none() {
            debug!(url, "nothing fetched");
        }
        html
    }

    fn page_container(&self, doc: &mut Document, page_number: usize) -> NodeId {
        let div = doc.create_element_with_attrs(
            "div",
            vec![("id".to_string(), format!("{PAGE_ID_PREFIX}{page_number}")), ("class".to_string(), "page".to_string())],
        );
        if let Some(separator) = &self.config.page_separator {
            let p = doc.create_element_with_attrs(
                "p",
                vec![("class".to_string(), "page-separator".to_string()), ("title".to_string(), format!("Page {page_number}"))],
            );
            let text = doc.create_text(separator.as_str());
            doc.append_child(p, text);
            doc.append_child(div, p);
        }
        div
    }
}

/// A page repeats earlier content when its first substantial paragraph already appears in the article
fn is_duplicate_page(doc: &Document, inner: NodeId, page_doc: &Document, page_inner: NodeId) -> bool {
    let Some(&first_p) = page_doc.elements_by_tag_name(page_inner, "p").first() else { return false };
    if page_doc.inner_html(first_p).chars().count() <= 100 {
        return false;
    }
    let paragraph = page_doc.inner_text(first_p).to_lowercase();
    let existing = doc.inner_text(inner).to_lowercase();
    !paragraph.is_empty() && existing.contains(&paragraph)
}

fn append_view_next_page_link(doc: &mut Document, inner: NodeId, url: &str) {
    let div = doc.create_element_with_attrs("div", vec![("style".to_string(), "text-align: center".to_string())]);
    let link = doc.create_element_with_attrs("a", vec![("href".to_string(), url.to_string())]);
    let text = doc.create_text("View Next Page");
    doc.append_child(link, text);
    doc.append_child(div, link);
    doc.append_child(inner, div);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DomSerializationParams;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubFetcher {
        pages: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        fn with_page(mut self, url: &str, html: String) -> Self {
            self.pages.insert(url.to_string(), html);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl UrlFetcher for StubFetcher {
        fn fetch(&self, url: &str) -> impl Future<Output = Option<String>> + Send {
            self.calls.lock().unwrap().push(url.to_string());
            let page = self.pages.get(url).cloned();
            async move { page }
        }
    }

    fn url(n: usize) -> String {
        format!("http://example.com/story/{n}")
    }

    fn page(content_of: usize, next: Option<usize>) -> String {
        let pager = next
            .map(|n| format!(r#"<div class="pagination"><a href="/story/{n}" class="next">Next page</a></div>"#))
            .unwrap_or_default();
        format!(
            r#"<html><head><title>The Long Story Of The Old Rail Yard - Gazette</title></head><body>
            <div id="story">
              <p>Page {content_of} opens with a paragraph long enough to be compared against earlier pages, describing chapter {content_of} in detail, with commas, clauses and padding.</p>
              <p>The second paragraph of page {content_of} continues the narrative, adding more sentences, so the article stays comfortably above the minimum length.</p>
            </div>
            {pager}
            </body></html>"#
        )
    }

    fn request(n: usize) -> WebTranscodeRequest {
        WebTranscodeRequest::new(url(n)).with_params(DomSerializationParams::plain())
    }

    #[tokio::test]
    async fn test_single_page_title() {
        let fetcher = StubFetcher::default().with_page(&url(1), page(1, None));
        let web = ReadabilityWebTranscoder::new(fetcher);
        let result = web.transcode(&request(1)).await.unwrap();

        assert!(result.content_extracted);
        assert_eq!(result.title.as_deref(), Some("The Long Story Of The Old Rail Yard"));
        let content = result.content.unwrap();
        assert!(content.contains("Page 1 opens"));
        assert!(!content.contains("readability-page-1"));
        assert_eq!(web.fetcher.calls(), vec![url(1)]);
    }

    #[tokio::test]
    async fn test_three_pages_merged_in_order() {
        let fetcher = StubFetcher::default()
            .with_page(&url(1), page(1, Some(2)))
            .with_page(&url(2), page(2, Some(3)))
            .with_page(&url(3), page(3, None));
        let web = ReadabilityWebTranscoder::new(fetcher);
        let content = web.transcode(&request(1)).await.unwrap().content.unwrap();

        let positions: Vec<usize> =
            (1..=3).map(|n| content.find(&format!("Page {n} opens")).expect("page content")).collect();
        assert!(positions[0] < positions[1] && positions[1] < positions[2]);
        for n in 1..=3 {
            assert!(content.contains(&format!(r#"id="readability-page-{n}""#)));
        }
        assert!(content.contains(r#"<p class="page-separator" title="Page 2">§</p>"#));
        assert!(content.contains(r#"title="Page 3""#));
        assert_eq!(content.matches("<h1>").count(), 1);
        assert_eq!(web.fetcher.calls(), vec![url(1), url(2), url(3)]);
    }

    #[tokio::test]
    async fn test_duplicate_page_dropped() {
        let fetcher = StubFetcher::default()
            .with_page(&url(1), page(1, Some(2)))
            .with_page(&url(2), page(1, Some(3)))
            .with_page(&url(3), page(3, None));
        let web = ReadabilityWebTranscoder::new(fetcher);
        let content = web.transcode(&request(1)).await.unwrap().content.unwrap();

        assert_eq!(content.matches("Page 1 opens").count(), 1);
        assert!(!content.contains("readability-page-2"));
        assert!(!content.contains("Page 3 opens"));
        assert_eq!(web.fetcher.calls(), vec![url(1), url(2)]);
    }

    #[tokio::test]
    async fn test_cycle_stops() {
        let fetcher = StubFetcher::default()
            .with_page(&url(1), page(1, Some(2)))
            .with_page(&url(2), page(2, Some(1)));
        let web = ReadabilityWebTranscoder::new(fetcher);
        let result = web.transcode(&request(1)).await.unwrap();

        assert!(result.content.unwrap().contains("readability-page-2"));
        assert_eq!(web.fetcher.calls(), vec![url(1), url(2)]);
    }

    #[tokio::test]
    async fn test_empty_fetch() {
        let fetcher = StubFetcher::default().with_page(&url(1), String::new());
        let result = ReadabilityWebTranscoder::new(fetcher).transcode(&request(1)).await.unwrap();
        assert!(!result.content_extracted);
        assert!(result.content.is_none());

        let result = ReadabilityWebTranscoder::new(StubFetcher::default()).transcode(&request(1)).await.unwrap();
        assert_eq!(result, TranscodeResult::default());
    }

    #[tokio::test]
    async fn test_failed_next_fetch_keeps_first_page() {
        let fetcher = StubFetcher::default().with_page(&url(1), page(1, Some(2)));
        let result = ReadabilityWebTranscoder::new(fetcher).transcode(&request(1)).await.unwrap();
        assert!(result.content_extracted);
        assert!(result.content.unwrap().contains("Page 1 opens"));
    }

    #[tokio::test]
    async fn test_max_pages_link_appended() {
        let fetcher = StubFetcher::default()
            .with_page(&url(1), page(1, Some(2)))
            .with_page(&url(2), page(2, Some(3)))
            .with_page(&url(3), page(3, None));
        let web = ReadabilityWebTranscoder::new(fetcher).with_config(StitchConfig::default().with_max_pages(2));
        let result = web.transcode(&WebTranscodeRequest::new(url(1))).await.unwrap();

        let content = result.content.unwrap();
        assert!(content.contains(r#"<div style="text-align: center"><a href="http://example.com/story/3">View Next Page</a></div>"#));
        assert!(!content.contains("Page 3 opens"));
        assert_eq!(result.next_page_url, Some(url(3)));
        assert_eq!(web.fetcher.calls(), vec![url(1), url(2)]);
    }

    #[tokio::test]
    async fn test_separator_disabled() {
        let fetcher = StubFetcher::default()
            .with_page(&url(1), page(1, Some(2)))
            .with_page(&url(2), page(2, None));
        let web = ReadabilityWebTranscoder::new(fetcher).with_config(StitchConfig::default().with_page_separator(None));
        let content = web.transcode(&request(1)).await.unwrap().content.unwrap();
        assert!(content.contains("readability-page-2"));
        assert!(content.contains(".page-separator {"), "stylesheet rule stays");
        assert!(!content.contains(r#"<p class="page-separator""#));
    }

    #[tokio::test]
    async fn test_untitled_page_keeps_its_body_headings() {
        let untitled = r#"<html><body><div id="story">
              <h1>Part One</h1>
              <p>The untitled second page opens with a paragraph long enough to count as content, listing the yard's history, its sheds, its sidings and its closure.</p>
              <h1>Part Two</h1>
              <p>Another paragraph follows the second heading, adding sentences, commas and clauses, so the page stays well above the minimum article length.</p>
            </div></body></html>"#;
        let fetcher = StubFetcher::default()
            .with_page(&url(1), page(1, Some(2)))
            .with_page(&url(2), untitled.to_string());
        let web = ReadabilityWebTranscoder::new(fetcher);
        let content = web.transcode(&request(1)).await.unwrap().content.unwrap();

        assert!(content.contains("readability-page-2"));
        assert!(content.contains("Part One"));
        assert!(content.contains("Part Two"));
    }

    #[tokio::test]
    async fn test_empty_url_rejected() {
        let web = ReadabilityWebTranscoder::new(StubFetcher::default());
        let err = web.transcode(&WebTranscodeRequest::new("")).await.unwrap_err();
        assert!(matches!(err, PerlegoError::EmptyInput("url")));
    }
}
