//! Article extraction API.
//!
//! [`ReadabilityTranscoder`] turns a full HTML page into a reading-mode
//! document: the page is cleaned, candidate containers are scored, the best
//! one is rebuilt with its related siblings, and the result is glued into a
//! fresh body under `#readOverlay > #readInner`.
//!
//! # Example
//!
//! ```rust
//! use perlego_core::{ReadabilityConfig, ReadabilityTranscoder, TranscodeRequest};
//!
//! let paragraph = "<p>Readable article text that is long enough to be scored, with a comma or two, and more words.</p>";
//! let html = format!("<title>A Fairly Long Example Page Title</title><div id=story>{}</div>", paragraph.repeat(4));
//!
//! let transcoder = ReadabilityTranscoder::with_config(ReadabilityConfig::builder().include_stylesheet(false).build());
//! let result = transcoder.transcode(&TranscodeRequest::new(html)).unwrap();
//! assert!(result.content_extracted);
//! assert!(result.content.unwrap().contains("readInner"));
//! ```

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::constants::{CONTENT_DIV_ID, INNER_DIV_ID, OVERLAY_DIV_ID, Patterns, READABILITY_STYLESHEET};
use crate::dom_tree::{Document, NodeId};
use crate::extract::{create_article_content_element, determine_top_candidate, find_candidates};
use crate::pagination::find_next_page_link;
use crate::postprocess::prepare_article_content_element;
use crate::preprocess::{collapse_redundant_paragraph_divs, ensure_root_and_body, prepare_document, strip_unlikely_candidates};
use crate::request::{TranscodeRequest, TranscodeResult};
use crate::scoring::{ScoringContext, normalized_inner_text};
use crate::serialize::DomSerializer;
use crate::urls::{AttributeTransformationInput, AttributeTransformationResult, AttributeTransformer, resolve_element_urls};
use crate::{PerlegoError, Result};

macro_rules! reading_option {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The variant's name as written in code, e.g. `ExtraWide`.
            pub fn variant_name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&user_style_class("", self.variant_name())[1..])
            }
        }

        impl FromStr for $name {
            type Err = String;

            /// Accepts the variant name in any case, with or without `-`/`_` separators.
            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let wanted: String = s.chars().filter(|c| *c != '-' && *c != '_').collect();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.variant_name().eq_ignore_ascii_case(&wanted))
                    .ok_or_else(|| format!("unknown {} '{s}'", stringify!($name)))
            }
        }
    };
}

reading_option! {
    /// Color scheme and typeface of the reading view.
    ReadingStyle { Newspaper, Novel, Ebook, Terminal, Apertura, Athelas }
}

reading_option! {
    /// Horizontal margin of the reading view.
    ReadingMargin { ExtraNarrow, Narrow, Medium, Wide, ExtraWide }
}

reading_option! {
    /// Font size of the reading view.
    ReadingSize { ExtraSmall, Small, Medium, Large, ExtraLarge }
}

/// CSS class for a reading option: the prefix, a dash, then the variant name in kebab case.
///
/// An empty variant name yields the bare prefix.
///
/// # Example
///
/// ```rust
/// use perlego_core::readability::user_style_class;
///
/// assert_eq!(user_style_class("margin", "ExtraWide"), "margin-extra-wide");
/// assert_eq!(user_style_class("prefix", "ABcD"), "prefix-a-bc-d");
/// assert_eq!(user_style_class("prefix", ""), "prefix");
/// ```
pub fn user_style_class(prefix: &str, variant_name: &str) -> String {
    if variant_name.is_empty() {
        return prefix.to_string();
    }
    let mut class = format!("{prefix}-");
    for (i, c) in variant_name.chars().enumerate() {
        if i > 0 && c.is_uppercase() {
            class.push('-');
        }
        class.extend(c.to_lowercase());
    }
    class
}

/// Configuration for the readability transcoder.
///
/// # Example
///
/// ```rust
/// use perlego_core::{ReadabilityConfig, ReadingStyle};
///
/// let config = ReadabilityConfig::builder()
///     .reading_style(ReadingStyle::Terminal)
///     .min_article_content_length(500)
///     .build();
/// assert!(config.strip_unlikely_candidates);
/// ```
#[derive(Debug, Clone)]
pub struct ReadabilityConfig {
    /// Whether to remove elements whose class or id looks like page chrome (default: true).
    pub strip_unlikely_candidates: bool,

    /// Whether class and id names adjust candidate scores (default: true).
    pub weight_classes: bool,

    /// Whether to drop link-heavy or media-heavy blocks from the article (default: true).
    pub clean_conditionally: bool,

    /// Whether to inject the reading stylesheet into `<head>` (default: true).
    pub include_stylesheet: bool,

    pub reading_style: ReadingStyle,
    pub reading_margin: ReadingMargin,
    pub reading_size: ReadingSize,

    /// Shortest article text accepted before retrying with relaxed flags (default: 250).
    pub min_article_content_length: usize,

    /// Heuristic regexes.
    pub patterns: Patterns,
}

impl Default for ReadabilityConfig {
    fn default() -> Self {
        Self {
            strip_unlikely_candidates: true,
            weight_classes: true,
            clean_conditionally: true,
            include_stylesheet: true,
            reading_style: ReadingStyle::Newspaper,
            reading_margin: ReadingMargin::Wide,
            reading_size: ReadingSize::Medium,
            min_article_content_length: 250,
            patterns: Patterns::default(),
        }
    }
}

impl ReadabilityConfig {
    /// Creates a new builder for ReadabilityConfig.
    pub fn builder() -> ReadabilityConfigBuilder {
        ReadabilityConfigBuilder::new()
    }
}

/// Builder for ReadabilityConfig.
pub struct ReadabilityConfigBuilder {
    config: ReadabilityConfig,
}

impl ReadabilityConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self { config: ReadabilityConfig::default() }
    }

    pub fn strip_unlikely_candidates(mut self, value: bool) -> Self {
        self.config.strip_unlikely_candidates = value;
        self
    }

    pub fn weight_classes(mut self, value: bool) -> Self {
        self.config.weight_classes = value;
        self
    }

    pub fn clean_conditionally(mut self, value: bool) -> Self {
        self.config.clean_conditionally = value;
        self
    }

    pub fn include_stylesheet(mut self, value: bool) -> Self {
        self.config.include_stylesheet = value;
        self
    }

    pub fn reading_style(mut self, value: ReadingStyle) -> Self {
        self.config.reading_style = value;
        self
    }

    pub fn reading_margin(mut self, value: ReadingMargin) -> Self {
        self.config.reading_margin = value;
        self
    }

    pub fn reading_size(mut self, value: ReadingSize) -> Self {
        self.config.reading_size = value;
        self
    }

    pub fn min_article_content_length(mut self, value: usize) -> Self {
        self.config.min_article_content_length = value;
        self
    }

    pub fn patterns(mut self, value: Patterns) -> Self {
        self.config.patterns = value;
        self
    }

    /// Builds the config.
    pub fn build(self) -> ReadabilityConfig {
        self.config
    }
}

impl Default for ReadabilityConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Heuristics that are relaxed one at a time when an attempt yields too little text
#[derive(Debug, Clone, Copy)]
struct PassFlags {
    strip_unlikely_candidates: bool,
    weight_classes: bool,
    clean_conditionally: bool,
}

impl PassFlags {
    fn from_config(config: &ReadabilityConfig) -> Self {
        Self {
            strip_unlikely_candidates: config.strip_unlikely_candidates,
            weight_classes: config.weight_classes,
            clean_conditionally: config.clean_conditionally,
        }
    }

    /// Switches off the first flag still on; false when none is left.
    fn relax(&mut self) -> bool {
        for flag in [&mut self.strip_unlikely_candidates, &mut self.weight_classes, &mut self.clean_conditionally] {
            if *flag {
                *flag = false;
                return true;
            }
        }
        false
    }
}

/// One transcoded page, before serialization
#[derive(Debug, Clone, Default)]
pub struct TranscodedPage {
    /// The glued reading document; `None` when the markup could not be parsed.
    pub document: Option<Document>,
    pub content_extracted: bool,
    pub title: Option<String>,
    pub next_page_url: Option<String>,
}

/// Single-page readability transcoder.
///
/// Holds the configuration and the optional `a[href]` / `img[src]`
/// transformers, which run after URLs are resolved against the page URL.
///
/// # Example
///
/// ```rust
/// use perlego_core::{AttributeTransformationResult, ReadabilityTranscoder};
///
/// let transcoder = ReadabilityTranscoder::new().with_anchor_href_transformer(|input| {
///     AttributeTransformationResult::new(format!("http://redirector.com/?u={}", input.attribute_value))
///         .with_original_value_attribute("orighref")
/// });
/// # let _ = transcoder;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReadabilityTranscoder {
    config: ReadabilityConfig,
    anchor_href_transformer: Option<AttributeTransformer>,
    image_src_transformer: Option<AttributeTransformer>,
}

impl ReadabilityTranscoder {
    /// Creates a transcoder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transcoder with a custom configuration.
    pub fn with_config(config: ReadabilityConfig) -> Self {
        Self { config, ..Default::default() }
    }

    pub fn config(&self) -> &ReadabilityConfig {
        &self.config
    }

    /// Rewrites every resolved `a[href]` in the article.
    pub fn with_anchor_href_transformer<F>(mut self, transform: F) -> Self
    where
        F: Fn(&AttributeTransformationInput<'_>) -> AttributeTransformationResult + Send + Sync + 'static,
    {
        self.anchor_href_transformer = Some(AttributeTransformer::new(transform));
        self
    }

    /// Rewrites every resolved `img[src]` in the article.
    pub fn with_image_src_transformer<F>(mut self, transform: F) -> Self
    where
        F: Fn(&AttributeTransformationInput<'_>) -> AttributeTransformationResult + Send + Sync + 'static,
    {
        self.image_src_transformer = Some(AttributeTransformer::new(transform));
        self
    }

    /// Extracts the article from `request.html_content` and serializes the reading document.
    ///
    /// # Errors
    ///
    /// Returns [`PerlegoError::EmptyInput`] for empty HTML. Markup that cannot be
    /// parsed is not an error: the result has `content_extracted == false` and
    /// no content.
    pub fn transcode(&self, request: &TranscodeRequest) -> Result<TranscodeResult> {
        if request.html_content.is_empty() {
            return Err(PerlegoError::EmptyInput("html_content"));
        }

        let page = self.transcode_page(&request.html_content, request.url.as_deref(), &HashSet::new());
        let content = page
            .document
            .as_ref()
            .map(|doc| DomSerializer::new().serialize_document(doc, &request.dom_serialization_params))
            .transpose()?;

        Ok(TranscodeResult {
            content_extracted: page.content_extracted,
            content,
            title: page.title,
            next_page_url: page.next_page_url,
        })
    }

    /// Transcodes one page into its glued reading document without serializing it.
    ///
    /// `visited` lists pages (trailing `/` removed) that must not be proposed as
    /// the next page.
    pub fn transcode_page(&self, html: &str, url: Option<&str>, visited: &HashSet<String>) -> TranscodedPage {
        let parsed = match Document::parse(html) {
            Ok(doc) => doc,
            Err(err) => {
                warn!(error = %err, url = url.unwrap_or_default(), "failed to build the document");
                return TranscodedPage::default();
            }
        };

        let title = parsed.root().map(|_| extract_article_title(&parsed));
        let next_page_url = url.and_then(|url| find_next_page_link(&parsed, url, &self.config.patterns, visited));

        let (mut doc, article) = self.extract_article(&parsed);
        resolve_element_urls(
            &mut doc,
            article,
            url,
            self.anchor_href_transformer.as_ref(),
            self.image_src_transformer.as_ref(),
        );
        let content_extracted = !doc.inner_text(article).trim().is_empty();

        glue_document(&mut doc, title.as_deref().unwrap_or_default(), article, &self.config);

        TranscodedPage { document: Some(doc.compact()), content_extracted, title, next_page_url }
    }

    /// Runs the extraction pipeline, relaxing heuristics until the article is long enough
    fn extract_article(&self, parsed: &Document) -> (Document, NodeId) {
        let mut flags = PassFlags::from_config(&self.config);
        loop {
            let mut doc = parsed.clone();
            let article = self.run_pipeline(&mut doc, flags);
            let length = normalized_inner_text(&doc, article).chars().count();
            if length >= self.config.min_article_content_length {
                return (doc, article);
            }
            if !flags.relax() {
                return (doc, article);
            }
            debug!(length, ?flags, "article too short, retrying with relaxed heuristics");
        }
    }

    fn run_pipeline(&self, doc: &mut Document, flags: PassFlags) -> NodeId {
        let patterns = &self.config.patterns;

        prepare_document(doc, patterns);
        strip_unlikely_candidates(doc, patterns, flags.strip_unlikely_candidates);
        collapse_redundant_paragraph_divs(doc);

        let ctx = ScoringContext::new(patterns, flags.weight_classes);
        let mut scores = find_candidates(doc, &ctx);
        let top = determine_top_candidate(doc, &mut scores);
        let article = create_article_content_element(doc, top, &scores);
        prepare_article_content_element(doc, article, &ctx, &scores, flags.clean_conditionally);
        article
    }
}

static TITLE_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" [\|\-] ").expect("title separator regex"));
static BEFORE_LAST_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.*)[\|\-] .*").expect("before separator regex"));
static AFTER_FIRST_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\|\-]*[\|\-](.*)").expect("after separator regex"));
static AFTER_LAST_COLON: LazyLock<Regex> = LazyLock::new(|| Regex::new(r".*:(.*)").expect("after colon regex"));
static AFTER_FIRST_COLON: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^:]*[:](.*)").expect("first colon regex"));

fn word_count(text: &str) -> usize {
    text.split(' ').count()
}

/// Guesses the article title from the page `<title>`, trimming site names around separators
///
/// Falls back to the single `h1` for very short or very long titles, and to the
/// untouched page title when the guess ends up with four words or fewer.
pub fn extract_article_title(doc: &Document) -> String {
    let original = doc.title().unwrap_or_default();
    let mut title = original.clone();

    if TITLE_SEPARATOR.is_match(&title) {
        title = BEFORE_LAST_SEPARATOR.replace(&original, "$1").into_owned();
        if word_count(&title) < 3 {
            title = AFTER_FIRST_SEPARATOR.replace(&original, "$1").into_owned();
        }
    } else if title.contains(": ") {
        title = AFTER_LAST_COLON.replace(&original, "$1").into_owned();
        if word_count(&title) < 3 {
            title = AFTER_FIRST_COLON.replace(&original, "$1").into_owned();
        }
    } else if title.chars().count() > 150 || title.chars().count() < 15 {
        let headers = doc.root().map(|root| doc.elements_by_tag_name(root, "h1")).unwrap_or_default();
        if let [header] = headers.as_slice() {
            title = normalized_inner_text(doc, *header);
        }
    }

    let title = title.trim();
    if word_count(title) <= 4 { original } else { title.to_string() }
}

/// Replaces the body with the reading view: `#readOverlay > #readInner > (h1, article)`
///
/// Adds a `<head>` when missing and, if configured, the reading stylesheet.
pub fn glue_document(doc: &mut Document, title: &str, article: NodeId, config: &ReadabilityConfig) {
    let (root, body) = ensure_root_and_body(doc);

    let head = match doc.head() {
        Some(head) => head,
        None => {
            let head = doc.create_element("head");
            doc.prepend_child(root, head);
            head
        }
    };

    if config.include_stylesheet {
        let style = doc.create_element_with_attrs("style", vec![("type".to_string(), "text/css".to_string())]);
        let css = doc.create_text(READABILITY_STYLESHEET);
        doc.append_child(style, css);
        doc.append_child(head, style);
    }

    doc.remove_children(body);
    doc.clear_attrs(body);

    let overlay = doc.create_element_with_attrs(
        "div",
        vec![
            ("id".to_string(), OVERLAY_DIV_ID.to_string()),
            ("class".to_string(), user_style_class("style", config.reading_style.variant_name())),
        ],
    );
    let inner_class = format!(
        "{} {}",
        user_style_class("margin", config.reading_margin.variant_name()),
        user_style_class("size", config.reading_size.variant_name())
    );
    let inner = doc.create_element_with_attrs(
        "div",
        vec![("id".to_string(), INNER_DIV_ID.to_string()), ("class".to_string(), inner_class)],
    );

    if !title.is_empty() {
        let heading = doc.create_element("h1");
        let text = doc.create_text(title);
        doc.append_child(heading, text);
        doc.append_child(inner, heading);
    }

    if doc.id(article).is_empty() {
        doc.set_id(article, CONTENT_DIV_ID);
    }
    doc.append_child(inner, article);
    doc.append_child(overlay, inner);
    doc.append_child(body, overlay);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DomSerializationParams;
    use rstest::rstest;

    const PARAGRAPH: &str = "The council voted on Tuesday evening to approve the plan, which turns the old rail yard \
        into eleven acres of public green space, with walking paths, a playground and a community garden.";

    fn article_page() -> String {
        format!(
            r#"<html><head><title>Local Council Approves New Park Plan - Springfield Gazette</title>
            <script>trackVisit();</script></head>
            <body>
              <div id="header"><a href="/">Home</a> <a href="/news">News</a></div>
              <div class="sidebar"><p>Subscribe to our newsletter for more updates from the gazette.</p></div>
              <div id="story" class="article-body">
                <h1>Local Council Approves New Park Plan</h1>
                <p>{PARAGRAPH}</p><p>{PARAGRAPH}</p><p>{PARAGRAPH}</p>
                <p>Read the <a href="/docs/plan.pdf">full proposal</a>.</p>
                <img src="images/park.jpg">
              </div>
              <div id="footer"><p>Copyright 2024 Springfield Gazette, all rights reserved.</p></div>
            </body></html>"#
        )
    }

    #[test]
    fn test_config_defaults() {
        let config = ReadabilityConfig::default();
        assert!(config.strip_unlikely_candidates && config.weight_classes && config.clean_conditionally);
        assert!(config.include_stylesheet);
        assert_eq!(config.reading_style, ReadingStyle::Newspaper);
        assert_eq!(config.reading_margin, ReadingMargin::Wide);
        assert_eq!(config.reading_size, ReadingSize::Medium);
        assert_eq!(config.min_article_content_length, 250);
    }

    #[test]
    fn test_config_builder() {
        let config = ReadabilityConfig::builder()
            .weight_classes(false)
            .reading_margin(ReadingMargin::ExtraNarrow)
            .min_article_content_length(10)
            .build();
        assert!(!config.weight_classes);
        assert_eq!(config.reading_margin, ReadingMargin::ExtraNarrow);
        assert_eq!(config.min_article_content_length, 10);
    }

    #[rstest]
    #[case("prefix", "", "prefix")]
    #[case("prefix", "Abc", "prefix-abc")]
    #[case("prefix", "ABcD", "prefix-a-bc-d")]
    #[case("style", "Newspaper", "style-newspaper")]
    #[case("size", "ExtraLarge", "size-extra-large")]
    fn test_user_style_class(#[case] prefix: &str, #[case] name: &str, #[case] expected: &str) {
        assert_eq!(user_style_class(prefix, name), expected);
    }

    #[rstest]
    #[case("extra-wide", ReadingMargin::ExtraWide)]
    #[case("ExtraWide", ReadingMargin::ExtraWide)]
    #[case("NARROW", ReadingMargin::Narrow)]
    fn test_reading_option_from_str(#[case] input: &str, #[case] expected: ReadingMargin) {
        assert_eq!(input.parse::<ReadingMargin>().unwrap(), expected);
    }

    #[test]
    fn test_reading_option_display_and_errors() {
        assert_eq!(ReadingSize::ExtraSmall.to_string(), "extra-small");
        assert!("huge".parse::<ReadingSize>().is_err());
    }

    #[test]
    fn test_pass_flags_relax_in_order() {
        let mut flags = PassFlags::from_config(&ReadabilityConfig::default());
        assert!(flags.relax());
        assert!(!flags.strip_unlikely_candidates && flags.weight_classes);
        assert!(flags.relax());
        assert!(!flags.weight_classes && flags.clean_conditionally);
        assert!(flags.relax());
        assert!(!flags.relax());
    }

    #[rstest]
    #[case("Local Council Approves New Park Plan - Springfield Gazette", "Local Council Approves New Park Plan")]
    #[case("Gazette | Local Council Approves New Park Plan", "Local Council Approves New Park Plan")]
    #[case("Springfield Gazette: Council Approves The New Park Plan", "Council Approves The New Park Plan")]
    #[case("Short - Title", "Short - Title")]
    #[case("A perfectly ordinary title without separators", "A perfectly ordinary title without separators")]
    fn test_extract_article_title(#[case] title: &str, #[case] expected: &str) {
        let doc = Document::parse(&format!("<title>{title}</title><p>x</p>")).unwrap();
        assert_eq!(extract_article_title(&doc), expected);
    }

    #[test]
    fn test_extract_article_title_uses_single_h1_for_short_titles() {
        let doc = Document::parse("<title>Home</title><h1>The Real Headline Of This Article</h1>").unwrap();
        assert_eq!(extract_article_title(&doc), "The Real Headline Of This Article");

        let doc = Document::parse("<title>Home</title><h1>One Two Three Four Five</h1><h1>Other</h1>").unwrap();
        assert_eq!(extract_article_title(&doc), "Home");
    }

    #[test]
    fn test_glue_document() {
        let mut doc = Document::parse("<html><body><p>old</p></body></html>").unwrap();
        let article = doc.create_element("div");
        let config = ReadabilityConfig::default();
        glue_document(&mut doc, "Some title", article, &config);

        let head = doc.head().unwrap();
        assert_eq!(doc.children_by_tag_name(head, "style").len(), 1);

        let overlay = doc.element_by_id(OVERLAY_DIV_ID).unwrap();
        assert_eq!(doc.class(overlay), "style-newspaper");
        assert_eq!(doc.parent(overlay), doc.body());
        let inner = doc.element_by_id(INNER_DIV_ID).unwrap();
        assert_eq!(doc.class(inner), "margin-wide size-medium");
        assert_eq!(doc.element_children(inner).len(), 2);
        assert!(!doc.inner_text(doc.body().unwrap()).contains("old"));
        assert_eq!(doc.id(article), CONTENT_DIV_ID);
    }

    #[test]
    fn test_glue_document_without_stylesheet_or_title() {
        let mut doc = Document::new();
        let article = doc.create_element("div");
        let config = ReadabilityConfig::builder().include_stylesheet(false).build();
        glue_document(&mut doc, "", article, &config);

        assert_eq!(doc.count_elements_by_tag_name(doc.head().unwrap(), "style"), 0);
        let inner = doc.element_by_id(INNER_DIV_ID).unwrap();
        assert_eq!(doc.element_children(inner), vec![article]);
    }

    #[test]
    fn test_transcode_article() {
        let request = TranscodeRequest::new(article_page())
            .with_url("http://gazette.example.com/news/park.html")
            .with_params(DomSerializationParams::plain());
        let result = ReadabilityTranscoder::new().transcode(&request).unwrap();

        assert!(result.content_extracted);
        assert_eq!(result.title.as_deref(), Some("Local Council Approves New Park Plan"));
        let content = result.content.unwrap();
        assert!(content.contains("rail yard"));
        assert!(content.contains(r#"id="readOverlay""#));
        assert!(content.contains(r#"href="http://gazette.example.com/docs/plan.pdf""#));
        assert!(content.contains(r#"src="http://gazette.example.com/news/images/park.jpg""#));
        assert!(!content.contains("Subscribe"));
        assert!(!content.contains("Copyright"));
        assert!(!content.contains("trackVisit"));
    }

    #[test]
    fn test_transcode_retries_with_relaxed_flags() {
        let html = format!(r#"<div class="comments"><p>{PARAGRAPH}</p><p>{PARAGRAPH}</p></div>"#);
        let result = ReadabilityTranscoder::new().transcode(&TranscodeRequest::new(html)).unwrap();
        assert!(result.content_extracted);
        assert!(result.content.unwrap().contains("rail yard"));
    }

    #[test]
    fn test_transcode_rejects_empty_input() {
        let err = ReadabilityTranscoder::new().transcode(&TranscodeRequest::new("")).unwrap_err();
        assert!(matches!(err, PerlegoError::EmptyInput(_)));
    }

    #[test]
    fn test_transcode_unreadable_markup() {
        let request = TranscodeRequest::new("<p>text</p><!-- never closed");
        let result = ReadabilityTranscoder::new().transcode(&request).unwrap();
        assert!(!result.content_extracted);
        assert!(result.content.is_none());
    }

    #[test]
    fn test_transcode_page_without_text() {
        let result = ReadabilityTranscoder::new().transcode(&TranscodeRequest::new("<html><body></body></html>")).unwrap();
        assert!(!result.content_extracted);
        assert_eq!(result.title.as_deref(), Some(""));
        assert!(result.content.unwrap().contains("readInner"));
    }

    #[test]
    fn test_transcode_applies_transformers() {
        let html = format!(
            r#"<div id="story"><p>{PARAGRAPH}</p><p>{PARAGRAPH} <a href="some_article.html">more</a></p><p><img src="pic.png"> {PARAGRAPH}</p></div>"#
        );
        let transcoder = ReadabilityTranscoder::new()
            .with_anchor_href_transformer(|input| {
                AttributeTransformationResult::new(format!("http://redirector.com/?u={}", input.attribute_value))
                    .with_original_value_attribute("orighref")
            })
            .with_image_src_transformer(|input| {
                AttributeTransformationResult::new(format!("http://proxy.com/?img={}", input.attribute_value))
                    .with_original_value_attribute("origsrc")
            });
        let request = TranscodeRequest::new(html).with_url("http://example.com/");
        let content = transcoder.transcode(&request).unwrap().content.unwrap();

        assert!(content.contains(r#"href="http://redirector.com/?u=http://example.com/some_article.html""#));
        assert!(content.contains(r#"orighref="http://example.com/some_article.html""#));
        assert!(content.contains(r#"src="http://proxy.com/?img=http://example.com/pic.png""#));
        assert!(content.contains(r#"origsrc="http://example.com/pic.png""#));
    }

    #[test]
    fn test_transcode_detects_next_page() {
        let html = format!(
            r#"<div id="story"><p>{PARAGRAPH}</p><p>{PARAGRAPH}</p></div>
               <div class="pager-links"><a href="/story/2" class="next">Next page</a></div>"#
        );
        let request = TranscodeRequest::new(html).with_url("http://example.com/story/1");
        let result = ReadabilityTranscoder::new().transcode(&request).unwrap();
        assert_eq!(result.next_page_url.as_deref(), Some("http://example.com/story/2"));
    }

    #[test]
    fn test_transcode_deeply_nested_markup() {
        let html = format!("<div>{}<p>{PARAGRAPH}</p></div>", "<span>".repeat(20_000));
        let result = ReadabilityTranscoder::new().transcode(&TranscodeRequest::new(html)).unwrap();
        assert!(result.content.unwrap().contains("readInner"));
    }
}
