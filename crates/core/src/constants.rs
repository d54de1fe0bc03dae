//! Heuristic patterns, element ids and the reading stylesheet.

use std::sync::LazyLock;

use regex::Regex;

pub const OVERLAY_DIV_ID: &str = "readOverlay";
pub const INNER_DIV_ID: &str = "readInner";
pub const CONTENT_DIV_ID: &str = "readability-content";
pub const READABILITY_STYLED_CLASS: &str = "readability-styled";

/// Block-level descendants that keep a `div` from being turned into a `p`.
pub const DIV_TO_P_ELEMENTS: &[&str] = &["a", "blockquote", "dl", "div", "img", "ol", "p", "pre", "table", "ul"];

/// Elements whose text makes their ancestors article candidates.
pub const CANDIDATE_SOURCE_ELEMENTS: &[&str] = &["p", "td", "pre"];

/// Regex table driving the extraction heuristics. Every pattern is case-insensitive.
///
/// Entries can be swapped individually:
///
/// ```rust
/// use perlego_core::Patterns;
///
/// let mut patterns = Patterns::default();
/// patterns.unlikely = Patterns::compile("sidebar|promo|newsletter").unwrap();
/// assert!(patterns.unlikely.is_match("Newsletter-Signup"));
/// ```
#[derive(Debug, Clone)]
pub struct Patterns {
    pub unlikely: Regex,
    pub maybe_candidate: Regex,
    pub positive: Regex,
    pub negative: Regex,
    pub extraneous: Regex,
    pub next_link: Regex,
    pub prev_link: Regex,
    pub videos: Regex,
    pub readability_allowlist: Regex,
}

impl Patterns {
    /// Compiles `pattern` case-insensitively.
    pub fn compile(pattern: &str) -> Result<Regex, regex::Error> {
        Regex::new(&format!("(?i){pattern}"))
    }
}

static DEFAULT_PATTERNS: LazyLock<Patterns> = LazyLock::new(|| Patterns {
    unlikely: Patterns::compile(
        "combx|comment|community|disqus|extra|foot|header|menu|remark|rss|shoutbox|sidebar|sponsor|ad-break|agegate|pagination|pager|popup",
    )
    .expect("unlikely regex"),
    maybe_candidate: Patterns::compile("and|article|body|column|main|shadow").expect("maybe-candidate regex"),
    positive: Patterns::compile("article|body|content|entry|hentry|main|page|pagination|post|text|blog|story")
        .expect("positive regex"),
    negative: Patterns::compile(
        "combx|comment|com-|contact|foot|footer|footnote|masthead|media|meta|outbrain|promo|related|scroll|shoutbox|sidebar|sponsor|shopping|tags|tool|widget",
    )
    .expect("negative regex"),
    extraneous: Patterns::compile("print|archive|comment|discuss|e[-]?mail|share|reply|all|login|sign|single")
        .expect("extraneous regex"),
    next_link: Patterns::compile(r"(next|weiter|continue|>([^\|]|$)|»([^\|]|$))").expect("next link regex"),
    prev_link: Patterns::compile(r"(prev|earl|old|new|<|«)").expect("previous link regex"),
    videos: Patterns::compile(r"http://(www\.)?(youtube|vimeo)\.com").expect("videos regex"),
    readability_allowlist: Patterns::compile("readability").expect("readability regex"),
});

impl Default for Patterns {
    fn default() -> Self {
        DEFAULT_PATTERNS.clone()
    }
}

pub(crate) static NORMALIZE_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").expect("spaces regex"));
pub(crate) static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.( |$)").expect("sentence regex"));
pub(crate) static PAGE_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)pag(e|ing|inat)").expect("page regex"));
pub(crate) static FIRST_OR_LAST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(first|last)").expect("first/last regex"));
pub(crate) static PAGE_IN_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)p(a|g|ag)?(e|ing|ination)?(=|/)[0-9]{1,2}|(page|paging)").expect("page url regex")
});
pub(crate) static PAGE_NUMBER_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)((_|-)?p[a-z]*|(_|-))[0-9]{1,2}$").expect("page suffix regex"));
pub(crate) static SHORT_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{1,2}$").expect("number regex"));

/// Stylesheet injected by the glue step when enabled.
pub const READABILITY_STYLESHEET: &str = r#"
#readOverlay { display: block; position: absolute; top: 0; left: 0; width: 100%; }
#readInner { line-height: 1.4em; max-width: 800px; margin: 1em auto; }
#readInner a { color: #039; text-decoration: none; }
#readInner a:hover { text-decoration: underline; }
#readInner img { float: left; clear: both; margin: 0 12px 12px 0; }
#readInner h1 { display: block; width: 100%; border-bottom: 1px solid #333; font-size: 1.2em; padding-bottom: .5em; margin-bottom: .75em; }
#readInner blockquote { margin-left: 3em; margin-right: 3em; }
.page-separator { clear: both; display: block; font-size: 85%; text-align: center; }
.style-newspaper { font-family: Georgia, "Times New Roman", serif; background: #fbfbfb; color: #080000; }
.style-novel { font-family: "Palatino Linotype", "Book Antiqua", Palatino, serif; background: #f4eed9; color: #1d1916; }
.style-ebook { font-family: Arial, Helvetica, sans-serif; background: #edebe8; color: #2c2d32; }
.style-terminal { font-family: "Lucida Console", Monaco, monospace; background: #1d4e2c; color: #c6ffc6; }
.style-apertura { font-family: "Helvetica Neue", Helvetica, Arial, sans-serif; background: #2d2d2d; color: #e5e5e5; }
.style-athelas { font-family: Athelas, Palatino, Georgia, serif; background: #fcfcfc; color: #333; }
.margin-extra-narrow { width: 95% !important; }
.margin-narrow { width: 85% !important; }
.margin-medium { width: 75% !important; }
.margin-wide { width: 55% !important; }
.margin-extra-wide { width: 35% !important; }
.size-extra-small { font-size: 12px; }
.size-small { font-size: 14px; }
.size-medium { font-size: 16px; }
.size-large { font-size: 20px; }
.size-extra-large { font-size: 24px; }
"#;
