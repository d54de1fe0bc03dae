//! HTML parsing into the arena DOM.
//!
//! [`Document::parse`] drives the DTD-aware [`SgmlReader`] and builds a
//! [`Document`] from its events. The reader already balances the markup, so
//! the builder only has to follow the start and end events.
//!
//! # Example
//!
//! ```rust
//! use perlego_core::Document;
//!
//! let doc = Document::parse("<title>Test</title><p>Hello").unwrap();
//! assert_eq!(doc.title(), Some("Test".to_string()));
//! let body = doc.body().unwrap();
//! assert_eq!(doc.elements_by_tag_name(body, "p").len(), 1);
//! ```

use tracing::warn;

use crate::dom_tree::{Document, NodeId};
use crate::sgml::{Event, SgmlReader, html_dtd};
use crate::Result;

impl Document {
    /// Parses HTML into a document.
    ///
    /// Empty or whitespace-only input yields a document without a root.
    /// Anything after the last `</html>` is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PerlegoError::Sgml`] when the markup cannot be read.
    /// An unexpected end of input is retried once with every `<script>`
    /// span removed before it is reported.
    ///
    /// # Example
    ///
    /// ```rust
    /// use perlego_core::Document;
    ///
    /// let doc = Document::parse("<p>one<p>two").unwrap();
    /// let body = doc.body().unwrap();
    /// assert_eq!(doc.children_by_tag_name(body, "p").len(), 2);
    /// ```
    pub fn parse(html: &str) -> Result<Self> {
        if html.trim().is_empty() {
            return Ok(Document::new());
        }
        let html = trim_after_html_end(html);

        match build_document(html) {
            Ok(doc) => Ok(doc),
            Err(err) if err.is_unexpected_eof() => {
                warn!(error = %err, "unexpected end of markup, retrying without script tags");
                Ok(build_document(&remove_script_tags(html))?)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Parses an HTML fragment.
    ///
    /// Returns the parsed document together with the top-level fragment
    /// nodes: the children of `body`, or of the root when there is no body.
    pub fn parse_fragment(html: &str) -> Result<(Self, Vec<NodeId>)> {
        let doc = Document::parse(html)?;
        let nodes = match doc.body().or_else(|| doc.root()) {
            Some(container) => doc.children(container).to_vec(),
            None => Vec::new(),
        };
        Ok((doc, nodes))
    }
}

/// Drops anything after the last `</html...>` tag.
fn trim_after_html_end(html: &str) -> &str {
    let lower = html.to_ascii_lowercase();
    let Some(start) = lower.rfind("</html") else { return html };
    match lower[start..].find('>') {
        Some(offset) => &html[..start + offset + 1],
        None => html,
    }
}

fn build_document(html: &str) -> std::result::Result<Document, crate::error::SgmlError> {
    let dtd = html_dtd()?;
    let mut reader = SgmlReader::new(html, dtd);
    let mut doc = Document::new();
    let mut open = vec![doc.document_node()];

    while let Some(event) = reader.read_event()? {
        let parent = open.last().copied().unwrap_or(doc.document_node());
        match event {
            Event::StartTag { name, attrs } => {
                let element = doc.create_element_with_attrs(&name, attrs);
                doc.append_child(parent, element);
                open.push(element);
            }
            Event::EndTag { .. } => {
                if open.len() > 1 {
                    open.pop();
                }
            }
            Event::Text(text) => append_text(&mut doc, parent, text),
            Event::Comment(comment) => {
                let node = doc.create_comment(comment);
                doc.append_child(parent, node);
            }
            Event::MergeAttributes { name, attrs } => {
                let target = match name.as_str() {
                    "html" => doc.root(),
                    "head" => doc.head(),
                    _ => doc.body(),
                };
                if let Some(target) = target {
                    doc.merge_attrs(target, attrs);
                }
            }
        }
    }
    Ok(doc)
}

/// Appends text, joining it with a directly preceding text node.
fn append_text(doc: &mut Document, parent: NodeId, text: String) {
    if let Some(&last) = doc.children(parent).last()
        && let Some(existing) = doc.text(last)
    {
        let joined = format!("{existing}{text}");
        doc.set_text(last, joined);
        return;
    }
    let node = doc.create_text(text);
    doc.append_child(parent, node);
}

/// Removes every `<script ...>...</script>` span, tags included.
///
/// Matching is case-insensitive. A script that is never closed removes
/// everything from its start tag to the end of the input.
///
/// ```rust
/// use perlego_core::parse::remove_script_tags;
///
/// assert_eq!(remove_script_tags("a<SCRIPT>x()</script>b"), "ab");
/// assert_eq!(remove_script_tags("a<script>never closed"), "a");
/// ```
pub fn remove_script_tags(html: &str) -> String {
    const OPEN: &str = "<script";
    const CLOSE: &str = "</script>";

    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(start) = lower[pos..].find(OPEN).map(|i| pos + i) {
        out.push_str(&html[pos..start]);
        match lower[start..].find(CLOSE) {
            Some(end) => pos = start + end + CLOSE.len(),
            None => return out,
        }
    }
    out.push_str(&html[pos..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SAMPLE_HTML: &str = r#"
        <!DOCTYPE html>
        <html lang="en">
        <head>
            <meta charset="UTF-8">
            <title>Test Page</title>
        </head>
        <body class="home">
            <h1>Heading</h1>
            <p class="content">Paragraph 1</p>
            <p class="content">Paragraph 2</p>
            <a href="https://example.com">Link</a>
        </body>
        </html>
        <script>trailing()</script>
    "#;

    #[test]
    fn test_parse_document() {
        let doc = Document::parse(SAMPLE_HTML).unwrap();
        assert_eq!(doc.title(), Some("Test Page".to_string()));
        let root = doc.root().unwrap();
        assert_eq!(doc.attr(root, "lang"), Some("en"));
        assert_eq!(doc.class(doc.body().unwrap()), "home");
    }

    #[test]
    fn test_content_after_html_end_is_dropped() {
        let doc = Document::parse(SAMPLE_HTML).unwrap();
        let root = doc.root().unwrap();
        assert_eq!(doc.count_elements_by_tag_name(root, "script"), 0);
    }

    #[test]
    fn test_empty_input_has_no_root() {
        assert!(Document::parse("").unwrap().root().is_none());
        assert!(Document::parse(" \n\t").unwrap().root().is_none());
    }

    #[test]
    fn test_implicit_paragraph_closing() {
        let doc = Document::parse("<p>a<p>b").unwrap();
        let body = doc.body().unwrap();
        let paragraphs = doc.children_by_tag_name(body, "p");
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(doc.inner_text(paragraphs[1]), "b");
    }

    #[test]
    fn test_repeated_body_merges_attributes() {
        let doc = Document::parse("<body id=a>x<body class=c id=b>y").unwrap();
        let body = doc.body().unwrap();
        assert_eq!(doc.id(body), "a");
        assert_eq!(doc.class(body), "c");
        assert_eq!(doc.inner_text(body), "xy");
    }

    #[test]
    fn test_adjacent_text_is_joined() {
        let doc = Document::parse("<div>a</span>b</div>").unwrap();
        let div = doc.elements_by_tag_name(doc.document_node(), "div")[0];
        assert_eq!(doc.children(div).len(), 1);
    }

    #[test]
    fn test_comments_are_kept() {
        let doc = Document::parse("<!-- top --><p>x<!-- inner --></p>").unwrap();
        let top = doc.children(doc.document_node())[0];
        assert!(matches!(doc.data(top), crate::dom_tree::NodeData::Comment(c) if c == " top "));
    }

    #[test]
    fn test_unterminated_script_is_retried() {
        let doc = Document::parse("<p>Kept text</p><script>var broken = 1;").unwrap();
        let body = doc.body().unwrap();
        assert_eq!(doc.inner_text(body), "Kept text");
        assert_eq!(doc.count_elements_by_tag_name(body, "script"), 0);
    }

    #[test]
    fn test_unterminated_comment_is_an_error() {
        let err = Document::parse("<p>a</p><!-- never closed").unwrap_err();
        assert!(err.is_unexpected_eof());
    }

    #[test]
    fn test_parse_fragment() {
        let (doc, nodes) = Document::parse_fragment("<p>one</p>two<b>three</b>").unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(doc.tag_name(nodes[0]), Some("p"));
        assert_eq!(doc.text(nodes[1]), Some("two"));

        let (_, empty) = Document::parse_fragment("").unwrap();
        assert!(empty.is_empty());
    }

    #[rstest]
    #[case("", "")]
    #[case("<html></html>", "<html></html>")]
    #[case("<html><script></script></html>", "<html></html>")]
    #[case("<html><script type=\"text/javascript\">\nvar a = 1;\nvar b = 2;\n</script></html>", "<html></html>")]
    #[case("<html><SCRIPT>a</Script><p>x</p><script src=\"b.js\"></script></html>", "<html><p>x</p></html>")]
    #[case("<html><p>x</p><script>never closed", "<html><p>x</p>")]
    fn test_remove_script_tags(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(remove_script_tags(input), expected);
    }
}
