//! Document clean-up that runs before candidate scoring.
//!
//! [`prepare_document`] normalizes the raw parse: it guarantees an `html`
//! root with a `body`, drops scripts and stylesheets, unwraps `noscript`,
//! turns `<br><br>` runs into paragraphs and `font` into `span`.
//! [`strip_unlikely_candidates`] and [`collapse_redundant_paragraph_divs`]
//! then remove page chrome and flatten wrapper divs.
//!
//! # Example
//!
//! ```rust
//! use perlego_core::{Document, Patterns};
//! use perlego_core::preprocess::prepare_document;
//!
//! let mut doc = Document::parse("<p>one<br><br>two<script>x()</script>").unwrap();
//! prepare_document(&mut doc, &Patterns::default());
//! let body = doc.body().unwrap();
//! assert_eq!(doc.count_elements_by_tag_name(body, "script"), 0);
//! assert_eq!(doc.count_elements_by_tag_name(body, "br"), 0);
//! assert_eq!(doc.count_elements_by_tag_name(body, "p"), 2);
//! ```

use tracing::debug;

use crate::constants::{DIV_TO_P_ELEMENTS, Patterns, READABILITY_STYLED_CLASS};
use crate::dom_tree::{Document, NodeId};
use crate::scoring::link_density;
use crate::sgml::html_dtd;

/// Makes sure the document has an `html` root and a `body`, creating them when missing.
///
/// Returns `(root, body)`.
pub fn ensure_root_and_body(doc: &mut Document) -> (NodeId, NodeId) {
    let root = match doc.root() {
        Some(root) => root,
        None => {
            let root = doc.create_element("html");
            let document_node = doc.document_node();
            doc.append_child(document_node, root);
            root
        }
    };
    let body = match doc.body() {
        Some(body) => body,
        None => {
            let body = doc.create_element("body");
            doc.append_child(root, body);
            body
        }
    };
    (root, body)
}

/// Normalizes a freshly parsed document before scoring.
pub fn prepare_document(doc: &mut Document, patterns: &Patterns) {
    let (root, body) = ensure_root_and_body(doc);

    remove_scripts_and_stylesheets(doc, root, patterns);

    for noscript in doc.elements_by_tag_name(root, "noscript") {
        doc.unwrap_node(noscript);
    }

    replace_double_breaks(doc, body);

    for font in doc.elements_by_tag_name(root, "font") {
        doc.rename(font, "span");
        doc.clear_attrs(font);
    }
}

/// Removes scripts, styles and stylesheet links, keeping readability's own assets
fn remove_scripts_and_stylesheets(doc: &mut Document, root: NodeId, patterns: &Patterns) {
    let allowed = |value: Option<&str>| value.is_some_and(|v| patterns.readability_allowlist.is_match(v));

    for node in doc.descendant_elements(root) {
        let remove = match doc.tag_name(node).unwrap_or_default() {
            "script" => !allowed(doc.attr(node, "src")),
            "style" => true,
            "link" => {
                doc.attr(node, "rel").is_some_and(|rel| rel.trim().eq_ignore_ascii_case("stylesheet"))
                    && !allowed(doc.attr(node, "href"))
            }
            _ => false,
        };
        if remove {
            doc.detach(node);
        }
    }
}

/// Whether `name` may sit inside a paragraph, according to the DTD
///
/// Undeclared elements are treated as inline.
fn is_phrasing(name: &str) -> bool {
    let Ok(dtd) = html_dtd() else { return true };
    if dtd.find_element(name).is_none() {
        return true;
    }
    dtd.find_element("p").is_some_and(|p| p.contains_directly(name))
}

fn is_blank_text(doc: &Document, node: NodeId) -> bool {
    doc.text(node).is_some_and(|t| t.chars().all(|c| matches!(c, ' ' | '\n' | '\r' | '\t')))
}

/// The `br` elements and separating whitespace of a run of two or more breaks starting at `first`.
///
/// Empty when `first` is a lone break.
fn break_run(doc: &Document, first: NodeId) -> Vec<NodeId> {
    let mut run = vec![first];
    let mut whitespace = Vec::new();
    let mut breaks = 1;
    let mut current = doc.next_sibling(first);
    while let Some(node) = current {
        if doc.is_tag(node, "br") {
            run.append(&mut whitespace);
            run.push(node);
            breaks += 1;
        } else if is_blank_text(doc, node) {
            whitespace.push(node);
        } else {
            break;
        }
        current = doc.next_sibling(node);
    }
    if breaks >= 2 { run } else { Vec::new() }
}

/// Turns every run of two or more `<br>` into a paragraph boundary
///
/// The inline content following the run is wrapped in a new `p`. Inside an
/// existing paragraph the new `p` becomes the paragraph's next sibling.
fn replace_double_breaks(doc: &mut Document, body: NodeId) {
    for br in doc.elements_by_tag_name(body, "br") {
        if !doc.is_ancestor_of(body, br) {
            continue;
        }
        let run = break_run(doc, br);
        let (Some(&last), Some(container)) = (run.last(), doc.parent(br)) else { continue };

        let following: Vec<NodeId> = doc.children(container).iter().copied().skip_while(|&n| n != last).skip(1).collect();
        let in_paragraph = container != body && doc.is_tag(container, "p");

        let paragraph = doc.create_element("p");
        if in_paragraph {
            doc.insert_after(container, paragraph);
        } else {
            doc.insert_after(last, paragraph);
        }
        for node in run {
            doc.detach(node);
        }

        for sibling in following {
            if !in_paragraph {
                if doc.is_tag(sibling, "br") && !break_run(doc, sibling).is_empty() {
                    break;
                }
                if let Some(name) = doc.tag_name(sibling)
                    && !is_phrasing(name)
                {
                    break;
                }
            }
            doc.append_child(paragraph, sibling);
        }

        if doc.children(paragraph).is_empty() {
            doc.detach(paragraph);
        }
    }
}

/// Removes page chrome and rewrites text-only `div`s as paragraphs
///
/// With `enabled` set, every element whose class and id match the unlikely
/// pattern (and not the maybe-candidate pattern) is removed with its subtree,
/// as are `nav` elements and link-only lists. The `div` rewriting always runs.
pub fn strip_unlikely_candidates(doc: &mut Document, patterns: &Patterns, enabled: bool) {
    let Some(root) = doc.root() else { return };

    for node in doc.descendant_elements(root) {
        if !doc.is_ancestor_of(root, node) {
            continue;
        }
        let tag = doc.tag_name(node).unwrap_or_default().to_string();

        if enabled {
            let match_string = format!("{} {}", doc.class(node), doc.id(node));
            let maybe_candidate = patterns.maybe_candidate.is_match(&match_string);

            if tag != "body" && patterns.unlikely.is_match(&match_string) && !maybe_candidate {
                debug!(tag = %tag, class_and_id = %match_string.trim(), "removing unlikely candidate");
                doc.detach(node);
                continue;
            }
            if tag == "nav" {
                doc.detach(node);
                continue;
            }
            if (tag == "ul" || tag == "ol") && !maybe_candidate && is_link_list(doc, node) {
                doc.detach(node);
                continue;
            }
        }

        if tag == "div" {
            rewrite_div(doc, node);
        }
    }
}

fn is_link_list(doc: &Document, list: NodeId) -> bool {
    doc.count_elements_by_tag_name(list, "a") >= 3 && link_density(doc, list) >= 0.9
}

/// Renames a `div` without block descendants to `p`, or wraps its loose text in inline paragraphs.
fn rewrite_div(doc: &mut Document, div: NodeId) {
    let has_block = doc
        .descendant_elements(div)
        .into_iter()
        .any(|d| doc.tag_name(d).is_some_and(|name| DIV_TO_P_ELEMENTS.contains(&name)));

    if !has_block {
        doc.rename(div, "p");
        return;
    }

    for child in doc.children(div).to_vec() {
        if doc.text(child).is_some_and(|t| !t.trim().is_empty()) {
            let wrapper = doc.create_element_with_attrs(
                "p",
                vec![
                    ("style".to_string(), "display: inline;".to_string()),
                    ("class".to_string(), READABILITY_STYLED_CLASS.to_string()),
                ],
            );
            doc.replace(child, wrapper);
            doc.append_child(wrapper, child);
        }
    }
}

/// Replaces each `div` whose only content is a single `p` with that `p`.
pub fn collapse_redundant_paragraph_divs(doc: &mut Document) {
    let Some(root) = doc.root() else { return };

    for div in doc.elements_by_tag_name(root, "div") {
        let elements = doc.element_children(div);
        let [paragraph] = elements.as_slice() else { continue };
        if !doc.is_tag(*paragraph, "p") {
            continue;
        }
        if doc.children(div).iter().any(|&c| doc.text(c).is_some_and(|t| !t.trim().is_empty())) {
            continue;
        }
        doc.replace(div, *paragraph);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared(html: &str) -> Document {
        let mut doc = Document::parse(html).unwrap();
        prepare_document(&mut doc, &Patterns::default());
        doc
    }

    fn count(doc: &Document, tag: &str) -> usize {
        doc.count_elements_by_tag_name(doc.document_node(), tag)
    }

    #[test]
    fn test_prepare_document_creates_body() {
        let mut doc = Document::new();
        prepare_document(&mut doc, &Patterns::default());
        assert!(doc.root().is_some_and(|r| doc.is_tag(r, "html")));
        assert!(doc.body().is_some());
    }

    #[test]
    fn test_prepare_document_removes_scripts_and_styles() {
        let doc = prepared(
            r#"<html><head>
                <script type="text/javascript">var a = 1;</script>
                <style type="text/css">p { color: red; }</style>
                <link rel="stylesheet" href="site.css">
                <link rel="alternate" href="feed.xml">
            </head><body><p>text</p><script src="tracker.js"></script></body></html>"#,
        );
        assert_eq!(count(&doc, "script"), 0);
        assert_eq!(count(&doc, "style"), 0);
        assert_eq!(count(&doc, "link"), 1);
    }

    #[test]
    fn test_prepare_document_keeps_readability_assets() {
        let doc = prepared(
            r#"<html><head>
                <script src="readability.js"></script>
                <link rel="Stylesheet" href="/css/readability.css">
            </head><body></body></html>"#,
        );
        assert_eq!(count(&doc, "script"), 1);
        assert_eq!(count(&doc, "link"), 1);
    }

    #[test]
    fn test_prepare_document_unwraps_noscript() {
        let doc = prepared("<html><head></head><noscript><p>Enable JS</p></noscript><body><p>x</p></body></html>");
        assert_eq!(count(&doc, "noscript"), 0);
        let body = doc.body().unwrap();
        assert!(doc.inner_text(body).contains("Enable JS"));
    }

    #[test]
    fn test_prepare_document_replaces_double_breaks() {
        let doc = prepared("<html><body>some text<br/><br/>some other text</body></html>");
        assert_eq!(count(&doc, "p"), 1);
        assert_eq!(count(&doc, "br"), 0);
        let p = doc.elements_by_tag_name(doc.document_node(), "p")[0];
        assert_eq!(doc.inner_text(p), "some other text");
    }

    #[test]
    fn test_double_breaks_with_whitespace_and_inline_run() {
        let doc = prepared("<div>first<br>\n <br> second <b>bold</b><div>block</div></div>");
        let p = doc.elements_by_tag_name(doc.document_node(), "p")[0];
        assert_eq!(doc.inner_text(p), " second bold");
        assert_eq!(doc.children(doc.parent(p).unwrap()).len(), 3);
        assert_eq!(count(&doc, "br"), 0);
    }

    #[test]
    fn test_double_breaks_inside_paragraph_split_it() {
        let doc = prepared("<p>one<br><br>two<br><br>three</p>");
        let body = doc.body().unwrap();
        let paragraphs = doc.children_by_tag_name(body, "p");
        let texts: Vec<String> = paragraphs.iter().map(|&p| doc.inner_text(p)).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_single_break_is_kept() {
        let doc = prepared("<p>one<br>two</p>");
        assert_eq!(count(&doc, "br"), 1);
        assert_eq!(count(&doc, "p"), 1);
    }

    #[test]
    fn test_prepare_document_replaces_font() {
        let doc = prepared(r#"<p><font color="red" size="3">styled</font></p>"#);
        assert_eq!(count(&doc, "font"), 0);
        let span = doc.elements_by_tag_name(doc.document_node(), "span")[0];
        assert!(doc.element(span).unwrap().attrs.is_empty());
        assert_eq!(doc.inner_text(span), "styled");
    }

    #[test]
    fn test_strip_unlikely_candidates() {
        let mut doc = Document::parse(
            r#"<div class="sidebar"><p>remove</p></div>
               <div id="comments" class="main-column"><p>keep</p></div>
               <nav><a href="/">home</a></nav>
               <p>body text</p>"#,
        )
        .unwrap();
        strip_unlikely_candidates(&mut doc, &Patterns::default(), true);
        let text = doc.inner_text(doc.body().unwrap());
        assert!(!text.contains("remove"));
        assert!(text.contains("keep"));
        assert!(!text.contains("home"));
        assert_eq!(count(&doc, "nav"), 0);
    }

    #[test]
    fn test_strip_unlikely_candidates_disabled() {
        let mut doc = Document::parse(r#"<div class="sidebar"><p>kept</p></div>"#).unwrap();
        strip_unlikely_candidates(&mut doc, &Patterns::default(), false);
        assert!(doc.inner_text(doc.body().unwrap()).contains("kept"));
    }

    #[test]
    fn test_link_only_lists_are_removed() {
        let mut doc = Document::parse(
            r#"<ul><li><a href="/1">One</a></li><li><a href="/2">Two</a></li><li><a href="/3">Three</a></li></ul>
               <ol><li>Plain item</li><li>Another <a href="/x">link</a></li></ol>"#,
        )
        .unwrap();
        strip_unlikely_candidates(&mut doc, &Patterns::default(), true);
        assert_eq!(count(&doc, "ul"), 0);
        assert_eq!(count(&doc, "ol"), 1);
    }

    #[test]
    fn test_div_without_blocks_becomes_paragraph() {
        let mut doc = Document::parse("<div>just <em>inline</em> text</div>").unwrap();
        strip_unlikely_candidates(&mut doc, &Patterns::default(), true);
        assert_eq!(count(&doc, "div"), 0);
        assert_eq!(count(&doc, "p"), 1);
    }

    #[test]
    fn test_div_text_nodes_are_wrapped() {
        let mut doc = Document::parse(r#"<div>text node1<a href="/more">Link</a>text node2</div>"#).unwrap();
        strip_unlikely_candidates(&mut doc, &Patterns::default(), true);
        let paragraphs = doc.elements_by_tag_name(doc.document_node(), "p");
        assert_eq!(paragraphs.len(), 2);
        for p in paragraphs {
            assert_eq!(doc.class(p), READABILITY_STYLED_CLASS);
            assert_eq!(doc.style(p), "display: inline;");
        }
    }

    #[test]
    fn test_collapse_redundant_paragraph_divs() {
        let mut doc = Document::parse("<div>\r\n  <p>Some paragraph.</p>\r\n</div>").unwrap();
        collapse_redundant_paragraph_divs(&mut doc);
        let body = doc.body().unwrap();
        assert_eq!(count(&doc, "div"), 0);
        assert_eq!(doc.children_by_tag_name(body, "p").len(), 1);
    }

    #[test]
    fn test_collapse_keeps_div_with_text() {
        let mut doc = Document::parse("<div>loose text<p>Some paragraph.</p></div>").unwrap();
        collapse_redundant_paragraph_divs(&mut doc);
        assert_eq!(count(&doc, "div"), 1);
    }
}
