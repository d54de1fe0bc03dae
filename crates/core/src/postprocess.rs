//! Clean-up of the extracted article container.
//!
//! [`prepare_article_content_element`] strips presentational leftovers and
//! page furniture that survived extraction: inline styles, repeated breaks,
//! forms, non-video embeds, redundant headers and link-heavy blocks.

use tracing::debug;

use crate::constants::{Patterns, READABILITY_STYLED_CLASS};
use crate::dom_tree::{Document, NodeId};
use crate::scoring::{CandidateScores, ScoringContext, link_density, normalized_inner_text};

/// Post-process the article container in place
///
/// `scores` are the candidate scores from extraction; they feed the
/// conditional cleaning, which only runs when `clean_conditionally` is set.
pub fn prepare_article_content_element(
    doc: &mut Document, article: NodeId, ctx: &ScoringContext<'_>, scores: &CandidateScores, clean_conditionally: bool,
) {
    clean_styles(doc, article);
    kill_breaks(doc, article);

    clean(doc, article, "form", ctx.patterns);
    clean(doc, article, "object", ctx.patterns);
    for header in ["h1", "h2"] {
        if doc.count_elements_by_tag_name(article, header) == 1 {
            clean(doc, article, header, ctx.patterns);
        }
    }
    clean(doc, article, "iframe", ctx.patterns);

    clean_headers(doc, article, ctx);

    if clean_conditionally {
        for tag in ["table", "ul", "div"] {
            clean_conditionally_by_tag(doc, article, tag, ctx, scores);
        }
    }

    remove_empty_paragraphs(doc, article);
    remove_breaks_before_paragraphs(doc, article);
}

/// Drops inline `style` attributes except on elements we styled ourselves
fn clean_styles(doc: &mut Document, article: NodeId) {
    for node in std::iter::once(article).chain(doc.descendant_elements(article)) {
        if doc.class(node) != READABILITY_STYLED_CLASS {
            doc.set_style(node, None);
        }
    }
}

fn is_break_filler(doc: &Document, node: NodeId) -> bool {
    doc.text(node).is_some_and(|t| t.chars().all(|c| c.is_whitespace() || c == '\u{a0}'))
}

/// Collapses runs of `<br>` (with only whitespace between them) into a single break
fn kill_breaks(doc: &mut Document, article: NodeId) {
    for br in doc.elements_by_tag_name(article, "br") {
        if !doc.is_ancestor_of(article, br) {
            continue;
        }
        let mut filler = Vec::new();
        let mut current = doc.next_sibling(br);
        while let Some(node) = current {
            current = doc.next_sibling(node);
            if doc.is_tag(node, "br") {
                for removed in filler.drain(..).chain(std::iter::once(node)) {
                    doc.detach(removed);
                }
            } else if is_break_filler(doc, node) {
                filler.push(node);
            } else {
                break;
            }
        }
    }
}

/// Removes every `tag` element, keeping embeds that point at a known video host
fn clean(doc: &mut Document, article: NodeId, tag: &str, patterns: &Patterns) {
    let is_embed = matches!(tag, "object" | "embed" | "iframe");

    for node in doc.elements_by_tag_name(article, tag) {
        if is_embed
            && (patterns.videos.is_match(&doc.attributes_string(node, "|"))
                || patterns.videos.is_match(&doc.inner_html(node)))
        {
            continue;
        }
        doc.detach(node);
    }
}

/// Removes `h1`/`h2` headers that look like chrome: negative class weight or mostly links
fn clean_headers(doc: &mut Document, article: NodeId, ctx: &ScoringContext<'_>) {
    for tag in ["h1", "h2"] {
        for header in doc.elements_by_tag_name(article, tag) {
            if ctx.class_weight(doc, header) < 0.0 || link_density(doc, header) > 0.33 {
                doc.detach(header);
            }
        }
    }
}

/// Removes `tag` elements that look fishy, walking backwards through the article
///
/// An element goes when its class weight plus candidate score is negative, or
/// when it has fewer than ten comma-separated segments and one of the
/// following holds:
/// - More images than paragraphs
/// - More list items (minus 100) than paragraphs, unless it is a list itself
/// - More inputs than a third of its paragraphs
/// - Under 25 characters with no images or more than two
/// - Weak class weight with link density above 0.2, strong with above 0.5
/// - A single non-video embed with little text, or several embeds
fn clean_conditionally_by_tag(
    doc: &mut Document, article: NodeId, tag: &str, ctx: &ScoringContext<'_>, scores: &CandidateScores,
) {
    let mut nodes = doc.elements_by_tag_name(article, tag);
    nodes.reverse();

    for node in nodes {
        if !doc.is_ancestor_of(article, node) {
            continue;
        }

        let weight = ctx.class_weight(doc, node);
        let score = scores.score(node);
        if weight + score < 0.0 {
            debug!(tag, weight, score, "removing negatively scored element");
            doc.detach(node);
            continue;
        }

        let text = normalized_inner_text(doc, node);
        if text.split(',').count() >= 10 {
            continue;
        }

        let paragraphs = doc.count_elements_by_tag_name(node, "p");
        let images = doc.count_elements_by_tag_name(node, "img");
        let list_items = doc.count_elements_by_tag_name(node, "li") as i64 - 100;
        let inputs = doc.count_elements_by_tag_name(node, "input");
        let embeds = doc
            .elements_by_tag_name(node, "embed")
            .into_iter()
            .filter(|&e| !doc.attr(e, "src").is_some_and(|src| ctx.patterns.videos.is_match(src)))
            .count();
        let density = link_density(doc, node);
        let length = text.chars().count();

        let remove = images > paragraphs
            || (list_items > paragraphs as i64 && tag != "ul" && tag != "ol")
            || inputs > paragraphs / 3
            || (length < 25 && (images == 0 || images > 2))
            || (weight < 25.0 && density > 0.2)
            || (weight >= 25.0 && density > 0.5)
            || (embeds == 1 && length < 75)
            || embeds > 1;

        if remove {
            debug!(tag, paragraphs, images, inputs, density, length, "removing fishy element");
            doc.detach(node);
        }
    }
}

/// Removes paragraphs with no text and no media
fn remove_empty_paragraphs(doc: &mut Document, article: NodeId) {
    for p in doc.elements_by_tag_name(article, "p") {
        let has_media = ["img", "embed", "object"].iter().any(|tag| doc.count_elements_by_tag_name(p, tag) > 0);
        if !has_media && normalized_inner_text(doc, p).is_empty() {
            doc.detach(p);
        }
    }
}

/// Removes a `<br>` that is directly followed (whitespace aside) by a `<p>`
fn remove_breaks_before_paragraphs(doc: &mut Document, article: NodeId) {
    for br in doc.elements_by_tag_name(article, "br") {
        let mut current = doc.next_sibling(br);
        while let Some(node) = current {
            if doc.text(node).is_some_and(|t| t.trim().is_empty()) {
                current = doc.next_sibling(node);
                continue;
            }
            if doc.is_tag(node, "p") {
                doc.detach(br);
            }
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG: &str = "A reasonably long paragraph of article text, which keeps going for a while so that it counts.";

    fn processed(inner: &str, clean_conditionally: bool) -> (Document, NodeId) {
        let mut doc = Document::parse(&format!("<div id=readability-content>{inner}</div>")).unwrap();
        let article = doc.element_by_id("readability-content").unwrap();
        let patterns = Patterns::default();
        let ctx = ScoringContext::new(&patterns, true);
        prepare_article_content_element(&mut doc, article, &ctx, &CandidateScores::new(), clean_conditionally);
        (doc, article)
    }

    fn count(doc: &Document, article: NodeId, tag: &str) -> usize {
        doc.count_elements_by_tag_name(article, tag)
    }

    #[test]
    fn test_styles_removed_except_readability_styled() {
        let (doc, article) = processed(
            r#"<p style="color: red">red</p><p style="display: inline;" class="readability-styled">kept</p>"#,
            false,
        );
        let paragraphs = doc.elements_by_tag_name(article, "p");
        assert_eq!(doc.attr(paragraphs[0], "style"), None);
        assert_eq!(doc.style(paragraphs[1]), "display: inline;");
    }

    #[test]
    fn test_break_runs_collapse() {
        let (doc, article) = processed("<p>one<br>  <br>\n<br>two<br>three</p>", false);
        assert_eq!(count(&doc, article, "br"), 2);
    }

    #[test]
    fn test_forms_and_plain_embeds_removed() {
        let (doc, article) = processed(
            r#"<p>text</p><form><input></form>
               <iframe src="http://ads.example.com/banner"></iframe>
               <iframe src="http://www.youtube.com/embed/abc"></iframe>
               <object data="http://vimeo.com/123"></object>"#,
            false,
        );
        assert_eq!(count(&doc, article, "form"), 0);
        assert_eq!(count(&doc, article, "iframe"), 1);
        assert_eq!(count(&doc, article, "object"), 1);
    }

    #[test]
    fn test_single_headers_removed() {
        let (doc, article) = processed("<h1>Title</h1><h2>One</h2><h2>Two</h2><p>text</p>", false);
        assert_eq!(count(&doc, article, "h1"), 0);
        assert_eq!(count(&doc, article, "h2"), 2);
    }

    #[test]
    fn test_link_heavy_headers_removed() {
        let (doc, article) = processed(
            r#"<h2><a href="/x">All links here</a></h2><h2 class="sidebar">Aside</h2><h2>Real subheading</h2><p>t</p>"#,
            false,
        );
        let headers = doc.elements_by_tag_name(article, "h2");
        assert_eq!(headers.len(), 1);
        assert_eq!(doc.inner_text(headers[0]), "Real subheading");
    }

    #[test]
    fn test_clean_conditionally_removes_link_blocks() {
        let inner = format!(
            r#"<div><p>{LONG}</p></div><div><a href="/1">Related one</a> <a href="/2">Related two</a> x</div>"#
        );
        let (doc, article) = processed(&inner, true);
        let text = doc.inner_text(article);
        assert!(text.contains("reasonably long"));
        assert!(!text.contains("Related"));
    }

    #[test]
    fn test_clean_conditionally_disabled() {
        let (doc, article) = processed(r#"<div><a href="/1">Related one</a> <a href="/2">Related two</a></div>"#, false);
        assert!(doc.inner_text(article).contains("Related"));
    }

    #[test]
    fn test_clean_conditionally_removes_image_galleries() {
        let inner = format!(r#"<div><p>{LONG}</p></div><div><img src="a.jpg"><img src="b.jpg"><p>{LONG}</p></div>"#);
        let (doc, article) = processed(&inner, true);
        assert_eq!(count(&doc, article, "img"), 0);
        assert_eq!(count(&doc, article, "p"), 1);
    }

    #[test]
    fn test_empty_paragraphs_removed() {
        let (doc, article) = processed(r#"<p>  </p><p><img src="a.jpg"></p><p>text</p>"#, false);
        assert_eq!(count(&doc, article, "p"), 2);
    }

    #[test]
    fn test_break_before_paragraph_removed() {
        let (doc, article) = processed("<div>text<br> <p>para</p></div>", false);
        assert_eq!(count(&doc, article, "br"), 0);
    }
}
