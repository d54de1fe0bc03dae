use std::collections::HashMap;

use crate::constants::{NORMALIZE_SPACES, Patterns};
use crate::dom_tree::{Document, NodeId};

/// Positive or negative adjustment applied for a class or id pattern match
pub const CLASS_WEIGHT: f64 = 25.0;

/// Inner text of `node`, trimmed, with runs of two or more whitespace characters collapsed into one space
///
/// Every length and density measurement uses this form of the text.
pub fn normalized_inner_text(doc: &Document, node: NodeId) -> String {
    let text = doc.inner_text(node);
    NORMALIZE_SPACES.replace_all(text.trim(), " ").into_owned()
}

/// Initial score for a freshly discovered candidate based on its tag name
///
/// - DIV: +5 (generic container)
/// - PRE, TD, BLOCKQUOTE: +3 (content elements)
/// - ADDRESS, OL, UL, DL, DD, DT, LI, FORM: -3 (list/metadata elements)
/// - H1-H6, TH: -5 (headers)
pub fn base_tag_score(tag_name: &str) -> f64 {
    match tag_name {
        "div" => 5.0,
        "pre" | "td" | "blockquote" => 3.0,
        "address" | "ol" | "ul" | "dl" | "dd" | "dt" | "li" | "form" => -3.0,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "th" => -5.0,
        _ => 0.0,
    }
}

/// Score contributed by one paragraph-like element to its ancestors
///
/// One point for existing, one per comma-separated segment, and one per hundred
/// characters up to three.
pub fn paragraph_score(text: &str) -> f64 {
    let segments = text.split(',').count();
    let length_bonus = (text.chars().count() / 100).min(3);
    (1 + segments + length_bonus) as f64
}

/// Calculate the link density of an element
///
/// Link density is the ratio of anchor text characters to total text characters.
/// Returns a value from 0.0 (no links or no text) to 1.0 (all text is in links).
pub fn link_density(doc: &Document, node: NodeId) -> f64 {
    let text_length = normalized_inner_text(doc, node).chars().count();
    if text_length == 0 {
        return 0.0;
    }
    let link_length: usize = doc
        .elements_by_tag_name(node, "a")
        .into_iter()
        .map(|a| normalized_inner_text(doc, a).chars().count())
        .sum();
    link_length as f64 / text_length as f64
}

/// Class and id weighting shared by candidate scoring and content cleaning
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub patterns: &'a Patterns,
    pub weight_classes: bool,
}

impl<'a> ScoringContext<'a> {
    pub fn new(patterns: &'a Patterns, weight_classes: bool) -> Self {
        Self { patterns, weight_classes }
    }

    /// Calculate the class/ID weight adjustment for an element
    ///
    /// The class and the id are checked separately; each adds [`CLASS_WEIGHT`]
    /// on a positive match and subtracts it on a negative one. Always 0 when
    /// class weighting is switched off.
    pub fn class_weight(&self, doc: &Document, node: NodeId) -> f64 {
        if !self.weight_classes {
            return 0.0;
        }
        let mut weight = 0.0;
        for value in [doc.class(node), doc.id(node)] {
            if value.is_empty() {
                continue;
            }
            if self.patterns.negative.is_match(value) {
                weight -= CLASS_WEIGHT;
            }
            if self.patterns.positive.is_match(value) {
                weight += CLASS_WEIGHT;
            }
        }
        weight
    }

    /// Starting score of a candidate: tag score plus class weight
    pub fn initial_score(&self, doc: &Document, node: NodeId) -> f64 {
        base_tag_score(doc.tag_name(node).unwrap_or_default()) + self.class_weight(doc, node)
    }
}

/// Scores of article candidates, remembering the order they were discovered in
#[derive(Debug, Clone, Default)]
pub struct CandidateScores {
    order: Vec<NodeId>,
    scores: HashMap<NodeId, f64>,
}

impl CandidateScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node: NodeId) -> Option<f64> {
        self.scores.get(&node).copied()
    }

    /// Score of `node`, 0 for elements that never became candidates.
    pub fn score(&self, node: NodeId) -> f64 {
        self.get(node).unwrap_or_default()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.scores.contains_key(&node)
    }

    pub fn set(&mut self, node: NodeId, score: f64) {
        if self.scores.insert(node, score).is_none() {
            self.order.push(node);
        }
    }

    pub fn add(&mut self, node: NodeId, delta: f64) {
        let score = self.score(node) + delta;
        self.set(node, score);
    }

    /// Candidates in discovery order.
    pub fn candidates(&self) -> &[NodeId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn first(doc: &Document, tag: &str) -> NodeId {
        doc.elements_by_tag_name(doc.document_node(), tag)[0]
    }

    #[rstest]
    #[case("div", 5.0)]
    #[case("td", 3.0)]
    #[case("blockquote", 3.0)]
    #[case("li", -3.0)]
    #[case("form", -3.0)]
    #[case("h3", -5.0)]
    #[case("th", -5.0)]
    #[case("span", 0.0)]
    fn test_base_tag_score(#[case] tag: &str, #[case] expected: f64) {
        assert_eq!(base_tag_score(tag), expected);
    }

    #[test]
    fn test_normalized_inner_text() {
        let doc = Document::parse("<div>  Some \n\n  text  <b>bold</b>\t\t</div>").unwrap();
        assert_eq!(normalized_inner_text(&doc, first(&doc, "div")), "Some text bold");
    }

    #[test]
    fn test_paragraph_score() {
        assert_eq!(paragraph_score("short"), 2.0);
        assert_eq!(paragraph_score("a, b, c"), 4.0);
        assert_eq!(paragraph_score(&"x".repeat(250)), 4.0);
        assert_eq!(paragraph_score(&"x".repeat(1000)), 5.0);
    }

    #[test]
    fn test_class_weight() {
        let patterns = Patterns::default();
        let ctx = ScoringContext::new(&patterns, true);
        let doc = Document::parse(
            r#"<div class="article-body" id="main">a</div><span class="sidebar">b</span><p class="comment" id="content">c</p>"#,
        )
        .unwrap();
        assert_eq!(ctx.class_weight(&doc, first(&doc, "div")), 50.0);
        assert_eq!(ctx.class_weight(&doc, first(&doc, "span")), -25.0);
        assert_eq!(ctx.class_weight(&doc, first(&doc, "p")), 0.0);
    }

    #[test]
    fn test_class_weight_disabled() {
        let patterns = Patterns::default();
        let ctx = ScoringContext::new(&patterns, false);
        let doc = Document::parse(r#"<div class="sidebar">x</div>"#).unwrap();
        assert_eq!(ctx.class_weight(&doc, first(&doc, "div")), 0.0);
        assert_eq!(ctx.initial_score(&doc, first(&doc, "div")), 5.0);
    }

    #[test]
    fn test_link_density_no_links() {
        let doc = Document::parse("<div>Plain text only</div>").unwrap();
        assert_eq!(link_density(&doc, first(&doc, "div")), 0.0);
    }

    #[test]
    fn test_link_density_all_links() {
        let doc = Document::parse(r#"<div><a href="/a">one</a>  <a href="/b">two</a></div>"#).unwrap();
        let density = link_density(&doc, first(&doc, "div"));
        assert!(density > 0.8, "density was {density}");
    }

    #[test]
    fn test_link_density_single_anchor_is_exact() {
        let doc = Document::parse(r#"<div><a>text</a></div>"#).unwrap();
        assert_eq!(link_density(&doc, first(&doc, "div")), 1.0);
    }

    #[test]
    fn test_link_density_mixed() {
        let doc = Document::parse(r#"<p>12345<a href="/x">12345</a></p>"#).unwrap();
        assert_eq!(link_density(&doc, first(&doc, "p")), 0.5);
    }

    #[test]
    fn test_link_density_empty() {
        let doc = Document::parse("<div></div>").unwrap();
        assert_eq!(link_density(&doc, first(&doc, "div")), 0.0);
    }

    #[test]
    fn test_candidate_scores_keep_discovery_order() {
        let doc = Document::parse("<div>a</div><p>b</p>").unwrap();
        let (div, p) = (first(&doc, "div"), first(&doc, "p"));
        let mut scores = CandidateScores::new();
        scores.set(p, 1.0);
        scores.add(div, 2.0);
        scores.add(p, 3.0);
        assert_eq!(scores.candidates(), &[p, div]);
        assert_eq!(scores.score(p), 4.0);
        assert_eq!(scores.score(doc.body().unwrap()), 0.0);
        assert!(!scores.contains(doc.body().unwrap()));
    }
}
