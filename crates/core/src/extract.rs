use tracing::debug;

use crate::constants::{CANDIDATE_SOURCE_ELEMENTS, CONTENT_DIV_ID, SENTENCE_END};
use crate::dom_tree::{Document, NodeId};
use crate::preprocess::ensure_root_and_body;
use crate::scoring::{CandidateScores, ScoringContext, link_density, normalized_inner_text, paragraph_score};

/// Minimum normalized text length for a paragraph to contribute to scoring
pub const MIN_PARAGRAPH_LENGTH: usize = 25;

/// Minimum score a sibling needs to join the article, before the relative threshold
pub const MIN_SIBLING_SCORE_THRESHOLD: f64 = 10.0;

/// Fraction of the top score used for the sibling threshold and the shared-class bonus
pub const SIBLING_SCORE_RATIO: f64 = 0.2;

/// Elements that can be scored as candidates: not the document node and not the root
fn scorable_parent(doc: &Document, node: Option<NodeId>) -> Option<NodeId> {
    node.filter(|&n| doc.is_element(n) && !doc.is_tag(n, "html"))
}

/// Identify and score candidate containers
///
/// Every `p`, `td` and `pre` with at least [`MIN_PARAGRAPH_LENGTH`] characters of
/// text scores its parent with the full [`paragraph_score`] and its grandparent
/// with half of it. A candidate starts at its tag score plus class weight.
pub fn find_candidates(doc: &Document, ctx: &ScoringContext<'_>) -> CandidateScores {
    let mut scores = CandidateScores::new();
    let Some(root) = doc.root() else { return scores };

    let sources = doc
        .descendant_elements(root)
        .into_iter()
        .filter(|&n| doc.tag_name(n).is_some_and(|name| CANDIDATE_SOURCE_ELEMENTS.contains(&name)));

    for paragraph in sources {
        let text = normalized_inner_text(doc, paragraph);
        if text.chars().count() < MIN_PARAGRAPH_LENGTH {
            continue;
        }
        let Some(parent) = scorable_parent(doc, doc.parent(paragraph)) else { continue };
        let grandparent = scorable_parent(doc, doc.parent(parent));

        for candidate in std::iter::once(parent).chain(grandparent) {
            if !scores.contains(candidate) {
                scores.set(candidate, ctx.initial_score(doc, candidate));
            }
        }

        let score = paragraph_score(&text);
        scores.add(parent, score);
        if let Some(grandparent) = grandparent {
            scores.add(grandparent, score / 2.0);
        }
    }

    debug!(candidates = scores.len(), "scored article candidates");
    scores
}

/// Select the element most likely to hold the article
///
/// Scores are scaled by `1 - link density` first. The highest score wins and
/// the earliest candidate wins ties. Without a usable winner (no candidates, or
/// `body` itself) the whole body content is moved into a fresh `div` that is
/// returned instead.
pub fn determine_top_candidate(doc: &mut Document, scores: &mut CandidateScores) -> NodeId {
    let mut top: Option<(NodeId, f64)> = None;

    for &candidate in scores.candidates().to_vec().iter() {
        let scaled = scores.score(candidate) * (1.0 - link_density(doc, candidate));
        scores.set(candidate, scaled);
        if top.is_none_or(|(_, best)| scaled > best) {
            top = Some((candidate, scaled));
        }
    }

    match top {
        Some((node, score)) if !doc.is_tag(node, "body") => {
            debug!(tag = doc.tag_name(node).unwrap_or_default(), score, "selected top candidate");
            node
        }
        _ => {
            debug!("no usable candidate, wrapping the body content");
            let (_, body) = ensure_root_and_body(doc);
            let wrapper = doc.create_element("div");
            doc.move_children(body, wrapper);
            doc.append_child(body, wrapper);
            wrapper
        }
    }
}

/// Build the `div#readability-content` container from the top candidate and its related siblings
///
/// Siblings are included if:
/// - Their score (plus a bonus when they share the top candidate's class) reaches `max(10, top * 0.2)`
/// - For P tags: more than 80 characters and link density below 0.25
/// - For P tags: shorter, free of links, and sentence-like
///
/// Included siblings other than `div` and `p` are renamed to `div`.
pub fn create_article_content_element(doc: &mut Document, top: NodeId, scores: &CandidateScores) -> NodeId {
    let article = doc.create_element_with_attrs("div", vec![("id".to_string(), CONTENT_DIV_ID.to_string())]);

    let top_score = scores.score(top);
    let threshold = MIN_SIBLING_SCORE_THRESHOLD.max(top_score * SIBLING_SCORE_RATIO);
    let top_class = doc.class(top).to_string();

    let siblings = match doc.parent(top) {
        Some(parent) => doc.element_children(parent),
        None => vec![top],
    };

    for sibling in siblings {
        if !include_sibling(doc, sibling, top, &top_class, top_score, threshold, scores) {
            continue;
        }
        if !doc.is_tag(sibling, "div") && !doc.is_tag(sibling, "p") {
            doc.rename(sibling, "div");
        }
        doc.append_child(article, sibling);
    }

    article
}

fn include_sibling(
    doc: &Document, sibling: NodeId, top: NodeId, top_class: &str, top_score: f64, threshold: f64,
    scores: &CandidateScores,
) -> bool {
    if sibling == top {
        return true;
    }

    if let Some(score) = scores.get(sibling) {
        let bonus =
            if !top_class.is_empty() && doc.class(sibling) == top_class { top_score * SIBLING_SCORE_RATIO } else { 0.0 };
        if score + bonus >= threshold {
            return true;
        }
    }

    if doc.is_tag(sibling, "p") {
        let text = normalized_inner_text(doc, sibling);
        let length = text.chars().count();
        let density = link_density(doc, sibling);
        if length > 80 && density < 0.25 {
            return true;
        }
        if length < 80 && density == 0.0 && SENTENCE_END.is_match(&text) {
            return true;
        }
    }

    false
}
