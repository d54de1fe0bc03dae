//! Next-page link detection for multi-page articles.
//!
//! Every anchor on the page is scored with the arc90 pagination heuristics:
//! link text, class and id signals, ancestor signals and the shape of the
//! href. The best link scoring at least [`MIN_NEXT_PAGE_SCORE`] wins.

use std::collections::{HashMap, HashSet};

use tracing::debug;
use url::Url;

use crate::constants::{FIRST_OR_LAST, PAGE_IN_URL, PAGE_NUMBER_SUFFIX, PAGE_WORD, Patterns, SHORT_NUMBER};
use crate::dom_tree::{Document, NodeId};
use crate::scoring::normalized_inner_text;
use crate::urls::resolve_url;

pub const MIN_NEXT_PAGE_SCORE: f64 = 50.0;

/// Longest link text that can still be a pagination link
const MAX_LINK_TEXT_LENGTH: usize = 25;

#[derive(Debug)]
struct PageLink {
    href: String,
    text: String,
    score: f64,
}

/// Strips a trailing `/`, the form under which pages are compared and recorded
pub fn normalize_page_url(url: &str) -> &str {
    url.strip_suffix('/').unwrap_or(url)
}

/// The page URL with page numbers, `index` and file extensions removed from its last path segments
///
/// `http://example.com/news/story-p2.html` becomes `http://example.com/news/story`.
pub fn article_base_url(page_url: &Url) -> String {
    let path = page_url.path();
    let segments: Vec<&str> = path.split('/').rev().collect();
    let last_segment_has_letters = segments.first().is_some_and(|s| s.chars().any(|c| c.is_ascii_alphabetic()));

    let mut cleaned: Vec<String> = Vec::new();
    for (i, &raw) in segments.iter().enumerate() {
        let mut segment = raw.to_string();

        if let Some((stem, extension)) = raw.split_once('.') {
            let extension = extension.split('.').next().unwrap_or_default();
            if extension.chars().all(|c| c.is_ascii_alphabetic()) {
                segment = stem.to_string();
            }
        }
        if segment.contains(",00") {
            segment = segment.replacen(",00", "", 1);
        }
        if i < 2 && PAGE_NUMBER_SUFFIX.is_match(&segment) {
            segment = PAGE_NUMBER_SUFFIX.replace(&segment, "").into_owned();
        }

        let delete = (i < 2 && SHORT_NUMBER.is_match(&segment))
            || (i == 0 && segment.eq_ignore_ascii_case("index"))
            || (i < 2 && segment.chars().count() < 3 && !last_segment_has_letters);
        if !delete {
            cleaned.push(segment);
        }
    }
    cleaned.reverse();

    let host = match page_url.port() {
        Some(port) => format!("{}:{port}", page_url.host_str().unwrap_or_default()),
        None => page_url.host_str().unwrap_or_default().to_string(),
    };
    format!("{}://{host}{}", page_url.scheme(), cleaned.join("/"))
}

/// Leading integer of `text` the way a lenient number parser reads it
fn leading_number(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

fn same_host(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

/// Finds the most likely link to the next page of the article
///
/// Anchors pointing at the page itself, at the article base URL or at any URL
/// in `visited` are skipped. The returned URL has its trailing `/` removed.
pub fn find_next_page_link(doc: &Document, page_url: &str, patterns: &Patterns, visited: &HashSet<String>) -> Option<String> {
    let page = Url::parse(page_url).ok()?;
    let scope = doc.body().or_else(|| doc.root())?;
    let base = article_base_url(&page);

    let mut candidates: HashMap<String, PageLink> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for anchor in doc.elements_by_tag_name(scope, "a") {
        let Some(raw_href) = doc.attr(anchor, "href") else { continue };
        let resolved = resolve_url(Some(page_url), raw_href.trim());
        let without_fragment = resolved.split('#').next().unwrap_or_default();
        let href = normalize_page_url(without_fragment).to_string();

        if href.is_empty() || href == base || href == page_url || visited.contains(&href) {
            continue;
        }
        let Ok(link_url) = Url::parse(&href) else { continue };
        if !same_host(&page, &link_url) {
            continue;
        }

        let text = normalized_inner_text(doc, anchor);
        if patterns.extraneous.is_match(&text) || text.chars().count() > MAX_LINK_TEXT_LENGTH {
            continue;
        }
        let leftover = href.replacen(&base, "", 1);
        if !leftover.chars().any(|c| c.is_ascii_digit()) {
            continue;
        }

        let link = candidates.entry(href.clone()).or_insert_with(|| {
            order.push(href.clone());
            PageLink { href: href.clone(), text: String::new(), score: 0.0 }
        });
        if link.text.is_empty() {
            link.text = text.clone();
        } else {
            link.text = format!("{} | {text}", link.text);
        }

        link.score += score_link(doc, anchor, &href, &base, &text, &link.text, patterns);
    }

    let mut best: Option<&PageLink> = None;
    for href in &order {
        let link = &candidates[href];
        if link.score >= MIN_NEXT_PAGE_SCORE && best.is_none_or(|b| b.score < link.score) {
            best = Some(link);
        }
    }

    let next = best.map(|link| normalize_page_url(&link.href).to_string());
    if let Some(next) = &next {
        debug!(next_page = %next, "found next page link");
    }
    next
}

fn score_link(
    doc: &Document, anchor: NodeId, href: &str, base: &str, text: &str, accumulated_text: &str, patterns: &Patterns,
) -> f64 {
    let mut score = 0.0;

    if !href.starts_with(base) {
        score -= 25.0;
    }

    let link_data = format!("{text} {} {}", doc.class(anchor), doc.id(anchor));
    if patterns.next_link.is_match(&link_data) {
        score += 50.0;
    }
    if PAGE_WORD.is_match(&link_data) {
        score += 25.0;
    }
    if FIRST_OR_LAST.is_match(&link_data) && !patterns.next_link.is_match(accumulated_text) {
        score -= 65.0;
    }
    if patterns.negative.is_match(&link_data) || patterns.extraneous.is_match(&link_data) {
        score -= 50.0;
    }
    if patterns.prev_link.is_match(&link_data) {
        score -= 200.0;
    }

    let mut positive_ancestor = false;
    let mut negative_ancestor = false;
    let mut current = doc.parent(anchor);
    while let Some(ancestor) = current {
        if doc.is_element(ancestor) {
            let class_and_id = format!("{} {}", doc.class(ancestor), doc.id(ancestor));
            if !positive_ancestor && PAGE_WORD.is_match(&class_and_id) {
                positive_ancestor = true;
                score += 25.0;
            }
            if !negative_ancestor && patterns.negative.is_match(&class_and_id) && !patterns.positive.is_match(&class_and_id)
            {
                negative_ancestor = true;
                score -= 25.0;
            }
        }
        current = doc.parent(ancestor);
    }

    if PAGE_IN_URL.is_match(href) {
        score += 25.0;
    }
    if patterns.extraneous.is_match(href) {
        score -= 15.0;
    }

    match leading_number(text) {
        Some(1) => score -= 10.0,
        Some(n) if n != 0 => score += (10 - n).max(0) as f64,
        _ => {}
    }

    score
}
