//! DOM to HTML serialization.
//!
//! [`DomSerializer`] writes a [`Document`] back out as HTML, either compact
//! (text verbatim) or pretty-printed. Before writing a full document it
//! normalizes the `<head>` meta elements according to
//! [`DomSerializationParams`].
//!
//! # Example
//!
//! ```rust
//! use perlego_core::{Document, DomSerializationParams, DomSerializer};
//!
//! let doc = Document::parse("<p>a &amp; b</p>").unwrap();
//! let html = DomSerializer::new().serialize_document(&doc, &DomSerializationParams::default()).unwrap();
//! assert!(html.contains("<p>a &amp; b</p>"));
//! assert!(html.contains("<meta name=\"Generator\""));
//! ```

use serde::{Deserialize, Serialize};

use crate::dom_tree::{Document, NodeData, NodeId};
use crate::sgml::html_dtd;
use crate::{PerlegoError, Result};

/// Name used in the generated `Generator` meta element.
pub const GENERATOR: &str = concat!("Perlego ", env!("CARGO_PKG_VERSION"));

const INDENT: &str = "  ";

/// Indentation stops growing past this depth.
const MAX_INDENT_DEPTH: usize = 64;

/// Output switches for [`DomSerializer::serialize_document`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomSerializationParams {
    pub pretty_print: bool,
    pub dont_include_content_type_meta_element: bool,
    pub dont_include_mobile_specific_meta_elements: bool,
    pub dont_include_generator_meta_element: bool,
}

impl DomSerializationParams {
    /// Pretty-printed output without any injected meta elements.
    pub fn plain() -> Self {
        Self {
            pretty_print: true,
            dont_include_content_type_meta_element: true,
            dont_include_mobile_specific_meta_elements: true,
            dont_include_generator_meta_element: true,
        }
    }

    fn touches_head(&self) -> bool {
        !(self.dont_include_content_type_meta_element
            && self.dont_include_mobile_specific_meta_elements
            && self.dont_include_generator_meta_element)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DomSerializer;

impl DomSerializer {
    pub fn new() -> Self {
        Self
    }

    /// Serializes a copy of `document`; the input is left untouched.
    ///
    /// # Errors
    ///
    /// Unless every `dont_include_*` flag is set, the document must have an
    /// `html` root; otherwise [`PerlegoError::InvalidDocument`] is returned.
    pub fn serialize_document(&self, document: &Document, params: &DomSerializationParams) -> Result<String> {
        let mut doc = document.clone();

        if params.touches_head() {
            let root = doc
                .root()
                .ok_or_else(|| PerlegoError::InvalidDocument("The document must have a root.".to_string()))?;
            if !doc.is_tag(root, "html") {
                return Err(PerlegoError::InvalidDocument("The document's root must be an html element.".to_string()));
            }
            let head = match doc.head() {
                Some(head) => head,
                None => {
                    let head = doc.create_element("head");
                    doc.prepend_child(root, head);
                    head
                }
            };
            process_meta_elements(&mut doc, head, params);
        }

        let doc_node = doc.document_node();
        if params.pretty_print {
            let mut lines = Vec::new();
            for &child in doc.children(doc_node) {
                write_pretty(&doc, child, 0, &mut lines);
            }
            Ok(lines.join("\n"))
        } else {
            Ok(serialize_children(&doc, doc_node, false))
        }
    }
}

fn process_meta_elements(doc: &mut Document, head: NodeId, params: &DomSerializationParams) {
    let metas_where = |doc: &Document, attr: &str, value: &str| -> Vec<NodeId> {
        doc.children_by_tag_name(head, "meta")
            .into_iter()
            .filter(|&m| doc.attr(m, attr).is_some_and(|v| v.eq_ignore_ascii_case(value)))
            .collect()
    };

    if !params.dont_include_content_type_meta_element {
        let mut stale = metas_where(&*doc, "http-equiv", "content-type");
        stale.extend(doc.children_by_tag_name(head, "meta").into_iter().filter(|&m| doc.has_attr(m, "charset")));
        for meta in stale {
            doc.detach(meta);
        }
        let charset = doc.create_element_with_attrs("meta", vec![("charset".into(), "utf-8".into())]);
        doc.prepend_child(head, charset);
    }

    for meta in metas_where(&*doc, "name", "viewport") {
        doc.detach(meta);
    }
    if !params.dont_include_mobile_specific_meta_elements {
        for meta in metas_where(&*doc, "name", "HandheldFriendly") {
            doc.detach(meta);
        }
        let handheld = doc.create_element_with_attrs(
            "meta",
            vec![("name".into(), "HandheldFriendly".into()), ("content".into(), "true".into())],
        );
        doc.append_child(head, handheld);
    }

    if !params.dont_include_generator_meta_element {
        for meta in metas_where(&*doc, "name", "Generator") {
            doc.detach(meta);
        }
        let generator = doc.create_element_with_attrs(
            "meta",
            vec![("name".into(), "Generator".into()), ("content".into(), GENERATOR.into())],
        );
        doc.append_child(head, generator);
    }
}

/// Serializes one node and its subtree.
pub fn serialize_node(doc: &Document, node: NodeId, pretty: bool) -> String {
    if pretty {
        let mut lines = Vec::new();
        write_pretty(doc, node, 0, &mut lines);
        return lines.join("\n");
    }
    let mut out = String::new();
    write_compact(doc, node, &mut out);
    out
}

/// Serializes the children of `node`, without the node's own tags.
pub fn serialize_children(doc: &Document, node: NodeId, pretty: bool) -> String {
    let parts = doc.children(node).iter().map(|&child| serialize_node(doc, child, pretty));
    if pretty {
        parts.filter(|p| !p.is_empty()).collect::<Vec<_>>().join("\n")
    } else {
        parts.collect()
    }
}

/// A pending step of the explicit-stack tree walks below.
enum Step {
    Enter(NodeId),
    Close(NodeId),
}

fn write_compact(doc: &Document, node: NodeId, out: &mut String) {
    let mut stack = vec![Step::Enter(node)];
    while let Some(step) = stack.pop() {
        let node = match step {
            Step::Enter(node) => node,
            Step::Close(node) => {
                if let Some(element) = doc.element(node) {
                    out.push_str("</");
                    out.push_str(&element.name);
                    out.push('>');
                }
                continue;
            }
        };
        match doc.data(node) {
            NodeData::Document => stack.extend(doc.children(node).iter().rev().map(|&c| Step::Enter(c))),
            NodeData::Text(text) => {
                let raw = doc.parent(node).is_some_and(|p| is_raw_text_element(doc, p));
                if raw { out.push_str(text) } else { escape_into(text, false, out) }
            }
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::Element(_) => {
                write_start_tag(doc, node, out);
                if !is_void(doc, node) {
                    stack.push(Step::Close(node));
                    stack.extend(doc.children(node).iter().rev().map(|&c| Step::Enter(c)));
                }
            }
        }
    }
}

fn write_start_tag(doc: &Document, node: NodeId, out: &mut String) {
    let Some(element) = doc.element(node) else { return };
    out.push('<');
    out.push_str(&element.name);
    for (name, value) in &element.attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_into(value, true, out);
        out.push('"');
    }
    out.push_str(if is_void(doc, node) { " />" } else { ">" });
}

fn write_pretty(doc: &Document, node: NodeId, depth: usize, lines: &mut Vec<String>) {
    let mut stack = vec![(Step::Enter(node), depth)];
    while let Some((step, depth)) = stack.pop() {
        let indent = INDENT.repeat(depth.min(MAX_INDENT_DEPTH));
        let node = match step {
            Step::Enter(node) => node,
            Step::Close(node) => {
                if let Some(element) = doc.element(node) {
                    lines.push(format!("{indent}</{}>", element.name));
                }
                continue;
            }
        };
        match doc.data(node) {
            NodeData::Text(text) => {
                if !text.trim().is_empty() {
                    let mut line = indent;
                    escape_into(text.trim(), false, &mut line);
                    lines.push(line);
                }
            }
            NodeData::Element(element) if has_only_element_children(doc, node) && !is_void(doc, node) => {
                let children: Vec<NodeId> = doc
                    .children(node)
                    .iter()
                    .copied()
                    .filter(|&c| doc.text(c).is_none_or(|t| !t.trim().is_empty()))
                    .collect();
                let mut open = indent;
                write_start_tag(doc, node, &mut open);
                if children.is_empty() {
                    lines.push(format!("{open}</{}>", element.name));
                    continue;
                }
                lines.push(open);
                stack.push((Step::Close(node), depth));
                stack.extend(children.into_iter().rev().map(|c| (Step::Enter(c), depth + 1)));
            }
            _ => {
                let mut line = indent;
                write_compact(doc, node, &mut line);
                lines.push(line);
            }
        }
    }
}

/// Element children only, ignoring whitespace-only text; raw text elements never qualify.
fn has_only_element_children(doc: &Document, node: NodeId) -> bool {
    if is_raw_text_element(doc, node) {
        return false;
    }
    doc.children(node).iter().all(|&c| match doc.data(c) {
        NodeData::Text(t) => t.trim().is_empty(),
        _ => true,
    })
}

fn is_raw_text_element(doc: &Document, node: NodeId) -> bool {
    doc.is_tag(node, "script") || doc.is_tag(node, "style")
}

/// Declared EMPTY and childless.
fn is_void(doc: &Document, node: NodeId) -> bool {
    if !doc.children(node).is_empty() {
        return false;
    }
    let Some(name) = doc.tag_name(node) else { return false };
    html_dtd().ok().and_then(|dtd| dtd.find_element(name)).is_some_and(|decl| decl.is_empty())
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}
