//! Arena DOM.
//!
//! A [`Document`] owns every node in a flat vector; nodes refer to each other
//! through [`NodeId`] indices. Only parent and child links are stored, so
//! sibling and ancestor queries walk those lists. Detaching a node unlinks it
//! from its parent; the node and its subtree stay in the arena, unreachable
//! from the document node, and can be re-attached elsewhere.
//!
//! # Example
//!
//! ```rust
//! use perlego_core::Document;
//!
//! let doc = Document::parse("<p id=intro>Hello <b>world</b></p>").unwrap();
//! let p = doc.element_by_id("intro").unwrap();
//! assert_eq!(doc.tag_name(p), Some("p"));
//! assert_eq!(doc.inner_text(p), "Hello world");
//! ```

use crate::Result;
use crate::serialize;

/// Index of a node in its [`Document`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    /// Lower-cased tag name.
    pub name: String,
    /// Attributes in source order; names are lower-cased.
    pub attrs: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Document,
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A parsed or synthesized HTML document.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document: just the document node, no root element.
    pub fn new() -> Self {
        Self { nodes: vec![Node { data: NodeData::Document, parent: None, children: Vec::new() }] }
    }

    pub fn document_node(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id).iter().copied().filter(|&c| self.is_element(c)).collect()
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node { data, parent: None, children: Vec::new() });
        id
    }

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.create_element_with_attrs(name, Vec::new())
    }

    pub fn create_element_with_attrs(&mut self, name: &str, attrs: Vec<(String, String)>) -> NodeId {
        self.push(NodeData::Element(ElementData { name: name.to_ascii_lowercase(), attrs }))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Comment(text.into()))
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id.0].data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes[id.0].data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].data, NodeData::Element(_))
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.name.as_str())
    }

    /// Case-insensitive tag name check; false for non-elements.
    pub fn is_tag(&self, id: NodeId, name: &str) -> bool {
        self.tag_name(id).is_some_and(|n| n.eq_ignore_ascii_case(name))
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, value: impl Into<String>) {
        if let NodeData::Text(t) = &mut self.nodes[id.0].data {
            *t = value.into();
        }
    }

    // Structure

    /// The first element child of the document node.
    pub fn root(&self) -> Option<NodeId> {
        self.children(self.document_node()).iter().copied().find(|&c| self.is_element(c))
    }

    pub fn body(&self) -> Option<NodeId> {
        self.root().and_then(|root| self.find_first_child_with_tag_name(root, "body"))
    }

    pub fn head(&self) -> Option<NodeId> {
        self.root().and_then(|root| self.find_first_child_with_tag_name(root, "head"))
    }

    /// `None` without a root; `Some("")` when there is no head or no title.
    pub fn title(&self) -> Option<String> {
        self.root()?;
        let title = self.head().and_then(|head| self.find_first_child_with_tag_name(head, "title"));
        Some(title.map(|t| self.inner_text(t).trim().to_string()).unwrap_or_default())
    }

    /// Every node below `scope` in document order, `scope` excluded.
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    pub fn descendant_elements(&self, scope: NodeId) -> Vec<NodeId> {
        self.descendants(scope).into_iter().filter(|&id| self.is_element(id)).collect()
    }

    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        if id.is_empty() {
            return None;
        }
        self.descendants(self.document_node()).into_iter().find(|&n| self.attr(n, "id") == Some(id))
    }

    pub fn elements_by_tag_name(&self, scope: NodeId, name: &str) -> Vec<NodeId> {
        self.descendants(scope).into_iter().filter(|&id| self.is_tag(id, name)).collect()
    }

    pub fn count_elements_by_tag_name(&self, scope: NodeId, name: &str) -> usize {
        self.descendants(scope).into_iter().filter(|&id| self.is_tag(id, name)).count()
    }

    pub fn children_by_tag_name(&self, node: NodeId, name: &str) -> Vec<NodeId> {
        self.children(node).iter().copied().filter(|&c| self.is_tag(c, name)).collect()
    }

    pub fn find_first_child_with_tag_name(&self, node: NodeId, name: &str) -> Option<NodeId> {
        self.children(node).iter().copied().find(|&c| self.is_tag(c, name))
    }

    /// Whether `node` is attached below the document node.
    pub fn is_attached(&self, node: NodeId) -> bool {
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current == self.document_node()
    }

    pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    // Attributes

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attrs.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        let Some(element) = self.element_mut(id) else { return };
        match element.attrs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some((_, v)) => *v = value,
            None => element.attrs.push((name.to_ascii_lowercase(), value)),
        }
    }

    /// Sets the attribute, or removes it when `value` is `None`.
    pub fn set_attr_opt(&mut self, id: NodeId, name: &str, value: Option<&str>) {
        match value {
            Some(v) => self.set_attr(id, name, v),
            None => self.remove_attr(id, name),
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(element) = self.element_mut(id) {
            element.attrs.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        }
    }

    pub fn clear_attrs(&mut self, id: NodeId) {
        if let Some(element) = self.element_mut(id) {
            element.attrs.clear();
        }
    }

    /// Adds attributes the element does not have yet.
    pub fn merge_attrs(&mut self, id: NodeId, attrs: Vec<(String, String)>) {
        for (name, value) in attrs {
            if !self.has_attr(id, &name) {
                self.set_attr(id, &name, value);
            }
        }
    }

    pub fn id(&self, node: NodeId) -> &str {
        self.attr(node, "id").unwrap_or_default()
    }

    pub fn set_id(&mut self, node: NodeId, value: &str) {
        self.set_attr(node, "id", value);
    }

    pub fn class(&self, node: NodeId) -> &str {
        self.attr(node, "class").unwrap_or_default()
    }

    pub fn set_class(&mut self, node: NodeId, value: &str) {
        self.set_attr(node, "class", value);
    }

    pub fn style(&self, node: NodeId) -> &str {
        self.attr(node, "style").unwrap_or_default()
    }

    pub fn set_style(&mut self, node: NodeId, value: Option<&str>) {
        self.set_attr_opt(node, "style", value);
    }

    /// Non-empty attribute values joined by `separator`.
    pub fn attributes_string(&self, node: NodeId, separator: &str) -> String {
        self.element(node)
            .map(|e| e.attrs.iter().filter(|(_, v)| !v.is_empty()).map(|(_, v)| v.as_str()).collect::<Vec<_>>())
            .unwrap_or_default()
            .join(separator)
    }

    // Content

    /// Concatenated text of every descendant text node.
    pub fn inner_text(&self, node: NodeId) -> String {
        if let Some(text) = self.text(node) {
            return text.to_string();
        }
        let mut out = String::new();
        for id in self.descendants(node) {
            if let Some(text) = self.text(id) {
                out.push_str(text);
            }
        }
        out
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        serialize::serialize_children(self, node, false)
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        serialize::serialize_node(self, node, false)
    }

    /// Replaces the children of `node` with the parsed `html` fragment.
    pub fn set_inner_html(&mut self, node: NodeId, html: &str) -> Result<()> {
        let (fragment, nodes) = Document::parse_fragment(html)?;
        self.remove_children(node);
        for child in nodes {
            let imported = self.import_node(&fragment, child);
            self.append_child(node, imported);
        }
        Ok(())
    }

    // Mutation

    /// Unlinks `node` from its parent. The subtree stays in the arena.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != node);
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(0, child);
    }

    /// Inserts `node` just before `reference`; no-op when `reference` is detached.
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) {
        if node == reference {
            return;
        }
        self.detach(node);
        let Some(parent) = self.parent(reference) else { return };
        let index = self.index_in_parent(reference).unwrap_or(0);
        self.nodes[node.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(index, node);
    }

    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) {
        if node == reference {
            return;
        }
        self.detach(node);
        let Some(parent) = self.parent(reference) else { return };
        let index = self.index_in_parent(reference).map_or(0, |i| i + 1);
        self.nodes[node.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(index, node);
    }

    /// Puts `replacement` where `node` was and detaches `node`.
    pub fn replace(&mut self, node: NodeId, replacement: NodeId) {
        self.insert_before(node, replacement);
        self.detach(node);
    }

    pub fn index_in_parent(&self, node: NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.children(parent).iter().position(|&c| c == node)
    }

    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let index = self.index_in_parent(node)?;
        index.checked_sub(1).map(|i| self.children(parent)[i])
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let index = self.index_in_parent(node)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn remove_children(&mut self, node: NodeId) {
        for child in std::mem::take(&mut self.nodes[node.0].children) {
            self.nodes[child.0].parent = None;
        }
    }

    /// Moves every child of `from` to the end of `to`.
    pub fn move_children(&mut self, from: NodeId, to: NodeId) {
        for child in self.children(from).to_vec() {
            self.append_child(to, child);
        }
    }

    /// Replaces `node` with its own children.
    pub fn unwrap_node(&mut self, node: NodeId) {
        for child in self.children(node).to_vec() {
            self.insert_before(node, child);
        }
        self.detach(node);
    }

    pub fn rename(&mut self, node: NodeId, name: &str) {
        if let Some(element) = self.element_mut(node) {
            element.name = name.to_ascii_lowercase();
        }
    }

    /// Deep-copies `node` from `other` into this arena. The copy is detached.
    pub fn import_node(&mut self, other: &Document, node: NodeId) -> NodeId {
        let copy = self.push(other.data(node).clone());
        let mut stack: Vec<(NodeId, NodeId)> = other.children(node).iter().rev().map(|&c| (c, copy)).collect();
        while let Some((source, parent)) = stack.pop() {
            let imported = self.push(other.data(source).clone());
            self.append_child(parent, imported);
            stack.extend(other.children(source).iter().rev().map(|&c| (c, imported)));
        }
        copy
    }

    /// Deep-copies a subtree within this document. The copy is detached.
    pub fn clone_subtree(&mut self, node: NodeId) -> NodeId {
        let copy = self.push(self.data(node).clone());
        let mut stack: Vec<(NodeId, NodeId)> = self.children(node).iter().rev().map(|&c| (c, copy)).collect();
        while let Some((source, parent)) = stack.pop() {
            let cloned = self.push(self.data(source).clone());
            self.append_child(parent, cloned);
            stack.extend(self.children(source).iter().rev().map(|&c| (c, cloned)));
        }
        copy
    }

    /// A fresh document holding only the reachable nodes.
    pub fn compact(&self) -> Document {
        let mut doc = Document::new();
        let target = doc.document_node();
        for &child in self.children(self.document_node()) {
            let imported = doc.import_node(self, child);
            doc.append_child(target, imported);
        }
        doc
    }

    pub fn element_ref(&self, node: NodeId) -> ElementRef<'_> {
        ElementRef { doc: self, node }
    }
}

/// A borrowed view of one element, handed to attribute transformers.
#[derive(Clone, Copy)]
pub struct ElementRef<'a> {
    doc: &'a Document,
    node: NodeId,
}

impl<'a> ElementRef<'a> {
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn name(&self) -> &'a str {
        self.doc.tag_name(self.node).unwrap_or_default()
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.doc.attr(self.node, name)
    }

    pub fn id(&self) -> &'a str {
        self.doc.id(self.node)
    }

    pub fn class(&self) -> &'a str {
        self.doc.class(self.node)
    }

    pub fn text(&self) -> String {
        self.doc.inner_text(self.node)
    }
}

impl std::fmt::Debug for ElementRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementRef").field("name", &self.name()).field("node", &self.node).finish()
    }
}
