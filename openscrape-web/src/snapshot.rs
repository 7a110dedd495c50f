//! Owned model of a loaded page.
//!
//! A [`DocumentSnapshot`] is a plain tree of element, text, comment and
//! doctype nodes. It owns all of its data, so `clone()` is a deep copy and a
//! clone can be mutated freely without the original noticing.

use scraper::node::Node as HtmlNode;
use scraper::Html;
use std::fmt::Write as _;

/// Deepest element nesting accepted from the page driver.
pub const MAX_DEPTH: usize = 512;

/// Elements serialized without an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text children are written verbatim.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Structural contract violations in a snapshot.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("element nesting exceeds {limit} levels")]
    NestingTooDeep { limit: usize },

    #[error("invalid element name {0:?}")]
    InvalidElementName(String),

    #[error("invalid attribute name {attr:?} on <{element}>")]
    InvalidAttributeName { element: String, attr: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
    Doctype(String),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Node::Comment(text.into())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Node::Element(el)
    }
}

/// An element with ordered attributes and owned children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    /// New element; the tag name is lower-cased.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_child(Node::Text(text.into()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of attribute `name` (ASCII case-insensitive lookup).
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Replace an existing attribute in place, or append a new one.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_ascii_lowercase();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == name) {
            Some((_, v)) => *v = value,
            None => self.attrs.push((name, value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let idx = self
            .attrs
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.attrs.remove(idx).1)
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Node> {
        &mut self.children
    }

    /// Concatenated descendant text.
    pub fn inner_text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Element(el) => collect_text(&el.children, out),
            Node::Comment(_) | Node::Doctype(_) => {}
        }
    }
}

/// A materialized page: the top-level nodes of the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSnapshot {
    nodes: Vec<Node>,
}

impl DocumentSnapshot {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Parse page source with the html5ever-backed `scraper` parser.
    ///
    /// Parsing is lenient about markup errors, but refuses documents nested
    /// deeper than [`MAX_DEPTH`].
    ///
    /// ```
    /// use openscrape_web::snapshot::DocumentSnapshot;
    ///
    /// let snapshot = DocumentSnapshot::parse_html("<p class=lead>Hello</p>").unwrap();
    /// assert_eq!(
    ///     snapshot.to_html(),
    ///     r#"<html><head></head><body><p class="lead">Hello</p></body></html>"#
    /// );
    /// ```
    pub fn parse_html(html: &str) -> Result<Self, SnapshotError> {
        let document = Html::parse_document(html);
        let mut nodes = Vec::new();
        for child in document.tree.root().children() {
            if let Some(node) = convert(child, 1)? {
                nodes.push(node);
            }
        }
        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut Vec<Node> {
        &mut self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check the structural contract: bounded depth and names that can be
    /// serialized back to markup.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        validate_nodes(&self.nodes, 1)
    }

    /// Serialize the remaining nodes as HTML. Doctype nodes are not emitted.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            write_node(node, false, &mut out);
        }
        out
    }
}

fn convert(
    node: ego_tree::NodeRef<'_, HtmlNode>,
    depth: usize,
) -> Result<Option<Node>, SnapshotError> {
    if depth > MAX_DEPTH {
        return Err(SnapshotError::NestingTooDeep { limit: MAX_DEPTH });
    }
    let converted = match node.value() {
        HtmlNode::Element(el) => {
            let mut element = Element::new(el.name());
            for (name, value) in el.attrs() {
                element.set_attr(name, value);
            }
            for child in node.children() {
                if let Some(c) = convert(child, depth + 1)? {
                    element.children.push(c);
                }
            }
            Some(Node::Element(element))
        }
        HtmlNode::Text(text) => Some(Node::Text(text.text.to_string())),
        HtmlNode::Comment(comment) => Some(Node::Comment(comment.comment.to_string())),
        HtmlNode::Doctype(doctype) => Some(Node::Doctype(doctype.name().to_string())),
        _ => None,
    };
    Ok(converted)
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '<' | '>' | '/' | '=' | '"' | '\''))
}

fn validate_nodes(nodes: &[Node], depth: usize) -> Result<(), SnapshotError> {
    if depth > MAX_DEPTH {
        return Err(SnapshotError::NestingTooDeep { limit: MAX_DEPTH });
    }
    for node in nodes {
        if let Node::Element(el) = node {
            if !is_valid_name(&el.name) {
                return Err(SnapshotError::InvalidElementName(el.name.clone()));
            }
            if let Some((attr, _)) = el.attrs.iter().find(|(k, _)| !is_valid_name(k)) {
                return Err(SnapshotError::InvalidAttributeName {
                    element: el.name.clone(),
                    attr: attr.clone(),
                });
            }
            validate_nodes(&el.children, depth + 1)?;
        }
    }
    Ok(())
}

fn write_node(node: &Node, raw_text: bool, out: &mut String) {
    match node {
        Node::Element(el) => {
            let _ = write!(out, "<{}", el.name);
            for (name, value) in &el.attrs {
                let _ = write!(out, " {name}=\"");
                escape_into(value, true, out);
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&el.name.as_str()) {
                return;
            }
            let raw = RAW_TEXT_ELEMENTS.contains(&el.name.as_str());
            for child in &el.children {
                write_node(child, raw, out);
            }
            let _ = write!(out, "</{}>", el.name);
        }
        Node::Text(text) if raw_text => out.push_str(text),
        Node::Text(text) => escape_into(text, false, out),
        Node::Comment(text) => {
            let _ = write!(out, "<!--{text}-->");
        }
        Node::Doctype(_) => {}
    }
}

fn escape_into(s: &str, attribute: bool, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}
