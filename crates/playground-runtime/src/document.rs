//! In-memory document: a stylesheet anchored at the start of the body plus a
//! tree of markup nodes.

use std::{cell::Cell, fmt::Write as _};

use serde::{Deserialize, Serialize};

use playground_core::SessionId;

/// Identity of an element, stable for the element's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey(pub i64);

/// Allocator of fresh [`NodeKey`]s.
#[derive(Debug, Default)]
pub struct KeyAlloc(Cell<i64>);

impl KeyAlloc {
    pub fn next(&self) -> NodeKey {
        let key = self.0.get() + 1;
        self.0.set(key);
        NodeKey(key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// The session stylesheet. Always the first body node.
    Stylesheet,
    Element(Element),
    /// Markup-ready text, already escaped.
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub key: NodeKey,
    pub tag: String,
    /// Attribute values are markup-ready; `None` is a bare attribute.
    pub attrs: Vec<(String, Option<String>)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(key: NodeKey, tag: impl Into<String>) -> Self {
        Self {
            key,
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_deref())
    }
}

pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub(crate) const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Observable rendered state of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub session: SessionId,
    pub stylesheet: String,
    /// Body markup after the stylesheet node.
    pub body_html: String,
    /// Rules registered through `styled`.
    pub styled_css: String,
}

#[derive(Debug)]
pub struct Document {
    stylesheet: String,
    body: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            stylesheet: String::new(),
            body: vec![Node::Stylesheet],
        }
    }

    pub fn stylesheet(&self) -> &str {
        &self.stylesheet
    }

    /// Replace the stylesheet content; nothing else changes.
    pub fn set_style(&mut self, css: &str) {
        css.clone_into(&mut self.stylesheet);
    }

    /// Replace the body content, then re-insert the stylesheet at the anchor.
    pub fn set_markup(&mut self, html: &str, keys: &KeyAlloc) {
        let mut body = crate::markup::parse_html(html, keys);
        body.retain(|n| !matches!(n, Node::Stylesheet));
        body.insert(0, Node::Stylesheet);
        self.body = body;
    }

    pub fn body(&self) -> &[Node] {
        &self.body
    }

    /// Key of the first element whose `id` attribute equals `id`.
    pub fn find_by_id(&self, id: &str) -> Option<NodeKey> {
        fn walk(nodes: &[Node], id: &str) -> Option<NodeKey> {
            nodes.iter().find_map(|node| match node {
                Node::Element(el) if el.attr("id") == Some(id) => Some(el.key),
                Node::Element(el) => walk(&el.children, id),
                _ => None,
            })
        }
        walk(&self.body, id)
    }

    pub fn element(&self, key: NodeKey) -> Option<&Element> {
        fn walk(nodes: &[Node], key: NodeKey) -> Option<&Element> {
            nodes.iter().find_map(|node| match node {
                Node::Element(el) if el.key == key => Some(el),
                Node::Element(el) => walk(&el.children, key),
                _ => None,
            })
        }
        walk(&self.body, key)
    }

    fn element_mut(&mut self, key: NodeKey) -> Option<&mut Element> {
        fn walk(nodes: &mut [Node], key: NodeKey) -> Option<&mut Element> {
            for node in nodes {
                if let Node::Element(el) = node {
                    if el.key == key {
                        return Some(el);
                    }
                    if let Some(found) = walk(&mut el.children, key) {
                        return Some(found);
                    }
                }
            }
            None
        }
        walk(&mut self.body, key)
    }

    /// Replace the children of element `key`. Returns false if it no longer exists.
    pub fn replace_children(&mut self, key: NodeKey, children: Vec<Node>) -> bool {
        match self.element_mut(key) {
            Some(el) => {
                el.children = children;
                true
            }
            None => false,
        }
    }

    /// Body markup, without the stylesheet node.
    pub fn body_html(&self) -> String {
        let mut out = String::new();
        for node in &self.body {
            if !matches!(node, Node::Stylesheet) {
                write_node(&mut out, node, &self.stylesheet);
            }
        }
        out
    }

    /// Full document markup, stylesheet included.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for node in &self.body {
            write_node(&mut out, node, &self.stylesheet);
        }
        out
    }
}

fn write_node(out: &mut String, node: &Node, stylesheet: &str) {
    match node {
        Node::Stylesheet => {
            let _ = write!(out, "<style data-playground>{stylesheet}</style>");
        }
        Node::Text(text) => out.push_str(text),
        Node::Comment(text) => {
            let _ = write!(out, "<!--{text}-->");
        }
        Node::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            for (name, value) in &el.attrs {
                match value {
                    Some(v) => {
                        let _ = write!(out, " {name}=\"{v}\"");
                    }
                    None => {
                        let _ = write!(out, " {name}");
                    }
                }
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&el.tag.as_str()) {
                return;
            }
            for child in &el.children {
                write_node(out, child, stylesheet);
            }
            let _ = write!(out, "</{}>", el.tag);
        }
    }
}

/// Escape text for use as element content or attribute value.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
