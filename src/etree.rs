//! # Element Tree
//!
//! A small XML element-tree document type backing the `etree` host binding.
//!
//! ## Responsibilities
//! - **Construction**: elements, attributes, text and comments.
//! - **Navigation**: child lookup by tag.
//! - **Serialization**: `write_to_string` with optional indentation.
//!
//! Scripts only ever touch this through the handle types in
//! `bindings::etree`; the tree itself is plain data addressed by node ids.

use std::fmt::Write as _;

/// Index into the tree's node arena.
pub type NodeId = usize;

/// A child slot of an element (or of the document root).
#[derive(Debug, Clone)]
pub enum XmlChild {
    Element(NodeId),
    Text(String),
    Comment(String),
}

/// One element node: tag, ordered attributes and ordered children.
#[derive(Debug, Clone)]
pub struct XmlElement {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlChild>,
}

/// An XML document as an arena of elements plus the root child list.
#[derive(Debug, Default)]
pub struct ElementTree {
    nodes: Vec<XmlElement>,
    root: Vec<XmlChild>,
    indent: usize,
}

impl ElementTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, tag: &str) -> NodeId {
        self.nodes.push(XmlElement {
            tag: tag.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Append a new element under the document root.
    pub fn create_root_element(&mut self, tag: &str) -> NodeId {
        let id = self.alloc(tag);
        self.root.push(XmlChild::Element(id));
        id
    }

    /// Append a new element under `parent`.
    pub fn create_child_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.alloc(tag);
        self.nodes[parent].children.push(XmlChild::Element(id));
        id
    }

    /// Set an attribute, replacing an existing one with the same key.
    pub fn create_attr(&mut self, id: NodeId, key: &str, value: &str) {
        let attrs = &mut self.nodes[id].attrs;
        if let Some(slot) = attrs.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value.to_string();
        } else {
            attrs.push((key.to_string(), value.to_string()));
        }
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&str> {
        self.nodes[id]
            .attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn tag(&self, id: NodeId) -> &str {
        &self.nodes[id].tag
    }

    /// Replace all text children of `id` with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        let children = &mut self.nodes[id].children;
        children.retain(|c| !matches!(c, XmlChild::Text(_)));
        children.push(XmlChild::Text(text.to_string()));
    }

    /// Concatenated text content of `id`'s direct text children.
    pub fn text(&self, id: NodeId) -> String {
        self.nodes[id]
            .children
            .iter()
            .filter_map(|c| match c {
                XmlChild::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn create_comment(&mut self, id: NodeId, text: &str) {
        self.nodes[id].children.push(XmlChild::Comment(text.to_string()));
    }

    /// First direct child element of `id` with the given tag.
    pub fn select_child(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.child_elements(id).into_iter().find(|&c| self.nodes[c].tag == tag)
    }

    /// First root-level element with the given tag.
    pub fn select_root(&self, tag: &str) -> Option<NodeId> {
        self.root_elements().into_iter().find(|&c| self.nodes[c].tag == tag)
    }

    pub fn child_elements(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id]
            .children
            .iter()
            .filter_map(|c| match c {
                XmlChild::Element(e) => Some(*e),
                _ => None,
            })
            .collect()
    }

    pub fn root_elements(&self) -> Vec<NodeId> {
        self.root
            .iter()
            .filter_map(|c| match c {
                XmlChild::Element(e) => Some(*e),
                _ => None,
            })
            .collect()
    }

    /// Set the indentation width used by [`ElementTree::write_to_string`].
    /// Zero produces compact output.
    pub fn set_indent(&mut self, spaces: usize) {
        self.indent = spaces;
    }

    /// Serialize the document.
    pub fn write_to_string(&self) -> String {
        let mut out = String::new();
        for child in &self.root {
            self.write_child(&mut out, child, 0);
        }
        out
    }

    fn write_child(&self, out: &mut String, child: &XmlChild, level: usize) {
        match child {
            XmlChild::Element(id) => self.write_element(out, *id, level),
            XmlChild::Text(t) => {
                out.push_str(&escape_text(t));
            }
            XmlChild::Comment(t) => {
                self.pad(out, level);
                let _ = write!(out, "<!--{t}-->");
                self.newline(out);
            }
        }
    }

    fn write_element(&self, out: &mut String, id: NodeId, level: usize) {
        let node = &self.nodes[id];
        self.pad(out, level);
        let _ = write!(out, "<{}", node.tag);
        for (k, v) in &node.attrs {
            let _ = write!(out, " {}=\"{}\"", k, escape_attr(v));
        }
        if node.children.is_empty() {
            out.push_str("/>");
            self.newline(out);
            return;
        }
        out.push('>');

        let only_text = node
            .children
            .iter()
            .all(|c| matches!(c, XmlChild::Text(_)));
        if !only_text {
            self.newline(out);
        }
        for child in &node.children {
            self.write_child(out, child, level + 1);
        }
        if !only_text {
            self.pad(out, level);
        }
        let _ = write!(out, "</{}>", node.tag);
        self.newline(out);
    }

    fn pad(&self, out: &mut String, level: usize) {
        if self.indent > 0 {
            for _ in 0..level * self.indent {
                out.push(' ');
            }
        }
    }

    fn newline(&self, out: &mut String) {
        if self.indent > 0 {
            out.push('\n');
        }
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}
