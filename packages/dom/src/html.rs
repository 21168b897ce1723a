//! HTML parsing and serialization
//!
//! Parsing goes through html5ever's `RcDom` and is converted into the arena.
//! Whitespace-only text is kept so serialization reproduces the page.
//!
//! Fragments (inner HTML, inserted markup) are parsed the way `innerHTML`
//! does it: against a context element, so `<td>` markup meant for a `<tr>`
//! stays a cell instead of collapsing into text.

use crate::document::Document;
use crate::error::{DomError, DomResult};
use crate::node::{ElementData, NodeData, NodeId};
use html5ever::tendril::TendrilSink;
use html5ever::{ns, parse_document, parse_fragment, LocalName, QualName};
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};
use tracing::debug;

/// Void elements (no end tag)
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Raw text elements (content is not escaped)
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext",
];

fn parse_rcdom(html: &str) -> DomResult<RcDom> {
    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .map_err(|e| DomError::HtmlParse(e.to_string()))
}

fn parse_rcdom_fragment(context: &str, html: &str) -> DomResult<RcDom> {
    let context = QualName::new(None, ns!(html), LocalName::from(context));
    parse_fragment(RcDom::default(), Default::default(), context, Vec::new(), false)
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .map_err(|e| DomError::HtmlParse(e.to_string()))
}

impl Document {
    /// Parse a full HTML document
    pub fn parse(html: &str, url: &str) -> DomResult<Self> {
        debug!(url = %url, bytes = html.len(), "Parsing HTML document");

        let dom = parse_rcdom(html)?;
        let mut document = Document::new(url);
        let root = document.root();
        for child in dom.document.children.borrow().iter() {
            if let Some(id) = document.convert(child) {
                document.append_child(root, id)?;
            }
        }

        debug!(nodes = document.len(), "Parsed HTML document");
        Ok(document)
    }

    /// Parse markup into detached top-level nodes owned by this document,
    /// as if assigned to a `<body>`'s inner HTML
    pub fn parse_fragment(&mut self, html: &str) -> DomResult<Vec<NodeId>> {
        self.parse_fragment_in("body", html)
    }

    /// Parse markup as the inner HTML of a `context` element (tag name)
    pub fn parse_fragment_in(&mut self, context: &str, html: &str) -> DomResult<Vec<NodeId>> {
        let dom = parse_rcdom_fragment(&context.to_ascii_lowercase(), html)?;

        // The fragment parser puts everything under a synthetic <html> root
        let children = dom.document.children.borrow();
        let Some(root) = children
            .iter()
            .find(|c| matches!(c.data, RcNodeData::Element { .. }))
        else {
            return Ok(Vec::new());
        };

        let mut nodes = Vec::new();
        for child in root.children.borrow().iter() {
            if let Some(id) = self.convert(child) {
                nodes.push(id);
            }
        }
        Ok(nodes)
    }

    /// Replace the children of `id` with parsed markup, returning the
    /// previous children (detached)
    pub fn set_inner_html(&mut self, id: NodeId, html: &str) -> DomResult<Vec<NodeId>> {
        if !self.is_element(id) {
            return Err(DomError::NotAnElement(id));
        }
        let context = self.tag_name(id).unwrap_or("body").to_string();
        let nodes = self.parse_fragment_in(&context, html)?;
        self.replace_children(id, nodes)
    }

    /// Serialize the children of a node
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.serialize_children(id, &mut out);
        out
    }

    /// Serialize a node including itself
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.serialize_node(id, &mut out);
        out
    }

    /// Serialize the whole document
    pub fn to_html(&self) -> String {
        self.inner_html(self.root())
    }

    fn convert(&mut self, handle: &Handle) -> Option<NodeId> {
        match &handle.data {
            RcNodeData::Document => None,
            RcNodeData::Doctype { name, .. } => Some(self.create_doctype(name.to_string())),
            RcNodeData::Text { contents } => Some(self.create_text(contents.borrow().to_string())),
            RcNodeData::Comment { contents } => Some(self.create_comment(contents.to_string())),
            RcNodeData::Element { name, attrs, .. } => {
                let id = self.create_element(&name.local);
                if let Some(elem) = self.element_mut(id) {
                    for attr in attrs.borrow().iter() {
                        elem.set_attr(&attr.name.local, attr.value.to_string());
                    }
                }
                for child in handle.children.borrow().iter() {
                    if let Some(child_id) = self.convert(child) {
                        // Fresh nodes, no cycle possible.
                        let _ = self.append_child(id, child_id);
                    }
                }
                Some(id)
            }
            RcNodeData::ProcessingInstruction { .. } => None,
        }
    }

    fn serialize_children(&self, id: NodeId, out: &mut String) {
        for child in self.children(id) {
            self.serialize_node(*child, out);
        }
    }

    fn serialize_node(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };

        match &node.data {
            NodeData::Document => self.serialize_children(id, out),
            NodeData::Doctype { name } => {
                out.push_str("<!DOCTYPE ");
                out.push_str(name);
                out.push('>');
            }
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::Text(text) => {
                let raw = self
                    .parent(id)
                    .and_then(|p| self.tag_name(p))
                    .is_some_and(|tag| RAW_TEXT_ELEMENTS.contains(&tag));
                if raw {
                    out.push_str(text);
                } else {
                    escape_text(text, out);
                }
            }
            NodeData::Element(elem) => {
                write_start_tag(elem, out);
                if VOID_ELEMENTS.contains(&elem.tag.as_str()) {
                    return;
                }
                self.serialize_children(id, out);
                out.push_str("</");
                out.push_str(&elem.tag);
                out.push('>');
            }
        }
    }
}

fn write_start_tag(elem: &ElementData, out: &mut String) {
    out.push('<');
    out.push_str(&elem.tag);
    for attr in &elem.attributes {
        out.push(' ');
        out.push_str(&attr.name);
        out.push_str("=\"");
        escape_attribute(&attr.value, out);
        out.push('"');
    }
    out.push('>');
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_serialize_body() {
        let doc = Document::parse(
            "<!DOCTYPE html><html><head></head><body><p class=\"a\">Hi &amp; bye</p><br></body></html>",
            "https://x.test/",
        )
        .unwrap();

        let body = doc.body().unwrap();
        assert_eq!(doc.inner_html(body), "<p class=\"a\">Hi &amp; bye</p><br>");
        assert!(doc.to_html().starts_with("<!DOCTYPE html><html>"));
    }

    #[test]
    fn test_whitespace_text_kept() {
        let doc = Document::parse("<body><ul>\n  <li>a</li>\n</ul></body>", "about:blank").unwrap();
        let ul = doc.query_selector("ul").unwrap().unwrap();
        assert_eq!(doc.inner_html(ul), "\n  <li>a</li>\n");
    }

    #[test]
    fn test_set_inner_html_returns_previous_children() {
        let mut doc = Document::parse("<body><div id=\"box\"><b>old</b></div></body>", "about:blank").unwrap();
        let div = doc.get_element_by_id("box").unwrap();

        let old = doc.set_inner_html(div, "<i>new</i> text").unwrap();
        assert_eq!(doc.inner_html(div), "<i>new</i> text");
        assert_eq!(old.len(), 1);

        doc.replace_children(div, old).unwrap();
        assert_eq!(doc.inner_html(div), "<b>old</b>");
    }

    #[test]
    fn test_script_content_not_escaped() {
        let doc = Document::parse("<body><script>if (a < b) {}</script></body>", "about:blank").unwrap();
        let body = doc.body().unwrap();
        assert_eq!(doc.inner_html(body), "<script>if (a < b) {}</script>");
    }

    #[test]
    fn test_fragment_parsed_against_context() {
        let mut doc = Document::parse("<body></body>", "about:blank").unwrap();

        let cells = doc.parse_fragment_in("tr", "<td>new</td>").unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(doc.tag_name(cells[0]), Some("td"));

        // Without a table context the cell tags are dropped
        let loose = doc.parse_fragment("<td>new</td>").unwrap();
        assert!(!doc.is_element(loose[0]));
    }

    #[test]
    fn test_set_inner_html_of_table_row() {
        let mut doc = Document::parse(
            "<body><table><tbody><tr id=\"row\"><td>old</td></tr></tbody></table></body>",
            "about:blank",
        )
        .unwrap();
        let row = doc.get_element_by_id("row").unwrap();

        doc.set_inner_html(row, "<td>a</td><td>b</td>").unwrap();
        assert_eq!(doc.inner_html(row), "<td>a</td><td>b</td>");
    }
}
