//! XHTML markup tree: parsing, traversal helpers and serialization
//!
//! Converts chapter markup into an owned tree of element and text nodes that
//! the bionic annotator can rebuild without touching a live document. Uses
//! quick_xml for SAX-style parsing and assembles the tree with an explicit
//! element stack, so malformed end tags and unclosed elements degrade
//! gracefully instead of failing the whole chapter.

extern crate alloc;

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use quick_xml::escape::{
    escape, partial_escape, resolve_html5_entity, resolve_predefined_entity, unescape_with,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

/// A node in a markup tree
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkupNode {
    /// Character data (already unescaped)
    Text(String),
    /// Element with tag, attributes and ordered children
    Element(Element),
}

/// Element node payload
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    /// Tag name as written in the source
    pub tag: String,
    /// Attributes in source order, values unescaped
    pub attributes: Vec<(String, String)>,
    /// Child nodes in document order
    pub children: Vec<MarkupNode>,
}

impl Element {
    /// Create an element without attributes or children.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Append an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Replace the children.
    pub fn with_children(mut self, children: Vec<MarkupNode>) -> Self {
        self.children = children;
        self
    }

    /// Look up an attribute value by name (ASCII case-insensitive).
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// True when the tag matches `name` (ASCII case-insensitive).
    pub fn has_tag(&self, name: &str) -> bool {
        self.tag.eq_ignore_ascii_case(name)
    }
}

impl MarkupNode {
    /// Convenience constructor for a text node.
    pub fn text(content: impl Into<String>) -> Self {
        MarkupNode::Text(content.into())
    }

    /// Convenience constructor for an attribute-less element.
    pub fn element(tag: impl Into<String>, children: Vec<MarkupNode>) -> Self {
        MarkupNode::Element(Element::new(tag).with_children(children))
    }

    /// Borrow the text payload, if this is a text node.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MarkupNode::Text(text) => Some(text),
            MarkupNode::Element(_) => None,
        }
    }

    /// Borrow the element payload, if this is an element node.
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            MarkupNode::Element(element) => Some(element),
            MarkupNode::Text(_) => None,
        }
    }
}

/// Error type for markup parsing failures
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum MarkupError {
    /// XML parsing or decoding error
    ParseError(String),
    /// Document exceeded a configured parse limit
    LimitExceeded {
        /// Which limit was hit.
        kind: &'static str,
        /// Configured limit value.
        limit: usize,
    },
}

impl core::fmt::Display for MarkupError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MarkupError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            MarkupError::LimitExceeded { kind, limit } => {
                write!(f, "Markup limit exceeded: {} (limit={})", kind, limit)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MarkupError {}

/// Safety limits applied while building a markup tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseLimits {
    /// Maximum element nesting depth.
    pub max_depth: usize,
    /// Maximum number of element + text nodes in the document.
    pub max_nodes: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_depth: 256,
            max_nodes: 1_000_000,
        }
    }
}

impl ParseLimits {
    /// Override the nesting depth limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Override the node count limit.
    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }
}

/// Parse XHTML into the document's top-level nodes using default limits.
///
/// # Example
/// ```
/// use bionic_reader::markup::{parse_markup, MarkupNode};
///
/// let nodes = parse_markup("<p>Hello <em>world</em></p>").unwrap();
/// assert_eq!(nodes.len(), 1);
/// assert!(matches!(nodes[0], MarkupNode::Element(_)));
/// ```
pub fn parse_markup(html: &str) -> Result<Vec<MarkupNode>, MarkupError> {
    parse_markup_limited(html, ParseLimits::default())
}

/// Parse XHTML into the document's top-level nodes with explicit limits.
pub fn parse_markup_limited(
    html: &str,
    limits: ParseLimits,
) -> Result<Vec<MarkupNode>, MarkupError> {
    let mut reader = Reader::from_str(html);
    reader.config_mut().trim_text(false);
    reader.config_mut().expand_empty_elements = false;
    // Stray or mismatched end tags are repaired by the element stack below
    reader.config_mut().check_end_names = false;

    let mut buf = Vec::new();
    let mut builder = TreeBuilder::new(limits);

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let element = start_element(&e, &reader)?;
                if is_void_element(&element.tag) {
                    // HTML-style `<br>` never gets an end tag
                    builder.push_node(MarkupNode::Element(element))?;
                } else {
                    builder.open(element)?;
                }
            }
            Ok(Event::Empty(e)) => {
                let element = start_element(&e, &reader)?;
                builder.push_node(MarkupNode::Element(element))?;
            }
            Ok(Event::End(e)) => {
                let name = decode_name(e.name().as_ref(), &reader)?;
                builder.close(&name);
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .decode()
                    .map_err(|e| MarkupError::ParseError(format!("Decode error: {:?}", e)))?;
                builder.push_text(&text)?;
            }
            Ok(Event::CData(e)) => {
                let text = reader
                    .decoder()
                    .decode(&e)
                    .map_err(|e| MarkupError::ParseError(format!("Decode error: {:?}", e)))?;
                if builder.in_raw_text() {
                    builder.push_text(&format!("<![CDATA[{}]]>", text))?;
                } else {
                    builder.push_text(&text)?;
                }
            }
            Ok(Event::GeneralRef(e)) => {
                // Entity references: &amp; &lt; &#8220; etc.
                let entity_name = e
                    .decode()
                    .map_err(|e| MarkupError::ParseError(format!("Decode error: {:?}", e)))?;
                let entity_str = format!("&{};", entity_name);
                if builder.in_raw_text() {
                    // Script and style bodies are written back verbatim
                    builder.push_text(&entity_str)?;
                } else {
                    match unescape_with(&entity_str, resolve_entity) {
                        Ok(resolved) => builder.push_text(&resolved)?,
                        Err(_) => builder.push_text(&entity_str)?,
                    }
                }
            }
            Ok(Event::Comment(_))
            | Ok(Event::Decl(_))
            | Ok(Event::PI(_))
            | Ok(Event::DocType(_)) => {}
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(MarkupError::ParseError(format!("XML error: {:?}", e)));
            }
        }
        buf.clear();
    }

    Ok(builder.finish())
}

/// Incremental tree assembly over SAX events.
struct TreeBuilder {
    /// Open elements; index 0 is the synthetic document root.
    stack: Vec<Element>,
    node_count: usize,
    limits: ParseLimits,
}

impl TreeBuilder {
    fn new(limits: ParseLimits) -> Self {
        Self {
            stack: alloc::vec![Element::default()],
            node_count: 0,
            limits,
        }
    }

    fn count_node(&mut self) -> Result<(), MarkupError> {
        self.node_count += 1;
        if self.node_count > self.limits.max_nodes {
            return Err(MarkupError::LimitExceeded {
                kind: "max_nodes",
                limit: self.limits.max_nodes,
            });
        }
        Ok(())
    }

    /// True while inside an element whose text is kept unescaped.
    fn in_raw_text(&self) -> bool {
        self.stack
            .last()
            .is_some_and(|open| is_raw_text_element(&open.tag))
    }

    fn current(&mut self) -> &mut Element {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn open(&mut self, element: Element) -> Result<(), MarkupError> {
        self.count_node()?;
        if self.stack.len() > self.limits.max_depth {
            return Err(MarkupError::LimitExceeded {
                kind: "max_depth",
                limit: self.limits.max_depth,
            });
        }
        self.stack.push(element);
        Ok(())
    }

    fn close(&mut self, name: &str) {
        let Some(pos) = self
            .stack
            .iter()
            .skip(1)
            .rposition(|open| open.has_tag(name))
        else {
            // End tag without a matching open element
            return;
        };
        let target_len = pos + 1;
        while self.stack.len() > target_len {
            self.pop_into_parent();
        }
    }

    fn pop_into_parent(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        if let Some(done) = self.stack.pop() {
            self.current().children.push(MarkupNode::Element(done));
        }
    }

    fn push_node(&mut self, node: MarkupNode) -> Result<(), MarkupError> {
        self.count_node()?;
        self.current().children.push(node);
        Ok(())
    }

    fn push_text(&mut self, text: &str) -> Result<(), MarkupError> {
        if text.is_empty() {
            return Ok(());
        }
        if let Some(MarkupNode::Text(last)) = self.current().children.last_mut() {
            last.push_str(text);
            return Ok(());
        }
        self.push_node(MarkupNode::Text(text.to_string()))
    }

    fn finish(mut self) -> Vec<MarkupNode> {
        while self.stack.len() > 1 {
            self.pop_into_parent();
        }
        self.stack
            .pop()
            .map(|root| root.children)
            .unwrap_or_default()
    }
}

/// Serialize top-level nodes back to XHTML.
///
/// Text and attribute values are escaped; childless void elements are
/// written self-closing.
pub fn to_markup(nodes: &[MarkupNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(&mut out, node);
    }
    out
}

fn write_node(out: &mut String, node: &MarkupNode) {
    match node {
        MarkupNode::Text(text) => out.push_str(&partial_escape(text.as_str())),
        MarkupNode::Element(element) => {
            out.push('<');
            out.push_str(&element.tag);
            for (name, value) in &element.attributes {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape(value.as_str()));
                out.push('"');
            }
            if element.children.is_empty() && is_void_element(&element.tag) {
                out.push_str("/>");
                return;
            }
            out.push('>');
            let raw = is_raw_text_element(&element.tag);
            for child in &element.children {
                match child {
                    MarkupNode::Text(text) if raw => out.push_str(text),
                    _ => write_node(out, child),
                }
            }
            out.push_str("</");
            out.push_str(&element.tag);
            out.push('>');
        }
    }
}

/// Concatenate all descendant text of a node.
pub fn text_content(node: &MarkupNode) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

/// Concatenate all text in a document.
pub fn document_text(nodes: &[MarkupNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        collect_text(node, &mut out);
    }
    out
}

fn collect_text(node: &MarkupNode, out: &mut String) {
    match node {
        MarkupNode::Text(text) => out.push_str(text),
        MarkupNode::Element(element) => {
            for child in &element.children {
                collect_text(child, out);
            }
        }
    }
}

/// Elements whose text content is written back without escaping
fn is_raw_text_element(tag: &str) -> bool {
    tag.eq_ignore_ascii_case("script") || tag.eq_ignore_ascii_case("style")
}

/// XML predefined entities first, then the HTML5 named set (`&nbsp;`, `&mdash;`, ...)
fn resolve_entity(name: &str) -> Option<&'static str> {
    resolve_predefined_entity(name).or_else(|| resolve_html5_entity(name))
}

/// Elements that never carry content in HTML
fn is_void_element(tag: &str) -> bool {
    const VOID: &[&str] = &[
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
        "source", "track", "wbr",
    ];
    VOID.iter().any(|void| tag.eq_ignore_ascii_case(void))
}

fn start_element(e: &BytesStart, reader: &Reader<&[u8]>) -> Result<Element, MarkupError> {
    let tag = decode_name(e.name().as_ref(), reader)?;
    let mut element = Element::new(tag);
    // Lenient attribute parsing: malformed attributes are dropped
    for attr in e.attributes().with_checks(false).flatten() {
        let Ok(key) = reader.decoder().decode(attr.key.as_ref()) else {
            continue;
        };
        let Ok(raw) = reader.decoder().decode(&attr.value) else {
            continue;
        };
        let value = match unescape_with(&raw, resolve_entity) {
            Ok(value) => value.to_string(),
            Err(_) => raw.to_string(),
        };
        element.attributes.push((key.to_string(), value));
    }
    Ok(element)
}

/// Decode element name from bytes
fn decode_name(name: &[u8], reader: &Reader<&[u8]>) -> Result<String, MarkupError> {
    reader
        .decoder()
        .decode(name)
        .map_err(|e| MarkupError::ParseError(format!("Decode error: {:?}", e)))
        .map(|s| s.to_string())
}
