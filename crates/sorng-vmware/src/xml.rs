//! Lightweight, schema-tolerant XML tree for vim25 responses.
//!
//! The endpoint's nesting and tag casing drift between server versions, so
//! callers navigate by structural predicates (`find_first`, `find_all`)
//! instead of fixed paths. Element and attribute names are stored without
//! their namespace prefix and compared case-insensitively.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use std::str;

/// Name of the synthetic node that holds the document's top-level elements.
pub const DOCUMENT_NODE: &str = "#document";

/// One XML element with its attributes, text and child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct XmlNode {
    /// Local name (namespace prefix stripped).
    pub name: String,
    /// Attributes as `(qualified name, unescaped value)`.
    pub attributes: Vec<(String, String)>,
    /// Direct text content, trimmed.
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// An empty document, used when a body cannot be parsed.
    pub fn empty_document() -> Self {
        Self::new(DOCUMENT_NODE)
    }

    /// Parse a complete document. The returned node is a synthetic
    /// [`DOCUMENT_NODE`] whose children are the top-level elements.
    pub fn parse(xml: &str) -> Result<XmlNode, String> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlNode> = vec![XmlNode::empty_document()];

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    stack.push(element_from(e)?);
                }
                Ok(Event::Empty(ref e)) => {
                    let node = element_from(e)?;
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(node);
                    }
                }
                Ok(Event::End(_)) => {
                    if stack.len() < 2 {
                        return Err(format!(
                            "unbalanced closing tag at position {}",
                            reader.buffer_position()
                        ));
                    }
                    if let Some(node) = stack.pop() {
                        if let Some(parent) = stack.last_mut() {
                            parent.children.push(node);
                        }
                    }
                }
                Ok(Event::Text(ref e)) => {
                    let text = e
                        .unescape()
                        .map(|t| t.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(e).into_owned());
                    append_text(&mut stack, &text);
                }
                Ok(Event::CData(ref e)) => {
                    let text = String::from_utf8_lossy(e).into_owned();
                    append_text(&mut stack, &text);
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(format!(
                        "XML error at position {}: {}",
                        reader.buffer_position(),
                        e
                    ))
                }
                _ => {}
            }
        }

        if stack.len() != 1 {
            return Err(format!(
                "unexpected end of document ({} unclosed element(s))",
                stack.len() - 1
            ));
        }
        let document = stack.pop().unwrap_or_else(XmlNode::empty_document);
        if document.children.is_empty() {
            return Err("document has no root element".into());
        }
        Ok(document)
    }

    /// Case-insensitive match on the local name.
    pub fn is(&self, local_name: &str) -> bool {
        self.name.eq_ignore_ascii_case(local_name)
    }

    /// Attribute value by name (case-insensitive). An exact match on the
    /// qualified name wins; otherwise the first attribute whose local part
    /// matches is returned.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .or_else(|| {
                self.attributes
                    .iter()
                    .find(|(k, _)| local_part(k).eq_ignore_ascii_case(name))
            })
            .map(|(_, v)| v.as_str())
    }

    /// Value of a prefixed `type` attribute such as `xsi:type`.
    pub fn xsi_type(&self) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.contains(':') && local_part(k).eq_ignore_ascii_case("type"))
            .map(|(_, v)| v.as_str())
    }

    /// First direct child with the given local name.
    pub fn child(&self, local_name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.is(local_name))
    }

    /// All direct children with the given local name.
    pub fn children_named<'a>(
        &'a self,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.is(local_name))
    }

    /// Trimmed direct text of the first child with the given name.
    pub fn child_text(&self, local_name: &str) -> Option<&str> {
        self.child(local_name).map(|c| c.text.as_str())
    }

    /// Depth-first, pre-order iterator over all descendants (not `self`).
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }

    /// First descendant matching `pred`, in document order.
    pub fn find_first<P>(&self, pred: P) -> Option<&XmlNode>
    where
        P: Fn(&XmlNode) -> bool,
    {
        self.descendants().find(|n| pred(n))
    }

    /// Every descendant matching `pred`, in document order.
    pub fn find_all<P>(&self, pred: P) -> Vec<&XmlNode>
    where
        P: Fn(&XmlNode) -> bool,
    {
        self.descendants().filter(|n| pred(n)).collect()
    }

    /// Concatenated text of this node and all its descendants.
    pub fn text_content(&self) -> String {
        let mut out = self.text.clone();
        for node in self.descendants() {
            if node.text.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&node.text);
        }
        out
    }

    /// No text and no children anywhere below this node.
    pub fn is_blank(&self) -> bool {
        self.text.is_empty() && self.children.is_empty()
    }
}

/// Pre-order descendant walker returned by [`XmlNode::descendants`].
pub struct Descendants<'a> {
    stack: Vec<&'a XmlNode>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a XmlNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

fn element_from(e: &BytesStart) -> Result<XmlNode, String> {
    let name = str::from_utf8(e.local_name().as_ref())
        .map_err(|_| "Invalid UTF-8 in tag name".to_string())?
        .to_string();

    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = str::from_utf8(attr.key.as_ref())
            .map_err(|_| "Invalid UTF-8 in attribute name".to_string())?
            .to_string();
        let val = attr.unescape_value().map_err(|e| e.to_string())?;
        attributes.push((key, val.into_owned()));
    }

    Ok(XmlNode {
        name,
        attributes,
        ..Default::default()
    })
}

fn local_part(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn append_text(stack: &mut [XmlNode], text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(node) = stack.last_mut() {
        node.text.push_str(text);
    }
}
