//! A minimal, ordered XML tree built from `quick-xml`'s pull events.
//!
//! `DynamicSqlResolver` needs `lxml`'s text/tail model — "the text before the
//! first child" plus "the text following each child, before the next
//! sibling" — so children are stored as an ordered mix of text runs and
//! element nodes rather than split into separate `text`/`children` fields.
//! That keeps flattening a straight recursive walk over `children` in
//! document order, the same shape the original resolver's element-child
//! iteration has.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub enum XmlChild {
    Text(String),
    Element(XmlNode),
}

#[derive(Debug, Clone, Default)]
pub struct XmlNode {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub children: Vec<XmlChild>,
}

impl XmlNode {
    /// Local tag name, namespace prefix stripped (`{ns}select` → `select`,
    /// `mapper:select` → `select`) — some code generators emit a default
    /// namespace on MyBatis mapper XML.
    pub fn local_tag(&self) -> &str {
        local_name(&self.tag)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|s| s.as_str())
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &XmlNode> {
        self.children.iter().filter_map(|c| match c {
            XmlChild::Element(el) => Some(el),
            XmlChild::Text(_) => None,
        })
    }

    /// Every element in the subtree, this node included, in document order.
    pub fn descendants(&self) -> Vec<&XmlNode> {
        let mut out = vec![self];
        for child in self.child_elements() {
            out.extend(child.descendants());
        }
        out
    }
}

pub fn local_name(tag: &str) -> &str {
    if let Some(pos) = tag.rfind('}') {
        &tag[pos + 1..]
    } else if let Some(pos) = tag.rfind(':') {
        &tag[pos + 1..]
    } else {
        tag
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DomError {
    #[error("xml parse error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed attribute: {0}")]
    Attr(String),
    #[error("no root element found")]
    Empty,
}

pub fn parse_document(source: &str) -> Result<XmlNode, DomError> {
    let mut reader = Reader::from_str(source);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) => {
                let node = build_node(&start)?;
                stack.push(node);
            }
            Event::Empty(start) => {
                let node = build_node(&start)?;
                push_child(&mut stack, &mut root, XmlChild::Element(node));
            }
            Event::Text(text) => {
                let text = text.unescape().unwrap_or_default().into_owned();
                if !text.is_empty() {
                    push_text(&mut stack, &mut root, text);
                }
            }
            Event::CData(cdata) => {
                let text = String::from_utf8_lossy(&cdata.into_inner()).into_owned();
                push_text(&mut stack, &mut root, text);
            }
            Event::End(_) => {
                if let Some(node) = stack.pop() {
                    push_child(&mut stack, &mut root, XmlChild::Element(node));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    root.ok_or(DomError::Empty)
}

fn build_node(start: &quick_xml::events::BytesStart) -> Result<XmlNode, DomError> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attrs = BTreeMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| DomError::Attr(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| DomError::Attr(e.to_string()))?
            .into_owned();
        attrs.insert(key, value);
    }
    Ok(XmlNode {
        tag,
        attrs,
        children: Vec::new(),
    })
}

fn push_child(stack: &mut [XmlNode], root: &mut Option<XmlNode>, child: XmlChild) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(child);
    } else if let XmlChild::Element(node) = child {
        *root = Some(node);
    }
}

fn push_text(stack: &mut [XmlNode], root: &mut Option<XmlNode>, text: String) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlChild::Text(text));
    } else {
        let _ = root;
    }
}
