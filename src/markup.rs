//! Inline rich text: plain text interleaved with annotation elements such as
//! `<mrk type="term">` or `<ph/>` placeholders.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::error::MarkupError;
use crate::sentinels::{escape_attr, unguard, TERM_MARKER_NAME};

const FRAGMENT_ROOT: &str = "am-fragment";

/// Elements whose content is native code rather than translatable text.
const CODE_ELEMENTS: [&str; 4] = ["ph", "bpt", "ept", "it"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Element(Element),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    fn new(name: String, attrs: Vec<(String, String)>) -> Self {
        Self {
            name,
            attrs,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::new();
        flatten_into(&self.children, &mut out);
        out
    }

    fn is_term_marker(&self) -> bool {
        self.name == TERM_MARKER_NAME && self.attr("type") == Some("term")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RichText {
    nodes: Vec<Node>,
}

impl RichText {
    /// Rich text holding a single text run.
    pub fn plain(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            return Self::default();
        }
        Self {
            nodes: vec![Node::Text(text)],
        }
    }

    /// Parses an inline markup fragment (no enclosing element required).
    pub fn parse(markup: &str) -> Result<Self, MarkupError> {
        let wrapped = format!("<{FRAGMENT_ROOT}>{markup}</{FRAGMENT_ROOT}>");
        let mut reader = Reader::from_str(&wrapped);
        reader.config_mut().trim_text(false);

        let mut stack: Vec<Element> = Vec::new();
        let mut finished: Option<Vec<Node>> = None;
        loop {
            let ev = reader
                .read_event()
                .map_err(|e| MarkupError::new(e.to_string()))?;
            match ev {
                Event::Eof => break,
                Event::Start(s) => {
                    if finished.is_some() {
                        return Err(MarkupError::new("content after end of fragment"));
                    }
                    stack.push(Element::new(element_name(&s), collect_attrs(&s)?));
                }
                Event::Empty(s) => {
                    let el = Element::new(element_name(&s), collect_attrs(&s)?);
                    push_node(&mut stack, Node::Element(el))?;
                }
                Event::End(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    let el = stack
                        .pop()
                        .ok_or_else(|| MarkupError::new(format!("unexpected </{name}>")))?;
                    if el.name != name {
                        return Err(MarkupError::new(format!(
                            "expected </{}> but found </{name}>",
                            el.name
                        )));
                    }
                    if stack.is_empty() {
                        finished = Some(el.children);
                    } else {
                        push_node(&mut stack, Node::Element(el))?;
                    }
                }
                Event::Text(t) => {
                    let txt = t
                        .unescape()
                        .map_err(|e| MarkupError::new(format!("bad escape: {e}")))?
                        .into_owned();
                    if !txt.is_empty() {
                        push_node(&mut stack, Node::Text(txt))?;
                    }
                }
                Event::CData(t) => {
                    let txt = String::from_utf8_lossy(&t.into_inner()).into_owned();
                    push_node(&mut stack, Node::Text(txt))?;
                }
                Event::Comment(_) | Event::PI(_) => {}
                Event::Decl(_) | Event::DocType(_) => {
                    return Err(MarkupError::new("declarations are not allowed inline"));
                }
            }
        }

        if let Some(open) = stack.last() {
            return Err(MarkupError::new(format!("unclosed <{}>", open.name)));
        }
        let nodes = finished.ok_or_else(|| MarkupError::new("empty fragment"))?;
        Ok(Self {
            nodes: merge_text(nodes),
        })
    }

    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Plain text with every tag stripped.
    #[must_use]
    pub fn flatten(&self) -> String {
        let mut out = String::new();
        flatten_into(&self.nodes, &mut out);
        out
    }

    #[must_use]
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        write_nodes(&self.nodes, &mut out);
        out
    }

    /// Restores guarded characters in every text run.
    #[must_use]
    pub fn unguarded(self) -> Self {
        fn walk(nodes: Vec<Node>) -> Vec<Node> {
            nodes
                .into_iter()
                .map(|n| match n {
                    Node::Text(t) => Node::Text(unguard(&t)),
                    Node::Element(mut el) => {
                        el.children = walk(el.children);
                        Node::Element(el)
                    }
                })
                .collect()
        }
        Self {
            nodes: walk(self.nodes),
        }
    }

    /// Every `<mrk type="term">` annotation, in document order.
    #[must_use]
    pub fn term_markers(&self) -> Vec<&Element> {
        fn collect<'a>(nodes: &'a [Node], out: &mut Vec<&'a Element>) {
            for n in nodes {
                if let Node::Element(el) = n {
                    if el.is_term_marker() {
                        out.push(el);
                    }
                    collect(&el.children, out);
                }
            }
        }
        let mut out = Vec::new();
        collect(&self.nodes, &mut out);
        out
    }
}

impl TryFrom<String> for RichText {
    type Error = MarkupError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RichText> for String {
    fn from(value: RichText) -> Self {
        value.to_markup()
    }
}

impl std::fmt::Display for RichText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_markup())
    }
}

fn element_name(s: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(s.name().as_ref()).into_owned()
}

fn collect_attrs(s: &BytesStart<'_>) -> Result<Vec<(String, String)>, MarkupError> {
    let mut attrs = Vec::new();
    for a in s.attributes() {
        let a = a.map_err(|e| MarkupError::new(format!("bad attribute: {e}")))?;
        let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
        let val = a
            .unescape_value()
            .map_err(|e| MarkupError::new(format!("bad attribute value: {e}")))?
            .into_owned();
        attrs.push((key, val));
    }
    Ok(attrs)
}

fn push_node(stack: &mut [Element], node: Node) -> Result<(), MarkupError> {
    let parent = stack
        .last_mut()
        .ok_or_else(|| MarkupError::new("content outside of fragment"))?;
    parent.children.push(node);
    Ok(())
}

fn merge_text(nodes: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
    for n in nodes {
        match n {
            Node::Text(t) => {
                if let Some(Node::Text(prev)) = out.last_mut() {
                    prev.push_str(&t);
                } else {
                    out.push(Node::Text(t));
                }
            }
            Node::Element(mut el) => {
                el.children = merge_text(el.children);
                out.push(Node::Element(el));
            }
        }
    }
    out
}

fn flatten_into(nodes: &[Node], out: &mut String) {
    for n in nodes {
        match n {
            Node::Text(t) => out.push_str(t),
            Node::Element(el) => {
                if !CODE_ELEMENTS.contains(&el.name.as_str()) {
                    flatten_into(&el.children, out);
                }
            }
        }
    }
}

fn write_nodes(nodes: &[Node], out: &mut String) {
    for n in nodes {
        match n {
            Node::Text(t) => {
                for ch in t.chars() {
                    match ch {
                        '&' => out.push_str("&amp;"),
                        '<' => out.push_str("&lt;"),
                        '>' => out.push_str("&gt;"),
                        _ => out.push(ch),
                    }
                }
            }
            Node::Element(el) => {
                out.push('<');
                out.push_str(&el.name);
                for (k, v) in &el.attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(v));
                    out.push('"');
                }
                if el.children.is_empty() {
                    out.push_str("/>");
                } else {
                    out.push('>');
                    write_nodes(&el.children, out);
                    out.push_str("</");
                    out.push_str(&el.name);
                    out.push('>');
                }
            }
        }
    }
}
