// SPDX-License-Identifier: MIT OR Apache-2.0
//! Minimal generic XML tree, used as an intermediate form between the raw
//! bytes a probe submits and the typed record structs in [`crate::record`].
//!
//! The record families this crate parses (`JobUsageRecord`, `StorageElement`,
//! `StorageElementRecord`) all share the same shape: a handful of known
//! child elements with attributes, plus an open-ended set of unrecognised
//! children that get captured verbatim into a record's `Fields` list.
//! Building a generic tree first and then interpreting it keeps that
//! "known children vs. everything else" logic in one place instead of
//! duplicated across three `serde`-derived structs.

use quick_xml::events::Event;
use quick_xml::Reader;

/// One element of a parsed XML document: local name (namespace prefix
/// stripped, if any), attributes in document order, concatenated text
/// content, and child elements in document order.
#[derive(Debug, Clone, Default)]
pub struct XmlNode {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// First attribute matching `key`, if any.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All direct children named `name`, in document order.
    pub fn children_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First direct child named `name`, if any.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children_named(name).next()
    }

    /// Trimmed text of the first direct child named `name`, if any and
    /// non-empty.
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).map(|c| c.text.trim().to_string())
    }
}

fn local_name(qname: quick_xml::name::QName<'_>) -> String {
    let raw = String::from_utf8_lossy(qname.as_ref());
    match raw.rfind(':') {
        Some(idx) => raw[idx + 1..].to_string(),
        None => raw.into_owned(),
    }
}

fn collect_attrs(e: &quick_xml::events::BytesStart<'_>) -> Vec<(String, String)> {
    e.attributes()
        .filter_map(|a| a.ok())
        .map(|a| {
            let key = local_name(a.key);
            let value = a
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_default();
            (key, value)
        })
        .collect()
}

fn push_child(stack: &mut Vec<XmlNode>, root: &mut Option<XmlNode>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => *root = Some(node),
    }
}

/// Parse `input` into a single root [`XmlNode`].
///
/// Returns an error for ill-formed XML (unbalanced tags, invalid entities,
/// …) or for input with no root element at all.
pub fn parse(input: &str) -> Result<XmlNode, quick_xml::Error> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                stack.push(XmlNode {
                    name: local_name(e.name()),
                    attrs: collect_attrs(&e),
                    text: String::new(),
                    children: Vec::new(),
                });
            }
            Event::Empty(e) => {
                let node = XmlNode {
                    name: local_name(e.name()),
                    attrs: collect_attrs(&e),
                    text: String::new(),
                    children: Vec::new(),
                };
                push_child(&mut stack, &mut root, node);
            }
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    if let Ok(unescaped) = t.unescape() {
                        top.text.push_str(&unescaped);
                    }
                }
            }
            Event::CData(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Event::End(_) => {
                if let Some(node) = stack.pop() {
                    push_child(&mut stack, &mut root, node);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    root.ok_or_else(|| quick_xml::Error::UnexpectedEof("no root element".to_string()))
}
