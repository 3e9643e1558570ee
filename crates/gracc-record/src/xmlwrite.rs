// SPDX-License-Identifier: MIT OR Apache-2.0
//! Small helper for re-marshalling a parsed record back to XML, used by
//! the `"xml"` publish format.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

/// Accumulates XML events into a `Vec<u8>`, writing elements depth-first.
pub struct XmlWriter {
    inner: Writer<Vec<u8>>,
}

impl XmlWriter {
    pub fn new() -> Self {
        Self { inner: Writer::new(Vec::new()) }
    }

    /// Write `<name attr1="v1" ...>text</name>`, or a self-closing tag when
    /// both `text` and `attrs` leave nothing to say and `text` is `None`.
    pub fn leaf(&mut self, name: &str, attrs: &[(&str, &str)], text: Option<&str>) {
        let mut start = BytesStart::new(name);
        for (k, v) in attrs {
            start.push_attribute((*k, *v));
        }
        match text {
            Some(t) if !t.is_empty() => {
                self.inner.write_event(Event::Start(start)).ok();
                self.inner.write_event(Event::Text(BytesText::new(t))).ok();
                self.inner.write_event(Event::End(BytesEnd::new(name))).ok();
            }
            _ => {
                self.inner.write_event(Event::Empty(start)).ok();
            }
        }
    }

    pub fn open(&mut self, name: &str, attrs: &[(&str, &str)]) {
        let mut start = BytesStart::new(name);
        for (k, v) in attrs {
            start.push_attribute((*k, *v));
        }
        self.inner.write_event(Event::Start(start)).ok();
    }

    pub fn close(&mut self, name: &str) {
        self.inner.write_event(Event::End(BytesEnd::new(name))).ok();
    }

    pub fn finish(self) -> String {
        String::from_utf8_lossy(&self.inner.into_inner()).into_owned()
    }
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}
