//! Pull-style cursor over a definition document
//!
//! The compiler walks documents through [`DocumentCursor`] so any nested-tag
//! source can feed it. [`XmlDocument`] is the XML implementation built on
//! `quick-xml`.
//!
//! Depth follows the usual pull-parser convention: it is 0 before the root,
//! increases on each start tag and an end tag reports the depth of the element
//! it closes.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{BinderyError, Result};

/// Event kinds surfaced by a document cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocEvent {
    StartTag,
    EndTag,
    Text,
    EndDocument,
}

/// Pull-style reader over a nested tag document
pub trait DocumentCursor {
    /// Advance to the next event
    fn next(&mut self) -> Result<DocEvent>;

    /// Nesting depth of the current element
    fn depth(&self) -> usize;

    /// Name of the current element (start or end tag)
    fn name(&self) -> &str;

    /// Attribute of the current start tag, matched on its local name
    fn attribute(&self, name: &str) -> Option<&str>;

    /// Identifier of the document, used in error messages
    fn source_name(&self) -> &str;
}

/// XML definition document
pub struct XmlDocument<'a> {
    reader: Reader<&'a [u8]>,
    source_name: String,
    depth: usize,
    name: String,
    attributes: Vec<(String, String)>,
    /// Self-closing element whose end tag is still owed
    pending_end: bool,
    /// Depth to drop before reading the next event
    pop_on_next: bool,
}

impl<'a> XmlDocument<'a> {
    pub fn new(source_name: impl Into<String>, xml: &'a str) -> Self {
        Self {
            reader: Reader::from_str(xml),
            source_name: source_name.into(),
            depth: 0,
            name: String::new(),
            attributes: Vec::new(),
            pending_end: false,
            pop_on_next: false,
        }
    }

    fn malformed(&self, details: impl Into<String>) -> BinderyError {
        BinderyError::Document {
            source_name: self.source_name.clone(),
            details: details.into(),
        }
    }

    fn enter(&mut self, start: &BytesStart<'_>) -> Result<()> {
        self.depth += 1;
        self.name = String::from_utf8_lossy(start.name().local_name().as_ref()).into_owned();
        self.attributes.clear();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| self.malformed(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| self.malformed(e.to_string()))?
                .into_owned();
            self.attributes.push((key, value));
        }
        Ok(())
    }
}

impl DocumentCursor for XmlDocument<'_> {
    fn next(&mut self) -> Result<DocEvent> {
        if self.pop_on_next {
            self.depth = self.depth.saturating_sub(1);
            self.pop_on_next = false;
        }

        if self.pending_end {
            self.pending_end = false;
            self.attributes.clear();
            self.pop_on_next = true;
            return Ok(DocEvent::EndTag);
        }

        loop {
            match self.reader.read_event() {
                Ok(Event::Start(start)) => {
                    self.enter(&start)?;
                    return Ok(DocEvent::StartTag);
                }
                Ok(Event::Empty(start)) => {
                    self.enter(&start)?;
                    self.pending_end = true;
                    return Ok(DocEvent::StartTag);
                }
                Ok(Event::End(end)) => {
                    self.name = String::from_utf8_lossy(end.name().local_name().as_ref()).into_owned();
                    self.attributes.clear();
                    self.pop_on_next = true;
                    return Ok(DocEvent::EndTag);
                }
                Ok(Event::Text(text)) => {
                    if text.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    return Ok(DocEvent::Text);
                }
                Ok(Event::CData(_)) => return Ok(DocEvent::Text),
                Ok(Event::Eof) => {
                    if self.depth > 0 {
                        return Err(self.malformed(format!("unclosed element <{}>", self.name)));
                    }
                    return Ok(DocEvent::EndDocument);
                }
                // Declarations, comments, processing instructions, doctype
                Ok(_) => continue,
                Err(e) => {
                    let position = self.reader.buffer_position();
                    return Err(self.malformed(format!("{e} at byte {position}")));
                }
            }
        }
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn source_name(&self) -> &str {
        &self.source_name
    }
}
