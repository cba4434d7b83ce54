use quick_xml::escape;
use quick_xml::events::{BytesStart, Event as XmlEvent};
use quick_xml::Reader;
use tracing::{trace, warn};

use crate::error::ParseError;

/// One markup event, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open(Tag),
    Close(String),
    Text(String),
}

/// Opening tag with its attributes in source order. Names are ASCII-lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

impl Tag {
    pub fn new(name: &str) -> Self {
        Tag {
            name: name.to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    pub fn attr(mut self, key: &str, value: &str) -> Self {
        self.attrs.push((key.to_ascii_lowercase(), value.to_string()));
        self
    }

    /// First value of attribute `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Streaming tokenizer over decoded export text.
///
/// Tolerant the way browsers are: end tags need not match, stray end tags are
/// fine, attributes may be unquoted or valueless. A construct the reader
/// cannot get through (a downlevel `<![if ...]>` conditional, a truncated tag)
/// is skipped up to its closing `>`; without one the rest of the input is
/// dropped and the stream ends normally. Only a document that is nothing but
/// such a construct yields an error.
pub struct Tokenizer<'a> {
    text: &'a str,
    /// Byte offset of `reader`'s input within `text`.
    base: usize,
    reader: Reader<&'a [u8]>,
    pending_close: Option<String>,
    emitted: bool,
    done: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(text: &'a str) -> Self {
        Tokenizer {
            text,
            base: 0,
            reader: html_reader(text),
            pending_close: None,
            emitted: false,
            done: false,
        }
    }

    fn fail(&mut self, err: quick_xml::Error) -> ParseError {
        self.done = true;
        ParseError::Markup {
            position: (self.base + self.reader.error_position() as usize) as u64,
            message: err.to_string(),
        }
    }

    /// Restart reading after the construct that made the reader fail.
    /// Returns false when that construct never closes.
    fn recover(&mut self, err: &quick_xml::Error) -> bool {
        let text: &'a str = self.text;
        let bytes = text.as_bytes();
        let failed_at = (self.base + self.reader.error_position() as usize).min(bytes.len());
        let upto = (failed_at + 1).min(bytes.len());
        let start = bytes[self.base..upto]
            .iter()
            .rposition(|&b| b == b'<')
            .map_or(failed_at, |i| self.base + i);

        match bytes[start..].iter().position(|&b| b == b'>') {
            Some(i) => {
                let resume = start + i + 1;
                warn!(position = start, error = %err, "unreadable markup skipped");
                self.base = resume;
                self.reader = html_reader(&text[resume..]);
                true
            }
            None => {
                warn!(position = start, error = %err, "unterminated markup at end of input dropped");
                false
            }
        }
    }

    fn read(&mut self) -> Option<Result<Event, ParseError>> {
        loop {
            let event = match self.reader.read_event() {
                Ok(event) => event,
                Err(err) => {
                    if self.recover(&err) {
                        continue;
                    }
                    if self.emitted {
                        self.done = true;
                        return None;
                    }
                    return Some(Err(self.fail(err)));
                }
            };
            match event {
                XmlEvent::Start(e) => return Some(Ok(Event::Open(read_tag(&e)))),
                XmlEvent::Empty(e) => {
                    let tag = read_tag(&e);
                    self.pending_close = Some(tag.name.clone());
                    return Some(Ok(Event::Open(tag)));
                }
                XmlEvent::End(e) => {
                    let name = lowercase_name(e.name().as_ref());
                    return Some(Ok(Event::Close(name)));
                }
                XmlEvent::Text(e) => {
                    let raw = String::from_utf8_lossy(&e);
                    return Some(Ok(Event::Text(unescape(&raw))));
                }
                XmlEvent::CData(e) => {
                    let raw = String::from_utf8_lossy(&e);
                    return Some(Ok(Event::Text(raw.into_owned())));
                }
                XmlEvent::Eof => {
                    self.done = true;
                    return None;
                }
                // comments, doctype, declarations, processing instructions
                other => trace!(event = ?other, "skipped"),
            }
        }
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Event, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(name) = self.pending_close.take() {
            return Some(Ok(Event::Close(name)));
        }
        if self.done {
            return None;
        }
        let item = self.read();
        if matches!(item, Some(Ok(_))) {
            self.emitted = true;
        }
        item
    }
}

fn html_reader(text: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(text);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    config.check_comments = false;
    config.expand_empty_elements = false;
    reader
}

fn read_tag(start: &BytesStart<'_>) -> Tag {
    let name = lowercase_name(start.name().as_ref());
    let mut attrs = Vec::new();
    for attr in start.html_attributes().with_checks(false) {
        match attr {
            Ok(attr) => {
                let key = lowercase_name(attr.key.as_ref());
                let value = unescape(&String::from_utf8_lossy(&attr.value));
                attrs.push((key, value));
            }
            Err(err) => warn!(tag = %name, error = %err, "malformed attribute skipped"),
        }
    }
    Tag { name, attrs }
}

fn lowercase_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

fn unescape(raw: &str) -> String {
    match escape::unescape_with(raw, resolve_entity) {
        Ok(text) => text.into_owned(),
        Err(_) => raw.to_string(),
    }
}

fn resolve_entity(name: &str) -> Option<&'static str> {
    match name {
        "nbsp" => Some("\u{a0}"),
        _ => escape::resolve_predefined_entity(name),
    }
}
