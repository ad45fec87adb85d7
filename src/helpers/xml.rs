//! XML utilities for the SpreadsheetML parts of an `.xlsx` package.
//! Provides a reader wrapper, attribute/text helpers and small writer helpers
//! used when a worksheet is streamed back out.

use crate::error::SheetError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Reader;
use quick_xml::Writer;
use std::borrow::Cow;
use std::io::BufRead;
use std::io::Write;
use std::str::FromStr;
use thiserror::Error;

/// Errors specific to XML parsing operations
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Parse entity '{0}' failed")]
    ParseEntityError(String),

    #[error("Parse attribute value '{0}' failed")]
    ParseAttributeValueError(String),
}

/// XML reader wrapper with a reusable event buffer
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    /// Creates a reader tuned for extracting cell values.
    /// Empty elements are expanded so `<c/>` and `<c></c>` look the same.
    pub(crate) fn new(buf_reader: R) -> XmlReader<R> {
        Self::with_expansion(buf_reader, true)
    }

    /// Creates a reader whose events can be written back unchanged.
    pub(crate) fn verbatim(buf_reader: R) -> XmlReader<R> {
        Self::with_expansion(buf_reader, false)
    }

    fn with_expansion(buf_reader: R, expand_empty_elements: bool) -> XmlReader<R> {
        let mut reader = Reader::from_reader(buf_reader);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        config.expand_empty_elements = expand_empty_elements;
        config.trim_text(false);

        XmlReader {
            reader,
            buffer: Vec::with_capacity(1024),
        }
    }

    /// Reads the next XML event, `None` at end of document
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, SheetError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer) {
            Ok(Event::Eof) => Ok(None),
            Ok(event) => Ok(Some(event)),
            Err(error) => Err(SheetError::XmlError(error)),
        }
    }
}

/// Attribute access on start/empty elements
pub(crate) trait XmlNodeHelper<'a> {
    /// Gets an unescaped attribute value by name
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, SheetError>;

    /// Parses an attribute value to the specified type
    fn parse_attribute_value<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, SheetError>;

    /// Collects all attributes except the excluded keys as owned pairs
    fn owned_attributes(&self, excluded: &[&str]) -> Result<Vec<(String, String)>, SheetError>;
}

impl<'a> XmlNodeHelper<'a> for BytesStart<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, SheetError> {
        match self.try_get_attribute(name)? {
            Some(attribute) => Ok(Some(attribute.unescape_value()?)),
            None => Ok(None),
        }
    }

    fn parse_attribute_value<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, SheetError> {
        match self.get_attribute_value(name)? {
            Some(value) => value
                .parse::<T>()
                .map(Some)
                .map_err(|_| XmlError::ParseAttributeValueError(value.to_string()).into()),
            None => Ok(None),
        }
    }

    fn owned_attributes(&self, excluded: &[&str]) -> Result<Vec<(String, String)>, SheetError> {
        let mut attributes = Vec::new();
        for result in self.attributes() {
            let attribute = result?;
            let key = std::str::from_utf8(attribute.key.as_ref())?.to_owned();
            if excluded.contains(&key.as_str()) {
                continue;
            }
            attributes.push((key, attribute.unescape_value()?.into_owned()));
        }
        Ok(attributes)
    }
}

/// Helper trait for building text content from XML events
pub(crate) trait XmlTextContextHelper {
    /// Appends text content from BytesRef event (handles entities and character references)
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), SheetError>;
}

impl XmlTextContextHelper for String {
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), SheetError> {
        let raw = bytes.xml_content()?;
        if let Some(number) = raw.strip_prefix('#') {
            let code = match number.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16)?,
                None => number.parse::<u32>()?,
            };
            if let Some(character) = char::from_u32(code) {
                self.push(character);
            }
        } else if let Some(entity) = resolve_xml_entity(&raw) {
            self.push_str(entity);
        } else {
            Err(XmlError::ParseEntityError(raw.to_string()))?;
        }
        Ok(())
    }
}

/// Returns the namespace prefix of a qualified name, e.g. `x` for `x:row`.
pub(crate) fn name_prefix(name: QName) -> Result<String, SheetError> {
    Ok(match name.prefix() {
        Some(prefix) => std::str::from_utf8(prefix.as_ref())?.to_owned(),
        None => String::new(),
    })
}

/// Builds a qualified element name using the given prefix.
pub(crate) fn qualify(prefix: &str, local: &str) -> String {
    if prefix.is_empty() {
        local.to_owned()
    } else {
        format!("{prefix}:{local}")
    }
}

/// Writes a start (or empty) element with attributes.
pub(crate) fn write_start<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    attributes: &[(&str, &str)],
    empty: bool,
) -> Result<(), SheetError> {
    let mut element = BytesStart::new(name);
    for attribute in attributes {
        element.push_attribute(*attribute);
    }
    let event = if empty { Event::Empty(element) } else { Event::Start(element) };
    writer.write_event(event)?;
    Ok(())
}

#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(result) = $reader.next()? {
            match result {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn attributes_are_unescaped_and_parsed() {
        let mut reader = XmlReader::new(Cursor::new(r#"<row r="12" spans="1:3" note="a&amp;b"/>"#.as_bytes()));
        match reader.next().unwrap() {
            Some(Event::Start(event)) => {
                assert_eq!(event.parse_attribute_value::<usize>("r").unwrap(), Some(12));
                assert_eq!(event.get_attribute_value("note").unwrap().as_deref(), Some("a&b"));
                assert_eq!(event.get_attribute_value("missing").unwrap(), None);
                let kept = event.owned_attributes(&["r", "spans"]).unwrap();
                assert_eq!(kept, vec![("note".to_owned(), "a&b".to_owned())]);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn unparsable_attribute_is_reported() {
        let mut reader = XmlReader::new(Cursor::new(r#"<row r="x"/>"#.as_bytes()));
        if let Some(Event::Start(event)) = reader.next().unwrap() {
            assert!(event.parse_attribute_value::<usize>("r").is_err());
        } else {
            panic!("expected start event");
        }
    }

    #[test]
    fn verbatim_reader_keeps_empty_elements() {
        let mut reader = XmlReader::verbatim(Cursor::new("<col min=\"1\"/>".as_bytes()));
        assert!(matches!(reader.next().unwrap(), Some(Event::Empty(_))));
        assert!(reader.next().unwrap().is_none());
    }

    #[test]
    fn qualified_names() {
        assert_eq!(qualify("", "row"), "row");
        assert_eq!(qualify("x", "row"), "x:row");
        assert_eq!(name_prefix(QName(b"x:row")).unwrap(), "x");
        assert_eq!(name_prefix(QName(b"row")).unwrap(), "");
    }
}
