//! XML encoding of a preferences file.
//!
//! ```xml
//! <?xml version="1.0" encoding="utf-8"?>
//! <preferences version="1.0">
//!   <string key="theme">dark</string>
//! </preferences>
//! ```

use crate::errno::{PrefsError, PrefsResult};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::collections::BTreeMap;
use std::fmt::Display;

const ROOT: &str = "preferences";
const STRING: &[u8] = b"string";
const FORMAT_VERSION: &str = "1.0";

fn write_error(err: impl Display) -> PrefsError {
    PrefsError::Serialization(err.to_string())
}

pub(crate) fn encode(values: &BTreeMap<String, String>) -> PrefsResult<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(write_error)?;

    let mut root = BytesStart::new(ROOT);
    root.push_attribute(("version", FORMAT_VERSION));
    writer.write_event(Event::Start(root)).map_err(write_error)?;

    for (key, value) in values {
        let mut elem = BytesStart::new("string");
        elem.push_attribute(("key", key.as_str()));
        if value.is_empty() {
            writer.write_event(Event::Empty(elem)).map_err(write_error)?;
            continue;
        }
        writer.write_event(Event::Start(elem)).map_err(write_error)?;
        writer
            .write_event(Event::Text(BytesText::new(value)))
            .map_err(write_error)?;
        writer
            .write_event(Event::End(BytesEnd::new("string")))
            .map_err(write_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new(ROOT)))
        .map_err(write_error)?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

pub(crate) fn decode(text: &str, path: &str) -> PrefsResult<BTreeMap<String, String>> {
    let malformed = |err: &dyn Display| PrefsError::Malformed {
        path: path.to_string(),
        message: err.to_string(),
    };

    let mut reader = Reader::from_str(text);
    let mut values = BTreeMap::new();
    // (key, accumulated text) of the <string> element being read
    let mut current: Option<(String, String)> = None;

    loop {
        match reader.read_event().map_err(|e| malformed(&e))? {
            Event::Start(elem) if elem.name().as_ref() == STRING => {
                current = string_key(&elem).map_err(|e| malformed(&e))?.map(|key| (key, String::new()));
            }
            Event::Empty(elem) if elem.name().as_ref() == STRING => {
                if let Some(key) = string_key(&elem).map_err(|e| malformed(&e))? {
                    values.insert(key, String::new());
                }
            }
            Event::Text(text) => {
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(&text.unescape().map_err(|e| malformed(&e))?);
                }
            }
            Event::CData(data) => {
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(elem) if elem.name().as_ref() == STRING => {
                if let Some((key, value)) = current.take() {
                    values.insert(key, value);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if current.is_some() {
        return Err(malformed(&"unterminated <string> element"));
    }

    Ok(values)
}

fn string_key(elem: &BytesStart<'_>) -> Result<Option<String>, quick_xml::Error> {
    match elem.try_get_attribute("key")? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}
