//! Config codec registry.
//!
//! A [`Codec`] is a stateless pair of functions that turns a typed
//! configuration value into bytes and back. Codecs are keyed by a format tag
//! (`"json"`, `"xml"`, `"yaml"`). The configuration shape itself is described
//! once through `serde` derives; every codec consumes the same description.
//!
//! Key naming follows the config type's own serde attributes. Config types are
//! expected to use `#[serde(rename_all = "camelCase")]` so that the three
//! formats agree on key spelling.

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CodecError;

/// Format tag of the JSON codec.
pub const JSON: &str = "json";
/// Format tag of the XML codec.
pub const XML: &str = "xml";
/// Format tag of the YAML codec.
pub const YAML: &str = "yaml";

/// Serialize half of a codec.
pub type SerializeFn<T> = fn(&T) -> Result<Vec<u8>, CodecError>;
/// Deserialize half of a codec.
pub type DeserializeFn<T> = fn(&[u8]) -> Result<T, CodecError>;

/// A serializer/deserializer pair for one format.
pub struct Codec<T> {
    tag: String,
    serialize: SerializeFn<T>,
    deserialize: DeserializeFn<T>,
}

impl<T> Codec<T> {
    pub fn new(
        tag: impl Into<String>,
        serialize: SerializeFn<T>,
        deserialize: DeserializeFn<T>,
    ) -> Self {
        Self {
            tag: tag.into(),
            serialize,
            deserialize,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn serialize(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        (self.serialize)(value)
    }

    pub fn deserialize(&self, bytes: &[u8]) -> Result<T, CodecError> {
        (self.deserialize)(bytes)
    }
}

// Fn pointers are Copy for any T.
impl<T> Clone for Codec<T> {
    fn clone(&self) -> Self {
        Self {
            tag: self.tag.clone(),
            serialize: self.serialize,
            deserialize: self.deserialize,
        }
    }
}

impl<T> fmt::Debug for Codec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec").field("tag", &self.tag).finish()
    }
}

/// Table of codecs for one configuration type, keyed by format tag.
///
/// Tags are matched case-insensitively. A registry is built once and then
/// shared read-only.
pub struct CodecRegistry<T> {
    codecs: HashMap<String, Codec<T>>,
}

impl<T> CodecRegistry<T> {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Register (or replace) the codec for `tag`.
    pub fn register(
        &mut self,
        tag: &str,
        serialize: SerializeFn<T>,
        deserialize: DeserializeFn<T>,
    ) -> &mut Self {
        let tag = tag.to_ascii_lowercase();
        self.codecs
            .insert(tag.clone(), Codec::new(tag, serialize, deserialize));
        self
    }

    /// Look up the codec for `tag`.
    pub fn resolve(&self, tag: &str) -> Result<&Codec<T>, CodecError> {
        self.codecs
            .get(&tag.to_ascii_lowercase())
            .ok_or_else(|| CodecError::UnsupportedFormat(tag.to_string()))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.codecs.contains_key(&tag.to_ascii_lowercase())
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.codecs.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

impl<T> CodecRegistry<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Registry holding the three built-in codecs.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry
            .register(JSON, json::serialize::<T>, json::deserialize::<T>)
            .register(XML, xml::serialize::<T>, xml::deserialize::<T>)
            .register(YAML, yaml::serialize::<T>, yaml::deserialize::<T>);
        registry
    }
}

impl<T> Default for CodecRegistry<T>
where
    T: Serialize + DeserializeOwned,
{
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl<T> fmt::Debug for CodecRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

/// Indented JSON.
pub mod json {
    use super::*;

    pub fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec_pretty(value)?)
    }

    pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// XML document whose root element is named after the config type.
///
/// Values go through a `serde_json::Value` tree. Each element carries a
/// `type` attribute unless it is a non-empty string or a non-empty object,
/// so numbers, booleans, arrays, nulls and empty containers read back as
/// themselves. Text is kept verbatim, including surrounding whitespace.
/// Array items are `<item>` elements. Object keys that are not valid element
/// names are written as `<entry key="...">`.
pub mod xml {
    use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
    use quick_xml::{Reader, Writer};
    use serde_json::{Map, Number, Value};

    use super::*;
    use crate::config::short_type_name;

    const TYPE_ATTR: &str = "type";
    const KEY_ATTR: &str = "key";
    const ITEM: &str = "item";
    const ENTRY: &str = "entry";
    const FALLBACK_ROOT: &str = "config";

    pub fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
        let tree = serde_json::to_value(value)?;
        let root = short_type_name(std::any::type_name::<T>());
        let root = if is_element_name(root) { root } else { FALLBACK_ROOT };

        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        write_element(&mut writer, root, None, &tree)?;

        let mut out = writer.into_inner();
        out.push(b'\n');
        Ok(out)
    }

    pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
        let text = std::str::from_utf8(bytes)?;
        let mut reader = Reader::from_str(text);
        reader.expand_empty_elements(true);

        loop {
            match reader.read_event()? {
                Event::Start(root) => {
                    let (_, tree) = read_element(&mut reader, &root)?;
                    return serde_json::from_value(tree)
                        .map_err(|e| CodecError::XmlShape(e.to_string()));
                }
                Event::Eof => {
                    return Err(CodecError::XmlShape("document has no root element".into()))
                }
                _ => {}
            }
        }
    }

    fn write_element<W: std::io::Write>(
        writer: &mut Writer<W>,
        name: &str,
        key: Option<&str>,
        value: &Value,
    ) -> Result<(), CodecError> {
        let mut start = BytesStart::new(name);
        if let Some(key) = key {
            start.push_attribute((KEY_ATTR, key));
        }

        match value {
            Value::Null => {
                start.push_attribute((TYPE_ATTR, "null"));
                writer.write_event(Event::Empty(start))?;
            }
            Value::Bool(b) => {
                start.push_attribute((TYPE_ATTR, "bool"));
                write_text(writer, start, name, &b.to_string())?;
            }
            Value::Number(n) => {
                start.push_attribute((TYPE_ATTR, "number"));
                write_text(writer, start, name, &n.to_string())?;
            }
            Value::String(s) if s.is_empty() => writer.write_event(Event::Empty(start))?,
            Value::String(s) => write_text(writer, start, name, s)?,
            Value::Array(items) => {
                start.push_attribute((TYPE_ATTR, "array"));
                if items.is_empty() {
                    writer.write_event(Event::Empty(start))?;
                } else {
                    writer.write_event(Event::Start(start))?;
                    for item in items {
                        write_element(writer, ITEM, None, item)?;
                    }
                    writer.write_event(Event::End(BytesEnd::new(name)))?;
                }
            }
            Value::Object(map) if map.is_empty() => {
                start.push_attribute((TYPE_ATTR, "object"));
                writer.write_event(Event::Empty(start))?;
            }
            Value::Object(map) => {
                writer.write_event(Event::Start(start))?;
                for (k, v) in map {
                    if is_element_name(k) {
                        write_element(writer, k, None, v)?;
                    } else {
                        write_element(writer, ENTRY, Some(k), v)?;
                    }
                }
                writer.write_event(Event::End(BytesEnd::new(name)))?;
            }
        }
        Ok(())
    }

    fn write_text<W: std::io::Write>(
        writer: &mut Writer<W>,
        start: BytesStart<'_>,
        name: &str,
        text: &str,
    ) -> Result<(), CodecError> {
        writer.write_event(Event::Start(start))?;
        writer.write_event(Event::Text(BytesText::new(text)))?;
        writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    /// Read one element whose start tag has been consumed. Returns its key and value.
    fn read_element(
        reader: &mut Reader<&[u8]>,
        start: &BytesStart<'_>,
    ) -> Result<(String, Value), CodecError> {
        let name = std::str::from_utf8(start.name().as_ref())?.to_string();
        let key = attribute(start, KEY_ATTR)?.unwrap_or(name);
        let kind = attribute(start, TYPE_ATTR)?;

        let mut text = String::new();
        let mut children = Vec::new();
        loop {
            match reader.read_event()? {
                Event::Start(child) => children.push(read_element(reader, &child)?),
                Event::Text(t) => text.push_str(&t.unescape()?),
                Event::CData(c) => text.push_str(std::str::from_utf8(&c.into_inner())?),
                Event::End(_) => break,
                Event::Eof => {
                    return Err(CodecError::XmlShape(format!(
                        "unexpected end of document inside <{}>",
                        key
                    )))
                }
                _ => {}
            }
        }

        let value = match kind.as_deref() {
            Some("null") => Value::Null,
            Some("bool") => Value::Bool(text.trim().parse().map_err(|_| {
                CodecError::XmlShape(format!("<{}> is not a boolean: {:?}", key, text))
            })?),
            Some("number") => Value::Number(serde_json::from_str::<Number>(text.trim()).map_err(
                |_| CodecError::XmlShape(format!("<{}> is not a number: {:?}", key, text)),
            )?),
            Some("array") => Value::Array(children.into_iter().map(|(_, v)| v).collect()),
            Some("object") => Value::Object(children.into_iter().collect::<Map<_, _>>()),
            Some("string") => Value::String(text),
            None if children.is_empty() => Value::String(text),
            None => Value::Object(children.into_iter().collect::<Map<_, _>>()),
            Some(other) => {
                return Err(CodecError::XmlShape(format!(
                    "<{}> has unknown type {:?}",
                    key, other
                )))
            }
        };
        Ok((key, value))
    }

    fn attribute(start: &BytesStart<'_>, name: &str) -> Result<Option<String>, CodecError> {
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            if attr.key.as_ref() == name.as_bytes() {
                return Ok(Some(attr.unescape_value()?.into_owned()));
            }
        }
        Ok(None)
    }

    fn is_element_name(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    }
}

/// YAML.
pub mod yaml {
    use super::*;

    pub fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(serde_yaml::to_string(value)?.into_bytes())
    }

    pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
        Ok(serde_yaml::from_slice(bytes)?)
    }
}
