//! YAML loading into a generic, order-preserving value tree.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::de::{
    self, DeserializeSeed, Deserializer, EnumAccess, IgnoredAny, MapAccess, SeqAccess,
    VariantAccess, Visitor,
};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;

use crate::error::{Error, Result};

/// A YAML value of any shape. Numbers are held as their source text.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    String(String),
    Sequence(Vec<Value>),
    Mapping(Mapping),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }
}

/// String-keyed mapping that keeps the key order of the source document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    entries: Vec<(String, Value)>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Insert or replace, keeping the original position of a replaced key.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Mapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Read `path` and parse it as a YAML document whose root is a mapping.
pub fn load_yaml_mapping(path: impl AsRef<Path>) -> Result<Mapping> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::InputNotFound {
            path: path.to_path_buf(),
        },
        _ => Error::io(path, e),
    })?;
    let mapping = parse_yaml_mapping(&text, path)?;
    log::info!("Loaded {} top-level entries from {}", mapping.len(), path.display());
    Ok(mapping)
}

/// Parse the first YAML document in `text`; `origin` only labels errors.
///
/// Null and boolean scalars keep their type. Every other scalar keeps its
/// source text, so `1.10` or `0612345678` reach the template as written.
pub fn parse_yaml_mapping(text: &str, origin: &Path) -> Result<Mapping> {
    let yaml_error = |source| Error::Yaml {
        path: origin.to_path_buf(),
        source,
    };
    let not_a_mapping = || Error::NotAMapping {
        path: origin.to_path_buf(),
    };
    if text.trim().is_empty() {
        return Err(not_a_mapping());
    }

    // Trailing documents after `---` are ignored.
    let first_document = || serde_yaml::Deserializer::from_str(text).next();
    let shape = match first_document() {
        Some(document) => Shape::deserialize(document).map_err(yaml_error)?,
        None => return Err(not_a_mapping()),
    };
    if !matches!(shape, Shape::Mapping(_)) {
        return Err(not_a_mapping());
    }
    let document = first_document().ok_or_else(not_a_mapping)?;
    match Reread(&shape).deserialize(document).map_err(yaml_error)? {
        Value::Mapping(mapping) => Ok(mapping),
        _ => Err(not_a_mapping()),
    }
}

/// Structure of a YAML node. Scalars are classified by the resolved type
/// only, their text is recovered in a second pass.
#[derive(Debug)]
enum Shape {
    Null,
    Bool(bool),
    Text,
    Sequence(Vec<Shape>),
    Mapping(Vec<(Shape, Shape)>),
}

impl<'de> Deserialize<'de> for Shape {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(ShapeVisitor)
    }
}

struct ShapeVisitor;

impl<'de> Visitor<'de> for ShapeVisitor {
    type Value = Shape;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("any YAML value")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Shape, E> {
        Ok(Shape::Null)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Shape, E> {
        Ok(Shape::Null)
    }

    fn visit_some<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> std::result::Result<Shape, D::Error> {
        Shape::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Shape, E> {
        Ok(Shape::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> std::result::Result<Shape, E> {
        Ok(Shape::Text)
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> std::result::Result<Shape, E> {
        Ok(Shape::Text)
    }

    fn visit_i128<E: de::Error>(self, _: i128) -> std::result::Result<Shape, E> {
        Ok(Shape::Text)
    }

    fn visit_u128<E: de::Error>(self, _: u128) -> std::result::Result<Shape, E> {
        Ok(Shape::Text)
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> std::result::Result<Shape, E> {
        Ok(Shape::Text)
    }

    fn visit_str<E: de::Error>(self, _: &str) -> std::result::Result<Shape, E> {
        Ok(Shape::Text)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Shape, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Shape::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Shape, A::Error> {
        let mut entries = Vec::new();
        while let Some(entry) = map.next_entry()? {
            entries.push(entry);
        }
        Ok(Shape::Mapping(entries))
    }

    // Custom tags (`!foo value`) arrive as enums; the tag itself is dropped.
    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> std::result::Result<Shape, A::Error> {
        let (_, variant) = data.variant::<IgnoredAny>()?;
        variant.newtype_variant()
    }
}

/// Second pass over the same document, reading every scalar as raw text.
struct Reread<'a>(&'a Shape);

impl<'de> DeserializeSeed<'de> for Reread<'_> {
    type Value = Value;

    fn deserialize<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> std::result::Result<Value, D::Error> {
        match self.0 {
            Shape::Null => deserializer
                .deserialize_ignored_any(IgnoredAny)
                .map(|_| Value::Null),
            Shape::Bool(b) => deserializer
                .deserialize_ignored_any(IgnoredAny)
                .map(|_| Value::Bool(*b)),
            Shape::Text => String::deserialize(deserializer).map(Value::String),
            Shape::Sequence(items) => deserializer.deserialize_seq(RereadSequence(items)),
            Shape::Mapping(entries) => deserializer.deserialize_map(RereadMapping(entries)),
        }
    }
}

struct RereadSequence<'a>(&'a [Shape]);

impl<'de> Visitor<'de> for RereadSequence<'_> {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a sequence of {} items", self.0.len())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        let mut items = Vec::with_capacity(self.0.len());
        for (index, shape) in self.0.iter().enumerate() {
            match seq.next_element_seed(Reread(shape))? {
                Some(item) => items.push(item),
                None => return Err(de::Error::invalid_length(index, &self)),
            }
        }
        Ok(Value::Sequence(items))
    }
}

struct RereadMapping<'a>(&'a [(Shape, Shape)]);

impl<'de> Visitor<'de> for RereadMapping<'_> {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a mapping of {} entries", self.0.len())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Value, A::Error> {
        let mut mapping = Mapping::new();
        for (index, (key_shape, value_shape)) in self.0.iter().enumerate() {
            let key = match key_shape {
                Shape::Sequence(_) | Shape::Mapping(_) => {
                    map.next_key::<IgnoredAny>()?.map(|_| None)
                }
                _ => map.next_key::<String>()?.map(Some),
            };
            match key {
                Some(Some(key)) => {
                    let value = map.next_value_seed(Reread(value_shape))?;
                    mapping.insert(key, value);
                }
                Some(None) => {
                    log::warn!("Skipping non-scalar YAML key");
                    map.next_value::<IgnoredAny>()?;
                }
                None => return Err(de::Error::invalid_length(index, &self)),
            }
        }
        Ok(Value::Mapping(mapping))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(text: &str) -> Result<Mapping> {
        parse_yaml_mapping(text, Path::new("test.yml"))
    }

    #[test]
    fn missing_file_is_reported_as_not_found() {
        let err = load_yaml_mapping("file_that_does_not_exists.yml").unwrap_err();
        match err {
            Error::InputNotFound { path } => {
                assert_eq!(path, PathBuf::from("file_that_does_not_exists.yml"))
            }
            other => panic!("expected InputNotFound, got {other:?}"),
        }
    }

    #[test]
    fn sequence_and_scalar_roots_are_rejected() {
        for text in ["- a\n- b\n", "just a string", "42", ""] {
            assert!(
                matches!(parse(text), Err(Error::NotAMapping { .. })),
                "{text:?} should not be a mapping"
            );
        }
    }

    #[test]
    fn syntax_errors_carry_the_path() {
        let err = parse("cv: [unclosed").unwrap_err();
        assert!(matches!(err, Error::Yaml { .. }));
        assert!(err.to_string().contains("test.yml"));
    }

    #[test]
    fn nested_values_are_kept_as_is() {
        let text = "cv:\n  test: success\n  years: 7\n  remote: true\n  tags: [a, b]\n  fax:\n";
        let map = parse(text).unwrap();
        let cv = map.get("cv").and_then(Value::as_mapping).unwrap();
        assert_eq!(cv.get("test").and_then(Value::as_str), Some("success"));
        assert_eq!(cv.get("years").and_then(Value::as_str), Some("7"));
        assert_eq!(cv.get("remote"), Some(&Value::Bool(true)));
        assert_eq!(cv.get("fax"), Some(&Value::Null));
        assert_eq!(
            cv.get("tags").and_then(Value::as_sequence).map(<[Value]>::len),
            Some(2)
        );
    }

    #[test]
    fn key_order_survives_serialization() {
        let map = parse("zeta: 1\nalpha: 2\nmid: 3\n").unwrap();
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"zeta":"1","alpha":"2","mid":"3"}"#);
    }

    #[test]
    fn numbers_keep_their_source_text() {
        let map = parse(concat!(
            "phone: 0612345678\n",
            "zip: 01000\n",
            "version: 1.10\n",
            "since: 2020.0\n",
            "big: 12345678901234567890123\n",
        ))
        .unwrap();
        let text = |key| map.get(key).and_then(Value::as_str);
        assert_eq!(text("phone"), Some("0612345678"));
        assert_eq!(text("zip"), Some("01000"));
        assert_eq!(text("version"), Some("1.10"));
        assert_eq!(text("since"), Some("2020.0"));
        assert_eq!(text("big"), Some("12345678901234567890123"));
    }

    #[test]
    fn quoted_and_aliased_scalars_keep_their_text() {
        let map = parse("base: &rate 1.50\ncopy: *rate\nflag: \"true\"\nlist: [3.0, x]\n").unwrap();
        assert_eq!(map.get("base").and_then(Value::as_str), Some("1.50"));
        assert_eq!(map.get("copy").and_then(Value::as_str), Some("1.50"));
        assert_eq!(map.get("flag").and_then(Value::as_str), Some("true"));
        let list = map.get("list").and_then(Value::as_sequence).unwrap();
        assert_eq!(list, [Value::String("3.0".into()), Value::String("x".into())]);
    }

    #[test]
    fn only_the_first_document_is_read() {
        let map = parse("cv:\n  test: success\n---\nother: 1\n").unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.get("other").is_none());

        assert!(matches!(parse("---\n- a\n---\ncv: 1\n"), Err(Error::NotAMapping { .. })));
    }

    #[test]
    fn numeric_keys_become_strings() {
        let map = parse("2020: first job\n").unwrap();
        assert_eq!(map.get("2020").and_then(Value::as_str), Some("first job"));
    }
}
