//! Typed values and the decoder registry.
//!
//! Parsed tokens land in a closed [`Value`] enum rather than being assigned
//! into arbitrary caller storage; a [`Decoder`] turns one raw token string
//! into a `Value`, and the [`DecoderRegistry`] maps each field's semantic
//! type (or `type` tag key) to the decoder used for it. List and map
//! decoders split the token by the field's configured separator; repeated
//! occurrences of cumulative fields merge via [`Value::merged`].

use crate::schema::FieldSpec;
use argot_diagnostics::{BuildError, ParseError};
use argot_schema::ValueKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

// ─── Values ─────────────────────────────────────────────────────────────────

/// A decoded field value.
///
/// Maps use `BTreeMap` with rendered string keys for deterministic
/// serialized output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// A boolean.
    Bool(bool),
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit float.
    Float(f64),
    /// A string.
    String(String),
    /// A list of element values.
    List(Vec<Value>),
    /// A map of rendered keys to entry values.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Merge a later occurrence into an earlier one.
    ///
    /// Lists append, maps extend (later entries win per key), scalars are
    /// last-value-wins.
    pub fn merged(self, next: Value) -> Value {
        match (self, next) {
            (Value::List(mut a), Value::List(b)) => {
                a.extend(b);
                Value::List(a)
            }
            (Value::Map(mut a), Value::Map(b)) => {
                a.extend(b);
                Value::Map(a)
            }
            (_, next) => next,
        }
    }

    /// Render the value the way it would have been written on the command
    /// line; used for enum validation and map keys.
    pub fn render(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(n) => n.to_string(),
            Value::String(s) => s.clone(),
            Value::List(items) => items
                .iter()
                .map(Value::render)
                .collect::<Vec<_>>()
                .join(","),
            Value::Map(entries) => entries
                .iter()
                .map(|(k, v)| format!("{k}={}", v.render()))
                .collect::<Vec<_>>()
                .join(";"),
        }
    }

    /// The boolean payload, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer payload, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// The string payload, if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The list payload, if this is a `List`.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// The map payload, if this is a `Map`.
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }
}

// ─── Decoder contract ───────────────────────────────────────────────────────

/// Decodes one raw token string into a typed [`Value`].
///
/// `at` is the display of the target field (`--flag` or `<arg>`) and is
/// only used in error messages. Cumulative decoders produce `List`/`Map`
/// values that the parser merges across occurrences.
pub trait Decoder {
    /// Decode `raw` into a value, or report a [`ParseError::Decode`].
    fn decode(&self, at: &str, raw: &str) -> Result<Value, ParseError>;

    /// `true` when repeated occurrences accumulate instead of replacing.
    fn is_cumulative(&self) -> bool {
        false
    }
}

fn decode_error(at: &str, expected: &str, got: &str) -> ParseError {
    ParseError::Decode {
        at: at.to_string(),
        expected: expected.to_string(),
        got: got.to_string(),
    }
}

// ─── Built-in decoders ──────────────────────────────────────────────────────

struct BoolDecoder;

impl Decoder for BoolDecoder {
    fn decode(&self, at: &str, raw: &str) -> Result<Value, ParseError> {
        match raw {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(decode_error(at, "boolean", raw)),
        }
    }
}

struct IntDecoder;

impl Decoder for IntDecoder {
    fn decode(&self, at: &str, raw: &str) -> Result<Value, ParseError> {
        raw.parse::<i64>()
            .map(Value::Int)
            .map_err(|_| decode_error(at, "integer", raw))
    }
}

struct FloatDecoder;

impl Decoder for FloatDecoder {
    fn decode(&self, at: &str, raw: &str) -> Result<Value, ParseError> {
        raw.parse::<f64>()
            .map(Value::Float)
            .map_err(|_| decode_error(at, "number", raw))
    }
}

struct StringDecoder;

impl Decoder for StringDecoder {
    fn decode(&self, _at: &str, raw: &str) -> Result<Value, ParseError> {
        Ok(Value::String(raw.to_string()))
    }
}

struct ListDecoder {
    element: Arc<dyn Decoder>,
    sep: Option<char>,
}

impl Decoder for ListDecoder {
    fn decode(&self, at: &str, raw: &str) -> Result<Value, ParseError> {
        let parts = match self.sep {
            Some(sep) => split_separated(raw, sep),
            None => vec![raw.to_string()],
        };
        let mut items = Vec::with_capacity(parts.len());
        for part in &parts {
            items.push(self.element.decode(at, part)?);
        }
        Ok(Value::List(items))
    }

    fn is_cumulative(&self) -> bool {
        true
    }
}

struct MapDecoder {
    key: Arc<dyn Decoder>,
    value: Arc<dyn Decoder>,
    sep: Option<char>,
}

impl Decoder for MapDecoder {
    fn decode(&self, at: &str, raw: &str) -> Result<Value, ParseError> {
        let entries = match self.sep {
            Some(sep) => split_separated(raw, sep),
            None => vec![raw.to_string()],
        };
        let mut map = BTreeMap::new();
        for entry in &entries {
            let Some((k, v)) = entry.split_once('=') else {
                return Err(decode_error(at, "key=value entry", entry));
            };
            let key = self.key.decode(at, k)?.render();
            let value = self.value.decode(at, v)?;
            map.insert(key, value);
        }
        Ok(Value::Map(map))
    }

    fn is_cumulative(&self) -> bool {
        true
    }
}

// ─── Separator splitting ────────────────────────────────────────────────────

/// Split `raw` by `sep`, honouring backslash escapes of the separator
/// (`a\,b,c` with `,` → `["a,b", "c"]`). A backslash not followed by the
/// separator is kept verbatim.
pub fn split_separated(raw: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' && chars.peek() == Some(&sep) {
            current.push(sep);
            chars.next();
        } else if ch == sep {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    parts.push(current);
    parts
}

// ─── Registry ───────────────────────────────────────────────────────────────

/// Maps semantic types and custom keys to decoders.
///
/// User-registered decoders are consulted first when a field carries a
/// `type` tag; built-ins cover the closed [`ValueKind`] set.
#[derive(Default, Clone)]
pub struct DecoderRegistry {
    custom: BTreeMap<String, Arc<dyn Decoder>>,
}

impl DecoderRegistry {
    /// An empty registry with only the built-in decoders.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named decoder, selectable with the `type` tag.
    pub fn register(&mut self, key: &str, decoder: Arc<dyn Decoder>) {
        self.custom.insert(key.to_string(), decoder);
    }

    /// Look up a registered decoder by key.
    pub fn custom(&self, key: &str) -> Option<Arc<dyn Decoder>> {
        self.custom.get(key).cloned()
    }

    /// Resolve the decoder for a field, preferring its `type` tag key.
    pub fn for_field(&self, spec: &FieldSpec) -> Result<Arc<dyn Decoder>, BuildError> {
        if let Some(key) = &spec.decoder_key {
            return self.custom(key).ok_or_else(|| BuildError::UnknownDecoder {
                path: spec.path.clone(),
                key: key.clone(),
            });
        }
        self.for_kind(&spec.kind, spec.list_sep, spec.map_sep, &spec.path)
    }

    fn for_kind(
        &self,
        kind: &ValueKind,
        list_sep: Option<char>,
        map_sep: Option<char>,
        path: &str,
    ) -> Result<Arc<dyn Decoder>, BuildError> {
        match kind {
            ValueKind::Bool => Ok(Arc::new(BoolDecoder)),
            ValueKind::Int => Ok(Arc::new(IntDecoder)),
            ValueKind::Float => Ok(Arc::new(FloatDecoder)),
            ValueKind::String => Ok(Arc::new(StringDecoder)),
            // Element values inside a list split by the default comma even
            // when the list itself uses a custom separator.
            ValueKind::List(element) => Ok(Arc::new(ListDecoder {
                element: self.for_kind(element, Some(','), None, path)?,
                sep: list_sep,
            })),
            ValueKind::Map(key, value) => Ok(Arc::new(MapDecoder {
                key: self.for_kind(key, None, None, path)?,
                value: self.for_kind(value, Some(','), None, path)?,
                sep: map_sep,
            })),
            ValueKind::Optional(inner) => self.for_kind(inner, list_sep, map_sep, path),
            ValueKind::Custom(key) => {
                self.custom(key).ok_or_else(|| BuildError::UnknownDecoder {
                    path: path.to_string(),
                    key: key.clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_kind(kind: ValueKind, raw: &str) -> Result<Value, ParseError> {
        let reg = DecoderRegistry::new();
        let sep = Some(',');
        let mapsep = Some(';');
        let dec = reg.for_kind(&kind, sep, mapsep, "test").unwrap();
        dec.decode("--test", raw)
    }

    // ── split_separated ─────────────────────────────────────────────────

    #[test]
    fn split_plain() {
        assert_eq!(split_separated("a,b,c", ','), vec!["a", "b", "c"]);
    }

    #[test]
    fn split_escaped_separator() {
        assert_eq!(split_separated("a\\,b,c", ','), vec!["a,b", "c"]);
    }

    #[test]
    fn split_keeps_other_backslashes() {
        assert_eq!(split_separated("a\\b,c", ','), vec!["a\\b", "c"]);
    }

    #[test]
    fn split_empty_parts() {
        assert_eq!(split_separated(",a,", ','), vec!["", "a", ""]);
    }

    // ── Scalars ─────────────────────────────────────────────────────────

    #[test]
    fn decode_int() {
        assert_eq!(decode_kind(ValueKind::Int, "42").unwrap(), Value::Int(42));
    }

    #[test]
    fn decode_int_failure_names_target() {
        let err = decode_kind(ValueKind::Int, "abc").unwrap_err();
        assert_eq!(err.to_string(), "--test: expected integer, got \"abc\"");
    }

    #[test]
    fn decode_bool_forms() {
        assert_eq!(decode_kind(ValueKind::Bool, "true").unwrap(), Value::Bool(true));
        assert_eq!(decode_kind(ValueKind::Bool, "0").unwrap(), Value::Bool(false));
        assert!(decode_kind(ValueKind::Bool, "yes").is_err());
    }

    #[test]
    fn decode_empty_string_is_a_value() {
        assert_eq!(
            decode_kind(ValueKind::String, "").unwrap(),
            Value::String(String::new())
        );
    }

    // ── Lists ───────────────────────────────────────────────────────────

    #[test]
    fn decode_int_list() {
        assert_eq!(
            decode_kind(ValueKind::List(Box::new(ValueKind::Int)), "1,2").unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn list_accumulates_across_occurrences() {
        let a = decode_kind(ValueKind::List(Box::new(ValueKind::Int)), "1,2").unwrap();
        let b = decode_kind(ValueKind::List(Box::new(ValueKind::Int)), "3,4").unwrap();
        assert_eq!(
            a.merged(b),
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)])
        );
    }

    #[test]
    fn disabled_separator_keeps_raw() {
        let reg = DecoderRegistry::new();
        let dec = reg
            .for_kind(
                &ValueKind::List(Box::new(ValueKind::String)),
                None,
                None,
                "flag",
            )
            .unwrap();
        assert_eq!(
            dec.decode("--flag", "a,b").unwrap(),
            Value::List(vec![Value::String("a,b".into())])
        );
    }

    // ── Maps ────────────────────────────────────────────────────────────

    #[test]
    fn decode_map_entries() {
        let v = decode_kind(
            ValueKind::Map(Box::new(ValueKind::String), Box::new(ValueKind::Int)),
            "a=10;b=20",
        )
        .unwrap();
        let map = v.as_map().unwrap();
        assert_eq!(map.get("a"), Some(&Value::Int(10)));
        assert_eq!(map.get("b"), Some(&Value::Int(20)));
    }

    #[test]
    fn decode_map_with_list_values() {
        let v = decode_kind(
            ValueKind::Map(
                Box::new(ValueKind::String),
                Box::new(ValueKind::List(Box::new(ValueKind::Int))),
            ),
            "a=1,2",
        )
        .unwrap();
        assert_eq!(
            v.as_map().unwrap().get("a"),
            Some(&Value::List(vec![Value::Int(1), Value::Int(2)]))
        );
    }

    #[test]
    fn map_merge_later_wins_per_key() {
        let a = decode_kind(
            ValueKind::Map(Box::new(ValueKind::String), Box::new(ValueKind::Int)),
            "a=1;b=2",
        )
        .unwrap();
        let b = decode_kind(
            ValueKind::Map(Box::new(ValueKind::String), Box::new(ValueKind::Int)),
            "b=3",
        )
        .unwrap();
        let merged = a.merged(b);
        let map = merged.as_map().unwrap();
        assert_eq!(map.get("a"), Some(&Value::Int(1)));
        assert_eq!(map.get("b"), Some(&Value::Int(3)));
    }

    #[test]
    fn map_entry_without_equals_fails() {
        let err = decode_kind(
            ValueKind::Map(Box::new(ValueKind::String), Box::new(ValueKind::Int)),
            "oops",
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "--test: expected key=value entry, got \"oops\""
        );
    }

    // ── Custom decoders ─────────────────────────────────────────────────

    struct UpperDecoder;

    impl Decoder for UpperDecoder {
        fn decode(&self, _at: &str, raw: &str) -> Result<Value, ParseError> {
            Ok(Value::String(raw.to_uppercase()))
        }
    }

    #[test]
    fn custom_decoder_preferred() {
        let mut reg = DecoderRegistry::new();
        reg.register("upper", Arc::new(UpperDecoder));
        let dec = reg
            .for_kind(&ValueKind::Custom("upper".into()), None, None, "f")
            .unwrap();
        assert_eq!(
            dec.decode("--f", "abc").unwrap(),
            Value::String("ABC".into())
        );
    }

    #[test]
    fn missing_custom_decoder_is_build_error() {
        let reg = DecoderRegistry::new();
        let err = match reg.for_kind(&ValueKind::Custom("nope".into()), None, None, "cli.f") {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert_eq!(err.to_string(), "cli.f: no decoder registered for \"nope\"");
    }

    // ── Value rendering ─────────────────────────────────────────────────

    #[test]
    fn render_scalars() {
        assert_eq!(Value::Int(7).render(), "7");
        assert_eq!(Value::Bool(true).render(), "true");
        assert_eq!(Value::String("x".into()).render(), "x");
    }
}
