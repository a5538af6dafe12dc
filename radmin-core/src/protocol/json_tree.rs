//! Shared machinery for the two JSON protocols.
//!
//! Writers build a `serde_json::Value` tree frame by frame and serialize it on
//! `finish`. Readers parse one top-level value and walk it with a stack of cursors.
use super::{ProtocolError, ProtocolResult, TType};
use base64::{
    Engine,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, general_purpose},
};
use serde_json::{Map, Value, de::SliceRead};

const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    general_purpose::PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

enum Frame {
    Array(Vec<Value>),
    Object(Map<String, Value>),
    Field {
        key: String,
        tag: Option<&'static str>,
        value: Option<Value>,
    },
    Map {
        header: Option<Vec<Value>>,
        entries: Map<String, Value>,
        key: Option<String>,
    },
}

#[derive(Default)]
pub(crate) struct TreeBuilder {
    stack: Vec<Frame>,
    roots: Vec<Value>,
}

impl TreeBuilder {
    pub(crate) fn push_array(&mut self, prefix: Vec<Value>) {
        self.stack.push(Frame::Array(prefix));
    }

    pub(crate) fn push_object(&mut self) {
        self.stack.push(Frame::Object(Map::new()));
    }

    /// Opens a struct field. `tag` wraps the value as `{tag: value}` when present.
    pub(crate) fn push_field(&mut self, key: String, tag: Option<&'static str>) {
        self.stack.push(Frame::Field {
            key,
            tag,
            value: None,
        });
    }

    /// Opens a map. With a `header` the map is emitted as `[header..., {entries}]`.
    pub(crate) fn push_map(&mut self, header: Option<Vec<Value>>) {
        self.stack.push(Frame::Map {
            header,
            entries: Map::new(),
            key: None,
        });
    }

    /// Closes the innermost frame and emits it into its parent.
    pub(crate) fn pop(&mut self) -> ProtocolResult<()> {
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| ProtocolError::InvalidData("unbalanced container end".to_string()))?;

        match frame {
            Frame::Array(items) => self.emit(Value::Array(items)),
            Frame::Object(fields) => self.emit(Value::Object(fields)),
            Frame::Field { key, tag, value } => {
                let value = value.ok_or_else(|| {
                    ProtocolError::InvalidData(format!("field '{key}' has no value"))
                })?;
                let value = match tag {
                    Some(tag) => Value::Object(Map::from_iter([(tag.to_string(), value)])),
                    None => value,
                };
                match self.stack.last_mut() {
                    Some(Frame::Object(fields)) => {
                        fields.insert(key, value);
                        Ok(())
                    }
                    _ => Err(ProtocolError::InvalidData(format!(
                        "field '{key}' written outside of a struct"
                    ))),
                }
            }
            Frame::Map {
                header, entries, ..
            } => match header {
                Some(mut header) => {
                    header.push(Value::Object(entries));
                    self.emit(Value::Array(header))
                }
                None => self.emit(Value::Object(entries)),
            },
        }
    }

    pub(crate) fn emit(&mut self, value: Value) -> ProtocolResult<()> {
        match self.stack.last_mut() {
            None => self.roots.push(value),
            Some(Frame::Array(items)) => items.push(value),
            Some(Frame::Field { value: slot, .. }) => *slot = Some(value),
            Some(Frame::Map { entries, key, .. }) => match key.take() {
                None => *key = Some(map_key(value)),
                Some(key) => {
                    entries.insert(key, value);
                }
            },
            Some(Frame::Object(_)) => {
                return Err(ProtocolError::InvalidData(
                    "struct values must be written inside a field".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn emit_double(&mut self, value: f64) -> ProtocolResult<()> {
        let value = match serde_json::Number::from_f64(value) {
            Some(number) => Value::Number(number),
            None if value.is_nan() => Value::from("NaN"),
            None if value > 0.0 => Value::from("Infinity"),
            None => Value::from("-Infinity"),
        };
        self.emit(value)
    }

    pub(crate) fn emit_binary(&mut self, value: &[u8]) -> ProtocolResult<()> {
        self.emit(Value::String(BASE64.encode(value)))
    }

    pub(crate) fn finish(&mut self) -> ProtocolResult<Vec<u8>> {
        if !self.stack.is_empty() {
            return Err(ProtocolError::InvalidData(
                "cannot finish a message with open containers".to_string(),
            ));
        }

        let mut out = Vec::new();
        for root in self.roots.drain(..) {
            if !out.is_empty() {
                out.push(b'\n');
            }
            serde_json::to_writer(&mut out, &root)?;
        }
        Ok(out)
    }
}

fn map_key(value: Value) -> String {
    match value {
        Value::String(key) => key,
        other => other.to_string(),
    }
}

enum Cursor {
    Seq(std::vec::IntoIter<Value>),
    Struct(serde_json::map::IntoIter),
    Map {
        entries: serde_json::map::IntoIter,
        pending: Option<Value>,
    },
    Field(Option<Value>),
}

pub(crate) struct TreeReader<'a> {
    roots: serde_json::StreamDeserializer<'a, SliceRead<'a>, Value>,
    stack: Vec<Cursor>,
}

impl<'a> TreeReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self {
            roots: serde_json::Deserializer::from_slice(buf).into_iter(),
            stack: Vec::new(),
        }
    }

    /// Takes the next value at the current position.
    pub(crate) fn next_value(&mut self) -> ProtocolResult<Value> {
        match self.stack.last_mut() {
            None => match self.roots.next() {
                Some(value) => Ok(value?),
                None => Err(ProtocolError::UnexpectedEof),
            },
            Some(Cursor::Seq(items)) => items.next().ok_or_else(|| {
                ProtocolError::InvalidData("array has fewer elements than expected".to_string())
            }),
            Some(Cursor::Field(slot)) => slot.take().ok_or_else(|| {
                ProtocolError::InvalidData("field value was already consumed".to_string())
            }),
            Some(Cursor::Map { entries, pending }) => match pending.take() {
                Some(value) => Ok(value),
                None => {
                    let (key, value) = entries.next().ok_or_else(|| {
                        ProtocolError::InvalidData(
                            "map has fewer entries than expected".to_string(),
                        )
                    })?;
                    *pending = Some(value);
                    Ok(Value::String(key))
                }
            },
            Some(Cursor::Struct(_)) => Err(ProtocolError::InvalidData(
                "expected a field header inside a struct".to_string(),
            )),
        }
    }

    /// Takes the next `key: value` pair of the innermost struct, if any remain.
    pub(crate) fn next_field(&mut self) -> ProtocolResult<Option<(String, Value)>> {
        match self.stack.last_mut() {
            Some(Cursor::Struct(fields)) => Ok(fields.next()),
            _ => Err(ProtocolError::InvalidData(
                "field header requested outside of a struct".to_string(),
            )),
        }
    }

    pub(crate) fn enter_array(&mut self, items: Vec<Value>) {
        self.stack.push(Cursor::Seq(items.into_iter()));
    }

    pub(crate) fn enter_struct(&mut self, fields: Map<String, Value>) {
        self.stack.push(Cursor::Struct(fields.into_iter()));
    }

    pub(crate) fn enter_map(&mut self, entries: Map<String, Value>) {
        self.stack.push(Cursor::Map {
            entries: entries.into_iter(),
            pending: None,
        });
    }

    pub(crate) fn enter_field(&mut self, value: Value) {
        self.stack.push(Cursor::Field(Some(value)));
    }

    pub(crate) fn leave(&mut self) -> ProtocolResult<()> {
        self.stack
            .pop()
            .map(drop)
            .ok_or_else(|| ProtocolError::InvalidData("unbalanced container end".to_string()))
    }

    pub(crate) fn next_array(&mut self) -> ProtocolResult<Vec<Value>> {
        match self.next_value()? {
            Value::Array(items) => Ok(items),
            other => Err(unexpected("an array", &other)),
        }
    }

    pub(crate) fn next_object(&mut self) -> ProtocolResult<Map<String, Value>> {
        match self.next_value()? {
            Value::Object(fields) => Ok(fields),
            other => Err(unexpected("an object", &other)),
        }
    }
}

pub(crate) fn unexpected(expected: &str, found: &Value) -> ProtocolError {
    ProtocolError::InvalidData(format!("expected {expected}, found {found}"))
}

pub(crate) fn as_i64(value: &Value) -> ProtocolResult<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .ok_or_else(|| unexpected("a 64-bit integer", value)),
        Value::String(text) => text
            .trim()
            .parse()
            .map_err(|_| unexpected("a 64-bit integer", value)),
        _ => Err(unexpected("an integer", value)),
    }
}

pub(crate) fn as_int<T: TryFrom<i64>>(value: &Value, expected: &str) -> ProtocolResult<T> {
    T::try_from(as_i64(value)?).map_err(|_| unexpected(expected, value))
}

pub(crate) fn as_f64(value: &Value) -> ProtocolResult<f64> {
    match value {
        Value::Number(number) => number.as_f64().ok_or_else(|| unexpected("a double", value)),
        Value::String(text) => match text.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other => other.parse().map_err(|_| unexpected("a double", value)),
        },
        _ => Err(unexpected("a double", value)),
    }
}

pub(crate) fn as_bool(value: &Value) -> ProtocolResult<bool> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::Number(_) => Ok(as_i64(value)? != 0),
        Value::String(text) => match text.as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(unexpected("a boolean", value)),
        },
        _ => Err(unexpected("a boolean", value)),
    }
}

pub(crate) fn into_string(value: Value) -> ProtocolResult<String> {
    match value {
        Value::String(text) => Ok(text),
        other => Err(unexpected("a string", &other)),
    }
}

pub(crate) fn into_binary(value: Value) -> ProtocolResult<Vec<u8>> {
    let text = into_string(value)?;
    BASE64
        .decode(text.as_bytes())
        .map_err(|e| ProtocolError::InvalidData(format!("invalid base64 payload: {e}")))
}

/// Best-effort wire type of a plain JSON value.
pub(crate) fn infer_type(value: &Value) -> TType {
    match value {
        Value::Null => TType::Void,
        Value::Bool(_) => TType::Bool,
        Value::Number(number) if number.is_f64() => TType::Double,
        Value::Number(_) => TType::I64,
        Value::String(_) => TType::String,
        Value::Array(_) => TType::List,
        Value::Object(_) => TType::Struct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_nests_fields_and_maps() {
        let mut builder = TreeBuilder::default();
        builder.push_object();
        builder.push_field("1".to_string(), Some("map"));
        builder.push_map(Some(vec![json!("i32"), json!("str"), json!(1)]));
        builder.emit(json!(7)).unwrap();
        builder.emit(json!("seven")).unwrap();
        builder.pop().unwrap();
        builder.pop().unwrap();
        builder.pop().unwrap();

        let bytes = builder.finish().unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value, json!({"1": {"map": ["i32", "str", 1, {"7": "seven"}]}}));
    }

    #[test]
    fn test_finish_rejects_open_containers() {
        let mut builder = TreeBuilder::default();
        builder.push_array(vec![]);
        assert!(builder.finish().is_err());
    }

    #[test]
    fn test_reader_reports_truncation_as_eof() {
        let mut reader = TreeReader::new(br#"[1,"query","#);
        assert!(matches!(
            reader.next_value(),
            Err(ProtocolError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_scalar_conversions() {
        assert_eq!(as_i64(&json!("42")).unwrap(), 42);
        assert!(as_f64(&json!("NaN")).unwrap().is_nan());
        assert!(as_bool(&json!(1)).unwrap());
        assert!(as_int::<i8>(&json!(300), "an i8").is_err());
        assert_eq!(into_binary(json!("aGk")).unwrap(), b"hi");
    }
}
