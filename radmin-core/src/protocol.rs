//! # Wire Protocols
//!
//! This module defines the structured reader/writer contract every serialization
//! protocol implements, and the [`ProtocolKind`] selector that turns a protocol name
//! typed on the command line into a factory for those readers and writers.
//!
//! ## How it works
//!
//! Protocols never touch the network. A [`ProtocolWriter`] accumulates one complete
//! message in memory and hands the bytes over with [`ProtocolWriter::finish`]. A
//! [`ProtocolReader`] decodes from a byte slice that is expected to hold one complete
//! message; when the slice ends early it reports [`ProtocolError::UnexpectedEof`],
//! which lets the raw socket transport keep reading until a full reply is buffered.
//!
//! ## Supported protocols
//!
//! * **`binary`**: Strict Thrift binary protocol.
//! * **`compact`**: Thrift compact protocol (zigzag varints, field deltas).
//! * **`json`**: Thrift TJSON, fields keyed by id with type tags.
//! * **`simplejson`**: Field-name keyed JSON, also used to decode command line arguments.
pub mod binary;
pub mod compact;
pub mod json;
mod json_tree;
pub mod simple_json;
mod types;

pub use types::*;

use std::str::FromStr;

/// Maximum nesting depth accepted by [`ProtocolReader::skip`].
pub const MAX_SKIP_DEPTH: usize = 64;

/// Errors raised while encoding or decoding a message.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Unexpected end of input")]
    UnexpectedEof,
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Negative size: {0}")]
    NegativeSize(i64),
    #[error("Bad protocol version: {0:#x}")]
    BadVersion(i64),
    #[error("Maximum nesting depth of {MAX_SKIP_DEPTH} exceeded")]
    DepthLimit,
    #[error("Required field '{field}' is missing from '{structure}'")]
    MissingField {
        structure: &'static str,
        field: &'static str,
    },
    #[error("Invalid UTF-8 string: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("Malformed JSON: {0}")]
    Json(#[source] serde_json::Error),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_eof() {
            ProtocolError::UnexpectedEof
        } else {
            ProtocolError::Json(err)
        }
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// A protocol name could not be mapped to a known serialization protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid protocol specified: '{0}'. Expected one of: binary, compact, simplejson, json")]
pub struct UnknownProtocol(pub String);

/// The serialization protocols this client can speak.
///
/// A `ProtocolKind` is a stateless factory: every call to [`ProtocolKind::reader`] or
/// [`ProtocolKind::writer`] produces an independent codec, so the same kind can wrap
/// the live connection and a throwaway argument buffer at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolKind {
    #[default]
    Binary,
    Compact,
    SimpleJson,
    Json,
}

impl FromStr for ProtocolKind {
    type Err = UnknownProtocol;

    /// Names are case-sensitive. An empty name selects the binary protocol.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "binary" | "" => Ok(ProtocolKind::Binary),
            "compact" => Ok(ProtocolKind::Compact),
            "simplejson" => Ok(ProtocolKind::SimpleJson),
            "json" => Ok(ProtocolKind::Json),
            other => Err(UnknownProtocol(other.to_string())),
        }
    }
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProtocolKind::Binary => "binary",
            ProtocolKind::Compact => "compact",
            ProtocolKind::SimpleJson => "simplejson",
            ProtocolKind::Json => "json",
        };
        f.write_str(name)
    }
}

impl ProtocolKind {
    /// Wraps a byte slice holding one message in a structured reader.
    pub fn reader<'a>(&self, buf: &'a [u8]) -> Box<dyn ProtocolReader + 'a> {
        match self {
            ProtocolKind::Binary => Box::new(binary::BinaryReader::new(buf)),
            ProtocolKind::Compact => Box::new(compact::CompactReader::new(buf)),
            ProtocolKind::SimpleJson => Box::new(simple_json::SimpleJsonReader::new(buf)),
            ProtocolKind::Json => Box::new(json::JsonReader::new(buf)),
        }
    }

    /// Creates a structured writer backed by a fresh in-memory buffer.
    pub fn writer(&self) -> Box<dyn ProtocolWriter> {
        match self {
            ProtocolKind::Binary => Box::new(binary::BinaryWriter::new()),
            ProtocolKind::Compact => Box::new(compact::CompactWriter::new()),
            ProtocolKind::SimpleJson => Box::new(simple_json::SimpleJsonWriter::new()),
            ProtocolKind::Json => Box::new(json::JsonWriter::new()),
        }
    }
}

/// The decoding half of a serialization protocol.
pub trait ProtocolReader: Send {
    fn read_message_begin(&mut self) -> ProtocolResult<MessageIdentifier>;
    fn read_message_end(&mut self) -> ProtocolResult<()>;
    fn read_struct_begin(&mut self) -> ProtocolResult<()>;
    fn read_struct_end(&mut self) -> ProtocolResult<()>;
    /// Returns a field whose type is [`TType::Stop`] once the struct has no more fields.
    fn read_field_begin(&mut self) -> ProtocolResult<FieldIdentifier>;
    fn read_field_end(&mut self) -> ProtocolResult<()>;
    fn read_bool(&mut self) -> ProtocolResult<bool>;
    fn read_i8(&mut self) -> ProtocolResult<i8>;
    fn read_i16(&mut self) -> ProtocolResult<i16>;
    fn read_i32(&mut self) -> ProtocolResult<i32>;
    fn read_i64(&mut self) -> ProtocolResult<i64>;
    fn read_double(&mut self) -> ProtocolResult<f64>;
    fn read_string(&mut self) -> ProtocolResult<String>;
    fn read_binary(&mut self) -> ProtocolResult<Vec<u8>>;
    fn read_list_begin(&mut self) -> ProtocolResult<ListIdentifier>;
    fn read_list_end(&mut self) -> ProtocolResult<()>;
    fn read_set_begin(&mut self) -> ProtocolResult<ListIdentifier>;
    fn read_set_end(&mut self) -> ProtocolResult<()>;
    fn read_map_begin(&mut self) -> ProtocolResult<MapIdentifier>;
    fn read_map_end(&mut self) -> ProtocolResult<()>;

    /// Whether a field announced with type `wire` can be decoded as `expected`.
    ///
    /// Self-describing binary encodings require an exact match. Text encodings that
    /// cannot tell integer widths apart override this.
    fn accepts(&self, wire: TType, expected: TType) -> bool {
        wire == expected
    }

    /// Whether a declared field carrying a value of the wrong type is an error.
    ///
    /// Lenient readers skip such a field; text readers decode hand-written input
    /// and reject it. A `null` value is never an error.
    fn strict_types(&self) -> bool {
        false
    }

    /// Whether `field` is the declared field `id`/`name` and holds an `expected` value.
    fn expect_field(
        &self,
        field: &FieldIdentifier,
        id: i16,
        name: &str,
        expected: TType,
    ) -> ProtocolResult<bool> {
        if !field.matches(id, name) {
            return Ok(false);
        }
        if self.accepts(field.field_type, expected) {
            return Ok(true);
        }
        if self.strict_types() && field.field_type != TType::Void {
            return Err(ProtocolError::InvalidData(format!(
                "field '{name}' holds a {:?} value, expected {expected:?}",
                field.field_type
            )));
        }
        Ok(false)
    }

    /// Discards the next value of type `ttype`.
    fn skip(&mut self, ttype: TType) -> ProtocolResult<()> {
        skip_till_depth(self, ttype, MAX_SKIP_DEPTH)
    }
}

fn skip_till_depth<R: ProtocolReader + ?Sized>(
    reader: &mut R,
    ttype: TType,
    depth: usize,
) -> ProtocolResult<()> {
    if depth == 0 {
        return Err(ProtocolError::DepthLimit);
    }

    match ttype {
        TType::Bool => reader.read_bool().map(drop),
        TType::I8 => reader.read_i8().map(drop),
        TType::I16 => reader.read_i16().map(drop),
        TType::I32 => reader.read_i32().map(drop),
        TType::I64 => reader.read_i64().map(drop),
        TType::Double => reader.read_double().map(drop),
        TType::String => reader.read_binary().map(drop),
        TType::Struct => {
            reader.read_struct_begin()?;
            loop {
                let field = reader.read_field_begin()?;
                if field.is_stop() {
                    break;
                }
                skip_till_depth(reader, field.field_type, depth - 1)?;
                reader.read_field_end()?;
            }
            reader.read_struct_end()
        }
        TType::List => {
            let list = reader.read_list_begin()?;
            for _ in 0..list.size {
                skip_till_depth(reader, list.element_type, depth - 1)?;
            }
            reader.read_list_end()
        }
        TType::Set => {
            let set = reader.read_set_begin()?;
            for _ in 0..set.size {
                skip_till_depth(reader, set.element_type, depth - 1)?;
            }
            reader.read_set_end()
        }
        TType::Map => {
            let map = reader.read_map_begin()?;
            for _ in 0..map.size {
                skip_till_depth(reader, map.key_type, depth - 1)?;
                skip_till_depth(reader, map.value_type, depth - 1)?;
            }
            reader.read_map_end()
        }
        TType::Stop | TType::Void => Err(ProtocolError::InvalidData(format!(
            "cannot skip a value of type {ttype:?}"
        ))),
    }
}

/// The encoding half of a serialization protocol.
pub trait ProtocolWriter: Send {
    fn write_message_begin(&mut self, message: &MessageIdentifier) -> ProtocolResult<()>;
    fn write_message_end(&mut self) -> ProtocolResult<()>;
    fn write_struct_begin(&mut self, name: &str) -> ProtocolResult<()>;
    fn write_struct_end(&mut self) -> ProtocolResult<()>;
    fn write_field_begin(&mut self, field: &FieldIdentifier) -> ProtocolResult<()>;
    fn write_field_end(&mut self) -> ProtocolResult<()>;
    fn write_field_stop(&mut self) -> ProtocolResult<()>;
    fn write_bool(&mut self, value: bool) -> ProtocolResult<()>;
    fn write_i8(&mut self, value: i8) -> ProtocolResult<()>;
    fn write_i16(&mut self, value: i16) -> ProtocolResult<()>;
    fn write_i32(&mut self, value: i32) -> ProtocolResult<()>;
    fn write_i64(&mut self, value: i64) -> ProtocolResult<()>;
    fn write_double(&mut self, value: f64) -> ProtocolResult<()>;
    fn write_string(&mut self, value: &str) -> ProtocolResult<()>;
    fn write_binary(&mut self, value: &[u8]) -> ProtocolResult<()>;
    fn write_list_begin(&mut self, list: &ListIdentifier) -> ProtocolResult<()>;
    fn write_list_end(&mut self) -> ProtocolResult<()>;
    fn write_set_begin(&mut self, set: &ListIdentifier) -> ProtocolResult<()>;
    fn write_set_end(&mut self) -> ProtocolResult<()>;
    fn write_map_begin(&mut self, map: &MapIdentifier) -> ProtocolResult<()>;
    fn write_map_end(&mut self) -> ProtocolResult<()>;

    /// Takes the bytes written so far, leaving the writer empty.
    fn finish(&mut self) -> ProtocolResult<Vec<u8>>;
}

/// A value that knows how to encode and decode itself with any protocol.
pub trait ThriftStruct: Sized {
    fn read(reader: &mut dyn ProtocolReader) -> ProtocolResult<Self>;
    fn write(&self, writer: &mut dyn ProtocolWriter) -> ProtocolResult<()>;
}

/// Remote failure reported in an `EXCEPTION` reply, or raised locally when a reply
/// envelope is inconsistent with the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct ApplicationException {
    pub kind: ApplicationExceptionKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationExceptionKind {
    Unknown,
    UnknownMethod,
    InvalidMessageType,
    WrongMethodName,
    BadSequenceId,
    MissingResult,
    InternalError,
    ProtocolError,
}

impl ApplicationExceptionKind {
    pub fn code(self) -> i32 {
        match self {
            ApplicationExceptionKind::Unknown => 0,
            ApplicationExceptionKind::UnknownMethod => 1,
            ApplicationExceptionKind::InvalidMessageType => 2,
            ApplicationExceptionKind::WrongMethodName => 3,
            ApplicationExceptionKind::BadSequenceId => 4,
            ApplicationExceptionKind::MissingResult => 5,
            ApplicationExceptionKind::InternalError => 6,
            ApplicationExceptionKind::ProtocolError => 7,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            1 => ApplicationExceptionKind::UnknownMethod,
            2 => ApplicationExceptionKind::InvalidMessageType,
            3 => ApplicationExceptionKind::WrongMethodName,
            4 => ApplicationExceptionKind::BadSequenceId,
            5 => ApplicationExceptionKind::MissingResult,
            6 => ApplicationExceptionKind::InternalError,
            7 => ApplicationExceptionKind::ProtocolError,
            _ => ApplicationExceptionKind::Unknown,
        }
    }
}

impl ApplicationException {
    pub fn new(kind: ApplicationExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl ThriftStruct for ApplicationException {
    fn read(reader: &mut dyn ProtocolReader) -> ProtocolResult<Self> {
        let mut message = String::new();
        let mut kind = ApplicationExceptionKind::Unknown;

        reader.read_struct_begin()?;
        loop {
            let field = reader.read_field_begin()?;
            if field.is_stop() {
                break;
            }
            if reader.expect_field(&field, 1, "message", TType::String)? {
                message = reader.read_string()?;
            } else if reader.expect_field(&field, 2, "type", TType::I32)? {
                kind = ApplicationExceptionKind::from_code(reader.read_i32()?);
            } else {
                reader.skip(field.field_type)?;
            }
            reader.read_field_end()?;
        }
        reader.read_struct_end()?;

        Ok(Self { kind, message })
    }

    fn write(&self, writer: &mut dyn ProtocolWriter) -> ProtocolResult<()> {
        writer.write_struct_begin("TApplicationException")?;
        writer.write_field_begin(&FieldIdentifier::new("message", TType::String, 1))?;
        writer.write_string(&self.message)?;
        writer.write_field_end()?;
        writer.write_field_begin(&FieldIdentifier::new("type", TType::I32, 2))?;
        writer.write_i32(self.kind.code())?;
        writer.write_field_end()?;
        writer.write_field_stop()?;
        writer.write_struct_end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_names() {
        assert_eq!("binary".parse(), Ok(ProtocolKind::Binary));
        assert_eq!("".parse(), Ok(ProtocolKind::Binary));
        assert_eq!("compact".parse(), Ok(ProtocolKind::Compact));
        assert_eq!("simplejson".parse(), Ok(ProtocolKind::SimpleJson));
        assert_eq!("json".parse(), Ok(ProtocolKind::Json));
    }

    #[test]
    fn test_protocol_names_are_case_sensitive() {
        assert_eq!(
            "JSON".parse::<ProtocolKind>(),
            Err(UnknownProtocol("JSON".to_string()))
        );
        assert!("unknown".parse::<ProtocolKind>().is_err());
    }

    #[test]
    fn test_application_exception_with_every_protocol() {
        let exception =
            ApplicationException::new(ApplicationExceptionKind::UnknownMethod, "no such method");

        for kind in [
            ProtocolKind::Binary,
            ProtocolKind::Compact,
            ProtocolKind::SimpleJson,
            ProtocolKind::Json,
        ] {
            let mut writer = kind.writer();
            exception.write(writer.as_mut()).unwrap();
            let bytes = writer.finish().unwrap();

            let mut reader = kind.reader(&bytes);
            let decoded = ApplicationException::read(reader.as_mut()).unwrap();
            assert_eq!(decoded, exception, "protocol {kind}");
        }
    }

    #[test]
    fn test_skip_unknown_struct() {
        let mut writer = ProtocolKind::Binary.writer();
        writer.write_struct_begin("outer").unwrap();
        writer
            .write_field_begin(&FieldIdentifier::new("items", TType::List, 7))
            .unwrap();
        writer
            .write_list_begin(&ListIdentifier::new(TType::I32, 2))
            .unwrap();
        writer.write_i32(1).unwrap();
        writer.write_i32(2).unwrap();
        writer.write_list_end().unwrap();
        writer.write_field_end().unwrap();
        writer.write_field_stop().unwrap();
        writer.write_struct_end().unwrap();
        writer.write_i64(42).unwrap();
        let bytes = writer.finish().unwrap();

        let mut reader = ProtocolKind::Binary.reader(&bytes);
        reader.skip(TType::Struct).unwrap();
        assert_eq!(reader.read_i64().unwrap(), 42);
    }
}
