use super::{ProtocolError, ProtocolResult};

/// Wire-level value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TType {
    Stop,
    Void,
    Bool,
    I8,
    Double,
    I16,
    I32,
    I64,
    String,
    Struct,
    Map,
    Set,
    List,
}

impl TType {
    pub fn to_u8(self) -> u8 {
        match self {
            TType::Stop => 0,
            TType::Void => 1,
            TType::Bool => 2,
            TType::I8 => 3,
            TType::Double => 4,
            TType::I16 => 6,
            TType::I32 => 8,
            TType::I64 => 10,
            TType::String => 11,
            TType::Struct => 12,
            TType::Map => 13,
            TType::Set => 14,
            TType::List => 15,
        }
    }

    pub fn from_u8(value: u8) -> ProtocolResult<Self> {
        match value {
            0 => Ok(TType::Stop),
            1 => Ok(TType::Void),
            2 => Ok(TType::Bool),
            3 => Ok(TType::I8),
            4 => Ok(TType::Double),
            6 => Ok(TType::I16),
            8 => Ok(TType::I32),
            10 => Ok(TType::I64),
            11 => Ok(TType::String),
            12 => Ok(TType::Struct),
            13 => Ok(TType::Map),
            14 => Ok(TType::Set),
            15 => Ok(TType::List),
            other => Err(ProtocolError::InvalidData(format!(
                "unknown field type {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Call,
    Reply,
    Exception,
    OneWay,
}

impl MessageType {
    pub fn to_i32(self) -> i32 {
        match self {
            MessageType::Call => 1,
            MessageType::Reply => 2,
            MessageType::Exception => 3,
            MessageType::OneWay => 4,
        }
    }

    pub fn from_i32(value: i32) -> ProtocolResult<Self> {
        match value {
            1 => Ok(MessageType::Call),
            2 => Ok(MessageType::Reply),
            3 => Ok(MessageType::Exception),
            4 => Ok(MessageType::OneWay),
            other => Err(ProtocolError::InvalidData(format!(
                "unknown message type {other}"
            ))),
        }
    }
}

/// Header of one RPC message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageIdentifier {
    pub name: String,
    pub message_type: MessageType,
    pub sequence_number: i32,
}

impl MessageIdentifier {
    pub fn new(name: impl Into<String>, message_type: MessageType, sequence_number: i32) -> Self {
        Self {
            name: name.into(),
            message_type,
            sequence_number,
        }
    }
}

/// Header of one struct field.
///
/// Binary encodings only carry the `id`, name-keyed text encodings only carry the
/// `name`. Writers are always given both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIdentifier {
    pub name: Option<String>,
    pub field_type: TType,
    pub id: Option<i16>,
}

impl FieldIdentifier {
    pub fn new(name: impl Into<String>, field_type: TType, id: i16) -> Self {
        Self {
            name: Some(name.into()),
            field_type,
            id: Some(id),
        }
    }

    pub fn stop() -> Self {
        Self {
            name: None,
            field_type: TType::Stop,
            id: None,
        }
    }

    pub fn is_stop(&self) -> bool {
        self.field_type == TType::Stop
    }

    /// True when this header designates the declared field `id`/`name`.
    pub fn matches(&self, id: i16, name: &str) -> bool {
        self.id == Some(id) || self.name.as_deref() == Some(name)
    }
}

/// Header of a list or a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListIdentifier {
    pub element_type: TType,
    pub size: usize,
}

impl ListIdentifier {
    pub fn new(element_type: TType, size: usize) -> Self {
        Self { element_type, size }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapIdentifier {
    pub key_type: TType,
    pub value_type: TType,
    pub size: usize,
}

impl MapIdentifier {
    pub fn new(key_type: TType, value_type: TType, size: usize) -> Self {
        Self {
            key_type,
            value_type,
            size,
        }
    }
}

pub(crate) fn checked_size(size: i64) -> ProtocolResult<usize> {
    usize::try_from(size).map_err(|_| ProtocolError::NegativeSize(size))
}
