//! # Compact Protocol
//!
//! Thrift compact encoding. Integers are zigzag varints, field ids are written as
//! deltas from the previous field of the same struct, and boolean field values are
//! folded into the field header.
use super::{
    FieldIdentifier, ListIdentifier, MapIdentifier, MessageIdentifier, MessageType,
    ProtocolError, ProtocolReader, ProtocolResult, ProtocolWriter, TType,
};
use bytes::{Buf, BufMut, BytesMut};

const PROTOCOL_ID: u8 = 0x82;
const VERSION: u8 = 1;
const VERSION_MASK: u8 = 0x1f;
const TYPE_SHIFT: u8 = 5;

const CT_STOP: u8 = 0x00;
const CT_BOOLEAN_TRUE: u8 = 0x01;
const CT_BOOLEAN_FALSE: u8 = 0x02;

fn compact_type(ttype: TType) -> ProtocolResult<u8> {
    match ttype {
        TType::Stop => Ok(CT_STOP),
        TType::Bool => Ok(CT_BOOLEAN_TRUE),
        TType::I8 => Ok(0x03),
        TType::I16 => Ok(0x04),
        TType::I32 => Ok(0x05),
        TType::I64 => Ok(0x06),
        TType::Double => Ok(0x07),
        TType::String => Ok(0x08),
        TType::List => Ok(0x09),
        TType::Set => Ok(0x0a),
        TType::Map => Ok(0x0b),
        TType::Struct => Ok(0x0c),
        TType::Void => Err(ProtocolError::InvalidData(
            "void has no compact encoding".to_string(),
        )),
    }
}

fn ttype_from_compact(value: u8) -> ProtocolResult<TType> {
    match value {
        CT_STOP => Ok(TType::Stop),
        CT_BOOLEAN_TRUE | CT_BOOLEAN_FALSE => Ok(TType::Bool),
        0x03 => Ok(TType::I8),
        0x04 => Ok(TType::I16),
        0x05 => Ok(TType::I32),
        0x06 => Ok(TType::I64),
        0x07 => Ok(TType::Double),
        0x08 => Ok(TType::String),
        0x09 => Ok(TType::List),
        0x0a => Ok(TType::Set),
        0x0b => Ok(TType::Map),
        0x0c => Ok(TType::Struct),
        other => Err(ProtocolError::InvalidData(format!(
            "unknown compact type {other:#x}"
        ))),
    }
}

fn zigzag_32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

fn zigzag_64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

fn unzigzag_32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

fn unzigzag_64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

/// Decodes the compact protocol from an in-memory slice.
pub struct CompactReader<'a> {
    buf: &'a [u8],
    last_field_id: i16,
    field_id_stack: Vec<i16>,
    pending_bool: Option<bool>,
}

impl<'a> CompactReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            last_field_id: 0,
            field_id_stack: Vec::new(),
            pending_bool: None,
        }
    }

    fn read_u8(&mut self) -> ProtocolResult<u8> {
        if !self.buf.has_remaining() {
            return Err(ProtocolError::UnexpectedEof);
        }
        Ok(self.buf.get_u8())
    }

    fn read_varint(&mut self) -> ProtocolResult<u64> {
        let mut result = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = self.read_u8()?;
            result |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(ProtocolError::InvalidData("varint is too long".to_string()))
    }

    fn read_size(&mut self) -> ProtocolResult<usize> {
        let size = self.read_varint()?;
        usize::try_from(size)
            .map_err(|_| ProtocolError::InvalidData(format!("size {size} is too large")))
    }

    fn read_collection_header(&mut self) -> ProtocolResult<ListIdentifier> {
        let header = self.read_u8()?;
        let element_type = ttype_from_compact(header & 0x0f)?;
        let size = match header >> 4 {
            0x0f => self.read_size()?,
            short => usize::from(short),
        };
        Ok(ListIdentifier::new(element_type, size))
    }
}

impl ProtocolReader for CompactReader<'_> {
    fn read_message_begin(&mut self) -> ProtocolResult<MessageIdentifier> {
        let protocol_id = self.read_u8()?;
        if protocol_id != PROTOCOL_ID {
            return Err(ProtocolError::BadVersion(protocol_id.into()));
        }

        let version_and_type = self.read_u8()?;
        let version = version_and_type & VERSION_MASK;
        if version != VERSION {
            return Err(ProtocolError::BadVersion(version.into()));
        }

        let message_type = MessageType::from_i32(((version_and_type >> TYPE_SHIFT) & 0x07).into())?;
        let sequence_number = self.read_varint()? as u32 as i32;
        let name = self.read_string()?;

        Ok(MessageIdentifier::new(name, message_type, sequence_number))
    }

    fn read_message_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn read_struct_begin(&mut self) -> ProtocolResult<()> {
        self.field_id_stack.push(self.last_field_id);
        self.last_field_id = 0;
        Ok(())
    }

    fn read_struct_end(&mut self) -> ProtocolResult<()> {
        self.last_field_id = self
            .field_id_stack
            .pop()
            .ok_or_else(|| ProtocolError::InvalidData("unbalanced struct end".to_string()))?;
        Ok(())
    }

    fn read_field_begin(&mut self) -> ProtocolResult<FieldIdentifier> {
        let header = self.read_u8()?;
        let compact = header & 0x0f;
        if compact == CT_STOP {
            return Ok(FieldIdentifier::stop());
        }

        let delta = header >> 4;
        let id = if delta == 0 {
            self.read_i16()?
        } else {
            self.last_field_id.wrapping_add(delta.into())
        };
        self.last_field_id = id;

        let field_type = ttype_from_compact(compact)?;
        if field_type == TType::Bool {
            self.pending_bool = Some(compact == CT_BOOLEAN_TRUE);
        }

        Ok(FieldIdentifier {
            name: None,
            field_type,
            id: Some(id),
        })
    }

    fn read_field_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn read_bool(&mut self) -> ProtocolResult<bool> {
        match self.pending_bool.take() {
            Some(value) => Ok(value),
            None => Ok(self.read_u8()? == CT_BOOLEAN_TRUE),
        }
    }

    fn read_i8(&mut self) -> ProtocolResult<i8> {
        Ok(self.read_u8()? as i8)
    }

    fn read_i16(&mut self) -> ProtocolResult<i16> {
        Ok(unzigzag_32(self.read_varint()? as u32) as i16)
    }

    fn read_i32(&mut self) -> ProtocolResult<i32> {
        Ok(unzigzag_32(self.read_varint()? as u32))
    }

    fn read_i64(&mut self) -> ProtocolResult<i64> {
        Ok(unzigzag_64(self.read_varint()?))
    }

    fn read_double(&mut self) -> ProtocolResult<f64> {
        if self.buf.remaining() < 8 {
            return Err(ProtocolError::UnexpectedEof);
        }
        Ok(self.buf.get_f64_le())
    }

    fn read_string(&mut self) -> ProtocolResult<String> {
        Ok(String::from_utf8(self.read_binary()?)?)
    }

    fn read_binary(&mut self) -> ProtocolResult<Vec<u8>> {
        let len = self.read_size()?;
        if self.buf.remaining() < len {
            return Err(ProtocolError::UnexpectedEof);
        }
        let bytes = self.buf[..len].to_vec();
        self.buf.advance(len);
        Ok(bytes)
    }

    fn read_list_begin(&mut self) -> ProtocolResult<ListIdentifier> {
        self.read_collection_header()
    }

    fn read_list_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn read_set_begin(&mut self) -> ProtocolResult<ListIdentifier> {
        self.read_collection_header()
    }

    fn read_set_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn read_map_begin(&mut self) -> ProtocolResult<MapIdentifier> {
        let size = self.read_size()?;
        if size == 0 {
            return Ok(MapIdentifier::new(TType::Stop, TType::Stop, 0));
        }
        let types = self.read_u8()?;
        let key_type = ttype_from_compact(types >> 4)?;
        let value_type = ttype_from_compact(types & 0x0f)?;
        Ok(MapIdentifier::new(key_type, value_type, size))
    }

    fn read_map_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }
}

/// Encodes the compact protocol into a growable buffer.
#[derive(Default)]
pub struct CompactWriter {
    buf: BytesMut,
    last_field_id: i16,
    field_id_stack: Vec<i16>,
    pending_bool_field: Option<i16>,
}

impl CompactWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn write_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.put_u8((value as u8 & 0x7f) | 0x80);
            value >>= 7;
        }
        self.buf.put_u8(value as u8);
    }

    fn write_size(&mut self, size: usize) -> ProtocolResult<()> {
        let size = u32::try_from(size)
            .map_err(|_| ProtocolError::InvalidData(format!("size {size} is too large")))?;
        self.write_varint(size.into());
        Ok(())
    }

    fn write_field_header(&mut self, compact: u8, id: i16) {
        let delta = i32::from(id) - i32::from(self.last_field_id);
        if delta > 0 && delta <= 15 {
            self.buf.put_u8(((delta as u8) << 4) | compact);
        } else {
            self.buf.put_u8(compact);
            self.write_varint(zigzag_32(id.into()).into());
        }
        self.last_field_id = id;
    }

    fn write_collection_header(&mut self, header: &ListIdentifier) -> ProtocolResult<()> {
        let element = compact_type(header.element_type)?;
        if header.size < 15 {
            self.buf.put_u8(((header.size as u8) << 4) | element);
            Ok(())
        } else {
            self.buf.put_u8(0xf0 | element);
            self.write_size(header.size)
        }
    }
}

impl ProtocolWriter for CompactWriter {
    fn write_message_begin(&mut self, message: &MessageIdentifier) -> ProtocolResult<()> {
        self.buf.put_u8(PROTOCOL_ID);
        self.buf
            .put_u8((VERSION & VERSION_MASK) | ((message.message_type.to_i32() as u8) << TYPE_SHIFT));
        self.write_varint(u64::from(message.sequence_number as u32));
        self.write_string(&message.name)
    }

    fn write_message_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn write_struct_begin(&mut self, _name: &str) -> ProtocolResult<()> {
        self.field_id_stack.push(self.last_field_id);
        self.last_field_id = 0;
        Ok(())
    }

    fn write_struct_end(&mut self) -> ProtocolResult<()> {
        self.last_field_id = self
            .field_id_stack
            .pop()
            .ok_or_else(|| ProtocolError::InvalidData("unbalanced struct end".to_string()))?;
        Ok(())
    }

    fn write_field_begin(&mut self, field: &FieldIdentifier) -> ProtocolResult<()> {
        let id = field
            .id
            .ok_or_else(|| ProtocolError::InvalidData("field id is required".to_string()))?;

        if field.field_type == TType::Bool {
            self.pending_bool_field = Some(id);
        } else {
            let compact = compact_type(field.field_type)?;
            self.write_field_header(compact, id);
        }
        Ok(())
    }

    fn write_field_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn write_field_stop(&mut self) -> ProtocolResult<()> {
        self.buf.put_u8(CT_STOP);
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> ProtocolResult<()> {
        let compact = if value {
            CT_BOOLEAN_TRUE
        } else {
            CT_BOOLEAN_FALSE
        };
        match self.pending_bool_field.take() {
            Some(id) => self.write_field_header(compact, id),
            None => self.buf.put_u8(compact),
        }
        Ok(())
    }

    fn write_i8(&mut self, value: i8) -> ProtocolResult<()> {
        self.buf.put_i8(value);
        Ok(())
    }

    fn write_i16(&mut self, value: i16) -> ProtocolResult<()> {
        self.write_varint(zigzag_32(value.into()).into());
        Ok(())
    }

    fn write_i32(&mut self, value: i32) -> ProtocolResult<()> {
        self.write_varint(zigzag_32(value).into());
        Ok(())
    }

    fn write_i64(&mut self, value: i64) -> ProtocolResult<()> {
        self.write_varint(zigzag_64(value));
        Ok(())
    }

    fn write_double(&mut self, value: f64) -> ProtocolResult<()> {
        self.buf.put_f64_le(value);
        Ok(())
    }

    fn write_string(&mut self, value: &str) -> ProtocolResult<()> {
        self.write_binary(value.as_bytes())
    }

    fn write_binary(&mut self, value: &[u8]) -> ProtocolResult<()> {
        self.write_size(value.len())?;
        self.buf.put_slice(value);
        Ok(())
    }

    fn write_list_begin(&mut self, list: &ListIdentifier) -> ProtocolResult<()> {
        self.write_collection_header(list)
    }

    fn write_list_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn write_set_begin(&mut self, set: &ListIdentifier) -> ProtocolResult<()> {
        self.write_collection_header(set)
    }

    fn write_set_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn write_map_begin(&mut self, map: &MapIdentifier) -> ProtocolResult<()> {
        if map.size == 0 {
            self.buf.put_u8(0);
            return Ok(());
        }
        self.write_size(map.size)?;
        let types = (compact_type(map.key_type)? << 4) | compact_type(map.value_type)?;
        self.buf.put_u8(types);
        Ok(())
    }

    fn write_map_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn finish(&mut self) -> ProtocolResult<Vec<u8>> {
        Ok(self.buf.split().to_vec())
    }
}
