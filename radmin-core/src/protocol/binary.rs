//! # Binary Protocol
//!
//! Strict Thrift binary encoding: big-endian fixed-width integers, `i32` length
//! prefixed strings and a versioned message header.
//!
//! ```text
//! message: [0x8001 | type as i32] [name length i32] [name] [sequence id i32]
//! field:   [type u8] [id i16] [value]   ...   [0x00 stop]
//! ```
use super::{
    FieldIdentifier, ListIdentifier, MapIdentifier, MessageIdentifier, MessageType,
    ProtocolError, ProtocolReader, ProtocolResult, ProtocolWriter, TType, checked_size,
};
use bytes::{Buf, BufMut, BytesMut};

const VERSION_1: u32 = 0x8001_0000;
const VERSION_MASK: u32 = 0xffff_0000;

/// Decodes the binary protocol from an in-memory slice.
pub struct BinaryReader<'a> {
    buf: &'a [u8],
}

impl<'a> BinaryReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn ensure(&self, len: usize) -> ProtocolResult<()> {
        if self.buf.remaining() < len {
            Err(ProtocolError::UnexpectedEof)
        } else {
            Ok(())
        }
    }

    fn read_u8(&mut self) -> ProtocolResult<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    fn read_sized_bytes(&mut self, len: usize) -> ProtocolResult<Vec<u8>> {
        self.ensure(len)?;
        let bytes = self.buf[..len].to_vec();
        self.buf.advance(len);
        Ok(bytes)
    }

    fn read_size(&mut self) -> ProtocolResult<usize> {
        let size = self.read_i32()?;
        checked_size(size.into())
    }
}

impl ProtocolReader for BinaryReader<'_> {
    fn read_message_begin(&mut self) -> ProtocolResult<MessageIdentifier> {
        let header = self.read_i32()?;

        if header < 0 {
            let version = header as u32 & VERSION_MASK;
            if version != VERSION_1 {
                return Err(ProtocolError::BadVersion(version.into()));
            }
            let message_type = MessageType::from_i32(header & 0xff)?;
            let name = self.read_string()?;
            let sequence_number = self.read_i32()?;
            Ok(MessageIdentifier::new(name, message_type, sequence_number))
        } else {
            // Pre-versioned header: the first word is the name length.
            let name = String::from_utf8(self.read_sized_bytes(checked_size(header.into())?)?)?;
            let message_type = MessageType::from_i32(self.read_i8()?.into())?;
            let sequence_number = self.read_i32()?;
            Ok(MessageIdentifier::new(name, message_type, sequence_number))
        }
    }

    fn read_message_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn read_struct_begin(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn read_struct_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn read_field_begin(&mut self) -> ProtocolResult<FieldIdentifier> {
        let field_type = TType::from_u8(self.read_u8()?)?;
        if field_type == TType::Stop {
            return Ok(FieldIdentifier::stop());
        }
        let id = self.read_i16()?;
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
        Ok(self.read_u8()? != 0)
    }

    fn read_i8(&mut self) -> ProtocolResult<i8> {
        self.ensure(1)?;
        Ok(self.buf.get_i8())
    }

    fn read_i16(&mut self) -> ProtocolResult<i16> {
        self.ensure(2)?;
        Ok(self.buf.get_i16())
    }

    fn read_i32(&mut self) -> ProtocolResult<i32> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    fn read_i64(&mut self) -> ProtocolResult<i64> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    fn read_double(&mut self) -> ProtocolResult<f64> {
        self.ensure(8)?;
        Ok(self.buf.get_f64())
    }

    fn read_string(&mut self) -> ProtocolResult<String> {
        Ok(String::from_utf8(self.read_binary()?)?)
    }

    fn read_binary(&mut self) -> ProtocolResult<Vec<u8>> {
        let len = self.read_size()?;
        self.read_sized_bytes(len)
    }

    fn read_list_begin(&mut self) -> ProtocolResult<ListIdentifier> {
        let element_type = TType::from_u8(self.read_u8()?)?;
        let size = self.read_size()?;
        Ok(ListIdentifier::new(element_type, size))
    }

    fn read_list_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn read_set_begin(&mut self) -> ProtocolResult<ListIdentifier> {
        self.read_list_begin()
    }

    fn read_set_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn read_map_begin(&mut self) -> ProtocolResult<MapIdentifier> {
        let key_type = TType::from_u8(self.read_u8()?)?;
        let value_type = TType::from_u8(self.read_u8()?)?;
        let size = self.read_size()?;
        Ok(MapIdentifier::new(key_type, value_type, size))
    }

    fn read_map_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }
}

/// Encodes the binary protocol into a growable buffer.
#[derive(Default)]
pub struct BinaryWriter {
    buf: BytesMut,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn write_size(&mut self, size: usize) -> ProtocolResult<()> {
        let size = i32::try_from(size)
            .map_err(|_| ProtocolError::InvalidData(format!("size {size} does not fit an i32")))?;
        self.buf.put_i32(size);
        Ok(())
    }
}

impl ProtocolWriter for BinaryWriter {
    fn write_message_begin(&mut self, message: &MessageIdentifier) -> ProtocolResult<()> {
        let header = VERSION_1 | message.message_type.to_i32() as u32;
        self.buf.put_u32(header);
        self.write_string(&message.name)?;
        self.buf.put_i32(message.sequence_number);
        Ok(())
    }

    fn write_message_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn write_struct_begin(&mut self, _name: &str) -> ProtocolResult<()> {
        Ok(())
    }

    fn write_struct_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn write_field_begin(&mut self, field: &FieldIdentifier) -> ProtocolResult<()> {
        let id = field
            .id
            .ok_or_else(|| ProtocolError::InvalidData("field id is required".to_string()))?;
        self.buf.put_u8(field.field_type.to_u8());
        self.buf.put_i16(id);
        Ok(())
    }

    fn write_field_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn write_field_stop(&mut self) -> ProtocolResult<()> {
        self.buf.put_u8(TType::Stop.to_u8());
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> ProtocolResult<()> {
        self.buf.put_u8(u8::from(value));
        Ok(())
    }

    fn write_i8(&mut self, value: i8) -> ProtocolResult<()> {
        self.buf.put_i8(value);
        Ok(())
    }

    fn write_i16(&mut self, value: i16) -> ProtocolResult<()> {
        self.buf.put_i16(value);
        Ok(())
    }

    fn write_i32(&mut self, value: i32) -> ProtocolResult<()> {
        self.buf.put_i32(value);
        Ok(())
    }

    fn write_i64(&mut self, value: i64) -> ProtocolResult<()> {
        self.buf.put_i64(value);
        Ok(())
    }

    fn write_double(&mut self, value: f64) -> ProtocolResult<()> {
        self.buf.put_f64(value);
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
        self.buf.put_u8(list.element_type.to_u8());
        self.write_size(list.size)
    }

    fn write_list_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn write_set_begin(&mut self, set: &ListIdentifier) -> ProtocolResult<()> {
        self.write_list_begin(set)
    }

    fn write_set_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn write_map_begin(&mut self, map: &MapIdentifier) -> ProtocolResult<()> {
        self.buf.put_u8(map.key_type.to_u8());
        self.buf.put_u8(map.value_type.to_u8());
        self.write_size(map.size)
    }

    fn write_map_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn finish(&mut self) -> ProtocolResult<Vec<u8>> {
        Ok(self.buf.split().to_vec())
    }
}
