//! # Interface Definitions
//!
//! Typed structures of the replica admin service and the envelope structs every
//! call is wrapped in.
//!
//! Each structure implements [`ThriftStruct`] by hand. Readers match incoming
//! fields by id or by name (see [`FieldIdentifier::matches`]) so the same code decodes
//! id-keyed wire formats and name-keyed command line arguments.
pub mod base;
pub mod radmin;

pub use base::{AddressError, ErrorCode, Gpid, RpcAddress};

use crate::protocol::{
    FieldIdentifier, ProtocolReader, ProtocolResult, ProtocolWriter, TType, ThriftStruct,
};

/// The `<method>_args` struct of a call: the request travels as field 1, `req`.
#[derive(Debug, Clone, PartialEq)]
pub struct CallArgs<T> {
    pub req: Option<T>,
}

impl<T: ThriftStruct> ThriftStruct for CallArgs<T> {
    fn read(reader: &mut dyn ProtocolReader) -> ProtocolResult<Self> {
        let mut req = None;

        reader.read_struct_begin()?;
        loop {
            let field = reader.read_field_begin()?;
            if field.is_stop() {
                break;
            }
            if reader.expect_field(&field, 1, "req", TType::Struct)? {
                req = Some(T::read(reader)?);
            } else {
                reader.skip(field.field_type)?;
            }
            reader.read_field_end()?;
        }
        reader.read_struct_end()?;

        Ok(Self { req })
    }

    fn write(&self, writer: &mut dyn ProtocolWriter) -> ProtocolResult<()> {
        writer.write_struct_begin("args")?;
        if let Some(req) = &self.req {
            writer.write_field_begin(&FieldIdentifier::new("req", TType::Struct, 1))?;
            req.write(writer)?;
            writer.write_field_end()?;
        }
        writer.write_field_stop()?;
        writer.write_struct_end()
    }
}

/// The `<method>_result` struct of a reply: the response travels as field 0, `success`.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult<T> {
    pub success: Option<T>,
}

impl<T: ThriftStruct> ThriftStruct for CallResult<T> {
    fn read(reader: &mut dyn ProtocolReader) -> ProtocolResult<Self> {
        let mut success = None;

        reader.read_struct_begin()?;
        loop {
            let field = reader.read_field_begin()?;
            if field.is_stop() {
                break;
            }
            if reader.expect_field(&field, 0, "success", TType::Struct)? {
                success = Some(T::read(reader)?);
            } else {
                reader.skip(field.field_type)?;
            }
            reader.read_field_end()?;
        }
        reader.read_struct_end()?;

        Ok(Self { success })
    }

    fn write(&self, writer: &mut dyn ProtocolWriter) -> ProtocolResult<()> {
        writer.write_struct_begin("result")?;
        if let Some(success) = &self.success {
            writer.write_field_begin(&FieldIdentifier::new("success", TType::Struct, 0))?;
            success.write(writer)?;
            writer.write_field_end()?;
        }
        writer.write_field_stop()?;
        writer.write_struct_end()
    }
}
