//! # Simple JSON Protocol
//!
//! Human-oriented JSON: structs are objects keyed by field name and values carry no
//! type tags.
//!
//! ```text
//! ["query_disk_info",1,1,{"req":{"node":"n1","app_name":"temp"}}]
//! ```
//!
//! Because the text does not say which integer width a number has, the reader lets
//! any JSON integer stand for any integer field (see [`ProtocolReader::accepts`]).
//! Object keys that parse as numbers are also reported as field ids, so an argument
//! like `{"1":"n1"}` resolves to field 1.
use super::{
    FieldIdentifier, ListIdentifier, MapIdentifier, MessageIdentifier, MessageType,
    ProtocolError, ProtocolReader, ProtocolResult, ProtocolWriter, TType,
    json_tree::{
        TreeBuilder, TreeReader, as_bool, as_f64, as_i64, as_int, infer_type, into_binary,
        into_string,
    },
};
use serde_json::Value;

pub struct SimpleJsonReader<'a> {
    tree: TreeReader<'a>,
}

impl<'a> SimpleJsonReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            tree: TreeReader::new(buf),
        }
    }

    fn read_collection_begin(&mut self) -> ProtocolResult<ListIdentifier> {
        let items = self.tree.next_array()?;
        let element_type = items.first().map(infer_type).unwrap_or(TType::Void);
        let size = items.len();
        self.tree.enter_array(items);
        Ok(ListIdentifier::new(element_type, size))
    }
}

impl ProtocolReader for SimpleJsonReader<'_> {
    fn read_message_begin(&mut self) -> ProtocolResult<MessageIdentifier> {
        let items = self.tree.next_array()?;
        self.tree.enter_array(items);

        let name = into_string(self.tree.next_value()?)?;
        let message_type = MessageType::from_i32(as_int(&self.tree.next_value()?, "an i32")?)?;
        let sequence_number = as_int(&self.tree.next_value()?, "an i32")?;

        Ok(MessageIdentifier::new(name, message_type, sequence_number))
    }

    fn read_message_end(&mut self) -> ProtocolResult<()> {
        self.tree.leave()
    }

    fn read_struct_begin(&mut self) -> ProtocolResult<()> {
        let fields = self.tree.next_object()?;
        self.tree.enter_struct(fields);
        Ok(())
    }

    fn read_struct_end(&mut self) -> ProtocolResult<()> {
        self.tree.leave()
    }

    fn read_field_begin(&mut self) -> ProtocolResult<FieldIdentifier> {
        let Some((key, value)) = self.tree.next_field()? else {
            return Ok(FieldIdentifier::stop());
        };

        let field = FieldIdentifier {
            id: key.parse().ok(),
            field_type: infer_type(&value),
            name: Some(key),
        };
        self.tree.enter_field(value);
        Ok(field)
    }

    fn read_field_end(&mut self) -> ProtocolResult<()> {
        self.tree.leave()
    }

    fn read_bool(&mut self) -> ProtocolResult<bool> {
        as_bool(&self.tree.next_value()?)
    }

    fn read_i8(&mut self) -> ProtocolResult<i8> {
        as_int(&self.tree.next_value()?, "an i8")
    }

    fn read_i16(&mut self) -> ProtocolResult<i16> {
        as_int(&self.tree.next_value()?, "an i16")
    }

    fn read_i32(&mut self) -> ProtocolResult<i32> {
        as_int(&self.tree.next_value()?, "an i32")
    }

    fn read_i64(&mut self) -> ProtocolResult<i64> {
        as_i64(&self.tree.next_value()?)
    }

    fn read_double(&mut self) -> ProtocolResult<f64> {
        as_f64(&self.tree.next_value()?)
    }

    fn read_string(&mut self) -> ProtocolResult<String> {
        into_string(self.tree.next_value()?)
    }

    fn read_binary(&mut self) -> ProtocolResult<Vec<u8>> {
        into_binary(self.tree.next_value()?)
    }

    fn read_list_begin(&mut self) -> ProtocolResult<ListIdentifier> {
        self.read_collection_begin()
    }

    fn read_list_end(&mut self) -> ProtocolResult<()> {
        self.tree.leave()
    }

    fn read_set_begin(&mut self) -> ProtocolResult<ListIdentifier> {
        self.read_collection_begin()
    }

    fn read_set_end(&mut self) -> ProtocolResult<()> {
        self.tree.leave()
    }

    fn read_map_begin(&mut self) -> ProtocolResult<MapIdentifier> {
        let entries = self.tree.next_object()?;
        let value_type = entries.values().next().map(infer_type).unwrap_or(TType::Void);
        let size = entries.len();
        self.tree.enter_map(entries);
        Ok(MapIdentifier::new(TType::String, value_type, size))
    }

    fn read_map_end(&mut self) -> ProtocolResult<()> {
        self.tree.leave()
    }

    fn accepts(&self, wire: TType, expected: TType) -> bool {
        wire == expected
            || matches!(
                (wire, expected),
                (TType::I64, TType::I8 | TType::I16 | TType::I32 | TType::Double | TType::Bool)
                    | (TType::String, TType::Double)
                    | (TType::List, TType::Set)
                    | (TType::Struct, TType::Map)
            )
    }

    fn strict_types(&self) -> bool {
        true
    }

    /// Values are self-delimiting, so skipping never needs the declared type.
    fn skip(&mut self, _ttype: TType) -> ProtocolResult<()> {
        self.tree.next_value().map(drop)
    }
}

#[derive(Default)]
pub struct SimpleJsonWriter {
    tree: TreeBuilder,
}

impl SimpleJsonWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProtocolWriter for SimpleJsonWriter {
    fn write_message_begin(&mut self, message: &MessageIdentifier) -> ProtocolResult<()> {
        self.tree.push_array(vec![
            Value::from(message.name.as_str()),
            Value::from(message.message_type.to_i32()),
            Value::from(message.sequence_number),
        ]);
        Ok(())
    }

    fn write_message_end(&mut self) -> ProtocolResult<()> {
        self.tree.pop()
    }

    fn write_struct_begin(&mut self, _name: &str) -> ProtocolResult<()> {
        self.tree.push_object();
        Ok(())
    }

    fn write_struct_end(&mut self) -> ProtocolResult<()> {
        self.tree.pop()
    }

    fn write_field_begin(&mut self, field: &FieldIdentifier) -> ProtocolResult<()> {
        let name = field
            .name
            .clone()
            .ok_or_else(|| ProtocolError::InvalidData("field name is required".to_string()))?;
        self.tree.push_field(name, None);
        Ok(())
    }

    fn write_field_end(&mut self) -> ProtocolResult<()> {
        self.tree.pop()
    }

    fn write_field_stop(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> ProtocolResult<()> {
        self.tree.emit(Value::from(value))
    }

    fn write_i8(&mut self, value: i8) -> ProtocolResult<()> {
        self.tree.emit(Value::from(value))
    }

    fn write_i16(&mut self, value: i16) -> ProtocolResult<()> {
        self.tree.emit(Value::from(value))
    }

    fn write_i32(&mut self, value: i32) -> ProtocolResult<()> {
        self.tree.emit(Value::from(value))
    }

    fn write_i64(&mut self, value: i64) -> ProtocolResult<()> {
        self.tree.emit(Value::from(value))
    }

    fn write_double(&mut self, value: f64) -> ProtocolResult<()> {
        self.tree.emit_double(value)
    }

    fn write_string(&mut self, value: &str) -> ProtocolResult<()> {
        self.tree.emit(Value::from(value))
    }

    fn write_binary(&mut self, value: &[u8]) -> ProtocolResult<()> {
        self.tree.emit_binary(value)
    }

    fn write_list_begin(&mut self, _list: &ListIdentifier) -> ProtocolResult<()> {
        self.tree.push_array(Vec::new());
        Ok(())
    }

    fn write_list_end(&mut self) -> ProtocolResult<()> {
        self.tree.pop()
    }

    fn write_set_begin(&mut self, _set: &ListIdentifier) -> ProtocolResult<()> {
        self.tree.push_array(Vec::new());
        Ok(())
    }

    fn write_set_end(&mut self) -> ProtocolResult<()> {
        self.tree.pop()
    }

    fn write_map_begin(&mut self, _map: &MapIdentifier) -> ProtocolResult<()> {
        self.tree.push_map(None);
        Ok(())
    }

    fn write_map_end(&mut self) -> ProtocolResult<()> {
        self.tree.pop()
    }

    fn finish(&mut self) -> ProtocolResult<Vec<u8>> {
        self.tree.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_writes_field_names() {
        let mut writer = SimpleJsonWriter::new();
        writer
            .write_message_begin(&MessageIdentifier::new("add_disk", MessageType::Reply, 4))
            .unwrap();
        writer.write_struct_begin("add_disk_result").unwrap();
        writer
            .write_field_begin(&FieldIdentifier::new("success", TType::Map, 0))
            .unwrap();
        writer
            .write_map_begin(&MapIdentifier::new(TType::I32, TType::Double, 1))
            .unwrap();
        writer.write_i32(5).unwrap();
        writer.write_double(f64::INFINITY).unwrap();
        writer.write_map_end().unwrap();
        writer.write_field_end().unwrap();
        writer.write_field_stop().unwrap();
        writer.write_struct_end().unwrap();
        writer.write_message_end().unwrap();

        let value: Value = serde_json::from_slice(&writer.finish().unwrap()).unwrap();
        assert_eq!(
            value,
            json!(["add_disk", 2, 4, {"success": {"5": "Infinity"}}])
        );
    }

    #[test]
    fn test_reports_names_and_numeric_ids() {
        let mut reader = SimpleJsonReader::new(br#"{"1":"by id","node":"by name"}"#);
        reader.read_struct_begin().unwrap();

        let first = reader.read_field_begin().unwrap();
        assert_eq!(first.id, Some(1));
        assert!(first.matches(1, "anything"));
        assert_eq!(reader.read_string().unwrap(), "by id");
        reader.read_field_end().unwrap();

        let second = reader.read_field_begin().unwrap();
        assert_eq!(second.id, None);
        assert!(second.matches(2, "node"));
        assert_eq!(second.field_type, TType::String);
        reader.skip(second.field_type).unwrap();
        reader.read_field_end().unwrap();

        assert!(reader.read_field_begin().unwrap().is_stop());
    }

    #[test]
    fn test_integer_widths_are_interchangeable() {
        let reader = SimpleJsonReader::new(b"");
        assert!(reader.accepts(TType::I64, TType::I16));
        assert!(reader.accepts(TType::List, TType::Set));
        assert!(!reader.accepts(TType::String, TType::I32));
    }
}
