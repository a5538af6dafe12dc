//! # JSON Protocol
//!
//! Thrift TJSON encoding. Every value carries its wire type, so the format is lossless:
//!
//! ```text
//! [1,"query_disk_info",1,1,{"1":{"rec":{"1":{"str":"n1"}}}}]
//! ```
use super::{
    FieldIdentifier, ListIdentifier, MapIdentifier, MessageIdentifier, MessageType,
    ProtocolError, ProtocolReader, ProtocolResult, ProtocolWriter, TType, checked_size,
    json_tree::{
        TreeBuilder, TreeReader, as_bool, as_f64, as_i64, as_int, into_binary, into_string,
        unexpected,
    },
};
use serde_json::Value;

const VERSION: i64 = 1;

fn type_tag(ttype: TType) -> ProtocolResult<&'static str> {
    match ttype {
        TType::Bool => Ok("tf"),
        TType::I8 => Ok("i8"),
        TType::I16 => Ok("i16"),
        TType::I32 => Ok("i32"),
        TType::I64 => Ok("i64"),
        TType::Double => Ok("dbl"),
        TType::String => Ok("str"),
        TType::Struct => Ok("rec"),
        TType::Map => Ok("map"),
        TType::Set => Ok("set"),
        TType::List => Ok("lst"),
        TType::Stop | TType::Void => Err(ProtocolError::InvalidData(format!(
            "{ttype:?} has no JSON type tag"
        ))),
    }
}

fn type_from_tag(tag: &str) -> ProtocolResult<TType> {
    match tag {
        "tf" => Ok(TType::Bool),
        "i8" => Ok(TType::I8),
        "i16" => Ok(TType::I16),
        "i32" => Ok(TType::I32),
        "i64" => Ok(TType::I64),
        "dbl" => Ok(TType::Double),
        "str" => Ok(TType::String),
        "rec" => Ok(TType::Struct),
        "map" => Ok(TType::Map),
        "set" => Ok(TType::Set),
        "lst" => Ok(TType::List),
        other => Err(ProtocolError::InvalidData(format!(
            "unknown JSON type tag '{other}'"
        ))),
    }
}

pub struct JsonReader<'a> {
    tree: TreeReader<'a>,
}

impl<'a> JsonReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            tree: TreeReader::new(buf),
        }
    }

    fn read_collection_begin(&mut self) -> ProtocolResult<ListIdentifier> {
        let mut items = self.tree.next_array()?.into_iter();
        let (Some(tag), Some(size)) = (items.next(), items.next()) else {
            return Err(ProtocolError::InvalidData(
                "list header needs a type tag and a size".to_string(),
            ));
        };
        let element_type = type_from_tag(&into_string(tag)?)?;
        let size = checked_size(as_i64(&size)?)?;
        self.tree.enter_array(items.collect());
        Ok(ListIdentifier::new(element_type, size))
    }
}

impl ProtocolReader for JsonReader<'_> {
    fn strict_types(&self) -> bool {
        true
    }

    fn read_message_begin(&mut self) -> ProtocolResult<MessageIdentifier> {
        let items = self.tree.next_array()?;
        self.tree.enter_array(items);

        let version = as_i64(&self.tree.next_value()?)?;
        if version != VERSION {
            return Err(ProtocolError::BadVersion(version));
        }
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

        let id = key
            .parse::<i16>()
            .map_err(|_| ProtocolError::InvalidData(format!("invalid field id '{key}'")))?;

        let (tag, inner) = match value {
            Value::Object(wrapper) if wrapper.len() == 1 => wrapper
                .into_iter()
                .next()
                .ok_or_else(|| ProtocolError::InvalidData("empty field wrapper".to_string()))?,
            other => return Err(unexpected("a single-key type wrapper", &other)),
        };

        let field_type = type_from_tag(&tag)?;
        self.tree.enter_field(inner);

        Ok(FieldIdentifier {
            name: None,
            field_type,
            id: Some(id),
        })
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
        let mut items = self.tree.next_array()?.into_iter();
        let (Some(key_tag), Some(value_tag), Some(size), Some(entries)) =
            (items.next(), items.next(), items.next(), items.next())
        else {
            return Err(ProtocolError::InvalidData(
                "map header needs key and value tags, a size and an object".to_string(),
            ));
        };

        let key_type = type_from_tag(&into_string(key_tag)?)?;
        let value_type = type_from_tag(&into_string(value_tag)?)?;
        let size = checked_size(as_i64(&size)?)?;

        match entries {
            Value::Object(entries) => self.tree.enter_map(entries),
            other => return Err(unexpected("an object of map entries", &other)),
        }

        Ok(MapIdentifier::new(key_type, value_type, size))
    }

    fn read_map_end(&mut self) -> ProtocolResult<()> {
        self.tree.leave()
    }
}

#[derive(Default)]
pub struct JsonWriter {
    tree: TreeBuilder,
}

impl JsonWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProtocolWriter for JsonWriter {
    fn write_message_begin(&mut self, message: &MessageIdentifier) -> ProtocolResult<()> {
        self.tree.push_array(vec![
            Value::from(VERSION),
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
        let id = field
            .id
            .ok_or_else(|| ProtocolError::InvalidData("field id is required".to_string()))?;
        self.tree
            .push_field(id.to_string(), Some(type_tag(field.field_type)?));
        Ok(())
    }

    fn write_field_end(&mut self) -> ProtocolResult<()> {
        self.tree.pop()
    }

    fn write_field_stop(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> ProtocolResult<()> {
        self.tree.emit(Value::from(u8::from(value)))
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

    fn write_list_begin(&mut self, list: &ListIdentifier) -> ProtocolResult<()> {
        self.tree.push_array(vec![
            Value::from(type_tag(list.element_type)?),
            Value::from(list.size),
        ]);
        Ok(())
    }

    fn write_list_end(&mut self) -> ProtocolResult<()> {
        self.tree.pop()
    }

    fn write_set_begin(&mut self, set: &ListIdentifier) -> ProtocolResult<()> {
        self.write_list_begin(set)
    }

    fn write_set_end(&mut self) -> ProtocolResult<()> {
        self.tree.pop()
    }

    fn write_map_begin(&mut self, map: &MapIdentifier) -> ProtocolResult<()> {
        self.tree.push_map(Some(vec![
            Value::from(type_tag(map.key_type)?),
            Value::from(type_tag(map.value_type)?),
            Value::from(map.size),
        ]));
        Ok(())
    }

    fn write_map_end(&mut self) -> ProtocolResult<()> {
        self.tree.pop()
    }

    fn finish(&mut self) -> ProtocolResult<Vec<u8>> {
        self.tree.finish()
    }
}
