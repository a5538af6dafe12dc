//! Replica admin service structures.
use super::base::{ErrorCode, Gpid};
use crate::protocol::{
    FieldIdentifier, ListIdentifier, MapIdentifier, ProtocolError, ProtocolReader,
    ProtocolResult, ProtocolWriter, TType, ThriftStruct,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Replicas grouped by application id.
pub type ReplicaGroups = BTreeMap<i32, BTreeSet<Gpid>>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct QueryDiskInfoRequest {
    pub node: String,
    pub app_name: String,
}

impl ThriftStruct for QueryDiskInfoRequest {
    fn read(reader: &mut dyn ProtocolReader) -> ProtocolResult<Self> {
        let mut node = None;
        let mut app_name = String::new();

        reader.read_struct_begin()?;
        loop {
            let field = reader.read_field_begin()?;
            if field.is_stop() {
                break;
            }
            if reader.expect_field(&field, 1, "node", TType::String)? {
                node = Some(reader.read_string()?);
            } else if reader.expect_field(&field, 2, "app_name", TType::String)? {
                app_name = reader.read_string()?;
            } else {
                reader.skip(field.field_type)?;
            }
            reader.read_field_end()?;
        }
        reader.read_struct_end()?;

        Ok(Self {
            node: node.ok_or(ProtocolError::MissingField {
                structure: "query_disk_info_request",
                field: "node",
            })?,
            app_name,
        })
    }

    fn write(&self, writer: &mut dyn ProtocolWriter) -> ProtocolResult<()> {
        writer.write_struct_begin("query_disk_info_request")?;
        writer.write_field_begin(&FieldIdentifier::new("node", TType::String, 1))?;
        writer.write_string(&self.node)?;
        writer.write_field_end()?;
        writer.write_field_begin(&FieldIdentifier::new("app_name", TType::String, 2))?;
        writer.write_string(&self.app_name)?;
        writer.write_field_end()?;
        writer.write_field_stop()?;
        writer.write_struct_end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DiskInfo {
    pub tag: String,
    pub full_dir: String,
    pub disk_capacity_mb: i64,
    pub disk_available_mb: i64,
    pub holding_primary_replicas: ReplicaGroups,
    pub holding_secondary_replicas: ReplicaGroups,
}

impl ThriftStruct for DiskInfo {
    fn read(reader: &mut dyn ProtocolReader) -> ProtocolResult<Self> {
        let mut info = DiskInfo::default();

        reader.read_struct_begin()?;
        loop {
            let field = reader.read_field_begin()?;
            if field.is_stop() {
                break;
            }
            let ty = field.field_type;
            if reader.expect_field(&field, 1, "tag", TType::String)? {
                info.tag = reader.read_string()?;
            } else if reader.expect_field(&field, 2, "full_dir", TType::String)? {
                info.full_dir = reader.read_string()?;
            } else if reader.expect_field(&field, 3, "disk_capacity_mb", TType::I64)? {
                info.disk_capacity_mb = reader.read_i64()?;
            } else if reader.expect_field(&field, 4, "disk_available_mb", TType::I64)? {
                info.disk_available_mb = reader.read_i64()?;
            } else if reader.expect_field(&field, 5, "holding_primary_replicas", TType::Map)? {
                info.holding_primary_replicas = read_replica_groups(reader)?;
            } else if reader.expect_field(&field, 6, "holding_secondary_replicas", TType::Map)? {
                info.holding_secondary_replicas = read_replica_groups(reader)?;
            } else {
                reader.skip(ty)?;
            }
            reader.read_field_end()?;
        }
        reader.read_struct_end()?;

        Ok(info)
    }

    fn write(&self, writer: &mut dyn ProtocolWriter) -> ProtocolResult<()> {
        writer.write_struct_begin("disk_info")?;
        writer.write_field_begin(&FieldIdentifier::new("tag", TType::String, 1))?;
        writer.write_string(&self.tag)?;
        writer.write_field_end()?;
        writer.write_field_begin(&FieldIdentifier::new("full_dir", TType::String, 2))?;
        writer.write_string(&self.full_dir)?;
        writer.write_field_end()?;
        writer.write_field_begin(&FieldIdentifier::new("disk_capacity_mb", TType::I64, 3))?;
        writer.write_i64(self.disk_capacity_mb)?;
        writer.write_field_end()?;
        writer.write_field_begin(&FieldIdentifier::new("disk_available_mb", TType::I64, 4))?;
        writer.write_i64(self.disk_available_mb)?;
        writer.write_field_end()?;
        writer.write_field_begin(&FieldIdentifier::new(
            "holding_primary_replicas",
            TType::Map,
            5,
        ))?;
        write_replica_groups(writer, &self.holding_primary_replicas)?;
        writer.write_field_end()?;
        writer.write_field_begin(&FieldIdentifier::new(
            "holding_secondary_replicas",
            TType::Map,
            6,
        ))?;
        write_replica_groups(writer, &self.holding_secondary_replicas)?;
        writer.write_field_end()?;
        writer.write_field_stop()?;
        writer.write_struct_end()
    }
}

fn read_replica_groups(reader: &mut dyn ProtocolReader) -> ProtocolResult<ReplicaGroups> {
    let mut groups = ReplicaGroups::new();

    let map = reader.read_map_begin()?;
    for _ in 0..map.size {
        let app_id = reader.read_i32()?;
        let set = reader.read_set_begin()?;
        let mut replicas = BTreeSet::new();
        for _ in 0..set.size {
            replicas.insert(Gpid::read(reader)?);
        }
        reader.read_set_end()?;
        groups.insert(app_id, replicas);
    }
    reader.read_map_end()?;

    Ok(groups)
}

fn write_replica_groups(
    writer: &mut dyn ProtocolWriter,
    groups: &ReplicaGroups,
) -> ProtocolResult<()> {
    writer.write_map_begin(&MapIdentifier::new(TType::I32, TType::Set, groups.len()))?;
    for (app_id, replicas) in groups {
        writer.write_i32(*app_id)?;
        writer.write_set_begin(&ListIdentifier::new(TType::I64, replicas.len()))?;
        for gpid in replicas {
            gpid.write(writer)?;
        }
        writer.write_set_end()?;
    }
    writer.write_map_end()
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct QueryDiskInfoResponse {
    pub err: ErrorCode,
    pub total_capacity_mb: i64,
    pub total_available_mb: i64,
    pub disk_infos: Vec<DiskInfo>,
}

impl ThriftStruct for QueryDiskInfoResponse {
    fn read(reader: &mut dyn ProtocolReader) -> ProtocolResult<Self> {
        let mut response = QueryDiskInfoResponse::default();

        reader.read_struct_begin()?;
        loop {
            let field = reader.read_field_begin()?;
            if field.is_stop() {
                break;
            }
            let ty = field.field_type;
            if reader.expect_field(&field, 1, "err", TType::String)? {
                response.err = ErrorCode::read(reader)?;
            } else if reader.expect_field(&field, 2, "total_capacity_mb", TType::I64)? {
                response.total_capacity_mb = reader.read_i64()?;
            } else if reader.expect_field(&field, 3, "total_available_mb", TType::I64)? {
                response.total_available_mb = reader.read_i64()?;
            } else if reader.expect_field(&field, 4, "disk_infos", TType::List)? {
                let list = reader.read_list_begin()?;
                let mut disk_infos = Vec::new();
                for _ in 0..list.size {
                    disk_infos.push(DiskInfo::read(reader)?);
                }
                reader.read_list_end()?;
                response.disk_infos = disk_infos;
            } else {
                reader.skip(ty)?;
            }
            reader.read_field_end()?;
        }
        reader.read_struct_end()?;

        Ok(response)
    }

    fn write(&self, writer: &mut dyn ProtocolWriter) -> ProtocolResult<()> {
        writer.write_struct_begin("query_disk_info_response")?;
        writer.write_field_begin(&FieldIdentifier::new("err", TType::String, 1))?;
        self.err.write(writer)?;
        writer.write_field_end()?;
        writer.write_field_begin(&FieldIdentifier::new("total_capacity_mb", TType::I64, 2))?;
        writer.write_i64(self.total_capacity_mb)?;
        writer.write_field_end()?;
        writer.write_field_begin(&FieldIdentifier::new("total_available_mb", TType::I64, 3))?;
        writer.write_i64(self.total_available_mb)?;
        writer.write_field_end()?;
        writer.write_field_begin(&FieldIdentifier::new("disk_infos", TType::List, 4))?;
        writer.write_list_begin(&ListIdentifier::new(TType::Struct, self.disk_infos.len()))?;
        for info in &self.disk_infos {
            info.write(writer)?;
        }
        writer.write_list_end()?;
        writer.write_field_end()?;
        writer.write_field_stop()?;
        writer.write_struct_end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ReplicaDiskMigrateRequest {
    pub pid: Gpid,
    pub origin_disk: String,
    pub target_disk: String,
}

impl ThriftStruct for ReplicaDiskMigrateRequest {
    fn read(reader: &mut dyn ProtocolReader) -> ProtocolResult<Self> {
        let mut pid = None;
        let mut origin_disk = String::new();
        let mut target_disk = String::new();

        reader.read_struct_begin()?;
        loop {
            let field = reader.read_field_begin()?;
            if field.is_stop() {
                break;
            }
            let ty = field.field_type;
            if reader.expect_field(&field, 1, "pid", TType::I64)? {
                pid = Some(Gpid::read(reader)?);
            } else if reader.expect_field(&field, 2, "origin_disk", TType::String)? {
                origin_disk = reader.read_string()?;
            } else if reader.expect_field(&field, 3, "target_disk", TType::String)? {
                target_disk = reader.read_string()?;
            } else {
                reader.skip(ty)?;
            }
            reader.read_field_end()?;
        }
        reader.read_struct_end()?;

        Ok(Self {
            pid: pid.ok_or(ProtocolError::MissingField {
                structure: "replica_disk_migrate_request",
                field: "pid",
            })?,
            origin_disk,
            target_disk,
        })
    }

    fn write(&self, writer: &mut dyn ProtocolWriter) -> ProtocolResult<()> {
        writer.write_struct_begin("replica_disk_migrate_request")?;
        writer.write_field_begin(&FieldIdentifier::new("pid", TType::I64, 1))?;
        self.pid.write(writer)?;
        writer.write_field_end()?;
        writer.write_field_begin(&FieldIdentifier::new("origin_disk", TType::String, 2))?;
        writer.write_string(&self.origin_disk)?;
        writer.write_field_end()?;
        writer.write_field_begin(&FieldIdentifier::new("target_disk", TType::String, 3))?;
        writer.write_string(&self.target_disk)?;
        writer.write_field_end()?;
        writer.write_field_stop()?;
        writer.write_struct_end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ReplicaDiskMigrateResponse {
    pub err: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ThriftStruct for ReplicaDiskMigrateResponse {
    fn read(reader: &mut dyn ProtocolReader) -> ProtocolResult<Self> {
        let (err, hint) = read_err_with_hint(reader, "hint")?;
        Ok(Self { err, hint })
    }

    fn write(&self, writer: &mut dyn ProtocolWriter) -> ProtocolResult<()> {
        write_err_with_hint(
            writer,
            "replica_disk_migrate_response",
            &self.err,
            "hint",
            self.hint.as_deref(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AddNewDiskRequest {
    pub disk_str: String,
}

impl ThriftStruct for AddNewDiskRequest {
    fn read(reader: &mut dyn ProtocolReader) -> ProtocolResult<Self> {
        let mut disk_str = None;

        reader.read_struct_begin()?;
        loop {
            let field = reader.read_field_begin()?;
            if field.is_stop() {
                break;
            }
            if reader.expect_field(&field, 1, "disk_str", TType::String)? {
                disk_str = Some(reader.read_string()?);
            } else {
                reader.skip(field.field_type)?;
            }
            reader.read_field_end()?;
        }
        reader.read_struct_end()?;

        Ok(Self {
            disk_str: disk_str.ok_or(ProtocolError::MissingField {
                structure: "add_new_disk_request",
                field: "disk_str",
            })?,
        })
    }

    fn write(&self, writer: &mut dyn ProtocolWriter) -> ProtocolResult<()> {
        writer.write_struct_begin("add_new_disk_request")?;
        writer.write_field_begin(&FieldIdentifier::new("disk_str", TType::String, 1))?;
        writer.write_string(&self.disk_str)?;
        writer.write_field_end()?;
        writer.write_field_stop()?;
        writer.write_struct_end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AddNewDiskResponse {
    pub err: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err_hint: Option<String>,
}

impl ThriftStruct for AddNewDiskResponse {
    fn read(reader: &mut dyn ProtocolReader) -> ProtocolResult<Self> {
        let (err, err_hint) = read_err_with_hint(reader, "err_hint")?;
        Ok(Self { err, err_hint })
    }

    fn write(&self, writer: &mut dyn ProtocolWriter) -> ProtocolResult<()> {
        write_err_with_hint(
            writer,
            "add_new_disk_response",
            &self.err,
            "err_hint",
            self.err_hint.as_deref(),
        )
    }
}

/// Both disk admin responses are `{ 1: err, 2: optional <hint> }`.
fn read_err_with_hint(
    reader: &mut dyn ProtocolReader,
    hint_name: &str,
) -> ProtocolResult<(ErrorCode, Option<String>)> {
    let mut err = ErrorCode::default();
    let mut hint = None;

    reader.read_struct_begin()?;
    loop {
        let field = reader.read_field_begin()?;
        if field.is_stop() {
            break;
        }
        if reader.expect_field(&field, 1, "err", TType::String)? {
            err = ErrorCode::read(reader)?;
        } else if reader.expect_field(&field, 2, hint_name, TType::String)? {
            hint = Some(reader.read_string()?);
        } else {
            reader.skip(field.field_type)?;
        }
        reader.read_field_end()?;
    }
    reader.read_struct_end()?;

    Ok((err, hint))
}

fn write_err_with_hint(
    writer: &mut dyn ProtocolWriter,
    struct_name: &str,
    err: &ErrorCode,
    hint_name: &str,
    hint: Option<&str>,
) -> ProtocolResult<()> {
    writer.write_struct_begin(struct_name)?;
    writer.write_field_begin(&FieldIdentifier::new("err", TType::String, 1))?;
    err.write(writer)?;
    writer.write_field_end()?;
    if let Some(hint) = hint {
        writer.write_field_begin(&FieldIdentifier::new(hint_name, TType::String, 2))?;
        writer.write_string(hint)?;
        writer.write_field_end()?;
    }
    writer.write_field_stop()?;
    writer.write_struct_end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProtocolKind;
    use serde_json::json;

    const ALL_PROTOCOLS: [ProtocolKind; 4] = [
        ProtocolKind::Binary,
        ProtocolKind::Compact,
        ProtocolKind::SimpleJson,
        ProtocolKind::Json,
    ];

    fn sample_response() -> QueryDiskInfoResponse {
        let mut primaries = ReplicaGroups::new();
        primaries.insert(1, BTreeSet::from([Gpid::new(1, 0), Gpid::new(1, 3)]));
        let mut secondaries = ReplicaGroups::new();
        secondaries.insert(2, BTreeSet::from([Gpid::new(2, 7)]));
        secondaries.insert(5, BTreeSet::new());

        QueryDiskInfoResponse {
            err: ErrorCode::ok(),
            total_capacity_mb: 2048,
            total_available_mb: 1024,
            disk_infos: vec![DiskInfo {
                tag: "ssd1".to_string(),
                full_dir: "/data/ssd1/replica".to_string(),
                disk_capacity_mb: 2048,
                disk_available_mb: 1024,
                holding_primary_replicas: primaries,
                holding_secondary_replicas: secondaries,
            }],
        }
    }

    #[test]
    fn test_nested_response_with_every_protocol() {
        let response = sample_response();

        for kind in ALL_PROTOCOLS {
            let mut writer = kind.writer();
            response.write(writer.as_mut()).unwrap();
            let bytes = writer.finish().unwrap();

            let mut reader = kind.reader(&bytes);
            let decoded = QueryDiskInfoResponse::read(reader.as_mut()).unwrap();
            assert_eq!(decoded, response, "protocol {kind}");
        }
    }

    #[test]
    fn test_optional_hint_is_omitted_when_absent() {
        let response = AddNewDiskResponse {
            err: ErrorCode("ERR_INVALID_PARAMETERS".to_string()),
            err_hint: None,
        };

        let mut writer = ProtocolKind::SimpleJson.writer();
        response.write(writer.as_mut()).unwrap();
        let text = writer.finish().unwrap();

        let value: serde_json::Value = serde_json::from_slice(&text).unwrap();
        assert_eq!(value, json!({"err": "ERR_INVALID_PARAMETERS"}));
    }

    #[test]
    fn test_missing_required_field() {
        let mut reader = ProtocolKind::SimpleJson.reader(br#"{"app_name":"temp"}"#);
        let err = QueryDiskInfoRequest::read(reader.as_mut()).unwrap_err();

        assert!(matches!(
            err,
            ProtocolError::MissingField {
                structure: "query_disk_info_request",
                field: "node"
            }
        ));
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        let mut reader = ProtocolKind::SimpleJson
            .reader(br#"{"extra":{"deep":[1,2,{"x":null}]},"disk_str":"ssd2:/data/ssd2"}"#);
        let request = AddNewDiskRequest::read(reader.as_mut()).unwrap();

        assert_eq!(request.disk_str, "ssd2:/data/ssd2");
    }

    #[test]
    fn test_response_renders_as_json() {
        let value = serde_json::to_value(sample_response()).unwrap();

        assert_eq!(value["err"], json!("ERR_OK"));
        assert_eq!(
            value["disk_infos"][0]["holding_primary_replicas"]["1"],
            json!(["1.0", "1.3"])
        );
    }
}
