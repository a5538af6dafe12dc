use radmin_core::{
    idl::{
        CallArgs, CallResult, ErrorCode, Gpid,
        radmin::{
            AddNewDiskRequest, AddNewDiskResponse, DiskInfo, QueryDiskInfoRequest,
            QueryDiskInfoResponse, ReplicaDiskMigrateRequest, ReplicaDiskMigrateResponse,
            ReplicaGroups,
        },
    },
    protocol::{
        ApplicationException, ApplicationExceptionKind, MessageIdentifier, MessageType,
        ProtocolKind, ProtocolReader, ProtocolResult, ProtocolWriter, TType, ThriftStruct,
    },
};
use std::collections::BTreeSet;

/// Server side of the replica admin service.
pub trait ReplicaHandler: Send + Sync + 'static {
    fn query_disk_info(&self, req: QueryDiskInfoRequest) -> QueryDiskInfoResponse;
    fn disk_migrate(&self, req: ReplicaDiskMigrateRequest) -> ReplicaDiskMigrateResponse;
    fn add_disk(&self, req: AddNewDiskRequest) -> AddNewDiskResponse;
}

/// A replica with one disk, `ssd1`, holding two primaries and one secondary of app 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeReplica;

impl ReplicaHandler for FakeReplica {
    fn query_disk_info(&self, req: QueryDiskInfoRequest) -> QueryDiskInfoResponse {
        let mut primaries = ReplicaGroups::new();
        primaries.insert(1, BTreeSet::from([Gpid::new(1, 0), Gpid::new(1, 1)]));
        let mut secondaries = ReplicaGroups::new();
        secondaries.insert(1, BTreeSet::from([Gpid::new(1, 2)]));

        QueryDiskInfoResponse {
            err: ErrorCode::ok(),
            total_capacity_mb: 2048,
            total_available_mb: 1024,
            disk_infos: vec![DiskInfo {
                tag: "ssd1".to_string(),
                full_dir: format!("/data/{}/ssd1", req.node),
                disk_capacity_mb: 2048,
                disk_available_mb: 1024,
                holding_primary_replicas: primaries,
                holding_secondary_replicas: secondaries,
            }],
        }
    }

    fn disk_migrate(&self, req: ReplicaDiskMigrateRequest) -> ReplicaDiskMigrateResponse {
        if req.origin_disk == req.target_disk {
            return ReplicaDiskMigrateResponse {
                err: ErrorCode("ERR_INVALID_PARAMETERS".to_string()),
                hint: Some(format!(
                    "{} origin disk is equal with target disk",
                    req.pid
                )),
            };
        }
        ReplicaDiskMigrateResponse {
            err: ErrorCode::ok(),
            hint: None,
        }
    }

    fn add_disk(&self, req: AddNewDiskRequest) -> AddNewDiskResponse {
        if req.disk_str.is_empty() {
            return AddNewDiskResponse {
                err: ErrorCode("ERR_INVALID_PARAMETERS".to_string()),
                err_hint: Some("disk_str is empty".to_string()),
            };
        }
        AddNewDiskResponse {
            err: ErrorCode::ok(),
            err_hint: None,
        }
    }
}

/// Decodes one call from `request` and returns the encoded reply.
///
/// Unknown methods and missing request structs are answered with an `EXCEPTION`
/// reply. Returns [`ProtocolError::UnexpectedEof`] while `request` is incomplete.
pub fn process<H: ReplicaHandler + ?Sized>(
    protocol: ProtocolKind,
    handler: &H,
    request: &[u8],
) -> ProtocolResult<Vec<u8>> {
    let mut reader = protocol.reader(request);
    let mut writer = protocol.writer();
    let header = reader.read_message_begin()?;

    let reader = reader.as_mut();
    let writer = writer.as_mut();
    match header.name.as_str() {
        "query_disk_info" => serve(reader, writer, &header, |req| handler.query_disk_info(req))?,
        "disk_migrate" => serve(reader, writer, &header, |req| handler.disk_migrate(req))?,
        "add_disk" => serve(reader, writer, &header, |req| handler.add_disk(req))?,
        other => {
            reader.skip(TType::Struct)?;
            reader.read_message_end()?;
            let exception = ApplicationException::new(
                ApplicationExceptionKind::UnknownMethod,
                format!("Unknown function {other}"),
            );
            write_exception(writer, &header, &exception)?;
        }
    }

    writer.finish()
}

fn serve<Req, Resp>(
    reader: &mut dyn ProtocolReader,
    writer: &mut dyn ProtocolWriter,
    header: &MessageIdentifier,
    call: impl FnOnce(Req) -> Resp,
) -> ProtocolResult<()>
where
    Req: ThriftStruct,
    Resp: ThriftStruct,
{
    let args = CallArgs::<Req>::read(reader)?;
    reader.read_message_end()?;

    let Some(req) = args.req else {
        let exception = ApplicationException::new(
            ApplicationExceptionKind::ProtocolError,
            "missing request argument",
        );
        return write_exception(writer, header, &exception);
    };

    writer.write_message_begin(&MessageIdentifier::new(
        header.name.as_str(),
        MessageType::Reply,
        header.sequence_number,
    ))?;
    CallResult {
        success: Some(call(req)),
    }
    .write(writer)?;
    writer.write_message_end()
}

fn write_exception(
    writer: &mut dyn ProtocolWriter,
    header: &MessageIdentifier,
    exception: &ApplicationException,
) -> ProtocolResult<()> {
    writer.write_message_begin(&MessageIdentifier::new(
        header.name.as_str(),
        MessageType::Exception,
        header.sequence_number,
    ))?;
    exception.write(writer)?;
    writer.write_message_end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use radmin_core::protocol::ProtocolError;

    #[test]
    fn test_incomplete_request() {
        let err = process(ProtocolKind::Binary, &FakeReplica, &[0x80, 0x01]).unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedEof));
    }
}
