//! # Dispatch
//!
//! The fixed table that routes a method name typed on the command line to its
//! typed request decoder, its client call and its response renderer.
//!
//! Arguments are decoded with [`RequestDecoder`], which reads the argument text with
//! the `simplejson` protocol regardless of the protocol used on the wire, and falls
//! back to the tagged `json` protocol when that fails:
//!
//! ```text
//! query_disk_info '{"node":"10.0.0.1:34801","app_name":"temp"}'
//! query_disk_info '{"1":{"str":"10.0.0.1:34801"},"2":{"str":"temp"}}'
//! ```
use super::rpc::{CallError, ReplicaClient};
use crate::{
    idl::radmin::{
        AddNewDiskRequest, AddNewDiskResponse, QueryDiskInfoRequest, QueryDiskInfoResponse,
        ReplicaDiskMigrateRequest, ReplicaDiskMigrateResponse,
    },
    protocol::{ProtocolError, ProtocolKind, ProtocolResult, ThriftStruct},
    transport::MemoryBuffer,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Invalid function {0}")]
    UnknownMethod(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ArgumentError {
    #[error("{method} requires {expected} args")]
    Arity {
        method: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("Invalid argument for {method}: {source}")]
    Decode {
        method: &'static str,
        #[source]
        source: ProtocolError,
    },
}

/// Every method the replica admin service exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    QueryDiskInfo,
    DiskMigrate,
    AddDisk,
}

/// One row of the dispatch table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodEntry {
    pub method: Method,
    /// Name on the wire and on the command line.
    pub name: &'static str,
    /// Name used in diagnostics.
    pub display: &'static str,
    pub arity: usize,
    pub request_type: &'static str,
    pub response_type: &'static str,
}

pub static METHODS: [MethodEntry; 3] = [
    MethodEntry {
        method: Method::QueryDiskInfo,
        name: "query_disk_info",
        display: "QueryDiskInfo",
        arity: 1,
        request_type: "query_disk_info_request",
        response_type: "query_disk_info_response",
    },
    MethodEntry {
        method: Method::DiskMigrate,
        name: "disk_migrate",
        display: "DiskMigrate",
        arity: 1,
        request_type: "replica_disk_migrate_request",
        response_type: "replica_disk_migrate_response",
    },
    MethodEntry {
        method: Method::AddDisk,
        name: "add_disk",
        display: "AddDisk",
        arity: 1,
        request_type: "add_new_disk_request",
        response_type: "add_new_disk_response",
    },
];

impl MethodEntry {
    /// `<response> <name>(<request> req)`
    pub fn signature(&self) -> String {
        format!(
            "{} {}({} req)",
            self.response_type, self.name, self.request_type
        )
    }

    /// Checks the argument count, then decodes the request argument.
    pub fn decode(&self, args: &[String]) -> Result<Request, ArgumentError> {
        let arity_error = || ArgumentError::Arity {
            method: self.display,
            expected: self.arity,
            got: args.len(),
        };
        if args.len() != self.arity {
            return Err(arity_error());
        }
        let arg = args.first().ok_or_else(arity_error)?;

        let decoder = RequestDecoder::default();
        let request = match self.method {
            Method::QueryDiskInfo => decoder.decode(arg).map(Request::QueryDiskInfo),
            Method::DiskMigrate => decoder.decode(arg).map(Request::DiskMigrate),
            Method::AddDisk => decoder.decode(arg).map(Request::AddDisk),
        };

        request.map_err(|source| ArgumentError::Decode {
            method: self.display,
            source,
        })
    }
}

/// Immutable name-to-entry lookup, built once per process.
#[derive(Debug, Clone)]
pub struct DispatchTable {
    entries: BTreeMap<&'static str, &'static MethodEntry>,
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchTable {
    pub fn new() -> Self {
        Self {
            entries: METHODS.iter().map(|entry| (entry.name, entry)).collect(),
        }
    }

    pub fn lookup(&self, name: &str) -> Result<&'static MethodEntry, DispatchError> {
        self.entries
            .get(name)
            .copied()
            .ok_or_else(|| DispatchError::UnknownMethod(name.to_string()))
    }

    /// Entries in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = &'static MethodEntry> {
        METHODS.iter()
    }
}

/// Decodes textual arguments into typed requests.
#[derive(Debug, Clone, Copy)]
pub struct RequestDecoder {
    primary: ProtocolKind,
    fallback: Option<ProtocolKind>,
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self {
            primary: ProtocolKind::SimpleJson,
            fallback: Some(ProtocolKind::Json),
        }
    }
}

impl RequestDecoder {
    /// A decoder that only accepts `protocol`.
    pub fn new(protocol: ProtocolKind) -> Self {
        Self {
            primary: protocol,
            fallback: None,
        }
    }

    /// Decodes with the primary protocol, then with the fallback.
    ///
    /// When both fail the primary protocol's error is returned.
    pub fn decode<T: ThriftStruct>(&self, text: &str) -> ProtocolResult<T> {
        let buffer = MemoryBuffer::from(text);
        let err = match read_as(self.primary, buffer.as_bytes()) {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        let Some(fallback) = self.fallback else {
            return Err(err);
        };

        read_as(fallback, buffer.as_bytes()).map_err(|fallback_err| {
            debug!(
                primary = %self.primary,
                %fallback,
                error = %fallback_err,
                "fallback decode failed"
            );
            err
        })
    }
}

fn read_as<T: ThriftStruct>(protocol: ProtocolKind, buf: &[u8]) -> ProtocolResult<T> {
    let mut reader = protocol.reader(buf);
    T::read(reader.as_mut())
}

/// A decoded request, tagged with the method it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    QueryDiskInfo(QueryDiskInfoRequest),
    DiskMigrate(ReplicaDiskMigrateRequest),
    AddDisk(AddNewDiskRequest),
}

impl Request {
    pub async fn invoke(self, client: &mut ReplicaClient) -> Result<Response, CallError> {
        match self {
            Request::QueryDiskInfo(req) => client
                .query_disk_info(req)
                .await
                .map(Response::QueryDiskInfo),
            Request::DiskMigrate(req) => client
                .disk_migrate(req)
                .await
                .map(Response::DiskMigrate),
            Request::AddDisk(req) => client.add_disk(req).await.map(Response::AddDisk),
        }
    }
}

/// A typed response. Serializes as the bare response struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Response {
    QueryDiskInfo(QueryDiskInfoResponse),
    DiskMigrate(ReplicaDiskMigrateResponse),
    AddDisk(AddNewDiskResponse),
}

impl Response {
    /// Pretty-printed JSON, the form printed on stdout.
    pub fn render(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idl::{ErrorCode, Gpid};

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_lookup() {
        let table = DispatchTable::new();

        assert_eq!(table.lookup("add_disk").unwrap().method, Method::AddDisk);
        assert!(matches!(
            table.lookup("drop_table"),
            Err(DispatchError::UnknownMethod(name)) if name == "drop_table"
        ));
    }

    #[test]
    fn test_signatures() {
        let signatures: Vec<String> = DispatchTable::new()
            .entries()
            .map(MethodEntry::signature)
            .collect();

        assert_eq!(
            signatures,
            [
                "query_disk_info_response query_disk_info(query_disk_info_request req)",
                "replica_disk_migrate_response disk_migrate(replica_disk_migrate_request req)",
                "add_new_disk_response add_disk(add_new_disk_request req)",
            ]
        );
    }

    #[test]
    fn test_wrong_arity() {
        let entry = DispatchTable::new().lookup("query_disk_info").unwrap();

        let err = entry.decode(&[]).unwrap_err();
        assert_eq!(err.to_string(), "QueryDiskInfo requires 1 args");

        let err = entry.decode(&args(&["{}", "{}"])).unwrap_err();
        assert!(matches!(err, ArgumentError::Arity { got: 2, .. }));
    }

    #[test]
    fn test_decode_by_field_name() {
        let entry = DispatchTable::new().lookup("query_disk_info").unwrap();

        assert_eq!(
            entry.decode(&args(&[r#"{"node":"n1"}"#])).unwrap(),
            Request::QueryDiskInfo(QueryDiskInfoRequest {
                node: "n1".to_string(),
                app_name: String::new(),
            })
        );
    }

    #[test]
    fn test_decode_by_field_id() {
        let entry = DispatchTable::new().lookup("disk_migrate").unwrap();
        let pid = Gpid::new(2, 5);

        let arg = format!(r#"{{"1":{},"2":"ssd1","3":"ssd2"}}"#, pid.raw());
        let request = entry.decode(&[arg]).unwrap();

        assert_eq!(
            request,
            Request::DiskMigrate(ReplicaDiskMigrateRequest {
                pid,
                origin_disk: "ssd1".to_string(),
                target_disk: "ssd2".to_string(),
            })
        );
    }

    #[test]
    fn test_decode_tagged_json() {
        let table = DispatchTable::new();
        let pid = Gpid::new(3, 1);

        let request = table
            .lookup("query_disk_info")
            .unwrap()
            .decode(&args(&[r#"{"1":{"str":"n1"}}"#]))
            .unwrap();
        assert_eq!(
            request,
            Request::QueryDiskInfo(QueryDiskInfoRequest {
                node: "n1".to_string(),
                app_name: String::new(),
            })
        );

        let arg = format!(
            r#"{{"1":{{"i64":{}}},"2":{{"str":"ssd1"}},"3":{{"str":"ssd2"}}}}"#,
            pid.raw()
        );
        let request = table.lookup("disk_migrate").unwrap().decode(&[arg]).unwrap();
        assert_eq!(
            request,
            Request::DiskMigrate(ReplicaDiskMigrateRequest {
                pid,
                origin_disk: "ssd1".to_string(),
                target_disk: "ssd2".to_string(),
            })
        );
    }

    #[test]
    fn test_decoder_without_fallback() {
        let decoder = RequestDecoder::new(ProtocolKind::SimpleJson);

        assert!(
            decoder
                .decode::<QueryDiskInfoRequest>(r#"{"1":{"str":"n1"}}"#)
                .is_err()
        );
        assert_eq!(
            decoder
                .decode::<QueryDiskInfoRequest>(r#"{"node":"n1"}"#)
                .unwrap()
                .node,
            "n1"
        );
    }

    #[test]
    fn test_wrong_field_type_is_rejected() {
        let entry = DispatchTable::new().lookup("query_disk_info").unwrap();

        for bad in [
            r#"{"node":"n1","app_name":5}"#,
            r#"{"node":["n1"]}"#,
            r#"{"1":{"str":"n1"},"2":{"i32":5}}"#,
        ] {
            let err = entry.decode(&args(&[bad])).unwrap_err();
            assert!(
                matches!(
                    err,
                    ArgumentError::Decode {
                        source: ProtocolError::InvalidData(_),
                        ..
                    }
                ),
                "argument {bad}: {err}"
            );
        }
    }

    #[test]
    fn test_null_field_is_absent() {
        let entry = DispatchTable::new().lookup("query_disk_info").unwrap();

        assert_eq!(
            entry
                .decode(&args(&[r#"{"node":"n1","app_name":null}"#]))
                .unwrap(),
            Request::QueryDiskInfo(QueryDiskInfoRequest {
                node: "n1".to_string(),
                app_name: String::new(),
            })
        );
    }

    #[test]
    fn test_malformed_argument() {
        let entry = DispatchTable::new().lookup("add_disk").unwrap();

        for bad in ["not json", r#"{"disk_str":"#, r#"{"other":"x"}"#, "[1,2]"] {
            assert!(
                matches!(
                    entry.decode(&args(&[bad])),
                    Err(ArgumentError::Decode {
                        method: "AddDisk",
                        ..
                    })
                ),
                "argument {bad}"
            );
        }
    }

    #[test]
    fn test_render_is_the_bare_response() {
        let response = Response::AddDisk(AddNewDiskResponse {
            err: ErrorCode::ok(),
            err_hint: Some("added".to_string()),
        });

        let value: serde_json::Value = serde_json::from_str(&response.render().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"err": "ERR_OK", "err_hint": "added"})
        );
    }
}
