//! # Replica Admin Client
//!
//! A typed client stub over one open [`Connection`]. Each call wraps the request in a
//! `CALL` message, sends it, reads the reply and validates its envelope:
//!
//! * the reply must name the called method and echo its sequence id,
//! * an `EXCEPTION` reply carries an [`ApplicationException`],
//! * a `REPLY` must carry the `success` field of the result struct.
use crate::{
    idl::{
        CallArgs, CallResult,
        radmin::{
            AddNewDiskRequest, AddNewDiskResponse, QueryDiskInfoRequest, QueryDiskInfoResponse,
            ReplicaDiskMigrateRequest, ReplicaDiskMigrateResponse,
        },
    },
    protocol::{
        ApplicationException, ApplicationExceptionKind, MessageIdentifier, MessageType,
        ProtocolError, ProtocolKind, ProtocolResult, TType, ThriftStruct,
    },
    transport::{Connection, ReadState, TransportError},
};
use bytes::BytesMut;
use tracing::{debug, warn};

/// Errors raised while a call is in flight.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("Application error: {0}")]
    Application(#[from] ApplicationException),
}

enum ReplyBody<T> {
    Result(CallResult<T>),
    Exception(ApplicationException),
    Unexpected,
}

#[derive(Debug)]
pub struct ReplicaClient {
    connection: Connection,
    protocol: ProtocolKind,
    sequence_number: i32,
}

impl ReplicaClient {
    pub fn new(connection: Connection, protocol: ProtocolKind) -> Self {
        Self {
            connection,
            protocol,
            sequence_number: 0,
        }
    }

    pub async fn query_disk_info(
        &mut self,
        req: QueryDiskInfoRequest,
    ) -> Result<QueryDiskInfoResponse, CallError> {
        self.call("query_disk_info", req).await
    }

    pub async fn disk_migrate(
        &mut self,
        req: ReplicaDiskMigrateRequest,
    ) -> Result<ReplicaDiskMigrateResponse, CallError> {
        self.call("disk_migrate", req).await
    }

    pub async fn add_disk(
        &mut self,
        req: AddNewDiskRequest,
    ) -> Result<AddNewDiskResponse, CallError> {
        self.call("add_disk", req).await
    }

    /// Performs one request/response exchange for `method`.
    pub async fn call<Req, Resp>(&mut self, method: &str, req: Req) -> Result<Resp, CallError>
    where
        Req: ThriftStruct,
        Resp: ThriftStruct,
    {
        self.sequence_number = self.sequence_number.wrapping_add(1);
        let sequence_number = self.sequence_number;

        let message = {
            let mut writer = self.protocol.writer();
            writer.write_message_begin(&MessageIdentifier::new(
                method,
                MessageType::Call,
                sequence_number,
            ))?;
            CallArgs { req: Some(req) }.write(writer.as_mut())?;
            writer.write_message_end()?;
            writer.finish()?
        };

        debug!(method, sequence_number, len = message.len(), "sending call");
        self.connection.send(&message).await?;

        let mut buf = BytesMut::new();
        let (header, body) = loop {
            let state = self.connection.read_reply(&mut buf).await?;
            match decode_reply::<Resp>(self.protocol, &buf) {
                Err(ProtocolError::UnexpectedEof) if state == ReadState::Partial => continue,
                reply => break reply?,
            }
        };
        debug!(method, sequence_number, len = buf.len(), "received reply");

        if header.name != method {
            warn!(expected = method, received = %header.name, "reply names another method");
            return Err(ApplicationException::new(
                ApplicationExceptionKind::WrongMethodName,
                format!("{method} failed: wrong method name"),
            )
            .into());
        }
        if header.sequence_number != sequence_number {
            warn!(
                expected = sequence_number,
                received = header.sequence_number,
                "reply sequence id mismatch"
            );
            return Err(ApplicationException::new(
                ApplicationExceptionKind::BadSequenceId,
                format!("{method} failed: out of sequence response"),
            )
            .into());
        }

        match body {
            ReplyBody::Exception(exception) => Err(exception.into()),
            ReplyBody::Unexpected => Err(ApplicationException::new(
                ApplicationExceptionKind::InvalidMessageType,
                format!("{method} failed: invalid message type"),
            )
            .into()),
            ReplyBody::Result(result) => result.success.ok_or_else(|| {
                ApplicationException::new(
                    ApplicationExceptionKind::MissingResult,
                    format!("{method} failed: unknown result"),
                )
                .into()
            }),
        }
    }

    pub async fn close(self) -> Result<(), TransportError> {
        self.connection.close().await
    }
}

fn decode_reply<T: ThriftStruct>(
    protocol: ProtocolKind,
    buf: &[u8],
) -> ProtocolResult<(MessageIdentifier, ReplyBody<T>)> {
    let mut reader = protocol.reader(buf);
    let header = reader.read_message_begin()?;

    let body = match header.message_type {
        MessageType::Reply => ReplyBody::Result(CallResult::read(reader.as_mut())?),
        MessageType::Exception => ReplyBody::Exception(ApplicationException::read(reader.as_mut())?),
        MessageType::Call | MessageType::OneWay => {
            reader.skip(TType::Struct)?;
            ReplyBody::Unexpected
        }
    };
    reader.read_message_end()?;

    Ok((header, body))
}
