use radmin_core::client::dispatch::{ArgumentError, DispatchError};
use radmin_core::client::rpc::CallError;
use radmin_core::client::{DynamicCallError, PrepareError};
use radmin_core::idl::{
    CallResult,
    radmin::{QueryDiskInfoRequest, QueryDiskInfoResponse},
};
use radmin_core::protocol::{
    ApplicationExceptionKind, MessageIdentifier, MessageType, ProtocolKind, ThriftStruct,
};
use radmin_core::transport::{ConfigError, ConnectionConfig, ConnectionError, TransportError};
use radmin_core::{DynamicRequest, RadminClient};
use replica_service::TestServer;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn local_config(port: u16) -> ConnectionConfig {
    ConnectionConfig {
        host: "127.0.0.1".to_string(),
        port,
        ..Default::default()
    }
}

/// Replies to the first binary call on each connection with a canned envelope.
///
/// `reply` receives the request name and sequence id and returns the reply's.
async fn spawn_scripted_server(
    reply: fn(String, i32) -> (String, i32),
    split: bool,
) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        let mut buf = Vec::new();
        let header = loop {
            stream.read_buf(&mut buf).await.unwrap();
            if let Ok(header) = ProtocolKind::Binary.reader(&buf).read_message_begin() {
                break header;
            }
        };

        let (name, sequence_number) = reply(header.name, header.sequence_number);
        let mut writer = ProtocolKind::Binary.writer();
        writer
            .write_message_begin(&MessageIdentifier::new(
                name,
                MessageType::Reply,
                sequence_number,
            ))
            .unwrap();
        CallResult {
            success: Some(QueryDiskInfoResponse::default()),
        }
        .write(writer.as_mut())
        .unwrap();
        writer.write_message_end().unwrap();
        let message = writer.finish().unwrap();

        if split {
            let (head, tail) = message.split_at(message.len() / 2);
            stream.write_all(head).await.unwrap();
            stream.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            stream.write_all(tail).await.unwrap();
        } else {
            stream.write_all(&message).await.unwrap();
        }
        // Hold the connection open until the client hangs up.
        let _ = stream.read_buf(&mut buf).await;
    });

    port
}

async fn query(config: &ConnectionConfig) -> Result<(), DynamicCallError> {
    RadminClient::offline(config)
        .unwrap()
        .dynamic(DynamicRequest::new("query_disk_info", [r#"{"node":"n1"}"#]))
        .await
        .map(|_| ())
}

#[tokio::test]
async fn test_wrong_arity_opens_no_connection() {
    let server = TestServer::socket(ProtocolKind::Binary, false)
        .await
        .unwrap();
    let client = RadminClient::offline(&local_config(server.port())).unwrap();

    let result = client
        .dynamic(DynamicRequest::new("query_disk_info", Vec::<String>::new()))
        .await;

    match result {
        Err(DynamicCallError::Prepare(PrepareError::Argument(err))) => {
            assert!(matches!(err, ArgumentError::Arity { expected: 1, got: 0, .. }));
            assert_eq!(err.to_string(), "QueryDiskInfo requires 1 args");
        }
        other => panic!("Expected an arity error, got {other:?}"),
    }
    assert_eq!(server.accepted(), 0);
}

#[tokio::test]
async fn test_malformed_argument_opens_no_connection() {
    let server = TestServer::socket(ProtocolKind::Binary, false)
        .await
        .unwrap();
    let client = RadminClient::offline(&local_config(server.port())).unwrap();

    let result = client
        .dynamic(DynamicRequest::new("add_disk", ["{not json"]))
        .await;

    assert!(matches!(
        result,
        Err(DynamicCallError::Prepare(PrepareError::Argument(
            ArgumentError::Decode { .. }
        )))
    ));
    assert_eq!(server.accepted(), 0);
}

#[tokio::test]
async fn test_unknown_method() {
    let client = RadminClient::offline(&local_config(1)).unwrap();

    let result = client
        .dynamic(DynamicRequest::new("drop_replica", ["{}"]))
        .await;

    match result {
        Err(DynamicCallError::Prepare(PrepareError::Dispatch(err))) => {
            assert!(matches!(&err, DispatchError::UnknownMethod(name) if name == "drop_replica"));
            assert_eq!(err.to_string(), "Invalid function drop_replica");
        }
        other => panic!("Expected an unknown method error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_protocol_is_a_config_error() {
    let config = ConnectionConfig {
        protocol: "xml".to_string(),
        ..Default::default()
    };

    let err = RadminClient::offline(&config).unwrap_err();

    assert!(matches!(err, ConfigError::Protocol(_)));
    assert!(err.to_string().starts_with("Invalid protocol specified: 'xml'"));
}

#[tokio::test]
async fn test_connection_refused() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let err = query(&local_config(port)).await.unwrap_err();

    assert!(matches!(
        err,
        DynamicCallError::Connection(ConnectionError::Connect { .. })
    ));
    assert!(
        err.to_string()
            .starts_with(&format!("Error opening socket to 127.0.0.1:{port}"))
    );
}

#[tokio::test]
async fn test_remote_exception() {
    let server = TestServer::socket(ProtocolKind::Compact, false)
        .await
        .unwrap();
    let config = ConnectionConfig {
        protocol: "compact".to_string(),
        ..local_config(server.port())
    };

    let mut client = RadminClient::offline(&config).unwrap().connect().await.unwrap();
    let result = client
        .replica()
        .call::<_, QueryDiskInfoResponse>(
            "query_replica_info",
            QueryDiskInfoRequest {
                node: "n1".to_string(),
                app_name: String::new(),
            },
        )
        .await;
    client.close().await.unwrap();

    match result {
        Err(CallError::Application(exception)) => {
            assert_eq!(exception.kind, ApplicationExceptionKind::UnknownMethod);
            assert_eq!(exception.message, "Unknown function query_replica_info");
        }
        other => panic!("Expected an application exception, got {other:?}"),
    }
}

#[tokio::test]
async fn test_out_of_sequence_reply() {
    let port = spawn_scripted_server(|name, seq| (name, seq + 1), false).await;

    let err = query(&local_config(port)).await.unwrap_err();

    match err {
        DynamicCallError::Call(CallError::Application(exception)) => {
            assert_eq!(exception.kind, ApplicationExceptionKind::BadSequenceId);
            assert_eq!(
                exception.message,
                "query_disk_info failed: out of sequence response"
            );
        }
        other => panic!("Expected a bad sequence id, got {other:?}"),
    }
}

#[tokio::test]
async fn test_reply_for_another_method() {
    let port = spawn_scripted_server(|_, seq| ("add_disk".to_string(), seq), false).await;

    let err = query(&local_config(port)).await.unwrap_err();

    match err {
        DynamicCallError::Call(CallError::Application(exception)) => {
            assert_eq!(exception.kind, ApplicationExceptionKind::WrongMethodName);
        }
        other => panic!("Expected a wrong method name, got {other:?}"),
    }
}

#[tokio::test]
async fn test_reply_split_across_reads() {
    let port = spawn_scripted_server(|name, seq| (name, seq), true).await;

    query(&local_config(port)).await.unwrap();
}

#[tokio::test]
async fn test_http_error_status() {
    let server = TestServer::http(ProtocolKind::Binary).await.unwrap();
    let config = ConnectionConfig {
        protocol: "json".to_string(),
        url: Some(format!("http://127.0.0.1:{}", server.port())),
        http: true,
        ..Default::default()
    };

    let err = query(&config).await.unwrap_err();

    match err {
        DynamicCallError::Call(CallError::Transport(TransportError::HttpStatus(status))) => {
            assert_eq!(status.as_u16(), 400);
        }
        other => panic!("Expected an HTTP status error, got {other:?}"),
    }
}
