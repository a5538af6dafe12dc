use radmin_core::client::dispatch::Response;
use radmin_core::idl::{ErrorCode, Gpid};
use radmin_core::protocol::ProtocolKind;
use radmin_core::transport::ConnectionConfig;
use radmin_core::{DynamicRequest, RadminClient};
use replica_service::TestServer;

const PROTOCOLS: [ProtocolKind; 4] = [
    ProtocolKind::Binary,
    ProtocolKind::Compact,
    ProtocolKind::SimpleJson,
    ProtocolKind::Json,
];

fn socket_config(server: &TestServer, protocol: ProtocolKind, framed: bool) -> ConnectionConfig {
    ConnectionConfig {
        host: "127.0.0.1".to_string(),
        port: server.port(),
        protocol: protocol.to_string(),
        framed,
        ..Default::default()
    }
}

async fn query_disk_info(config: &ConnectionConfig) -> Response {
    RadminClient::offline(config)
        .expect("Failed to resolve the configuration")
        .dynamic(DynamicRequest::new(
            "query_disk_info",
            [r#"{"node":"n1"}"#],
        ))
        .await
        .expect("Call failed")
}

fn assert_disk_info(response: Response) {
    let info = match response {
        Response::QueryDiskInfo(info) => info,
        other => panic!("Expected a QueryDiskInfo response, got {other:?}"),
    };

    assert!(info.err.is_ok());
    assert_eq!(info.total_capacity_mb, 2048);
    assert_eq!(info.disk_infos.len(), 1);

    let disk = &info.disk_infos[0];
    assert_eq!(disk.tag, "ssd1");
    assert_eq!(disk.full_dir, "/data/n1/ssd1");
    assert_eq!(disk.holding_primary_replicas[&1].len(), 2);
    assert!(disk.holding_secondary_replicas[&1].contains(&Gpid::new(1, 2)));
}

#[tokio::test]
async fn test_raw_socket_every_protocol() {
    for protocol in PROTOCOLS {
        let server = TestServer::socket(protocol, false).await.unwrap();

        let response = query_disk_info(&socket_config(&server, protocol, false)).await;

        assert_disk_info(response);
        assert_eq!(server.accepted(), 1, "protocol {protocol}");
    }
}

#[tokio::test]
async fn test_framed_socket_every_protocol() {
    for protocol in PROTOCOLS {
        let server = TestServer::socket(protocol, true).await.unwrap();

        let response = query_disk_info(&socket_config(&server, protocol, true)).await;

        assert_disk_info(response);
    }
}

#[tokio::test]
async fn test_http_every_protocol() {
    for protocol in PROTOCOLS {
        let server = TestServer::http(protocol).await.unwrap();
        let config = ConnectionConfig {
            protocol: protocol.to_string(),
            url: Some(format!("http://127.0.0.1:{}/radmin", server.port())),
            http: true,
            ..Default::default()
        };

        assert_disk_info(query_disk_info(&config).await);
    }
}

#[tokio::test]
async fn test_http_sends_custom_headers() {
    let server = TestServer::http(ProtocolKind::Binary).await.unwrap();
    let config = ConnectionConfig {
        url: Some(format!("http://127.0.0.1:{}", server.port())),
        http: true,
        headers: vec![
            "X-Request-Id: abc-123".to_string(),
            "Authorization:Bearer token".to_string(),
        ],
        ..Default::default()
    };

    assert_disk_info(query_disk_info(&config).await);

    let recorded = server.recorded_headers();
    assert_eq!(recorded.len(), 1);
    let headers = &recorded[0];
    assert_eq!(headers["x-request-id"], "abc-123");
    assert_eq!(headers["authorization"], "Bearer token");
    assert_eq!(headers["content-type"], "application/x-thrift");
}

#[tokio::test]
async fn test_host_with_embedded_port() {
    let server = TestServer::socket(ProtocolKind::Binary, false)
        .await
        .unwrap();
    let config = ConnectionConfig {
        host: format!("127.0.0.1:{}", server.port()),
        port: 1,
        ..Default::default()
    };

    assert_disk_info(query_disk_info(&config).await);
}

#[tokio::test]
async fn test_disk_migrate_reports_service_errors() {
    let server = TestServer::socket(ProtocolKind::Compact, true)
        .await
        .unwrap();
    let config = socket_config(&server, ProtocolKind::Compact, true);
    let arg = format!(
        r#"{{"pid":{},"origin_disk":"ssd1","target_disk":"ssd1"}}"#,
        Gpid::new(1, 2).raw()
    );

    let response = RadminClient::offline(&config)
        .unwrap()
        .dynamic(DynamicRequest::new("disk_migrate", [arg]))
        .await
        .unwrap();

    let Response::DiskMigrate(migrate) = response else {
        panic!("Expected a DiskMigrate response");
    };
    assert_eq!(migrate.err, ErrorCode("ERR_INVALID_PARAMETERS".to_string()));
    assert_eq!(
        migrate.hint.as_deref(),
        Some("1.2 origin disk is equal with target disk")
    );
}

#[tokio::test]
async fn test_add_disk_rendered_output() {
    let server = TestServer::socket(ProtocolKind::Json, false).await.unwrap();
    let config = socket_config(&server, ProtocolKind::Json, false);

    let response = RadminClient::offline(&config)
        .unwrap()
        .dynamic(DynamicRequest::new("add_disk", [r#"{"disk_str":"ssd2:/data/ssd2"}"#]))
        .await
        .unwrap();

    let rendered: serde_json::Value = serde_json::from_str(&response.render().unwrap()).unwrap();
    assert_eq!(rendered, serde_json::json!({ "err": "ERR_OK" }));
}

#[tokio::test]
async fn test_online_client_reuses_connection() {
    let server = TestServer::socket(ProtocolKind::Binary, false)
        .await
        .unwrap();
    let config = socket_config(&server, ProtocolKind::Binary, false);

    let offline = RadminClient::offline(&config).unwrap();
    let first = offline
        .prepare(&DynamicRequest::new("query_disk_info", [r#"{"node":"a"}"#]))
        .unwrap();
    let second = offline
        .prepare(&DynamicRequest::new("query_disk_info", [r#"{"node":"b"}"#]))
        .unwrap();

    let mut client = offline.connect().await.unwrap();
    client.call(first).await.unwrap();
    let Response::QueryDiskInfo(info) = client.call(second).await.unwrap() else {
        panic!("Expected a QueryDiskInfo response");
    };
    client.close().await.unwrap();

    assert_eq!(info.disk_infos[0].full_dir, "/data/b/ssd1");
    assert_eq!(server.accepted(), 1);
}

#[tokio::test]
async fn test_calls_run_on_spawned_tasks() {
    for protocol in PROTOCOLS {
        let server = TestServer::socket(protocol, true).await.unwrap();
        let config = socket_config(&server, protocol, true);

        let response = tokio::spawn(async move { query_disk_info(&config).await })
            .await
            .expect("Spawned call panicked");

        assert_disk_info(response);
    }

    let server = TestServer::http(ProtocolKind::Json).await.unwrap();
    let config = ConnectionConfig {
        protocol: ProtocolKind::Json.to_string(),
        url: Some(format!("http://127.0.0.1:{}/", server.port())),
        http: true,
        ..Default::default()
    };
    let handle = tokio::spawn(async move {
        let offline = RadminClient::offline(&config).unwrap();
        let request = offline
            .prepare(&DynamicRequest::new("query_disk_info", [r#"{"node":"n1"}"#]))
            .unwrap();
        let mut client = offline.connect().await.unwrap();
        let response = client.call(request).await.unwrap();
        client.close().await.unwrap();
        response
    });

    assert_disk_info(handle.await.expect("Spawned call panicked"));
}
