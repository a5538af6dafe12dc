use crate::handler::{FakeReplica, ReplicaHandler, process};
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use bytes::BytesMut;
use radmin_core::protocol::{ProtocolError, ProtocolKind};
use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};
use tracing::{debug, warn};

type RecordedHeaders = Arc<Mutex<Vec<HeaderMap>>>;

/// A replica admin server bound to an ephemeral local port.
///
/// The server task is aborted when the handle is dropped.
pub struct TestServer {
    addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    headers: RecordedHeaders,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Serves [`FakeReplica`] on a raw or framed socket.
    pub async fn socket(protocol: ProtocolKind, framed: bool) -> std::io::Result<Self> {
        Self::socket_with(FakeReplica, protocol, framed).await
    }

    pub async fn socket_with<H: ReplicaHandler>(
        handler: H,
        protocol: ProtocolKind,
        framed: bool,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let accepted = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(handler);

        let task = tokio::spawn({
            let accepted = accepted.clone();
            async move {
                loop {
                    let Ok((stream, peer)) = listener.accept().await else {
                        break;
                    };
                    accepted.fetch_add(1, Ordering::SeqCst);
                    debug!(%peer, framed, %protocol, "accepted connection");

                    let handler = handler.clone();
                    tokio::spawn(async move {
                        let served = if framed {
                            serve_framed(stream, protocol, handler.as_ref()).await
                        } else {
                            serve_stream(stream, protocol, handler.as_ref()).await
                        };
                        if let Err(e) = served {
                            warn!(error = %e, "connection failed");
                        }
                    });
                }
            }
        });

        Ok(Self {
            addr,
            accepted,
            headers: RecordedHeaders::default(),
            task,
        })
    }

    /// Serves [`FakeReplica`] over HTTP on every path.
    pub async fn http(protocol: ProtocolKind) -> std::io::Result<Self> {
        Self::http_with(FakeReplica, protocol).await
    }

    pub async fn http_with<H: ReplicaHandler>(
        handler: H,
        protocol: ProtocolKind,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let headers = RecordedHeaders::default();

        let state = HttpState {
            protocol,
            handler: Arc::new(handler),
            headers: headers.clone(),
        };
        let app = Router::new().fallback(serve_http::<H>).with_state(state);

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                warn!(error = %e, "http server failed");
            }
        });

        Ok(Self {
            addr,
            accepted: Arc::new(AtomicUsize::new(0)),
            headers,
            task,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Number of socket connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Headers of every HTTP request received so far.
    pub fn recorded_headers(&self) -> Vec<HeaderMap> {
        self.headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Raw socket: keep reading until the buffered bytes decode as one call.
async fn serve_stream<H: ReplicaHandler>(
    mut stream: TcpStream,
    protocol: ProtocolKind,
    handler: &H,
) -> std::io::Result<()> {
    let mut buf = BytesMut::new();
    loop {
        if stream.read_buf(&mut buf).await? == 0 {
            return Ok(());
        }
        match process(protocol, handler, &buf) {
            Ok(reply) => {
                stream.write_all(&reply).await?;
                stream.flush().await?;
                buf.clear();
            }
            Err(ProtocolError::UnexpectedEof) => continue,
            Err(e) => return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        }
    }
}

async fn serve_framed<H: ReplicaHandler>(
    mut stream: TcpStream,
    protocol: ProtocolKind,
    handler: &H,
) -> std::io::Result<()> {
    loop {
        let size = match stream.read_u32().await {
            Ok(size) => size as usize,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        };
        let mut frame = vec![0u8; size];
        stream.read_exact(&mut frame).await?;

        let reply = process(protocol, handler, &frame)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let len = u32::try_from(reply.len())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        stream.write_all(&len.to_be_bytes()).await?;
        stream.write_all(&reply).await?;
        stream.flush().await?;
    }
}

struct HttpState<H> {
    protocol: ProtocolKind,
    handler: Arc<H>,
    headers: RecordedHeaders,
}

impl<H> Clone for HttpState<H> {
    fn clone(&self) -> Self {
        Self {
            protocol: self.protocol,
            handler: self.handler.clone(),
            headers: self.headers.clone(),
        }
    }
}

async fn serve_http<H: ReplicaHandler>(
    State(state): State<HttpState<H>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state
        .headers
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(headers);

    if method != Method::POST {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    match process(state.protocol, state.handler.as_ref(), &body) {
        Ok(reply) => (
            [(CONTENT_TYPE, HeaderValue::from_static("application/x-thrift"))],
            reply,
        )
            .into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}
