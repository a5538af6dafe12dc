//! # Transports
//!
//! Byte channels that carry serialized messages to the replica admin service.
//!
//! A [`TransportTarget`] (produced by [`resolver`]) is turned into exactly one
//! [`Connection`] by [`Connection::open`]. The connection is owned by a single call
//! path: the request is sent once, the reply is read, and the connection is closed.
//!
//! ## Message boundaries
//!
//! Framed sockets and HTTP deliver whole messages. A raw socket does not, so
//! [`Connection::read_reply`] reports whether the buffer holds a complete message
//! ([`ReadState::Complete`]) or just the bytes received so far ([`ReadState::Partial`]),
//! in which case the caller keeps decoding until the reply parses.
pub mod http;
pub mod memory;
pub mod resolver;
pub mod socket;

pub use memory::MemoryBuffer;
pub use resolver::{ConfigError, ConnectionConfig, Endpoint, TransportTarget};

use self::{
    http::HttpTransport,
    socket::{FramedTransport, SocketTransport},
};
use bytes::BytesMut;

/// Largest frame accepted from a framed socket.
pub const MAX_FRAME_SIZE: usize = 16_384_000;

/// Errors that prevent a transport from being opened.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Error opening socket to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to create an HTTP client for '{url}': {source}")]
    HttpClient {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors raised by an open transport while a call is in flight.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection closed before a complete reply was received")]
    ConnectionClosed,
    #[error("Frame of {size} bytes exceeds the maximum frame size of {MAX_FRAME_SIZE} bytes")]
    FrameTooLarge { size: usize },
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP server responded with status {0}")]
    HttpStatus(::http::StatusCode),
    #[error("No reply is pending: nothing was sent")]
    NoPendingReply,
}

/// What a call to [`Connection::read_reply`] left in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    /// The buffer holds one whole message.
    Complete,
    /// More bytes were appended but the message may continue.
    Partial,
}

/// One opened transport.
#[derive(Debug)]
pub enum Connection {
    Socket(SocketTransport),
    Framed(FramedTransport),
    Http(HttpTransport),
}

impl Connection {
    pub async fn open(target: &TransportTarget) -> Result<Self, ConnectionError> {
        match target {
            TransportTarget::Socket {
                host,
                port,
                framed: false,
            } => Ok(Connection::Socket(SocketTransport::connect(host, *port).await?)),
            TransportTarget::Socket {
                host,
                port,
                framed: true,
            } => {
                let socket = SocketTransport::connect(host, *port).await?;
                Ok(Connection::Framed(FramedTransport::new(socket)))
            }
            TransportTarget::Http { url, headers } => Ok(Connection::Http(HttpTransport::open(
                url.clone(),
                headers.clone(),
            )?)),
        }
    }

    /// Writes one complete message.
    pub async fn send(&mut self, message: &[u8]) -> Result<(), TransportError> {
        match self {
            Connection::Socket(socket) => socket.send(message).await,
            Connection::Framed(framed) => framed.send(message).await,
            Connection::Http(http) => http.send(message).await,
        }
    }

    /// Appends reply bytes to `buf`.
    pub async fn read_reply(&mut self, buf: &mut BytesMut) -> Result<ReadState, TransportError> {
        match self {
            Connection::Socket(socket) => socket.read_some(buf).await,
            Connection::Framed(framed) => framed.read_frame(buf).await,
            Connection::Http(http) => http.take_reply(buf),
        }
    }

    pub async fn close(self) -> Result<(), TransportError> {
        match self {
            Connection::Socket(socket) => socket.close().await,
            Connection::Framed(framed) => framed.close().await,
            Connection::Http(http) => {
                http.close();
                Ok(())
            }
        }
    }
}
