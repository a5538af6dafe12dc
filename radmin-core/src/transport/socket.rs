//! TCP transports, raw and length-prefixed.
use super::{ConnectionError, MAX_FRAME_SIZE, ReadState, TransportError};
use bytes::{BufMut, BytesMut};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tracing::debug;

/// A plain TCP stream. Message boundaries are left to the protocol.
#[derive(Debug)]
pub struct SocketTransport {
    stream: TcpStream,
}

impl SocketTransport {
    pub async fn connect(host: &str, port: u16) -> Result<Self, ConnectionError> {
        let addr = join_host_port(host, port);
        debug!(%addr, "connecting");

        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|source| ConnectionError::Connect {
                addr: addr.clone(),
                source,
            })?;
        stream
            .set_nodelay(true)
            .map_err(|source| ConnectionError::Connect { addr, source })?;

        Ok(Self { stream })
    }

    pub async fn send(&mut self, message: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(message).await?;
        self.stream.flush().await?;
        Ok(())
    }

    pub async fn read_some(&mut self, buf: &mut BytesMut) -> Result<ReadState, TransportError> {
        if self.stream.read_buf(buf).await? == 0 {
            return Err(TransportError::ConnectionClosed);
        }
        Ok(ReadState::Partial)
    }

    pub async fn close(mut self) -> Result<(), TransportError> {
        self.stream.shutdown().await?;
        Ok(())
    }

    fn stream(&mut self) -> &mut TcpStream {
        &mut self.stream
    }
}

/// Wraps a socket so each message is preceded by its length as a big-endian `u32`.
#[derive(Debug)]
pub struct FramedTransport {
    inner: SocketTransport,
}

impl FramedTransport {
    pub fn new(inner: SocketTransport) -> Self {
        Self { inner }
    }

    pub async fn send(&mut self, message: &[u8]) -> Result<(), TransportError> {
        let len = u32::try_from(message.len()).map_err(|_| TransportError::FrameTooLarge {
            size: message.len(),
        })?;

        let mut frame = BytesMut::with_capacity(4 + message.len());
        frame.put_u32(len);
        frame.put_slice(message);
        self.inner.send(&frame).await
    }

    pub async fn read_frame(&mut self, buf: &mut BytesMut) -> Result<ReadState, TransportError> {
        let stream = self.inner.stream();
        let size = match stream.read_u32().await {
            Ok(size) => size as usize,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(TransportError::ConnectionClosed);
            }
            Err(e) => return Err(e.into()),
        };
        if size > MAX_FRAME_SIZE {
            return Err(TransportError::FrameTooLarge { size });
        }
        debug!(size, "reading frame");

        let start = buf.len();
        buf.resize(start + size, 0);
        match stream.read_exact(&mut buf[start..]).await {
            Ok(_) => Ok(ReadState::Complete),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(TransportError::ConnectionClosed)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn close(self) -> Result<(), TransportError> {
        self.inner.close().await
    }
}

/// Formats `host:port`, bracketing IPv6 literals.
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_join_host_port() {
        assert_eq!(join_host_port("10.0.0.1", 7000), "10.0.0.1:7000");
        assert_eq!(join_host_port("::1", 9090), "[::1]:9090");
    }

    #[tokio::test]
    async fn test_frames_are_length_prefixed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut header = [0u8; 4];
            stream.read_exact(&mut header).await.unwrap();
            let mut body = vec![0u8; u32::from_be_bytes(header) as usize];
            stream.read_exact(&mut body).await.unwrap();

            stream.write_all(&[0, 0, 0, 2, b'o', b'k']).await.unwrap();
            body
        });

        let socket = SocketTransport::connect("127.0.0.1", port).await.unwrap();
        let mut framed = FramedTransport::new(socket);
        framed.send(b"ping").await.unwrap();

        let mut buf = BytesMut::new();
        assert_eq!(framed.read_frame(&mut buf).await.unwrap(), ReadState::Complete);
        assert_eq!(&buf[..], b"ok");
        assert_eq!(server.await.unwrap(), b"ping");
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let size = (MAX_FRAME_SIZE as u32) + 1;
            stream.write_all(&size.to_be_bytes()).await.unwrap();
        });

        let socket = SocketTransport::connect("127.0.0.1", port).await.unwrap();
        let mut framed = FramedTransport::new(socket);

        let mut buf = BytesMut::new();
        assert!(matches!(
            framed.read_frame(&mut buf).await,
            Err(TransportError::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_failure_names_the_address() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = SocketTransport::connect("127.0.0.1", port).await.unwrap_err();
        assert!(err.to_string().contains(&format!("127.0.0.1:{port}")));
    }
}
