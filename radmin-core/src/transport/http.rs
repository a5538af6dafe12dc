//! HTTP transport: every message is the body of one `POST`.
use super::{ConnectionError, ReadState, TransportError};
use ::http::{
    HeaderMap, HeaderValue, StatusCode,
    header::{ACCEPT, CONTENT_TYPE},
};
use bytes::{Bytes, BytesMut};
use tracing::debug;
use url::Url;

const THRIFT_CONTENT_TYPE: &str = "application/x-thrift";

#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: Url,
    reply: Option<Bytes>,
}

impl HttpTransport {
    /// Builds the client. Configured headers are attached to every request.
    pub fn open(url: Url, mut headers: HeaderMap) -> Result<Self, ConnectionError> {
        let thrift = HeaderValue::from_static(THRIFT_CONTENT_TYPE);
        headers.insert(CONTENT_TYPE, thrift.clone());
        headers.insert(ACCEPT, thrift);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|source| ConnectionError::HttpClient {
                url: url.to_string(),
                source,
            })?;

        Ok(Self {
            client,
            url,
            reply: None,
        })
    }

    pub async fn send(&mut self, message: &[u8]) -> Result<(), TransportError> {
        debug!(url = %self.url, len = message.len(), "posting message");

        let response = self
            .client
            .post(self.url.clone())
            .body(message.to_vec())
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TransportError::HttpStatus(status));
        }

        self.reply = Some(response.bytes().await?);
        Ok(())
    }

    pub fn take_reply(&mut self, buf: &mut BytesMut) -> Result<ReadState, TransportError> {
        let reply = self.reply.take().ok_or(TransportError::NoPendingReply)?;
        buf.extend_from_slice(&reply);
        Ok(ReadState::Complete)
    }

    pub fn close(self) {
        debug!(url = %self.url, "closing http transport");
    }
}
