use bytes::BytesMut;

/// An in-memory transport holding one message, used to decode command line
/// arguments with a protocol reader.
#[derive(Debug, Default, Clone)]
pub struct MemoryBuffer {
    buf: BytesMut,
}

impl MemoryBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn write_str(&mut self, text: &str) {
        self.buf.extend_from_slice(text.as_bytes());
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

impl From<&str> for MemoryBuffer {
    fn from(text: &str) -> Self {
        let mut buffer = Self::with_capacity(text.len());
        buffer.write_str(text);
        buffer
    }
}
