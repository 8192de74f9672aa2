use crate::error::StreamError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of a single read from the underlying stream
const CHUNK_SIZE: usize = 4096;

/// ExactReader wraps a stream and hands out exactly the number of bytes
/// asked for, keeping whatever else arrived for the next call
pub struct ExactReader<S> {
    stream: S,
    buf: Vec<u8>,
}

/// ExactReader implementation block
impl<S> ExactReader<S> {
    /// new binds a reader to a stream
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: Vec::new(),
        }
    }

    /// get_mut gives access to the stream for writing replies
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// buffered returns bytes received but not yet consumed
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// into_parts releases the stream along with any unconsumed bytes
    pub fn into_parts(self) -> (S, Vec<u8>) {
        (self.stream, self.buf)
    }
}

impl<S: AsyncRead + Unpin> ExactReader<S> {
    /// read_exact waits until n bytes are available and returns them
    pub async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, StreamError> {
        self.fill(n).await?;
        Ok(self.buf.drain(..n).collect())
    }

    /// read_u8 reads a single byte
    pub async fn read_u8(&mut self) -> Result<u8, StreamError> {
        self.fill(1).await?;
        Ok(self.buf.remove(0))
    }

    /// read_u16 reads a big-endian (network order) u16
    pub async fn read_u16(&mut self) -> Result<u16, StreamError> {
        let bytes = self.read_array::<2>().await?;
        Ok(u16::from_be_bytes(bytes))
    }

    /// read_array reads a fixed-size field
    pub async fn read_array<const N: usize>(&mut self) -> Result<[u8; N], StreamError> {
        self.fill(N).await?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[..N]);
        self.buf.drain(..N);
        Ok(out)
    }

    // Only touches the stream while the buffer is short
    async fn fill(&mut self, n: usize) -> Result<(), StreamError> {
        let mut chunk = [0u8; CHUNK_SIZE];
        while self.buf.len() < n {
            let read = self.stream.read(&mut chunk).await?;
            if read == 0 {
                return Err(StreamError::Closed);
            }
            self.buf.extend_from_slice(&chunk[..read]);
        }
        Ok(())
    }
}

impl<S: AsyncWrite + Unpin> ExactReader<S> {
    /// reply writes a protocol reply back on the same stream
    pub async fn reply(&mut self, bytes: &[u8]) -> Result<(), StreamError> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }
}
