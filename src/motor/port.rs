//! Byte-level port underneath the motor link, abstracted for testing

use async_trait::async_trait;
use std::io;

/// Write side of a serial connection.
#[async_trait]
pub trait LinkPort: Send {
    /// Write all data to the port
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;
}

/// [`LinkPort`] over a `tokio_serial::SerialStream`
pub struct SerialLinkPort {
    stream: tokio_serial::SerialStream,
}

impl SerialLinkPort {
    pub fn new(stream: tokio_serial::SerialStream) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl LinkPort for SerialLinkPort {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.stream.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.stream.flush().await
    }
}
