use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::error::{Error, Result};

/// A connected plain-TCP socket to a MonetDB `mserver5`/`merovingian`
/// process. Split into a [`SocketReader`]/[`SocketWriter`] pair so the Send
/// Pipeline's background writer task (`spec.md` §4.10) can own the write
/// half while the caller's task keeps reading from the read half.
pub struct Socket {
    stream: TcpStream,
}

impl Socket {
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    pub fn set_tcp_nodelay(&self, on: bool) -> Result<()> {
        self.stream.set_nodelay(on)?;
        Ok(())
    }

    pub(crate) fn into_split(self) -> (SocketReader, SocketWriter) {
        let (read_half, write_half) = self.stream.into_split();
        (
            SocketReader {
                half: read_half,
                read_timeout: None,
            },
            SocketWriter { half: write_half },
        )
    }
}

pub(crate) struct SocketReader {
    half: OwnedReadHalf,
    read_timeout: Option<Duration>,
}

impl SocketReader {
    /// `0` means no timeout, matching `spec.md` §6's `so_timeout_ms`
    /// default.
    pub(crate) fn set_read_timeout(&mut self, millis: u64) {
        self.read_timeout = if millis == 0 {
            None
        } else {
            Some(Duration::from_millis(millis))
        };
    }

    /// Reads exactly `buf.len()` bytes, translating a timer expiry into
    /// [`Error::Timeout`] and an early EOF into an `Error::Io` carrying the
    /// "connection lost" wording `spec.md` §4.1 calls for.
    pub(crate) async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let read = self.half.read_exact(buf);
        let result = match self.read_timeout {
            Some(d) => tokio::time::timeout(d, read)
                .await
                .map_err(|_| Error::Timeout)?,
            None => read.await,
        };
        result.map(|_| ()).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection lost: peer closed before a full block header/payload arrived",
                ))
            } else {
                Error::Io(e)
            }
        })
    }
}

pub(crate) struct SocketWriter {
    half: OwnedWriteHalf,
}

impl SocketWriter {
    pub(crate) async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.half.write_all(buf).await?;
        Ok(())
    }

    pub(crate) async fn flush(&mut self) -> Result<()> {
        self.half.flush().await?;
        Ok(())
    }
}
