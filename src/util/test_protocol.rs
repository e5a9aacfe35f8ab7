//! Test helpers for functions dealing with on-wire protocols
// (c) 2024 Ross Younger

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{duplex, AsyncRead, AsyncWrite, DuplexStream, ReadBuf};

use crate::transport::Connection;

impl Connection for DuplexStream {
    fn writable(&self) -> impl Future<Output = std::io::Result<()>> + Send {
        // an in-memory pipe has no send buffer to wait on
        std::future::ready(Ok(()))
    }
}

const STREAM_BUFFER_SIZE: usize = 4_096;

/// A connected pair of in-memory streams.
/// Whatever is written to one end is read from the other.
pub(crate) fn test_plumbing() -> (DuplexStream, DuplexStream) {
    duplex(STREAM_BUFFER_SIZE)
}

/// A connection whose every read fails with a plain I/O error.
/// Writes still reach the other end of the pipe.
#[derive(Debug)]
pub(crate) struct UnreadableConnection(pub(crate) DuplexStream);

impl AsyncRead for UnreadableConnection {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "EIO")))
    }
}

impl AsyncWrite for UnreadableConnection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().0).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().0).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().0).poll_shutdown(cx)
    }
}

impl Connection for UnreadableConnection {
    fn writable(&self) -> impl Future<Output = std::io::Result<()>> + Send {
        std::future::ready(Ok(()))
    }
}
