//! Deadline-bounded I/O over a connection
// (c) 2024 Ross Younger
//!
//! Every wait for the peer is bounded by a single configurable deadline, which restarts
//! for each logical wait (not for each byte). Expiry is reported, never retried;
//! callers treat it as fatal to the connection.
//!
//! All waits also observe a [`CancellationToken`], so a cancelled session unwinds at its
//! next suspension point.

use std::future::Future;
use std::io::{self, ErrorKind as IoErrorKind};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{
    AsyncBufReadExt as _, AsyncRead, AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _, BufReader,
};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::protocol::TransferError;

/// Deadline applied when nothing else is configured
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(15);

/// An open, ordered, reliable byte stream to the peer.
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send {
    /// Resolves once the connection can accept outbound data
    fn writable(&self) -> impl Future<Output = io::Result<()>> + Send;
}

impl Connection for TcpStream {
    fn writable(&self) -> impl Future<Output = io::Result<()>> + Send {
        TcpStream::writable(self)
    }
}

/// Outcome of a readiness wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The connection is ready (for reading, this includes the peer having closed it)
    Ready,
    /// The deadline passed first
    TimedOut,
}

/// Runs an I/O future under a deadline while observing cancellation.
///
/// `Ok(None)` means the deadline passed.
async fn guarded<T, F>(
    cancel: &CancellationToken,
    deadline: Duration,
    fut: F,
) -> Result<Option<io::Result<T>>, TransferError>
where
    F: Future<Output = io::Result<T>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(TransferError::Cancelled),
        r = timeout(deadline, fut) => Ok(r.ok()),
    }
}

/// Was this failure the peer tearing down the connection?
fn is_reset(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        IoErrorKind::BrokenPipe | IoErrorKind::ConnectionReset | IoErrorKind::ConnectionAborted
    )
}

/// A [`Connection`] wrapped with a deadline, a cancellation token and an abort flag.
///
/// Reads go through a small read-ahead buffer so that readable-readiness can be observed
/// without consuming protocol bytes.
///
/// Once the peer has reset the connection (broken pipe and friends), the stream is marked
/// aborted and every subsequent operation fails fast with [`TransferError::Aborted`].
#[derive(Debug)]
pub struct DeadlineStream<C: Connection> {
    inner: BufReader<C>,
    deadline: Duration,
    cancel: CancellationToken,
    aborted: bool,
}

impl<C: Connection> DeadlineStream<C> {
    /// Constructor
    pub fn new(connection: C, deadline: Duration, cancel: CancellationToken) -> Self {
        Self {
            inner: BufReader::new(connection),
            deadline,
            cancel,
            aborted: false,
        }
    }

    /// The deadline applied to each wait
    #[must_use]
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Has the peer reset the connection?
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Access to the underlying connection
    pub fn get_ref(&self) -> &C {
        self.inner.get_ref()
    }

    /// Checked before every I/O step
    fn check(&self) -> Result<(), TransferError> {
        if self.aborted {
            return Err(TransferError::Aborted);
        }
        if self.cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        Ok(())
    }

    fn note_reset(&mut self, e: &io::Error) {
        if is_reset(e) && !self.aborted {
            warn!("connection reset by peer: {e}");
            self.aborted = true;
        }
    }

    fn read_failed(&mut self, e: io::Error) -> TransferError {
        self.note_reset(&e);
        if self.aborted {
            TransferError::Aborted
        } else {
            TransferError::ReadFailed(e)
        }
    }

    fn write_failed(&mut self, e: io::Error) -> TransferError {
        self.note_reset(&e);
        TransferError::WriteFailed(e)
    }

    /// Waits until there is something to read, or the peer has closed the connection.
    pub async fn await_readable(&mut self) -> Result<Readiness, TransferError> {
        self.check()?;
        if !self.inner.buffer().is_empty() {
            return Ok(Readiness::Ready);
        }
        let result = guarded(&self.cancel, self.deadline, self.inner.fill_buf())
            .await?
            .map(|r| r.map(<[u8]>::is_empty));
        match result {
            None => {
                trace!("timed out awaiting readable");
                Ok(Readiness::TimedOut)
            }
            Some(Ok(_closed)) => Ok(Readiness::Ready),
            Some(Err(e)) => Err(self.read_failed(e)),
        }
    }

    /// Waits until the connection will accept outbound data
    pub async fn await_writable(&mut self) -> Result<Readiness, TransferError> {
        self.check()?;
        match guarded(&self.cancel, self.deadline, self.inner.get_ref().writable()).await? {
            None => {
                trace!("timed out awaiting writable");
                Ok(Readiness::TimedOut)
            }
            Some(Ok(())) => Ok(Readiness::Ready),
            Some(Err(e)) => Err(self.write_failed(e)),
        }
    }

    /// Fills `buf` completely from the connection.
    ///
    /// A stream that ends before the first byte is [`TransferError::ConnectionClosed`];
    /// one that ends part way is [`TransferError::ShortRead`].
    /// The deadline restarts whenever bytes arrive.
    pub async fn read_exact_into(&mut self, buf: &mut [u8]) -> Result<(), TransferError> {
        self.check()?;
        let mut filled = 0;
        while filled < buf.len() {
            match guarded(&self.cancel, self.deadline, self.inner.read(&mut buf[filled..])).await? {
                None => return Err(TransferError::Timeout(self.deadline)),
                Some(Ok(0)) if filled == 0 => return Err(TransferError::ConnectionClosed),
                Some(Ok(0)) => {
                    return Err(TransferError::ShortRead {
                        expected: buf.len(),
                        received: filled,
                    })
                }
                Some(Ok(n)) => filled += n,
                Some(Err(e)) => return Err(self.read_failed(e)),
            }
        }
        Ok(())
    }

    /// Reads exactly `n` bytes. See [`read_exact_into`](Self::read_exact_into).
    pub async fn read_exact(&mut self, n: usize) -> Result<Bytes, TransferError> {
        let mut buf = BytesMut::zeroed(n);
        self.read_exact_into(&mut buf).await?;
        Ok(buf.freeze())
    }

    /// Reads one line of at most `capacity` bytes, including its terminating line feed.
    ///
    /// Returns `Ok(None)` if the peer closed the connection before sending anything.
    /// If the line feed does not arrive within `capacity` bytes, or the stream ends first,
    /// whatever arrived is returned.
    pub async fn read_line(&mut self, capacity: usize) -> Result<Option<Bytes>, TransferError> {
        self.check()?;
        let mut line = Vec::with_capacity(capacity);
        let result = {
            let mut limited = (&mut self.inner).take(capacity as u64);
            guarded(
                &self.cancel,
                self.deadline,
                limited.read_until(b'\n', &mut line),
            )
            .await?
        };
        match result {
            None => Err(TransferError::Timeout(self.deadline)),
            Some(Ok(0)) => Ok(None),
            Some(Ok(_)) => Ok(Some(line.into())),
            Some(Err(e)) => Err(self.read_failed(e)),
        }
    }

    /// Writes all of `bytes`, then flushes
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransferError> {
        self.check()?;
        let mut written = 0;
        while written < bytes.len() {
            match guarded(
                &self.cancel,
                self.deadline,
                self.inner.get_mut().write(&bytes[written..]),
            )
            .await?
            {
                None => return Err(TransferError::Timeout(self.deadline)),
                Some(Ok(0)) => {
                    return Err(self.write_failed(IoErrorKind::WriteZero.into()));
                }
                Some(Ok(n)) => written += n,
                Some(Err(e)) => return Err(self.write_failed(e)),
            }
        }
        match guarded(&self.cancel, self.deadline, self.inner.get_mut().flush()).await? {
            None => Err(TransferError::Timeout(self.deadline)),
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => Err(self.write_failed(e)),
        }
    }

    /// Signals end of output to the peer, as far as possible.
    ///
    /// Errors are ignored; this is only ever used when the connection is being abandoned.
    pub async fn shutdown(&mut self) {
        if self.aborted {
            return;
        }
        let _ = guarded(&self.cancel, self.deadline, self.inner.get_mut().shutdown()).await;
    }
}
