//! Error types shared by both peers
// (c) 2024 Ross Younger

use std::path::PathBuf;
use std::time::Duration;

/// Violations of the wire protocol, detected by either peer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A file name contained a carriage return or line feed, so cannot be sent on a request line
    #[error("file name contains a line terminator")]
    InvalidName,
    /// The encoded request line would not fit in the peer's request buffer
    #[error("request line of {length} bytes exceeds the {capacity} byte request buffer")]
    NameTooLong {
        /// Encoded length of the request line
        length: usize,
        /// Buffer capacity it had to fit in
        capacity: usize,
    },
    /// A request line did not contain a space separating the verb from the file name
    #[error("malformed request line")]
    MalformedRequest,
    /// The bytes where a status token was expected were neither `+OK` nor `-ERR`
    #[error("unexpected status token {0:?}")]
    UnexpectedStatus(Vec<u8>),
    /// The server answered `-ERR`
    #[error("server refused the request")]
    Refused,
    /// A file's size or modification time does not fit in the 32-bit wire fields
    #[error("file cannot be represented on the wire ({0})")]
    FileTooLarge(&'static str),
}

/// Coarse classification of a [`TransferError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ErrorKind {
    /// The peer did not become ready within the deadline
    Timeout,
    /// The peer closed the connection
    ConnectionClosed,
    /// The peer broke the protocol, or refused the request
    Protocol,
    /// A local file could not be opened, read or written
    Io,
    /// The connection failed while sending or receiving
    Transport,
    /// The operation was cancelled locally
    Cancelled,
}

/// Everything that can go wrong while moving a request and its reply across a connection
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Deadline exceeded waiting for readiness
    #[error("timed out after {0:?} waiting for the peer")]
    Timeout(Duration),
    /// Orderly shutdown by the peer where more bytes were expected
    #[error("connection closed by peer")]
    ConnectionClosed,
    /// The peer closed the connection part way through a fixed-size field
    #[error("short read: expected {expected} bytes, received {received}")]
    ShortRead {
        /// Bytes wanted
        expected: usize,
        /// Bytes obtained before the stream ended
        received: usize,
    },
    /// The connection ended part way through a file body
    #[error("connection aborted after {transferred} of {expected} bytes")]
    AbortedConnection {
        /// Body bytes moved before the failure
        transferred: u64,
        /// Declared body size
        expected: u64,
    },
    /// Reading from the connection failed
    #[error("read failed: {0}")]
    ReadFailed(#[source] std::io::Error),
    /// Writing to the connection failed
    #[error("write failed: {0}")]
    WriteFailed(#[source] std::io::Error),
    /// An earlier broken pipe or reset has made the connection unusable
    #[error("connection was reset by peer")]
    Aborted,
    /// The local cancellation token fired
    #[error("cancelled")]
    Cancelled,
    /// Reading the file being sent failed
    #[error("failed to read source file: {0}")]
    SourceRead(#[source] std::io::Error),
    /// Writing the file being received failed
    #[error("failed to write destination file: {0}")]
    DestinationWrite(#[source] std::io::Error),
    /// A local file could not be opened or inspected
    #[error("could not open {}: {source}", path.display())]
    FileOpen {
        /// The file concerned
        path: PathBuf,
        /// Underlying cause
        #[source]
        source: std::io::Error,
    },
    /// Protocol violation
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl TransferError {
    /// Classifies this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::Timeout(_) => ErrorKind::Timeout,
            TransferError::ConnectionClosed => ErrorKind::ConnectionClosed,
            TransferError::Protocol(_) => ErrorKind::Protocol,
            TransferError::SourceRead(_)
            | TransferError::DestinationWrite(_)
            | TransferError::FileOpen { .. } => ErrorKind::Io,
            TransferError::ShortRead { .. }
            | TransferError::AbortedConnection { .. }
            | TransferError::ReadFailed(_)
            | TransferError::WriteFailed(_)
            | TransferError::Aborted => ErrorKind::Transport,
            TransferError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Is the connection still fit to carry an `-ERR` reply after this error?
    #[must_use]
    pub fn connection_usable(&self) -> bool {
        !matches!(
            self,
            TransferError::ConnectionClosed
                | TransferError::Aborted
                | TransferError::Cancelled
                | TransferError::WriteFailed(_)
                | TransferError::AbortedConnection { .. }
                | TransferError::ShortRead { .. }
        )
    }
}
