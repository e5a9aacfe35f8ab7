//! Chunked transfer engine
// (c) 2024 Ross Younger
//!
//! Moves one file body across a connection. Bodies no larger than the chunk size go in a
//! single exact read or write; larger bodies are moved in chunks of at most the chunk
//! size, with progress reported after each chunk.
//!
//! There is no rollback: a failed receive leaves the partial destination file on disk.

use std::path::Path;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _};
use tracing::trace;

use crate::protocol::{FileHeader, TransferError};
use crate::transport::{Connection, DeadlineStream};

/// Permissions for newly created destination files (subject to the umask)
#[cfg(unix)]
const DESTINATION_MODE: u32 = 0o777;

/// Receives cumulative progress after each chunk of a multi-chunk transfer.
///
/// Single-shot transfers report nothing.
pub trait Progress: Send {
    /// Called after each chunk. `percent` is `floor(transferred * 100 / size)`.
    fn update(&mut self, transferred: u64, percent: u8);
}

/// Discards progress reports
impl Progress for () {
    fn update(&mut self, _: u64, _: u8) {}
}

impl Progress for indicatif::ProgressBar {
    fn update(&mut self, transferred: u64, _: u8) {
        self.set_position(transferred);
    }
}

/// Which path a transfer took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPath {
    /// The whole body moved in one exact read or write
    SingleShot,
    /// The body moved in this many chunks
    Chunked(u64),
}

/// Whole percentage of `size` represented by `transferred`, rounded down
#[must_use]
pub fn percent(transferred: u64, size: u64) -> u8 {
    if size == 0 {
        return 100;
    }
    u8::try_from(transferred.min(size) * 100 / size).unwrap_or(100)
}

/// Per-body transfer state
struct TransferSession {
    size: u64,
    transferred: u64,
    chunks: u64,
    buffer: Vec<u8>,
}

impl TransferSession {
    #[allow(clippy::cast_possible_truncation)] // bounded by chunk_size
    fn new(size: u32, chunk_size: usize) -> Self {
        let size = u64::from(size);
        let capacity = size.min(chunk_size as u64) as usize;
        Self {
            size,
            transferred: 0,
            chunks: 0,
            buffer: vec![0; capacity],
        }
    }

    fn is_single_shot(&self) -> bool {
        self.size <= self.buffer.len() as u64
    }

    /// The slice of the buffer that the next chunk occupies
    #[allow(clippy::cast_possible_truncation)] // bounded by the buffer length
    fn next_chunk(&mut self) -> &mut [u8] {
        let n = (self.size - self.transferred).min(self.buffer.len() as u64) as usize;
        &mut self.buffer[..n]
    }

    fn advance(&mut self, n: usize, progress: &mut dyn Progress) {
        self.transferred += n as u64;
        self.chunks += 1;
        let pct = percent(self.transferred, self.size);
        trace!("chunk {}: {} of {} bytes ({pct}%)", self.chunks, self.transferred, self.size);
        progress.update(self.transferred, pct);
    }

    fn is_complete(&self) -> bool {
        self.transferred >= self.size
    }

    /// Converts a connection failure part way through the body
    fn aborted<C: Connection>(&self, e: TransferError, stream: &DeadlineStream<C>) -> TransferError {
        if stream.is_aborted()
            || matches!(
                e,
                TransferError::ConnectionClosed | TransferError::ShortRead { .. }
            )
        {
            TransferError::AbortedConnection {
                transferred: self.transferred,
                expected: self.size,
            }
        } else {
            e
        }
    }
}

/// Sends `size` bytes from `source` across the connection.
pub async fn send_body<C, R>(
    stream: &mut DeadlineStream<C>,
    source: &mut R,
    size: u32,
    chunk_size: usize,
    progress: &mut dyn Progress,
) -> Result<TransferPath, TransferError>
where
    C: Connection,
    R: AsyncRead + Unpin,
{
    let mut session = TransferSession::new(size, chunk_size);
    if session.is_single_shot() {
        trace!("sending {size} bytes in one piece");
        let buf = session.next_chunk();
        let _ = source
            .read_exact(buf)
            .await
            .map_err(TransferError::SourceRead)?;
        stream.write_all(buf).await?;
        return Ok(TransferPath::SingleShot);
    }

    while !session.is_complete() {
        let buf = session.next_chunk();
        let n = buf.len();
        let _ = source
            .read_exact(buf)
            .await
            .map_err(TransferError::SourceRead)?;
        if let Err(e) = stream.write_all(buf).await {
            return Err(session.aborted(e, stream));
        }
        session.advance(n, progress);
    }
    Ok(TransferPath::Chunked(session.chunks))
}

/// Receives `size` bytes from the connection into `destination`.
pub async fn receive_body<C, W>(
    stream: &mut DeadlineStream<C>,
    destination: &mut W,
    size: u32,
    chunk_size: usize,
    progress: &mut dyn Progress,
) -> Result<TransferPath, TransferError>
where
    C: Connection,
    W: AsyncWrite + Unpin,
{
    let mut session = TransferSession::new(size, chunk_size);
    let path = if session.is_single_shot() {
        trace!("receiving {size} bytes in one piece");
        let buf = session.next_chunk();
        stream.read_exact_into(buf).await?;
        destination
            .write_all(buf)
            .await
            .map_err(TransferError::DestinationWrite)?;
        TransferPath::SingleShot
    } else {
        while !session.is_complete() {
            let buf = session.next_chunk();
            let n = buf.len();
            if let Err(e) = stream.read_exact_into(buf).await {
                return Err(session.aborted(e, stream));
            }
            destination
                .write_all(buf)
                .await
                .map_err(TransferError::DestinationWrite)?;
            session.advance(n, progress);
        }
        TransferPath::Chunked(session.chunks)
    };
    destination
        .flush()
        .await
        .map_err(TransferError::DestinationWrite)?;
    Ok(path)
}

/// Opens a file to be sent and reads its header fields.
///
/// Directories, and files whose size or modification time do not fit the wire format,
/// are refused.
pub async fn open_source(path: &Path) -> Result<(File, FileHeader), TransferError> {
    let open_error = |source| TransferError::FileOpen {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).await.map_err(open_error)?;
    let meta = file.metadata().await.map_err(open_error)?;
    if meta.is_dir() {
        return Err(open_error(std::io::Error::other("is a directory")));
    }
    let header = FileHeader::from_metadata(&meta)?;
    Ok((file, header))
}

/// Creates (or truncates) a file to receive into
pub async fn create_destination(path: &Path) -> Result<File, TransferError> {
    let mut options = OpenOptions::new();
    let _ = options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    let _ = options.mode(DESTINATION_MODE);
    options
        .open(path)
        .await
        .map_err(|source| TransferError::FileOpen {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod test {
    use super::{
        create_destination, open_source, percent, receive_body, send_body, Progress, TransferPath,
    };
    use crate::protocol::{ErrorKind, TransferError};
    use crate::transport::DeadlineStream;
    use crate::util::test_protocol::test_plumbing;

    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt as _;
    use tokio_util::sync::CancellationToken;

    const DEADLINE: Duration = Duration::from_secs(15);

    #[derive(Default)]
    struct Recorder(Vec<(u64, u8)>);
    impl Progress for Recorder {
        fn update(&mut self, transferred: u64, percent: u8) {
            self.0.push((transferred, percent));
        }
    }

    fn content(len: usize) -> Vec<u8> {
        #[allow(clippy::cast_possible_truncation)]
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[rstest]
    #[case(0, TransferPath::SingleShot)]
    #[case(5, TransferPath::SingleShot)]
    #[case(1000, TransferPath::SingleShot)]
    #[case(1001, TransferPath::Chunked(2))]
    #[case(1500, TransferPath::Chunked(2))]
    #[case(3000, TransferPath::Chunked(3))]
    #[tokio::test]
    async fn round_trip(#[case] len: usize, #[case] expected: TransferPath) {
        let data = content(len);
        let size = u32::try_from(len).unwrap();
        let (a, b) = test_plumbing();
        let mut tx = DeadlineStream::new(a, DEADLINE, CancellationToken::new());
        let mut rx = DeadlineStream::new(b, DEADLINE, CancellationToken::new());

        let mut source = &data[..];
        let mut received = Vec::new();
        let mut sent_progress = Recorder::default();
        let mut recv_progress = Recorder::default();
        let (s, r) = tokio::join!(
            send_body(&mut tx, &mut source, size, 1000, &mut sent_progress),
            receive_body(&mut rx, &mut received, size, 1000, &mut recv_progress),
        );
        assert_eq!(s.unwrap(), expected);
        assert_eq!(r.unwrap(), expected);
        assert_eq!(received, data);
        assert_eq!(sent_progress.0, recv_progress.0);
    }

    #[tokio::test]
    async fn chunk_boundaries() {
        let data = content(1500);
        let (a, b) = test_plumbing();
        let mut tx = DeadlineStream::new(a, DEADLINE, CancellationToken::new());
        let mut rx = DeadlineStream::new(b, DEADLINE, CancellationToken::new());
        let mut source = &data[..];
        let mut received = Vec::new();
        let mut progress = Recorder::default();
        #[allow(clippy::let_unit_value)]
        let mut no_progress = ();
        let (s, r) = tokio::join!(
            send_body(&mut tx, &mut source, 1500, 1000, &mut no_progress),
            receive_body(&mut rx, &mut received, 1500, 1000, &mut progress),
        );
        s.unwrap();
        r.unwrap();
        // 1000 then 500; no overshoot
        assert_eq!(progress.0, vec![(1000, 66), (1500, 100)]);
    }

    #[tokio::test]
    async fn closed_mid_body() {
        let (a, mut b) = test_plumbing();
        b.write_all(&content(1200)).await.unwrap();
        drop(b);
        let mut rx = DeadlineStream::new(a, DEADLINE, CancellationToken::new());
        let mut received = Vec::new();
        let e = receive_body(&mut rx, &mut received, 1500, 1000, &mut ())
            .await
            .unwrap_err();
        assert!(matches!(
            e,
            TransferError::AbortedConnection {
                transferred: 1000,
                expected: 1500
            }
        ));
        // no rollback
        assert_eq!(received.len(), 1000);
    }

    #[tokio::test]
    async fn peer_gone_while_sending() {
        let (a, b) = test_plumbing();
        drop(b);
        let data = content(3000);
        let mut tx = DeadlineStream::new(a, DEADLINE, CancellationToken::new());
        let mut source = &data[..];
        let e = send_body(&mut tx, &mut source, 3000, 1000, &mut ())
            .await
            .unwrap_err();
        assert!(matches!(e, TransferError::AbortedConnection { .. }));
        assert!(!e.connection_usable());
    }

    #[tokio::test]
    async fn source_shorter_than_declared() {
        let (a, _b) = test_plumbing();
        let data = content(10);
        let mut tx = DeadlineStream::new(a, DEADLINE, CancellationToken::new());
        let mut source = &data[..];
        let e = send_body(&mut tx, &mut source, 20, 1000, &mut ())
            .await
            .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Io);
    }

    #[tokio::test]
    async fn cancelled_between_chunks() {
        let (a, _b) = test_plumbing();
        let token = CancellationToken::new();
        token.cancel();
        let mut rx = DeadlineStream::new(a, DEADLINE, token);
        let e = receive_body(&mut rx, &mut Vec::new(), 5000, 1000, &mut ())
            .await
            .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Cancelled);
    }

    #[rstest]
    #[case(0, 1500, 0)]
    #[case(1000, 1500, 66)]
    #[case(1500, 1500, 100)]
    #[case(1, 3, 33)]
    #[case(0, 0, 100)]
    fn percentages(#[case] transferred: u64, #[case] size: u64, #[case] expected: u8) {
        assert_eq!(percent(transferred, size), expected);
    }

    #[tokio::test]
    async fn source_and_destination_files() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("report.txt");
        std::fs::write(&src, content(1500)).unwrap();
        let (_file, header) = open_source(&src).await.unwrap();
        assert_eq!(header.size, 1500);

        let e = open_source(&dir.path().join("missing.txt")).await.unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Io);
        let e = open_source(dir.path()).await.unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Io);

        // truncates an existing file
        let dest = dir.path().join("out.bin");
        std::fs::write(&dest, b"stale contents").unwrap();
        let mut f = create_destination(&dest).await.unwrap();
        f.write_all(b"new").await.unwrap();
        f.flush().await.unwrap();
        drop(f);
        assert_eq!(std::fs::read(&dest).unwrap(), b"new");
    }
}
