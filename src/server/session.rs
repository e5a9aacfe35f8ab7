//! Server session state machine
// (c) 2024 Ross Younger

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use tokio::fs::File;
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::protocol::wire::{encode_status_err, encode_status_ok, encode_u32_be};
use crate::protocol::{ErrorKind, FileHeader, Request, TransferError};
use crate::transfer::{open_source, send_body};
use crate::transport::{Connection, DeadlineStream, Readiness};

/// The stages of serving one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum SessionState {
    /// Waiting for a request line
    AwaitRequest,
    /// Decoding the request line
    Parsing,
    /// Opening the requested file
    ResolvingFile,
    /// Waiting for the connection to accept the reply
    AwaitWritable,
    /// Sending status, size, content and modification time
    Transmitting,
    /// A file went out in full; go round again
    Looping,
    /// The connection is finished with
    Terminated,
}

/// Why a session ended
#[derive(Debug)]
pub enum SessionEnd {
    /// The client closed the connection while we waited for a request
    PeerClosed,
    /// Something went wrong
    Failed(TransferError),
}

impl std::fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEnd::PeerClosed => write!(f, "client closed the connection"),
            SessionEnd::Failed(e) => write!(f, "{e}"),
        }
    }
}

/// What happened on a connection
#[derive(Debug)]
pub struct SessionReport {
    /// Files sent in full
    pub files_sent: usize,
    /// Why the session ended
    pub end: SessionEnd,
}

impl SessionReport {
    /// Did the session end normally?
    #[must_use]
    pub fn is_clean(&self) -> bool {
        matches!(self.end, SessionEnd::PeerClosed)
    }
}

/// Serves requests on one connection until it ends
#[derive(Debug)]
pub struct Session<C: Connection> {
    stream: DeadlineStream<C>,
    config: SessionConfig,
    root: PathBuf,
    state: SessionState,
    line: Bytes,
    request: Option<Request>,
    source: Option<(File, FileHeader)>,
    files_sent: usize,
}

impl<C: Connection> Session<C> {
    /// Constructor. Requested file names are resolved relative to `root`.
    pub fn new(stream: DeadlineStream<C>, config: SessionConfig, root: &Path) -> Self {
        Self {
            stream,
            config,
            root: root.to_path_buf(),
            state: SessionState::AwaitRequest,
            line: Bytes::new(),
            request: None,
            source: None,
            files_sent: 0,
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs the session to completion
    pub async fn run(mut self) -> SessionReport {
        loop {
            trace!("state {}", self.state);
            let result = match self.state {
                SessionState::AwaitRequest => self.await_request().await,
                SessionState::Parsing => self.parse().await,
                SessionState::ResolvingFile => self.resolve().await,
                SessionState::AwaitWritable => self.await_writable().await,
                SessionState::Transmitting => self.transmit().await,
                SessionState::Looping => Ok(SessionState::AwaitRequest),
                SessionState::Terminated => {
                    return self.report(SessionEnd::PeerClosed);
                }
            };
            match result {
                Ok(next) => self.state = next,
                Err(e) => {
                    self.fail(&e).await;
                    return self.report(SessionEnd::Failed(e));
                }
            }
        }
    }

    fn report(&mut self, end: SessionEnd) -> SessionReport {
        self.state = SessionState::Terminated;
        self.source = None;
        SessionReport {
            files_sent: self.files_sent,
            end,
        }
    }

    /// Sends `-ERR` if the connection can still carry it
    async fn fail(&mut self, e: &TransferError) {
        match e.kind() {
            ErrorKind::Cancelled => debug!("session cancelled"),
            ErrorKind::Io | ErrorKind::Protocol => info!("request failed: {e}"),
            _ => warn!("session failed: {e}"),
        }
        if e.connection_usable() && !self.stream.is_aborted() {
            let _ = self.stream.write_all(encode_status_err()).await;
        }
        self.stream.shutdown().await;
    }

    async fn await_request(&mut self) -> Result<SessionState, TransferError> {
        if self.stream.await_readable().await? == Readiness::TimedOut {
            return Err(TransferError::Timeout(self.stream.deadline()));
        }
        match self.stream.read_line(self.config.line_capacity).await? {
            None => {
                debug!("client closed the connection");
                Ok(SessionState::Terminated)
            }
            Some(line) => {
                if !line.ends_with(b"\n") && line.len() >= self.config.line_capacity {
                    // the rest of the line is still in flight; there is no way to resynchronise
                    return Err(crate::protocol::ProtocolError::NameTooLong {
                        length: line.len(),
                        capacity: self.config.line_capacity,
                    }
                    .into());
                }
                self.line = line;
                Ok(SessionState::Parsing)
            }
        }
    }

    /// A malformed request is refused, but the connection carries on
    async fn parse(&mut self) -> Result<SessionState, TransferError> {
        match Request::decode(&self.line) {
            Ok(request) => {
                debug!("received {request}");
                self.request = Some(request);
                Ok(SessionState::ResolvingFile)
            }
            Err(e) => {
                warn!("{e}: {:?}", String::from_utf8_lossy(&self.line));
                self.stream.write_all(encode_status_err()).await?;
                Ok(SessionState::AwaitRequest)
            }
        }
    }

    async fn resolve(&mut self) -> Result<SessionState, TransferError> {
        let Some(request) = self.request.as_ref() else {
            return Ok(SessionState::AwaitRequest);
        };
        let path = resolve_path(&self.root, &request.file_name)?;
        self.source = Some(open_source(&path).await?);
        Ok(SessionState::AwaitWritable)
    }

    async fn await_writable(&mut self) -> Result<SessionState, TransferError> {
        match self.stream.await_writable().await? {
            Readiness::Ready => Ok(SessionState::Transmitting),
            Readiness::TimedOut => Err(TransferError::Timeout(self.stream.deadline())),
        }
    }

    async fn transmit(&mut self) -> Result<SessionState, TransferError> {
        let Some((mut file, header)) = self.source.take() else {
            return Ok(SessionState::AwaitRequest);
        };
        self.stream.write_all(encode_status_ok()).await?;
        self.stream.write_all(&encode_u32_be(header.size)).await?;
        let _ = send_body(
            &mut self.stream,
            &mut file,
            header.size,
            self.config.chunk_size,
            &mut (),
        )
        .await?;
        self.stream
            .write_all(&encode_u32_be(header.last_modified))
            .await?;
        self.files_sent += 1;
        if let Some(request) = self.request.take() {
            info!("sent {} ({} bytes)", request.file_name, header.size);
        }
        Ok(SessionState::Looping)
    }
}

/// Works out where a requested file lives.
///
/// Names are relative to the serving root; absolute names and names that climb out of
/// the root are refused.
fn resolve_path(root: &Path, file_name: &str) -> Result<PathBuf, TransferError> {
    let name = Path::new(file_name);
    let escapes = name.components().any(|c| {
        matches!(
            c,
            Component::RootDir | Component::Prefix(_) | Component::ParentDir
        )
    });
    if escapes || file_name.is_empty() {
        return Err(TransferError::FileOpen {
            path: name.to_path_buf(),
            source: std::io::ErrorKind::PermissionDenied.into(),
        });
    }
    Ok(root.join(name))
}
