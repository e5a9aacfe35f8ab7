//! Client request state machine
// (c) 2024 Ross Younger

use std::path::{Path, PathBuf};

use bytes::{BufMut as _, Bytes, BytesMut};
use indicatif::MultiProgress;
use tokio::fs::File;
use tokio::time::Instant;
use tracing::{debug, trace, trace_span, warn, Instrument as _};

use crate::config::SessionConfig;
use crate::protocol::wire::{decode_u32_be, U32_FIELD_LEN};
use crate::protocol::{ProtocolError, Request, Status, TransferError};
use crate::transfer::{create_destination, receive_body, Progress, TransferPath};
use crate::transport::{Connection, DeadlineStream, Readiness};

use super::progress::progress_bar_for;
use super::summary::TransferSummary;

/// The stages of a single GET, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum RequestState {
    /// Nothing sent yet
    Idle,
    /// Waiting for the connection to accept the request line
    AwaitWritable,
    /// Sending the request line
    Sending,
    /// Waiting for the server to reply
    AwaitReadable,
    /// Reading the status token
    ReceivingStatus,
    /// Reading the size field
    ReceivingHeader,
    /// Reading the file content
    ReceivingBody,
    /// Reading the modification time field
    ReceivingTrailer,
    /// The file arrived in full
    Done,
    /// Something went wrong; the connection must be abandoned
    Failed,
}

/// Drives one GET request across a connection
pub struct FileRequest<'a, C: Connection> {
    stream: &'a mut DeadlineStream<C>,
    config: SessionConfig,
    request: Request,
    destination: PathBuf,
    display: Option<&'a MultiProgress>,
    state: RequestState,
    file: Option<File>,
    size: u32,
    path: TransferPath,
}

impl<C: Connection> std::fmt::Debug for FileRequest<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRequest")
            .field("request", &self.request)
            .field("destination", &self.destination)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<'a, C: Connection> FileRequest<'a, C> {
    /// Constructor.
    ///
    /// If `display` is given, multi-chunk transfers show a progress bar on it.
    pub fn new(
        stream: &'a mut DeadlineStream<C>,
        config: SessionConfig,
        file_name: &str,
        destination: &Path,
        display: Option<&'a MultiProgress>,
    ) -> Self {
        Self {
            stream,
            config,
            request: Request::new(file_name),
            destination: destination.to_path_buf(),
            display,
            state: RequestState::Idle,
            file: None,
            size: 0,
            path: TransferPath::SingleShot,
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Runs the request to completion.
    ///
    /// On failure the request is left in [`RequestState::Failed`]; the caller must
    /// abandon the connection.
    pub async fn run(&mut self) -> Result<TransferSummary, TransferError> {
        let span = trace_span!("GET", file = %self.request.file_name);
        let start = Instant::now();
        loop {
            let result = self.step().instrument(span.clone()).await;
            match result {
                Ok(Some(last_modified)) => {
                    self.state = RequestState::Done;
                    return Ok(TransferSummary {
                        file_name: self.request.file_name.clone(),
                        destination: self.destination.clone(),
                        size: self.size,
                        last_modified,
                        path: self.path,
                        elapsed: start.elapsed(),
                    });
                }
                Ok(None) => (),
                Err(e) => {
                    let _guard = span.enter();
                    warn!("request failed in state {}: {e}", self.state);
                    self.state = RequestState::Failed;
                    return Err(e);
                }
            }
        }
    }

    /// Performs the work of the current state and moves to the next.
    /// Returns the modification time once the trailer has arrived.
    async fn step(&mut self) -> Result<Option<u32>, TransferError> {
        trace!("state {}", self.state);
        let next = match self.state {
            RequestState::Idle => RequestState::AwaitWritable,
            RequestState::AwaitWritable => {
                let readiness = self.stream.await_writable().await?;
                self.ready(readiness)?;
                RequestState::Sending
            }
            RequestState::Sending => {
                let line = self.request.encode(self.config.line_capacity)?;
                debug!("sending {}", self.request);
                self.stream.write_all(&line).await?;
                RequestState::AwaitReadable
            }
            RequestState::AwaitReadable => {
                let readiness = self.stream.await_readable().await?;
                self.ready(readiness)?;
                RequestState::ReceivingStatus
            }
            RequestState::ReceivingStatus => {
                match receive_status(self.stream).await? {
                    Status::Ok => (),
                    Status::Err => return Err(ProtocolError::Refused.into()),
                }
                debug!("server accepted request");
                self.file = Some(create_destination(&self.destination).await?);
                RequestState::ReceivingHeader
            }
            RequestState::ReceivingHeader => {
                self.size = self.receive_u32().await?;
                debug!("file size {}", self.size);
                RequestState::ReceivingBody
            }
            RequestState::ReceivingBody => {
                self.receive_body().await?;
                RequestState::ReceivingTrailer
            }
            RequestState::ReceivingTrailer => {
                let last_modified = self.receive_u32().await?;
                debug!("last modified {last_modified}");
                return Ok(Some(last_modified));
            }
            RequestState::Done | RequestState::Failed => {
                // a finished request cannot be restarted
                return Err(TransferError::Aborted);
            }
        };
        self.state = next;
        Ok(None)
    }

    fn ready(&self, readiness: Readiness) -> Result<(), TransferError> {
        match readiness {
            Readiness::Ready => Ok(()),
            Readiness::TimedOut => Err(TransferError::Timeout(self.stream.deadline())),
        }
    }

    async fn receive_u32(&mut self) -> Result<u32, TransferError> {
        let raw = self.stream.read_exact(U32_FIELD_LEN).await?;
        decode_u32_be(&raw).ok_or(TransferError::ShortRead {
            expected: U32_FIELD_LEN,
            received: raw.len(),
        })
    }

    async fn receive_body(&mut self) -> Result<(), TransferError> {
        let Some(file) = self.file.as_mut() else {
            return Err(TransferError::Aborted);
        };
        let chunked = u64::from(self.size) > self.config.chunk_size as u64;
        let mut bar = match self.display {
            Some(display) if chunked => Some(progress_bar_for(
                display,
                &self.request.file_name,
                self.size.into(),
            )),
            _ => None,
        };
        let mut no_progress = ();
        let progress: &mut dyn Progress = match bar.as_mut() {
            Some(b) => b,
            None => &mut no_progress,
        };
        let result = receive_body(
            self.stream,
            file,
            self.size,
            self.config.chunk_size,
            progress,
        )
        .await;
        if let Some(b) = bar {
            b.finish_and_clear();
        }
        self.path = result?;
        Ok(())
    }
}

/// Reads a status token, whichever one it is.
///
/// The tokens differ in length, so the first byte decides how many more to read.
pub(crate) async fn receive_status<C: Connection>(
    stream: &mut DeadlineStream<C>,
) -> Result<Status, TransferError> {
    let first = stream.read_exact(1).await?;
    let Some(len) = Status::token_len(first[0]) else {
        return Err(ProtocolError::UnexpectedStatus(first.to_vec()).into());
    };
    let rest = stream.read_exact(len - 1).await?;
    let mut token = BytesMut::with_capacity(len);
    token.put(first);
    token.put(rest);
    let token: Bytes = token.freeze();
    Ok(Status::decode(&token)?)
}
