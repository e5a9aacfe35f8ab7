//! Main client mode event loop
// (c) 2024 Ross Younger

use std::net::SocketAddrV4;
use std::path::Path;

use anyhow::Context as _;
use indicatif::MultiProgress;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument as _};

use crate::config::{Configuration, SessionConfig};
use crate::protocol::{ProtocolError, TransferError};
use crate::transport::{Connection, DeadlineStream};

use super::{FileRequest, Parameters, TransferSummary};

/// A batch of requests stopped at its first failure
#[derive(Debug, thiserror::Error)]
#[error("{file_name}: {source}")]
pub struct BatchError {
    /// The file whose request failed
    pub file_name: String,
    /// How many files arrived in full before the failure
    pub completed: usize,
    /// What went wrong
    #[source]
    pub source: TransferError,
}

/// Fetches each file in turn over one connection, stopping at the first failure.
///
/// Each file is written to `output_dir` under the final component of the name it was requested by.
/// `on_done` is called as each file completes.
///
/// Returns the number of files received.
pub async fn fetch_all<C, F>(
    stream: &mut DeadlineStream<C>,
    config: SessionConfig,
    files: &[String],
    output_dir: &Path,
    display: Option<&MultiProgress>,
    mut on_done: F,
) -> Result<usize, BatchError>
where
    C: Connection,
    F: FnMut(&TransferSummary),
{
    for (completed, file_name) in files.iter().enumerate() {
        // only the final component, so a request can never write outside `output_dir`
        let Some(local_name) = Path::new(file_name).file_name() else {
            return Err(BatchError {
                file_name: file_name.clone(),
                completed,
                source: ProtocolError::InvalidName.into(),
            });
        };
        let destination = output_dir.join(local_name);
        let mut request = FileRequest::new(stream, config, file_name, &destination, display);
        match request.run().await {
            Ok(summary) => on_done(&summary),
            Err(source) => {
                return Err(BatchError {
                    file_name: file_name.clone(),
                    completed,
                    source,
                })
            }
        }
    }
    Ok(files.len())
}

/// Prints a line without disturbing any progress bars
fn show(display: &MultiProgress, msg: &str) {
    if display.is_hidden() {
        anstream::println!("{msg}");
    } else {
        let _ = display.println(msg);
    }
}

/// Main client mode event loop
///
/// # Return value
/// `true` if every requested file arrived.
///
// Caution: As we are using ProgressBar, anything to be printed to console should use progress.println() !
pub async fn client_main(
    config: &Configuration,
    display: MultiProgress,
    parameters: &Parameters,
    quiet: bool,
) -> anyhow::Result<bool> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted");
                cancel.cancel();
            }
        })
    };

    let server = SocketAddrV4::new(parameters.address, parameters.port);
    debug!("connecting to {server}");
    let connection = timeout(config.timeout_duration(), TcpStream::connect(server))
        .await
        .with_context(|| format!("timed out connecting to {server}"))?
        .with_context(|| format!("failed to connect to {server}"))?;
    info!("connected to {server}");

    let mut stream = DeadlineStream::new(connection, config.timeout_duration(), cancel.clone());
    let result = fetch_all(
        &mut stream,
        config.session(),
        &parameters.files,
        &parameters.output_dir,
        (!quiet).then_some(&display),
        |summary| {
            if !quiet {
                show(&display, &summary.render(config.time_format));
            }
        },
    )
    .instrument(tracing::info_span!("CLIENT", %server))
    .await;
    watcher.abort();

    match result {
        Ok(count) => {
            stream.shutdown().await;
            info!("{count} file(s) received");
            Ok(true)
        }
        Err(e) => {
            // Dropping the stream closes the connection; partial files stay on disk.
            error!("{e}");
            if e.completed > 0 {
                info!("{} file(s) were received before the failure", e.completed);
            }
            Ok(false)
        }
    }
}
