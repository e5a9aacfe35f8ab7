//! Server-side event loop
// (c) 2024 Ross Younger
//!
//! Connections are served strictly one at a time: each is run to completion before the
//! next is accepted.

use std::net::{SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument as _};

use crate::config::{Configuration, SessionConfig};
use crate::transport::DeadlineStream;

mod options;
pub use options::Parameters;

mod session;
pub use session::{Session, SessionEnd, SessionReport, SessionState};

/// A bound listening socket and the settings to serve it with
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    config: SessionConfig,
    root: PathBuf,
}

impl Server {
    /// Binds to the given address. Requested file names are resolved relative to `root`.
    pub async fn bind(address: SocketAddr, config: SessionConfig, root: &Path) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(address)
            .await
            .with_context(|| format!("failed to bind {address}"))?;
        Ok(Self {
            listener,
            config,
            root: root.to_path_buf(),
        })
    }

    /// The address actually bound
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts and serves connections, one at a time, until `cancel` fires
    pub async fn serve(&self, cancel: CancellationToken) {
        loop {
            let accepted = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                a = self.listener.accept() => a,
            };
            let (connection, peer) = match accepted {
                Ok(a) => a,
                Err(e) => {
                    // typically a transient resource shortage; carry on
                    warn!("accept failed: {e}");
                    continue;
                }
            };
            let span = info_span!("SESSION", %peer);
            let report = async {
                info!("connected");
                let stream = DeadlineStream::new(connection, self.config.deadline, cancel.clone());
                Session::new(stream, self.config, &self.root).run().await
            }
            .instrument(span.clone())
            .await;
            let _guard = span.enter();
            if report.is_clean() {
                info!("session ended after {} file(s)", report.files_sent);
            } else {
                info!(
                    "session terminated after {} file(s): {}",
                    report.files_sent, report.end
                );
            }
        }
        debug!("no longer accepting connections");
    }
}

/// Server event loop.
///
/// Returns an error only if the server could not start.
pub async fn server_main(config: &Configuration, parameters: &Parameters) -> anyhow::Result<()> {
    let root = parameters.root.canonicalize().with_context(|| {
        format!("cannot serve from {}", parameters.root.display())
    })?;
    let address = SocketAddrV4::new(parameters.bind, parameters.port);
    let server = Server::bind(address.into(), config.session(), &root).await?;
    info!(
        "serving {} on {}",
        root.display(),
        server.local_addr()?
    );

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupted, shutting down");
                cancel.cancel();
            }
        })
    };
    server.serve(cancel).await;
    watcher.abort();
    Ok(())
}
