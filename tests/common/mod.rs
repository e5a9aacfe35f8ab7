//! Helpers shared by the integration tests
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tcpfetch::config::SessionConfig;
use tcpfetch::server::Server;
use tokio_util::sync::CancellationToken;

pub const REPORT_SIZE: usize = 1500;
pub const REPORT_MTIME: u32 = 1_700_000_000;

pub fn report_content() -> Vec<u8> {
    (0..REPORT_SIZE).map(|i| (i % 251) as u8).collect()
}

/// Fills a directory with the files the tests ask for:
/// `report.txt` (1500 bytes, modified at 1700000000), `small.txt`, `empty`, and a subdirectory.
pub fn populate(dir: &Path) {
    let report = dir.join("report.txt");
    std::fs::write(&report, report_content()).unwrap();
    std::fs::File::options()
        .write(true)
        .open(&report)
        .unwrap()
        .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(REPORT_MTIME.into()))
        .unwrap();
    std::fs::write(dir.join("small.txt"), b"hello, world\n").unwrap();
    std::fs::write(dir.join("empty"), b"").unwrap();
    std::fs::create_dir(dir.join("subdir")).unwrap();
}

/// Starts a server on the loopback interface, within the current runtime
pub async fn start_server(root: &Path) -> (SocketAddr, CancellationToken, tokio::task::JoinHandle<()>) {
    let server = Server::bind("127.0.0.1:0".parse().unwrap(), SessionConfig::default(), root)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let cancel = CancellationToken::new();
    let task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { server.serve(cancel).await })
    };
    (addr, cancel, task)
}

/// Starts a server on the loopback interface, on a thread of its own with its own runtime.
///
/// The server runs until the process exits.
pub fn start_server_thread(root: &Path) -> SocketAddr {
    let root: PathBuf = root.to_path_buf();
    let (tx, rx) = std::sync::mpsc::channel();
    let _ = std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let server = Server::bind("127.0.0.1:0".parse().unwrap(), SessionConfig::default(), &root)
                .await
                .unwrap();
            tx.send(server.local_addr().unwrap()).unwrap();
            server.serve(CancellationToken::new()).await;
        });
    });
    rx.recv().unwrap()
}
