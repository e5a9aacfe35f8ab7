//! CLI based tests
mod common;

use std::process::ExitCode;

use common::{populate, report_content, start_server_thread};
use tcpfetch::{client_cli, server_cli};

use rusty_fork::rusty_fork_test;

#[test]
fn bad_option() {
    assert_eq!(
        client_cli(["tcpfetch", "--this-ridiculous-option-does-not-exist"]),
        ExitCode::FAILURE
    );
}

#[test]
fn client_no_files() {
    assert_eq!(client_cli(["tcpfetch", "127.0.0.1", "7000"]), ExitCode::FAILURE);
}

#[test]
fn client_needs_ipv4() {
    assert_eq!(
        client_cli(["tcpfetch", "fetch.example", "7000", "f"]),
        ExitCode::FAILURE
    );
}

#[test]
fn server_needs_port() {
    assert_eq!(server_cli(["tcpfetchd"]), ExitCode::FAILURE);
}

#[test]
fn help() {
    assert_eq!(client_cli(["tcpfetch", "--help"]), ExitCode::SUCCESS);
}

rusty_fork_test! {

#[test]
fn connection_refused() {
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port().to_string()
    };
    let out = tempfile::tempdir().unwrap();
    assert_eq!(
        client_cli([
            "tcpfetch",
            "-o",
            out.path().to_str().unwrap(),
            "127.0.0.1",
            port.as_str(),
            "report.txt"
        ]),
        ExitCode::FAILURE
    );
}

#[test]
fn server_bad_root() {
    assert_eq!(
        server_cli(["tcpfetchd", "-b", "127.0.0.1", "-r", "/no/such/directory", "0"]),
        ExitCode::FAILURE
    );
}

#[test]
fn server_bad_configuration() {
    assert_eq!(
        server_cli(["tcpfetchd", "--chunk-size", "0", "0"]),
        ExitCode::FAILURE
    );
}

#[test]
fn fetch_report() {
    let served = tempfile::tempdir().unwrap();
    populate(served.path());
    let out = tempfile::tempdir().unwrap();
    let port = start_server_thread(served.path()).port().to_string();
    assert_eq!(
        client_cli([
            "tcpfetch",
            "-q",
            "-o",
            out.path().to_str().unwrap(),
            "127.0.0.1",
            port.as_str(),
            "report.txt",
            "small.txt",
        ]),
        ExitCode::SUCCESS
    );
    assert_eq!(std::fs::read(out.path().join("report.txt")).unwrap(), report_content());
    assert!(out.path().join("small.txt").exists());
}

#[test]
fn fetch_missing() {
    let served = tempfile::tempdir().unwrap();
    populate(served.path());
    let out = tempfile::tempdir().unwrap();
    let port = start_server_thread(served.path()).port().to_string();
    assert_eq!(
        client_cli([
            "tcpfetch",
            "-q",
            "-o",
            out.path().to_str().unwrap(),
            "127.0.0.1",
            port.as_str(),
            "missing.txt",
        ]),
        ExitCode::FAILURE
    );
    assert!(!out.path().join("missing.txt").exists());
}

}
