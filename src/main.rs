//! tcpfetch client - main entrypoint
// (c) 2024 Ross Younger

use std::process::ExitCode;

fn main() -> ExitCode {
    tcpfetch::client_cli(std::env::args_os())
}
