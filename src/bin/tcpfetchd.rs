//! tcpfetchd server - main entrypoint
// (c) 2024 Ross Younger

use std::process::ExitCode;

fn main() -> ExitCode {
    tcpfetch::server_cli(std::env::args_os())
}
