//! Command Line Interface for tcpfetch and tcpfetchd
// (c) 2024 Ross Younger
mod args;
pub use args::OutputOptions;
mod cli_main;
pub use cli_main::{client_cli, server_cli};
pub mod styles;
