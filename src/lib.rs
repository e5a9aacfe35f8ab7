// (c) 2024 Ross Younger

#![allow(clippy::doc_markdown)]
//! tcpfetch is a small sequential file transfer utility over plain TCP.
//!
//! A server (`tcpfetchd`) exports the files in one directory. A client (`tcpfetch`) connects,
//! asks for files by name one after another, and writes each one it receives into a local directory.
//!
//! ## 📖 Documentation
//!
//! * [About the protocol](protocol)
//! * [Configuration](config)
//! * [Troubleshooting](doc::troubleshooting)
//!
//! ## Overview
//! - 📡 One TCP connection carries any number of requests, strictly one at a time
//! - ⏱️ Every wait on the peer is bounded by a deadline; nothing hangs
//! - 📦 Files are sent in chunks (1000 bytes by default); small files go in one piece
//! - 🕰️ The server reports each file's modification time, which the client displays
//!
//! #### Limitations
//! - IPv4 only.
//! - Files are limited to 4 GiB by the 32-bit size field.
//! - There is no authentication or encryption. Run the server only where you would be happy for
//!   anyone who can reach its port to read everything below its root directory.
//! - A file is never resumed; a failed transfer leaves a partial file behind.
//!
//! ## 🧰 Getting Started
//!
//! On the machine holding the files:
//! ```text
//! tcpfetchd --root /srv/files 7000
//! ```
//! On the machine that wants them:
//! ```text
//! tcpfetch 192.0.2.10 7000 report.txt data.bin
//! ```
//! Each file is written into the current directory (or the directory given with `--output-dir`),
//! and a summary showing its size and modification time is printed.
//!
//! The client stops at the first file that cannot be fetched, and exits with status 1.
//!
//! ## Architecture
//!
//! * [`transport`] wraps a connection so every wait is bounded by a deadline and can be cancelled
//! * [`transfer`] moves a file body in chunks, reporting progress as it goes
//! * [`client`] drives one request at a time through its states ([`client::RequestState`])
//! * [`server`] accepts connections one at a time and runs a [`server::Session`] for each
//!
//! ## Miscellanea
//!
//! #### MSRV policy
//!
//! As this is an application crate, the MSRV is not guaranteed to remain stable.
//! The MSRV may be upgraded from time to time to take advantage of new language features.

pub(crate) mod cli;
pub use cli::styles;
pub use cli::{client_cli, server_cli};

pub mod client;
pub mod config;
pub use config::Configuration;
pub mod protocol;
pub mod server;
pub mod transfer;
pub mod transport;
pub mod util;

pub mod doc;
