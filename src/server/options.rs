//! Options specific to the server
// (c) 2024 Ross Younger

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser, Clone)]
/// Server-side options which may be provided on the command line, but are not persistent configuration options.
pub struct Parameters {
    /// Serves files from this directory
    #[arg(short('r'), long, value_name("DIR"), default_value("."))]
    pub root: PathBuf,

    /// Listens on this local address
    #[arg(short('b'), long, value_name("ADDRESS"), default_value("0.0.0.0"))]
    pub bind: Ipv4Addr,

    /// Listens on this port
    #[arg(value_name = "PORT")]
    pub port: u16,
}
