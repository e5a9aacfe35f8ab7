//! Options specific to the client
// (c) 2024 Ross Younger

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser, Clone)]
/// Client-side options which may be provided on the command line, but are not persistent configuration options.
pub struct Parameters {
    /// Receives files into this directory
    #[arg(
        short('o'),
        long,
        value_name("DIR"),
        default_value("."),
        help_heading("Output")
    )]
    pub output_dir: PathBuf,

    // JOB SPECIFICATION ====================================================================
    // (POSITIONAL ARGUMENTS!)
    /// Server address (IPv4)
    #[arg(value_name = "ADDRESS")]
    pub address: Ipv4Addr,

    /// Server port
    #[arg(value_name = "PORT")]
    pub port: u16,

    /// Files to fetch, in order
    #[arg(value_name = "FILE", required = true, num_args = 1..)]
    pub files: Vec<String>,
}
