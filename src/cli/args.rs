// (c) 2024 Ross Younger
//! Command line argument structures

use std::path::PathBuf;

use clap::{Args, Parser};

use super::styles::{ColourMode, CLAP_STYLES};
use crate::config::structure::PartialConfiguration;

/// Options governing console and log output, common to both programs
#[derive(Debug, Clone, Default, Args)]
pub struct OutputOptions {
    /// Enable detailed debug output
    ///
    /// This has the same effect as setting `RUST_LOG=tcpfetch=debug` in the environment.
    /// If present, `RUST_LOG` overrides this option.
    #[arg(short, long, action, help_heading("Debug"), display_order(0))]
    pub debug: bool,

    /// Log to a file
    ///
    /// By default the log receives everything printed to stderr.
    /// To override this behaviour, set the environment variable `RUST_LOG_FILE_DETAIL` (same semantics as `RUST_LOG`).
    #[arg(
        short('l'),
        long,
        action,
        value_name("FILE"),
        help_heading("Output"),
        next_line_help(true),
        display_order(0)
    )]
    pub log_file: Option<String>,

    /// Quiet mode
    ///
    /// Switches off progress display and transfer summaries; reports only errors
    #[arg(short, long, action, conflicts_with("debug"), help_heading("Output"))]
    pub quiet: bool,

    /// Colour mode for console output [default: auto]
    ///
    /// If unset, the `CLICOLOR_FORCE` and `NO_COLOR` environment variables are honoured.
    #[arg(long, alias("colour"), value_name("mode"), help_heading("Output"))]
    pub color: Option<ColourMode>,
}

/// Fetches files from a tcpfetchd server
#[derive(Debug, Parser)]
#[command(
    name = "tcpfetch",
    author,
    version,
    about,
    styles(CLAP_STYLES),
    infer_long_args(true)
)]
pub(crate) struct ClientArgs {
    #[command(flatten)]
    pub(crate) output: OutputOptions,

    /// Reads configuration from this TOML file
    #[arg(long, value_name("FILE"), help_heading("Configuration"))]
    pub(crate) config: Option<PathBuf>,

    #[command(flatten)]
    pub(crate) overrides: PartialConfiguration,

    #[command(flatten)]
    pub(crate) parameters: crate::client::Parameters,
}

/// Serves files to tcpfetch clients
#[derive(Debug, Parser)]
#[command(
    name = "tcpfetchd",
    author,
    version,
    about,
    styles(CLAP_STYLES),
    infer_long_args(true)
)]
pub(crate) struct ServerArgs {
    #[command(flatten)]
    pub(crate) output: OutputOptions,

    /// Reads configuration from this TOML file
    #[arg(long, value_name("FILE"), help_heading("Configuration"))]
    pub(crate) config: Option<PathBuf>,

    #[command(flatten)]
    pub(crate) overrides: PartialConfiguration,

    #[command(flatten)]
    pub(crate) parameters: crate::server::Parameters,
}
