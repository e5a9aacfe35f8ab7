//! Configuration structure
// (c) 2024 Ross Younger

use std::fmt::Display;
use std::time::Duration;

use anyhow::Result;
use human_repr::{HumanCount as _, HumanDuration as _};
use serde::{Deserialize, Serialize};

use crate::{
    cli::styles::{info, RESET},
    protocol::wire::{LINE_TERMINATOR, REQUEST_VERB},
    util::TimeFormat,
};

/// Timeout, in seconds, used when nothing else is configured
pub const DEFAULT_TIMEOUT: u16 = 15;

/// Chunk size used when nothing else is configured
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Request line buffer capacity used when nothing else is configured
pub const DEFAULT_LINE_BUFFER: usize = 128;

/// The shortest request line that names a file: `GET x\r\n`
const MINIMUM_LINE_BUFFER: usize = REQUEST_VERB.len() + 2 + LINE_TERMINATOR.len();

/// The set of configurable options.
///
/// In configuration files and environment variables the field names are snake case
/// (`chunk_size`); on the command line they are kebab case (`--chunk-size`).
///
/// There is no `default()`; the hard-wired defaults are [`Configuration::system_default()`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Configuration {
    /// Deadline for each wait on the peer, in seconds
    pub timeout: u16,
    /// Largest number of file bytes moved per read or write.
    /// Files no larger than this are sent in one piece.
    pub chunk_size: usize,
    /// Capacity of the request line buffer, in bytes.
    ///
    /// The server reads at most this many bytes per request line; the client refuses
    /// to send a request line that would not fit.
    pub line_buffer: usize,
    /// Format of timestamps in log messages and transfer summaries
    pub time_format: TimeFormat,
}

static SYSTEM_DEFAULT_CONFIG: Configuration = Configuration {
    timeout: DEFAULT_TIMEOUT,
    chunk_size: DEFAULT_CHUNK_SIZE,
    line_buffer: DEFAULT_LINE_BUFFER,
    time_format: TimeFormat::Local,
};

impl Configuration {
    /// Returns the system default settings
    #[must_use]
    pub fn system_default() -> &'static Self {
        &SYSTEM_DEFAULT_CONFIG
    }

    /// Accessor for `timeout`, as a Duration
    #[must_use]
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout.into())
    }

    /// Extracts the settings that govern a single connection
    #[must_use]
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            deadline: self.timeout_duration(),
            chunk_size: self.chunk_size,
            line_capacity: self.line_buffer,
        }
    }

    /// Performs additional validation checks on a configuration object
    pub(crate) fn try_validate(&self) -> Result<()> {
        if self.timeout == 0 {
            anyhow::bail!(
                "The {INFO}timeout{RESET} must be at least 1 second",
                INFO = info()
            );
        }
        if self.chunk_size == 0 {
            anyhow::bail!(
                "The {INFO}chunk size{RESET} must be at least 1 byte",
                INFO = info()
            );
        }
        if self.line_buffer < MINIMUM_LINE_BUFFER {
            anyhow::bail!(
                "The {INFO}line buffer ({val}){RESET} is too small; it must be at least {MINIMUM_LINE_BUFFER}",
                val = self.line_buffer,
                INFO = info()
            );
        }
        Ok(())
    }

    /// Performs additional validation checks on the configuration.
    pub fn validate(self) -> Result<Self> {
        self.try_validate()?;
        Ok(self)
    }
}

impl Display for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "timeout      {} ({})",
            self.timeout,
            self.timeout_duration().human_duration()
        )?;
        writeln!(
            f,
            "chunk_size   {} ({})",
            self.chunk_size,
            self.chunk_size.human_count_bytes()
        )?;
        writeln!(f, "line_buffer  {}", self.line_buffer)?;
        write!(f, "time_format  {}", self.time_format)
    }
}

/// Settings that govern a single connection, passed explicitly into each state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Bound on every wait for the peer
    pub deadline: Duration,
    /// Transfer engine chunk capacity
    pub chunk_size: usize,
    /// Request line buffer capacity
    pub line_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Configuration::system_default().session()
    }
}

/// Configuration values given on the command line.
///
/// Anything left as `None` falls through to lower priority sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, clap::Args)]
pub struct PartialConfiguration {
    /// Deadline for each wait on the peer, in seconds [default: 15]
    #[arg(short('t'), long, value_name = "sec", help_heading("Configuration"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u16>,

    /// Largest number of file bytes moved per read or write [default: 1000]
    #[arg(long, value_name = "bytes", help_heading("Configuration"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,

    /// Request line buffer capacity [default: 128]
    #[arg(long, value_name = "bytes", help_heading("Configuration"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_buffer: Option<usize>,

    /// Format of timestamps in log messages and transfer summaries [default: local]
    #[arg(long, value_name = "format", help_heading("Configuration"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_format: Option<TimeFormat>,
}
