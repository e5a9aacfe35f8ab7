// (c) 2024 Ross Younger
//! # 📖 Configuration management
//!
//! Run-time configuration comes from the following sources, highest priority first:
//! 1. Command-line options
//! 2. Environment variables prefixed `TCPFETCH_` (for example `TCPFETCH_TIMEOUT=30`)
//! 3. A TOML configuration file, if one was given with `--config`
//! 4. Hard-wired defaults
//!
//! Each option may appear in multiple places; the highest priority source wins.
//!
//! ## Configurable options
//!
//! The set of supported fields is the [Configuration] structure.
//! Running with `--debug` logs the final values.
//!
//! ## Example
//!
//! ```toml
//! # Slow satellite link; give the peer longer to respond
//! timeout = 60
//! chunk_size = 4096
//! time_format = "utc"
//! ```

pub(crate) mod structure;
pub use structure::{Configuration, SessionConfig};

mod manager;
pub use manager::{Manager, ENV_PREFIX};
