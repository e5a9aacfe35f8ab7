// (c) 2024 Ross Younger

//! ## 🕵️ Troubleshooting
//!
//! The `--debug` option reports information that may help you diagnose issues.
//!
//! Both programs also understand the `RUST_LOG` environment variable which might let you probe deeper.
//! Some possible settings for this variable are:
//!
//! * `tcpfetch=trace` outputs tracing-level output from this crate, including every state
//!   transition and chunk boundary
//! * `trace` sets all the Rust components to trace mode, which includes output from tokio.
//!
//! To send a more detailed log to a file than you see on the console, use `--log-file` and
//! set `RUST_LOG_FILE_DETAIL` (same syntax as `RUST_LOG`).
//!
//! ### The client reports `connection refused`
//!
//! * Is `tcpfetchd` running, and listening on the port you asked for?
//! * By default the server listens on every IPv4 interface. If it was started with `--bind 127.0.0.1`
//!   it can only be reached from the same machine.
//!
//! ### The server answered `-ERR`
//!
//! The server refuses a request, without saying why, when:
//!
//! * the file does not exist below its serving root (`--root`), or cannot be opened;
//! * the name refers to a directory;
//! * the name is absolute, or contains a `..` component;
//! * the file is 4GiB or larger, or its modification time does not fit in 32 bits.
//!
//! The server log states the reason in each case.
//!
//! ### Transfers time out
//!
//! Every wait on the peer is bounded by the `timeout` setting (15 seconds unless configured).
//! On a slow or congested link you may need to raise it on both ends, e.g. `--timeout 60`.
//!
//! The server also drops a connection which sends no request within that time.
//!
//! ### Received files are truncated
//!
//! A file that was being received when the connection failed is left on disk as it was
//! at the moment of failure. The client reports the failure and exits with status 1;
//! fetch the file again.
//!
//! ### Long file names are rejected
//!
//! A request line (`GET`, a space, the name and `\r\n`) must fit in the `line_buffer`
//! setting (128 bytes unless configured). The client checks this before sending; the server
//! drops a connection whose request line overflows. Raise `line_buffer` on both ends if you
//! need longer names.
