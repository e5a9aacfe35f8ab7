// (c) 2024 Ross Younger

//! # 📖 The tcpfetch protocol
//!
//! A single client talks to a single server over one TCP connection.
//! The client requests files one at a time; each request is answered in full before the next is sent.
//!
//! For each file:
//! * C ➡️ S: Request line `GET <file name>\r\n` (ASCII, no length prefix)
//! * S ➡️ C: Status token, one of
//!   * `+OK\r\n` (5 bytes): the file follows
//!   * `-ERR\r\n` (6 bytes): nothing more follows for this request.
//!     The server closes the connection after sending this, unless the request line
//!     itself was malformed, in which case it waits for another.
//! * S ➡️ C: `size`, a 4-byte unsigned integer in network byte order
//! * S ➡️ C: exactly `size` bytes of file content
//! * S ➡️ C: `last_modified`, a 4-byte unsigned integer in network byte order (POSIX seconds)
//!
//! The client may then send another request line on the same connection,
//! or close it. The server treats an orderly close while waiting for a request as the
//! normal end of the session.
//!
//! ## Compatibility notes
//!
//! * The modification time travels _after_ the file content, not in a header.
//!   This ordering is part of the wire contract and is preserved.
//! * Status tokens are fixed literals of different lengths rather than a tagged or
//!   length-prefixed field. A receiver reads the first byte to learn which token
//!   is arriving, then reads the exact remainder (see [`Status::token_len`]).
//! * Both 32-bit fields limit files to 4 GiB and to modification times before 2106.
//!
//! ## Timing
//!
//! Both peers bound every wait for the other side with a deadline (15 seconds by default).
//! A timeout is fatal to the connection; nothing is retried.

mod error;
pub use error::{ErrorKind, ProtocolError, TransferError};

pub mod wire;
pub use wire::{FileHeader, Request, Status};
