//! On-wire encodings: status tokens, request lines and 32-bit fields
// (c) 2024 Ross Younger
//!
//! Everything here is a pure transformation; nothing touches a connection.

use bytes::{Buf as _, BufMut as _, Bytes, BytesMut};

use super::ProtocolError;

/// Terminates request lines and status tokens
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// The only request verb
pub const REQUEST_VERB: &str = "GET";

/// Success token. Note this is one byte shorter than [`ERR_TOKEN`].
pub const OK_TOKEN: &[u8; 5] = b"+OK\r\n";

/// Failure token
pub const ERR_TOKEN: &[u8; 6] = b"-ERR\r\n";

/// Wire size of the `size` and `last_modified` fields
pub const U32_FIELD_LEN: usize = 4;

/// The server's verdict on a request, sent before any file data
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Status {
    /// The file follows
    Ok,
    /// Nothing more follows for this request
    Err,
}

impl Status {
    /// The literal token for this status
    #[must_use]
    pub fn token(self) -> &'static [u8] {
        match self {
            Status::Ok => OK_TOKEN,
            Status::Err => ERR_TOKEN,
        }
    }

    /// Works out how long the status token is from its first byte.
    ///
    /// The two tokens differ in length, so a receiver must know which one is arriving
    /// before it can read an exact byte count.
    #[must_use]
    pub fn token_len(first: u8) -> Option<usize> {
        match first {
            b'+' => Some(OK_TOKEN.len()),
            b'-' => Some(ERR_TOKEN.len()),
            _ => None,
        }
    }

    /// Recognises a complete status token by literal comparison
    pub fn decode(raw: &[u8]) -> Result<Self, ProtocolError> {
        if raw == OK_TOKEN {
            Ok(Status::Ok)
        } else if raw == ERR_TOKEN {
            Ok(Status::Err)
        } else {
            Err(ProtocolError::UnexpectedStatus(raw.to_vec()))
        }
    }
}

/// Encodes the success token
#[must_use]
pub fn encode_status_ok() -> &'static [u8] {
    Status::Ok.token()
}

/// Encodes the failure token
#[must_use]
pub fn encode_status_err() -> &'static [u8] {
    Status::Err.token()
}

/// Equivalent to [`Status::decode`]
pub fn decode_status(raw: &[u8]) -> Result<Status, ProtocolError> {
    Status::decode(raw)
}

/// A request for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The file wanted, exactly as the client named it
    pub file_name: String,
}

impl Request {
    /// Constructor
    pub fn new<S: Into<String>>(file_name: S) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    /// Encodes this request as `GET <name>\r\n`.
    ///
    /// `capacity` is the largest request line the peer will accept.
    pub fn encode(&self, capacity: usize) -> Result<Bytes, ProtocolError> {
        encode_request(&self.file_name, capacity)
    }

    /// Parses a raw request line
    pub fn decode(raw: &[u8]) -> Result<Self, ProtocolError> {
        decode_request_line(raw).map(Self::new)
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{REQUEST_VERB} {}", self.file_name)
    }
}

/// Encodes a request line for the given file name
pub fn encode_request(file_name: &str, capacity: usize) -> Result<Bytes, ProtocolError> {
    if file_name.contains(['\r', '\n']) {
        return Err(ProtocolError::InvalidName);
    }
    let length = REQUEST_VERB.len() + 1 + file_name.len() + LINE_TERMINATOR.len();
    if length > capacity {
        return Err(ProtocolError::NameTooLong { length, capacity });
    }
    let mut buf = BytesMut::with_capacity(length);
    buf.put_slice(REQUEST_VERB.as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(file_name.as_bytes());
    buf.put_slice(LINE_TERMINATOR);
    Ok(buf.freeze())
}

/// Extracts the file name from a request line.
///
/// The name is everything after the first space, up to (not including) the carriage return.
/// The verb itself is not checked.
pub fn decode_request_line(raw: &[u8]) -> Result<String, ProtocolError> {
    let space = raw
        .iter()
        .position(|&b| b == b' ')
        .ok_or(ProtocolError::MalformedRequest)?;
    let rest = &raw[space + 1..];
    let end = rest
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(rest.len());
    std::str::from_utf8(&rest[..end])
        .map(ToOwned::to_owned)
        .map_err(|_| ProtocolError::MalformedRequest)
}

/// Encodes a 32-bit field in network byte order
#[must_use]
pub fn encode_u32_be(value: u32) -> [u8; U32_FIELD_LEN] {
    value.to_be_bytes()
}

/// Decodes a 32-bit field from network byte order.
///
/// Returns `None` unless exactly [`U32_FIELD_LEN`] bytes are given.
#[must_use]
pub fn decode_u32_be(mut raw: &[u8]) -> Option<u32> {
    if raw.len() != U32_FIELD_LEN {
        return None;
    }
    Some(raw.get_u32())
}

/// The two numeric fields that accompany a file.
///
/// On the wire, `size` precedes the body and `last_modified` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Body length in bytes
    pub size: u32,
    /// Modification time, POSIX seconds
    pub last_modified: u32,
}

impl FileHeader {
    /// Builds a header from file metadata, refusing values that do not fit the wire format
    pub fn from_metadata(meta: &std::fs::Metadata) -> Result<Self, ProtocolError> {
        let size = u32::try_from(meta.len()).map_err(|_| ProtocolError::FileTooLarge("size"))?;
        let last_modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map_or(Ok(0), |d| u32::try_from(d.as_secs()))
            .map_err(|_| ProtocolError::FileTooLarge("modification time"))?;
        Ok(Self {
            size,
            last_modified,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn status_tokens() {
        assert_eq!(encode_status_ok(), b"+OK\r\n");
        assert_eq!(encode_status_err(), b"-ERR\r\n");
        assert_eq!(decode_status(encode_status_ok()).unwrap(), Status::Ok);
        assert_eq!(decode_status(encode_status_err()).unwrap(), Status::Err);
    }

    #[test]
    fn status_lengths_differ() {
        assert_eq!(Status::token_len(b'+'), Some(5));
        assert_eq!(Status::token_len(b'-'), Some(6));
        assert_eq!(Status::token_len(b'G'), None);
    }

    #[rstest]
    #[case(b"+OK\r")]
    #[case(b"-ERR\r\n\r\n")]
    #[case(b"+ok\r\n")]
    #[case(b"")]
    fn bad_status(#[case] raw: &[u8]) {
        assert_eq!(
            decode_status(raw).unwrap_err(),
            ProtocolError::UnexpectedStatus(raw.to_vec())
        );
    }

    #[test]
    fn request_encoding() {
        let line = encode_request("report.txt", 128).unwrap();
        assert_eq!(&line[..], b"GET report.txt\r\n");
    }

    #[rstest]
    #[case("report.txt")]
    #[case("dir/with spaces/file.bin")]
    #[case("")]
    #[case("ünïcödé")]
    fn request_round_trip(#[case] name: &str) {
        let line = encode_request(name, 128).unwrap();
        assert_eq!(decode_request_line(&line).unwrap(), name);
        assert_eq!(Request::decode(&line).unwrap(), Request::new(name));
    }

    #[test]
    fn name_with_terminator() {
        assert_eq!(
            encode_request("evil\r\nGET other", 128).unwrap_err(),
            ProtocolError::InvalidName
        );
        assert_eq!(
            encode_request("evil\n", 128).unwrap_err(),
            ProtocolError::InvalidName
        );
    }

    #[test]
    fn name_too_long() {
        let name = "x".repeat(123);
        // 4 + 123 + 2 = 129
        assert_eq!(
            encode_request(&name, 128).unwrap_err(),
            ProtocolError::NameTooLong {
                length: 129,
                capacity: 128
            }
        );
        assert!(encode_request(&name[1..], 128).is_ok());
    }

    #[test]
    fn malformed_request() {
        assert_eq!(
            decode_request_line(b"GETreport.txt\r\n").unwrap_err(),
            ProtocolError::MalformedRequest
        );
        assert_eq!(
            decode_request_line(b"GET \xff\xfe\r\n").unwrap_err(),
            ProtocolError::MalformedRequest
        );
    }

    #[test]
    fn request_without_terminator() {
        assert_eq!(decode_request_line(b"GET a.txt").unwrap(), "a.txt");
        assert_eq!(decode_request_line(b"GET a.txt\n").unwrap(), "a.txt");
    }

    #[test]
    fn u32_fields() {
        assert_eq!(encode_u32_be(1500), [0, 0, 0x05, 0xdc]);
        assert_eq!(decode_u32_be(&[0, 0, 0x05, 0xdc]), Some(1500));
        assert_eq!(
            decode_u32_be(&encode_u32_be(1_700_000_000)),
            Some(1_700_000_000)
        );
        assert_eq!(decode_u32_be(&[1, 2, 3]), None);
    }

    #[test]
    fn header_from_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, [0u8; 1500]).unwrap();
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000))
            .unwrap();
        let header = FileHeader::from_metadata(&file.metadata().unwrap()).unwrap();
        assert_eq!(
            header,
            FileHeader {
                size: 1500,
                last_modified: 1_700_000_000
            }
        );
    }

    #[test]
    fn request_display() {
        assert_eq!(Request::new("a").to_string(), "GET a");
    }
}
