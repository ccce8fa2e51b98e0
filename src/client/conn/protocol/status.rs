//! Status-line scanner.
//!
//! The response head is read one byte at a time so that nothing past the
//! blank line ending the headers is consumed; whatever follows belongs to the
//! body reader. Headers are only scanned for the terminator, never parsed.

use std::io::{self, Read};

use thiserror::Error;
use tracing::trace;

/// Capacity of the head buffer, including one byte of slack that is never filled.
pub const HEAD_CAPACITY: usize = 1024;

const TERMINATOR: &[u8; 4] = b"\r\n\r\n";
const VERSION_TOKEN: &[u8] = b"HTTP/";

/// Reasons a status code could not be recovered from the response head.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The captured bytes contain no usable `HTTP/<version> <code>` line.
    #[error("no status line in response")]
    NoStatusLine,

    /// The connection ended (or failed) before the end of the headers.
    #[error("connection closed after {captured} bytes of response head")]
    ConnectionClosed {
        /// Number of bytes captured before the connection ended.
        captured: usize,

        /// The read error, if the connection failed rather than closed.
        #[source]
        source: Option<io::Error>,
    },
}

/// Why the scan loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Terminator,
    Exhausted,
    Closed,
}

/// Reads a response head from a byte stream and extracts the status code.
#[derive(Debug)]
pub struct StatusScanner {
    head: Box<[u8; HEAD_CAPACITY]>,
    len: usize,
    matched: usize,
}

impl Default for StatusScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusScanner {
    /// Create a scanner with an empty head buffer.
    pub fn new() -> Self {
        Self {
            head: Box::new([0; HEAD_CAPACITY]),
            len: 0,
            matched: 0,
        }
    }

    /// The bytes captured so far.
    pub fn head(&self) -> &[u8] {
        &self.head[..self.len]
    }

    /// Whether the blank line ending the headers has been seen.
    pub fn is_complete(&self) -> bool {
        self.matched == TERMINATOR.len()
    }

    /// Advance the terminator matcher by one byte.
    ///
    /// A byte that does not continue `\r\n\r\n` resets the match to zero.
    fn push(&mut self, byte: u8) {
        self.head[self.len] = byte;
        self.len += 1;

        if byte == TERMINATOR[self.matched] {
            self.matched += 1;
        } else {
            self.matched = 0;
        }
    }

    /// Read the response head from `reader` and return the status code.
    ///
    /// At most `HEAD_CAPACITY - 1` bytes are read. If the buffer fills before
    /// the headers end, whatever was captured is still searched for a status
    /// line.
    pub fn scan<R: Read + ?Sized>(&mut self, reader: &mut R) -> Result<u16, ScanError> {
        let mut byte = [0u8; 1];
        let mut failure = None;

        let stop = loop {
            if self.is_complete() {
                break Stop::Terminator;
            }
            if self.len >= HEAD_CAPACITY - 1 {
                break Stop::Exhausted;
            }

            match reader.read(&mut byte) {
                Ok(0) => break Stop::Closed,
                Ok(_) => self.push(byte[0]),
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => {
                    failure = Some(error);
                    break Stop::Closed;
                }
            }
        };

        trace!(captured = self.len, ?stop, "response head scanned");

        if stop == Stop::Closed {
            return Err(ScanError::ConnectionClosed {
                captured: self.len,
                source: failure,
            });
        }

        parse_status(self.head()).ok_or(ScanError::NoStatusLine)
    }
}

/// Read a response head from `reader` and return its status code.
pub fn scan_status<R: Read + ?Sized>(reader: &mut R) -> Result<u16, ScanError> {
    StatusScanner::new().scan(reader)
}

/// Find the first `HTTP/` token and parse the code following the version.
fn parse_status(head: &[u8]) -> Option<u16> {
    let start = head
        .windows(VERSION_TOKEN.len())
        .position(|window| window == VERSION_TOKEN)?;

    let mut rest = &head[start..];
    let version_len = rest
        .iter()
        .position(|b| b.is_ascii_whitespace())
        .unwrap_or(rest.len());
    rest = &rest[version_len..];

    let gap = rest
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(rest.len());
    rest = &rest[gap..];

    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }

    std::str::from_utf8(&rest[..digits]).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A reader which hands out one byte per call and counts the calls.
    struct Trickle<'a> {
        data: &'a [u8],
        reads: usize,
    }

    impl<'a> Trickle<'a> {
        fn new(data: &'a [u8]) -> Self {
            Self { data, reads: 0 }
        }

        fn remaining(&self) -> &[u8] {
            self.data
        }
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads += 1;
            match self.data.split_first() {
                Some((first, rest)) if !buf.is_empty() => {
                    buf[0] = *first;
                    self.data = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    #[test]
    fn stops_exactly_after_headers() {
        let mut reader = Trickle::new(b"HTTP/1.1 404 Not Found\r\nServer: x\r\n\r\nbody bytes");
        let mut scanner = StatusScanner::new();

        assert_eq!(scanner.scan(&mut reader).unwrap(), 404);
        assert!(scanner.is_complete());
        assert_eq!(reader.remaining(), b"body bytes");
        assert_eq!(scanner.head(), b"HTTP/1.1 404 Not Found\r\nServer: x\r\n\r\n");
    }

    #[test]
    fn exhausted_buffer_without_status_line() {
        let data = vec![b'a'; 4096];
        let mut reader = Trickle::new(&data);

        let error = scan_status(&mut reader).unwrap_err();
        assert!(matches!(error, ScanError::NoStatusLine));
        assert_eq!(reader.reads, HEAD_CAPACITY - 1);
        assert_eq!(reader.remaining().len(), 4096 - (HEAD_CAPACITY - 1));
    }

    #[test]
    fn exhausted_buffer_still_parses_status() {
        let mut data = b"HTTP/1.1 200 OK\r\nX-Filler: ".to_vec();
        data.resize(2048, b'z');
        let mut reader = Trickle::new(&data);

        assert_eq!(scan_status(&mut reader).unwrap(), 200);
        assert_eq!(reader.reads, HEAD_CAPACITY - 1);
    }

    #[test]
    fn empty_stream_is_closed() {
        let mut reader = Trickle::new(b"");
        let error = scan_status(&mut reader).unwrap_err();
        assert!(matches!(
            error,
            ScanError::ConnectionClosed {
                captured: 0,
                source: None
            }
        ));
    }

    #[test]
    fn close_before_terminator_is_not_trusted() {
        let mut reader = Trickle::new(b"HTTP/1.1 200 OK\r\n");
        let error = scan_status(&mut reader).unwrap_err();
        assert!(matches!(
            error,
            ScanError::ConnectionClosed { captured: 17, .. }
        ));
    }

    #[test]
    fn read_error_is_reported_as_closed() {
        let error = scan_status(&mut Broken).unwrap_err();
        match error {
            ScanError::ConnectionClosed {
                captured: 0,
                source: Some(source),
            } => assert_eq!(source.kind(), io::ErrorKind::ConnectionReset),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn terminator_without_status_line() {
        let mut reader = Trickle::new(b"garbage\r\n\r\n");
        assert!(matches!(
            scan_status(&mut reader).unwrap_err(),
            ScanError::NoStatusLine
        ));
    }

    #[test]
    fn status_line_after_leading_noise() {
        let mut reader = Trickle::new(b"\r\nHTTP/1.0   301 Moved\r\n\r\n");
        assert_eq!(scan_status(&mut reader).unwrap(), 301);
    }

    #[test]
    fn interrupted_sequence_resets_the_match() {
        let mut scanner = StatusScanner::new();
        for byte in b"\r\n\rX" {
            scanner.push(*byte);
        }
        assert_eq!(scanner.matched, 0);
        for byte in b"\r\n\r\n" {
            scanner.push(*byte);
        }
        assert!(scanner.is_complete());
    }

    #[test]
    fn parse_status_variants() {
        assert_eq!(parse_status(b"HTTP/1.1 200 OK"), Some(200));
        assert_eq!(parse_status(b"HTTP/2 204"), Some(204));
        assert_eq!(parse_status(b"HTTP/1.1\t503\tBusy"), Some(503));
        assert_eq!(parse_status(b"HTTP/1.1 OK"), None);
        assert_eq!(parse_status(b"HTTP/1.1 99999 Huge"), None);
        assert_eq!(parse_status(b"HTTP/1.1"), None);
        assert_eq!(parse_status(b"ICY 200 OK"), None);
    }
}
