//! Content reader: drain a bounded amount of body from a byte stream.

use std::io::{self, Read};

use tracing::{debug, trace};

/// Read into `buf` until it is full, or the stream ends or fails.
///
/// Returns the number of bytes read. A peer which closes early is not an
/// error; the short count is the result. There is no framing here, the only
/// bound is the length of `buf`.
pub fn read_content<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> usize {
    let mut received = 0;

    while received < buf.len() {
        match reader.read(&mut buf[received..]) {
            Ok(0) => {
                trace!(received, "content stream ended");
                break;
            }
            Ok(n) => received += n,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => {
                debug!(received, %error, "content read stopped");
                break;
            }
        }
    }

    received
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// Yields its data in fixed-size pieces, then optionally fails.
    struct Chunked {
        data: Cursor<Vec<u8>>,
        chunk: usize,
        fail_at_end: bool,
        reads: usize,
    }

    impl Read for Chunked {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads += 1;
            let limit = buf.len().min(self.chunk);
            let n = self.data.read(&mut buf[..limit])?;
            if n == 0 && self.fail_at_end {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no close_notify"));
            }
            Ok(n)
        }
    }

    fn chunked(len: usize, chunk: usize, fail_at_end: bool) -> Chunked {
        Chunked {
            data: Cursor::new((0..len).map(|i| i as u8).collect()),
            chunk,
            fail_at_end,
            reads: 0,
        }
    }

    #[test]
    fn short_body_is_not_an_error() {
        let mut reader = chunked(40, 40, false);
        let mut buf = [0u8; 100];
        assert_eq!(read_content(&mut reader, &mut buf), 40);
        assert_eq!(&buf[..3], &[0, 1, 2]);
    }

    #[test]
    fn stops_at_the_limit() {
        let mut reader = chunked(500, 64, false);
        let mut buf = [0u8; 100];
        assert_eq!(read_content(&mut reader, &mut buf), 100);
        assert_eq!(reader.data.position(), 100);
        assert_eq!(buf[99], 99);
    }

    #[test]
    fn accumulates_across_reads() {
        let mut reader = chunked(30, 7, false);
        let mut buf = [0u8; 64];
        assert_eq!(read_content(&mut reader, &mut buf), 30);
        // 5 reads of data, one read observing the end.
        assert_eq!(reader.reads, 6);
    }

    #[test]
    fn read_error_ends_the_body() {
        let mut reader = chunked(12, 12, true);
        let mut buf = [0u8; 20];
        assert_eq!(read_content(&mut reader, &mut buf), 12);
    }

    #[test]
    fn empty_buffer_reads_nothing() {
        let mut reader = chunked(12, 12, false);
        assert_eq!(read_content(&mut reader, &mut []), 0);
        assert_eq!(reader.reads, 0);
    }
}
