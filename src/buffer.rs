//! Growable ordered byte sequence.
//!
//! Backed by `bytes::BytesMut` rather than a hand-rolled ring buffer.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Error, Kind};

const CRLF: &[u8; 2] = b"\r\n";

#[derive(Debug, Default, Clone)]
pub struct Buffer {
    inner: BytesMut,
}

impl Buffer {
    pub fn new() -> Self {
        Self { inner: BytesMut::new() }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Append bytes to the end of the buffer.
    pub fn append(&mut self, bytes: &[u8]) {
        self.inner.extend_from_slice(bytes);
    }

    /// Read (consume) exactly `n` bytes. Fails if fewer are available.
    pub fn read(&mut self, n: usize) -> Result<Vec<u8>, Error> {
        if self.inner.len() < n {
            return Err(Error::new(Kind::ValueError).with_context("short read"));
        }
        Ok(self.inner.split_to(n).to_vec())
    }

    /// Atomic bounded read: returns an empty vec (no data consumed) when
    /// fewer than `n` bytes are buffered.
    pub fn readn(&mut self, n: usize) -> Vec<u8> {
        if self.inner.len() < n {
            return Vec::new();
        }
        self.inner.split_to(n).to_vec()
    }

    /// Peek `n` bytes without consuming them.
    pub fn peek(&self, n: usize) -> Option<&[u8]> {
        if self.inner.len() < n {
            return None;
        }
        Some(&self.inner[..n])
    }

    /// Read up to a CR?LF terminator. Fails with `LineTooLongError` if no
    /// terminator is found within `max` bytes, or `EolNotFoundError` if the
    /// buffer is exhausted without one (mirroring the two distinct failure
    /// modes this distinguishes).
    pub fn readline(&mut self, max: usize) -> Result<Vec<u8>, Error> {
        if let Some(pos) = find_subslice(&self.inner, &CRLF[1..2]) {
            // Prefer the exact "\r\n" sequence when present.
            if pos > 0 && self.inner[pos - 1] == CRLF[0] {
                if pos - 1 > max {
                    return Err(Error::new(Kind::LineTooLongError));
                }
                let line = self.inner[..pos - 1].to_vec();
                self.inner.advance(pos + 1);
                return Ok(line);
            }
            if pos > max {
                return Err(Error::new(Kind::LineTooLongError));
            }
            let line = self.inner[..pos].to_vec();
            self.inner.advance(pos + 1);
            return Ok(line);
        }
        if self.inner.len() > max {
            return Err(Error::new(Kind::LineTooLongError));
        }
        Err(Error::new(Kind::EolNotFoundError))
    }

    /// Iterate the buffer's contiguous extents. `BytesMut` is always one
    /// contiguous extent in this implementation, but the iterator form is
    /// kept so callers don't depend on that.
    pub fn extents(&self) -> impl Iterator<Item = &[u8]> {
        std::iter::once(self.inner.as_ref()).filter(|s| !s.is_empty())
    }

    pub fn write_u8(&mut self, v: u8) {
        self.inner.put_u8(v);
    }

    pub fn write_u16_be(&mut self, v: u16) {
        self.inner.put_u16(v);
    }

    pub fn write_u32_be(&mut self, v: u32) {
        self.inner.put_u32(v);
    }

    pub fn write_u64_be(&mut self, v: u64) {
        self.inner.put_u64(v);
    }

    pub fn discard(&mut self, n: usize) {
        let n = n.min(self.inner.len());
        self.inner.advance(n);
    }

    /// Write `len` random printable-ASCII bytes (0x20..=0x7e), used by the
    /// NDT C2S throughput test to fill its send blocks.
    pub fn write_random_printable(&mut self, len: usize) {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        self.inner.reserve(len);
        for _ in 0..len {
            self.inner.put_u8(rng.gen_range(0x20u8..=0x7e));
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrips() {
        let mut buf = Buffer::new();
        buf.append(b"hello world");
        assert_eq!(buf.read(5).unwrap(), b"hello");
        assert_eq!(buf.read(6).unwrap(), b" world");
    }

    #[test]
    fn readn_short_does_not_consume() {
        let mut buf = Buffer::new();
        buf.append(b"ab");
        assert!(buf.readn(5).is_empty());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn readline_finds_crlf() {
        let mut buf = Buffer::new();
        buf.append(b"GET / HTTP/1.0\r\nHost: x\r\n");
        let line = buf.readline(1024).unwrap();
        assert_eq!(line, b"GET / HTTP/1.0");
    }

    #[test]
    fn readline_too_long() {
        let mut buf = Buffer::new();
        buf.append(&vec![b'a'; 100]);
        buf.append(b"\r\n");
        assert!(matches!(buf.readline(10).unwrap_err().kind(), Kind::LineTooLongError));
    }

    #[test]
    fn readline_not_found_yet() {
        let mut buf = Buffer::new();
        buf.append(b"no terminator here");
        assert!(matches!(buf.readline(1024).unwrap_err().kind(), Kind::EolNotFoundError));
    }

    #[test]
    fn big_endian_integers() {
        let mut buf = Buffer::new();
        buf.write_u16_be(0x0102);
        assert_eq!(buf.read(2).unwrap(), vec![0x01, 0x02]);
    }
}
