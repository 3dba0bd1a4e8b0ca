//! Byte-stream abstraction over a connected socket.
//!
//! A callback-based event model (`on_connect`/`on_data`/`on_flush`/
//! `on_error`) would be rendered here as explicit owned methods on an object
//! wrapping a `tokio::net::TcpStream` (or any `AsyncRead + AsyncWrite`):
//! ownership discipline over a single concrete stream type rather than
//! dynamic callback registration, which Rust's borrow checker makes
//! needlessly ceremonial for an in-process engine. Timeouts, buffering,
//! recording, and the lifecycle state machine are all preserved.

pub mod filter;

use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::buffer::Buffer;
use crate::error::{Error, Kind};
use crate::logger::Logger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// SOCKS5 metadata attached to a Transport tunnelled through a proxy;
/// empty strings when not tunnelled.
#[derive(Debug, Clone, Default)]
pub struct Socks5Meta {
    pub proxy_address: String,
    pub proxy_port: u16,
}

/// A connected byte stream with buffered I/O, timeouts, and recording.
///
/// Generic over the concrete stream so the same type serves plain TCP,
/// `tokio_rustls` TLS streams, and SOCKS5-tunnelled streams uniformly —
/// each layer wraps the previous `Transport`'s stream type.
pub struct Transport<S = tokio::net::TcpStream> {
    stream: S,
    state: State,
    read_write_timeout: Option<Duration>,
    input: Buffer,
    output: BytesMut,
    record_received: bool,
    record_sent: bool,
    received_log: BytesMut,
    sent_log: BytesMut,
    socks5: Socks5Meta,
    logger: Logger,
    error_emitted: bool,
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, logger: Logger) -> Self {
        Self {
            stream,
            state: State::Open,
            read_write_timeout: None,
            input: Buffer::new(),
            output: BytesMut::new(),
            record_received: false,
            record_sent: false,
            received_log: BytesMut::new(),
            sent_log: BytesMut::new(),
            socks5: Socks5Meta::default(),
            logger,
            error_emitted: false,
        }
    }

    pub fn with_socks5_meta(mut self, meta: Socks5Meta) -> Self {
        self.socks5 = meta;
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn set_timeout(&mut self, t: Option<Duration>) {
        self.read_write_timeout = t;
    }

    pub fn clear_timeout(&mut self) {
        self.read_write_timeout = None;
    }

    pub fn record_received_data(&mut self) {
        self.record_received = true;
    }

    pub fn dont_record_received_data(&mut self) {
        self.record_received = false;
    }

    pub fn record_sent_data(&mut self) {
        self.record_sent = true;
    }

    pub fn dont_record_sent_data(&mut self) {
        self.record_sent = false;
    }

    pub fn received_data(&self) -> &[u8] {
        &self.received_log
    }

    pub fn sent_data(&self) -> &[u8] {
        &self.sent_log
    }

    pub fn socks5_address(&self) -> &str {
        &self.socks5.proxy_address
    }

    pub fn socks5_port(&self) -> u16 {
        self.socks5.proxy_port
    }

    /// Enqueue bytes for send; returns once the bytes are flushed to the
    /// socket (the return of this `async fn` rather than a separate flush
    /// callback).
    pub async fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.guard_not_closed()?;
        if self.record_sent {
            self.sent_log.extend_from_slice(bytes);
        }
        let result = match self.read_write_timeout {
            Some(t) => timeout(t, self.stream.write_all(bytes)).await.map_err(|_| Kind::TimeoutError),
            None => Ok(self.stream.write_all(bytes).await.map_err(|_| Kind::SocketError)),
        };
        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(k)) => Err(self.emit_error(Error::new(k))),
            Err(k) => Err(self.emit_error(Error::new(k))),
        }
    }

    /// Read bytes from the socket into the input buffer, returning the
    /// number of bytes appended. Distinguishes EOF (`EofError`) and timeout
    /// expiry (`TimeoutError`) from any other socket failure
    /// (`SocketError`), exactly once per Transport.
    pub async fn pump(&mut self) -> Result<usize, Error> {
        self.guard_not_closed()?;
        let mut chunk = [0u8; 8192];
        let read = match self.read_write_timeout {
            Some(t) => timeout(t, self.stream.read(&mut chunk))
                .await
                .map_err(|_| Error::new(Kind::TimeoutError))?,
            None => self.stream.read(&mut chunk).await.map_err(Error::from),
        };
        match read {
            Ok(0) => Err(self.emit_error(Error::new(Kind::EofError))),
            Ok(n) => {
                if self.record_received {
                    self.received_log.extend_from_slice(&chunk[..n]);
                }
                self.input.append(&chunk[..n]);
                Ok(n)
            }
            Err(e) => Err(self.emit_error(e)),
        }
    }

    /// Read exactly `n` bytes, pumping the socket as needed.
    pub async fn readn(&mut self, n: usize) -> Result<Vec<u8>, Error> {
        while self.input.len() < n {
            self.pump().await?;
        }
        self.input.read(n)
    }

    /// Read up to a CR?LF terminator, pumping the socket as needed.
    pub async fn readline(&mut self, max: usize) -> Result<Vec<u8>, Error> {
        loop {
            match self.input.readline(max) {
                Ok(line) => return Ok(line),
                Err(e) if e.kind() == Kind::EolNotFoundError => {
                    self.pump().await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Access whatever has already been buffered without blocking for more.
    pub fn input_buffer(&mut self) -> &mut Buffer {
        &mut self.input
    }

    /// Shut down; idempotent.
    pub async fn close(&mut self) {
        if self.state == State::Closed {
            return;
        }
        self.state = State::Closing;
        let _ = self.stream.shutdown().await;
        self.state = State::Closed;
    }

    fn guard_not_closed(&self) -> Result<(), Error> {
        if self.state == State::Closed {
            return Err(Error::new(Kind::SocketError).with_context("use after close"));
        }
        Ok(())
    }

    fn emit_error(&mut self, err: Error) -> Error {
        debug_assert!(!self.error_emitted, "Transport must emit at most one error");
        self.error_emitted = true;
        self.state = State::Closed;
        err
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn close_is_idempotent() {
        let (a, _b) = duplex(64);
        let mut t = Transport::new(a, Logger::for_component("test"));
        t.close().await;
        t.close().await;
        assert_eq!(t.state(), State::Closed);
    }

    #[tokio::test]
    async fn readn_pumps_until_satisfied() {
        let (mut a, b) = duplex(64);
        let mut t = Transport::new(b, Logger::for_component("test"));
        tokio::spawn(async move {
            a.write_all(b"hello").await.unwrap();
        });
        let data = t.readn(5).await.unwrap();
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn eof_surfaces_as_eof_error() {
        let (a, b) = duplex(64);
        drop(a);
        let mut t = Transport::new(b, Logger::for_component("test"));
        let err = t.pump().await.unwrap_err();
        assert_eq!(err.kind(), Kind::EofError);
    }
}
