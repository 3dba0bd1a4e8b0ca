//! NDT v3.7.0 wire format: framed binary messages and the JSON payload
//! convention layered on top of them.
//!
//! A message is `u8 type, u16 length_be, length bytes payload`; structured
//! payloads are a JSON object with at least a `msg` string field.

use serde_json::json;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{Error, Kind};
use crate::transport::Transport;

pub const COMM_FAILURE: u8 = 0x00;
pub const SRV_QUEUE: u8 = 0x01;
pub const MSG_LOGIN: u8 = 0x02;
pub const TEST_PREPARE: u8 = 0x03;
pub const TEST_START: u8 = 0x04;
pub const TEST_MSG: u8 = 0x05;
pub const TEST_FINALIZE: u8 = 0x06;
pub const MSG_ERROR: u8 = 0x07;
pub const MSG_RESULTS: u8 = 0x08;
pub const MSG_LOGOUT: u8 = 0x09;
pub const MSG_WAITING: u8 = 0x0A;
pub const MSG_EXTENDED_LOGIN: u8 = 0x0B;

pub const TEST_NONE: u32 = 0;
pub const TEST_MID: u32 = 1 << 0;
pub const TEST_C2S: u32 = 1 << 1;
pub const TEST_S2C: u32 = 1 << 2;
pub const TEST_SFW: u32 = 1 << 3;
pub const TEST_STATUS: u32 = 1 << 4;
pub const TEST_META: u32 = 1 << 5;

pub const KICKOFF_MESSAGE: &str = "123456 654321";
pub const KICKOFF_MESSAGE_SIZE: usize = 13;
pub const NDT_VERSION: &str = "v3.7.0 (ndtd-rust)";

/// Read one framed message, returning its type byte and raw payload bytes.
pub async fn read_ndt_message<S>(transport: &mut Transport<S>) -> Result<(u8, Vec<u8>), Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let head = transport.readn(3).await.map_err(|e| {
        Error::new(Kind::ReadingMessageTypeLengthError).with_context(e.to_string())
    })?;
    let msg_type = head[0];
    let length = u16::from_be_bytes([head[1], head[2]]) as usize;
    let payload = transport.readn(length).await.map_err(|e| {
        Error::new(Kind::ReadingMessagePayloadError).with_context(e.to_string())
    })?;
    Ok((msg_type, payload))
}

/// Write one framed message. Fails with `MessageTooLongError` if `payload`
/// exceeds 65535 bytes.
pub async fn write_ndt_message<S>(
    transport: &mut Transport<S>,
    msg_type: u8,
    payload: &[u8],
) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if payload.len() > u16::MAX as usize {
        return Err(Error::new(Kind::MessageTooLongError));
    }
    let mut frame = Vec::with_capacity(3 + payload.len());
    frame.push(msg_type);
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(payload);
    transport.write(&frame).await
}

/// Read a framed message and extract its `"msg"` JSON field, mirroring
/// `messages::read` (`read_ndt` → `read_json` → pluck `"msg"`).
pub async fn read_msg<S>(transport: &mut Transport<S>) -> Result<(u8, String), Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (msg_type, payload) = read_ndt_message(transport).await?;
    if payload.is_empty() {
        return Ok((msg_type, String::new()));
    }
    let text = String::from_utf8(payload).map_err(|_| Error::new(Kind::JsonParseError))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|_| Error::new(Kind::JsonParseError))?;
    let msg = value
        .get("msg")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::new(Kind::JsonKeyError))?
        .to_string();
    Ok((msg_type, msg))
}

/// Build the JSON body for MSG_EXTENDED_LOGIN: `{"msg": <version>, "tests":
/// <bitmask as decimal string>}` (grounded in `messages.cpp`'s
/// `format_msg_extended_login`).
pub fn format_msg_extended_login(test_suite: u32) -> Result<Vec<u8>, Error> {
    let body = json!({ "msg": NDT_VERSION, "tests": test_suite.to_string() });
    let text = body.to_string();
    if text.len() > u16::MAX as usize {
        return Err(Error::new(Kind::MessageTooLongError));
    }
    Ok(text.into_bytes())
}

/// Build the JSON body for a TEST_MSG frame: `{"msg": <s>}`.
pub fn format_test_msg(s: &str) -> Result<Vec<u8>, Error> {
    let body = json!({ "msg": s });
    let text = body.to_string();
    if text.len() > u16::MAX as usize {
        return Err(Error::new(Kind::MessageTooLongError));
    }
    Ok(text.into_bytes())
}
