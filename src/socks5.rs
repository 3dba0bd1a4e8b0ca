//! SOCKS5 client: wraps a Transport that connects to a SOCKS5 proxy,
//! negotiates the no-auth method, and issues a CONNECT request for a
//! `(host, port)` before exposing the tunnelled byte stream.
//!
//! Drives the protocol from the client role — tunnelling measurement
//! traffic *out* through a proxy, not accepting proxied connections.

use std::net::{IpAddr, SocketAddr};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::error::{Error, Kind};
use crate::logger::Logger;
use crate::transport::{Socks5Meta, Transport};

const SOCKS5_VERSION: u8 = 0x05;
const METHOD_NO_AUTH: u8 = 0x00;
const CMD_CONNECT: u8 = 0x01;
const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

/// Connect to `proxy` and tunnel a CONNECT to `target_host:target_port`.
/// Returns a clean byte stream towards the target; the proxy address/port
/// are advertised via `socks5_address()`/`socks5_port()` on the Transport.
pub async fn socks5_connect(
    proxy: SocketAddr,
    target_host: &str,
    target_port: u16,
    logger: Logger,
) -> Result<Transport<TcpStream>, Error> {
    if target_host.len() > 255 {
        return Err(Error::new(Kind::SocksAddressTooLongError));
    }

    logger.in_progress(&format!("socks5: connect via {proxy} to {target_host}:{target_port}"));
    let stream = TcpStream::connect(proxy).await?;
    let mut transport = Transport::new(stream, logger.clone());

    negotiate_auth(&mut transport).await?;
    send_connect_request(&mut transport, target_host, target_port).await?;
    let leftover = read_connect_reply(&mut transport).await?;

    if !leftover.is_empty() {
        transport.input_buffer().append(&leftover);
    }

    logger.complete("socks5: connect", None);
    Ok(transport.with_socks5_meta(Socks5Meta {
        proxy_address: proxy.ip().to_string(),
        proxy_port: proxy.port(),
    }))
}

async fn negotiate_auth<S: AsyncRead + AsyncWrite + Unpin>(
    transport: &mut Transport<S>,
) -> Result<(), Error> {
    transport.write(&[SOCKS5_VERSION, 0x01, METHOD_NO_AUTH]).await?;
    let reply = transport.readn(2).await?;
    if reply[0] != SOCKS5_VERSION {
        return Err(Error::new(Kind::BadSocksVersionError).with_context(reply[0].to_string()));
    }
    if reply[1] != METHOD_NO_AUTH {
        return Err(Error::new(Kind::NoAvailableSocksAuthenticationError));
    }
    Ok(())
}

async fn send_connect_request<S: AsyncRead + AsyncWrite + Unpin>(
    transport: &mut Transport<S>,
    target_host: &str,
    target_port: u16,
) -> Result<(), Error> {
    if target_host.len() > 255 {
        return Err(Error::new(Kind::SocksAddressTooLongError));
    }
    let mut request = vec![SOCKS5_VERSION, CMD_CONNECT, 0x00, ATYP_DOMAIN, target_host.len() as u8];
    request.extend_from_slice(target_host.as_bytes());
    request.extend_from_slice(&target_port.to_be_bytes());
    transport.write(&request).await
}

/// Read the CONNECT reply and return any bytes that arrived piggybacked on
/// it past the reply's own length.
async fn read_connect_reply<S: AsyncRead + AsyncWrite + Unpin>(
    transport: &mut Transport<S>,
) -> Result<Vec<u8>, Error> {
    let head = transport.readn(4).await?;
    if head[0] != SOCKS5_VERSION {
        return Err(Error::new(Kind::SocksError).with_context("bad version in reply"));
    }
    if head[1] != 0x00 {
        return Err(Error::new(Kind::SocksError).with_context(format!("reply code {}", head[1])));
    }
    if head[2] != 0x00 {
        return Err(Error::new(Kind::BadSocksReservedFieldError));
    }
    let atyp = head[3];
    let addr_len = match atyp {
        ATYP_IPV4 => 4,
        ATYP_DOMAIN => {
            let len = transport.readn(1).await?;
            len[0] as usize
        }
        ATYP_IPV6 => 16,
        _ => return Err(Error::new(Kind::BadSocksAtypeValueError).with_context(atyp.to_string())),
    };
    let _addr = transport.readn(addr_len).await?;
    let _port = transport.readn(2).await?;

    // Any bytes already buffered past the reply are application data that
    // arrived piggybacked on the final SOCKS packet.
    let buffered = transport.input_buffer();
    let leftover = buffered.as_slice().to_vec();
    buffered.discard(leftover.len());
    Ok(leftover)
}

/// Parse `"host:port"` into a `SocketAddr`, resolving a literal IP only —
/// the proxy address itself is expected to be configured as a literal;
/// resolving a proxy hostname is the endpoint connector's job, not this
/// client's.
pub fn parse_proxy_addr(proxy: &str) -> Result<SocketAddr, Error> {
    if let Ok(addr) = proxy.parse::<SocketAddr>() {
        return Ok(addr);
    }
    let (host, port) = proxy
        .rsplit_once(':')
        .ok_or_else(|| Error::new(Kind::ValueError).with_context(format!("bad proxy address: {proxy}")))?;
    let ip: IpAddr = host
        .parse()
        .map_err(|_| Error::new(Kind::ValueError).with_context(format!("bad proxy host: {host}")))?;
    let port: u16 = port
        .parse()
        .map_err(|_| Error::new(Kind::SocksInvalidPortError))?;
    Ok(SocketAddr::new(ip, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncWriteExt};

    #[tokio::test]
    async fn auth_request_is_exactly_three_bytes() {
        let (a, b) = duplex(64);
        let mut transport = Transport::new(a, Logger::for_component("test"));
        tokio::spawn(async move {
            let mut b = b;
            let mut buf = [0u8; 3];
            tokio::io::AsyncReadExt::read_exact(&mut b, &mut buf).await.unwrap();
            assert_eq!(buf, [0x05, 0x01, 0x00]);
            b.write_all(&[0x05, 0x00]).await.unwrap();
        });
        negotiate_auth(&mut transport).await.unwrap();
    }

    #[tokio::test]
    async fn connect_reply_parses_ipv4_and_strips_piggyback() {
        let (mut a, b) = duplex(256);
        let mut transport = Transport::new(b, Logger::for_component("test"));
        a.write_all(&[0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0x1F, 0x90])
            .await
            .unwrap();
        drop(a);
        let leftover = read_connect_reply(&mut transport).await.unwrap();
        assert!(leftover.is_empty());
    }

    #[tokio::test]
    async fn address_too_long_rejected() {
        let (a, _b) = duplex(8);
        let mut transport = Transport::new(a, Logger::for_component("test"));
        let host = "a".repeat(256);
        let err = send_connect_request(&mut transport, &host, 80).await.unwrap_err();
        assert_eq!(err.kind(), Kind::SocksAddressTooLongError);
    }
}
