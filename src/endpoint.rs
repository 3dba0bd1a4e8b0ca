//! Endpoint connector: resolves a hostname to addresses and connects.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::EngineOptions;
use crate::dns::{DnsClass, DnsSettings, DnsType, Resolver};
use crate::error::{Error, Kind};
use crate::logger::Logger;
use crate::transport::Transport;

/// Immutable `{hostname, port}`. Hostname may be a literal IPv4, literal
/// IPv6, or a DNS name.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub hostname: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self { hostname: hostname.into(), port }
    }
}

/// Ordered sequence of resolved IP literals: IPv4 results first (in answer
/// order), then IPv6; a literal hostname produces a singleton set.
#[derive(Debug, Clone, Default)]
pub struct AddressSet {
    pub addresses: Vec<IpAddr>,
}

/// Resolves an [`Endpoint`] and attempts a sequential TCP connect (no
/// happy-eyeballs racing).
pub struct Connector {
    resolver: Resolver,
    logger: Logger,
}

impl Connector {
    pub fn new(logger: Logger) -> Self {
        Self { resolver: Resolver::new(logger.clone()), logger }
    }

    /// Resolve `hostname` to an [`AddressSet`]. Literal IPv4/IPv6 input
    /// short-circuits without DNS traffic.
    pub async fn resolve(&self, hostname: &str, settings: &DnsSettings) -> Result<AddressSet, Error> {
        if let Ok(ip) = hostname.parse::<IpAddr>() {
            return Ok(AddressSet { addresses: vec![ip] });
        }

        let a = self.resolver.query(DnsClass::In, DnsType::A, hostname, settings).await?;
        let aaaa = self.resolver.query(DnsClass::In, DnsType::Aaaa, hostname, settings).await?;

        let a_ok = a.status == Some(crate::dns::DnsStatus::NoError);
        let aaaa_ok = aaaa.status == Some(crate::dns::DnsStatus::NoError);
        if !a_ok && !aaaa_ok {
            return Err(Error::new(Kind::DnsGenericError)
                .with_context(format!("A: {:?}, AAAA: {:?}", a.status, aaaa.status)));
        }

        let mut addresses = Vec::new();
        for literal in a.answers.iter().chain(aaaa.answers.iter()) {
            if let Ok(ip) = literal.parse::<IpAddr>() {
                addresses.push(ip);
            }
        }
        Ok(AddressSet { addresses })
    }

    /// `connect(hostname, port, options)`: resolves and attempts TCP
    /// connection, returning the first success or the aggregated failure.
    pub async fn connect(
        &self,
        endpoint: &Endpoint,
        options: &EngineOptions,
    ) -> Result<Transport, Error> {
        let settings = DnsSettings::from(&options.dns);
        let addresses = self.resolve(&endpoint.hostname, &settings).await?;

        let mut attempt_errors = Vec::new();
        for ip in &addresses.addresses {
            let sockaddr = SocketAddr::new(*ip, endpoint.port);
            match self.try_connect_one(sockaddr, options.net_timeout).await {
                Ok(stream) => {
                    self.logger.info(format_args!("connected to {sockaddr}"));
                    return Ok(Transport::new(stream, self.logger.clone()));
                }
                Err(e) => {
                    self.logger.warn(format_args!("connect to {sockaddr} failed: {e}"));
                    attempt_errors.push(e);
                }
            }
        }

        // A single attempt's failure surfaces verbatim (a lone literal-IP
        // timeout yields `TimeoutError`, not an aggregated
        // `ConnectFailedError`); only a genuinely exhausted multi-address
        // list gets wrapped.
        if attempt_errors.len() == 1 {
            return Err(attempt_errors.pop().expect("len checked"));
        }
        Err(Error::new(Kind::ConnectFailedError)
            .with_context(format!("{} attempt(s) failed: {:?}", attempt_errors.len(), attempt_errors.iter().map(|e| e.to_string()).collect::<Vec<_>>())))
    }

    async fn try_connect_one(&self, addr: SocketAddr, net_timeout: Duration) -> Result<TcpStream, Error> {
        match timeout(net_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(Error::from(e)),
            Err(_) => Err(Error::new(Kind::TimeoutError)),
        }
    }
}
