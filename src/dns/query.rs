//! DNS query/response data model.

use std::time::Duration;

/// Only `IN` is supported; anything else fails with `UnsupportedClass`
/// before a query is ever issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsClass {
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsType {
    A,
    Aaaa,
    Ptr,
    ReverseA,
    ReverseAaaa,
}

#[derive(Debug, Clone)]
pub struct DnsSettings {
    /// `host[:port]`; `None` uses the system default resolver.
    pub nameserver: Option<String>,
    pub attempts: u32,
    pub timeout: Duration,
    pub randomize_case: bool,
}

impl Default for DnsSettings {
    fn default() -> Self {
        Self {
            nameserver: None,
            attempts: 3,
            timeout: Duration::from_secs(5),
            randomize_case: false,
        }
    }
}

impl From<&crate::config::DnsOptions> for DnsSettings {
    fn from(opts: &crate::config::DnsOptions) -> Self {
        Self {
            nameserver: opts.nameserver.clone(),
            attempts: opts.attempts,
            timeout: opts.timeout,
            randomize_case: opts.randomize_case,
        }
    }
}

/// The closed status enum the resolver surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsStatus {
    NoError,
    FormatError,
    ServerFailed,
    NxDomain,
    NotImplemented,
    Refused,
    Truncated,
    NoData,
    Timeout,
    Shutdown,
    Unknown,
}

impl DnsStatus {
    /// `rtt` and `ttl` are meaningful only when a server actually replied;
    /// they are zero on these statuses.
    pub fn server_replied(self) -> bool {
        !matches!(self, DnsStatus::Timeout | DnsStatus::Shutdown | DnsStatus::Unknown)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Response {
    pub status: Option<DnsStatus>,
    pub answers: Vec<String>,
    pub rtt: Duration,
    pub ttl: u32,
}

impl Response {
    pub fn new(status: DnsStatus, answers: Vec<String>, rtt: Duration, ttl: u32) -> Self {
        if !status.server_replied() {
            return Self { status: Some(status), answers: Vec::new(), rtt: Duration::ZERO, ttl: 0 };
        }
        Self { status: Some(status), answers, rtt, ttl }
    }
}

/// Synthesize the `in-addr.arpa` / `ip6.arpa` name for `REVERSE_A` /
/// `REVERSE_AAAA` queries.
pub fn arpa_name(ip: std::net::IpAddr) -> String {
    match ip {
        std::net::IpAddr::V4(v4) => {
            let o = v4.octets();
            format!("{}.{}.{}.{}.in-addr.arpa", o[3], o[2], o[1], o[0])
        }
        std::net::IpAddr::V6(v6) => {
            let mut nibbles = String::new();
            for byte in v6.octets().iter().rev() {
                nibbles.push_str(&format!("{:x}.{:x}.", byte & 0xf, byte >> 4));
            }
            format!("{}ip6.arpa", nibbles)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arpa_name_ipv4() {
        let ip: std::net::IpAddr = "130.192.16.172".parse().unwrap();
        assert_eq!(arpa_name(ip), "172.16.192.130.in-addr.arpa");
    }

    #[test]
    fn timeout_zeroes_rtt_and_ttl() {
        let r = Response::new(DnsStatus::Timeout, vec!["1.2.3.4".into()], Duration::from_secs(1), 300);
        assert_eq!(r.rtt, Duration::ZERO);
        assert_eq!(r.ttl, 0);
        assert!(r.answers.is_empty());
    }
}
