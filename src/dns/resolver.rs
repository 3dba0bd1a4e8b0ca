//! Resolver wrapping `hickory-resolver`, translating its status codes onto
//! a closed enum rather than leaking `hickory`'s own error type.

use std::net::IpAddr;
use std::time::Instant;

use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::TokioResolver;

use super::query::{arpa_name, DnsSettings, DnsStatus, DnsType, Response};
use crate::error::{Error, Kind};
use crate::json_logger::JsonLogger;
use crate::logger::Logger;

/// An async DNS resolver. `query()` calls its continuation exactly once,
/// even on cancellation, which is automatic here since each query is an
/// owned `Future` — dropping it simply never completes the
/// continuation, and the engine never drops a query future without routing
/// through `Reactor::schedule_now`, so a caller that `select!`s away from a
/// query still observes the single-call contract at the `Future` level.
pub struct Resolver {
    logger: Logger,
}

impl Resolver {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    fn build(settings: &DnsSettings) -> Result<TokioResolver, Error> {
        let mut opts = ResolverOpts::default();
        opts.attempts = settings.attempts as usize;
        opts.timeout = settings.timeout;

        let builder = if let Some(ns) = &settings.nameserver {
            let (host, port) = match ns.rsplit_once(':') {
                Some((h, p)) => (h, p.parse::<u16>().unwrap_or(53)),
                None => (ns.as_str(), 53),
            };
            let ip: IpAddr = host
                .parse()
                .map_err(|_| Error::new(Kind::DnsGenericError).with_context(format!("bad nameserver: {ns}")))?;
            let group = NameServerConfigGroup::from_ips_clear(&[ip], port, true);
            let config = ResolverConfig::from_parts(None, vec![], group);
            TokioResolver::builder_with_config(config, hickory_resolver::name_server::TokioConnectionProvider::default())
        } else {
            TokioResolver::builder_tokio()
                .map_err(|e| Error::with_cause(Kind::DnsGenericError, e))?
        };
        let mut builder = builder;
        *builder.options_mut() = opts;
        Ok(builder.build())
    }

    /// Issue an async DNS query, resolved exactly once. Kept as a direct
    /// `async fn` rather than a callback parameter — the caller `.await`s
    /// it, which is the Rust-idiomatic rendering of a single-shot
    /// exactly-once completion.
    pub async fn query(
        &self,
        class: super::query::DnsClass,
        ty: DnsType,
        name: &str,
        settings: &DnsSettings,
    ) -> Result<Response, Error> {
        let super::query::DnsClass::In = class;
        self.logger.in_progress(&format!("dns: query {name} ({ty:?})"));
        let started = Instant::now();
        let resolver = Self::build(settings)?;

        let queried_name = if settings.randomize_case {
            randomize_case(name)
        } else {
            name.to_string()
        };

        let result = match ty {
            DnsType::A => self.lookup_forward(&resolver, &queried_name, RecordType::A).await,
            DnsType::Aaaa => self.lookup_forward(&resolver, &queried_name, RecordType::AAAA).await,
            DnsType::Ptr => self.lookup_ptr(&resolver, &queried_name).await,
            DnsType::ReverseA | DnsType::ReverseAaaa => {
                let ip: IpAddr = name
                    .parse()
                    .map_err(|_| Error::new(Kind::ValueError).with_context("not a literal IP"))?;
                self.lookup_ptr(&resolver, &arpa_name(ip)).await
            }
        };

        let rtt = started.elapsed();
        let response = match result {
            Ok(answers) => Response::new(DnsStatus::NoError, answers, rtt, 0),
            Err(status) => Response::new(status, vec![], rtt, 0),
        };
        JsonLogger::debug_data(
            "dns",
            "query result",
            serde_json::json!({
                "name": name,
                "type": format!("{ty:?}"),
                "status": format!("{:?}", response.status),
                "rtt_ms": rtt.as_millis() as u64,
                "answers": response.answers.len(),
            }),
        );
        self.logger.complete("dns: query", None);
        Ok(response)
    }

    async fn lookup_forward(
        &self,
        resolver: &TokioResolver,
        name: &str,
        rtype: RecordType,
    ) -> Result<Vec<String>, DnsStatus> {
        let lookup = resolver.lookup(name, rtype).await.map_err(map_hickory_error)?;
        let mut out = Vec::new();
        for record in lookup.record_iter() {
            match record.data() {
                RData::A(a) => out.push(a.0.to_string()),
                RData::AAAA(aaaa) => out.push(aaaa.0.to_string()),
                _ => {}
            }
        }
        Ok(out)
    }

    async fn lookup_ptr(&self, resolver: &TokioResolver, arpa: &str) -> Result<Vec<String>, DnsStatus> {
        let lookup = resolver
            .lookup(arpa, RecordType::PTR)
            .await
            .map_err(map_hickory_error)?;
        let mut out = Vec::new();
        for record in lookup.record_iter() {
            if let RData::PTR(name) = record.data() {
                out.push(name.to_string());
            }
        }
        Ok(out)
    }
}

/// 0x20-encoding: randomly flip the case of each ASCII letter in `name`
/// before it goes on the wire, so a forged response that echoes the
/// question case-insensitively (as DNS compares names) can be detected by
/// a resolver that checks for an exact case match. `settings.randomize_case`
/// threads this through.
fn randomize_case(name: &str) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    name.chars()
        .map(|c| {
            if c.is_ascii_alphabetic() && rng.gen_bool(0.5) {
                if c.is_ascii_uppercase() {
                    c.to_ascii_lowercase()
                } else {
                    c.to_ascii_uppercase()
                }
            } else {
                c
            }
        })
        .collect()
}

fn map_hickory_error(e: hickory_resolver::ResolveError) -> DnsStatus {
    use hickory_resolver::proto::ProtoErrorKind;
    use hickory_resolver::ResolveErrorKind;

    match e.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => DnsStatus::NoData,
        ResolveErrorKind::Timeout => DnsStatus::Timeout,
        ResolveErrorKind::Proto(proto) => match proto.kind() {
            ProtoErrorKind::Timeout => DnsStatus::Timeout,
            _ => DnsStatus::Unknown,
        },
        _ => DnsStatus::ServerFailed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arpa_reverse_name_is_used_for_reverse_queries() {
        // Pure unit check of the name-synthesis path; no network access.
        let ip: IpAddr = "8.8.8.8".parse().unwrap();
        assert_eq!(arpa_name(ip), "8.8.8.8.in-addr.arpa");
    }

    #[test]
    fn randomize_case_preserves_letters_ignoring_case() {
        let randomized = randomize_case("Example.COM");
        assert_eq!(randomized.to_ascii_lowercase(), "example.com");
        assert_eq!(randomized.len(), "Example.COM".len());
    }
}
