//! Engine configuration.
//!
//! A serde-derived struct loadable from TOML, with a `validate()` pass,
//! rather than a collection of loose function arguments.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

fn default_net_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_ndt_runtime() -> Duration {
    Duration::from_secs(10)
}

/// Top-level options threaded through the endpoint connector, transport,
/// TLS layer, and protocol runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Read/write/connect deadline applied by the endpoint connector
    /// (default 30s).
    #[serde(with = "humantime_serde", default = "default_net_timeout")]
    pub net_timeout: Duration,

    #[serde(default)]
    pub dns: DnsOptions,

    #[serde(default)]
    pub tls: TlsOptions,

    /// `host:port` of a SOCKS5 proxy to tunnel through; absent means connect
    /// directly.
    #[serde(default)]
    pub socks5_proxy: Option<String>,

    #[serde(default)]
    pub ndt: NdtOptions,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            net_timeout: default_net_timeout(),
            dns: DnsOptions::default(),
            tls: TlsOptions::default(),
            socks5_proxy: None,
            ndt: NdtOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsOptions {
    /// `host[:port]` of the nameserver to use; `None` uses the system
    /// default resolver configuration.
    #[serde(default)]
    pub nameserver: Option<String>,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(with = "humantime_serde", default = "default_dns_timeout")]
    pub timeout: Duration,
    #[serde(default)]
    pub randomize_case: bool,
}

fn default_attempts() -> u32 {
    3
}

fn default_dns_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for DnsOptions {
    fn default() -> Self {
        Self {
            nameserver: None,
            attempts: default_attempts(),
            timeout: default_dns_timeout(),
            randomize_case: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsOptions {
    /// CA bundle path; missing when set but absent on disk fails the
    /// handshake with `MissingCaBundlePathError`.
    #[serde(default)]
    pub ca_bundle_path: Option<PathBuf>,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self { ca_bundle_path: None }
    }
}

fn default_ndt_control_timeout() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NdtOptions {
    /// Read/write deadline for the control connection, set once `connect`
    /// completes. Distinct from `net_timeout`, which only bounds the
    /// connect attempt itself (default 10s).
    #[serde(with = "humantime_serde", default = "default_ndt_control_timeout")]
    pub timeout: Duration,
    #[serde(with = "humantime_serde", default = "default_ndt_runtime")]
    pub runtime: Duration,
    /// OR of TEST_* bits the client advertises, at minimum
    /// STATUS|META|C2S|S2C.
    #[serde(default = "default_test_suite")]
    pub test_suite: u32,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_ndt_port")]
    pub port: u16,
}

fn default_test_suite() -> u32 {
    crate::ndt::messages::TEST_STATUS
        | crate::ndt::messages::TEST_META
        | crate::ndt::messages::TEST_C2S
        | crate::ndt::messages::TEST_S2C
}

fn default_ndt_port() -> u16 {
    3001
}

impl Default for NdtOptions {
    fn default() -> Self {
        Self {
            timeout: default_ndt_control_timeout(),
            runtime: default_ndt_runtime(),
            test_suite: default_test_suite(),
            address: None,
            port: default_ndt_port(),
        }
    }
}

impl EngineOptions {
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.dns.attempts == 0 {
            return Err("dns.attempts must be >= 1".to_string());
        }
        if let Some(proxy) = &self.socks5_proxy {
            if proxy.parse::<std::net::SocketAddr>().is_err()
                && proxy.rsplit_once(':').is_none()
            {
                return Err(format!("invalid socks5_proxy address: {proxy}"));
            }
        }
        Ok(())
    }
}
