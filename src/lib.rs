//! An asynchronous network-measurement engine: the reactor, transport
//! abstraction (plain TCP, TLS, SOCKS5-tunneled), DNS resolver, and the
//! protocol-runner framework that composes multi-phase network protocols
//! (NDT throughput testing, canonically) out of sequenced async phases.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  Connector  │────▶│  Transport   │────▶│  NDT runner  │
//! │ (DNS + TCP) │     │ (TLS, SOCKS5)│     │  (ndt::*)    │
//! └─────────────┘     └──────────────┘     └──────────────┘
//!        │                                        │
//!        ▼                                        ▼
//!   dns::Resolver                            report::FileReporter
//! ```
//!
//! Every entry point takes an explicit [`logger::Logger`] and
//! [`config::EngineOptions`] rather than reaching for a process-wide
//! default; the one true singleton is the `reactor::Reactor` a binary drives
//! its event loop with.

pub mod buffer;
pub mod config;
pub mod dns;
pub mod endpoint;
pub mod error;
pub mod json_logger;
pub mod logger;
pub mod ndt;
pub mod reactor;
pub mod report;
pub mod socks5;
pub mod tls;
pub mod transport;

pub use config::EngineOptions;
pub use endpoint::{AddressSet, Connector, Endpoint};
pub use error::{Error, Kind, Result};
pub use logger::Logger;
pub use ndt::{run_with_specific_server, run as run_ndt};
pub use reactor::Reactor;
pub use transport::Transport;
