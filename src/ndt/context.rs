//! Per-run scratch object threaded through an NDT protocol run's phases.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::net::TcpStream;

use crate::config::EngineOptions;
use crate::logger::Logger;
use crate::transport::Transport;

/// Holds everything a phase needs: the target, the control-connection
/// Transport once `connect` has run, the granted test-suite queue `run_tests`
/// drains, and the options/logger every phase logs through.
pub struct Context {
    pub address: String,
    pub port: u16,
    pub options: EngineOptions,
    pub logger: Logger,
    pub timeout: Duration,
    pub test_suite: u32,
    pub granted_suite: VecDeque<u32>,
    pub transport: Option<Transport<TcpStream>>,
}

impl Context {
    pub fn new(address: impl Into<String>, port: u16, options: EngineOptions, logger: Logger) -> Self {
        let timeout = options.ndt.timeout;
        let test_suite = options.ndt.test_suite;
        Self {
            address: address.into(),
            port,
            options,
            logger,
            timeout,
            test_suite,
            granted_suite: VecDeque::new(),
            transport: None,
        }
    }

    /// Borrow the control-connection Transport, panicking if `connect`
    /// hasn't run yet. Every phase after `connect` relies on this.
    pub fn transport_mut(&mut self) -> &mut Transport<TcpStream> {
        self.transport
            .as_mut()
            .expect("ndt phase ran before connect populated Context::transport")
    }
}
