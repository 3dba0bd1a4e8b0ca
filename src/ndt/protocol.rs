//! The NDT protocol runner: a linear, ten-phase sequence from connect
//! through disconnect, each phase wrapping its lower-level error in a
//! phase-specific error kind.
//!
//! Async functions express this as a flat sequence of `?`-propagating
//! `await`s rather than nested callbacks; `.wrap(...)` below plays back the
//! per-phase error-wrapping explicitly, since `?` alone would lose it.

use std::future::Future;
use std::time::Instant;

use crate::endpoint::{Connector, Endpoint};
use crate::error::{Error, Kind};
use crate::json_logger::JsonLogger;
use crate::logger::Logger;

use super::context::Context;
use super::messages::{self, MSG_EXTENDED_LOGIN, MSG_LOGIN, MSG_LOGOUT, MSG_RESULTS, SRV_QUEUE};
use super::{mlab_ns, test_c2s, test_meta, test_s2c};

/// Bound on `recv_results_and_logout`'s loop: an unbounded wait for
/// `MSG_LOGOUT` has the potential to loop forever against a misbehaving
/// server, so a frame count cap is imposed.
const MAX_RESULTS_FRAMES: usize = 1000;

/// Run one phase, emitting a structured JSON entry with its wall-clock
/// duration and outcome. The human-readable `Logger` already narrates each
/// phase; this is the machine-parseable counterpart for tooling that greps
/// `jq` over stdout rather than a log line.
async fn timed<T, F>(phase: &'static str, fut: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    let started = Instant::now();
    let result = fut.await;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => {
            JsonLogger::debug_data(
                "ndt",
                "phase complete",
                serde_json::json!({ "phase": phase, "elapsed_ms": elapsed_ms }),
            );
        }
        Err(e) => {
            JsonLogger::warn_data(
                "ndt",
                "phase failed",
                serde_json::json!({ "phase": phase, "elapsed_ms": elapsed_ms, "kind": e.kind().to_string() }),
            );
        }
    }
    result
}

async fn connect(ctx: &mut Context) -> Result<(), Error> {
    ctx.logger.in_progress("ndt: connect");
    let connector = Connector::new(ctx.logger.clone());
    let endpoint = Endpoint::new(ctx.address.clone(), ctx.port);
    let mut transport = connector
        .connect(&endpoint, &ctx.options)
        .await
        .map_err(|e| e.wrap(Kind::ConnectingError))?;
    transport.set_timeout(Some(ctx.timeout));
    ctx.logger.complete("ndt: connect", None);
    ctx.transport = Some(transport);
    Ok(())
}

async fn send_extended_login(ctx: &mut Context) -> Result<(), Error> {
    ctx.logger.in_progress("ndt: send login");
    let body = messages::format_msg_extended_login(ctx.test_suite)
        .map_err(|e| e.wrap(Kind::WritingLoginError))?;
    messages::write_ndt_message(ctx.transport_mut(), MSG_EXTENDED_LOGIN, &body)
        .await
        .map_err(|e| e.wrap(Kind::WritingLoginError))?;
    ctx.logger.info(format_args!("sent LOGIN with test suite: {}", ctx.test_suite));
    Ok(())
}

async fn recv_and_ignore_kickoff(ctx: &mut Context) -> Result<(), Error> {
    ctx.logger.in_progress("ndt: recv and ignore kickoff");
    let bytes = ctx
        .transport_mut()
        .readn(messages::KICKOFF_MESSAGE_SIZE)
        .await
        .map_err(|e| e.wrap(Kind::ReadingKickoffMessageError))?;
    if bytes != messages::KICKOFF_MESSAGE.as_bytes() {
        return Err(Error::new(Kind::InvalidKickoffMessageError));
    }
    ctx.logger.info(format_args!("got legacy KICKOFF message (ignored)"));
    Ok(())
}

async fn wait_in_queue(ctx: &mut Context) -> Result<(), Error> {
    ctx.logger.in_progress("ndt: wait in queue");
    let (msg_type, body) = messages::read_msg(ctx.transport_mut())
        .await
        .map_err(|e| e.wrap(Kind::ReadingWaitInQueueError))?;
    if msg_type != SRV_QUEUE {
        return Err(Error::new(Kind::ReadingWaitInQueueError).with_context("not a SRV_QUEUE message"));
    }
    let wait_time: u64 = body
        .trim()
        .parse()
        .map_err(|_| Error::new(Kind::ValueError).with_context(body.clone()))?;
    if wait_time > 0 {
        // Simplified queueing: any nonzero wait aborts instead of polling
        // again.
        return Err(Error::new(Kind::UnhandledSrvQueueMessageError));
    }
    ctx.logger.info(format_args!("wait time before test starts: {wait_time}"));
    Ok(())
}

async fn recv_version(ctx: &mut Context) -> Result<(), Error> {
    ctx.logger.in_progress("ndt: recv server version");
    let (msg_type, version) = messages::read_msg(ctx.transport_mut())
        .await
        .map_err(|e| e.wrap(Kind::ReadingVersionError))?;
    if msg_type != MSG_LOGIN {
        return Err(Error::new(Kind::ReadingVersionError).with_context("not a MSG_LOGIN message"));
    }
    ctx.logger.info(format_args!("got server version: {version}"));
    Ok(())
}

async fn recv_tests_id(ctx: &mut Context) -> Result<(), Error> {
    ctx.logger.in_progress("ndt: recv tests ID");
    let (msg_type, ids) = messages::read_msg(ctx.transport_mut())
        .await
        .map_err(|e| e.wrap(Kind::ReadingTestsIdError))?;
    if msg_type != MSG_LOGIN {
        return Err(Error::new(Kind::ReadingTestsIdError).with_context("not a MSG_LOGIN message"));
    }
    ctx.logger.info(format_args!("authorized tests: {ids}"));
    for token in ids.split_whitespace() {
        let id: u32 = token
            .parse()
            .map_err(|_| Error::new(Kind::ReadingTestsIdError).with_context(token.to_string()))?;
        ctx.granted_suite.push_back(id);
    }
    Ok(())
}

async fn run_tests(ctx: &mut Context) -> Result<(), Error> {
    while let Some(id) = ctx.granted_suite.pop_front() {
        ctx.logger.info(format_args!("run test with id {id} ..."));
        let result = match id {
            messages::TEST_C2S => test_c2s::run(ctx).await,
            messages::TEST_S2C => test_s2c::run(ctx).await,
            messages::TEST_META => test_meta::run(ctx).await,
            _ => {
                ctx.logger.warn(format_args!("ndt: unknown test: {id}"));
                return Err(Error::new(Kind::UnknownTestIdError));
            }
        };
        result.map_err(|e| e.wrap(Kind::RunningTestError))?;
    }
    Ok(())
}

async fn recv_results_and_logout(ctx: &mut Context) -> Result<(), Error> {
    ctx.logger.in_progress("ndt: recv RESULTS");
    for _ in 0..MAX_RESULTS_FRAMES {
        let (msg_type, body) = messages::read_msg(ctx.transport_mut())
            .await
            .map_err(|e| e.wrap(Kind::ReadingResultsOrLogoutError))?;
        if msg_type == MSG_RESULTS {
            for line in body.split('\n').filter(|l| !l.is_empty()) {
                ctx.logger.info(format_args!("{line}"));
            }
            continue;
        }
        if msg_type != MSG_LOGOUT {
            return Err(Error::new(Kind::NotResultsOrLogoutError));
        }
        ctx.logger.info(format_args!("got LOGOUT"));
        return Ok(());
    }
    Err(Error::new(Kind::ReadingResultsOrLogoutError)
        .with_context(format!("exceeded {MAX_RESULTS_FRAMES} MSG_RESULTS frames without LOGOUT")))
}

async fn wait_close(ctx: &mut Context) -> Result<(), Error> {
    ctx.logger.in_progress("ndt: wait close");
    let transport = ctx.transport_mut();
    transport.set_timeout(Some(std::time::Duration::from_secs(1)));
    match transport.pump().await {
        Err(e) if e.kind() == Kind::EofError => {
            ctx.logger.info(format_args!("connection closed"));
            Ok(())
        }
        Err(e) if e.kind() == Kind::TimeoutError => {
            ctx.logger.info(format_args!("closing connection after 1.0 sec timeout"));
            Ok(())
        }
        Err(e) => Err(e),
        Ok(_) => Err(Error::new(Kind::DataAfterLogoutError)),
    }
}

async fn disconnect_and_callback(ctx: &mut Context) {
    if let Some(transport) = ctx.transport.as_mut() {
        transport.close().await;
    }
    ctx.transport = None;
}

/// `run_with_specific_server(address, port, options, logger)`: executes the
/// ten-phase NDT sequence, short-circuiting on the first phase failure and
/// always disconnecting before returning.
pub async fn run_with_specific_server(
    address: impl Into<String>,
    port: u16,
    options: crate::config::EngineOptions,
    logger: Logger,
) -> Result<(), Error> {
    let mut ctx = Context::new(address, port, options, logger);

    let outcome: Result<(), Error> = async {
        timed("connect", connect(&mut ctx)).await?;
        timed("send_extended_login", send_extended_login(&mut ctx)).await?;
        timed("recv_and_ignore_kickoff", recv_and_ignore_kickoff(&mut ctx)).await?;
        timed("wait_in_queue", wait_in_queue(&mut ctx)).await?;
        timed("recv_version", recv_version(&mut ctx)).await?;
        timed("recv_tests_id", recv_tests_id(&mut ctx)).await?;
        timed("run_tests", run_tests(&mut ctx)).await?;
        timed("recv_results_and_logout", recv_results_and_logout(&mut ctx)).await?;
        timed("wait_close", wait_close(&mut ctx)).await?;
        Ok(())
    }
    .await;

    disconnect_and_callback(&mut ctx).await;
    outcome
}

/// Runs an NDT test against `options.ndt.address`, or — when that is
/// empty — resolves the nearest server via mlab-ns first.
pub async fn run(options: crate::config::EngineOptions, logger: Logger) -> Result<(), Error> {
    let address = match &options.ndt.address {
        Some(address) => address.clone(),
        None => mlab_ns::lookup("ndt", &logger).await?,
    };
    let port = options.ndt.port;
    run_with_specific_server(address, port, options, logger).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::Logger;
    use tokio::io::{duplex, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn timed_passes_through_ok_results_unchanged() {
        let result = timed("unit-test-ok", async { Ok::<_, Error>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn timed_passes_through_errors_unchanged() {
        let result = timed("unit-test-err", async { Err::<(), Error>(Error::new(Kind::TimeoutError)) }).await;
        assert_eq!(result.unwrap_err().kind(), Kind::TimeoutError);
    }

    #[tokio::test]
    async fn wait_in_queue_succeeds_on_zero_wait_and_fails_on_nonzero() {
        let (mut a, b) = duplex(256);
        let body = messages::format_test_msg("0").unwrap();
        // format_test_msg emits {"msg": "0"} which wait_in_queue parses as
        // the wait time, matching how the server encodes SRV_QUEUE bodies.
        let mut frame = vec![SRV_QUEUE];
        frame.extend_from_slice(&(body.len() as u16).to_be_bytes());
        frame.extend_from_slice(&body);
        a.write_all(&frame).await.unwrap();

        let mut ctx = Context::new(
            "127.0.0.1",
            0,
            crate::config::EngineOptions::default(),
            Logger::for_component("test"),
        );
        ctx.transport = Some(crate::transport::Transport::new(b, Logger::for_component("test")));
        wait_in_queue(&mut ctx).await.unwrap();
    }

    #[tokio::test]
    async fn wait_in_queue_fails_on_nonzero_wait() {
        let (mut a, b) = duplex(256);
        let body = messages::format_test_msg("1").unwrap();
        let mut frame = vec![SRV_QUEUE];
        frame.extend_from_slice(&(body.len() as u16).to_be_bytes());
        frame.extend_from_slice(&body);
        a.write_all(&frame).await.unwrap();

        let mut ctx = Context::new(
            "127.0.0.1",
            0,
            crate::config::EngineOptions::default(),
            Logger::for_component("test"),
        );
        ctx.transport = Some(crate::transport::Transport::new(b, Logger::for_component("test")));
        let err = wait_in_queue(&mut ctx).await.unwrap_err();
        assert_eq!(err.kind(), Kind::UnhandledSrvQueueMessageError);
    }

    #[tokio::test]
    async fn a_mocked_phase_failure_short_circuits_the_sequence() {
        // Connect to a listener that never writes anything; a tiny timeout
        // makes `connect` itself (the control connection's handshake
        // completes, but `send_extended_login`'s first read then stalls) —
        // here we exercise the short-circuit at the kickoff phase directly,
        // since the end-to-end listener-driven run belongs in tests/.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            // Never writes the kickoff bytes; the client's readn times out.
        });

        let mut options = crate::config::EngineOptions::default();
        options.net_timeout = std::time::Duration::from_millis(50);
        let result = run_with_specific_server(addr.ip().to_string(), addr.port(), options, Logger::for_component("test")).await;
        assert!(result.is_err());
    }
}
