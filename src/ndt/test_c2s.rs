//! NDT C2S throughput sub-test (TEST_C2S = 0x02): the client floods an
//! ephemeral data connection for `runtime` seconds, grounded in
//! `original_source/src/ndt/test_c2s_impl.hpp`'s `coroutine_impl`/`run_impl`.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::buffer::Buffer;
use crate::error::{Error, Kind};
use crate::logger::Logger;
use crate::transport::Transport;

use super::context::Context;
use super::messages::{self, TEST_FINALIZE, TEST_MSG, TEST_PREPARE, TEST_START};

const BLOCK_SIZE: usize = 8192;
const SPEED_LOG_INTERVAL: Duration = Duration::from_millis(500);

pub async fn run(ctx: &mut Context) -> Result<(), Error> {
    ctx.logger.in_progress("ndt: c2s test");

    let (msg_type, port_str) = messages::read_msg(ctx.transport_mut()).await?;
    if msg_type != TEST_PREPARE {
        return Err(Error::new(Kind::GenericError).with_context("c2s: expected TEST_PREPARE"));
    }
    let port: u16 = port_str
        .trim()
        .parse()
        .map_err(|_| Error::new(Kind::ValueError).with_context(port_str.clone()))?;

    let data_addr = format!("{}:{port}", ctx.address);
    let data_stream = TcpStream::connect(&data_addr).await.map_err(Error::from)?;
    let mut data_transport = Transport::new(data_stream, ctx.logger.clone());
    data_transport.set_timeout(Some(ctx.timeout));
    ctx.logger.info(format_args!("connected to {data_addr} for C2S"));

    let (msg_type, _) = messages::read_msg(ctx.transport_mut()).await?;
    if msg_type != TEST_START {
        return Err(Error::new(Kind::GenericError).with_context("c2s: expected TEST_START"));
    }

    upload_for(&mut data_transport, ctx.options.ndt.runtime, &ctx.logger).await?;
    data_transport.close().await;

    let (msg_type, speed) = messages::read_msg(ctx.transport_mut()).await?;
    if msg_type != TEST_MSG {
        return Err(Error::new(Kind::GenericError).with_context("c2s: expected TEST_MSG"));
    }
    ctx.logger.info(format_args!("C2S speed {speed} kbit/s"));

    let (msg_type, _) = messages::read_msg(ctx.transport_mut()).await?;
    if msg_type != TEST_FINALIZE {
        return Err(Error::new(Kind::GenericError).with_context("c2s: expected TEST_FINALIZE"));
    }
    Ok(())
}

/// Write back-to-back `BLOCK_SIZE` random-printable-ASCII blocks from a
/// single buffer for `runtime`, logging instantaneous kbit/s every 0.5s.
async fn upload_for(
    transport: &mut Transport<TcpStream>,
    runtime: Duration,
    logger: &Logger,
) -> Result<(), Error> {
    let mut block = Buffer::new();
    block.write_random_printable(BLOCK_SIZE);
    let block = block.as_slice().to_vec();

    let begin = Instant::now();
    let mut window_start = begin;
    let mut window_bytes: u64 = 0;

    while begin.elapsed() < runtime {
        transport.inner_mut().write_all(&block).await.map_err(Error::from)?;
        window_bytes += block.len() as u64;

        let elapsed = window_start.elapsed();
        if elapsed >= SPEED_LOG_INTERVAL {
            let kbit_s = (window_bytes * 8) as f64 / 1000.0 / elapsed.as_secs_f64();
            logger.info(format_args!("speed: {kbit_s:.2} kbit/s"));
            window_start = Instant::now();
            window_bytes = 0;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_for_respects_runtime_budget() {
        let (a, b) = tokio::io::duplex(1 << 20);
        let mut transport = Transport::new(b, Logger::for_component("test"));
        tokio::spawn(async move {
            let mut a = a;
            let mut sink = [0u8; 8192];
            loop {
                match tokio::io::AsyncReadExt::read(&mut a, &mut sink).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        });
        let start = Instant::now();
        upload_for(&mut transport, Duration::from_millis(100), &Logger::for_component("test"))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
