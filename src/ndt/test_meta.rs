//! NDT META sub-test (TEST_META = 0x20): exchange of free-form client
//! metadata over the already-open control connection, grounded in
//! `original_source/src/ndt/test_meta_impl.hpp`.

use crate::error::{Error, Kind};

use super::context::Context;
use super::messages::{self, TEST_FINALIZE, TEST_PREPARE, TEST_START};

const CLIENT_VERSION: &str = concat!("client.version:", env!("CARGO_PKG_VERSION"));
const CLIENT_APPLICATION: &str = "client.application:measurement-engine";

pub async fn run(ctx: &mut Context) -> Result<(), Error> {
    ctx.logger.in_progress("ndt: meta test");

    let (msg_type, _) = messages::read_msg(ctx.transport_mut()).await?;
    if msg_type != TEST_PREPARE {
        return Err(Error::new(Kind::GenericError).with_context("meta: expected TEST_PREPARE"));
    }

    let (msg_type, _) = messages::read_msg(ctx.transport_mut()).await?;
    if msg_type != TEST_START {
        return Err(Error::new(Kind::GenericError).with_context("meta: expected TEST_START"));
    }

    for body in [CLIENT_VERSION, CLIENT_APPLICATION, ""] {
        let payload = messages::format_test_msg(body)?;
        messages::write_ndt_message(ctx.transport_mut(), messages::TEST_MSG, &payload).await?;
    }
    ctx.logger.info(format_args!("sent additional metadata to server"));

    let (msg_type, _) = messages::read_msg(ctx.transport_mut()).await?;
    if msg_type != TEST_FINALIZE {
        return Err(Error::new(Kind::GenericError).with_context("meta: expected TEST_FINALIZE"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineOptions;
    use crate::logger::Logger;
    use crate::transport::Transport;
    use tokio::io::{duplex, AsyncWriteExt};

    fn frame(msg_type: u8, body: &[u8]) -> Vec<u8> {
        let mut out = vec![msg_type];
        out.extend_from_slice(&(body.len() as u16).to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    #[tokio::test]
    async fn full_meta_exchange_succeeds() {
        let (mut a, b) = duplex(4096);
        tokio::spawn(async move {
            a.write_all(&frame(TEST_PREPARE, b"")).await.unwrap();
            a.write_all(&frame(TEST_START, b"")).await.unwrap();
            // Drain the three TEST_MSG frames the client sends before
            // delivering TEST_FINALIZE, otherwise the duplex pipe backs up.
            let mut head = [0u8; 3];
            for _ in 0..3 {
                tokio::io::AsyncReadExt::read_exact(&mut a, &mut head).await.unwrap();
                let len = u16::from_be_bytes([head[1], head[2]]) as usize;
                let mut body = vec![0u8; len];
                tokio::io::AsyncReadExt::read_exact(&mut a, &mut body).await.unwrap();
            }
            a.write_all(&frame(TEST_FINALIZE, b"")).await.unwrap();
        });

        let mut ctx = Context::new("127.0.0.1", 0, EngineOptions::default(), Logger::for_component("test"));
        ctx.transport = Some(Transport::new(b, Logger::for_component("test")));
        run(&mut ctx).await.unwrap();
    }
}
