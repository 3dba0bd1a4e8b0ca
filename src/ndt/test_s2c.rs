//! NDT S2C throughput sub-test (TEST_S2C = 0x04): symmetric to C2S, the
//! client reads from an ephemeral data connection until EOF and reports the
//! measured throughput, grounded in
//! `original_source/src/ndt/test_s2c_impl.hpp`.

use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::error::{Error, Kind};
use crate::transport::Transport;

use super::context::Context;
use super::messages::{self, TEST_FINALIZE, TEST_MSG, TEST_PREPARE, TEST_START};

pub async fn run(ctx: &mut Context) -> Result<(), Error> {
    ctx.logger.in_progress("ndt: s2c test");

    let (msg_type, port_str) = messages::read_msg(ctx.transport_mut()).await?;
    if msg_type != TEST_PREPARE {
        return Err(Error::new(Kind::GenericError).with_context("s2c: expected TEST_PREPARE"));
    }
    let port: u16 = port_str
        .trim()
        .parse()
        .map_err(|_| Error::new(Kind::ValueError).with_context(port_str.clone()))?;

    let data_addr = format!("{}:{port}", ctx.address);
    let data_stream = TcpStream::connect(&data_addr).await.map_err(Error::from)?;
    ctx.logger.info(format_args!("connected to {data_addr} for S2C"));

    let (msg_type, _) = messages::read_msg(ctx.transport_mut()).await?;
    if msg_type != TEST_START {
        return Err(Error::new(Kind::GenericError).with_context("s2c: expected TEST_START"));
    }

    let kbit_s = download_until_eof(data_stream, ctx.timeout).await?;
    ctx.logger.info(format_args!("S2C measured speed: {kbit_s:.2} kbit/s"));

    let payload = messages::format_test_msg(&format!("{kbit_s:.2}"))?;
    messages::write_ndt_message(ctx.transport_mut(), TEST_MSG, &payload).await?;

    loop {
        let (msg_type, _) = messages::read_msg(ctx.transport_mut()).await?;
        if msg_type == TEST_FINALIZE {
            return Ok(());
        }
        if msg_type != TEST_MSG {
            return Err(Error::new(Kind::GenericError).with_context("s2c: expected TEST_MSG or TEST_FINALIZE"));
        }
    }
}

/// Read the data connection to completion, returning overall kbit/s computed
/// as `bytes * 8 / 1000 / elapsed` on EOF.
async fn download_until_eof(mut stream: TcpStream, timeout: Duration) -> Result<f64, Error> {
    let begin = Instant::now();
    let mut total: u64 = 0;
    let mut chunk = [0u8; 8192];
    loop {
        let read = tokio::time::timeout(timeout, stream.read(&mut chunk))
            .await
            .map_err(|_| Error::new(Kind::TimeoutError))?
            .map_err(Error::from)?;
        if read == 0 {
            break;
        }
        total += read as u64;
    }
    let elapsed = begin.elapsed().as_secs_f64().max(f64::EPSILON);
    Ok((total * 8) as f64 / 1000.0 / elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn download_until_eof_measures_nonzero_speed() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(&vec![0x41u8; 65536]).await.unwrap();
        });
        let stream = TcpStream::connect(addr).await.unwrap();
        let kbit_s = download_until_eof(stream, Duration::from_secs(5)).await.unwrap();
        assert!(kbit_s > 0.0);
    }
}
