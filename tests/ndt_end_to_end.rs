//! End-to-end run of the NDT v3.7.0 protocol runner against a hand-rolled
//! server that speaks just enough of the wire format to drive every phase
//! once: KICKOFF, login, queue, version, granted tests (META only, to keep
//! the fixture small), results, and logout.

use measurement_engine::config::EngineOptions;
use measurement_engine::logger::Logger;
use measurement_engine::ndt::messages::{
    self, KICKOFF_MESSAGE, MSG_LOGIN, MSG_LOGOUT, MSG_RESULTS, SRV_QUEUE, TEST_FINALIZE,
    TEST_META, TEST_PREPARE, TEST_START,
};
use measurement_engine::ndt::run_with_specific_server;
use measurement_engine::transport::Transport;
use tokio::net::TcpListener;

async fn serve_one_ndt_run(listener: TcpListener) {
    let (sock, _) = listener.accept().await.unwrap();
    let mut server = Transport::new(sock, Logger::for_component("fake-ndt-server"));

    // MSG_EXTENDED_LOGIN from the client; contents aren't checked here.
    let _ = messages::read_ndt_message(&mut server).await.unwrap();

    // Legacy, unframed KICKOFF prelude.
    server.write(KICKOFF_MESSAGE.as_bytes()).await.unwrap();

    // No queueing.
    let body = messages::format_test_msg("0").unwrap();
    messages::write_ndt_message(&mut server, SRV_QUEUE, &body).await.unwrap();

    // Server version, not validated by the client.
    let body = messages::format_test_msg("v3.7.0 (fake-ndt-server)").unwrap();
    messages::write_ndt_message(&mut server, MSG_LOGIN, &body).await.unwrap();

    // Grant exactly the META sub-test.
    let body = messages::format_test_msg(&TEST_META.to_string()).unwrap();
    messages::write_ndt_message(&mut server, MSG_LOGIN, &body).await.unwrap();

    // META sub-test: TEST_PREPARE, TEST_START, then drain the client's
    // three TEST_MSG frames before TEST_FINALIZE.
    messages::write_ndt_message(&mut server, TEST_PREPARE, b"").await.unwrap();
    messages::write_ndt_message(&mut server, TEST_START, b"").await.unwrap();
    for _ in 0..3 {
        let _ = messages::read_ndt_message(&mut server).await.unwrap();
    }
    messages::write_ndt_message(&mut server, TEST_FINALIZE, b"").await.unwrap();

    // Results, one frame, then logout.
    let body = messages::format_test_msg("web100_var: 1234").unwrap();
    messages::write_ndt_message(&mut server, MSG_RESULTS, &body).await.unwrap();
    messages::write_ndt_message(&mut server, MSG_LOGOUT, b"").await.unwrap();

    // Close promptly so the client's wait_close phase sees an EOF rather
    // than waiting out its 1s soft deadline.
    server.close().await;
}

#[tokio::test]
async fn full_ndt_run_succeeds_against_a_fake_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(serve_one_ndt_run(listener));

    let mut options = EngineOptions::default();
    options.net_timeout = std::time::Duration::from_secs(5);
    let result = run_with_specific_server(
        addr.ip().to_string(),
        addr.port(),
        options,
        Logger::for_component("ndt-probe-test"),
    )
    .await;

    server.await.unwrap();
    assert!(result.is_ok(), "expected a clean run, got {result:?}");
}

#[tokio::test]
async fn unknown_granted_test_id_aborts_the_run() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let mut server = Transport::new(sock, Logger::for_component("fake-ndt-server"));
        let _ = messages::read_ndt_message(&mut server).await.unwrap();
        server.write(KICKOFF_MESSAGE.as_bytes()).await.unwrap();
        let body = messages::format_test_msg("0").unwrap();
        messages::write_ndt_message(&mut server, SRV_QUEUE, &body).await.unwrap();
        let body = messages::format_test_msg("v3.7.0 (fake-ndt-server)").unwrap();
        messages::write_ndt_message(&mut server, MSG_LOGIN, &body).await.unwrap();
        // Grant a test ID the client never advertised support for.
        let body = messages::format_test_msg("999").unwrap();
        messages::write_ndt_message(&mut server, MSG_LOGIN, &body).await.unwrap();
        server.close().await;
    });

    let result = run_with_specific_server(
        addr.ip().to_string(),
        addr.port(),
        EngineOptions::default(),
        Logger::for_component("ndt-probe-test"),
    )
    .await;

    server.await.unwrap();
    assert!(result.is_err(), "an unrequested test ID must abort the run");
}
