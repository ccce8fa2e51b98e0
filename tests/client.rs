use getweb::client::conn::tls::mock::{MockTls, MockTlsMode};
use getweb::client::conn::transport::mock::MockTransport;
use getweb::client::{Client, ErrorKind, HttpsSession, Stage, State};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn ok_response_yields_the_exact_body() {
    init_tracing();
    let transport = MockTransport::new(
        &b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 12\r\n\r\n0123456789ab"[..],
    )
    .with_chunk_size(5);
    let tls = MockTls::default();

    let client = Client::builder()
        .with_transport(transport.clone())
        .with_tls(tls.clone())
        .build();

    let response = client.get("https://example.com:8443/a/b").unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.body().len(), 12);
    assert_eq!(&response.body()[..], b"0123456789ab");

    assert_eq!(transport.target(), Some(("example.com".to_owned(), 8443)));
    assert_eq!(
        transport.written(),
        b"GET /a/b HTTP/1.1\r\nHost: example.com:8443\r\nConnection: Close\r\nAccept: */*\r\n\r\n"
    );
    assert!(!transport.is_open());
    assert_eq!(tls.contexts_alive(), 0);
    assert_eq!(tls.shutdowns(), 1);
}

#[test]
fn moved_response_never_reads_the_body() {
    init_tracing();
    let transport =
        MockTransport::new(&b"HTTP/1.1 301 Moved Permanently\r\nLocation: /next\r\n\r\n0123456789ab"[..]);
    let tls = MockTls::default();
    let mut session = HttpsSession::new(transport.clone(), tls.clone());

    let response = session.fetch("https://example.com/").unwrap();
    assert_eq!(response.status(), 301);
    assert!(response.body().is_empty());
    assert_eq!(session.state(), State::Closed);

    // The scanner stops at the end of the head; the body is left unread.
    assert_eq!(transport.remaining(), 12);
}

#[test]
fn peer_reset_mid_body_keeps_what_arrived() {
    init_tracing();
    let transport = MockTransport::new(&b"HTTP/1.1 200 OK\r\n\r\npartial"[..]).with_error_at_end();
    let client = Client::builder()
        .with_transport(transport)
        .with_tls(MockTls::default())
        .build();

    let response = client.get("https://example.com/").unwrap();
    assert_eq!(&response.body()[..], b"partial");
}

#[test]
fn garbage_head_has_no_status_line() {
    init_tracing();
    let transport = MockTransport::new(&b"SSH-2.0-OpenSSH\r\n\r\n"[..]);
    let client = Client::builder()
        .with_transport(transport)
        .with_tls(MockTls::default())
        .build();

    let error = client.get("https://example.com/").unwrap_err();
    assert_eq!(error.stage(), Stage::Status);
    assert_eq!(error.to_string(), "status failed");
    assert!(matches!(error.kind(), ErrorKind::Scan(_)));
}

#[test]
fn every_failure_stage_releases_everything() {
    init_tracing();
    let cases: [(MockTransport, MockTls, &str, Stage); 5] = [
        (
            MockTransport::new(Vec::new()),
            MockTls::default(),
            "https://example.com",
            Stage::Parse,
        ),
        (
            MockTransport::connection_error(),
            MockTls::default(),
            "https://example.com/",
            Stage::Connect,
        ),
        (
            MockTransport::new(Vec::new()),
            MockTls::new(MockTlsMode::ContextError),
            "https://example.com/",
            Stage::TlsContext,
        ),
        (
            MockTransport::new(Vec::new()),
            MockTls::new(MockTlsMode::BindError),
            "https://example.com/",
            Stage::TlsChannel,
        ),
        (
            MockTransport::new(Vec::new()),
            MockTls::new(MockTlsMode::HandshakeError),
            "https://example.com/",
            Stage::Handshake,
        ),
    ];

    for (transport, tls, url, stage) in cases {
        let mut session = HttpsSession::new(transport.clone(), tls.clone());
        let error = session.fetch(url).unwrap_err();
        assert_eq!(error.stage(), stage);
        assert_eq!(session.failure(), Some(stage));
        assert_eq!(session.state(), State::Closed);
        assert!(!session.has_transport());
        assert!(!session.has_tls_context());
        assert!(!session.has_tls_channel());
        assert!(!transport.is_open());
        assert_eq!(tls.contexts_alive(), 0);

        session.teardown();
        assert_eq!(session.state(), State::Closed);
    }
}
