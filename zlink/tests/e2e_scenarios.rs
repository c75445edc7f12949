//! Cross-socket end-to-end scenarios driven over real TCP/TLS sockets,
//! exercising the public `zlink::zmq` API the way an application would.
//!
//! Unlike the `zlink-proto` integration tests (which exercise the direct
//! socket types against raw streams), these run through the wrapper layer:
//! `connect`/`bind`, monitoring, and socket options.

use bytes::Bytes;
use compio::net::{TcpListener, TcpStream};
use std::time::Duration;
use zlink::zmq::{DealerSocket, DisconnectReason, PairSocket, PubSocket, RouterSocket, SocketEvent, SubSocket};

#[compio::test]
async fn pair_echo_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = compio::runtime::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut server = PairSocket::from_tcp(stream).await.unwrap();
        let msg = server.recv().await.unwrap().unwrap();
        server.send(msg).await.unwrap();
    });

    let mut client = PairSocket::connect(addr).await.unwrap();
    client
        .send(vec![Bytes::from_static(b"echo-me")])
        .await
        .unwrap();
    let reply = client.recv().await.unwrap().unwrap();
    assert_eq!(reply, vec![Bytes::from_static(b"echo-me")]);

    server.await.unwrap();
}

#[compio::test]
async fn dealer_router_roundtrip_over_tls() {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_pem = cert.cert.pem().into_bytes();
    let key_pem = cert.signing_key.serialize_pem().into_bytes();

    let server_opts = zlink_core::options::TlsOptions {
        cert: Some(Bytes::from(cert_pem.clone())),
        key: Some(Bytes::from(key_pem)),
        ..Default::default()
    };
    let client_opts = zlink_core::options::TlsOptions {
        ca: Some(Bytes::from(cert_pem)),
        hostname: Some("localhost".to_string()),
        ..Default::default()
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = compio::runtime::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let tls = zlink_proto::transport::TlsStream::accept_server(stream, &server_opts)
            .await
            .unwrap();
        let mut router = RouterSocket::with_options(tls, zlink_core::options::SocketOptions::default())
            .await
            .unwrap();
        let msg = router.recv().await.unwrap();
        router.send(msg).await.unwrap();
    });

    let endpoint = format!("tls://127.0.0.1:{}", addr.port());
    let mut dealer = DealerSocket::connect_tls(&endpoint, &client_opts)
        .await
        .unwrap();
    dealer
        .send(vec![Bytes::from_static(b"secure-ping")])
        .await
        .unwrap();
    let reply = dealer.recv().await.unwrap();
    assert_eq!(reply, vec![Bytes::from_static(b"secure-ping")]);

    server.await.unwrap();
}

#[compio::test]
async fn pub_sub_subscription_replay() {
    let mut publisher = PubSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = publisher.local_addr().unwrap();

    let server = compio::runtime::spawn(async move {
        publisher.accept_subscriber().await.unwrap();

        // Give the subscriber time to send SUBSCRIBE before the first publish;
        // a message published before the matching topic is registered must
        // not be delivered.
        compio::time::sleep(Duration::from_millis(50)).await;
        publisher
            .send(vec![Bytes::from_static(b"weather:sunny")])
            .await
            .unwrap();
        publisher
            .send(vec![Bytes::from_static(b"sports:score")])
            .await
            .unwrap();
        publisher
            .send(vec![Bytes::from_static(b"weather:rain")])
            .await
            .unwrap();
        publisher
    });

    let mut sub = SubSocket::connect(&addr.to_string()).await.unwrap();
    sub.subscribe(b"weather").await.unwrap();

    let first = sub.recv().await.unwrap().unwrap();
    assert_eq!(first, vec![Bytes::from_static(b"weather:sunny")]);
    let second = sub.recv().await.unwrap().unwrap();
    assert_eq!(second, vec![Bytes::from_static(b"weather:rain")]);

    server.await.unwrap();
}

#[compio::test]
async fn handshake_rejects_incompatible_socket_types() {
    // PAIR is only compatible with another PAIR; dialing a ROUTER must
    // surface as a handshake error on (at least) one side rather than
    // silently completing or hanging.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = compio::runtime::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        RouterSocket::from_tcp(stream).await
    });

    let client_result = PairSocket::connect(addr).await;
    let server_result = server.await.unwrap();

    assert!(
        client_result.is_err() || server_result.is_err(),
        "PAIR-to-ROUTER handshake must fail on at least one side"
    );
}

#[compio::test]
async fn router_mandatory_rejects_unknown_identity() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = compio::runtime::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut router = RouterSocket::from_tcp(stream).await.unwrap();
        router.set_router_mandatory(true);

        // An identity that never came from this peer has no route.
        let bogus = vec![Bytes::from_static(b"no-such-peer"), Bytes::from_static(b"hi")];
        let err = router.send(bogus).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);

        // The real peer's identity still routes fine.
        let msg = router.recv().await.unwrap().unwrap();
        router.send(msg).await.unwrap();
    });

    let mut dealer = DealerSocket::connect(&addr.to_string()).await.unwrap();
    dealer.send(vec![Bytes::from_static(b"ping")]).await.unwrap();
    let reply = dealer.recv().await.unwrap();
    assert_eq!(reply, vec![Bytes::from_static(b"ping")]);

    server.await.unwrap();
}

#[compio::test]
async fn heartbeat_timeout_reports_disconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // The peer accepts the handshake, then goes silent forever without
    // closing the connection, simulating a frozen/partitioned process.
    let frozen_peer = compio::runtime::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let _dealer = DealerSocket::from_stream(stream).await.unwrap();
        compio::time::sleep(Duration::from_secs(5)).await;
    });

    let mut dealer = DealerSocket::connect(&addr.to_string()).await.unwrap();
    dealer.options_mut().heartbeat_ivl = Duration::from_millis(100);
    dealer.options_mut().heartbeat_timeout = Duration::from_millis(250);
    let monitor = dealer.monitor();

    // Drive recv() so the socket's internal wait/read loop actually ticks
    // the heartbeat state machine; it returns `None` once the heartbeat
    // deadline trips and the connection is torn down.
    let result = compio::time::timeout(Duration::from_secs(2), dealer.recv()).await;
    assert_eq!(result, Ok(None), "recv should observe the heartbeat timeout, not hang");

    let event = monitor.recv_async().await.unwrap();
    match event {
        SocketEvent::Disconnected { reason, .. } => {
            assert_eq!(reason, DisconnectReason::Timeout);
        }
        other => panic!("expected Disconnected event, got {other:?}"),
    }

    frozen_peer.abort();
}

#[compio::test]
async fn dealer_router_roundtrip_over_tcp() {
    // Sanity check that the wrapper-level DEALER/ROUTER pairing matches
    // the direct `zlink-proto` behavior exercised elsewhere.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = compio::runtime::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut router = RouterSocket::from_tcp(stream).await.unwrap();
        let msg = router.recv().await.unwrap();
        router.send(msg).await.unwrap();
    });

    let stream = TcpStream::connect(addr).await.unwrap();
    let mut dealer = DealerSocket::from_stream(stream).await.unwrap();
    dealer.send(vec![Bytes::from_static(b"ping")]).await.unwrap();
    let reply = dealer.recv().await.unwrap();
    assert_eq!(reply, vec![Bytes::from_static(b"ping")]);

    server.await.unwrap();
}
