//! Basic end-to-end integration test for the DEALER/ROUTER request-reply
//! path, plain and over TLS.
//!
//! Validates the composition this crate is built around: a socket type
//! ([`DealerSocket`]/[`RouterSocket`]) wrapping [`zlink_proto::base::SocketBase`]
//! generic over any `compio::io::{AsyncRead, AsyncWrite}` stream, with the
//! ZMP handshake ([`zlink_proto::session::ZmpSession`]) running underneath
//! regardless of which stream type carries the bytes.

use bytes::Bytes;
use compio::net::{TcpListener, TcpStream};
use rcgen::generate_simple_self_signed;
use zlink_core::options::TlsOptions;
use zlink_proto::dealer::DealerSocket;
use zlink_proto::router::RouterSocket;
use zlink_proto::transport::TlsStream;

#[compio::test]
async fn dealer_router_roundtrip_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = compio::runtime::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut router = RouterSocket::new(stream).await.unwrap();
        let msg = router.recv().await.unwrap().unwrap();
        router.send(msg).await.unwrap();
    });

    let stream = TcpStream::connect(addr).await.unwrap();
    let mut dealer = DealerSocket::new(stream).await.unwrap();
    dealer.send(vec![Bytes::from_static(b"ping")]).await.unwrap();
    let reply = dealer.recv().await.unwrap().unwrap();
    assert_eq!(reply, vec![Bytes::from_static(b"ping")]);

    server.await.unwrap();
}

#[compio::test]
async fn dealer_router_roundtrip_over_tls_with_self_signed_ca() {
    let cert = generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_pem = cert.cert.pem().into_bytes();
    let key_pem = cert.signing_key.serialize_pem().into_bytes();

    let server_opts = TlsOptions {
        cert: Some(Bytes::from(cert_pem.clone())),
        key: Some(Bytes::from(key_pem)),
        ..Default::default()
    };
    let client_opts = TlsOptions {
        ca: Some(Bytes::from(cert_pem)),
        hostname: Some("localhost".to_string()),
        ..Default::default()
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = compio::runtime::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let tls = TlsStream::accept_server(stream, &server_opts).await.unwrap();
        let mut router = RouterSocket::new(tls).await.unwrap();
        let msg = router.recv().await.unwrap().unwrap();
        router.send(msg).await.unwrap();
    });

    let stream = TcpStream::connect(addr).await.unwrap();
    let tls = TlsStream::connect_client(stream, &client_opts).await.unwrap();
    let mut dealer = DealerSocket::new(tls).await.unwrap();
    dealer
        .send(vec![Bytes::from_static(b"secure-ping")])
        .await
        .unwrap();
    let reply = dealer.recv().await.unwrap().unwrap();
    assert_eq!(reply, vec![Bytes::from_static(b"secure-ping")]);

    server.await.unwrap();
}
