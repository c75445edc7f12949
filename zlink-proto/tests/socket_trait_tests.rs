//! Integration tests for the `Socket` trait's polymorphism.

use bytes::Bytes;
use compio::net::{TcpListener, TcpStream};
use zlink_proto::{DealerSocket, RouterSocket, Socket};

async fn get_socket_type<S: Socket>(socket: &S) -> zlink_proto::session::SocketType {
    socket.socket_type()
}

async fn send_message<S: Socket>(socket: &mut S, msg: Vec<Bytes>) -> std::io::Result<()> {
    socket.send(msg).await
}

async fn recv_message<S: Socket>(socket: &mut S) -> std::io::Result<Option<Vec<Bytes>>> {
    socket.recv().await
}

#[compio::test]
async fn test_socket_trait_polymorphism() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = compio::runtime::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        RouterSocket::new(stream).await.unwrap()
    });

    let stream = TcpStream::connect(addr).await.unwrap();
    let dealer = DealerSocket::new(stream).await.unwrap();
    let router = server.await.unwrap();

    assert_eq!(
        format!("{:?}", get_socket_type(&dealer).await),
        "Dealer"
    );
    assert_eq!(
        format!("{:?}", get_socket_type(&router).await),
        "Router"
    );
}

#[compio::test]
async fn test_socket_trait_send_recv_signature() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = compio::runtime::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut router = RouterSocket::new(stream).await.unwrap();
        let msg = recv_message(&mut router).await.unwrap().unwrap();
        send_message(&mut router, msg).await.unwrap();
    });

    let stream = TcpStream::connect(addr).await.unwrap();
    let mut dealer = DealerSocket::new(stream).await.unwrap();

    send_message(&mut dealer, vec![Bytes::from_static(b"test")])
        .await
        .unwrap();
    let reply = recv_message(&mut dealer).await.unwrap().unwrap();
    assert_eq!(reply, vec![Bytes::from_static(b"test")]);

    server.await.unwrap();
}

#[compio::test]
async fn test_multiple_socket_types_via_generic_forwarder() {
    // Exercises the trait's core use case: a function generic over any two
    // distinct `Socket` implementors, forwarding one message between them.
    async fn forward_one<S1: Socket, S2: Socket>(from: &mut S1, to: &mut S2) -> std::io::Result<()> {
        let msg = from.recv().await?.unwrap();
        to.send(msg).await
    }

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
    dealer.send(vec![Bytes::from_static(b"multi")]).await.unwrap();
    let reply = dealer.recv().await.unwrap().unwrap();
    assert_eq!(reply, vec![Bytes::from_static(b"multi")]);

    server.await.unwrap();
}
