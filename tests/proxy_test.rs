//! Integration tests for the SOCKS5 proxy.
//!
//! Each test starts a real server on a loopback port and talks to it over
//! TCP, with local listeners standing in for destination hosts.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use socksgate::{Socks5Server, UserPass};

const WAIT: Duration = Duration::from_secs(5);
const SUCCESS: [u8; 10] = [5, 0, 0, 1, 0, 0, 0, 0, 0, 0];

fn creds() -> UserPass {
    UserPass {
        username: "alice".to_string(),
        password: "secret".to_string(),
    }
}

/// Start the proxy on an OS-assigned port
async fn start_proxy() -> SocketAddr {
    let mut server = Socks5Server::new("127.0.0.1:0", creds());
    let addr = server.bind().await.expect("bind proxy");
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    addr
}

/// Start a TCP echo server that echoes back whatever it receives
async fn start_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

/// Port with nothing listening on it
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

fn auth_request(user: &str, pass: &str) -> Vec<u8> {
    let mut req = vec![1, user.len() as u8];
    req.extend_from_slice(user.as_bytes());
    req.push(pass.len() as u8);
    req.extend_from_slice(pass.as_bytes());
    req
}

fn connect_request(target: SocketAddr) -> Vec<u8> {
    let SocketAddr::V4(v4) = target else {
        panic!("tests use IPv4 targets");
    };
    let mut req = vec![5, 1, 0, 1];
    req.extend_from_slice(&v4.ip().octets());
    req.extend_from_slice(&v4.port().to_be_bytes());
    req
}

/// Greeting plus authentication, asserting both succeed
async fn authenticate(stream: &mut TcpStream) {
    stream.write_all(&[5, 2, 0, 2]).await.unwrap();
    let mut resp = [0u8; 2];
    stream.read_exact(&mut resp).await.unwrap();
    assert_eq!(resp, [5, 2], "user/pass must be selected");

    stream
        .write_all(&auth_request("alice", "secret"))
        .await
        .unwrap();
    stream.read_exact(&mut resp).await.unwrap();
    assert_eq!(resp, [1, 0]);
}

/// Connect through the proxy and return the stream after the success reply
async fn open_tunnel(proxy: SocketAddr, target: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    authenticate(&mut stream).await;
    stream.write_all(&connect_request(target)).await.unwrap();

    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, SUCCESS);
    stream
}

/// Read until the peer closes, failing the test if it never does.
/// A reset counts as closed
async fn expect_eof(stream: &mut TcpStream) -> Vec<u8> {
    let mut rest = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        match timeout(WAIT, stream.read(&mut buf))
            .await
            .expect("connection was not closed")
        {
            Ok(0) => break,
            Ok(n) => rest.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => break,
            Err(e) => panic!("unexpected read error: {e}"),
        }
    }
    rest
}

#[tokio::test]
async fn test_connect_and_echo() {
    let proxy = start_proxy().await;
    let echo = start_echo_server().await;

    let mut stream = open_tunnel(proxy, echo).await;

    stream.write_all(b"hello through socks").await.unwrap();
    let mut buf = [0u8; 19];
    timeout(WAIT, stream.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"hello through socks");
}

#[tokio::test]
async fn test_data_sent_with_request_is_forwarded() {
    let proxy = start_proxy().await;
    let echo = start_echo_server().await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    authenticate(&mut stream).await;

    // Request and payload in a single write
    let mut req = connect_request(echo);
    req.extend_from_slice(b"early");
    stream.write_all(&req).await.unwrap();

    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, SUCCESS);

    let mut buf = [0u8; 5];
    timeout(WAIT, stream.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"early");
}

#[tokio::test]
async fn test_no_auth_only_is_rejected() {
    let proxy = start_proxy().await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(&[5, 1, 0]).await.unwrap();

    let rest = expect_eof(&mut stream).await;
    assert_eq!(rest, vec![5, 0xFF]);
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let proxy = start_proxy().await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(&[5, 1, 2]).await.unwrap();
    stream
        .write_all(&auth_request("alice", "wrong"))
        .await
        .unwrap();

    let rest = expect_eof(&mut stream).await;
    assert_eq!(rest, vec![5, 2, 1, 1]);
}

#[tokio::test]
async fn test_bind_is_refused() {
    let proxy = start_proxy().await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    authenticate(&mut stream).await;

    // The command is rejected straight after the request header
    stream.write_all(&[5, 2, 0, 1]).await.unwrap();

    let rest = expect_eof(&mut stream).await;
    assert_eq!(rest, vec![5, 7, 0, 1, 0, 0, 0, 0, 0, 0]);
}

#[tokio::test]
async fn test_dial_failure_replies_host_unreachable() {
    let proxy = start_proxy().await;
    let port = closed_port().await;
    let target: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    authenticate(&mut stream).await;
    stream.write_all(&connect_request(target)).await.unwrap();

    let rest = expect_eof(&mut stream).await;
    assert_eq!(rest, vec![5, 4, 0, 1, 0, 0, 0, 0, 0, 0]);

    // Listener keeps serving other clients
    let echo = start_echo_server().await;
    let mut stream = open_tunnel(proxy, echo).await;
    stream.write_all(b"still up").await.unwrap();
    let mut buf = [0u8; 8];
    timeout(WAIT, stream.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"still up");
}

#[tokio::test]
async fn test_client_close_closes_outbound() {
    let proxy = start_proxy().await;
    let target = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let target_addr = target.local_addr().unwrap();

    let client = open_tunnel(proxy, target_addr).await;
    let (mut outbound, _) = timeout(WAIT, target.accept()).await.unwrap().unwrap();

    drop(client);

    let rest = expect_eof(&mut outbound).await;
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_outbound_close_closes_client() {
    let proxy = start_proxy().await;
    let target = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let target_addr = target.local_addr().unwrap();

    let mut client = open_tunnel(proxy, target_addr).await;
    let (mut outbound, _) = timeout(WAIT, target.accept()).await.unwrap().unwrap();

    outbound.write_all(b"bye").await.unwrap();
    drop(outbound);

    let rest = expect_eof(&mut client).await;
    assert_eq!(rest, b"bye");
}

#[tokio::test]
async fn test_stalled_handshake_does_not_block_others() {
    let proxy = start_proxy().await;
    let echo = start_echo_server().await;

    // Half a greeting, then silence
    let mut stalled = TcpStream::connect(proxy).await.unwrap();
    stalled.write_all(&[5]).await.unwrap();

    let mut stream = timeout(WAIT, open_tunnel(proxy, echo))
        .await
        .expect("second client was blocked");
    stream.write_all(b"ok").await.unwrap();
    let mut buf = [0u8; 2];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ok");

    drop(stalled);
}
