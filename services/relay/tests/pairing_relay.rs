//! End-to-end tests: real clients against a live pairing loop.

use relay_session::{
    connect_tcp, listen_tcp, run_pairing, run_reaper, RelayMode, SessionConfig, SessionEvent,
    SessionRegistry,
};
use relay_wire::Role;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);
const SHORT: Duration = Duration::from_millis(150);

struct TestServer {
    addr: SocketAddr,
    registry: Arc<SessionRegistry>,
    events: mpsc::Receiver<SessionEvent>,
}

fn start_server(mode: RelayMode) -> TestServer {
    let bind = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
    let listener = listen_tcp(bind, 10).unwrap();
    let addr = listener.local_addr().unwrap();

    let registry = Arc::new(SessionRegistry::new());
    let (reaper_tx, reaper_rx) = mpsc::unbounded_channel();
    tokio::spawn(run_reaper(Arc::clone(&registry), reaper_rx));

    let (event_tx, events) = mpsc::channel(256);
    let config = SessionConfig {
        mode,
        read_buffer_bytes: 1024,
    };
    tokio::spawn(run_pairing(
        listener,
        config,
        Arc::clone(&registry),
        reaper_tx,
        event_tx,
    ));

    TestServer {
        addr,
        registry,
        events,
    }
}

async fn connect(server: &TestServer) -> TcpStream {
    timeout(WAIT, connect_tcp(server.addr)).await.unwrap().unwrap()
}

async fn read_role(stream: &mut TcpStream) -> Role {
    let mut prefix = [0u8; 6];
    timeout(WAIT, stream.read_exact(&mut prefix))
        .await
        .unwrap()
        .unwrap();
    match &prefix {
        b"ROLE:F" => {
            let mut rest = [0u8; 4];
            stream.read_exact(&mut rest).await.unwrap();
            assert_eq!(&rest, b"IRST");
            Role::First
        }
        b"ROLE:S" => {
            let mut rest = [0u8; 5];
            stream.read_exact(&mut rest).await.unwrap();
            assert_eq!(&rest, b"ECOND");
            Role::Second
        }
        other => panic!("unexpected announcement prefix: {other:?}"),
    }
}

async fn read_expected(stream: &mut TcpStream, expected: &[u8]) {
    let mut buf = vec![0u8; expected.len()];
    timeout(WAIT, stream.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(buf, expected);
}

async fn next_paired(server: &mut TestServer) -> (SocketAddr, SocketAddr) {
    timeout(WAIT, async {
        loop {
            match server.events.recv().await {
                Some(SessionEvent::Paired { first, second, .. }) => break (first, second),
                Some(_) => continue,
                None => panic!("event channel closed before a Paired event"),
            }
        }
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn pairs_in_arrival_order_and_announces_roles() {
    let mut server = start_server(RelayMode::Unordered);

    let mut a = connect(&server).await;
    let mut b = connect(&server).await;

    // Announcements only go out once the pair is complete, oldest arrival
    // first.
    assert_eq!(read_role(&mut a).await, Role::First);
    assert_eq!(read_role(&mut b).await, Role::Second);

    let (first, second) = next_paired(&mut server).await;
    assert_eq!(first, a.local_addr().unwrap());
    assert_eq!(second, b.local_addr().unwrap());
}

#[tokio::test]
async fn odd_connection_waits_for_the_next_arrival() {
    let mut server = start_server(RelayMode::Unordered);

    let mut a = connect(&server).await;
    let mut b = connect(&server).await;
    read_role(&mut a).await;
    read_role(&mut b).await;
    next_paired(&mut server).await;

    // C has no partner yet: no announcement, no session.
    let mut c = connect(&server).await;
    let mut buf = [0u8; 1];
    assert!(timeout(SHORT, c.read_exact(&mut buf)).await.is_err());

    // D completes the pair.
    let mut d = connect(&server).await;
    assert_eq!(read_role(&mut c).await, Role::First);
    assert_eq!(read_role(&mut d).await, Role::Second);

    let (first, second) = next_paired(&mut server).await;
    assert_eq!(first, c.local_addr().unwrap());
    assert_eq!(second, d.local_addr().unwrap());
}

#[tokio::test]
async fn relays_verbatim_between_paired_peers() {
    let server = start_server(RelayMode::Unordered);

    let mut a = connect(&server).await;
    let mut b = connect(&server).await;
    read_role(&mut a).await;
    read_role(&mut b).await;

    a.write_all(b"e4").await.unwrap();
    read_expected(&mut b, b"e4").await;

    b.write_all(b"e5").await.unwrap();
    read_expected(&mut a, b"e5").await;

    // Payload is opaque: NULs and invalid UTF-8 pass through unmodified.
    let payload = [0x00u8, 0x13, 0x37, 0xff, 0xfe];
    a.write_all(&payload).await.unwrap();
    read_expected(&mut b, &payload).await;
}

#[tokio::test]
async fn sessions_are_independent() {
    let server = start_server(RelayMode::Unordered);

    let mut a = connect(&server).await;
    let mut b = connect(&server).await;
    let mut c = connect(&server).await;
    let mut d = connect(&server).await;
    for client in [&mut a, &mut b, &mut c, &mut d] {
        read_role(client).await;
    }

    // Traffic stays within each pair.
    a.write_all(b"first pair").await.unwrap();
    c.write_all(b"second pair").await.unwrap();
    read_expected(&mut b, b"first pair").await;
    read_expected(&mut d, b"second pair").await;

    // Tearing down one session leaves the other relaying.
    drop(a);
    let mut buf = [0u8; 8];
    let read = timeout(WAIT, b.read(&mut buf)).await.unwrap().unwrap();
    assert_eq!(read, 0);

    d.write_all(b"still up").await.unwrap();
    read_expected(&mut c, b"still up").await;
}

#[tokio::test]
async fn turn_gated_relay_enforces_alternation() {
    let server = start_server(RelayMode::TurnBased);

    let mut a = connect(&server).await;
    let mut b = connect(&server).await;
    assert_eq!(read_role(&mut a).await, Role::First);
    assert_eq!(read_role(&mut b).await, Role::Second);

    // Second moves out of turn; the server must not forward it yet.
    b.write_all(b"e5").await.unwrap();
    let mut buf = [0u8; 2];
    assert!(timeout(SHORT, a.read_exact(&mut buf)).await.is_err());

    // First moves; Second's buffered move follows only after.
    a.write_all(b"e4").await.unwrap();
    read_expected(&mut b, b"e4").await;
    read_expected(&mut a, b"e5").await;

    a.write_all(b"Nf3").await.unwrap();
    read_expected(&mut b, b"Nf3").await;
}

#[tokio::test]
async fn disconnect_closes_the_partner_and_reclaims_the_session() {
    let server = start_server(RelayMode::Unordered);

    let mut a = connect(&server).await;
    let mut b = connect(&server).await;
    read_role(&mut a).await;
    read_role(&mut b).await;

    drop(a);

    // B's connection is closed by the server; B gets EOF even though it
    // keeps sending into the void.
    b.write_all(b"anyone there?").await.ok();
    let mut buf = [0u8; 16];
    let read = timeout(WAIT, b.read(&mut buf)).await.unwrap().unwrap();
    assert_eq!(read, 0);

    // The reaper drains the registry once the session worker exits.
    timeout(WAIT, async {
        while server.registry.active() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session registry did not converge to empty");
}
