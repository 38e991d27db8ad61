//! TCP transport for relay sessions.
//!
//! The rest of the crate only ever sees ready-to-use [`Connection`] values;
//! how the listening socket is configured (port, backlog) is the binary's
//! concern.

use std::io;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpSocket, TcpStream};

use relay_wire::Role;

/// Create a TCP listener bound to the given address with an explicit backlog
pub fn listen_tcp(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}

/// Connect to a TCP address
pub async fn connect_tcp(addr: SocketAddr) -> io::Result<TcpStream> {
    TcpStream::connect(addr).await
}

/// An accepted client connection, owned by exactly one component at a time:
/// the pairing loop before matching, the relay session after.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl Connection {
    /// Wrap an accepted stream together with its peer address
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self { stream, peer }
    }

    /// Peer address, used as this connection's identifier in logs and events
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Send the role announcement to this peer
    pub async fn announce(&mut self, role: Role) -> io::Result<()> {
        self.stream.write_all(role.announcement().as_bytes()).await
    }

    /// Split into owned read/write halves for relay wiring. Dropping both
    /// halves closes the socket.
    pub fn into_split(self) -> (OwnedReadHalf, OwnedWriteHalf) {
        self.stream.into_split()
    }
}
