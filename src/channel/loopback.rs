// TCP loopback socket pair
// Stands in for a pipe where the polling API only accepts sockets

use super::handle::OwnedHandle;
use crate::error::{ChannelCreationError, CreationStep};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use tracing::debug;

/// Build a connected loopback pair, returning `(notify, observe)`.
///
/// The connecting socket becomes the notify end and the accepted socket the
/// observe end. The listener is closed before returning. Sockets created so
/// far are dropped on any failure, so no half-open pair escapes.
pub(crate) fn create() -> Result<(OwnedHandle, OwnedHandle), ChannelCreationError> {
    use ChannelCreationError as E;

    let listener = new_tcp_socket().map_err(E::at(CreationStep::ListenerSocket))?;
    let any_port = SockAddr::from(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)));
    listener.bind(&any_port).map_err(E::at(CreationStep::Bind))?;
    listener.listen(1).map_err(E::at(CreationStep::Listen))?;
    let addr = listener.local_addr().map_err(E::at(CreationStep::Listen))?;

    let connector = new_tcp_socket().map_err(E::at(CreationStep::ConnectorSocket))?;
    connector.connect(&addr).map_err(E::at(CreationStep::Connect))?;
    connector.set_nodelay(true).map_err(E::at(CreationStep::Connect))?;

    let (accepted, peer) = listener.accept().map_err(E::at(CreationStep::Accept))?;
    drop(listener);

    let expected = connector.local_addr().map_err(E::at(CreationStep::Connect))?;
    if peer.as_socket() != expected.as_socket() {
        return Err(E::at(CreationStep::PeerMismatch)(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "accepted connection did not come from the paired socket",
        )));
    }

    debug!(port = addr.as_socket().map(|a| a.port()), "Loopback socket pair connected");
    Ok((OwnedHandle::from(connector), OwnedHandle::from(accepted)))
}

// socket2 sets close-on-exec (no-inherit on Windows) at creation
fn new_tcp_socket() -> io::Result<Socket> {
    Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
}
