//! Connection establishment: listener with optional TLS, and the dial side.

use std::net::SocketAddr;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ServerConfig};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::{TlsAcceptor, TlsConnector};
use tracing::debug;

use crate::error::{WireError, WireResult};
use crate::frame::{BoxedIo, FramedConnection};

/// Accepts framed connections over plain TCP or TLS.
pub struct Listener {
    tcp: TcpListener,
    tls: Option<TlsAcceptor>,
}

impl Listener {
    /// Bind to `addr`. When `tls` is present every accepted connection is
    /// required to complete a TLS handshake.
    ///
    /// # Errors
    ///
    /// Fails if the address cannot be bound.
    pub async fn bind(addr: &str, tls: Option<Arc<ServerConfig>>) -> WireResult<Self> {
        let tcp = TcpListener::bind(addr).await?;
        Ok(Self {
            tcp,
            tls: tls.map(TlsAcceptor::from),
        })
    }

    /// The bound local address.
    ///
    /// # Errors
    ///
    /// Fails if the socket is in an unusable state.
    pub fn local_addr(&self) -> WireResult<SocketAddr> {
        Ok(self.tcp.local_addr()?)
    }

    /// Accept the next connection, completing the TLS handshake when
    /// configured.
    ///
    /// # Errors
    ///
    /// Fails on accept or handshake errors.
    pub async fn accept(&self) -> WireResult<(FramedConnection, SocketAddr)> {
        let (stream, peer) = self.tcp.accept().await?;
        stream.set_nodelay(true)?;

        let io: BoxedIo = match &self.tls {
            None => Box::new(stream),
            Some(acceptor) => {
                let tls_stream = acceptor.accept(stream).await?;
                Box::new(tls_stream)
            }
        };
        debug!(%peer, "accepted connection");
        Ok((FramedConnection::new(io), peer))
    }
}

/// Dial `address` (`host:port`) and return a framed connection.
///
/// With a TLS configuration the host part of the address doubles as the
/// server name for certificate verification.
///
/// # Errors
///
/// Fails on connect, name-resolution, or handshake errors.
pub async fn dial(address: &str, tls: Option<Arc<ClientConfig>>) -> WireResult<FramedConnection> {
    let stream = TcpStream::connect(address).await?;
    stream.set_nodelay(true)?;

    let io: BoxedIo = match tls {
        None => Box::new(stream),
        Some(config) => {
            let host = address.rsplit_once(':').map_or(address, |(host, _)| host);
            let server_name = ServerName::try_from(host.to_owned())
                .map_err(|err| WireError::Certificate(format!("{host}: {err}")))?;
            let connector = TlsConnector::from(config);
            let tls_stream = connector.connect(server_name, stream).await?;
            Box::new(tls_stream)
        }
    };
    debug!(%address, "dialed");
    Ok(FramedConnection::new(io))
}
