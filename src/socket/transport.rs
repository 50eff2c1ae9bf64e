//! Transport layer used to open a session to one candidate address.

use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::socket::stream::GenericConnection;
use crate::sync::CancelSignal;
use futures::future::BoxFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;

/// Alias for the `Future` returned by [`Transport::open`].
pub type Opening = BoxFuture<'static, Result<GenericConnection, NetError>>;

/// Opens transport sessions to resolved addresses.
///
/// `cancel` is the signal of the race the session is opened for. Callers abort
/// a pending open by dropping the returned future, so implementations only need
/// to watch `cancel` for work that outlives the future (for example a handshake
/// driven by a background task).
pub trait Transport: Send + Sync {
    fn open(&self, addr: SocketAddr, cancel: &CancelSignal) -> Opening;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn open(&self, addr: SocketAddr, cancel: &CancelSignal) -> Opening {
        (**self).open(addr, cancel)
    }
}

/// Plain TCP transport backed by tokio.
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    nodelay: bool,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `TCP_NODELAY` on every opened socket.
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.nodelay = enabled;
        self
    }
}

impl Transport for TcpTransport {
    fn open(&self, addr: SocketAddr, cancel: &CancelSignal) -> Opening {
        let nodelay = self.nodelay;
        let cancelled = cancel.cancelled();
        Box::pin(async move {
            let stream = tokio::select! {
                biased;
                _ = cancelled => return Err(NetError::Cancelled),
                stream = TcpStream::connect(addr) => stream.endpoint_context(addr)?,
            };
            if nodelay {
                stream.set_nodelay(true).endpoint_context(addr)?;
            }
            tracing::trace!(%addr, "tcp connected");
            Ok(GenericConnection::new(stream))
        })
    }
}
