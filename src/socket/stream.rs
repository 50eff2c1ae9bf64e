//! Type-erased connection handle.
//!
//! Every transport hands back a [`GenericConnection`], whatever socket it
//! opened: plain TCP, TLS over TCP, TLS over another connection, or an
//! in-memory stream in tests. Chromium equivalent: `net::StreamSocket`.

use crate::base::neterror::NetError;
use crate::sync::{CancelSignal, Subscription};
use futures::task::AtomicWaker;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio_boring::SslStream;

/// A socket that supports async read/write operations.
pub trait StreamSocket: AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static {
    /// Check if the socket is connected.
    fn is_connected(&self) -> bool {
        true
    }

    /// Address of the remote end, when the socket has one.
    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

impl StreamSocket for TcpStream {
    fn is_connected(&self) -> bool {
        TcpStream::peer_addr(self).is_ok()
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        TcpStream::peer_addr(self).ok()
    }
}

impl StreamSocket for tokio::io::DuplexStream {}

impl<S: StreamSocket> StreamSocket for SslStream<S> {
    fn is_connected(&self) -> bool {
        self.get_ref().is_connected()
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.get_ref().peer_addr()
    }
}

/// Abort flag shared between a connection and its cancel subscription.
#[derive(Default)]
struct AbortState {
    aborted: AtomicBool,
    waker: AtomicWaker,
}

impl AbortState {
    fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
        self.waker.wake();
    }

    /// Returns an error once aborted, registering the task for wakeup otherwise.
    fn poll_aborted(&self, cx: &mut Context<'_>) -> Option<io::Error> {
        self.waker.register(cx.waker());
        if self.aborted.load(Ordering::Acquire) {
            Some(io::Error::new(io::ErrorKind::ConnectionAborted, "connection aborted"))
        } else {
            None
        }
    }
}

/// An open transport session of any kind.
pub struct GenericConnection {
    inner: Pin<Box<dyn StreamSocket>>,
    peer: Option<SocketAddr>,
    abort: Option<(Arc<AbortState>, Subscription)>,
}

impl GenericConnection {
    /// Wrap any [`StreamSocket`].
    pub fn new<S: StreamSocket>(socket: S) -> Self {
        let peer = socket.peer_addr();
        Self {
            inner: Box::pin(socket),
            peer,
            abort: None,
        }
    }

    /// Record the remote endpoint for sockets that cannot report one.
    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer = Some(addr);
        self
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn is_connected(&self) -> bool {
        !self.is_aborted() && self.inner.is_connected()
    }

    /// Fail pending and future reads and writes once `signal` fires.
    ///
    /// Replaces any earlier hookup.
    pub fn abort_on(&mut self, signal: &CancelSignal) {
        let state = Arc::new(AbortState::default());
        let subscription = {
            let state = state.clone();
            signal.subscribe(move || state.abort())
        };
        self.abort = Some((state, subscription));
    }

    pub fn is_aborted(&self) -> bool {
        self.abort
            .as_ref()
            .is_some_and(|(state, _)| state.aborted.load(Ordering::Acquire))
    }

    /// Shut down the write side and drop the socket.
    pub async fn close(mut self) -> Result<(), NetError> {
        let result = self.inner.as_mut().shutdown().await;
        tracing::trace!(peer = ?self.peer, "connection closed");
        match result {
            Ok(()) => Ok(()),
            // Peer already gone; nothing left to close.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn check_abort(&self, cx: &mut Context<'_>) -> Option<io::Error> {
        self.abort.as_ref().and_then(|(state, _)| state.poll_aborted(cx))
    }
}

impl fmt::Debug for GenericConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericConnection")
            .field("peer", &self.peer)
            .field("aborted", &self.is_aborted())
            .finish_non_exhaustive()
    }
}

impl StreamSocket for GenericConnection {
    fn is_connected(&self) -> bool {
        GenericConnection::is_connected(self)
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}

impl AsyncRead for GenericConnection {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if let Some(err) = self.check_abort(cx) {
            return Poll::Ready(Err(err));
        }
        self.inner.as_mut().poll_read(cx, buf)
    }
}

impl AsyncWrite for GenericConnection {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if let Some(err) = self.check_abort(cx) {
            return Poll::Ready(Err(err));
        }
        self.inner.as_mut().poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if let Some(err) = self.check_abort(cx) {
            return Poll::Ready(Err(err));
        }
        self.inner.as_mut().poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.inner.as_mut().poll_shutdown(cx)
    }
}
