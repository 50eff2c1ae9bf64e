//! One participant of a connect race.

use crate::base::neterror::NetError;
use crate::socket::stream::GenericConnection;
use crate::socket::transport::Transport;
use crate::sync::{CancelSignal, ParticipantLock};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Default)]
struct WinnerState {
    sealed: bool,
    winner: Option<(SocketAddr, GenericConnection)>,
}

/// Holds the connection of the attempt that won a race.
///
/// The first connection offered is kept. Offers made after that, or after
/// the slot was sealed, are handed back so the caller can close them.
#[derive(Default)]
pub struct WinnerSlot {
    state: Mutex<WinnerState>,
}

impl WinnerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, WinnerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Offer a connection. Returns it back if the slot is taken or sealed.
    pub fn offer(
        &self,
        addr: SocketAddr,
        conn: GenericConnection,
    ) -> Result<(), GenericConnection> {
        let mut state = self.state();
        if state.sealed || state.winner.is_some() {
            return Err(conn);
        }
        state.winner = Some((addr, conn));
        Ok(())
    }

    /// Refuse all further offers and take the stored winner, if any.
    pub fn seal(&self) -> Option<(SocketAddr, GenericConnection)> {
        let mut state = self.state();
        state.sealed = true;
        state.winner.take()
    }
}

impl std::fmt::Debug for WinnerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("WinnerSlot")
            .field("sealed", &state.sealed)
            .field("winner", &state.winner.as_ref().map(|(addr, _)| *addr))
            .finish()
    }
}

/// How a single attempt ended.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// Connected and stored its connection as the race winner.
    Won,
    /// Connected after another attempt won; the connection was closed.
    Lost,
    /// Failed, timed out or was cancelled before connecting.
    Failed(NetError),
}

/// Connects to one candidate address on behalf of a race.
pub struct EndpointAttempt {
    addr: SocketAddr,
    transport: Arc<dyn Transport>,
    cancel: CancelSignal,
    lock: ParticipantLock,
    winner: Arc<WinnerSlot>,
    timeout: Option<Duration>,
}

impl EndpointAttempt {
    pub fn new(
        addr: SocketAddr,
        transport: Arc<dyn Transport>,
        cancel: CancelSignal,
        lock: ParticipantLock,
        winner: Arc<WinnerSlot>,
    ) -> Self {
        Self {
            addr,
            transport,
            cancel,
            lock,
            winner,
            timeout: None,
        }
    }

    /// Give up on this candidate after `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn run(self) -> AttemptOutcome {
        let Self {
            addr,
            transport,
            cancel,
            lock,
            winner,
            timeout,
        } = self;

        let result = if cancel.is_fired() {
            Err(NetError::Cancelled)
        } else {
            let cancelled = cancel.cancelled();
            let opening = transport.open(addr, &cancel);
            tokio::select! {
                biased;
                _ = cancelled => Err(NetError::Cancelled),
                result = open_with_timeout(opening, timeout) => result,
            }
        };

        let conn = match result {
            Ok(conn) => conn,
            Err(e) => {
                tracing::debug!(%addr, error = %e, "connect attempt failed");
                lock.release(false);
                return AttemptOutcome::Failed(e);
            }
        };

        match winner.offer(addr, conn) {
            Ok(()) => {
                tracing::debug!(%addr, "connect attempt won");
                lock.release(true);
                AttemptOutcome::Won
            }
            Err(conn) => {
                lock.release(false);
                tracing::debug!(%addr, "connect attempt lost the race, closing");
                if let Err(e) = conn.close().await {
                    tracing::trace!(%addr, error = %e, "closing losing connection failed");
                }
                AttemptOutcome::Lost
            }
        }
    }
}

async fn open_with_timeout(
    opening: crate::socket::transport::Opening,
    timeout: Option<Duration>,
) -> Result<GenericConnection, NetError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, opening)
            .await
            .map_err(|_| NetError::ConnectionTimedOut)?,
        None => opening.await,
    }
}

impl std::fmt::Debug for EndpointAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointAttempt")
            .field("addr", &self.addr)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
