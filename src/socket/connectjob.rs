use crate::base::loadstate::ConnectState;
use crate::base::neterror::NetError;
use crate::dns::{self, GaiResolver, HickoryResolver, Resolve};
use crate::socket::attempt::{EndpointAttempt, WinnerSlot};
use crate::socket::config::{ConnectorConfig, ResolverKind};
use crate::socket::stream::GenericConnection;
use crate::socket::tls::{self, TlsConfig};
use crate::socket::transport::{TcpTransport, Transport};
use crate::sync::{CancelSignal, RaceCoordinator};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use url::Url;

/// Connects to a named host by racing every resolved address.
///
/// Cheap to clone; clones share the resolver and transport.
#[derive(Clone)]
pub struct HostConnector {
    resolver: Arc<dyn Resolve>,
    transport: Arc<dyn Transport>,
    config: ConnectorConfig,
    tls: TlsConfig,
}

impl Default for HostConnector {
    fn default() -> Self {
        Self::new(ConnectorConfig::default())
    }
}

impl HostConnector {
    /// Build a connector with the resolver and TCP transport the config asks for.
    pub fn new(config: ConnectorConfig) -> Self {
        let resolver: Arc<dyn Resolve> = match config.resolver {
            ResolverKind::System => Arc::new(GaiResolver::new()),
            ResolverKind::Hickory => Arc::new(HickoryResolver::new()),
        };
        let transport = Arc::new(TcpTransport::new().nodelay(config.tcp_nodelay));
        Self {
            resolver,
            transport,
            config,
            tls: TlsConfig::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn Resolve>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_tls_config(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Prepare a job for `host:port` whose progress can be watched.
    pub fn job(&self, host: &str, port: u16) -> ConnectJob {
        let (state, _) = watch::channel(ConnectState::Idle);
        ConnectJob {
            connector: self.clone(),
            host: host.to_string(),
            port,
            tls: false,
            state,
        }
    }

    /// Connect to `host:port`, returning the first candidate that connects.
    pub async fn connect(
        &self,
        host: &str,
        port: u16,
        cancel: &CancelSignal,
    ) -> Result<GenericConnection, NetError> {
        self.job(host, port).run(cancel).await
    }

    /// Like [`connect`](Self::connect), with the port given as a string.
    ///
    /// A port that is not a number in `0..=65535` fails as a resolution error.
    pub async fn connect_to_host(
        &self,
        host: &str,
        port: &str,
        cancel: &CancelSignal,
    ) -> Result<GenericConnection, NetError> {
        let port = parse_port(host, port)?;
        self.connect(host, port, cancel).await
    }

    /// Connect to the host of `url`, adding TLS for `https`/`wss`.
    pub async fn connect_url(
        &self,
        url: &Url,
        cancel: &CancelSignal,
    ) -> Result<GenericConnection, NetError> {
        let host = url.host_str().ok_or(NetError::InvalidUrl)?;
        let port = url.port_or_known_default().ok_or(NetError::InvalidUrl)?;
        let secure = match url.scheme() {
            "https" | "wss" => true,
            "http" | "ws" => false,
            _ => return Err(NetError::UnknownUrlScheme),
        };

        let mut job = self.job(host, port);
        job.tls = secure;
        job.run(cancel).await
    }
}

impl std::fmt::Debug for HostConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostConnector")
            .field("config", &self.config)
            .field("tls", &self.tls)
            .finish_non_exhaustive()
    }
}

/// Connect to `host:port` with a default [`HostConnector`].
///
/// Fails with a resolution error, [`NetError::ConnectionFailed`] when every
/// candidate failed, or [`NetError::Cancelled`] when `cancel` fired first.
pub async fn connect_to_host(
    host: &str,
    port: &str,
    cancel: &CancelSignal,
) -> Result<GenericConnection, NetError> {
    HostConnector::default().connect_to_host(host, port, cancel).await
}

fn parse_port(host: &str, port: &str) -> Result<u16, NetError> {
    port.parse::<u16>().map_err(|e| {
        NetError::dns_failed(
            &format!("{}:{}", host, port),
            io::Error::new(io::ErrorKind::InvalidInput, e),
        )
    })
}

/// Manages one connection setup: DNS -> racing connects -> optional SSL.
/// Roughly equivalent to net::ConnectJob.
pub struct ConnectJob {
    connector: HostConnector,
    host: String,
    port: u16,
    tls: bool,
    state: watch::Sender<ConnectState>,
}

impl ConnectJob {
    pub fn state(&self) -> ConnectState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change of this job.
    pub fn watch_state(&self) -> watch::Receiver<ConnectState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: ConnectState) {
        tracing::trace!(host = %self.host, port = self.port, ?state, "connect job state");
        self.state.send_replace(state);
    }

    fn fail(&self, err: NetError) -> NetError {
        self.set_state(if err.is_cancelled() {
            ConnectState::Cancelled
        } else {
            ConnectState::AllFailed
        });
        err
    }

    pub async fn run(self, cancel: &CancelSignal) -> Result<GenericConnection, NetError> {
        if cancel.is_fired() {
            return Err(self.fail(NetError::Cancelled));
        }

        self.set_state(ConnectState::ResolvingHost);
        let cancelled = cancel.cancelled();
        let resolving = dns::candidates(
            self.connector.resolver.as_ref(),
            &self.host,
            self.port,
            self.connector.config.max_candidates,
        );
        let candidates = tokio::select! {
            biased;
            _ = cancelled => Err(NetError::Cancelled),
            result = resolving => result,
        };
        let candidates = match candidates {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::debug!(host = %self.host, error = %e, "host resolution failed");
                return Err(self.fail(e));
            }
        };

        self.set_state(ConnectState::Connecting);
        let (addr, conn) = match self.race(candidates, cancel).await {
            Ok(winner) => winner,
            Err(e) => return Err(self.fail(e)),
        };

        let conn = if self.tls {
            self.set_state(ConnectState::SslHandshake);
            match tls::handshake(&self.connector.tls, &self.host, conn, cancel).await {
                Ok(conn) => conn,
                Err(e) => return Err(self.fail(e)),
            }
        } else {
            conn
        };

        tracing::debug!(host = %self.host, port = self.port, %addr, "connected");
        self.set_state(ConnectState::Connected);
        Ok(conn)
    }

    /// Race one attempt per candidate and return the winner.
    async fn race(
        &self,
        candidates: Vec<SocketAddr>,
        cancel: &CancelSignal,
    ) -> Result<(SocketAddr, GenericConnection), NetError> {
        let race = RaceCoordinator::new();
        let race_cancel = cancel.child();
        let winner = Arc::new(WinnerSlot::new());
        let mut attempts = JoinSet::new();

        tracing::debug!(
            host = %self.host,
            port = self.port,
            candidates = candidates.len(),
            "racing candidates"
        );
        // Hand out every lock before the first attempt can finish.
        let pending: Vec<EndpointAttempt> = candidates
            .into_iter()
            .map(|addr| {
                EndpointAttempt::new(
                    addr,
                    self.connector.transport.clone(),
                    race_cancel.clone(),
                    race.acquire_lock(),
                    winner.clone(),
                )
                .with_timeout(self.connector.config.connect_timeout)
            })
            .collect();
        for attempt in pending {
            attempts.spawn(attempt.run());
        }

        let succeeded = race.wait_for_success().await;
        let stored = winner.seal();
        // Losers still connecting abort on their own; those that already
        // connected find the slot sealed and close their connection.
        race_cancel.fire();
        attempts.detach_all();

        match stored {
            Some(winner) if succeeded => Ok(winner),
            _ if cancel.is_fired() => {
                tracing::debug!(host = %self.host, "connect cancelled");
                Err(NetError::Cancelled)
            }
            _ => {
                tracing::debug!(host = %self.host, port = self.port, "all candidates failed");
                Err(NetError::ConnectionFailed)
            }
        }
    }
}

impl std::fmt::Debug for ConnectJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectJob")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("state", &self.state())
            .finish()
    }
}
