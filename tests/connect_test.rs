//! Host Connector Tests
//!
//! Covers:
//! - First success wins over earlier failures
//! - All candidates failing
//! - External cancellation during the race and during resolution
//! - Simultaneous successes (exactly one connection survives)
//! - Real TCP connects through the default connector
//! - Races on a multi-threaded runtime, where attempts finish while others
//!   are still being started

use racenet::base::loadstate::ConnectState;
use racenet::base::neterror::NetError;
use racenet::dns::{Addrs, Name, Resolve, Resolving};
use racenet::socket::config::ConnectorConfig;
use racenet::socket::stream::GenericConnection;
use racenet::socket::transport::{Opening, Transport};
use racenet::socket::{connect_to_host, HostConnector};
use racenet::sync::CancelSignal;

use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::net::TcpListener;
use url::Url;

/// Resolver returning a fixed address list for every name.
struct StaticResolver {
    addrs: Vec<SocketAddr>,
}

impl Resolve for StaticResolver {
    fn resolve(&self, _name: Name) -> Resolving {
        let addrs = self.addrs.clone();
        Box::pin(async move { Ok(Box::new(addrs.into_iter()) as Addrs) })
    }
}

/// Resolver that never answers.
struct HangingResolver;

impl Resolve for HangingResolver {
    fn resolve(&self, _name: Name) -> Resolving {
        Box::pin(std::future::pending::<Result<Addrs, NetError>>())
    }
}

/// Resolver that always fails.
struct FailingResolver;

impl Resolve for FailingResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(async move {
            Err(NetError::dns_failed(
                name.as_str(),
                io::Error::new(io::ErrorKind::NotFound, "nxdomain"),
            ))
        })
    }
}

#[derive(Clone, Copy)]
enum Script {
    Connect(Duration),
    Fail(Duration),
    Hang,
}

/// Counts opens whose future was dropped before finishing.
struct AbortGuard {
    aborted: Arc<AtomicUsize>,
    armed: bool,
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        if self.armed {
            self.aborted.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Transport that plays back a script per candidate IP and hands out
/// in-memory connections. The server halves are kept for inspection.
#[derive(Default)]
struct ScriptedTransport {
    scripts: HashMap<IpAddr, Script>,
    servers: Arc<Mutex<Vec<(SocketAddr, DuplexStream)>>>,
    opened: Arc<AtomicUsize>,
    aborted: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    fn new(scripts: &[(IpAddr, Script)]) -> Self {
        Self {
            scripts: scripts.iter().copied().collect(),
            ..Default::default()
        }
    }
}

impl Transport for ScriptedTransport {
    fn open(&self, addr: SocketAddr, _cancel: &CancelSignal) -> Opening {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.get(&addr.ip()).copied().unwrap_or(Script::Hang);
        let servers = self.servers.clone();
        let mut guard = AbortGuard {
            aborted: self.aborted.clone(),
            armed: true,
        };
        Box::pin(async move {
            match script {
                Script::Connect(delay) => {
                    tokio::time::sleep(delay).await;
                    guard.armed = false;
                    let (client, server) = tokio::io::duplex(64);
                    servers.lock().unwrap().push((addr, server));
                    Ok(GenericConnection::new(client).with_peer_addr(addr))
                }
                Script::Fail(delay) => {
                    tokio::time::sleep(delay).await;
                    guard.armed = false;
                    Err(NetError::ConnectionRefused)
                }
                Script::Hang => {
                    let _guard = guard;
                    std::future::pending::<Result<GenericConnection, NetError>>().await
                }
            }
        })
    }
}

fn ip(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
}

fn connector(transport: Arc<ScriptedTransport>, ips: &[IpAddr]) -> HostConnector {
    let resolver = StaticResolver {
        addrs: ips.iter().map(|ip| SocketAddr::new(*ip, 0)).collect(),
    };
    HostConnector::default()
        .with_resolver(Arc::new(resolver))
        .with_transport(transport)
}

#[tokio::test(start_paused = true)]
async fn test_first_success_wins_after_failures() {
    let transport = Arc::new(ScriptedTransport::new(&[
        (ip(1), Script::Fail(Duration::from_millis(5))),
        (ip(2), Script::Fail(Duration::from_millis(5))),
        (ip(3), Script::Connect(Duration::from_millis(50))),
    ]));
    let connector = connector(transport.clone(), &[ip(1), ip(2), ip(3)]);

    let job = connector.job("multi.test", 80);
    let states = job.watch_state();
    let conn = job.run(&CancelSignal::new()).await.expect("third candidate connects");

    assert_eq!(conn.peer_addr(), Some(SocketAddr::new(ip(3), 80)));
    assert_eq!(*states.borrow(), ConnectState::Connected);
    assert_eq!(transport.opened.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_all_candidates_fail() {
    let transport = Arc::new(ScriptedTransport::new(&[
        (ip(1), Script::Fail(Duration::from_millis(5))),
        (ip(2), Script::Fail(Duration::from_millis(10))),
        (ip(3), Script::Fail(Duration::from_millis(15))),
    ]));
    let connector = connector(transport, &[ip(1), ip(2), ip(3)]);

    let job = connector.job("down.test", 80);
    let states = job.watch_state();
    let err = job.run(&CancelSignal::new()).await.unwrap_err();

    assert!(matches!(err, NetError::ConnectionFailed));
    assert_eq!(*states.borrow(), ConnectState::AllFailed);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_aborts_every_attempt() {
    let transport = Arc::new(ScriptedTransport::new(&[
        (ip(1), Script::Hang),
        (ip(2), Script::Hang),
        (ip(3), Script::Hang),
    ]));
    let connector = connector(transport.clone(), &[ip(1), ip(2), ip(3)]);
    let cancel = CancelSignal::new();

    let task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { connector.connect("slow.test", 80, &cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(transport.opened.load(Ordering::SeqCst), 3);
    cancel.fire();

    let err = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("connect should return after cancel")
        .unwrap()
        .unwrap_err();
    assert!(err.is_cancelled());

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(transport.aborted.load(Ordering::SeqCst), 3);
    assert_eq!(cancel.subscriber_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_fired_before_connect() {
    let transport = Arc::new(ScriptedTransport::new(&[(ip(1), Script::Connect(Duration::ZERO))]));
    let connector = connector(transport.clone(), &[ip(1)]);
    let cancel = CancelSignal::new();
    cancel.fire();

    let err = connector.connect("any.test", 80, &cancel).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(transport.opened.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_simultaneous_successes_keep_one_connection() {
    let transport = Arc::new(ScriptedTransport::new(&[
        (ip(1), Script::Connect(Duration::from_millis(10))),
        (ip(2), Script::Connect(Duration::from_millis(10))),
    ]));
    let connector = connector(transport.clone(), &[ip(1), ip(2)]);

    let conn = connector
        .connect("twins.test", 80, &CancelSignal::new())
        .await
        .expect("one candidate wins");
    let winner = conn.peer_addr().expect("peer recorded");

    // Let the loser finish closing its connection.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut servers = std::mem::take(&mut *transport.servers.lock().unwrap());
    assert!(!servers.is_empty() && servers.len() <= 2);
    let mut live = 0;
    for (addr, server) in servers.iter_mut() {
        let mut buf = [0u8; 1];
        match tokio::time::timeout(Duration::from_millis(100), server.read(&mut buf)).await {
            // Still open: this must be the connection handed to the caller.
            Err(_) => {
                assert_eq!(*addr, winner);
                live += 1;
            }
            Ok(Ok(0)) => assert_ne!(*addr, winner),
            other => panic!("unexpected read result: {other:?}"),
        }
    }
    assert_eq!(live, 1);
    drop(conn);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fast_failure_then_success_on_worker_threads() {
    for run in 0..100 {
        let transport = Arc::new(ScriptedTransport::new(&[
            (ip(1), Script::Fail(Duration::ZERO)),
            (ip(2), Script::Connect(Duration::from_millis(5))),
        ]));
        let connector = connector(transport, &[ip(1), ip(2)]);

        let conn = connector
            .connect("mixed.test", 80, &CancelSignal::new())
            .await
            .unwrap_or_else(|e| panic!("run {run}: {e}"));
        assert_eq!(conn.peer_addr(), Some(SocketAddr::new(ip(2), 80)));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_all_fail_on_worker_threads() {
    for _ in 0..100 {
        let transport = Arc::new(ScriptedTransport::new(&[
            (ip(1), Script::Fail(Duration::ZERO)),
            (ip(2), Script::Fail(Duration::ZERO)),
            (ip(3), Script::Fail(Duration::from_millis(1))),
        ]));
        let connector = connector(transport.clone(), &[ip(1), ip(2), ip(3)]);

        let job = connector.job("down.test", 80);
        let states = job.watch_state();
        let err = job.run(&CancelSignal::new()).await.unwrap_err();
        assert!(matches!(err, NetError::ConnectionFailed));
        assert_eq!(*states.borrow(), ConnectState::AllFailed);
        assert_eq!(transport.opened.load(Ordering::SeqCst), 3);
    }
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout_is_failure_not_cancel() {
    let transport = Arc::new(ScriptedTransport::new(&[(ip(1), Script::Hang), (ip(2), Script::Hang)]));
    let connector = HostConnector::new(ConnectorConfig::new().connect_timeout(Duration::from_secs(2)))
        .with_resolver(Arc::new(StaticResolver {
            addrs: vec![SocketAddr::new(ip(1), 0), SocketAddr::new(ip(2), 0)],
        }))
        .with_transport(transport.clone());

    let err = connector
        .connect("blackhole.test", 80, &CancelSignal::new())
        .await
        .unwrap_err();
    assert!(matches!(err, NetError::ConnectionFailed));
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(transport.aborted.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_max_candidates_limits_attempts() {
    let transport = Arc::new(ScriptedTransport::new(&[
        (ip(1), Script::Fail(Duration::from_millis(1))),
        (ip(2), Script::Connect(Duration::from_millis(1))),
    ]));
    let connector = HostConnector::new(ConnectorConfig::new().max_candidates(1))
        .with_resolver(Arc::new(StaticResolver {
            addrs: vec![SocketAddr::new(ip(1), 0), SocketAddr::new(ip(2), 0)],
        }))
        .with_transport(transport.clone());

    let err = connector
        .connect("limited.test", 80, &CancelSignal::new())
        .await
        .unwrap_err();
    assert!(matches!(err, NetError::ConnectionFailed));
    assert_eq!(transport.opened.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_zero_candidate_limit_races_everything() {
    let transport = Arc::new(ScriptedTransport::new(&[
        (ip(1), Script::Fail(Duration::from_millis(1))),
        (ip(2), Script::Connect(Duration::from_millis(1))),
    ]));
    let connector = HostConnector::new(ConnectorConfig::new().max_candidates(0))
        .with_resolver(Arc::new(StaticResolver {
            addrs: vec![SocketAddr::new(ip(1), 0), SocketAddr::new(ip(2), 0)],
        }))
        .with_transport(transport.clone());

    let conn = connector
        .connect("unlimited.test", 80, &CancelSignal::new())
        .await
        .unwrap();
    assert_eq!(conn.peer_addr(), Some(SocketAddr::new(ip(2), 80)));
    assert_eq!(transport.opened.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_resolution_failure() {
    let connector = HostConnector::default().with_resolver(Arc::new(FailingResolver));
    let job = connector.job("nowhere.test", 80);
    let states = job.watch_state();

    let err = job.run(&CancelSignal::new()).await.unwrap_err();
    assert!(err.is_resolution_failure());
    assert_eq!(*states.borrow(), ConnectState::AllFailed);
}

#[tokio::test]
async fn test_invalid_port_is_resolution_failure() {
    let err = connect_to_host("127.0.0.1", "not-a-port", &CancelSignal::new())
        .await
        .unwrap_err();
    assert!(err.is_resolution_failure());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_resolution() {
    let connector = HostConnector::default().with_resolver(Arc::new(HangingResolver));
    let cancel = CancelSignal::new();
    let _timer = cancel.fire_after(Duration::from_secs(5));

    let err = connector.connect("stuck.test", 80, &cancel).await.unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_connect_to_local_listener() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = listener.accept().await;
    });

    let conn = connect_to_host("127.0.0.1", &addr.port().to_string(), &CancelSignal::new())
        .await
        .expect("local connect");
    assert_eq!(conn.peer_addr(), Some(addr));
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_connect_url_plain_http() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = listener.accept().await;
    });

    let url = Url::parse(&format!("http://{}/", addr)).unwrap();
    let conn = HostConnector::default()
        .connect_url(&url, &CancelSignal::new())
        .await
        .expect("plain connect");
    assert_eq!(conn.peer_addr(), Some(addr));
}

#[tokio::test]
async fn test_connection_refused_everywhere() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = connect_to_host("127.0.0.1", &port.to_string(), &CancelSignal::new())
        .await
        .unwrap_err();
    assert!(matches!(err, NetError::ConnectionFailed));
}
