//! System DNS resolver using getaddrinfo.
//!
//! Resolution runs on tokio's blocking pool so it never stalls a connect race
//! scheduled on the same runtime. Respects system configuration such as
//! `/etc/hosts` and `/etc/resolv.conf`.

use super::{Addrs, Name, Resolve, Resolving};
use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use std::{
    io,
    net::{IpAddr, SocketAddr, ToSocketAddrs},
    vec,
};

/// System DNS resolver using `getaddrinfo` in a thread pool.
#[derive(Clone, Debug, Default)]
pub struct GaiResolver;

impl GaiResolver {
    /// Creates a new `GaiResolver`.
    pub fn new() -> Self {
        Self
    }
}

impl Resolve for GaiResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(async move {
            let host = name.as_str().to_string();
            let domain = host.clone();

            let result = tokio::task::spawn_blocking(move || {
                tracing::debug!(host = %host, "resolving via getaddrinfo");
                (host.as_str(), 0u16)
                    .to_socket_addrs()
                    .map(|iter| iter.collect::<Vec<_>>())
            })
            .await;

            // The blocking task only fails to join if it panicked or the
            // runtime is shutting down.
            let addrs = result
                .map_err(|e| {
                    tracing::error!(error = %e, "DNS resolution task failed");
                    NetError::NameNotResolved
                })?
                .dns_context(&domain)
                .inspect_err(|e| tracing::debug!(domain = %domain, error = %e, "DNS resolution failed"))?;

            if addrs.is_empty() {
                return Err(NetError::dns_failed(
                    &domain,
                    io::Error::new(io::ErrorKind::NotFound, "No addresses returned by getaddrinfo"),
                ));
            }

            tracing::debug!(domain = %domain, count = addrs.len(), "DNS resolution complete");
            Ok(Box::new(addrs.into_iter()) as Addrs)
        })
    }
}

/// Addresses for a host that is already an IP literal.
///
/// Lets the connector skip DNS for hosts like `192.0.2.1` or `::1`.
#[derive(Debug)]
pub struct SocketAddrs {
    addrs: vec::IntoIter<SocketAddr>,
}

impl SocketAddrs {
    /// Creates a new `SocketAddrs` from a vector.
    pub fn new(addrs: Vec<SocketAddr>) -> Self {
        Self {
            addrs: addrs.into_iter(),
        }
    }

    /// Returns `Some` if `host` is an IPv4 or IPv6 literal, `None` if it is
    /// a name that needs resolving.
    pub fn try_parse(host: &str, port: u16) -> Option<Self> {
        let ip = host.parse::<IpAddr>().ok()?;
        Some(Self::new(vec![SocketAddr::new(ip, port)]))
    }

    /// Returns true if no addresses are left.
    pub fn is_empty(&self) -> bool {
        self.addrs.len() == 0
    }

    /// Returns the number of addresses left.
    pub fn len(&self) -> usize {
        self.addrs.len()
    }
}

impl Iterator for SocketAddrs {
    type Item = SocketAddr;

    fn next(&mut self) -> Option<Self::Item> {
        self.addrs.next()
    }
}
