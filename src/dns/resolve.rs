//! Core DNS resolution types and traits.
//!
//! Defines the [`Resolve`] trait consumed by the host connector, and
//! [`candidates`], which turns a host and port into the ordered list of
//! addresses a connect race is run over.

use super::gai::SocketAddrs;
use crate::base::neterror::NetError;
use std::{
    borrow::Cow,
    collections::{HashMap, HashSet},
    fmt,
    future::Future,
    io,
    net::SocketAddr,
    num::NonZeroUsize,
    pin::Pin,
    sync::Arc,
};

/// A domain name to resolve into IP addresses.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct Name {
    host: Box<str>,
}

impl Name {
    /// Creates a new [`Name`] from any string-like type.
    #[inline]
    pub fn new(host: impl Into<Box<str>>) -> Self {
        Self { host: host.into() }
    }

    /// View the hostname as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.host
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Name::new(value)
    }
}

impl From<String> for Name {
    fn from(value: String) -> Self {
        Name::new(value)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.host, f)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.host, f)
    }
}

/// Alias for an `Iterator` trait object over `SocketAddr`.
pub type Addrs = Box<dyn Iterator<Item = SocketAddr> + Send>;

/// Alias for the `Future` type returned by a DNS resolver.
pub type Resolving = Pin<Box<dyn Future<Output = Result<Addrs, NetError>> + Send>>;

/// Trait for DNS resolution. Equivalent to Chromium's `HostResolver`.
///
/// Implementations must be thread-safe; resolution takes `&self` so one
/// resolver can serve many concurrent connect jobs.
pub trait Resolve: Send + Sync {
    /// Resolves a domain name to IP addresses.
    ///
    /// Returned ports are ignored; [`candidates`] applies the target port.
    fn resolve(&self, name: Name) -> Resolving;
}

/// Blanket implementation for Arc-wrapped resolvers.
impl<R: Resolve + ?Sized> Resolve for Arc<R> {
    fn resolve(&self, name: Name) -> Resolving {
        (**self).resolve(name)
    }
}

/// Resolve `host` into the candidate addresses for a connect race.
///
/// IP literals (bracketed or not) bypass the resolver. Resolved addresses get
/// `port` applied and duplicates are dropped, keeping resolver order. At most
/// `limit` candidates are returned. An empty result is a resolution failure.
pub async fn candidates(
    resolver: &dyn Resolve,
    host: &str,
    port: u16,
    limit: Option<NonZeroUsize>,
) -> Result<Vec<SocketAddr>, NetError> {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if let Some(literal) = SocketAddrs::try_parse(bare, port) {
        return Ok(literal.collect());
    }

    let resolved = resolver.resolve(Name::new(bare)).await?;
    let mut seen = HashSet::new();
    let mut addrs: Vec<SocketAddr> = resolved
        .map(|mut addr| {
            addr.set_port(port);
            addr
        })
        .filter(|addr| seen.insert(*addr))
        .collect();
    if let Some(limit) = limit {
        addrs.truncate(limit.get());
    }

    if addrs.is_empty() {
        return Err(NetError::dns_failed(
            bare,
            io::Error::new(io::ErrorKind::NotFound, "No addresses returned"),
        ));
    }
    tracing::debug!(host = %bare, port, candidates = addrs.len(), "resolved candidates");
    Ok(addrs)
}

/// DNS resolver wrapper that supports hostname overrides.
///
/// Checks a map of hostname-to-address overrides before falling back to the
/// underlying resolver. Useful for tests, pinning hosts to specific IPs, and
/// local development with custom hostnames.
pub struct DnsResolverWithOverrides {
    inner: Arc<dyn Resolve>,
    overrides: Arc<HashMap<Cow<'static, str>, Vec<SocketAddr>>>,
}

impl DnsResolverWithOverrides {
    /// Creates a new resolver with the given overrides.
    pub fn new(
        inner: Arc<dyn Resolve>,
        overrides: HashMap<Cow<'static, str>, Vec<SocketAddr>>,
    ) -> Self {
        Self {
            inner,
            overrides: Arc::new(overrides),
        }
    }

    /// Returns the number of configured overrides.
    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }
}

impl Resolve for DnsResolverWithOverrides {
    fn resolve(&self, name: Name) -> Resolving {
        if let Some(addrs) = self.overrides.get(name.as_str()) {
            tracing::trace!(domain = %name, "resolved from override");
            let addrs: Addrs = Box::new(addrs.clone().into_iter());
            return Box::pin(std::future::ready(Ok(addrs)));
        }
        self.inner.resolve(name)
    }
}

impl fmt::Debug for DnsResolverWithOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DnsResolverWithOverrides")
            .field("override_count", &self.overrides.len())
            .finish_non_exhaustive()
    }
}
