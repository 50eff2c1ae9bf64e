//! Async resolver backed by hickory-dns.
//!
//! Queries A and AAAA together and hands the answers back with the address
//! families interleaved, so a race capped by `max_candidates` still gets
//! both IPv4 and IPv6 candidates.

use super::{Addrs, Name, Resolve, Resolving};
use crate::base::neterror::NetError;
use hickory_resolver::config::{LookupIpStrategy, ResolverConfig};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use std::collections::VecDeque;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Resolver running hickory's async lookups on the tokio runtime.
///
/// Clones share one lookup cache.
#[derive(Debug, Clone)]
pub struct HickoryResolver {
    inner: Arc<TokioResolver>,
}

impl HickoryResolver {
    /// Use the host's DNS settings, or hickory's defaults if they are unreadable.
    pub fn new() -> Self {
        let mut builder = TokioResolver::builder_tokio().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "system DNS settings unreadable, using hickory defaults");
            TokioResolver::builder_with_config(
                ResolverConfig::default(),
                TokioConnectionProvider::default(),
            )
        });
        builder.options_mut().ip_strategy = LookupIpStrategy::Ipv4AndIpv6;
        Self {
            inner: Arc::new(builder.build()),
        }
    }

    /// Query the upstream servers in `config` instead of the host's.
    pub fn with_config(config: ResolverConfig) -> Self {
        let mut builder =
            TokioResolver::builder_with_config(config, TokioConnectionProvider::default());
        builder.options_mut().ip_strategy = LookupIpStrategy::Ipv4AndIpv6;
        Self {
            inner: Arc::new(builder.build()),
        }
    }
}

impl Default for HickoryResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolve for HickoryResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = self.inner.clone();
        Box::pin(async move {
            let host = name.as_str();
            let answers = match resolver.lookup_ip(host).await {
                Ok(lookup) => lookup.iter().collect::<Vec<_>>(),
                Err(e) => {
                    tracing::debug!(%host, error = %e, "hickory lookup failed");
                    return Err(NetError::dns_failed(
                        host,
                        io::Error::new(io::ErrorKind::NotFound, e.to_string()),
                    ));
                }
            };

            let addrs = interleave_families(answers);
            tracing::debug!(%host, candidates = addrs.len(), "hickory lookup answered");
            Ok(Box::new(addrs.into_iter()) as Addrs)
        })
    }
}

/// Alternate IPv4 and IPv6 answers, starting with the family of the first one.
/// Order within a family is kept. Ports are left at 0.
fn interleave_families(answers: Vec<IpAddr>) -> Vec<SocketAddr> {
    let lead_v6 = answers.first().is_some_and(IpAddr::is_ipv6);
    let (mut lead, mut follow): (VecDeque<_>, VecDeque<_>) =
        answers.into_iter().partition(|ip| ip.is_ipv6() == lead_v6);

    let mut out = Vec::with_capacity(lead.len() + follow.len());
    loop {
        match (lead.pop_front(), follow.pop_front()) {
            (None, None) => break,
            (a, b) => out.extend(a.into_iter().chain(b).map(|ip| SocketAddr::new(ip, 0))),
        }
    }
    out
}
