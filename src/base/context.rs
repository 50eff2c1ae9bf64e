//! Ergonomic error context helpers.
//!
//! Extension traits that turn IO errors raised while resolving or connecting
//! into context-rich [`NetError`] variants.

use crate::base::neterror::NetError;
use std::io;
use std::net::SocketAddr;

/// Extension trait for adding context to IO Results.
pub trait IoResultExt<T> {
    /// Add connection context to an IO error.
    ///
    /// # Example
    /// ```ignore
    /// use racenet::base::context::IoResultExt;
    ///
    /// let stream = TcpStream::connect(addr).await
    ///     .connection_context("example.com", 443)?;
    /// // Error: "Connection to example.com:443 failed: connection refused"
    /// ```
    fn connection_context(self, host: &str, port: u16) -> Result<T, NetError>;

    /// Add endpoint context from a resolved candidate address.
    fn endpoint_context(self, addr: SocketAddr) -> Result<T, NetError>;

    /// Add DNS resolution context to an IO error.
    fn dns_context(self, domain: &str) -> Result<T, NetError>;
}

impl<T> IoResultExt<T> for Result<T, io::Error> {
    fn connection_context(self, host: &str, port: u16) -> Result<T, NetError> {
        self.map_err(|e| NetError::connection_failed_to(host, port, e))
    }

    fn endpoint_context(self, addr: SocketAddr) -> Result<T, NetError> {
        self.map_err(|e| NetError::connection_failed_to(&addr.ip().to_string(), addr.port(), e))
    }

    fn dns_context(self, domain: &str) -> Result<T, NetError> {
        self.map_err(|e| NetError::dns_failed(domain, e))
    }
}
