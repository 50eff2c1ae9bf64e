//! Socket and connection management.
//!
//! Provides connection setup mirroring Chromium's `net/socket/`:
//! - [`connectjob`]: DNS → racing TCP connects → optional TLS
//! - [`attempt`]: one racing connect to one resolved address
//! - [`transport`]: pluggable transport used by each attempt
//! - [`stream`]: type-erased connection handle
//! - [`tls`]: TLS configuration with BoringSSL
//! - [`config`]: connector configuration

pub mod attempt;
pub mod config;
pub mod connectjob;
pub mod stream;
pub mod tls;
pub mod transport;

pub use connectjob::{connect_to_host, ConnectJob, HostConnector};
pub use stream::GenericConnection;
