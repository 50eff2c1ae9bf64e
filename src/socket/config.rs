//! Host connector configuration.

use crate::base::neterror::NetError;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

/// Which resolver a [`HostConnector`](super::connectjob::HostConnector)
/// builds by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverKind {
    /// `getaddrinfo` on the blocking thread pool.
    #[default]
    System,
    /// Async hickory-dns resolver.
    Hickory,
}

/// Connector configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Per-candidate connect timeout. `None` waits for the transport or the
    /// cancel signal.
    #[serde(with = "opt_millis", rename = "connect_timeout_ms")]
    pub connect_timeout: Option<Duration>,
    /// Maximum number of resolved addresses raced against each other.
    /// A limit of 0 is rejected when loading JSON.
    pub max_candidates: Option<NonZeroUsize>,
    /// Set `TCP_NODELAY` on connected sockets.
    pub tcp_nodelay: bool,
    /// Resolver used when none is supplied explicitly.
    pub resolver: ResolverKind,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            max_candidates: None,
            tcp_nodelay: true,
            resolver: ResolverKind::System,
        }
    }
}

impl ConnectorConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-candidate connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Limit how many candidates race. 0 removes the limit.
    pub fn max_candidates(mut self, max: usize) -> Self {
        self.max_candidates = NonZeroUsize::new(max);
        self
    }

    /// Enable or disable `TCP_NODELAY`.
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Select the default resolver.
    pub fn resolver(mut self, kind: ResolverKind) -> Self {
        self.resolver = kind;
        self
    }

    /// Parse a config from JSON. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, NetError> {
        serde_json::from_str(json).map_err(|e| {
            tracing::warn!(error = %e, "invalid connector config");
            NetError::InvalidArgument
        })
    }

    /// Load a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, NetError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "cannot read connector config");
            NetError::InvalidArgument
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String, NetError> {
        serde_json::to_string_pretty(self).map_err(|_| NetError::InvalidArgument)
    }
}

mod opt_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
