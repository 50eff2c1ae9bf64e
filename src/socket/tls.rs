//! TLS on top of a raced connection.

use crate::base::neterror::NetError;
use crate::socket::stream::GenericConnection;
use crate::sync::CancelSignal;
use boring::ssl::{SslConnector, SslConnectorBuilder, SslMethod, SslVerifyMode, SslVersion};

/// TLS client configuration applied to every handshake.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub min_version: Option<SslVersion>,
    pub max_version: Option<SslVersion>,
    pub alpn_protos: Vec<String>,
    /// Verify the peer certificate chain and host name.
    pub verify_peer: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            min_version: Some(SslVersion::TLS1_2),
            max_version: Some(SslVersion::TLS1_3),
            alpn_protos: Vec::new(),
            verify_peer: true,
        }
    }
}

impl TlsConfig {
    /// Advertise these ALPN protocols, most preferred first.
    pub fn alpn<I, S>(mut self, protos: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alpn_protos = protos.into_iter().map(Into::into).collect();
        self
    }

    /// Skip certificate verification. Only meant for tests and lab setups.
    pub fn danger_accept_invalid_certs(mut self) -> Self {
        self.verify_peer = false;
        self
    }

    /// Apply this configuration to an SSL connector builder.
    pub fn apply_to_builder(&self, builder: &mut SslConnectorBuilder) -> Result<(), NetError> {
        if let Some(min) = self.min_version {
            builder.set_min_proto_version(Some(min)).map_err(|_| NetError::SslProtocolError)?;
        }
        if let Some(max) = self.max_version {
            builder.set_max_proto_version(Some(max)).map_err(|_| NetError::SslProtocolError)?;
        }

        if !self.alpn_protos.is_empty() {
            builder
                .set_alpn_protos(&alpn_wire_format(&self.alpn_protos)?)
                .map_err(|_| NetError::SslProtocolError)?;
        }

        if self.verify_peer {
            builder.set_verify(SslVerifyMode::PEER);
        } else {
            builder.set_verify(SslVerifyMode::NONE);
        }
        Ok(())
    }

    /// Check if SNI (Server Name Indication) should be set for this host.
    /// Per RFC 6066, SNI MUST NOT be set for raw IP addresses.
    pub fn should_set_sni(host: &str) -> bool {
        let host = host.trim_start_matches('[').trim_end_matches(']');
        host.parse::<std::net::IpAddr>().is_err()
    }
}

/// Encode protocol names as length-prefixed ALPN wire bytes.
fn alpn_wire_format(protos: &[String]) -> Result<Vec<u8>, NetError> {
    let mut wire = Vec::new();
    for proto in protos {
        let len = u8::try_from(proto.len()).map_err(|_| NetError::SslProtocolError)?;
        if len == 0 {
            return Err(NetError::SslProtocolError);
        }
        wire.push(len);
        wire.extend_from_slice(proto.as_bytes());
    }
    Ok(wire)
}

/// Run a TLS client handshake for `host` over an established connection.
///
/// Aborts with [`NetError::Cancelled`] if `cancel` fires first.
pub async fn handshake(
    config: &TlsConfig,
    host: &str,
    conn: GenericConnection,
    cancel: &CancelSignal,
) -> Result<GenericConnection, NetError> {
    let mut builder =
        SslConnector::builder(SslMethod::tls()).map_err(|_| NetError::SslProtocolError)?;
    config.apply_to_builder(&mut builder)?;

    let mut ssl = builder
        .build()
        .configure()
        .map_err(|_| NetError::SslProtocolError)?;
    if !TlsConfig::should_set_sni(host) {
        ssl.set_use_server_name_indication(false);
    }
    if !config.verify_peer {
        ssl.set_verify_hostname(false);
    }

    let peer = conn.peer_addr();
    let domain = host.trim_start_matches('[').trim_end_matches(']');
    let cancelled = cancel.cancelled();
    let stream = tokio::select! {
        biased;
        _ = cancelled => return Err(NetError::Cancelled),
        result = tokio_boring::connect(ssl, domain, conn) => result.map_err(|e| {
            tracing::debug!(host = %host, ?peer, error = ?e, "ssl handshake failed");
            NetError::SslProtocolError
        })?,
    };

    tracing::debug!(host = %host, ?peer, "ssl handshake complete");
    let tls = GenericConnection::new(stream);
    Ok(match peer {
        Some(addr) => tls.with_peer_addr(addr),
        None => tls,
    })
}
